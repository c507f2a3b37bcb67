//! Authorization error types.

use thiserror::Error;

/// Reasons a `can` query did not produce a pass.
///
/// Every variant is a specialization of "not granted": callers that only care
/// whether access was given can treat any `Err` uniformly, while callers that
/// need to distinguish misconfiguration from an explicit denial can match.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The target never had rule storage initialized on itself.
    #[error("not granted: target has no registered rules")]
    InvalidTarget,

    /// No rule exists for the action, or none applies to the subject's type.
    #[error("not granted: no rule defined for '{action}'")]
    NotDefined { action: String },

    /// A deny rule matched.
    #[error("not granted: denied ({0})")]
    Denied(DenyReason),

    /// Rules applied, but none produced an explicit pass.
    #[error("not granted")]
    NotGranted,
}

impl Error {
    pub(crate) fn not_defined(action: impl Into<String>) -> Self {
        Self::NotDefined {
            action: action.into(),
        }
    }

    /// Returns `true` if a deny rule decided the outcome.
    pub fn is_denied(&self) -> bool {
        matches!(self, Error::Denied(_))
    }

    /// Returns `true` if no applicable rule exists for the action.
    pub fn is_not_defined(&self) -> bool {
        matches!(self, Error::NotDefined { .. })
    }

    /// Returns `true` if applicable rules ran but none passed.
    pub fn is_not_granted(&self) -> bool {
        matches!(self, Error::NotGranted)
    }
}

/// Why a deny rule fired.
#[derive(Debug, Error)]
pub enum DenyReason {
    /// The deny check returned `true`.
    #[error("matched deny rule")]
    Rule,

    /// The deny check itself failed; a failing deny check counts as a denial.
    #[error("deny check failed: {0}")]
    Check(CheckError),
}

/// Failure raised by a rule check.
///
/// The message describes what the check was doing; the underlying error, if
/// any, is kept as the source.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CheckError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for CheckError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for CheckError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
