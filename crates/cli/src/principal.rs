//! Subjects and targets as seen from the command line.

use granted::TypeGuard;

/// The subject of a `check`: a name plus the kinds it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub kinds: Vec<String>,
}

impl Principal {
    pub fn new(name: impl Into<String>, kinds: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kinds,
        }
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.kinds.iter().any(|k| k == kind)
    }
}

/// A named target defined in the rules file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
}

/// Guard restricting a rule to principals of `kind`.
pub fn kind_guard(kind: &str) -> TypeGuard {
    let kind = kind.to_string();
    TypeGuard::matching(move |subject| {
        subject
            .downcast_ref::<Principal>()
            .is_some_and(|principal| principal.has_kind(&kind))
    })
}
