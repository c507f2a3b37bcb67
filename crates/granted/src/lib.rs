//! Permission rules attached to targets, evaluated with deny-overrides.
//!
//! A target that owns a [`Registry`] (directly via [`Guarded`], or by being
//! wrapped in a [`Guard`]) collects grant and deny rules per action. Any
//! subject can then ask whether it [`Can`] perform an action on the target.
//!
//! # Decision
//!
//! - A deny rule whose check returns `true`, or whose check fails, denies.
//! - Otherwise a grant rule whose check returns `true` passes.
//! - Otherwise the request is not granted.
//!
//! Rules may be scoped to a subject type with a [`TypeGuard`]; rules that do
//! not apply to the subject are ignored entirely.
//!
//! # Example
//!
//! ```
//! use granted::{Can, Guard, Guarded, Selector};
//!
//! #[derive(Debug)]
//! struct User {
//!     id: u32,
//! }
//!
//! # async fn example() {
//! let mut doc = Guard::new("report");
//! doc.grant_for::<User, _>("read", |_, _| true)
//!     .deny_for::<User, _>("read", |user, _| user.id == 1);
//!
//! assert!(User { id: 2 }.can("read", &doc, None).await.is_ok());
//! assert!(User { id: 1 }.can("read", &doc, None).await.unwrap_err().is_denied());
//!
//! doc.undeny(Selector::actions("read"));
//! assert!(User { id: 1 }.can("read", &doc, None).await.is_ok());
//! # }
//! ```

mod error;
mod evaluator;
mod registry;
mod rule;
mod target;

pub use error::{CheckError, DenyReason, Error, Result};
pub use evaluator::evaluate;
pub use registry::{ActionNames, Registry, Selector};
pub use rule::{Check, CheckContext, Polarity, Predicate, Rule, TypeGuard};
pub use target::{Can, Guard, Guarded};
