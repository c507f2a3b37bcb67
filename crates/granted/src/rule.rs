//! Rule model: checks, type guards and the rules that bind them to an action.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::{self, Future};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::CheckError;

/// Whether a rule grants or denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Allow,
    Deny,
}

/// Everything a check can see while it runs.
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
    subject: &'a (dyn Any + Send + Sync),
    owner: &'a (dyn Any + Send + Sync),
    options: Option<&'a Value>,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        subject: &'a (dyn Any + Send + Sync),
        owner: &'a (dyn Any + Send + Sync),
        options: Option<&'a Value>,
    ) -> Self {
        Self {
            subject,
            owner,
            options,
        }
    }

    /// The subject asking for permission, if it is a `U`.
    pub fn subject<U: Any>(&self) -> Option<&'a U> {
        self.subject.downcast_ref::<U>()
    }

    /// The object the rule is attached to, if it is an `O`.
    pub fn owner<O: Any>(&self) -> Option<&'a O> {
        self.owner.downcast_ref::<O>()
    }

    /// Per-call options passed to `can`.
    pub fn options(&self) -> Option<&'a Value> {
        self.options
    }
}

impl fmt::Debug for CheckContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// An opaque, possibly asynchronous permission check.
///
/// Only an `Ok(true)` result counts as a hit. `Ok(false)` contributes nothing,
/// and an `Err` is ignored on grant rules but treated as a denial on deny
/// rules.
pub trait Predicate: Send + Sync {
    fn check<'a>(&'a self, ctx: CheckContext<'a>) -> BoxFuture<'a, Result<bool, CheckError>>;
}

type SyncCheck = dyn Fn(CheckContext<'_>) -> Result<bool, CheckError> + Send + Sync;
type AsyncCheck =
    dyn Fn(CheckContext<'_>) -> BoxFuture<'static, Result<bool, CheckError>> + Send + Sync;

struct FnPredicate(Box<SyncCheck>);

impl Predicate for FnPredicate {
    fn check<'a>(&'a self, ctx: CheckContext<'a>) -> BoxFuture<'a, Result<bool, CheckError>> {
        future::ready((self.0)(ctx)).boxed()
    }
}

struct AsyncPredicate(Box<AsyncCheck>);

impl Predicate for AsyncPredicate {
    fn check<'a>(&'a self, ctx: CheckContext<'a>) -> BoxFuture<'a, Result<bool, CheckError>> {
        (self.0)(ctx)
    }
}

/// The condition a rule evaluates: a fixed boolean or a shared predicate.
///
/// Cloning a predicate check shares it, and clones compare equal under
/// [`Check::same_as`], which is how a previously registered check is
/// selected for removal.
#[derive(Clone)]
pub enum Check {
    Literal(bool),
    Predicate(Arc<dyn Predicate>),
}

impl Check {
    pub fn predicate(predicate: impl Predicate + 'static) -> Self {
        Self::Predicate(Arc::new(predicate))
    }

    /// A synchronous, infallible check.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(CheckContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self::try_from_fn(move |ctx: CheckContext<'_>| Ok(f(ctx)))
    }

    /// A check that sees the subject as a `U`. Subjects of any other type
    /// never pass it.
    pub fn typed<U, F>(f: F) -> Self
    where
        U: Any,
        F: Fn(&U, CheckContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self::from_fn(move |ctx| ctx.subject::<U>().is_some_and(|subject| f(subject, ctx)))
    }

    /// A synchronous check that may fail.
    pub fn try_from_fn<F>(f: F) -> Self
    where
        F: Fn(CheckContext<'_>) -> Result<bool, CheckError> + Send + Sync + 'static,
    {
        Self::predicate(FnPredicate(Box::new(f)))
    }

    /// An asynchronous check. The closure runs synchronously with the context
    /// and must copy out whatever the returned future needs.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(CheckContext<'_>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, CheckError>> + Send + 'static,
    {
        Self::predicate(AsyncPredicate(Box::new(move |ctx: CheckContext<'_>| {
            f(ctx).boxed()
        })))
    }

    /// Identity comparison: literals by value, predicates by allocation.
    pub fn same_as(&self, other: &Check) -> bool {
        match (self, other) {
            (Check::Literal(a), Check::Literal(b)) => a == b,
            (Check::Predicate(a), Check::Predicate(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }

    pub(crate) fn run<'a>(
        &'a self,
        ctx: CheckContext<'a>,
    ) -> BoxFuture<'a, Result<bool, CheckError>> {
        match self {
            Check::Literal(value) => future::ready(Ok(*value)).boxed(),
            Check::Predicate(predicate) => predicate.check(ctx),
        }
    }
}

impl From<bool> for Check {
    fn from(value: bool) -> Self {
        Check::Literal(value)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Check::Predicate(predicate) => f
                .debug_tuple("Predicate")
                .field(&(Arc::as_ptr(predicate) as *const ()))
                .finish(),
        }
    }
}

type Matcher = dyn Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync;

/// Restricts a rule to subjects of a given type or capability.
#[derive(Clone)]
pub enum TypeGuard {
    /// Subject must be exactly this type.
    Type { id: TypeId, name: &'static str },
    /// Subject must satisfy an arbitrary predicate.
    Matcher(Arc<Matcher>),
}

impl TypeGuard {
    pub fn of<T: Any>() -> Self {
        TypeGuard::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn matching<F>(f: F) -> Self
    where
        F: Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync + 'static,
    {
        TypeGuard::Matcher(Arc::new(f))
    }

    pub fn matches(&self, subject: &(dyn Any + Send + Sync)) -> bool {
        match self {
            TypeGuard::Type { id, .. } => {
                let subject: &dyn Any = subject;
                subject.type_id() == *id
            }
            TypeGuard::Matcher(matcher) => matcher(subject),
        }
    }
}

impl PartialEq for TypeGuard {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeGuard::Type { id: a, .. }, TypeGuard::Type { id: b, .. }) => a == b,
            (TypeGuard::Matcher(a), TypeGuard::Matcher(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for TypeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeGuard::Type { name, .. } => f.debug_tuple("Type").field(name).finish(),
            TypeGuard::Matcher(matcher) => f
                .debug_tuple("Matcher")
                .field(&(Arc::as_ptr(matcher) as *const ()))
                .finish(),
        }
    }
}

/// A single grant or deny clause for one action.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) action: String,
    pub(crate) check: Check,
    pub(crate) guard: Option<TypeGuard>,
    pub(crate) polarity: Polarity,
}

impl Rule {
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn check(&self) -> &Check {
        &self.check
    }

    pub fn guard(&self) -> Option<&TypeGuard> {
        self.guard.as_ref()
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_deny(&self) -> bool {
        self.polarity == Polarity::Deny
    }

    /// An unguarded rule applies to every subject.
    pub fn applies_to(&self, subject: &(dyn Any + Send + Sync)) -> bool {
        self.guard.as_ref().is_none_or(|guard| guard.matches(subject))
    }
}
