//! Traits connecting host types to the registry and the evaluator.

use std::any::Any;
use std::future::Future;
use std::ops::{Deref, DerefMut};

use serde_json::Value;

use crate::evaluator::evaluate;
use crate::registry::{ActionNames, Registry, Selector};
use crate::rule::{Check, CheckContext, Polarity, TypeGuard};
use crate::Result;

/// A target that owns rule storage.
///
/// Storage starts out empty and is created on the first `grant` or `deny`;
/// querying a target that never had rules is an `InvalidTarget` error.
pub trait Guarded: Any + Send + Sync + Sized {
    fn registry(&self) -> Option<&Registry>;

    fn registry_slot(&mut self) -> &mut Option<Registry>;

    /// The value checks see as their owner.
    fn owner(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn grant(&mut self, actions: impl Into<ActionNames>, check: impl Into<Check>) -> &mut Self {
        add_rule(
            self.registry_slot(),
            Polarity::Allow,
            actions.into(),
            None,
            check.into(),
        );
        self
    }

    /// Grant only to subjects passing `guard`.
    fn grant_when(
        &mut self,
        actions: impl Into<ActionNames>,
        guard: TypeGuard,
        check: impl Into<Check>,
    ) -> &mut Self {
        add_rule(
            self.registry_slot(),
            Polarity::Allow,
            actions.into(),
            Some(guard),
            check.into(),
        );
        self
    }

    /// Grant to subjects of type `U`, with a check that sees the typed subject.
    fn grant_for<U, F>(&mut self, actions: impl Into<ActionNames>, check: F) -> &mut Self
    where
        U: Any,
        F: Fn(&U, CheckContext<'_>) -> bool + Send + Sync + 'static,
    {
        add_rule(
            self.registry_slot(),
            Polarity::Allow,
            actions.into(),
            Some(TypeGuard::of::<U>()),
            Check::typed::<U, _>(check),
        );
        self
    }

    fn deny(&mut self, actions: impl Into<ActionNames>, check: impl Into<Check>) -> &mut Self {
        add_rule(
            self.registry_slot(),
            Polarity::Deny,
            actions.into(),
            None,
            check.into(),
        );
        self
    }

    /// Deny only subjects passing `guard`.
    fn deny_when(
        &mut self,
        actions: impl Into<ActionNames>,
        guard: TypeGuard,
        check: impl Into<Check>,
    ) -> &mut Self {
        add_rule(
            self.registry_slot(),
            Polarity::Deny,
            actions.into(),
            Some(guard),
            check.into(),
        );
        self
    }

    /// Deny subjects of type `U`, with a check that sees the typed subject.
    fn deny_for<U, F>(&mut self, actions: impl Into<ActionNames>, check: F) -> &mut Self
    where
        U: Any,
        F: Fn(&U, CheckContext<'_>) -> bool + Send + Sync + 'static,
    {
        add_rule(
            self.registry_slot(),
            Polarity::Deny,
            actions.into(),
            Some(TypeGuard::of::<U>()),
            Check::typed::<U, _>(check),
        );
        self
    }

    /// Remove grant rules matching `selector`. Deny rules are left alone.
    fn ungrant(&mut self, selector: Selector) -> &mut Self {
        remove_rules(self.registry_slot(), Polarity::Allow, &selector);
        self
    }

    /// Remove deny rules matching `selector`. Grant rules are left alone.
    fn undeny(&mut self, selector: Selector) -> &mut Self {
        remove_rules(self.registry_slot(), Polarity::Deny, &selector);
        self
    }
}

fn add_rule(
    slot: &mut Option<Registry>,
    polarity: Polarity,
    actions: ActionNames,
    guard: Option<TypeGuard>,
    check: Check,
) {
    slot.get_or_insert_with(Registry::new)
        .insert(polarity, actions, guard, check);
}

fn remove_rules(slot: &mut Option<Registry>, polarity: Polarity, selector: &Selector) {
    if let Some(registry) = slot {
        registry.remove(polarity, selector);
    }
}

/// Wraps any value into a [`Guarded`] target.
///
/// Checks see the wrapped value as their owner.
#[derive(Debug, Default)]
pub struct Guard<T> {
    inner: T,
    registry: Option<Registry>,
}

impl<T> Guard<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            registry: None,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Any + Send + Sync> Guarded for Guard<T> {
    fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    fn registry_slot(&mut self) -> &mut Option<Registry> {
        &mut self.registry
    }

    fn owner(&self) -> &(dyn Any + Send + Sync) {
        &self.inner
    }
}

impl<T> Deref for Guard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for Guard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// Lets any value ask whether it may act on a target.
///
/// On success the subject itself is returned, so calls can be chained.
pub trait Can: Any + Send + Sync + Sized {
    fn can<'a, T: Guarded>(
        &'a self,
        action: &'a str,
        target: &'a T,
        options: Option<&'a Value>,
    ) -> impl Future<Output = Result<&'a Self>> + Send + 'a {
        evaluate(self, action, target, options)
    }
}

impl<S: Any + Send + Sync> Can for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Document {
        name: String,
    }

    struct User {
        name: String,
    }

    #[test]
    fn storage_is_created_lazily() {
        let mut doc = Guard::new(Document {
            name: "tester".into(),
        });
        assert!(doc.registry().is_none());

        doc.ungrant(Selector::All);
        assert!(doc.registry().is_none());

        doc.grant("access", true).deny("delete", true);
        let registry = doc.registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.rules("delete").unwrap()[0].is_deny());
    }

    #[test]
    fn typed_grants_carry_a_type_guard() {
        let mut doc = Guard::new(Document {
            name: "tester".into(),
        });
        doc.grant_for::<User, _>("access", |user, ctx| {
            ctx.owner::<Document>().is_some_and(|doc| doc.name == user.name)
        });
        let rule = &doc.registry().unwrap().rules("access").unwrap()[0];
        assert_eq!(rule.guard(), Some(&TypeGuard::of::<User>()));

        doc.ungrant(Selector::guard(TypeGuard::of::<User>()));
        assert!(doc.registry().unwrap().is_empty());
    }

    #[test]
    fn typed_checks_can_be_removed_by_identity() {
        let mut doc = Guard::new(Document {
            name: "tester".into(),
        });
        let same_name = Check::typed::<User, _>(|user, ctx| {
            ctx.owner::<Document>().is_some_and(|doc| doc.name == user.name)
        });
        doc.grant_when("access", TypeGuard::of::<User>(), same_name.clone())
            .grant_when("access", TypeGuard::of::<User>(), true)
            .deny_when("access", TypeGuard::of::<User>(), same_name.clone());

        doc.ungrant(Selector::Check {
            actions: Some("access".into()),
            guard: Some(TypeGuard::of::<User>()),
            check: same_name,
        });
        let rules = doc.registry().unwrap().rules("access").unwrap();
        assert_eq!(rules.len(), 2);
        assert!(matches!(rules[0].check(), Check::Literal(true)));
        assert!(rules[1].is_deny());
    }

    #[test]
    fn guard_derefs_to_inner() {
        let mut doc = Guard::new(Document {
            name: "tester".into(),
        });
        doc.name.push('!');
        assert_eq!(doc.into_inner().name, "tester!");
    }
}
