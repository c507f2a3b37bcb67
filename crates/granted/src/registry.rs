//! Per-target rule storage.

use std::collections::HashMap;

use tracing::trace;

use crate::rule::{Check, Polarity, Rule, TypeGuard};

/// One or more action names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionNames(Vec<String>);

impl ActionNames {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.0.iter().any(|name| name == action)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ActionNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for ActionNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<&String> for ActionNames {
    fn from(name: &String) -> Self {
        Self(vec![name.clone()])
    }
}

impl From<Vec<String>> for ActionNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for ActionNames {
    fn from(names: Vec<&str>) -> Self {
        names.as_slice().into()
    }
}

impl From<&[&str]> for ActionNames {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|name| name.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ActionNames {
    fn from(names: [&str; N]) -> Self {
        names.as_slice().into()
    }
}

/// Which rules `ungrant` / `undeny` remove.
///
/// Each component narrows the match. Polarity is supplied separately, and
/// rules of the other polarity are never touched.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Every rule, across all actions.
    All,
    /// Every rule for the given actions. An empty list means all actions.
    Actions(ActionNames),
    /// Rules carrying exactly this guard. Unguarded rules never match.
    Guard {
        actions: Option<ActionNames>,
        guard: TypeGuard,
    },
    /// Rules whose check is this very check, optionally narrowed by guard.
    Check {
        actions: Option<ActionNames>,
        guard: Option<TypeGuard>,
        check: Check,
    },
}

impl Selector {
    pub fn actions(actions: impl Into<ActionNames>) -> Self {
        Selector::Actions(actions.into())
    }

    pub fn guard(guard: TypeGuard) -> Self {
        Selector::Guard {
            actions: None,
            guard,
        }
    }

    pub fn check(check: Check) -> Self {
        Selector::Check {
            actions: None,
            guard: None,
            check,
        }
    }

    fn covers_action(&self, action: &str) -> bool {
        let actions = match self {
            Selector::All => None,
            Selector::Actions(names) => Some(names),
            Selector::Guard { actions, .. } | Selector::Check { actions, .. } => actions.as_ref(),
        };
        actions.is_none_or(|names| names.is_empty() || names.contains(action))
    }

    fn matches(&self, rule: &Rule) -> bool {
        match self {
            Selector::All | Selector::Actions(_) => true,
            Selector::Guard { guard, .. } => rule.guard.as_ref() == Some(guard),
            Selector::Check { guard, check, .. } => {
                let guard_matches = guard
                    .as_ref()
                    .is_none_or(|guard| rule.guard.as_ref() == Some(guard));
                guard_matches && rule.check.same_as(check)
            }
        }
    }
}

/// Mapping from action name to the ordered rules registered for it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    rules: HashMap<String, Vec<Rule>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one rule per action name.
    pub fn insert(
        &mut self,
        polarity: Polarity,
        actions: ActionNames,
        guard: Option<TypeGuard>,
        check: Check,
    ) {
        for action in actions.iter() {
            trace!(action, ?polarity, ?guard, "registering rule");
            self.rules.entry(action.to_string()).or_default().push(Rule {
                action: action.to_string(),
                check: check.clone(),
                guard: guard.clone(),
                polarity,
            });
        }
    }

    /// Remove rules of `polarity` matching `selector`, returning how many went.
    pub fn remove(&mut self, polarity: Polarity, selector: &Selector) -> usize {
        let mut removed = 0;
        for (action, rules) in self.rules.iter_mut() {
            if !selector.covers_action(action) {
                continue;
            }
            let before = rules.len();
            rules.retain(|rule| rule.polarity != polarity || !selector.matches(rule));
            removed += before - rules.len();
        }
        trace!(?polarity, ?selector, removed, "removed rules");
        removed
    }

    /// Rules registered for `action`, in registration order.
    pub fn rules(&self, action: &str) -> Option<&[Rule]> {
        self.rules.get(action).map(Vec::as_slice)
    }

    /// Names of every action that has (or had) rules.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Total number of rules across all actions.
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User;

    fn count(registry: &Registry, action: &str) -> usize {
        registry.rules(action).map_or(0, <[Rule]>::len)
    }

    #[test]
    fn insert_one_rule_per_action() {
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, ["post", "put", "del"].into(), None, true.into());
        assert_eq!(registry.actions().count(), 3);
        assert_eq!(registry.len(), 3);

        let rule = &registry.rules("put").unwrap()[0];
        assert_eq!(rule.action(), "put");
        assert!(!rule.is_deny());
        assert!(rule.guard().is_none());
    }

    #[test]
    fn remove_all_by_polarity() {
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, "access".into(), None, Check::from_fn(|_| true));
        registry.insert(
            Polarity::Allow,
            "access".into(),
            Some(TypeGuard::of::<User>()),
            Check::from_fn(|_| true),
        );
        registry.insert(
            Polarity::Allow,
            "item".into(),
            Some(TypeGuard::of::<User>()),
            Check::from_fn(|_| true),
        );

        assert_eq!(registry.remove(Polarity::Allow, &Selector::All), 3);
        assert_eq!(count(&registry, "access"), 0);
        assert_eq!(count(&registry, "item"), 0);
    }

    #[test]
    fn remove_by_guard_skips_unguarded() {
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, "access".into(), None, true.into());
        registry.insert(Polarity::Allow, "access".into(), Some(TypeGuard::of::<User>()), true.into());
        registry.insert(Polarity::Allow, "item".into(), Some(TypeGuard::of::<User>()), true.into());

        registry.remove(Polarity::Allow, &Selector::guard(TypeGuard::of::<User>()));
        assert_eq!(count(&registry, "item"), 0);
        assert_eq!(count(&registry, "access"), 1);
    }

    #[test]
    fn remove_by_action_and_guard() {
        let user = || Some(TypeGuard::of::<User>());
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, "access".into(), user(), true.into());
        registry.insert(Polarity::Allow, "access".into(), user(), false.into());
        registry.insert(Polarity::Allow, "access".into(), None, true.into());
        registry.insert(Polarity::Deny, "access".into(), user(), true.into());
        registry.insert(Polarity::Allow, "item".into(), user(), true.into());

        let selector = Selector::Guard {
            actions: Some("access".into()),
            guard: TypeGuard::of::<User>(),
        };
        assert_eq!(registry.remove(Polarity::Allow, &selector), 2);

        let access = registry.rules("access").unwrap();
        assert_eq!(access.len(), 2);
        assert!(!access[0].is_deny() && access[0].guard().is_none());
        assert!(access[1].is_deny() && access[1].guard().is_some());
        assert_eq!(count(&registry, "item"), 1);
    }

    #[test]
    fn remove_by_check_identity() {
        let x = Check::from_fn(|_| true);
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, "access".into(), None, x.clone());
        registry.insert(
            Polarity::Allow,
            "access".into(),
            Some(TypeGuard::of::<User>()),
            Check::from_fn(|_| true),
        );
        registry.insert(Polarity::Allow, "item".into(), Some(TypeGuard::of::<User>()), x.clone());

        registry.remove(Polarity::Allow, &Selector::check(x));
        assert_eq!(count(&registry, "item"), 0);
        assert_eq!(count(&registry, "access"), 1);
    }

    #[test]
    fn remove_by_action_guard_and_check() {
        let x = Check::from_fn(|_| true);
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, "access".into(), None, x.clone());
        registry.insert(Polarity::Allow, "access".into(), Some(TypeGuard::of::<User>()), x.clone());
        registry.insert(Polarity::Allow, "item".into(), None, x.clone());

        let selector = |action: &str| Selector::Check {
            actions: Some(action.into()),
            guard: Some(TypeGuard::of::<User>()),
            check: x.clone(),
        };
        registry.remove(Polarity::Allow, &selector("item"));
        assert_eq!(count(&registry, "item"), 1);
        assert_eq!(count(&registry, "access"), 2);

        registry.remove(Polarity::Allow, &selector("access"));
        assert_eq!(count(&registry, "item"), 1);
        assert_eq!(count(&registry, "access"), 1);
        assert!(registry.rules("access").unwrap()[0].guard().is_none());
    }

    #[test]
    fn removal_leaves_other_polarity() {
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, "one".into(), None, true.into());
        registry.insert(Polarity::Deny, "one".into(), None, true.into());
        registry.insert(Polarity::Allow, "one".into(), Some(TypeGuard::of::<User>()), true.into());
        registry.insert(Polarity::Deny, "one".into(), Some(TypeGuard::of::<User>()), true.into());

        registry.remove(Polarity::Deny, &Selector::guard(TypeGuard::of::<User>()));
        assert_eq!(count(&registry, "one"), 3);

        registry.remove(Polarity::Deny, &Selector::actions("one"));
        assert_eq!(count(&registry, "one"), 2);

        registry.insert(Polarity::Deny, "one".into(), None, true.into());
        registry.remove(Polarity::Allow, &Selector::actions("one"));
        assert_eq!(count(&registry, "one"), 1);
        assert!(registry.rules("one").unwrap()[0].is_deny());
    }

    #[test]
    fn empty_action_list_means_all_actions() {
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, ["a", "b"].into(), None, true.into());
        registry.remove(Polarity::Allow, &Selector::Actions(Vec::<String>::new().into()));
        assert!(registry.is_empty());
    }

    #[test]
    fn repeated_removal_is_a_no_op() {
        let mut registry = Registry::new();
        registry.insert(Polarity::Allow, "access".into(), None, true.into());
        registry.insert(Polarity::Allow, "other".into(), None, true.into());

        assert_eq!(registry.remove(Polarity::Allow, &Selector::actions("access")), 1);
        assert_eq!(registry.remove(Polarity::Allow, &Selector::actions("access")), 0);
        assert_eq!(count(&registry, "other"), 1);
    }
}
