//! Deny-overrides evaluation of a target's rules.

use std::any::Any;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde_json::Value;
use tracing::debug;

use crate::rule::{CheckContext, Rule};
use crate::target::Guarded;
use crate::{DenyReason, Error, Result};

/// Decision state accumulated over one evaluation.
///
/// `Denied` is absorbing; `Passed` can still be overturned by a deny hit.
#[derive(Debug)]
enum Verdict {
    Unresolved,
    Passed,
    Denied(DenyReason),
}

/// Decide whether `subject` may perform `action` on `target`.
///
/// Applicable deny and grant checks run concurrently as two batches. A deny
/// hit, or a deny check that fails, settles the outcome at once and drops
/// every check still in flight. A grant hit stops further grant checks, but
/// the result is only returned once the deny batch has drained.
///
/// Returns the subject on success.
pub async fn evaluate<'s, S, T>(
    subject: &'s S,
    action: &str,
    target: &T,
    options: Option<&Value>,
) -> Result<&'s S>
where
    S: Any + Send + Sync,
    T: Guarded,
{
    let registry = target.registry().ok_or(Error::InvalidTarget)?;
    let rules = registry
        .rules(action)
        .filter(|rules| !rules.is_empty())
        .ok_or_else(|| Error::not_defined(action))?;

    let (deniers, allowers): (Vec<&Rule>, Vec<&Rule>) = rules
        .iter()
        .filter(|rule| rule.applies_to(subject))
        .partition(|rule| rule.is_deny());

    if deniers.is_empty() && allowers.is_empty() {
        debug!(action, registered = rules.len(), "no rule applies to subject");
        return Err(Error::not_defined(action));
    }
    debug!(
        action,
        deniers = deniers.len(),
        allowers = allowers.len(),
        "evaluating rules"
    );

    let ctx = CheckContext::new(subject, target.owner(), options);
    let mut deniers: FuturesUnordered<_> =
        deniers.iter().map(|rule| rule.check.run(ctx)).collect();
    let mut allowers: FuturesUnordered<_> =
        allowers.iter().map(|rule| rule.check.run(ctx)).collect();

    let mut verdict = Verdict::Unresolved;
    loop {
        let passed = matches!(verdict, Verdict::Passed);
        tokio::select! {
            biased;

            Some(outcome) = deniers.next(), if !deniers.is_empty() => match outcome {
                Ok(true) => {
                    verdict = Verdict::Denied(DenyReason::Rule);
                    break;
                }
                Err(source) => {
                    verdict = Verdict::Denied(DenyReason::Check(source));
                    break;
                }
                Ok(false) => {}
            },

            Some(outcome) = allowers.next(), if !passed && !allowers.is_empty() => match outcome {
                Ok(true) => verdict = Verdict::Passed,
                Ok(false) => {}
                Err(e) => debug!(action, error = %e, "grant check failed"),
            },

            else => break,
        }
    }

    debug!(action, ?verdict, "evaluation finished");
    match verdict {
        Verdict::Denied(reason) => Err(Error::Denied(reason)),
        Verdict::Passed => Ok(subject),
        Verdict::Unresolved => Err(Error::NotGranted),
    }
}
