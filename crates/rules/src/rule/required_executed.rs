//! Meta-rule guarding against "valid because nothing ran yet".

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::{Rule, RuleKind, RuleOrder, RuleState};
use crate::error::RuleResult;
use crate::message::RuleMessages;
use crate::trigger::TriggerProperty;

/// Reports an object-level error while any required-ness rule has never run.
///
/// The manager installs one instance with [`RuleOrder::LAST`] and feeds it
/// every required rule it registers, before or after installation. The
/// meta-rule adopts the triggers of those rules, so a change to any required
/// property re-evaluates it after the required rule itself ran.
///
/// Meta-rules sort after every other rule of the same order, so in a full
/// pass the required rules have always run by the time this one checks them
/// and it stays silent. To surface the "not yet evaluated" message on a fresh
/// object, a host runs the meta-rule alone:
///
/// ```ignore
/// manager.run_rules_of::<RequiredRulesExecuted<_>>(&target, &token).await?;
/// ```
pub struct RequiredRulesExecuted<T>
where
    T: Send + Sync,
{
    state: RuleState,
    object_property: String,
    message: String,
    required: RwLock<Vec<Arc<dyn Rule<T>>>>,
}

impl<T> RequiredRulesExecuted<T>
where
    T: Send + Sync + 'static,
{
    /// Create the meta-rule reporting `message` on `object_property`.
    pub fn new(object_property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: RuleState::untriggered().with_order(RuleOrder::LAST),
            object_property: object_property.into(),
            message: message.into(),
            required: RwLock::new(Vec::new()),
        }
    }

    /// Property the object-level message is routed to.
    pub fn object_property(&self) -> &str {
        &self.object_property
    }

    /// Number of required rules watched.
    pub fn watched(&self) -> usize {
        self.required.read().len()
    }

    /// Names of watched rules that have not executed yet.
    pub fn pending(&self) -> Vec<String> {
        self.required
            .read()
            .iter()
            .filter(|rule| !rule.state().executed())
            .map(|rule| rule.name().to_owned())
            .collect()
    }

    /// Watch `rule` if it is a required-ness rule.
    ///
    /// Returns the triggers this call added to the meta-rule.
    pub(crate) fn adopt(&self, rule: &Arc<dyn Rule<T>>) -> Vec<TriggerProperty> {
        if !rule.kind().is_required() {
            return Vec::new();
        }

        {
            let mut required = self.required.write();
            if required.iter().any(|known| Arc::ptr_eq(known, rule)) {
                return Vec::new();
            }
            required.push(Arc::clone(rule));
        }

        rule.state()
            .triggers()
            .into_iter()
            .filter(|trigger| self.state.add_trigger(trigger.clone()))
            .collect()
    }
}

impl<T> std::fmt::Debug for RequiredRulesExecuted<T>
where
    T: Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequiredRulesExecuted")
            .field("object_property", &self.object_property)
            .field("watched", &self.required.read().len())
            .field("state", &self.state)
            .finish()
    }
}

#[async_trait]
impl<T> Rule<T> for RequiredRulesExecuted<T>
where
    T: Send + Sync + 'static,
{
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn name(&self) -> &str {
        "RequiredRulesExecuted"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Meta
    }

    fn is_async(&self) -> bool {
        false
    }

    async fn execute(&self, _target: &T, _token: &CancellationToken) -> RuleResult<RuleMessages> {
        let pending = self.pending();
        if !pending.is_empty() {
            tracing::trace!(?pending, "required rules have not executed yet");
        }
        Ok(RuleMessages::new().when(
            !pending.is_empty(),
            self.object_property.as_str(),
            self.message.as_str(),
        ))
    }
}
