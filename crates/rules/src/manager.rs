//! Rule manager
//!
//! A [`RuleManager`] owns every rule registered for one target instance. It
//! indexes rules by trigger property, selects them per property path or per
//! [`RunRulesFlags`], runs the selection one rule at a time in ascending
//! `(order, id)` order, and writes each rule's result onto the target's
//! [`PropertyMessages`](crate::PropertyMessages). Among rules of equal order,
//! meta-rules run after every other rule.
//!
//! # Cancellation
//!
//! The token is checked before the first rule of a pass. Every rule checks it
//! again before its body starts, so a cancellation requested mid-pass stops
//! the remaining rules. A rule already running is only interrupted if its own
//! body watches the token.
//!
//! # Concurrency
//!
//! Rules of one pass never run concurrently. The manager does not serialize
//! overlapping passes against the same target; see
//! [`RuleHost`](crate::RuleHost) for a host that does.

use std::sync::Arc;

use downcast_rs::{Downcast, DowncastSync};
use indexmap::IndexMap;
use smallvec::SmallVec;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ManagerConfig;
use crate::error::{RuleError, RuleResult};
use crate::flags::RunRulesFlags;
use crate::rule::{RequiredRulesExecuted, Rule, RuleId, RuleKind};
use crate::target::RuleTarget;
use crate::trigger::TriggerProperty;

type RuleRef<T> = Arc<dyn Rule<T>>;

/// Owns, indexes and runs the rules of one target.
pub struct RuleManager<T>
where
    T: Send + Sync,
{
    config: ManagerConfig,
    rules: Vec<RuleRef<T>>,
    by_trigger: IndexMap<String, SmallVec<[usize; 4]>>,
    next_rule_id: u32,
    required_check: Option<Arc<RequiredRulesExecuted<T>>>,
}

impl<T> RuleManager<T>
where
    T: RuleTarget,
{
    /// Create a manager with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Create a manager with `config`.
    pub fn with_config(config: ManagerConfig) -> Self {
        let install = config.required_rules_check;
        let mut manager = Self {
            config,
            rules: Vec::new(),
            by_trigger: IndexMap::new(),
            next_rule_id: 1,
            required_check: None,
        };
        if install {
            manager.install_required_rules_check();
        }
        manager
    }

    /// Configuration the manager was created with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Install the required-rules meta-rule if it is not installed yet.
    ///
    /// The meta-rule adopts every required rule already registered, and every
    /// one registered afterwards.
    pub fn install_required_rules_check(&mut self) -> Arc<RequiredRulesExecuted<T>> {
        if let Some(meta) = &self.required_check {
            return Arc::clone(meta);
        }

        let meta = Arc::new(RequiredRulesExecuted::new(
            self.config.object_property.clone(),
            self.config.not_evaluated_message.clone(),
        ));
        for rule in &self.rules {
            meta.adopt(rule);
        }
        self.register(Arc::clone(&meta) as RuleRef<T>);
        self.required_check = Some(Arc::clone(&meta));
        meta
    }

    /// The installed required-rules meta-rule, if any.
    pub fn required_check(&self) -> Option<&Arc<RequiredRulesExecuted<T>>> {
        self.required_check.as_ref()
    }

    /// Register `rule` and return its id.
    ///
    /// A rule keeps the id it got from the first manager it was added to.
    /// Adding a rule that is already registered here does nothing.
    pub fn add_rule(&mut self, rule: RuleRef<T>) -> RuleId {
        if let Some(id) = self.registered_id(rule.as_ref()) {
            debug!(rule = rule.name(), rule_id = %id, "rule already registered");
            return id;
        }

        let id = self.register(Arc::clone(&rule));

        if let Some(meta) = self.required_check.clone() {
            let adopted = meta.adopt(&rule);
            if !adopted.is_empty() {
                if let Some(position) = self.position_of(meta.as_ref()) {
                    for trigger in &adopted {
                        self.index(trigger, position);
                    }
                }
                trace!(triggers = ?adopted, "required-rules check adopted triggers");
            }
        }

        id
    }

    /// Register `rule` and return a typed handle to it.
    pub fn add<R>(&mut self, rule: R) -> Arc<R>
    where
        R: Rule<T>,
    {
        let rule = Arc::new(rule);
        self.add_rule(Arc::clone(&rule) as RuleRef<T>);
        rule
    }

    /// Register several rules in order.
    pub fn add_rules<I>(&mut self, rules: I)
    where
        I: IntoIterator<Item = RuleRef<T>>,
    {
        for rule in rules {
            self.add_rule(rule);
        }
    }

    /// Registered rules in insertion order.
    pub fn rules(&self) -> &[RuleRef<T>] {
        &self.rules
    }

    /// Number of registered rules, the meta-rule included.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns `true` if `rule` is registered with this manager.
    pub fn contains(&self, rule: &dyn Rule<T>) -> bool {
        self.position_of(rule).is_some()
    }

    /// Property paths at least one rule is triggered by.
    pub fn trigger_properties(&self) -> impl Iterator<Item = &str> {
        self.by_trigger.keys().map(String::as_str)
    }

    /// Rules triggered by `property`, in execution order.
    pub fn rules_for(&self, property: &str) -> Vec<RuleRef<T>> {
        let mut selected: Vec<_> = self
            .by_trigger
            .get(property)
            .into_iter()
            .flatten()
            .map(|&position| Arc::clone(&self.rules[position]))
            .collect();
        sort_for_execution(&mut selected);
        selected
    }

    /// Registered rules of concrete type `R`.
    pub fn rules_of<R>(&self) -> Vec<Arc<R>>
    where
        R: Rule<T>,
    {
        self.rules
            .iter()
            .filter_map(|rule| DowncastSync::into_any_arc(Arc::clone(rule)).downcast::<R>().ok())
            .collect()
    }

    /// Run every rule triggered by `property`.
    #[tracing::instrument(skip_all, fields(property = %property))]
    pub async fn run_property(
        &self,
        target: &T,
        property: &str,
        token: &CancellationToken,
    ) -> RuleResult<()> {
        ensure_not_cancelled(token)?;
        let batch = self.rules_for(property);
        trace!(count = batch.len(), "selected rules by trigger");
        self.run_batch(target, batch, token).await
    }

    /// Run every rule selected by `flags`.
    #[tracing::instrument(skip_all, fields(flags = ?flags))]
    pub async fn run_rules(
        &self,
        target: &T,
        flags: RunRulesFlags,
        token: &CancellationToken,
    ) -> RuleResult<()> {
        ensure_not_cancelled(token)?;
        let mut batch: Vec<_> = self
            .rules
            .iter()
            .filter(|rule| flags.selects(rule.state()))
            .cloned()
            .collect();
        sort_for_execution(&mut batch);
        trace!(count = batch.len(), "selected rules by flags");
        self.run_batch(target, batch, token).await
    }

    /// Run one registered rule.
    ///
    /// Fails with [`RuleError::RuleNotAdded`] if `rule` was not added to this
    /// manager.
    pub async fn run_rule(
        &self,
        target: &T,
        rule: &dyn Rule<T>,
        token: &CancellationToken,
    ) -> RuleResult<()> {
        if !self.contains(rule) {
            return Err(RuleError::not_added(rule.name()));
        }
        ensure_not_cancelled(token)?;
        self.execute(target, rule, token).await
    }

    /// Run every registered rule of concrete type `R`.
    pub async fn run_rules_of<R>(&self, target: &T, token: &CancellationToken) -> RuleResult<()>
    where
        R: Rule<T>,
    {
        ensure_not_cancelled(token)?;
        let mut batch: Vec<_> = self
            .rules
            .iter()
            .filter(|rule| Downcast::as_any(&***rule).is::<R>())
            .cloned()
            .collect();
        sort_for_execution(&mut batch);
        self.run_batch(target, batch, token).await
    }

    async fn run_batch(
        &self,
        target: &T,
        batch: Vec<RuleRef<T>>,
        token: &CancellationToken,
    ) -> RuleResult<()> {
        for rule in batch {
            self.execute(target, rule.as_ref(), token).await?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        target: &T,
        rule: &dyn Rule<T>,
        token: &CancellationToken,
    ) -> RuleResult<()> {
        let state = rule.state();
        debug!(
            rule = rule.name(),
            rule_id = ?state.id(),
            order = state.order().value(),
            is_async = rule.is_async(),
            "running rule"
        );

        match rule.run_rule(target, token).await {
            Ok(messages) => {
                if let Some(id) = state.id() {
                    target.messages().replace_rule_messages(id, &messages);
                }
                trace!(rule = rule.name(), messages = messages.len(), "rule completed");
                Ok(())
            }
            Err(err) if err.is_cancelled() => {
                debug!(rule = rule.name(), "rule skipped, pass cancelled");
                Err(err)
            }
            Err(err) => {
                warn!(rule = rule.name(), error = %err, "rule body failed");
                Err(err)
            }
        }
    }

    fn register(&mut self, rule: RuleRef<T>) -> RuleId {
        let candidate = RuleId::new(self.next_rule_id);
        let id = rule.state().assign_id(candidate);
        self.next_rule_id = self.next_rule_id.max(id.value().saturating_add(1));

        let position = self.rules.len();
        for trigger in rule.state().triggers() {
            self.index(&trigger, position);
        }
        debug!(
            rule = rule.name(),
            rule_id = %id,
            order = rule.state().order().value(),
            "rule registered"
        );
        self.rules.push(rule);
        id
    }

    fn index(&mut self, trigger: &TriggerProperty, position: usize) {
        let positions = self
            .by_trigger
            .entry(trigger.property_name().to_owned())
            .or_default();
        if !positions.contains(&position) {
            positions.push(position);
        }
    }

    fn position_of(&self, rule: &dyn Rule<T>) -> Option<usize> {
        self.rules
            .iter()
            .position(|known| std::ptr::addr_eq(Arc::as_ptr(known), rule))
    }

    fn registered_id(&self, rule: &dyn Rule<T>) -> Option<RuleId> {
        self.position_of(rule).and_then(|_| rule.state().id())
    }
}

impl<T> Default for RuleManager<T>
where
    T: RuleTarget,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for RuleManager<T>
where
    T: Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleManager")
            .field("rules", &self.rules.len())
            .field("triggers", &self.by_trigger.len())
            .field("next_rule_id", &self.next_rule_id)
            .field("required_check", &self.required_check.is_some())
            .finish()
    }
}

fn ensure_not_cancelled(token: &CancellationToken) -> RuleResult<()> {
    if token.is_cancelled() {
        Err(RuleError::Cancelled)
    } else {
        Ok(())
    }
}

/// Ascending `(order, id)`, with meta-rules after every other rule of equal order.
fn sort_for_execution<T>(rules: &mut [RuleRef<T>])
where
    T: Send + Sync + 'static,
{
    rules.sort_by_key(|rule| {
        let state = rule.state();
        (state.order(), rule.kind() == RuleKind::Meta, state.id())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RuleMessages;
    use crate::rule::{ActionRule, ConstraintRule, Required, ValidationRule};
    use crate::target::PropertyMessages;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Contact {
        name: Mutex<String>,
        log: Mutex<Vec<&'static str>>,
        messages: PropertyMessages,
    }

    impl RuleTarget for Contact {
        fn messages(&self) -> &PropertyMessages {
            &self.messages
        }
    }

    fn recorder(trigger: &'static str, label: &'static str, order: i32) -> ActionRule<Contact> {
        ActionRule::new([trigger], move |c: &Contact| c.log.lock().push(label)).with_order(order)
    }

    #[test]
    fn ids_increase_in_insertion_order() {
        let mut manager = RuleManager::<Contact>::with_config(
            ManagerConfig::default().with_required_rules_check(false),
        );
        let a = manager.add(recorder("Name", "a", 1));
        let b = manager.add(recorder("Name", "b", 1));
        assert_eq!(a.state().id(), Some(RuleId::new(1)));
        assert_eq!(b.state().id(), Some(RuleId::new(2)));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn re_adding_is_a_no_op() {
        let mut manager = RuleManager::<Contact>::new();
        let rule: RuleRef<Contact> = Arc::new(recorder("Name", "a", 1));
        let first = manager.add_rule(Arc::clone(&rule));
        let second = manager.add_rule(rule);
        assert_eq!(first, second);
        assert_eq!(manager.rules_for("Name").len(), 1);
    }

    #[test]
    fn meta_rule_is_installed_by_default() {
        let manager = RuleManager::<Contact>::new();
        assert_eq!(manager.len(), 1);
        assert!(manager.required_check().is_some());
        assert_eq!(manager.rules_of::<RequiredRulesExecuted<Contact>>().len(), 1);
    }

    #[test]
    fn required_rules_added_later_are_adopted() {
        let mut manager = RuleManager::<Contact>::new();
        manager.add(ConstraintRule::new(
            "Name",
            |c: &Contact| c.name.lock().clone(),
            Required,
        ));

        let names: Vec<_> = manager
            .rules_for("Name")
            .iter()
            .map(|r| r.name().to_owned())
            .collect();
        assert_eq!(names, vec!["Required(Name)", "RequiredRulesExecuted"]);
    }

    #[test]
    fn install_scans_existing_rules() {
        let mut manager = RuleManager::<Contact>::with_config(
            ManagerConfig::default().with_required_rules_check(false),
        );
        manager.add(ConstraintRule::new(
            "Name",
            |c: &Contact| c.name.lock().clone(),
            Required,
        ));
        let meta = manager.install_required_rules_check();
        assert_eq!(meta.watched(), 1);
        assert!(meta.state().has_trigger("Name"));
        assert_eq!(manager.rules_for("Name").len(), 2);
    }

    #[tokio::test]
    async fn run_property_writes_messages() {
        let mut manager = RuleManager::<Contact>::new();
        manager.add(ValidationRule::new(["Name"], |c: &Contact| {
            RuleMessages::new().when(c.name.lock().len() < 2, "Name", "Name is too short")
        }));
        let contact = Contact::default();
        *contact.name.lock() = "A".into();

        manager
            .run_property(&contact, "Name", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(contact.messages.texts_for("Name"), vec!["Name is too short"]);

        *contact.name.lock() = "Ada".into();
        manager
            .run_property(&contact, "Name", &CancellationToken::new())
            .await
            .unwrap();
        assert!(contact.messages.is_valid());
    }

    #[tokio::test]
    async fn unknown_property_runs_nothing() {
        let mut manager = RuleManager::<Contact>::new();
        manager.add(recorder("Name", "a", 1));
        let contact = Contact::default();
        manager
            .run_property(&contact, "Nope", &CancellationToken::new())
            .await
            .unwrap();
        assert!(contact.log.lock().is_empty());
    }
}
