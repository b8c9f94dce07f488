//! Host-side message store
//!
//! The engine never owns property state. It writes each rule's findings onto
//! the [`PropertyMessages`] store the target exposes through [`RuleTarget`],
//! keyed by property name and by the id of the rule that produced them. A
//! rule's previous messages are replaced, never accumulated, every time it
//! runs.

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::message::{RuleMessage, RuleMessages};
use crate::rule::RuleId;

/// An object rules can run against.
pub trait RuleTarget: Send + Sync + 'static {
    /// Store the engine writes rule messages to.
    fn messages(&self) -> &PropertyMessages;

    /// Returns `true` if no property holds a message.
    fn is_valid(&self) -> bool {
        self.messages().is_valid()
    }
}

/// Per-property message lists, in first-reported property order.
#[derive(Debug, Default)]
pub struct PropertyMessages {
    by_property: RwLock<IndexMap<String, Vec<RuleMessage>>>,
}

impl PropertyMessages {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything `rule_id` reported earlier with `messages`.
    ///
    /// Messages without text (or with only whitespace) are dropped.
    pub fn replace_rule_messages(&self, rule_id: RuleId, messages: &RuleMessages) {
        let mut by_property = self.by_property.write();
        for list in by_property.values_mut() {
            list.retain(|m| m.rule_id() != Some(rule_id));
        }
        for message in messages.errors() {
            by_property
                .entry(message.property().to_owned())
                .or_default()
                .push(message.clone());
        }
        by_property.retain(|_, list| !list.is_empty());
    }

    /// Messages currently held for `property`.
    pub fn messages_for(&self, property: &str) -> Vec<RuleMessage> {
        self.by_property
            .read()
            .get(property)
            .cloned()
            .unwrap_or_default()
    }

    /// Message texts currently held for `property`.
    pub fn texts_for(&self, property: &str) -> Vec<String> {
        self.by_property
            .read()
            .get(property)
            .map(|list| {
                list.iter()
                    .filter_map(RuleMessage::message)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Properties that currently hold at least one message.
    pub fn properties_with_messages(&self) -> Vec<String> {
        self.by_property.read().keys().cloned().collect()
    }

    /// Every message held, grouped by property.
    pub fn all(&self) -> Vec<RuleMessage> {
        self.by_property
            .read()
            .values()
            .flat_map(|list| list.iter().cloned())
            .collect()
    }

    /// Returns `true` if `property` holds no message.
    pub fn is_property_valid(&self, property: &str) -> bool {
        !self.by_property.read().contains_key(property)
    }

    /// Returns `true` if no property holds a message.
    pub fn is_valid(&self) -> bool {
        self.by_property.read().is_empty()
    }

    /// Drop every message.
    pub fn clear(&self) {
        self.by_property.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stamped(rule: u32, messages: RuleMessages) -> RuleMessages {
        messages.stamped(RuleId::new(rule))
    }

    #[test]
    fn rerun_replaces_previous_messages() {
        let store = PropertyMessages::new();
        store.replace_rule_messages(
            RuleId::new(1),
            &stamped(1, RuleMessages::new().add("Name", "required")),
        );
        assert_eq!(store.texts_for("Name"), vec!["required".to_owned()]);

        store.replace_rule_messages(
            RuleId::new(1),
            &stamped(1, RuleMessages::new().add("Name", "too short")),
        );
        assert_eq!(store.texts_for("Name"), vec!["too short".to_owned()]);

        store.replace_rule_messages(RuleId::new(1), &RuleMessages::new());
        assert!(store.is_valid());
        assert!(store.properties_with_messages().is_empty());
    }

    #[test]
    fn rules_do_not_clobber_each_other() {
        let store = PropertyMessages::new();
        store.replace_rule_messages(
            RuleId::new(1),
            &stamped(1, RuleMessages::new().add("Name", "required")),
        );
        store.replace_rule_messages(
            RuleId::new(2),
            &stamped(2, RuleMessages::new().add("Name", "taken")),
        );
        assert_eq!(store.messages_for("Name").len(), 2);

        store.replace_rule_messages(RuleId::new(1), &RuleMessages::new());
        assert_eq!(store.texts_for("Name"), vec!["taken".to_owned()]);
        assert!(!store.is_property_valid("Name"));
        assert!(store.is_property_valid("Email"));
    }

    #[test]
    fn blank_messages_are_not_stored() {
        let store = PropertyMessages::new();
        store.replace_rule_messages(
            RuleId::new(1),
            &stamped(
                1,
                RuleMessages::new()
                    .add("Name", "  ")
                    .add("Email", ""),
            ),
        );
        assert!(store.is_valid());
    }

    #[test]
    fn messages_may_target_other_properties() {
        let store = PropertyMessages::new();
        store.replace_rule_messages(
            RuleId::new(4),
            &stamped(
                4,
                RuleMessages::new()
                    .add("Start", "must precede end")
                    .add("End", "must follow start"),
            ),
        );
        assert_eq!(
            store.properties_with_messages(),
            vec!["Start".to_owned(), "End".to_owned()]
        );
        assert_eq!(store.all().len(), 2);
        store.clear();
        assert!(store.is_valid());
    }
}
