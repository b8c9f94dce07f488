//! Rule messages
//!
//! A rule run produces a [`RuleMessages`] list. Each [`RuleMessage`] names
//! the property it belongs to and, optionally, an error text. A message whose
//! text is `None` or only whitespace means "no error" and is never stored on
//! the target.
//!
//! # Conditional builders
//!
//! ```
//! use nebula_rules::RuleMessages;
//!
//! let name = "";
//! let messages = RuleMessages::new()
//!     .when(name.is_empty(), "Name", "Name is required")
//!     .else_when(|| name.len() < 3, "Name", "Name is too short");
//!
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].message(), Some("Name is required"));
//! ```

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::rule::RuleId;

/// One finding of a rule run, routed to a property by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMessage {
    property: String,
    message: Option<String>,
    rule_id: Option<RuleId>,
}

impl RuleMessage {
    /// Create a message for `property`.
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: Some(message.into()),
            rule_id: None,
        }
    }

    /// Create an entry for `property` that carries no error.
    pub fn clear(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: None,
            rule_id: None,
        }
    }

    /// Property the message is routed to.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Message text, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Id of the rule that produced this message.
    ///
    /// `None` until the message has been returned from a rule run.
    pub fn rule_id(&self) -> Option<RuleId> {
        self.rule_id
    }

    /// Returns `true` if the message carries non-blank text.
    pub fn is_error(&self) -> bool {
        self.message
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    pub(crate) fn with_rule_id(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }
}

/// Ordered, duplicate-tolerant list of messages produced by one rule run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleMessages {
    items: Vec<RuleMessage>,
}

impl RuleMessages {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list with room for `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append a message and return the list.
    pub fn add(mut self, property: impl Into<String>, message: impl Into<String>) -> Self {
        self.items.push(RuleMessage::new(property, message));
        self
    }

    /// Append a message.
    pub fn push(&mut self, message: RuleMessage) {
        self.items.push(message);
    }

    /// Append a message when `condition` is `true`.
    ///
    /// The condition is always evaluated by the caller, regardless of what
    /// the list already holds.
    pub fn when(
        mut self,
        condition: bool,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        if condition {
            self.items.push(RuleMessage::new(property, message));
        }
        self
    }

    /// Append a message when the list is still empty and `condition` holds.
    ///
    /// `condition` is not called once any earlier branch has added a
    /// message, so the first matching branch wins.
    pub fn else_when<F>(
        mut self,
        condition: F,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self
    where
        F: FnOnce() -> bool,
    {
        if self.items.is_empty() && condition() {
            self.items.push(RuleMessage::new(property, message));
        }
        self
    }

    /// Messages carrying non-blank text.
    pub fn errors(&self) -> impl Iterator<Item = &RuleMessage> {
        self.items.iter().filter(|m| m.is_error())
    }

    /// Returns `true` if at least one message carries non-blank text.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(RuleMessage::is_error)
    }

    /// Messages routed to `property`.
    pub fn for_property<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a RuleMessage> {
        self.items.iter().filter(move |m| m.property == property)
    }

    /// Consume the list, returning the underlying vector.
    pub fn into_vec(self) -> Vec<RuleMessage> {
        self.items
    }

    pub(crate) fn stamped(self, rule_id: RuleId) -> Self {
        self.items
            .into_iter()
            .map(|m| m.with_rule_id(rule_id))
            .collect()
    }
}

impl Deref for RuleMessages {
    type Target = [RuleMessage];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl From<Vec<RuleMessage>> for RuleMessages {
    fn from(items: Vec<RuleMessage>) -> Self {
        Self { items }
    }
}

impl From<RuleMessage> for RuleMessages {
    fn from(message: RuleMessage) -> Self {
        Self {
            items: vec![message],
        }
    }
}

impl FromIterator<RuleMessage> for RuleMessages {
    fn from_iter<I: IntoIterator<Item = RuleMessage>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl Extend<RuleMessage> for RuleMessages {
    fn extend<I: IntoIterator<Item = RuleMessage>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl IntoIterator for RuleMessages {
    type Item = RuleMessage;
    type IntoIter = std::vec::IntoIter<RuleMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a RuleMessages {
    type Item = &'a RuleMessage;
    type IntoIter = std::slice::Iter<'a, RuleMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn else_when_is_skipped_after_a_match() {
        let evaluated = Cell::new(false);
        let messages = RuleMessages::new()
            .when(true, "Name", "required")
            .else_when(
                || {
                    evaluated.set(true);
                    true
                },
                "Name",
                "too short",
            );

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message(), Some("required"));
        assert!(!evaluated.get());
    }

    #[test]
    fn else_when_chain_first_true_wins() {
        let messages = RuleMessages::new()
            .when(false, "Age", "missing")
            .else_when(|| false, "Age", "negative")
            .else_when(|| true, "Age", "too old")
            .else_when(|| true, "Age", "never reached");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message(), Some("too old"));
    }

    #[test]
    fn when_always_appends_on_true() {
        let messages = RuleMessages::new()
            .when(true, "A", "first")
            .when(true, "A", "first");
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn blank_messages_are_not_errors() {
        let messages = RuleMessages::new()
            .add("A", "   ")
            .add("B", "")
            .add("C", "broken");
        let mut with_clear = messages.clone();
        with_clear.push(RuleMessage::clear("D"));

        assert_eq!(with_clear.len(), 4);
        assert_eq!(with_clear.errors().count(), 1);
        assert!(with_clear.has_errors());
        assert!(!RuleMessages::new().add("A", "\t\n").has_errors());
    }

    #[test]
    fn stamped_sets_rule_id_on_every_message() {
        let messages = RuleMessages::new().add("A", "x").add("B", "y");
        let stamped = messages.stamped(RuleId::new(7));
        assert!(stamped.iter().all(|m| m.rule_id() == Some(RuleId::new(7))));
    }

    #[test]
    fn for_property_filters() {
        let messages = RuleMessages::new().add("A", "x").add("B", "y").add("A", "z");
        let texts: Vec<_> = messages
            .for_property("A")
            .filter_map(RuleMessage::message)
            .collect();
        assert_eq!(texts, vec!["x", "z"]);
    }
}
