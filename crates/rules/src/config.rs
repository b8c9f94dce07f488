//! Rule manager configuration

use serde::{Deserialize, Serialize};

/// Property that object-level messages are routed to by default.
pub const DEFAULT_OBJECT_PROPERTY: &str = "ObjectInvalid";

/// Message the required-rules meta-rule reports by default.
pub const DEFAULT_NOT_EVALUATED_MESSAGE: &str = "Required properties have not been evaluated.";

/// Configuration for a [`RuleManager`](crate::RuleManager).
///
/// Missing fields fall back to their defaults when deserializing.
///
/// ```
/// use nebula_rules::ManagerConfig;
///
/// let config = ManagerConfig::from_json(r#"{ "object_property": "Person" }"#).unwrap();
/// assert!(config.required_rules_check);
/// assert_eq!(config.object_property, "Person");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Install the [`RequiredRulesExecuted`](crate::RequiredRulesExecuted)
    /// meta-rule when the manager is created.
    pub required_rules_check: bool,
    /// Property object-level messages are routed to.
    pub object_property: String,
    /// Message reported while required rules have not executed.
    pub not_evaluated_message: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            required_rules_check: true,
            object_property: DEFAULT_OBJECT_PROPERTY.to_owned(),
            not_evaluated_message: DEFAULT_NOT_EVALUATED_MESSAGE.to_owned(),
        }
    }
}

impl ManagerConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Enable or disable the required-rules meta-rule.
    pub fn with_required_rules_check(mut self, enabled: bool) -> Self {
        self.required_rules_check = enabled;
        self
    }

    /// Route object-level messages to `property`.
    pub fn with_object_property(mut self, property: impl Into<String>) -> Self {
        self.object_property = property.into();
        self
    }

    /// Set the message reported while required rules have not executed.
    pub fn with_not_evaluated_message(mut self, message: impl Into<String>) -> Self {
        self.not_evaluated_message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_json_gives_defaults() {
        assert_eq!(ManagerConfig::from_json("{}").unwrap(), ManagerConfig::default());
    }

    #[test]
    fn builder_overrides() {
        let config = ManagerConfig::default()
            .with_required_rules_check(false)
            .with_object_property("Order")
            .with_not_evaluated_message("not checked yet");
        assert!(!config.required_rules_check);
        assert_eq!(config.object_property, "Order");
        assert_eq!(config.not_evaluated_message, "not checked yet");
    }

    #[test]
    fn round_trips_through_json() {
        let config = ManagerConfig::default().with_object_property("Order");
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ManagerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(ManagerConfig::from_json(r#"{ "required_rules_check": "yes" }"#).is_err());
    }
}
