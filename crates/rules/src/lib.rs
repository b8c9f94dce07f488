//! # Nebula Rules
//!
//! Property-triggered business rules for in-memory objects.
//!
//! Rules are registered with a [`RuleManager`] and bound to the property
//! paths they depend on. When a property changes, the manager runs every
//! rule triggered by that path, one at a time, ordered by [`RuleOrder`] and
//! then by registration id. Each rule's findings replace whatever it
//! reported earlier on the target's [`PropertyMessages`] store, so the
//! object's validity is always the union of the latest findings.
//!
//! ## Features
//!
//! - **Closure rules**: sync and async validation or action rules built from
//!   closures
//! - **Constraint rules**: declarative `Required`, `Range`, `Length`,
//!   `Pattern` and `Email` checks bound to one property
//! - **Selection flags**: re-run rules by executed state or by whether they
//!   last reported messages
//! - **Required-rules check**: an object stays invalid until every
//!   required-ness rule has run at least once
//! - **Cancellation**: every pass honors a [`CancellationToken`]
//!
//! ## Quick Start
//!
//! ```rust
//! use nebula_rules::prelude::*;
//! use parking_lot::Mutex;
//!
//! #[derive(Default)]
//! struct Person {
//!     name: Mutex<String>,
//!     messages: PropertyMessages,
//! }
//!
//! impl RuleTarget for Person {
//!     fn messages(&self) -> &PropertyMessages {
//!         &self.messages
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), RuleError> {
//! let mut manager = RuleManager::<Person>::new();
//! manager.add(ConstraintRule::new("Name", |p: &Person| p.name.lock().clone(), Required));
//! manager.add(ConstraintRule::new(
//!     "Name",
//!     |p: &Person| Some(p.name.lock().clone()),
//!     Length::max(10),
//! ));
//!
//! let person = Person::default();
//! let token = CancellationToken::new();
//!
//! manager.run_rules(&person, RunRulesFlags::ALL, &token).await?;
//! assert!(!person.is_valid());
//!
//! *person.name.lock() = "Ada".into();
//! manager.run_property(&person, "Name", &token).await?;
//! assert!(person.is_valid());
//! # Ok(())
//! # }
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

#![deny(unsafe_code)]

mod config;
mod error;
mod flags;
mod host;
mod manager;
mod message;
pub mod rule;
mod target;
mod trigger;

pub use config::{DEFAULT_NOT_EVALUATED_MESSAGE, DEFAULT_OBJECT_PROPERTY, ManagerConfig};
pub use error::{BoxError, RuleError, RuleResult};
pub use flags::RunRulesFlags;
pub use host::RuleHost;
pub use manager::RuleManager;
pub use message::{RuleMessage, RuleMessages};
pub use rule::{
    ActionRule, AsyncActionRule, AsyncValidationRule, Constraint, ConstraintKind, ConstraintRule,
    Email, IsMissing, Length, Measure, Pattern, Range, Required, RequiredRulesExecuted, Rule,
    RuleId, RuleKind, RuleOrder, RuleState, ValidationRule, run_rule_any,
};
pub use target::{PropertyMessages, RuleTarget};
pub use trigger::{PATH_SEPARATOR, TriggerProperty};

// Re-export so rule implementors need not depend on these directly.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::rule::{
        ActionRule, AsyncActionRule, AsyncValidationRule, ConstraintRule, Email, Length, Pattern,
        Range, Required, Rule, RuleOrder, RuleState, ValidationRule,
    };
    pub use crate::{
        CancellationToken, ManagerConfig, PropertyMessages, RuleError, RuleHost, RuleManager,
        RuleMessages, RuleResult, RuleTarget, RunRulesFlags, TriggerProperty, async_trait,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
