//! Rule trait and bookkeeping
//!
//! Every rule variant implements the single capability trait [`Rule`]: it
//! owns a [`RuleState`] (id, triggers, order, executed flag, last messages)
//! and an async [`execute`](Rule::execute) body that inspects the target and
//! returns [`RuleMessages`].
//!
//! The variants shipped with the crate are thin adapters over that trait:
//!
//! - [`ValidationRule`] / [`ActionRule`]: synchronous closures
//! - [`AsyncValidationRule`] / [`AsyncActionRule`]: closures returning a
//!   boxed future, handed the cancellation token
//! - [`ConstraintRule`]: a declarative constraint bound to one property
//! - [`RequiredRulesExecuted`]: the meta-rule installed by the manager
//!
//! Rules that need their own state (a remote lookup client, a cache)
//! implement [`Rule`] directly.

mod closure;
mod constraint;
mod required_executed;

use std::any::Any;
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use downcast_rs::DowncastSync;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tokio_util::sync::CancellationToken;

use crate::error::{RuleError, RuleResult};
use crate::message::RuleMessages;
use crate::trigger::TriggerProperty;

pub use closure::{ActionRule, AsyncActionRule, AsyncValidationRule, ValidationRule};
pub use constraint::{
    Constraint, ConstraintRule, Email, IsMissing, Length, Measure, Pattern, Range, Required,
};
pub use required_executed::RequiredRulesExecuted;

/// Identifier assigned to a rule the first time it is added to a manager.
///
/// Ids grow monotonically and break ties between rules of equal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(u32);

impl RuleId {
    /// Create an id from its raw value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw value.
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Execution order of a rule (lower values run earlier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleOrder(i32);

impl RuleOrder {
    /// Runs before everything else.
    pub const FIRST: Self = Self(i32::MIN);
    /// Order given to rules that do not ask for one.
    pub const DEFAULT: Self = Self(1);
    /// Runs after everything else.
    pub const LAST: Self = Self(i32::MAX);

    /// Create a custom order.
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Order value.
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for RuleOrder {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i32> for RuleOrder {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Kind of constraint a [`ConstraintRule`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Value must be present.
    Required,
    /// Value must fall within inclusive bounds.
    Range,
    /// Length must fall within bounds.
    Length,
    /// String must match a regular expression.
    Pattern,
    /// String must look like an e-mail address.
    Email,
}

/// What a rule is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Reports errors.
    Validation,
    /// Performs side effects (derived values); reports nothing.
    Action,
    /// Declarative constraint bound to one property.
    Constraint(ConstraintKind),
    /// Inspects other rules rather than domain data.
    Meta,
}

impl RuleKind {
    /// Returns `true` for required-ness constraint rules.
    pub fn is_required(self) -> bool {
        self == Self::Constraint(ConstraintKind::Required)
    }
}

/// Bookkeeping shared by every rule.
///
/// Interior mutability keeps rules shareable behind `Arc` while the manager
/// records execution results through `&self`.
#[derive(Debug)]
pub struct RuleState {
    id: OnceLock<RuleId>,
    triggers: RwLock<SmallVec<[TriggerProperty; 2]>>,
    order: RuleOrder,
    executed: AtomicBool,
    messages: Mutex<RuleMessages>,
}

impl RuleState {
    /// Create state for a rule triggered by `triggers`, with the default order.
    pub fn new<I>(triggers: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TriggerProperty>,
    {
        let mut unique: SmallVec<[TriggerProperty; 2]> = SmallVec::new();
        for trigger in triggers {
            let trigger = trigger.into();
            if !unique.contains(&trigger) {
                unique.push(trigger);
            }
        }
        Self {
            id: OnceLock::new(),
            triggers: RwLock::new(unique),
            order: RuleOrder::DEFAULT,
            executed: AtomicBool::new(false),
            messages: Mutex::new(RuleMessages::new()),
        }
    }

    /// State for a rule with no triggers; it only runs when invoked explicitly.
    pub fn untriggered() -> Self {
        Self::new(std::iter::empty::<TriggerProperty>())
    }

    /// Set the execution order.
    pub fn with_order(mut self, order: impl Into<RuleOrder>) -> Self {
        self.order = order.into();
        self
    }

    /// Id assigned by the first manager the rule was added to.
    pub fn id(&self) -> Option<RuleId> {
        self.id.get().copied()
    }

    /// Execution order.
    pub fn order(&self) -> RuleOrder {
        self.order
    }

    /// Snapshot of the trigger properties.
    pub fn triggers(&self) -> Vec<TriggerProperty> {
        self.triggers.read().to_vec()
    }

    /// Returns `true` if one of the triggers is exactly `path`.
    pub fn has_trigger(&self, path: &str) -> bool {
        self.triggers.read().iter().any(|t| t.is_match(path))
    }

    /// Returns `true` once the rule has completed at least one run.
    pub fn executed(&self) -> bool {
        self.executed.load(Ordering::Acquire)
    }

    /// Messages returned by the most recent completed run.
    pub fn messages(&self) -> RuleMessages {
        self.messages.lock().clone()
    }

    /// Returns `true` if the most recent completed run reported an error.
    ///
    /// Entries without text, or with only whitespace, do not count.
    pub fn has_messages(&self) -> bool {
        self.messages.lock().has_errors()
    }

    /// Assign `candidate` unless an id is already set; returns the id in effect.
    pub(crate) fn assign_id(&self, candidate: RuleId) -> RuleId {
        *self.id.get_or_init(|| candidate)
    }

    /// Add a trigger; returns `false` if it was already present.
    pub(crate) fn add_trigger(&self, trigger: TriggerProperty) -> bool {
        let mut triggers = self.triggers.write();
        if triggers.contains(&trigger) {
            return false;
        }
        triggers.push(trigger);
        true
    }

    fn complete(&self, messages: RuleMessages) {
        *self.messages.lock() = messages;
        self.executed.store(true, Ordering::Release);
    }
}

/// A unit of validation or side-effect logic bound to trigger properties.
///
/// `T` is the target the rule inspects. Rules receive it as a shared
/// reference; state a rule writes lives behind interior mutability on the
/// target.
///
/// # Examples
///
/// ```rust,ignore
/// struct UniqueName { client: LookupClient, state: RuleState }
///
/// #[async_trait]
/// impl Rule<Person> for UniqueName {
///     fn state(&self) -> &RuleState { &self.state }
///
///     async fn execute(&self, person: &Person, token: &CancellationToken)
///         -> RuleResult<RuleMessages>
///     {
///         let name = person.name();
///         let taken = tokio::select! {
///             taken = self.client.exists(&name) => taken.map_err(RuleError::failed)?,
///             () = token.cancelled() => return Err(RuleError::Cancelled),
///         };
///         Ok(RuleMessages::new().when(taken, "Name", "Name is already in use"))
///     }
/// }
/// ```
#[async_trait]
pub trait Rule<T>: DowncastSync
where
    T: Send + Sync,
{
    /// Shared bookkeeping for this rule.
    fn state(&self) -> &RuleState;

    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// What the rule is for.
    fn kind(&self) -> RuleKind {
        RuleKind::Validation
    }

    /// Returns `true` if the body may suspend.
    fn is_async(&self) -> bool {
        true
    }

    /// Rule body.
    async fn execute(&self, target: &T, token: &CancellationToken) -> RuleResult<RuleMessages>;

    /// Run the rule once and record the outcome.
    ///
    /// Fails with [`RuleError::Cancelled`] before the body runs if `token`
    /// is already cancelled. On success the messages are stamped with the
    /// rule's id, stored on the rule, and the rule is marked executed. An
    /// error from the body is returned unchanged and leaves the rule's
    /// recorded state as it was.
    async fn run_rule(&self, target: &T, token: &CancellationToken) -> RuleResult<RuleMessages> {
        if token.is_cancelled() {
            return Err(RuleError::Cancelled);
        }

        let messages = self.execute(target, token).await?;
        let state = self.state();
        let messages = match state.id() {
            Some(id) => messages.stamped(id),
            None => messages,
        };
        state.complete(messages.clone());
        Ok(messages)
    }
}

/// Run `rule` against a type-erased target.
///
/// Fails with [`RuleError::InvalidTargetType`] when `target` is not a `T`.
pub async fn run_rule_any<T>(
    rule: &dyn Rule<T>,
    target: &(dyn Any + Send + Sync),
    token: &CancellationToken,
) -> RuleResult<RuleMessages>
where
    T: Send + Sync + 'static,
{
    let target = target
        .downcast_ref::<T>()
        .ok_or_else(RuleError::invalid_target::<T>)?;
    rule.run_rule(target, token).await
}
