//! Closure-backed rule variants

use std::borrow::Cow;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::{Rule, RuleKind, RuleOrder, RuleState};
use crate::error::RuleResult;
use crate::message::RuleMessages;
use crate::trigger::TriggerProperty;

type SyncBody<T, R> = Box<dyn Fn(&T) -> R + Send + Sync>;
type AsyncBody<T, R> =
    Box<dyn for<'a> Fn(&'a T, &'a CancellationToken) -> BoxFuture<'a, RuleResult<R>> + Send + Sync>;

macro_rules! closure_rule_builders {
    ($ty:ident) => {
        impl<T> $ty<T> {
            /// Set the execution order.
            pub fn with_order(mut self, order: impl Into<RuleOrder>) -> Self {
                self.state.order = order.into();
                self
            }

            /// Set the name used in logs and errors.
            pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
                self.name = name.into();
                self
            }
        }

        impl<T> std::fmt::Debug for $ty<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("name", &self.name)
                    .field("state", &self.state)
                    .finish_non_exhaustive()
            }
        }
    };
}

/// Synchronous rule that reports errors.
///
/// ```
/// use nebula_rules::{RuleMessages, ValidationRule};
///
/// struct Person { first: String, last: String }
///
/// let rule = ValidationRule::new(["First", "Last"], |p: &Person| {
///     RuleMessages::new().when(p.first == p.last, "Last", "Last name must differ from first name")
/// });
/// ```
pub struct ValidationRule<T> {
    state: RuleState,
    name: Cow<'static, str>,
    body: SyncBody<T, RuleMessages>,
}

impl<T> ValidationRule<T> {
    /// Create a rule triggered by `triggers`.
    pub fn new<I, F>(triggers: I, body: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TriggerProperty>,
        F: Fn(&T) -> RuleMessages + Send + Sync + 'static,
    {
        Self {
            state: RuleState::new(triggers),
            name: Cow::Borrowed("ValidationRule"),
            body: Box::new(body),
        }
    }
}

closure_rule_builders!(ValidationRule);

#[async_trait]
impl<T> Rule<T> for ValidationRule<T>
where
    T: Send + Sync + 'static,
{
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        false
    }

    async fn execute(&self, target: &T, _token: &CancellationToken) -> RuleResult<RuleMessages> {
        Ok((self.body)(target))
    }
}

/// Synchronous rule that performs a side effect, typically a derived value.
///
/// Always produces an empty result.
pub struct ActionRule<T> {
    state: RuleState,
    name: Cow<'static, str>,
    body: SyncBody<T, ()>,
}

impl<T> ActionRule<T> {
    /// Create an action triggered by `triggers`.
    ///
    /// Pass an empty trigger list for an action that only runs when invoked
    /// explicitly.
    pub fn new<I, F>(triggers: I, body: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TriggerProperty>,
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            state: RuleState::new(triggers),
            name: Cow::Borrowed("ActionRule"),
            body: Box::new(body),
        }
    }
}

closure_rule_builders!(ActionRule);

#[async_trait]
impl<T> Rule<T> for ActionRule<T>
where
    T: Send + Sync + 'static,
{
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Action
    }

    fn is_async(&self) -> bool {
        false
    }

    async fn execute(&self, target: &T, _token: &CancellationToken) -> RuleResult<RuleMessages> {
        (self.body)(target);
        Ok(RuleMessages::new())
    }
}

/// Asynchronous rule that reports errors.
///
/// The body receives the cancellation token and may poll it at its own
/// suspension points.
///
/// ```
/// use futures::FutureExt;
/// use nebula_rules::{AsyncValidationRule, RuleMessages};
///
/// struct Account { login: String }
///
/// let rule = AsyncValidationRule::new(["Login"], |account: &Account, _token| {
///     async move {
///         let taken = account.login == "admin";
///         Ok(RuleMessages::new().when(taken, "Login", "Login is already taken"))
///     }
///     .boxed()
/// });
/// ```
pub struct AsyncValidationRule<T> {
    state: RuleState,
    name: Cow<'static, str>,
    body: AsyncBody<T, RuleMessages>,
}

impl<T> AsyncValidationRule<T> {
    /// Create a rule triggered by `triggers`.
    pub fn new<I, F>(triggers: I, body: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TriggerProperty>,
        F: for<'a> Fn(&'a T, &'a CancellationToken) -> BoxFuture<'a, RuleResult<RuleMessages>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            state: RuleState::new(triggers),
            name: Cow::Borrowed("AsyncValidationRule"),
            body: Box::new(body),
        }
    }
}

closure_rule_builders!(AsyncValidationRule);

#[async_trait]
impl<T> Rule<T> for AsyncValidationRule<T>
where
    T: Send + Sync + 'static,
{
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, target: &T, token: &CancellationToken) -> RuleResult<RuleMessages> {
        (self.body)(target, token).await
    }
}

/// Asynchronous rule that performs a side effect.
///
/// Always produces an empty result.
pub struct AsyncActionRule<T> {
    state: RuleState,
    name: Cow<'static, str>,
    body: AsyncBody<T, ()>,
}

impl<T> AsyncActionRule<T> {
    /// Create an action triggered by `triggers`.
    pub fn new<I, F>(triggers: I, body: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TriggerProperty>,
        F: for<'a> Fn(&'a T, &'a CancellationToken) -> BoxFuture<'a, RuleResult<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            state: RuleState::new(triggers),
            name: Cow::Borrowed("AsyncActionRule"),
            body: Box::new(body),
        }
    }
}

closure_rule_builders!(AsyncActionRule);

#[async_trait]
impl<T> Rule<T> for AsyncActionRule<T>
where
    T: Send + Sync + 'static,
{
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Action
    }

    async fn execute(&self, target: &T, token: &CancellationToken) -> RuleResult<RuleMessages> {
        (self.body)(target, token).await?;
        Ok(RuleMessages::new())
    }
}
