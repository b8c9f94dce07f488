//! Owning host for one target and its rules
//!
//! [`RuleHost`] is the glue an object model needs around a [`RuleManager`]:
//! it forwards property-change notifications, suppresses them while rule
//! checking is paused, and serializes passes so two notifications never run
//! rules against the same target at the same time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::RuleResult;
use crate::flags::RunRulesFlags;
use crate::manager::RuleManager;
use crate::target::RuleTarget;

/// A target paired with the manager that owns its rules.
pub struct RuleHost<T>
where
    T: RuleTarget,
{
    target: Arc<T>,
    manager: RuleManager<T>,
    paused: AtomicBool,
    pass_lock: Mutex<()>,
}

impl<T> RuleHost<T>
where
    T: RuleTarget,
{
    /// Pair `target` with `manager`.
    pub fn new(target: impl Into<Arc<T>>, manager: RuleManager<T>) -> Self {
        Self {
            target: target.into(),
            manager,
            paused: AtomicBool::new(false),
            pass_lock: Mutex::new(()),
        }
    }

    /// The hosted target.
    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    /// The manager owning the target's rules.
    pub fn manager(&self) -> &RuleManager<T> {
        &self.manager
    }

    /// Mutable access to the manager, for registering rules.
    pub fn manager_mut(&mut self) -> &mut RuleManager<T> {
        &mut self.manager
    }

    /// Report that `property` changed and run the rules it triggers.
    ///
    /// Does nothing while rule checking is paused.
    pub async fn property_changed(
        &self,
        property: &str,
        token: &CancellationToken,
    ) -> RuleResult<()> {
        if self.is_paused() {
            debug!(property, "rule checking paused, change ignored");
            return Ok(());
        }

        let _pass = self.pass_lock.lock().await;
        if self.is_paused() {
            debug!(property, "rule checking paused while waiting, change ignored");
            return Ok(());
        }
        self.manager.run_property(&self.target, property, token).await
    }

    /// Run every rule once.
    pub async fn validate(&self, token: &CancellationToken) -> RuleResult<()> {
        let _pass = self.pass_lock.lock().await;
        self.manager
            .run_rules(&self.target, RunRulesFlags::SELF, token)
            .await
    }

    /// Stop reacting to property changes.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            debug!("rule checking paused");
        }
    }

    /// React to property changes again, after one full pass.
    ///
    /// Changes made while paused were not observed, so every rule runs once
    /// before this returns.
    pub async fn resume(&self, token: &CancellationToken) -> RuleResult<()> {
        if self.paused.swap(false, Ordering::AcqRel) {
            debug!("rule checking resumed");
        }
        self.validate(token).await
    }

    /// Returns `true` while property changes are ignored.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Returns `true` if the target holds no message.
    pub fn is_valid(&self) -> bool {
        self.target.is_valid()
    }
}

impl<T> std::fmt::Debug for RuleHost<T>
where
    T: RuleTarget,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleHost")
            .field("manager", &self.manager)
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RuleMessages;
    use crate::rule::{ActionRule, AsyncActionRule, ValidationRule};
    use crate::target::PropertyMessages;
    use crate::ManagerConfig;
    use futures::FutureExt;
    use parking_lot::Mutex as SyncMutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Order {
        quantity: SyncMutex<u32>,
        runs: SyncMutex<u32>,
        entered: AtomicBool,
        gate: Notify,
        messages: PropertyMessages,
    }

    impl RuleTarget for Order {
        fn messages(&self) -> &PropertyMessages {
            &self.messages
        }
    }

    fn host() -> RuleHost<Order> {
        let mut manager =
            RuleManager::with_config(ManagerConfig::default().with_required_rules_check(false));
        manager.add(ActionRule::new(["Quantity"], |o: &Order| *o.runs.lock() += 1));
        manager.add(ValidationRule::new(["Quantity"], |o: &Order| {
            RuleMessages::new().when(
                *o.quantity.lock() == 0,
                "Quantity",
                "Quantity must be positive",
            )
        }));
        RuleHost::new(Order::default(), manager)
    }

    #[tokio::test]
    async fn changes_are_ignored_while_paused() {
        let host = host();
        let token = CancellationToken::new();

        host.pause();
        assert!(host.is_paused());
        host.property_changed("Quantity", &token).await.unwrap();
        assert_eq!(*host.target().runs.lock(), 0);
        assert!(host.is_valid());
    }

    #[tokio::test]
    async fn resume_runs_a_full_pass() {
        let host = host();
        let token = CancellationToken::new();

        host.pause();
        host.property_changed("Quantity", &token).await.unwrap();
        host.resume(&token).await.unwrap();

        assert!(!host.is_paused());
        assert_eq!(*host.target().runs.lock(), 1);
        assert_eq!(
            host.target().messages.texts_for("Quantity"),
            vec!["Quantity must be positive"]
        );
    }

    #[tokio::test]
    async fn property_changed_runs_triggered_rules() {
        let host = host();
        let token = CancellationToken::new();

        *host.target().quantity.lock() = 3;
        host.property_changed("Quantity", &token).await.unwrap();
        host.property_changed("Quantity", &token).await.unwrap();

        assert_eq!(*host.target().runs.lock(), 2);
        assert!(host.is_valid());
    }

    #[tokio::test]
    async fn pause_while_waiting_for_a_pass_drops_the_change() {
        let mut manager =
            RuleManager::with_config(ManagerConfig::default().with_required_rules_check(false));
        manager.add(ActionRule::new(["Quantity"], |o: &Order| *o.runs.lock() += 1));
        manager.add(AsyncActionRule::new(["Slow"], |o: &Order, _token| {
            async move {
                o.entered.store(true, Ordering::SeqCst);
                o.gate.notified().await;
                Ok(())
            }
            .boxed()
        }));
        let host = Arc::new(RuleHost::new(Order::default(), manager));
        let token = CancellationToken::new();

        let slow = tokio::spawn({
            let host = Arc::clone(&host);
            let token = token.clone();
            async move { host.property_changed("Slow", &token).await }
        });
        while !host.target().entered.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let waiting = tokio::spawn({
            let host = Arc::clone(&host);
            let token = token.clone();
            async move { host.property_changed("Quantity", &token).await }
        });
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        host.pause();
        host.target().gate.notify_one();
        slow.await.unwrap().unwrap();
        waiting.await.unwrap().unwrap();

        assert_eq!(*host.target().runs.lock(), 0);
    }
}
