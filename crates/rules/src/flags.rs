//! Rule selection flags

use bitflags::bitflags;

use crate::rule::RuleState;

bitflags! {
    /// Selects which registered rules a [`RuleManager::run_rules`] pass runs.
    ///
    /// Flags compose with `|`; a rule is selected when any of the set
    /// selectors matches it. An empty set selects nothing.
    ///
    /// [`RuleManager::run_rules`]: crate::RuleManager::run_rules
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RunRulesFlags: u32 {
        /// Rules that have never completed a run.
        const NOT_EXECUTED = 1 << 0;
        /// Rules that have completed at least one run.
        const EXECUTED = 1 << 1;
        /// Rules whose last run produced messages.
        const MESSAGES = 1 << 2;
        /// Rules whose last run produced no messages (or that never ran).
        const NO_MESSAGES = 1 << 3;
        /// Explicit invocation by the owning object; selects every rule.
        const SELF = 1 << 4;
        /// Every rule.
        const ALL = 1 << 5;
    }
}

impl RunRulesFlags {
    /// Returns `true` if a rule in `state` is selected by these flags.
    pub fn selects(self, state: &RuleState) -> bool {
        if self.intersects(Self::ALL | Self::SELF) {
            return true;
        }

        let executed = state.executed();
        let has_messages = state.has_messages();

        (self.contains(Self::NOT_EXECUTED) && !executed)
            || (self.contains(Self::EXECUTED) && executed)
            || (self.contains(Self::MESSAGES) && has_messages)
            || (self.contains(Self::NO_MESSAGES) && !has_messages)
    }
}

impl Default for RunRulesFlags {
    fn default() -> Self {
        Self::ALL
    }
}
