//! Error types for rule execution.
//!
//! Validation outcomes are never errors: a rule that finds an invalid value
//! returns messages. [`RuleError`] only covers execution faults, i.e. misuse
//! of the engine, cancellation, and failures raised by a rule body.

/// Boxed error raised from inside a rule body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type RuleResult<T> = Result<T, RuleError>;

/// Execution fault surfaced by the rule engine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RuleError {
    /// The rule was asked to run through a manager it was never added to.
    #[error("rule `{rule}` has not been added to this rule manager")]
    RuleNotAdded {
        /// Name of the offending rule.
        rule: String,
    },

    /// The target handed to a type-erased run is not the rule's target type.
    #[error("invalid target type: rule expects a `{expected}` target")]
    InvalidTargetType {
        /// Type name the rule was declared for.
        expected: &'static str,
    },

    /// The cancellation token was triggered before the rule body started.
    #[error("rule execution cancelled")]
    Cancelled,

    /// Error raised by a rule body, passed through unchanged.
    #[error(transparent)]
    Failed(BoxError),
}

impl RuleError {
    /// Create a `RuleNotAdded` error for the named rule.
    pub fn not_added(rule: impl Into<String>) -> Self {
        Self::RuleNotAdded { rule: rule.into() }
    }

    /// Create an `InvalidTargetType` error for the expected target type.
    pub fn invalid_target<T: ?Sized>() -> Self {
        Self::InvalidTargetType {
            expected: std::any::type_name::<T>(),
        }
    }

    /// Wrap an error raised inside a rule body.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(error.into())
    }

    /// Returns `true` if the run was stopped by a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the error came out of a rule body.
    pub fn is_rule_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
