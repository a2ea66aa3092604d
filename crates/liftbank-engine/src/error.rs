//! Error types for the controller domain.

use liftbank_core::Error as CoreError;

/// The result type used throughout `liftbank-engine`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in controller operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A domain rule was violated: unknown elevator id, duplicate
    /// registration under one id, or a ride every elevator refused.
    #[error("domain error: {message}")]
    Domain {
        /// Description of the violated rule.
        message: String,
    },

    /// A state-machine command was issued in a state that does not accept
    /// it.
    #[error("invalid state transition: {from} -> {to} ({reason})")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },

    /// An operation exceeded its deadline.
    ///
    /// Reserved for embedders' health checks; the estimation limit is
    /// reported as a `-1` sentinel, never as this error.
    #[error("timeout: {operation} exceeded {limit_ms} ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that was exceeded, in milliseconds.
        limit_ms: u64,
    },

    /// A defect in the controller itself.
    ///
    /// Fatal for the current operation; surfaces to the top level for
    /// logging and never silently corrupts state.
    #[error("internal bug: {message} ({context})")]
    InternalBug {
        /// Description of the defect.
        message: String,
        /// Diagnostic context (recent stops, iteration counts, snapshots).
        context: String,
    },

    /// An error from `liftbank-core` (floor validation, configuration).
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl Error {
    /// Creates a new domain error.
    #[must_use]
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }

    /// Creates a new invalid-state-transition error.
    #[must_use]
    pub fn invalid_transition(
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new internal-bug error with diagnostic context.
    #[must_use]
    pub fn internal_bug(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InternalBug {
            message: message.into(),
            context: context.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_error_display() {
        let err = Error::invalid_transition("movingUp", "doorsOpen", "doors can only open while idle");
        let msg = err.to_string();
        assert!(msg.contains("movingUp"));
        assert!(msg.contains("doorsOpen"));
        assert!(msg.contains("doors can only open"));
    }

    #[test]
    fn core_errors_convert() {
        let core = liftbank_core::Error::FloorOutOfBounds {
            floor: 99,
            min: 0,
            max: 10,
        };
        let err: Error = core.into();
        assert!(matches!(err, Error::Core(_)));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn internal_bug_carries_context() {
        let err = Error::internal_bug("planner stalled", "iterations=1001");
        assert!(err.to_string().contains("iterations=1001"));
    }
}
