//! Error types and result aliases for Liftbank primitives.
//!
//! Errors are structured for programmatic handling and include the offending
//! values for debugging.

/// The result type used throughout `liftbank-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing or validating core primitives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A floor fell outside the configured inclusive bounds.
    #[error("invalid floor {floor}: outside [{min}, {max}]")]
    FloorOutOfBounds {
        /// The rejected floor value.
        floor: i32,
        /// Lower inclusive bound.
        min: i32,
        /// Upper inclusive bound.
        max: i32,
    },

    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the identifier invalid.
        message: String,
    },

    /// The configuration snapshot failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the failed check.
        message: String,
    },
}

impl Error {
    /// Creates a new invalid-identifier error.
    #[must_use]
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    /// Creates a new invalid-configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_error_display_includes_bounds() {
        let err = Error::FloorOutOfBounds {
            floor: 42,
            min: -2,
            max: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("-2"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn config_error_display() {
        let err = Error::invalid_config("NR_OF_ELEVATORS must be at least 1");
        assert!(err.to_string().contains("invalid configuration"));
    }
}
