//! # liftbank-core
//!
//! Core primitives for the Liftbank elevator-bank controller.
//!
//! This crate provides the foundational types used across all Liftbank
//! components:
//!
//! - **Floors**: Validated floor indices and inclusive floor ranges
//! - **Identifiers**: Strongly-typed elevator identifiers
//! - **Configuration**: The construction-time configuration snapshot
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization helpers
//!
//! ## Crate Boundary
//!
//! `liftbank-core` is the only crate allowed to define shared primitives.
//! The controller domain itself (routes, strategies, the per-shaft state
//! machine, the bank dispatcher) lives in `liftbank-engine`.
//!
//! ## Example
//!
//! ```rust
//! use liftbank_core::prelude::*;
//!
//! let config = BankConfig::default();
//! config.validate().expect("default config is valid");
//!
//! let range = config.floor_range().expect("default bounds are ordered");
//! assert!(range.contains(Floor::new(config.initial_floor)));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod floor;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use liftbank_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::BankConfig;
    pub use crate::error::{Error, Result};
    pub use crate::floor::{Floor, FloorRange};
    pub use crate::id::ElevatorId;
    pub use crate::observability::{init_logging, LogFormat};
}

// Re-export key types at crate root for ergonomics
pub use config::BankConfig;
pub use error::{Error, Result};
pub use floor::{Floor, FloorRange};
pub use id::ElevatorId;
