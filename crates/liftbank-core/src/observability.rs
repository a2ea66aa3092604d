//! Observability infrastructure for Liftbank.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers so every embedder (CLI, HTTP, tests) configures
//! the subscriber the same way.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `liftbank_engine=debug`)
pub fn init_logging(format: LogFormat) {
    init_logging_with_default(format, "info");
}

/// Initializes the logging subsystem with a fallback directive.
///
/// `default_directive` is used when `RUST_LOG` is unset; banks typically
/// pass their configured `LOG_LEVEL` here.
pub fn init_logging_with_default(format: LogFormat, default_directive: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for bank-level operations with standard fields.
#[must_use]
pub fn bank_span(operation: &str) -> tracing::Span {
    tracing::info_span!("bank", op = operation)
}

/// Creates a span for per-elevator operations with standard fields.
#[must_use]
pub fn elevator_span(operation: &str, elevator: &str) -> tracing::Span {
    tracing::info_span!("elevator", op = operation, elevator = elevator)
}
