//! Observability metrics for the controller.
//!
//! Metrics are exposed via the `metrics` crate facade; embedders install
//! whichever recorder they deploy with (e.g. a Prometheus exporter).
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `liftbank_io_transitions_total` | Counter | `from_state`, `to_state` | State machine transitions |
//! | `liftbank_rides_dispatched_total` | Counter | `tier` | Rides assigned, by selection tier |
//! | `liftbank_rides_rejected_total` | Counter | `reason` | Rides refused before selection |
//! | `liftbank_estimation_duration_seconds` | Histogram | - | Fork-join estimation wall time |
//! | `liftbank_decision_errors_total` | Counter | `elevator` | Decision-step failures caught |

use std::time::{Duration, Instant};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: state machine transitions.
    pub const IO_TRANSITIONS_TOTAL: &str = "liftbank_io_transitions_total";
    /// Counter: rides assigned, by selection tier.
    pub const RIDES_DISPATCHED_TOTAL: &str = "liftbank_rides_dispatched_total";
    /// Counter: rides refused before selection.
    pub const RIDES_REJECTED_TOTAL: &str = "liftbank_rides_rejected_total";
    /// Histogram: fork-join estimation wall time in seconds.
    pub const ESTIMATION_DURATION_SECONDS: &str = "liftbank_estimation_duration_seconds";
    /// Counter: decision-step failures caught and logged.
    pub const DECISION_ERRORS_TOTAL: &str = "liftbank_decision_errors_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// State before a transition.
    pub const FROM_STATE: &str = "from_state";
    /// State after a transition.
    pub const TO_STATE: &str = "to_state";
    /// Selection tier that assigned a ride.
    pub const TIER: &str = "tier";
    /// Why a ride was refused.
    pub const REASON: &str = "reason";
    /// The elevator involved.
    pub const ELEVATOR: &str = "elevator";
}

/// Records a duration into a callback when dropped.
///
/// ```rust
/// use liftbank_engine::metrics::TimingGuard;
/// use metrics::histogram;
///
/// let _guard = TimingGuard::new(|duration| {
///     histogram!("liftbank_estimation_duration_seconds").record(duration.as_secs_f64());
/// });
/// // ... timed work ...
/// ```
pub struct TimingGuard<F: FnOnce(Duration)> {
    start: Instant,
    record: Option<F>,
}

impl<F: FnOnce(Duration)> TimingGuard<F> {
    /// Starts timing; `record` runs with the elapsed time on drop.
    #[must_use]
    pub fn new(record: F) -> Self {
        Self {
            start: Instant::now(),
            record: Some(record),
        }
    }
}

impl<F: FnOnce(Duration)> Drop for TimingGuard<F> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            record(self.start.elapsed());
        }
    }
}
