//! The configuration snapshot consumed at bank construction.
//!
//! All timing values are milliseconds of simulated wall-clock delay. The
//! snapshot is plain data: loading it from the environment or a file is the
//! embedder's concern.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::floor::{Floor, FloorRange};

/// Upper sanity bound for timing values (24 hours in milliseconds).
const MAX_DELAY_MS: u64 = 86_400_000;

/// Configuration snapshot for an elevator bank.
///
/// Every field has a default so partial configuration files deserialize
/// cleanly; [`BankConfig::validate`] enforces cross-field consistency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Travel delay per floor step, in milliseconds.
    pub travel_time_per_floor_ms: u64,
    /// Hold duration for the doors-open state, in milliseconds.
    pub door_open_time_ms: u64,
    /// Soft cap above which a ride estimation reports "no estimate".
    pub estimation_limit_ms: i64,
    /// Enables the free-first selection tier in the dispatcher.
    pub use_free_first: bool,
    /// Lower inclusive floor bound; may be negative.
    pub min_floor: i32,
    /// Upper inclusive floor bound.
    pub max_floor: i32,
    /// Number of elevators the bank is constructed with.
    pub nr_of_elevators: usize,
    /// Starting floor for every new elevator.
    pub initial_floor: i32,
    /// Default log verbosity when `RUST_LOG` is unset; does not affect
    /// correctness.
    pub log_level: String,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            travel_time_per_floor_ms: 2000,
            door_open_time_ms: 5000,
            estimation_limit_ms: 10_000,
            use_free_first: true,
            min_floor: 0,
            max_floor: 10,
            nr_of_elevators: 3,
            initial_floor: 0,
            log_level: "info".to_string(),
        }
    }
}

impl BankConfig {
    /// Validates cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns an error when the floor bounds are inverted, the initial
    /// floor lies outside them, the bank would hold no elevators, or a
    /// timing value is zero or implausibly large.
    pub fn validate(&self) -> Result<()> {
        if self.nr_of_elevators == 0 {
            return Err(Error::invalid_config("NR_OF_ELEVATORS must be at least 1"));
        }
        if self.travel_time_per_floor_ms == 0 || self.travel_time_per_floor_ms > MAX_DELAY_MS {
            return Err(Error::invalid_config(format!(
                "TRAVEL_TIME_PER_FLOOR must be within (0, {MAX_DELAY_MS}] ms"
            )));
        }
        if self.door_open_time_ms == 0 || self.door_open_time_ms > MAX_DELAY_MS {
            return Err(Error::invalid_config(format!(
                "DOOR_OPEN_TIME must be within (0, {MAX_DELAY_MS}] ms"
            )));
        }
        if self.estimation_limit_ms <= 0 {
            return Err(Error::invalid_config("ESTIMATION_LIMIT must be positive"));
        }
        let range = self.floor_range()?;
        range.validate(Floor::new(self.initial_floor))?;
        Ok(())
    }

    /// The inclusive floor bounds described by this snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if `min_floor > max_floor`.
    pub fn floor_range(&self) -> Result<FloorRange> {
        FloorRange::new(Floor::new(self.min_floor), Floor::new(self.max_floor))
    }

    /// Travel delay per floor step.
    #[must_use]
    pub const fn travel_time(&self) -> Duration {
        Duration::from_millis(self.travel_time_per_floor_ms)
    }

    /// Doors-open hold duration.
    #[must_use]
    pub const fn door_open_time(&self) -> Duration {
        Duration::from_millis(self.door_open_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BankConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_elevators_is_rejected() {
        let config = BankConfig {
            nr_of_elevators: 0,
            ..BankConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn initial_floor_must_be_within_bounds() {
        let config = BankConfig {
            initial_floor: 42,
            ..BankConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = BankConfig {
            min_floor: 5,
            max_floor: -5,
            ..BankConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_travel_time_is_rejected() {
        let config = BankConfig {
            travel_time_per_floor_ms: 0,
            ..BankConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_bounds_are_allowed() {
        let config = BankConfig {
            min_floor: -6,
            max_floor: 2,
            initial_floor: -1,
            ..BankConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: BankConfig =
            serde_json::from_str(r#"{"nr_of_elevators": 2, "max_floor": 30}"#).unwrap();
        assert_eq!(config.nr_of_elevators, 2);
        assert_eq!(config.max_floor, 30);
        assert_eq!(config.travel_time_per_floor_ms, 2000);
        assert!(config.use_free_first);
    }
}
