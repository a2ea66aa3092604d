//! Floor indexing and bounds validation.
//!
//! Floors are plain integers and may be negative (basement levels). Bounds
//! are a deployment property rather than a type property: every external
//! entry point validates incoming floors against the configured
//! [`FloorRange`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A floor index within an elevator bank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Floor(i32);

impl Floor {
    /// Creates a floor from a raw index.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw floor index.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Returns the floor `offset` floors away.
    #[must_use]
    pub fn offset(self, offset: i32) -> Self {
        Self(self.0.saturating_add(offset))
    }

    /// Absolute number of floors between `self` and `other`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> u32 {
        self.0.abs_diff(other.0)
    }

    /// Unit step (`+1` or `-1`) toward `other`, or `0` when already there.
    #[must_use]
    pub fn step_toward(self, other: Self) -> i32 {
        (other.0 - self.0).signum()
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Floor {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Inclusive floor bounds for a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorRange {
    min: Floor,
    max: Floor,
}

impl FloorRange {
    /// Creates a range from inclusive bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if `min > max`.
    pub fn new(min: Floor, max: Floor) -> Result<Self> {
        if min > max {
            return Err(Error::invalid_config(format!(
                "MIN_FLOOR {min} is above MAX_FLOOR {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Lower inclusive bound.
    #[must_use]
    pub const fn min(&self) -> Floor {
        self.min
    }

    /// Upper inclusive bound.
    #[must_use]
    pub const fn max(&self) -> Floor {
        self.max
    }

    /// Returns true when `floor` lies within the bounds.
    #[must_use]
    pub fn contains(&self, floor: Floor) -> bool {
        self.min <= floor && floor <= self.max
    }

    /// Validates `floor`, returning it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FloorOutOfBounds`] when the floor lies outside the
    /// bounds.
    pub fn validate(&self, floor: Floor) -> Result<Floor> {
        if self.contains(floor) {
            Ok(floor)
        } else {
            Err(Error::FloorOutOfBounds {
                floor: floor.value(),
                min: self.min.value(),
                max: self.max.value(),
            })
        }
    }
}

impl fmt::Display for FloorRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_toward_gives_unit_steps() {
        let here = Floor::new(3);
        assert_eq!(here.step_toward(Floor::new(7)), 1);
        assert_eq!(here.step_toward(Floor::new(-2)), -1);
        assert_eq!(here.step_toward(Floor::new(3)), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Floor::new(-3);
        let b = Floor::new(4);
        assert_eq!(a.distance_to(b), 7);
        assert_eq!(b.distance_to(a), 7);
    }

    #[test]
    fn range_accepts_negative_floors() {
        let range = FloorRange::new(Floor::new(-4), Floor::new(10)).unwrap();
        assert!(range.contains(Floor::new(-4)));
        assert!(range.contains(Floor::new(0)));
        assert!(range.contains(Floor::new(10)));
        assert!(!range.contains(Floor::new(-5)));
        assert!(!range.contains(Floor::new(11)));
    }

    #[test]
    fn validate_reports_bounds() {
        let range = FloorRange::new(Floor::new(0), Floor::new(10)).unwrap();
        let err = range.validate(Floor::new(11)).unwrap_err();
        assert!(matches!(
            err,
            Error::FloorOutOfBounds {
                floor: 11,
                min: 0,
                max: 10
            }
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(FloorRange::new(Floor::new(5), Floor::new(1)).is_err());
    }

    #[test]
    fn floor_serializes_transparently() {
        let json = serde_json::to_string(&Floor::new(-2)).unwrap();
        assert_eq!(json, "-2");
        let parsed: Floor = serde_json::from_str("-2").unwrap();
        assert_eq!(parsed, Floor::new(-2));
    }
}
