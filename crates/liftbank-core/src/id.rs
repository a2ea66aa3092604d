//! Strongly-typed identifiers for Liftbank entities.
//!
//! Elevator identifiers are human-readable strings: banks name their shafts
//! `elevator-1`, `elevator-2`, ... in construction order, and embedders may
//! bring their own names. The newtype prevents mixing identifiers with other
//! strings at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A unique identifier for one elevator shaft within a bank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElevatorId(String);

impl ElevatorId {
    /// Creates an identifier from a raw string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty or contains whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::invalid_id("elevator id must not be empty"));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(Error::invalid_id(format!(
                "elevator id '{id}' must not contain whitespace"
            )));
        }
        Ok(Self(id))
    }

    /// Returns the conventional identifier for the `index`-th shaft
    /// (1-indexed) of a bank.
    #[must_use]
    pub fn indexed(index: usize) -> Self {
        Self(format!("elevator-{index}"))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElevatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ElevatorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
