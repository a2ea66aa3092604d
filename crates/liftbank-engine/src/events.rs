//! Typed event payloads emitted by the controller.
//!
//! The controller replaces a string-keyed emitter with enumerated channels:
//! each event family below travels on its own `tokio::sync::broadcast`
//! channel, and per-elevator streams live in a dedicated map keyed by
//! [`ElevatorId`]. Subscriptions are receivers; dropping a receiver
//! unsubscribes.
//!
//! Payloads are serde-serializable so HTTP and CLI embedders can project
//! them without adapters.

use serde::{Deserialize, Serialize};

use liftbank_core::{ElevatorId, Floor};

use crate::io::IoState;

/// A single state transition of one shaft's state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// State before the transition.
    pub from: IoState,
    /// State after the transition.
    pub to: IoState,
}

/// A state transition re-emitted by the bank, tagged with its shaft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevatorStateChange {
    /// The elevator the transition occurred on.
    pub elevator: ElevatorId,
    /// State before the transition.
    pub from: IoState,
    /// State after the transition.
    pub to: IoState,
}

/// A pool membership change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AvailabilityEvent {
    /// An elevator joined the pool.
    Added {
        /// The elevator that was added.
        elevator: ElevatorId,
        /// Its state at the time of addition.
        state: IoState,
    },
    /// An elevator left the pool.
    Removed {
        /// The elevator that was removed.
        elevator: ElevatorId,
    },
}

/// A floor button turning on or off on one elevator's route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    /// The floor whose button changed.
    pub floor: Floor,
    /// True when the button lit up, false when its stop was served.
    pub active: bool,
}

/// A button change re-emitted by the bank, tagged with its shaft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevatorButtonEvent {
    /// The elevator whose route changed.
    pub elevator: ElevatorId,
    /// The floor whose button changed.
    pub floor: Floor,
    /// True when the button lit up, false when its stop was served.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_event_serializes_tagged() {
        let event = AvailabilityEvent::Removed {
            elevator: ElevatorId::indexed(2),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"removed\""));
        assert!(json.contains("elevator-2"));
    }

    #[test]
    fn button_event_round_trips() {
        let event = ButtonEvent {
            floor: Floor::new(-1),
            active: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: ButtonEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
