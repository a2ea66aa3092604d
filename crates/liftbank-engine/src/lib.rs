//! # liftbank-engine
//!
//! Elevator-bank controller core for Liftbank.
//!
//! This crate implements the controller domain, providing:
//!
//! - **Routes**: Ordered, idempotent stop queues with
//!   conditional-after-pickup dropoff semantics
//! - **Strategies**: Pure planners that order stops and estimate ride
//!   durations, with cooperative batching
//! - **State Machine**: The per-shaft discrete-event cycle of traveling,
//!   arriving, opening and closing doors
//! - **Dispatch**: A three-tier selection policy (free-first, minimum
//!   estimate, shortest route) over the elevator pool
//! - **Events**: Typed broadcast streams for state, availability, and
//!   button changes
//!
//! ## Guarantees
//!
//! - **Serialized per shaft**: consumers see one elevator's transitions in
//!   the order they occurred
//! - **Single pending timer**: each state machine has at most one scheduled
//!   transition at any time
//! - **Planning never mutates**: estimation always works on route copies
//!
//! ## Example
//!
//! ```rust,no_run
//! use liftbank_core::{BankConfig, Floor};
//! use liftbank_engine::bank::Bank;
//!
//! # async fn demo() -> liftbank_engine::error::Result<()> {
//! let bank = Bank::new(BankConfig::default())?;
//! bank.start()?;
//!
//! let mut states = bank.subscribe_states();
//! let assigned = bank.add_ride(Floor::new(3), Some(Floor::new(7))).await?;
//! println!("ride assigned to {assigned}");
//!
//! while let Ok(change) = states.recv().await {
//!     println!("{}: {} -> {}", change.elevator, change.from, change.to);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod bank;
pub mod elevator;
pub mod error;
pub mod events;
pub mod io;
pub mod metrics;
pub mod route;
pub mod strategy;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bank::Bank;
    pub use crate::elevator::Elevator;
    pub use crate::error::{Error, Result};
    pub use crate::events::{
        AvailabilityEvent, ButtonEvent, ElevatorButtonEvent, ElevatorStateChange, StateChange,
    };
    pub use crate::io::{Io, IoEvents, IoState, IoTiming, StateKind};
    pub use crate::route::{ConditionalFloor, Route, RouteItem};
    pub use crate::strategy::{
        EstimationTiming, InsertOrder, StopEnRoute, Strategy, NO_ESTIMATE,
    };
    pub use liftbank_core::{BankConfig, ElevatorId, Floor, FloorRange};
}
