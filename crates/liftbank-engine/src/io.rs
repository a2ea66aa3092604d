//! The per-shaft discrete-event state machine.
//!
//! The machine accepts exactly two commands, [`Io::move_by`] and
//! [`Io::open_doors`], and drives itself back to idle through scheduled
//! one-shot timers:
//!
//! ```text
//!            move(n > 0)  ┌───────────┐
//!         ┌──────────────►│ MOVING_UP │───┐
//!         │               └───────────┘   │ timer: |n| · travel
//! ┌───────┴──┐                            ▼
//! │   IDLE   │◄───────────────────────────┬◄────────────────┐
//! └───────┬──┘                            ▲                 │
//!         │               ┌─────────────┐ │ timer           │ timer: door hold
//!         ├──────────────►│ MOVING_DOWN │─┘                 │
//!         │  move(n < 0)  └─────────────┘     ┌──────────┐  │
//!         └──────────────────────────────────►│DOORS_OPEN│──┘
//!                open_doors()                 └─────┬────┘
//!                                                   │ open_doors()
//!                                                   └──► replaces the close
//!                                                        timer (hold extends)
//! ```
//!
//! At most one timer is pending at any time; it is the sole exit from the
//! current timed state. Replacing it requires the explicit replace hint and
//! happens only when an open hold is extended. The timer callback clears the
//! stored handle before transitioning, so reentrant commands find the
//! machine in the new state with no pending timer. Commands must be issued
//! from within a Tokio runtime.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use liftbank_core::{BankConfig, Floor};

use crate::error::{Error, Result};
use crate::events::StateChange;
use crate::metrics::{labels, names};

/// Capacity of each event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Discriminant of an [`IoState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateKind {
    /// Parked with doors closed.
    Idle,
    /// Traveling upward.
    MovingUp,
    /// Traveling downward.
    MovingDown,
    /// Holding the doors open.
    DoorsOpen,
}

impl StateKind {
    /// Returns a label suitable for events, metrics, and logs.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::MovingUp => "movingUp",
            Self::MovingDown => "movingDown",
            Self::DoorsOpen => "doorsOpen",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// The physical state of one elevator shaft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IoState {
    /// Parked at a floor with doors closed.
    Idle {
        /// The floor the shaft is parked at.
        at_floor: Floor,
        /// When this state was entered.
        since: DateTime<Utc>,
    },
    /// Traveling upward; `to > from`.
    MovingUp {
        /// Departure floor.
        from: Floor,
        /// Destination floor.
        to: Floor,
        /// When the travel began.
        started_at: DateTime<Utc>,
        /// When the shaft arrives.
        due_at: DateTime<Utc>,
    },
    /// Traveling downward; `to < from`.
    MovingDown {
        /// Departure floor.
        from: Floor,
        /// Destination floor.
        to: Floor,
        /// When the travel began.
        started_at: DateTime<Utc>,
        /// When the shaft arrives.
        due_at: DateTime<Utc>,
    },
    /// Holding the doors open at a floor.
    DoorsOpen {
        /// The floor the doors are open at.
        at_floor: Floor,
        /// When the doors opened.
        opened_at: DateTime<Utc>,
        /// When the doors close.
        due_at: DateTime<Utc>,
    },
}

impl IoState {
    /// The state's discriminant.
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Idle { .. } => StateKind::Idle,
            Self::MovingUp { .. } => StateKind::MovingUp,
            Self::MovingDown { .. } => StateKind::MovingDown,
            Self::DoorsOpen { .. } => StateKind::DoorsOpen,
        }
    }

    /// True when the shaft is idle.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle { .. })
    }

    /// The floor the shaft is stationary at, when it is.
    #[must_use]
    pub const fn at_floor(&self) -> Option<Floor> {
        match self {
            Self::Idle { at_floor, .. } | Self::DoorsOpen { at_floor, .. } => Some(*at_floor),
            Self::MovingUp { .. } | Self::MovingDown { .. } => None,
        }
    }

    /// The planning-relevant floor: where the shaft is, or the destination
    /// it is committed to reach.
    #[must_use]
    pub const fn position(&self) -> Floor {
        match self {
            Self::Idle { at_floor, .. } | Self::DoorsOpen { at_floor, .. } => *at_floor,
            Self::MovingUp { to, .. } | Self::MovingDown { to, .. } => *to,
        }
    }

    /// When the pending transition fires, for timed states.
    #[must_use]
    pub const fn due_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Idle { .. } => None,
            Self::MovingUp { due_at, .. }
            | Self::MovingDown { due_at, .. }
            | Self::DoorsOpen { due_at, .. } => Some(*due_at),
        }
    }
}

impl fmt::Display for IoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// Event streams emitted by an [`Io`]: one channel per state kind plus the
/// `change` stream carrying both sides of every transition.
#[derive(Debug, Clone)]
pub struct IoEvents {
    change: broadcast::Sender<StateChange>,
    idle: broadcast::Sender<IoState>,
    moving_up: broadcast::Sender<IoState>,
    moving_down: broadcast::Sender<IoState>,
    doors_open: broadcast::Sender<IoState>,
}

impl IoEvents {
    fn new() -> Self {
        Self {
            change: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            idle: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            moving_up: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            moving_down: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            doors_open: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribes to every transition.
    #[must_use]
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.change.subscribe()
    }

    /// Subscribes to entries into one state kind.
    #[must_use]
    pub fn subscribe_kind(&self, kind: StateKind) -> broadcast::Receiver<IoState> {
        self.sender_for(kind).subscribe()
    }

    fn sender_for(&self, kind: StateKind) -> &broadcast::Sender<IoState> {
        match kind {
            StateKind::Idle => &self.idle,
            StateKind::MovingUp => &self.moving_up,
            StateKind::MovingDown => &self.moving_down,
            StateKind::DoorsOpen => &self.doors_open,
        }
    }

    fn emit(&self, from: IoState, to: IoState) {
        counter!(
            names::IO_TRANSITIONS_TOTAL,
            labels::FROM_STATE => from.kind().as_label(),
            labels::TO_STATE => to.kind().as_label()
        )
        .increment(1);
        let _ = self.sender_for(to.kind()).send(to.clone());
        let _ = self.change.send(StateChange { from, to });
    }
}

/// Timing for the physical cycle.
#[derive(Debug, Clone, Copy)]
pub struct IoTiming {
    /// Travel delay per floor step.
    pub travel_time_per_floor: Duration,
    /// Doors-open hold duration.
    pub door_open_time: Duration,
}

impl IoTiming {
    /// Derives the cycle timing from a configuration snapshot.
    #[must_use]
    pub fn from_config(config: &BankConfig) -> Self {
        Self {
            travel_time_per_floor: config.travel_time(),
            door_open_time: config.door_open_time(),
        }
    }
}

/// Whether a schedule request may displace a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerMode {
    /// There must be no pending timer.
    Fresh,
    /// Cancel and replace the pending timer (open-hold extension).
    Replace,
}

#[derive(Debug)]
struct IoInner {
    state: IoState,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every schedule and on shutdown; a firing timer whose epoch
    /// is stale has been superseded and must not transition.
    epoch: u64,
}

/// The state machine driving one elevator shaft.
#[derive(Debug)]
pub struct Io {
    inner: Arc<Mutex<IoInner>>,
    events: IoEvents,
    timing: IoTiming,
}

impl Io {
    /// Creates a machine parked at `initial_floor`.
    #[must_use]
    pub fn new(initial_floor: Floor, timing: IoTiming) -> Self {
        Self {
            inner: Arc::new(Mutex::new(IoInner {
                state: IoState::Idle {
                    at_floor: initial_floor,
                    since: Utc::now(),
                },
                timer: None,
                epoch: 0,
            })),
            events: IoEvents::new(),
            timing,
        }
    }

    /// A defensive copy of the current state.
    #[must_use]
    pub fn state(&self) -> IoState {
        self.lock().state.clone()
    }

    /// The floor the shaft is stationary at, when it is.
    #[must_use]
    pub fn at_floor(&self) -> Option<Floor> {
        self.lock().state.at_floor()
    }

    /// The planning-relevant floor (current or committed destination).
    #[must_use]
    pub fn position(&self) -> Floor {
        self.lock().state.position()
    }

    /// The machine's event streams.
    #[must_use]
    pub fn events(&self) -> &IoEvents {
        &self.events
    }

    /// Starts traveling `floors` floors (positive = up, negative = down).
    ///
    /// Schedules the arrival transition at `now + |floors| · travel_time`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] when `floors` is zero or
    /// the machine is not idle.
    pub fn move_by(&self, floors: i32) -> Result<()> {
        let (from_state, to_state) = {
            let mut inner = self.lock();
            let to_kind = if floors > 0 {
                StateKind::MovingUp
            } else {
                StateKind::MovingDown
            };
            if floors == 0 {
                return Err(Error::invalid_transition(
                    inner.state.kind().as_label(),
                    "moving",
                    "cannot move zero floors",
                ));
            }
            let IoState::Idle { at_floor, .. } = inner.state else {
                return Err(Error::invalid_transition(
                    inner.state.kind().as_label(),
                    to_kind.as_label(),
                    "move is accepted only while idle",
                ));
            };
            let to = at_floor.offset(floors);
            let travel = self.timing.travel_time_per_floor * floors.unsigned_abs();
            if !self.schedule_idle(&mut inner, travel, to, TimerMode::Fresh) {
                return Ok(());
            }
            let now = Utc::now();
            let due_at = now + chrono::Duration::from_std(travel).unwrap_or(chrono::Duration::MAX);
            let next = if floors > 0 {
                IoState::MovingUp {
                    from: at_floor,
                    to,
                    started_at: now,
                    due_at,
                }
            } else {
                IoState::MovingDown {
                    from: at_floor,
                    to,
                    started_at: now,
                    due_at,
                }
            };
            let prev = std::mem::replace(&mut inner.state, next.clone());
            (prev, next)
        };
        self.events.emit(from_state, to_state);
        Ok(())
    }

    /// Opens the doors, or extends the hold when they are already open.
    ///
    /// Schedules the close transition at `now + door_open_time`; an
    /// extension replaces the pending close timer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] while moving.
    pub fn open_doors(&self) -> Result<()> {
        let (from_state, to_state) = {
            let mut inner = self.lock();
            let (at_floor, mode) = match inner.state {
                IoState::Idle { at_floor, .. } => (at_floor, TimerMode::Fresh),
                IoState::DoorsOpen { at_floor, .. } => (at_floor, TimerMode::Replace),
                IoState::MovingUp { .. } | IoState::MovingDown { .. } => {
                    return Err(Error::invalid_transition(
                        inner.state.kind().as_label(),
                        StateKind::DoorsOpen.as_label(),
                        "doors can only open while idle or already open",
                    ));
                }
            };
            if !self.schedule_idle(&mut inner, self.timing.door_open_time, at_floor, mode) {
                return Ok(());
            }
            let now = Utc::now();
            let due_at = now
                + chrono::Duration::from_std(self.timing.door_open_time)
                    .unwrap_or(chrono::Duration::MAX);
            let next = IoState::DoorsOpen {
                at_floor,
                opened_at: now,
                due_at,
            };
            let prev = std::mem::replace(&mut inner.state, next.clone());
            (prev, next)
        };
        self.events.emit(from_state, to_state);
        Ok(())
    }

    /// Cancels the pending timer, if any.
    ///
    /// Queued timer callbacks observe the epoch bump and become no-ops.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        if let Some(pending) = inner.timer.take() {
            pending.abort();
        }
    }

    /// Schedules the one-shot transition to idle at `arrival`.
    ///
    /// Returns false (refusing, with a log line) when a timer is already
    /// pending and the mode does not allow replacing it.
    fn schedule_idle(
        &self,
        inner: &mut IoInner,
        delay: Duration,
        arrival: Floor,
        mode: TimerMode,
    ) -> bool {
        if let Some(pending) = inner.timer.take() {
            match mode {
                TimerMode::Replace => pending.abort(),
                TimerMode::Fresh => {
                    inner.timer = Some(pending);
                    tracing::warn!(
                        floor = %arrival,
                        "transition already pending; refusing to schedule another"
                    );
                    return false;
                }
            }
        }
        inner.epoch += 1;
        let epoch = inner.epoch;
        let shared = Arc::clone(&self.inner);
        let events = self.events.clone();
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(&shared, &events, epoch, arrival);
        }));
        true
    }

    /// A poisoned lock still holds a coherent state; recover it.
    fn lock(&self) -> MutexGuard<'_, IoInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Applies a scheduled arrival transition, unless it has been superseded.
fn fire(shared: &Arc<Mutex<IoInner>>, events: &IoEvents, epoch: u64, arrival: Floor) {
    let (from_state, to_state) = {
        let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.epoch != epoch {
            return;
        }
        // Clear the handle before transitioning so reentrant commands see
        // no pending timer.
        inner.timer = None;
        let next = IoState::Idle {
            at_floor: arrival,
            since: Utc::now(),
        };
        let prev = std::mem::replace(&mut inner.state, next.clone());
        (prev, next)
    };
    events.emit(from_state, to_state);
}
