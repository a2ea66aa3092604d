//! The per-shaft coordinator gluing route, state machine, and strategy.
//!
//! An elevator owns its [`Route`] and [`Io`] exclusively; the bank only
//! goes through this public API. The service loop is event-driven: every
//! time the machine comes back to idle, the listener task re-enters the
//! decision step, which either opens the doors at a requested floor, takes
//! one unit step toward the first queued stop, or stays put.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use metrics::counter;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use liftbank_core::{BankConfig, ElevatorId, Floor, FloorRange};

use crate::error::{Error, Result};
use crate::events::ButtonEvent;
use crate::io::{Io, IoEvents, IoState, IoTiming};
use crate::metrics::{labels, names};
use crate::route::Route;
use crate::strategy::{EstimationTiming, Strategy};

/// Capacity of the button event channel.
const BUTTON_CHANNEL_CAPACITY: usize = 64;

/// What the decision step chose to do with the state machine.
enum Action {
    OpenDoors,
    Move(i32),
    Stay,
}

/// One elevator shaft: route, state machine, and travel strategy.
pub struct Elevator {
    id: ElevatorId,
    route: Mutex<Route>,
    io: Io,
    strategy: Arc<dyn Strategy>,
    range: FloorRange,
    estimation: EstimationTiming,
    buttons: broadcast::Sender<ButtonEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
    /// Self-reference handed to the idle listener so a lingering task never
    /// keeps a removed elevator alive.
    weak: Weak<Elevator>,
}

impl Elevator {
    /// Creates an elevator parked at the configured initial floor.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration snapshot is invalid.
    pub fn new(
        id: ElevatorId,
        strategy: Arc<dyn Strategy>,
        config: &BankConfig,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let range = config.floor_range()?;
        let initial = range.validate(Floor::new(config.initial_floor))?;
        let buttons = broadcast::channel(BUTTON_CHANNEL_CAPACITY).0;
        Ok(Arc::new_cyclic(|weak| Self {
            id,
            route: Mutex::new(Route::with_button_events(buttons.clone())),
            io: Io::new(initial, IoTiming::from_config(config)),
            strategy,
            range,
            estimation: EstimationTiming::from_config(config),
            buttons,
            listener: Mutex::new(None),
            weak: weak.clone(),
        }))
    }

    /// This shaft's identifier.
    #[must_use]
    pub fn id(&self) -> &ElevatorId {
        &self.id
    }

    /// A defensive copy of the machine's current state.
    #[must_use]
    pub fn state(&self) -> IoState {
        self.io.state()
    }

    /// The machine's event streams.
    #[must_use]
    pub fn events(&self) -> &IoEvents {
        self.io.events()
    }

    /// Subscribes to this shaft's button changes.
    #[must_use]
    pub fn subscribe_buttons(&self) -> broadcast::Receiver<ButtonEvent> {
        self.buttons.subscribe()
    }

    /// Queues a ride on this shaft.
    ///
    /// The strategy may veto the ride, in which case it is logged and
    /// dropped silently. When the machine is idle, the decision step runs
    /// inline so service begins immediately.
    ///
    /// # Errors
    ///
    /// Returns an error when a floor lies outside the configured bounds.
    pub fn add_ride(&self, pickup: Floor, dropoff: Option<Floor>) -> Result<()> {
        self.range.validate(pickup)?;
        if let Some(dropoff) = dropoff {
            self.range.validate(dropoff)?;
        }
        {
            let mut route = self.lock_route();
            if self
                .strategy
                .is_ride_vetoed(&route, self.io.position(), pickup, dropoff)
            {
                tracing::info!(
                    elevator = %self.id,
                    pickup = %pickup,
                    dropoff = ?dropoff.map(|floor| floor.value()),
                    "ride vetoed by strategy; dropping"
                );
                return Ok(());
            }
            route.add_ride(pickup, dropoff);
        }
        if self.io.state().is_idle() {
            self.decide();
        }
        Ok(())
    }

    /// Whether the strategy would refuse this ride.
    #[must_use]
    pub fn is_ride_vetoed(&self, pickup: Floor, dropoff: Option<Floor>) -> bool {
        self.strategy
            .is_ride_vetoed(&self.lock_route(), self.io.position(), pickup, dropoff)
    }

    /// Estimated milliseconds to serve the ride, or the `-1` sentinel.
    ///
    /// Works on a copy of the route; the live route is never altered.
    ///
    /// # Errors
    ///
    /// Propagates planner defects ([`Error::InternalBug`]).
    pub async fn estimate_pickup_dropoff_time(
        &self,
        pickup: Floor,
        dropoff: Option<Floor>,
    ) -> Result<i64> {
        let copy = self.lock_route().copy();
        self.strategy
            .estimate_pickup_dropoff_time(copy, self.io.position(), pickup, dropoff, self.estimation)
            .await
    }

    /// True iff the route is empty and the machine is idle.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.lock_route().is_empty() && self.io.state().is_idle()
    }

    /// Number of keys in the pending route.
    #[must_use]
    pub fn route_length(&self) -> usize {
        self.lock_route().len()
    }

    /// Floors whose buttons are currently lit.
    #[must_use]
    pub fn pushed_buttons(&self) -> Vec<Floor> {
        self.lock_route().pushed_buttons()
    }

    /// Starts the service loop.
    ///
    /// Spawns the idle listener by which "running" is observed and nudges
    /// the decision step so pre-queued rides begin service. A soft start of
    /// an already-running elevator is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`Error::Domain`] error on a hard start of an
    /// already-running elevator.
    pub fn start(&self, soft: bool) -> Result<()> {
        {
            let mut listener = self.lock_listener();
            if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
                if soft {
                    tracing::debug!(elevator = %self.id, "already running; soft start is a no-op");
                    return Ok(());
                }
                return Err(Error::domain(format!(
                    "elevator {} is already running",
                    self.id
                )));
            }
            let mut changes = self.io.events().subscribe_changes();
            let weak = self.weak.clone();
            *listener = Some(tokio::spawn(async move {
                loop {
                    match changes.recv().await {
                        Ok(change) => {
                            if change.to.is_idle() {
                                let Some(elevator) = weak.upgrade() else {
                                    break;
                                };
                                elevator.decide();
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "idle listener lagged behind io events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }
        if self.io.state().is_idle() {
            self.decide();
        }
        Ok(())
    }

    /// True while the idle listener is attached.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_listener()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the service loop: detaches the listener first, then cancels
    /// the machine's pending timer.
    pub fn shutdown(&self) {
        if let Some(handle) = self.lock_listener().take() {
            handle.abort();
        }
        self.io.shutdown();
    }

    /// Runs the decision step, catching and logging failures so the event
    /// loop keeps receiving transitions.
    fn decide(&self) {
        let span = liftbank_core::observability::elevator_span("decide", self.id.as_str());
        let _guard = span.enter();
        if let Err(error) = self.try_decide() {
            counter!(names::DECISION_ERRORS_TOTAL, labels::ELEVATOR => self.id.to_string())
                .increment(1);
            tracing::error!(elevator = %self.id, %error, "decision step failed");
        }
    }

    fn try_decide(&self) -> Result<()> {
        let IoState::Idle { at_floor, .. } = self.io.state() else {
            return Ok(());
        };
        let action = {
            let mut route = self.lock_route();
            if route.should_visit(at_floor) {
                route.visit_now(at_floor);
                Action::OpenDoors
            } else if route.is_empty() {
                Action::Stay
            } else {
                Action::Move(self.strategy.nr_floors_to_move(&route, at_floor))
            }
        };
        match action {
            Action::OpenDoors => self.io.open_doors(),
            Action::Move(0) | Action::Stay => Ok(()),
            Action::Move(floors) => self.io.move_by(floors),
        }
    }

    /// A poisoned lock still holds a coherent route; recover it.
    fn lock_route(&self) -> MutexGuard<'_, Route> {
        self.route.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Elevator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
