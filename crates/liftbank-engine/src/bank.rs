//! The bank dispatcher: selects an elevator per ride and aggregates events.
//!
//! Selection is a three-tier policy:
//!
//! 1. **Free-first** (when enabled): the first idle elevator with an empty
//!    route, in insertion order.
//! 2. **Minimum estimate**: every candidate estimates the ride
//!    concurrently (fork-join); the smallest estimate under the limit wins,
//!    ties broken by insertion order.
//! 3. **Shortest route**: when every estimate exceeds the limit, the
//!    candidate with the fewest pending stops wins, ties broken by
//!    insertion order.
//!
//! Elevators whose strategy vetoes the ride never become candidates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future;
use metrics::{counter, histogram};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use liftbank_core::{BankConfig, ElevatorId, Floor, FloorRange};

use crate::elevator::Elevator;
use crate::error::{Error, Result};
use crate::events::{AvailabilityEvent, ElevatorButtonEvent, ElevatorStateChange};
use crate::io::IoState;
use crate::metrics::{labels, names, TimingGuard};
use crate::strategy::{Strategy, StopEnRoute, NO_ESTIMATE};

/// Capacity of each aggregated event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct BankInner {
    /// Insertion order is selection order; the pool stays small enough that
    /// lookups scan it.
    elevators: Vec<Arc<Elevator>>,
    forwarders: HashMap<ElevatorId, JoinHandle<()>>,
}

struct BankEvents {
    state: broadcast::Sender<ElevatorStateChange>,
    availability: broadcast::Sender<AvailabilityEvent>,
    buttons: broadcast::Sender<ElevatorButtonEvent>,
    per_elevator: Mutex<HashMap<ElevatorId, broadcast::Sender<ElevatorStateChange>>>,
}

/// A pool of elevators behind a single dispatch surface.
///
/// Banks must be created within a Tokio runtime: adding an elevator spawns
/// the task that re-emits its events on the aggregated streams.
pub struct Bank {
    config: BankConfig,
    range: FloorRange,
    inner: Mutex<BankInner>,
    events: BankEvents,
}

impl Bank {
    /// Creates a bank with `NR_OF_ELEVATORS` elevators, all using the
    /// [`StopEnRoute`] strategy.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration snapshot is invalid.
    pub fn new(config: BankConfig) -> Result<Self> {
        Self::with_strategy(config, |_| Arc::new(StopEnRoute::new()) as Arc<dyn Strategy>)
    }

    /// Creates a bank whose elevators use the strategies produced by
    /// `strategy_for` (called with each shaft's 1-based index).
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration snapshot is invalid.
    pub fn with_strategy<F>(config: BankConfig, strategy_for: F) -> Result<Self>
    where
        F: Fn(usize) -> Arc<dyn Strategy>,
    {
        config.validate()?;
        let range = config.floor_range()?;
        let bank = Self {
            range,
            inner: Mutex::new(BankInner {
                elevators: Vec::new(),
                forwarders: HashMap::new(),
            }),
            events: BankEvents {
                state: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
                availability: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
                buttons: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
                per_elevator: Mutex::new(HashMap::new()),
            },
            config,
        };
        for index in 1..=bank.config.nr_of_elevators {
            let elevator = Elevator::new(
                ElevatorId::indexed(index),
                strategy_for(index),
                &bank.config,
            )?;
            bank.add_elevator(elevator)?;
        }
        Ok(bank)
    }

    /// The configuration snapshot this bank was built from.
    #[must_use]
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Registers an elevator.
    ///
    /// Re-registering the same instance warns and does nothing. When the
    /// bank is already running, the elevator is soft-started. Its
    /// transitions are re-emitted on the aggregated `state` stream and its
    /// per-elevator stream; the `added` availability event precedes any of
    /// them.
    ///
    /// # Errors
    ///
    /// Returns a [`Error::Domain`] error when a different instance is
    /// already registered under the same id.
    pub fn add_elevator(&self, elevator: Arc<Elevator>) -> Result<()> {
        let id = elevator.id().clone();
        let was_running = {
            let mut inner = self.lock_inner();
            if let Some(existing) = inner.elevators.iter().find(|held| held.id() == &id) {
                if Arc::ptr_eq(existing, &elevator) {
                    tracing::warn!(elevator = %id, "elevator already registered; ignoring");
                    return Ok(());
                }
                return Err(Error::domain(format!(
                    "a different elevator is already registered under id {id}"
                )));
            }
            let was_running =
                !inner.elevators.is_empty() && inner.elevators.iter().all(|held| held.is_running());
            inner.elevators.push(Arc::clone(&elevator));
            was_running
        };
        if was_running {
            elevator.start(true)?;
        }
        let _ = self.events.availability.send(AvailabilityEvent::Added {
            elevator: id.clone(),
            state: elevator.state(),
        });
        let forwarder = self.spawn_forwarder(&id, &elevator);
        self.lock_inner().forwarders.insert(id, forwarder);
        Ok(())
    }

    /// Deregisters an elevator, shutting it down.
    ///
    /// Unknown ids warn and do nothing. The `removed` availability event
    /// follows the elevator's last re-emitted state event.
    pub fn remove_elevator(&self, id: &ElevatorId) {
        let (elevator, forwarder) = {
            let mut inner = self.lock_inner();
            let Some(index) = inner.elevators.iter().position(|held| held.id() == id) else {
                tracing::warn!(elevator = %id, "cannot remove unknown elevator");
                return;
            };
            let elevator = inner.elevators.remove(index);
            let forwarder = inner.forwarders.remove(id);
            (elevator, forwarder)
        };
        elevator.shutdown();
        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        self.lock_per_elevator().remove(id);
        let _ = self
            .events
            .availability
            .send(AvailabilityEvent::Removed { elevator: id.clone() });
    }

    /// Registered elevator ids, in insertion order.
    #[must_use]
    pub fn list_elevators(&self) -> Vec<ElevatorId> {
        self.lock_inner()
            .elevators
            .iter()
            .map(|elevator| elevator.id().clone())
            .collect()
    }

    /// The registered elevator with this id.
    ///
    /// # Errors
    ///
    /// Returns a [`Error::Domain`] error for unknown ids.
    pub fn elevator(&self, id: &ElevatorId) -> Result<Arc<Elevator>> {
        self.lock_inner()
            .elevators
            .iter()
            .find(|held| held.id() == id)
            .cloned()
            .ok_or_else(|| Error::domain(format!("unknown elevator id {id}")))
    }

    /// One elevator's current state.
    ///
    /// # Errors
    ///
    /// Returns a [`Error::Domain`] error for unknown ids.
    pub fn elevator_state(&self, id: &ElevatorId) -> Result<IoState> {
        Ok(self.elevator(id)?.state())
    }

    /// Every elevator's current state, in insertion order.
    #[must_use]
    pub fn all_elevator_states(&self) -> Vec<(ElevatorId, IoState)> {
        self.snapshot()
            .into_iter()
            .map(|elevator| (elevator.id().clone(), elevator.state()))
            .collect()
    }

    /// One elevator's lit buttons.
    ///
    /// # Errors
    ///
    /// Returns a [`Error::Domain`] error for unknown ids.
    pub fn pushed_buttons(&self, id: &ElevatorId) -> Result<Vec<Floor>> {
        Ok(self.elevator(id)?.pushed_buttons())
    }

    /// Every elevator's lit buttons, in insertion order.
    #[must_use]
    pub fn all_pushed_buttons(&self) -> Vec<(ElevatorId, Vec<Floor>)> {
        self.snapshot()
            .into_iter()
            .map(|elevator| (elevator.id().clone(), elevator.pushed_buttons()))
            .collect()
    }

    /// Dispatches a ride, returning the id of the elevator that accepted
    /// it.
    ///
    /// # Errors
    ///
    /// Returns an error when a floor is out of bounds or every elevator
    /// vetoed the ride.
    pub async fn add_ride(&self, pickup: Floor, dropoff: Option<Floor>) -> Result<ElevatorId> {
        if let Err(error) = self.validate_ride(pickup, dropoff) {
            counter!(names::RIDES_REJECTED_TOTAL, labels::REASON => "out_of_bounds")
                .increment(1);
            return Err(error);
        }

        let candidates: Vec<Arc<Elevator>> = self
            .snapshot()
            .into_iter()
            .filter(|elevator| !elevator.is_ride_vetoed(pickup, dropoff))
            .collect();
        if candidates.is_empty() {
            counter!(names::RIDES_REJECTED_TOTAL, labels::REASON => "all_vetoed").increment(1);
            return Err(Error::domain(format!(
                "all elevators vetoed the ride from floor {pickup}"
            )));
        }

        if self.config.use_free_first {
            if let Some(elevator) = candidates.iter().find(|elevator| elevator.is_free()) {
                return self.assign(elevator, pickup, dropoff, "free_first");
            }
        }

        let estimates = {
            let _timer = TimingGuard::new(|duration| {
                histogram!(names::ESTIMATION_DURATION_SECONDS).record(duration.as_secs_f64());
            });
            future::join_all(candidates.iter().map(|elevator| async move {
                match elevator.estimate_pickup_dropoff_time(pickup, dropoff).await {
                    Ok(estimate) => estimate,
                    Err(error) => {
                        tracing::warn!(
                            elevator = %elevator.id(),
                            %error,
                            "estimation failed; treating as no estimate"
                        );
                        NO_ESTIMATE
                    }
                }
            }))
            .await
        };

        if let Some((elevator, _)) = candidates
            .iter()
            .zip(&estimates)
            .filter(|(_, estimate)| **estimate > NO_ESTIMATE)
            .min_by_key(|(_, estimate)| **estimate)
        {
            return self.assign(elevator, pickup, dropoff, "min_estimate");
        }

        // Every candidate exceeded the estimation limit.
        let Some(elevator) = candidates
            .iter()
            .min_by_key(|elevator| elevator.route_length())
        else {
            return Err(Error::internal_bug(
                "no candidate left after selection",
                format!("pickup={pickup}, candidates={}", candidates.len()),
            ));
        };
        self.assign(elevator, pickup, dropoff, "shortest_route")
    }

    /// Starts every elevator.
    ///
    /// # Errors
    ///
    /// Propagates the first hard-start failure.
    pub fn start(&self) -> Result<()> {
        for elevator in self.snapshot() {
            elevator.start(false)?;
        }
        Ok(())
    }

    /// Shuts down every elevator. The pool stays registered.
    pub fn shutdown(&self) {
        for elevator in self.snapshot() {
            elevator.shutdown();
        }
    }

    /// True iff the bank holds elevators and every one reports running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let inner = self.lock_inner();
        !inner.elevators.is_empty() && inner.elevators.iter().all(|elevator| elevator.is_running())
    }

    /// Subscribes to the aggregated state stream.
    #[must_use]
    pub fn subscribe_states(&self) -> broadcast::Receiver<ElevatorStateChange> {
        self.events.state.subscribe()
    }

    /// Subscribes to pool membership changes.
    #[must_use]
    pub fn subscribe_availability(&self) -> broadcast::Receiver<AvailabilityEvent> {
        self.events.availability.subscribe()
    }

    /// Subscribes to the aggregated button stream.
    #[must_use]
    pub fn subscribe_buttons(&self) -> broadcast::Receiver<ElevatorButtonEvent> {
        self.events.buttons.subscribe()
    }

    /// Subscribes to a single elevator's state stream.
    ///
    /// The channel exists independently of registration, so a subscription
    /// may be taken out before the elevator is added.
    #[must_use]
    pub fn subscribe_elevator(&self, id: &ElevatorId) -> broadcast::Receiver<ElevatorStateChange> {
        self.per_elevator_sender(id).subscribe()
    }

    fn validate_ride(&self, pickup: Floor, dropoff: Option<Floor>) -> Result<()> {
        self.range.validate(pickup)?;
        if let Some(dropoff) = dropoff {
            self.range.validate(dropoff)?;
        }
        Ok(())
    }

    fn assign(
        &self,
        elevator: &Arc<Elevator>,
        pickup: Floor,
        dropoff: Option<Floor>,
        tier: &'static str,
    ) -> Result<ElevatorId> {
        elevator.add_ride(pickup, dropoff)?;
        counter!(names::RIDES_DISPATCHED_TOTAL, labels::TIER => tier).increment(1);
        tracing::debug!(
            elevator = %elevator.id(),
            pickup = %pickup,
            dropoff = ?dropoff.map(|floor| floor.value()),
            tier,
            "ride assigned"
        );
        Ok(elevator.id().clone())
    }

    fn spawn_forwarder(&self, id: &ElevatorId, elevator: &Arc<Elevator>) -> JoinHandle<()> {
        let mut changes = elevator.events().subscribe_changes();
        let mut buttons = elevator.subscribe_buttons();
        let state_tx = self.events.state.clone();
        let buttons_tx = self.events.buttons.clone();
        let per_elevator_tx = self.per_elevator_sender(id);
        let id = id.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    change = changes.recv() => match change {
                        Ok(change) => {
                            let event = ElevatorStateChange {
                                elevator: id.clone(),
                                from: change.from,
                                to: change.to,
                            };
                            let _ = per_elevator_tx.send(event.clone());
                            let _ = state_tx.send(event);
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(elevator = %id, missed, "state re-emitter lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    button = buttons.recv() => match button {
                        Ok(button) => {
                            let _ = buttons_tx.send(ElevatorButtonEvent {
                                elevator: id.clone(),
                                floor: button.floor,
                                active: button.active,
                            });
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(elevator = %id, missed, "button re-emitter lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    fn per_elevator_sender(&self, id: &ElevatorId) -> broadcast::Sender<ElevatorStateChange> {
        self.lock_per_elevator()
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .clone()
    }

    fn snapshot(&self) -> Vec<Arc<Elevator>> {
        self.lock_inner().elevators.clone()
    }

    /// A poisoned lock still holds a coherent pool; recover it.
    fn lock_inner(&self) -> MutexGuard<'_, BankInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_per_elevator(
        &self,
    ) -> MutexGuard<'_, HashMap<ElevatorId, broadcast::Sender<ElevatorStateChange>>> {
        self.events
            .per_elevator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BankConfig {
        BankConfig {
            initial_floor: 3,
            ..BankConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn elevators_are_listed_in_insertion_order() {
        let bank = Bank::new(config()).unwrap();
        let ids: Vec<String> = bank
            .list_elevators()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["elevator-1", "elevator-2", "elevator-3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn re_adding_the_same_instance_is_a_noop() {
        let bank = Bank::new(config()).unwrap();
        let elevator = bank.elevator(&ElevatorId::indexed(2)).unwrap();
        bank.add_elevator(elevator).unwrap();
        assert_eq!(bank.list_elevators().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn a_different_instance_under_a_taken_id_is_rejected() {
        let bank = Bank::new(config()).unwrap();
        let imposter = Elevator::new(
            ElevatorId::indexed(2),
            Arc::new(StopEnRoute::new()),
            &config(),
        )
        .unwrap();
        assert!(matches!(
            bank.add_elevator(imposter),
            Err(Error::Domain { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ids_are_domain_errors() {
        let bank = Bank::new(config()).unwrap();
        let ghost: ElevatorId = "ghost".parse().unwrap();
        assert!(bank.elevator_state(&ghost).is_err());
        assert!(bank.pushed_buttons(&ghost).is_err());
        // Removal of an unknown id only warns.
        bank.remove_elevator(&ghost);
        assert_eq!(bank.list_elevators().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn an_emptied_bank_is_not_running() {
        let bank = Bank::new(BankConfig {
            nr_of_elevators: 1,
            ..config()
        })
        .unwrap();
        bank.start().unwrap();
        assert!(bank.is_running());

        bank.remove_elevator(&ElevatorId::indexed(1));
        assert!(!bank.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn adding_to_a_running_bank_soft_starts_the_elevator() {
        let bank = Bank::new(config()).unwrap();
        bank.start().unwrap();

        let late = Elevator::new(
            ElevatorId::indexed(4),
            Arc::new(StopEnRoute::new()),
            &config(),
        )
        .unwrap();
        bank.add_elevator(Arc::clone(&late)).unwrap();
        assert!(late.is_running());
        assert!(bank.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_keeps_the_pool_registered() {
        let bank = Bank::new(config()).unwrap();
        bank.start().unwrap();
        bank.shutdown();
        assert!(!bank.is_running());
        assert_eq!(bank.list_elevators().len(), 3);
    }
}
