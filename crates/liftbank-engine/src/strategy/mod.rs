//! Travel strategies: pure planners that order stops and estimate durations.
//!
//! A strategy never owns state. It consumes a [`Route`] (always a planning
//! copy in live use) to produce an ordered list of stops, tells the elevator
//! which unit step to take next, and estimates how long a prospective ride
//! would take.
//!
//! ## Cooperative batching
//!
//! A single planning call can process arbitrarily many stops, and the
//! dispatcher runs planners across many elevators concurrently. Estimation
//! therefore goes through [`Strategy::batched_ordered_stops`], which yields
//! to the scheduler between slices of ten stops so concurrent estimations
//! interleave fairly. An iteration guard aborts planners that fail to
//! consume their route.

pub mod insert_order;
pub mod stop_en_route;

pub use insert_order::InsertOrder;
pub use stop_en_route::StopEnRoute;

use async_trait::async_trait;

use liftbank_core::{BankConfig, Floor};

use crate::error::{Error, Result};
use crate::route::Route;

/// Callback consulted after each stop a planner appends.
///
/// Receives the stop just appended and every stop appended so far; returning
/// true halts the traversal. Planners must consult this **before** checking
/// whether the target was reached, so both exits stay honorable.
pub type StopEarly<'a> = &'a mut (dyn FnMut(Floor, &[Floor]) -> bool + Send);

/// Sentinel returned when an estimate exceeds the configured limit.
pub const NO_ESTIMATE: i64 = -1;

/// Stops processed per cooperative slice.
const BATCH_SIZE: usize = 10;

/// Guard against planners that fail to consume the route.
const MAX_PLANNER_ITERATIONS: u32 = 1000;

/// How many recent stops to carry in an iteration-guard report.
const REPORTED_STOPS: usize = 10;

/// Timing inputs for duration estimation.
#[derive(Debug, Clone, Copy)]
pub struct EstimationTiming {
    /// Travel delay per floor step, in milliseconds.
    pub travel_time_per_floor_ms: i64,
    /// Doors-open hold duration, in milliseconds.
    pub door_open_time_ms: i64,
    /// Soft cap above which an estimate reports [`NO_ESTIMATE`].
    pub estimation_limit_ms: i64,
}

impl EstimationTiming {
    /// Derives estimation timing from a configuration snapshot.
    #[must_use]
    pub fn from_config(config: &BankConfig) -> Self {
        Self {
            travel_time_per_floor_ms: i64::try_from(config.travel_time_per_floor_ms)
                .unwrap_or(i64::MAX),
            door_open_time_ms: i64::try_from(config.door_open_time_ms).unwrap_or(i64::MAX),
            estimation_limit_ms: config.estimation_limit_ms,
        }
    }
}

fn advance_estimate(
    estimated_ms: &mut i64,
    last: &mut Floor,
    stop: Floor,
    timing: EstimationTiming,
) -> bool {
    *estimated_ms += timing.door_open_time_ms
        + i64::from(last.distance_to(stop)) * timing.travel_time_per_floor_ms;
    *last = stop;
    *estimated_ms > timing.estimation_limit_ms
}

/// A travel strategy.
///
/// The two provided async methods implement cooperative batching and
/// estimation on top of [`Strategy::ordered_stops`]; concrete planners only
/// define the traversal itself.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Short label used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Consumes `route`, producing the ordered list of stops from `current`.
    ///
    /// When `target` is given it is first inserted into the route
    /// (idempotently), and the traversal halts once `target` has been
    /// visited and appended. `stop_early` is consulted after every appended
    /// stop, before the target check.
    fn ordered_stops(
        &self,
        route: &mut Route,
        current: Floor,
        target: Option<Floor>,
        stop_early: StopEarly<'_>,
    ) -> Vec<Floor>;

    /// The next unit step toward the first queued key: `+1`, `-1`, or `0`
    /// when the queue is empty or the elevator is already there.
    fn nr_floors_to_move(&self, route: &Route, current: Floor) -> i32 {
        route
            .first()
            .map_or(0, |first| current.step_toward(first))
    }

    /// Whether this strategy refuses the ride outright. Default: never.
    fn is_ride_vetoed(
        &self,
        _route: &Route,
        _current: Floor,
        _pickup: Floor,
        _dropoff: Option<Floor>,
    ) -> bool {
        false
    }

    /// Runs [`Strategy::ordered_stops`] in cooperative slices.
    ///
    /// Yields to the scheduler every [`BATCH_SIZE`] stops; the caller's
    /// `stop_early` verdict is permanent and prevents the outer loop from
    /// restarting the planner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalBug`] when the planner exceeds the iteration
    /// guard without consuming its route.
    async fn batched_ordered_stops(
        &self,
        route: &mut Route,
        current: Floor,
        target: Option<Floor>,
        stop_early: StopEarly<'_>,
    ) -> Result<Vec<Floor>> {
        let mut stops: Vec<Floor> = Vec::new();
        let mut done = false;
        let mut in_slice = 0usize;
        let mut iterations = 0u32;

        // Planners insert the target themselves, but the length check below
        // must already see it on an otherwise empty route.
        if let Some(target) = target {
            route.add_ride(target, None);
        }

        loop {
            let position = stops.last().copied().unwrap_or(current);
            if done || route.is_empty() || target == Some(position) {
                break;
            }
            iterations += 1;
            if iterations > MAX_PLANNER_ITERATIONS {
                let recent: Vec<i32> = stops
                    .iter()
                    .rev()
                    .take(REPORTED_STOPS)
                    .map(|floor| floor.value())
                    .collect();
                return Err(Error::internal_bug(
                    "planner failed to consume the route",
                    format!(
                        "strategy={}, position={position}, iterations={iterations}, recent_stops={recent:?}",
                        self.name()
                    ),
                ));
            }
            tokio::task::yield_now().await;

            let mut slice = |stop: Floor, _batch: &[Floor]| {
                stops.push(stop);
                if (*stop_early)(stop, &stops) {
                    done = true;
                    return true;
                }
                in_slice += 1;
                if in_slice >= BATCH_SIZE {
                    in_slice = 0;
                    return true;
                }
                false
            };
            let _ = self.ordered_stops(route, position, target, &mut slice);
        }
        Ok(stops)
    }

    /// Estimated milliseconds to reach `pickup` (and `dropoff`, if given)
    /// on the supplied planning copy of a route.
    ///
    /// Returns a value within `[0, ESTIMATION_LIMIT]`, or [`NO_ESTIMATE`]
    /// once the accumulated time exceeds the limit. The route copy is
    /// consumed; the live route is never touched.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::InternalBug`] from the batched traversal.
    async fn estimate_pickup_dropoff_time(
        &self,
        mut route: Route,
        current: Floor,
        pickup: Floor,
        dropoff: Option<Floor>,
        timing: EstimationTiming,
    ) -> Result<i64> {
        let mut estimated_ms: i64 = 0;
        let mut last = current;

        if current == pickup {
            estimated_ms += timing.door_open_time_ms;
        } else {
            let mut accumulate =
                |stop: Floor, _stops: &[Floor]| advance_estimate(&mut estimated_ms, &mut last, stop, timing);
            self.batched_ordered_stops(&mut route, current, Some(pickup), &mut accumulate)
                .await?;
        }

        if estimated_ms <= timing.estimation_limit_ms {
            if let Some(dropoff) = dropoff {
                let mut accumulate =
                    |stop: Floor, _stops: &[Floor]| advance_estimate(&mut estimated_ms, &mut last, stop, timing);
                self.batched_ordered_stops(&mut route, pickup, Some(dropoff), &mut accumulate)
                    .await?;
            }
        }

        if estimated_ms > timing.estimation_limit_ms {
            Ok(NO_ESTIMATE)
        } else {
            Ok(estimated_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMING: EstimationTiming = EstimationTiming {
        travel_time_per_floor_ms: 2000,
        door_open_time_ms: 5000,
        estimation_limit_ms: 10_000,
    };

    /// A defective planner that reports stops without consuming the route.
    struct Stuck;

    impl Strategy for Stuck {
        fn name(&self) -> &'static str {
            "stuck"
        }

        fn ordered_stops(
            &self,
            _route: &mut Route,
            current: Floor,
            _target: Option<Floor>,
            stop_early: StopEarly<'_>,
        ) -> Vec<Floor> {
            let mut stops = Vec::new();
            loop {
                stops.push(current);
                if stop_early(current, &stops) {
                    break;
                }
            }
            stops
        }
    }

    #[tokio::test]
    async fn iteration_guard_aborts_defective_planners() {
        let mut route = Route::new();
        route.add_ride(Floor::new(5), None);

        let err = Stuck
            .batched_ordered_stops(&mut route, Floor::new(0), None, &mut |_, _| false)
            .await
            .unwrap_err();
        match err {
            Error::InternalBug { context, .. } => {
                assert!(context.contains("stuck"));
                assert!(context.contains("iterations=1001"));
            }
            other => panic!("expected InternalBug, got {other}"),
        }
    }

    #[tokio::test]
    async fn estimate_at_the_pickup_floor_is_one_door_hold() {
        let estimate = InsertOrder::new()
            .estimate_pickup_dropoff_time(Route::new(), Floor::new(3), Floor::new(3), None, TIMING)
            .await
            .unwrap();
        assert_eq!(estimate, 5000);
    }

    #[tokio::test]
    async fn estimate_within_limit_counts_travel_and_door() {
        // Empty route, two floors up: one door hold plus two travel steps.
        let estimate = InsertOrder::new()
            .estimate_pickup_dropoff_time(Route::new(), Floor::new(3), Floor::new(5), None, TIMING)
            .await
            .unwrap();
        assert_eq!(estimate, 5000 + 2 * 2000);
    }

    #[tokio::test]
    async fn estimate_over_limit_reports_the_sentinel() {
        let mut route = Route::new();
        route.add_ride(Floor::new(10), None);

        // Serving 10 first costs 5000 + 7 * 2000 and blows the cap before
        // the pickup is even reached.
        let estimate = InsertOrder::new()
            .estimate_pickup_dropoff_time(route, Floor::new(3), Floor::new(0), None, TIMING)
            .await
            .unwrap();
        assert_eq!(estimate, NO_ESTIMATE);
    }

    #[tokio::test]
    async fn estimate_covers_the_dropoff_leg() {
        let timing = EstimationTiming {
            travel_time_per_floor_ms: 500,
            door_open_time_ms: 1000,
            estimation_limit_ms: 10_000,
        };
        let estimate = InsertOrder::new()
            .estimate_pickup_dropoff_time(
                Route::new(),
                Floor::new(3),
                Floor::new(4),
                Some(Floor::new(6)),
                timing,
            )
            .await
            .unwrap();
        // Pickup: 1000 + 500. Dropoff: 1000 + 2 * 500.
        assert_eq!(estimate, 3500);
    }

    #[tokio::test]
    async fn estimates_are_bounded_by_the_limit() {
        for target in 0..=10 {
            let mut route = Route::new();
            route.add_ride(Floor::new(8), None);
            route.add_ride(Floor::new(1), None);
            let estimate = StopEnRoute::new()
                .estimate_pickup_dropoff_time(route, Floor::new(3), Floor::new(target), None, TIMING)
                .await
                .unwrap();
            assert!(
                estimate == NO_ESTIMATE || (0..=TIMING.estimation_limit_ms).contains(&estimate),
                "estimate {estimate} for target {target} out of bounds"
            );
        }
    }

    #[tokio::test]
    async fn batched_traversal_matches_the_unbatched_planner() {
        // More than one slice's worth of stops.
        let mut route = Route::new();
        for floor in 0..25 {
            route.add_ride(Floor::new(floor), None);
        }
        let mut unbatched_route = route.copy();

        let batched = InsertOrder::new()
            .batched_ordered_stops(&mut route, Floor::new(0), None, &mut |_, _| false)
            .await
            .unwrap();
        let unbatched = InsertOrder::new().ordered_stops(
            &mut unbatched_route,
            Floor::new(0),
            None,
            &mut |_, _| false,
        );
        assert_eq!(batched, unbatched);
        assert_eq!(batched.len(), 25);
    }
}
