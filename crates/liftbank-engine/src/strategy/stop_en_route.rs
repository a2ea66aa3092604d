//! The stop-en-route travel strategy.

use liftbank_core::Floor;

use crate::route::Route;
use crate::strategy::{StopEarly, Strategy};

/// Insertion order with opportunistic detours.
///
/// While heading for the next queued stop, every floor along the inclusive
/// range `[current, next_stop]` that is itself requested gets served on the
/// way. Floors not in the route are passed silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopEnRoute;

impl StopEnRoute {
    /// Creates the planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Strategy for StopEnRoute {
    fn name(&self) -> &'static str {
        "stop_en_route"
    }

    fn ordered_stops(
        &self,
        route: &mut Route,
        current: Floor,
        target: Option<Floor>,
        stop_early: StopEarly<'_>,
    ) -> Vec<Floor> {
        if let Some(target) = target {
            route.add_ride(target, None);
        }
        let mut stops = Vec::new();
        let mut position = current;
        'queue: while let Some(next_stop) = route.first() {
            let step = position.step_toward(next_stop);
            let mut floor = position;
            loop {
                if route.visit_now(floor) {
                    stops.push(floor);
                    if stop_early(floor, &stops) {
                        break 'queue;
                    }
                    if target == Some(floor) {
                        break 'queue;
                    }
                }
                if floor == next_stop {
                    break;
                }
                floor = floor.offset(step);
            }
            position = next_stop;
            if route.first() == Some(next_stop) {
                // The range walk always serves its own destination; bail out
                // rather than spin if that invariant ever breaks.
                tracing::warn!(floor = %next_stop, "next stop survived its own range walk");
                break;
            }
        }
        stops
    }
}
