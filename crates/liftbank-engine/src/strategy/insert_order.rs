//! The insertion-order travel strategy.

use liftbank_core::Floor;

use crate::route::Route;
use crate::strategy::{StopEarly, Strategy};

/// Visits floors strictly in the order their buttons were first pressed.
///
/// No detours: a floor requested later is served later, even when the
/// elevator passes it on the way to an earlier request.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertOrder;

impl InsertOrder {
    /// Creates the planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Strategy for InsertOrder {
    fn name(&self) -> &'static str {
        "insert_order"
    }

    fn ordered_stops(
        &self,
        route: &mut Route,
        _current: Floor,
        target: Option<Floor>,
        stop_early: StopEarly<'_>,
    ) -> Vec<Floor> {
        if let Some(target) = target {
            route.add_ride(target, None);
        }
        let mut stops = Vec::new();
        while let Some(next) = route.first() {
            if route.visit_now(next) {
                stops.push(next);
                if stop_early(next, &stops) {
                    break;
                }
                if target == Some(next) {
                    break;
                }
            } else {
                // A leading placeholder is always backed by a real stop by
                // the time it reaches the front; bail out rather than spin
                // if that invariant ever breaks.
                tracing::warn!(floor = %next, "unbacked route key at queue front");
                break;
            }
        }
        stops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_of(floors: &[i32]) -> Route {
        let mut route = Route::new();
        for &floor in floors {
            route.add_ride(Floor::new(floor), None);
        }
        route
    }

    fn no_early(_: Floor, _: &[Floor]) -> bool {
        false
    }

    #[test]
    fn visits_in_insertion_order() {
        // Reference scenario: 7, 5, 10 requested from floor 3.
        let mut route = route_of(&[7, 5, 10]);
        let stops =
            InsertOrder::new().ordered_stops(&mut route, Floor::new(3), None, &mut no_early);
        assert_eq!(
            stops,
            vec![Floor::new(7), Floor::new(5), Floor::new(10)]
        );
        assert!(route.is_empty());
    }

    #[test]
    fn target_is_inserted_and_halts_the_traversal() {
        let mut route = route_of(&[7, 5]);
        let stops = InsertOrder::new().ordered_stops(
            &mut route,
            Floor::new(3),
            Some(Floor::new(5)),
            &mut no_early,
        );
        assert_eq!(stops, vec![Floor::new(7), Floor::new(5)]);
        assert!(route.is_empty());
    }

    #[test]
    fn target_insertion_is_idempotent() {
        let mut route = route_of(&[5, 9]);
        let stops = InsertOrder::new().ordered_stops(
            &mut route,
            Floor::new(3),
            Some(Floor::new(5)),
            &mut no_early,
        );
        // 5 is already queued first; 9 is never reached.
        assert_eq!(stops, vec![Floor::new(5)]);
        assert_eq!(route.len(), 1);
    }

    #[test]
    fn stop_early_halts_before_the_target_check() {
        let mut route = route_of(&[7]);
        let mut seen = Vec::new();
        let stops = InsertOrder::new().ordered_stops(
            &mut route,
            Floor::new(3),
            Some(Floor::new(7)),
            &mut |stop, so_far| {
                seen.push((stop, so_far.len()));
                true
            },
        );
        // The callback fired on the very stop that was also the target.
        assert_eq!(stops, vec![Floor::new(7)]);
        assert_eq!(seen, vec![(Floor::new(7), 1)]);
    }

    #[test]
    fn conditional_dropoffs_are_served_at_their_reserved_slot() {
        let mut route = Route::new();
        route.add_ride(Floor::new(3), Some(Floor::new(4)));
        route.add_ride(Floor::new(10), None);

        let stops =
            InsertOrder::new().ordered_stops(&mut route, Floor::new(0), None, &mut no_early);
        // 4's placeholder sits between 3 and 10.
        assert_eq!(
            stops,
            vec![Floor::new(3), Floor::new(4), Floor::new(10)]
        );
        assert!(route.is_empty());
    }

    #[test]
    fn step_sign_follows_the_first_stop() {
        let planner = InsertOrder::new();
        let route = route_of(&[7]);
        assert_eq!(planner.nr_floors_to_move(&route, Floor::new(3)), 1);
        assert_eq!(planner.nr_floors_to_move(&route, Floor::new(9)), -1);
        assert_eq!(planner.nr_floors_to_move(&route, Floor::new(7)), 0);
        assert_eq!(planner.nr_floors_to_move(&Route::new(), Floor::new(3)), 0);
    }
}
