//! The ordered stop queue for one elevator.
//!
//! A route is an ordered mapping whose keys are either a real stop
//! ([`Floor`]) or a [`ConditionalFloor`] placeholder reserving a dropoff's
//! position before its pickup has been served. It is realized as two
//! parallel structures: an insertion-ordered queue of tagged keys, and a
//! side map from floor to [`RouteItem`]. Iteration always goes by the
//! queue.
//!
//! Conditional semantics: `add_ride(pickup, dropoff)` records the dropoff
//! as a placeholder tag on the pickup's item. Serving the pickup
//! (`visit_now`) turns every such tag into a real stop while the tag itself
//! keeps holding its original queue slot; serving that floor later removes
//! the tag in the same pass as the stop.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use liftbank_core::Floor;

use crate::events::ButtonEvent;

static NEXT_TAG: AtomicU64 = AtomicU64::new(0);

/// A per-occurrence placeholder for a dropoff floor.
///
/// Two tags for the same floor never compare equal: identity comes from a
/// freshly minted nonce, so every `add_ride(pickup, dropoff)` reserves its
/// own slot in the queue. A tag converts to its floor value when read as an
/// ordering hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionalFloor {
    floor: Floor,
    nonce: u64,
}

impl ConditionalFloor {
    fn mint(floor: Floor) -> Self {
        Self {
            floor,
            nonce: NEXT_TAG.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The floor this tag stands for.
    #[must_use]
    pub const fn floor(&self) -> Floor {
        self.floor
    }
}

/// A key in the route's insertion-order queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKey {
    Stop(Floor),
    Conditional(ConditionalFloor),
}

impl RouteKey {
    const fn floor(self) -> Floor {
        match self {
            Self::Stop(floor) => floor,
            Self::Conditional(tag) => tag.floor(),
        }
    }
}

/// Per-floor data carried in the route.
#[derive(Debug, Clone)]
pub struct RouteItem {
    floor: Floor,
    visit_after: Vec<ConditionalFloor>,
    delete_on_visit: Vec<ConditionalFloor>,
    request_count: u32,
}

impl RouteItem {
    fn new(floor: Floor) -> Self {
        Self {
            floor,
            visit_after: Vec::new(),
            delete_on_visit: Vec::new(),
            request_count: 1,
        }
    }

    /// The floor this item represents.
    #[must_use]
    pub const fn floor(&self) -> Floor {
        self.floor
    }

    /// Placeholder tags that become real stops once this floor is served.
    #[must_use]
    pub fn visit_after(&self) -> &[ConditionalFloor] {
        &self.visit_after
    }

    /// Placeholder tags removed from the queue when this floor is served.
    #[must_use]
    pub fn delete_on_visit(&self) -> &[ConditionalFloor] {
        &self.delete_on_visit
    }

    /// How many times this floor has been requested.
    #[must_use]
    pub const fn request_count(&self) -> u32 {
        self.request_count
    }
}

/// Ordered, idempotent queue of floors for one elevator to visit.
#[derive(Debug)]
pub struct Route {
    order: VecDeque<RouteKey>,
    items: HashMap<Floor, RouteItem>,
    buttons: Option<broadcast::Sender<ButtonEvent>>,
}

impl Route {
    /// Creates an empty route with no button event stream.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
            items: HashMap::new(),
            buttons: None,
        }
    }

    /// Creates an empty route that reports button changes on `buttons`.
    #[must_use]
    pub fn with_button_events(buttons: broadcast::Sender<ButtonEvent>) -> Self {
        Self {
            order: VecDeque::new(),
            items: HashMap::new(),
            buttons: Some(buttons),
        }
    }

    /// Queues a ride.
    ///
    /// A new pickup appends a stop and lights its button; a repeated pickup
    /// only increments the existing item's request count. A dropoff mints a
    /// fresh [`ConditionalFloor`] placeholder at the end of the queue and
    /// records it on the pickup's item.
    pub fn add_ride(&mut self, pickup: Floor, dropoff: Option<Floor>) -> &RouteItem {
        let newly_pressed = match self.items.entry(pickup) {
            Entry::Vacant(slot) => {
                self.order.push_back(RouteKey::Stop(pickup));
                slot.insert(RouteItem::new(pickup));
                true
            }
            Entry::Occupied(slot) => {
                slot.into_mut().request_count += 1;
                false
            }
        };
        if newly_pressed {
            self.emit_button(pickup, true);
        }
        if let Some(dropoff) = dropoff {
            let tag = ConditionalFloor::mint(dropoff);
            self.order.push_back(RouteKey::Conditional(tag));
            if let Some(item) = self.items.get_mut(&pickup) {
                item.visit_after.push(tag);
            }
        }
        &self.items[&pickup]
    }

    /// True iff `floor` is a real stop. Placeholders never count.
    #[must_use]
    pub fn should_visit(&self, floor: Floor) -> bool {
        self.items.contains_key(&floor)
    }

    /// Serves `floor`, fulfilling its conditional dropoffs.
    ///
    /// Every `visit_after` tag becomes a real stop (its placeholder keeps
    /// its queue slot), every `delete_on_visit` tag is dropped from the
    /// queue, the stop itself is removed, and the floor's button turns off.
    /// Returns false without mutating when `floor` is not a stop.
    pub fn visit_now(&mut self, floor: Floor) -> bool {
        let Some(item) = self.items.remove(&floor) else {
            return false;
        };
        // Detach the stop key first so a dropoff back onto this same floor
        // survives as a genuinely new queue entry.
        self.order
            .retain(|key| !matches!(key, RouteKey::Stop(stop) if *stop == floor));
        for tag in &item.visit_after {
            self.add_ride(tag.floor(), None);
            if let Some(pending) = self.items.get_mut(&tag.floor()) {
                pending.delete_on_visit.push(*tag);
            }
        }
        for tag in &item.delete_on_visit {
            self.order
                .retain(|key| !matches!(key, RouteKey::Conditional(held) if held == tag));
        }
        self.emit_button(floor, false);
        true
    }

    /// The first key's floor value, placeholders included.
    #[must_use]
    pub fn first(&self) -> Option<Floor> {
        self.order.front().map(|key| key.floor())
    }

    /// Number of keys in the queue, placeholders included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no keys remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Floor value of every key in insertion order, placeholders included.
    pub fn floors(&self) -> impl Iterator<Item = Floor> + '_ {
        self.order.iter().map(|key| key.floor())
    }

    /// Floors of the real stops currently queued.
    #[must_use]
    pub fn pushed_buttons(&self) -> Vec<Floor> {
        self.order
            .iter()
            .filter_map(|key| match key {
                RouteKey::Stop(floor) => Some(*floor),
                RouteKey::Conditional(_) => None,
            })
            .collect()
    }

    /// The item backing a stop, if `floor` is one.
    #[must_use]
    pub fn item(&self, floor: Floor) -> Option<&RouteItem> {
        self.items.get(&floor)
    }

    /// A deep, independent copy detached from the button event stream.
    ///
    /// Strategies consume routes while planning; they always work on a
    /// copy, and a copy never emits.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            order: self.order.clone(),
            items: self.items.clone(),
            buttons: None,
        }
    }

    fn emit_button(&self, floor: Floor, active: bool) {
        if let Some(buttons) = &self.buttons {
            let _ = buttons.send(ButtonEvent { floor, active });
        }
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floors(route: &Route) -> Vec<i32> {
        route.floors().map(Floor::value).collect()
    }

    #[test]
    fn repeated_pickups_count_requests_without_growing() {
        let mut route = Route::new();
        route.add_ride(Floor::new(7), None);
        route.add_ride(Floor::new(7), None);
        route.add_ride(Floor::new(7), None);

        assert_eq!(route.len(), 1);
        assert_eq!(route.item(Floor::new(7)).unwrap().request_count(), 3);
    }

    #[test]
    fn iteration_preserves_first_insertion_order() {
        let mut route = Route::new();
        route.add_ride(Floor::new(7), None);
        route.add_ride(Floor::new(5), None);
        route.add_ride(Floor::new(7), None);
        route.add_ride(Floor::new(10), None);

        assert_eq!(floors(&route), vec![7, 5, 10]);
        assert_eq!(route.first(), Some(Floor::new(7)));
    }

    #[test]
    fn dropoff_reserves_a_slot_without_being_visitable() {
        let mut route = Route::new();
        route.add_ride(Floor::new(3), Some(Floor::new(4)));

        assert_eq!(route.len(), 2);
        assert!(route.should_visit(Floor::new(3)));
        assert!(!route.should_visit(Floor::new(4)));
        assert_eq!(floors(&route), vec![3, 4]);
        assert_eq!(route.pushed_buttons(), vec![Floor::new(3)]);
    }

    #[test]
    fn visiting_the_pickup_fulfills_the_dropoff_in_place() {
        // Mirrors the reference scenario: add_ride(3, 4); add_ride(10);
        // add_ride(13).
        let mut route = Route::new();
        route.add_ride(Floor::new(3), Some(Floor::new(4)));
        route.add_ride(Floor::new(10), None);
        route.add_ride(Floor::new(13), None);

        assert_eq!(route.len(), 4);
        assert_eq!(route.first(), Some(Floor::new(3)));

        assert!(route.visit_now(Floor::new(3)));

        // 3 is gone, a stop for 4 was appended, and the placeholder kept
        // its original second slot.
        assert_eq!(route.len(), 4);
        assert_eq!(route.first(), Some(Floor::new(4)));
        assert!(route.should_visit(Floor::new(4)));
        assert_eq!(floors(&route), vec![4, 10, 13, 4]);
    }

    #[test]
    fn visiting_the_dropoff_clears_its_placeholder() {
        let mut route = Route::new();
        route.add_ride(Floor::new(3), Some(Floor::new(4)));
        route.visit_now(Floor::new(3));

        assert!(route.visit_now(Floor::new(4)));
        assert!(route.is_empty());
    }

    #[test]
    fn duplicate_dropoffs_each_reserve_their_own_slot() {
        let mut route = Route::new();
        route.add_ride(Floor::new(1), Some(Floor::new(5)));
        route.add_ride(Floor::new(2), Some(Floor::new(5)));

        assert_eq!(route.len(), 4);
        route.visit_now(Floor::new(1));
        // One placeholder fulfilled: 5 became a real stop.
        assert!(route.should_visit(Floor::new(5)));
        assert_eq!(route.item(Floor::new(5)).unwrap().request_count(), 1);

        route.visit_now(Floor::new(2));
        assert_eq!(route.item(Floor::new(5)).unwrap().request_count(), 2);

        route.visit_now(Floor::new(5));
        assert!(route.is_empty());
    }

    #[test]
    fn visit_now_on_absent_floor_is_a_noop() {
        let mut route = Route::new();
        route.add_ride(Floor::new(2), None);

        assert!(!route.visit_now(Floor::new(9)));
        assert_eq!(route.len(), 1);
    }

    #[test]
    fn copy_is_independent_of_the_original() {
        let mut route = Route::new();
        route.add_ride(Floor::new(3), Some(Floor::new(4)));
        route.add_ride(Floor::new(10), None);

        let mut copy = route.copy();
        copy.visit_now(Floor::new(3));
        copy.visit_now(Floor::new(4));
        copy.visit_now(Floor::new(10));

        assert!(copy.is_empty());
        assert_eq!(route.len(), 3);
        assert!(route.should_visit(Floor::new(3)));
        assert_eq!(route.item(Floor::new(3)).unwrap().visit_after().len(), 1);
    }

    #[test]
    fn button_events_track_presses_and_visits() {
        let (tx, mut rx) = broadcast::channel(16);
        let mut route = Route::with_button_events(tx);

        route.add_ride(Floor::new(5), Some(Floor::new(8)));
        route.add_ride(Floor::new(5), None);
        route.visit_now(Floor::new(5));

        let on5 = rx.try_recv().unwrap();
        assert_eq!(on5, ButtonEvent { floor: Floor::new(5), active: true });
        // Serving 5 first lights 8 (fulfilled dropoff), then clears 5.
        let on8 = rx.try_recv().unwrap();
        assert_eq!(on8, ButtonEvent { floor: Floor::new(8), active: true });
        let off5 = rx.try_recv().unwrap();
        assert_eq!(off5, ButtonEvent { floor: Floor::new(5), active: false });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn copies_never_emit_button_events() {
        let (tx, mut rx) = broadcast::channel(16);
        let mut route = Route::with_button_events(tx);
        route.add_ride(Floor::new(5), None);
        let _ = rx.try_recv().unwrap();

        let mut copy = route.copy();
        copy.add_ride(Floor::new(6), None);
        copy.visit_now(Floor::new(5));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropoff_back_onto_the_pickup_floor_survives() {
        let mut route = Route::new();
        route.add_ride(Floor::new(4), Some(Floor::new(4)));

        route.visit_now(Floor::new(4));
        assert!(route.should_visit(Floor::new(4)));
        // The fulfilled stop and its placeholder remain.
        assert_eq!(route.len(), 2);

        route.visit_now(Floor::new(4));
        assert!(route.is_empty());
    }
}
