//! Contact Pair Registry
//!
//! Persistent records of body-pair contact that survive across steps for
//! stable stacking and solver convergence. Each [`Pair`] carries two
//! [`Contact`] slots whose accumulated impulses warm-start the next step;
//! contacts are matched to this step's support points by vertex identity so
//! an impulse keeps following the feature it belongs to.
//!
//! Pairs are keyed by the ordered part ids, so the key for (A, B) and (B, A)
//! is identical. Ended pairs leave the registry immediately unless one of
//! their bodies is sleeping, in which case they are kept so the stack does
//! not jitter on wake.

#[cfg(not(feature = "std"))]
use alloc::collections::BTreeMap;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::collections::BTreeMap;

use crate::body::BodyStore;
use crate::collision::{Collision, Support};
use crate::common::BodyId;

// ============================================================================
// Keys and Contacts
// ============================================================================

/// Order-independent identifier of a body pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    /// Lower body id
    pub a: BodyId,
    /// Higher body id
    pub b: BodyId,
}

impl PairKey {
    /// Build the canonical key for two bodies, in either order.
    #[inline]
    #[must_use]
    pub fn new(a: BodyId, b: BodyId) -> Self {
        if a <= b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }
}

/// One tracked contact point with its warm-start impulses.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Contact {
    /// The support vertex this slot tracks
    pub vertex: Support,
    /// Accumulated impulse along the collision normal
    pub normal_impulse: f64,
    /// Accumulated impulse along the collision tangent
    pub tangent_impulse: f64,
}

impl Contact {
    #[inline]
    fn tracks(&self, support: &Support) -> bool {
        self.vertex.body == support.body && self.vertex.index == support.index
    }
}

// ============================================================================
// Pair
// ============================================================================

/// A persistent contact record between two parts.
#[derive(Clone, Copy, Debug)]
pub struct Pair {
    /// Canonical pair key
    pub key: PairKey,
    /// The most recent collision measured for this pair
    pub collision: Collision,
    /// Contact slots; `contact_count` of them are valid
    pub contacts: [Contact; 2],
    /// Number of active contacts (1 or 2)
    pub contact_count: usize,
    /// Current separation along the normal, updated by the position solver
    pub separation: f64,
    /// Whether the pair collided this step
    pub is_active: bool,
    pub(crate) confirmed_active: bool,
    /// Whether either part is a sensor (detected but not resolved)
    pub is_sensor: bool,
    /// Timestamp of first contact
    pub time_created: f64,
    /// Timestamp of the last update
    pub time_updated: f64,
    /// Pair friction: the minimum of both parents
    pub friction: f64,
    /// Pair static friction: the maximum of both parents
    pub friction_static: f64,
    /// Pair restitution: the maximum of both parents
    pub restitution: f64,
    /// Pair slop: the maximum of both parents
    pub slop: f64,
    /// Sum of both parents' inverse masses
    pub inverse_mass: f64,
}

impl Pair {
    /// Create a pair for a fresh collision.
    #[must_use]
    pub fn create(collision: Collision, timestamp: f64, bodies: &BodyStore) -> Self {
        let is_sensor = bodies
            .get(collision.body_a)
            .map_or(false, |body| body.is_sensor)
            || bodies
                .get(collision.body_b)
                .map_or(false, |body| body.is_sensor);

        let mut pair = Self {
            key: PairKey::new(collision.body_a, collision.body_b),
            collision,
            contacts: [Contact::default(); 2],
            contact_count: 0,
            separation: 0.0,
            is_active: false,
            confirmed_active: true,
            is_sensor,
            time_created: timestamp,
            time_updated: timestamp,
            friction: 0.0,
            friction_static: 0.0,
            restitution: 0.0,
            slop: 0.0,
            inverse_mass: 0.0,
        };
        pair.update(collision, timestamp, bodies);
        pair
    }

    /// Refresh the pair with this step's collision: material coefficients
    /// from the parents, contacts re-matched to supports by vertex identity.
    pub fn update(&mut self, collision: Collision, timestamp: f64, bodies: &BodyStore) {
        if let (Some(parent_a), Some(parent_b)) = (
            bodies.get(collision.parent_a),
            bodies.get(collision.parent_b),
        ) {
            self.inverse_mass = parent_a.inverse_mass + parent_b.inverse_mass;
            self.friction = parent_a.friction.min(parent_b.friction);
            self.friction_static = parent_a.friction_static.max(parent_b.friction_static);
            self.restitution = parent_a.restitution.max(parent_b.restitution);
            self.slop = parent_a.slop.max(parent_b.slop);
        }

        for i in 0..collision.support_count {
            let support = collision.supports[i];
            if self.contacts[i].tracks(&support) {
                self.contacts[i].vertex = support;
            } else if self.contacts[1 - i].tracks(&support) {
                // the contact persisted but moved slots, keep its impulses
                self.contacts.swap(0, 1);
                self.contacts[i].vertex = support;
            } else {
                self.contacts[i] = Contact {
                    vertex: support,
                    normal_impulse: 0.0,
                    tangent_impulse: 0.0,
                };
            }
        }

        self.contact_count = collision.support_count;
        self.collision = collision;
        self.separation = collision.depth;
        self.is_active = true;
        self.time_updated = timestamp;
    }

    /// Deactivate the pair.
    pub fn set_active(&mut self, is_active: bool, timestamp: f64) {
        self.is_active = is_active;
        self.time_updated = timestamp;
    }
}

// ============================================================================
// PairRegistry
// ============================================================================

/// All live pairs, keyed for O(log n) lookup, plus the per-step transition
/// buffers consumed by collision events.
#[derive(Clone, Debug, Default)]
pub struct PairRegistry {
    /// Live pairs in creation order
    pub list: Vec<Pair>,
    table: BTreeMap<PairKey, usize>,
    /// Pairs that began colliding during the last update
    pub collision_start: Vec<Pair>,
    /// Pairs that stayed in collision during the last update
    pub collision_active: Vec<Pair>,
    /// Pairs that stopped colliding during the last update
    pub collision_end: Vec<Pair>,
}

impl PairRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a pair by key.
    #[must_use]
    pub fn get(&self, key: PairKey) -> Option<&Pair> {
        self.table.get(&key).and_then(|&index| self.list.get(index))
    }

    /// Number of live pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the registry holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drop every pair and transition buffer.
    pub fn clear(&mut self) {
        self.list.clear();
        self.table.clear();
        self.collision_start.clear();
        self.collision_active.clear();
        self.collision_end.clear();
    }

    /// Fold this step's collisions into the registry.
    ///
    /// Known pairs are refreshed in place (warm-start impulses survive),
    /// unknown ones are created. Pairs without a collision this step are
    /// deactivated, reported once in `collision_end`, and dropped unless a
    /// sleeping body still holds them.
    pub fn update(&mut self, collisions: Vec<Collision>, timestamp: f64, bodies: &BodyStore) {
        self.collision_start.clear();
        self.collision_active.clear();
        self.collision_end.clear();

        for pair in &mut self.list {
            pair.confirmed_active = false;
        }

        for collision in collisions {
            let key = PairKey::new(collision.body_a, collision.body_b);
            match self.table.get(&key).copied() {
                Some(index) => {
                    let (snapshot, was_active) = {
                        let pair = &mut self.list[index];
                        let was_active = pair.is_active;
                        pair.update(collision, timestamp, bodies);
                        pair.confirmed_active = true;
                        (*pair, was_active)
                    };
                    if was_active {
                        self.collision_active.push(snapshot);
                    } else {
                        self.collision_start.push(snapshot);
                    }
                }
                None => {
                    let pair = Pair::create(collision, timestamp, bodies);
                    self.collision_start.push(pair);
                    self.table.insert(key, self.list.len());
                    self.list.push(pair);
                }
            }
        }

        // deactivate pairs that were active but saw no collision this step
        for pair in &mut self.list {
            if pair.is_active && !pair.confirmed_active {
                pair.set_active(false, timestamp);
                self.collision_end.push(*pair);
            }
        }

        // drop ended pairs, keeping those held open by a sleeping body
        let before = self.list.len();
        self.list.retain(|pair| {
            if pair.confirmed_active {
                return true;
            }
            let a_sleeping = bodies
                .get(pair.collision.body_a)
                .map_or(false, |body| body.is_sleeping);
            let b_sleeping = bodies
                .get(pair.collision.body_b)
                .map_or(false, |body| body.is_sleeping);
            a_sleeping || b_sleeping
        });

        if self.list.len() != before {
            self.table.clear();
            for (index, pair) in self.list.iter().enumerate() {
                self.table.insert(pair.key, index);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyOptions, BodyStore};
    use crate::collision;
    use crate::math::Vector;

    fn add_square(store: &mut BodyStore, size: f64, position: Vector) -> BodyId {
        let id = store.next_id();
        store.insert(
            Body::standalone(
                id,
                BodyOptions {
                    vertices: vec![
                        Vector::new(0.0, 0.0),
                        Vector::new(size, 0.0),
                        Vector::new(size, size),
                        Vector::new(0.0, size),
                    ],
                    position,
                    ..BodyOptions::default()
                },
            )
            .unwrap(),
        );
        id
    }

    fn collide(store: &BodyStore, a: BodyId, b: BodyId) -> Collision {
        collision::collides(store.get(a).unwrap(), store.get(b).unwrap()).expect("must collide")
    }

    #[test]
    fn test_key_is_order_independent() {
        assert_eq!(
            PairKey::new(BodyId(3), BodyId(9)),
            PairKey::new(BodyId(9), BodyId(3))
        );
    }

    #[test]
    fn test_new_pair_reported_in_collision_start() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(30.0, 0.0));
        let mut pairs = PairRegistry::new();

        pairs.update(vec![collide(&store, a, b)], 0.0, &store);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.collision_start.len(), 1);
        assert!(pairs.collision_active.is_empty());
        let pair = pairs.get(PairKey::new(a, b)).unwrap();
        assert!(pair.is_active);
        assert_eq!(pair.contact_count, pair.collision.support_count);
    }

    #[test]
    fn test_persisting_pair_reported_active_and_keeps_impulses() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(30.0, 0.0));
        let mut pairs = PairRegistry::new();

        pairs.update(vec![collide(&store, a, b)], 0.0, &store);
        // simulate the solver accumulating impulses
        pairs.list[0].contacts[0].normal_impulse = -1.5;

        pairs.update(vec![collide(&store, a, b)], 16.0, &store);
        assert_eq!(pairs.collision_active.len(), 1);
        assert!(pairs.collision_start.is_empty());
        assert_eq!(
            pairs.list[0].contacts[0].normal_impulse, -1.5,
            "matched contacts keep their warm-start impulses"
        );
        assert!((pairs.list[0].time_created - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_pair_coefficients_from_parents() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(30.0, 0.0));
        {
            let body = store.get_mut(a).unwrap();
            body.friction = 0.2;
            body.restitution = 0.9;
            body.slop = 0.01;
        }
        {
            let body = store.get_mut(b).unwrap();
            body.friction = 0.6;
            body.restitution = 0.1;
            body.slop = 0.08;
        }
        let mut pairs = PairRegistry::new();
        pairs.update(vec![collide(&store, a, b)], 0.0, &store);
        let pair = &pairs.list[0];
        assert!((pair.friction - 0.2).abs() < 1e-12, "min friction");
        assert!((pair.restitution - 0.9).abs() < 1e-12, "max restitution");
        assert!((pair.slop - 0.08).abs() < 1e-12, "max slop");
        let inv_sum =
            store.get(a).unwrap().inverse_mass + store.get(b).unwrap().inverse_mass;
        assert!((pair.inverse_mass - inv_sum).abs() < 1e-12);
    }

    #[test]
    fn test_ended_pair_removed_and_reported() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(30.0, 0.0));
        let mut pairs = PairRegistry::new();

        pairs.update(vec![collide(&store, a, b)], 0.0, &store);
        pairs.update(Vec::new(), 16.0, &store);

        assert_eq!(pairs.collision_end.len(), 1);
        assert!(pairs.is_empty(), "awake pairs are dropped when they end");

        // no repeated end events
        pairs.update(Vec::new(), 32.0, &store);
        assert!(pairs.collision_end.is_empty());
    }

    #[test]
    fn test_sleeping_body_keeps_ended_pair() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(30.0, 0.0));
        let mut pairs = PairRegistry::new();

        pairs.update(vec![collide(&store, a, b)], 0.0, &store);
        store.get_mut(a).unwrap().is_sleeping = true;
        pairs.update(Vec::new(), 16.0, &store);

        assert_eq!(pairs.collision_end.len(), 1, "end is still reported once");
        assert_eq!(pairs.len(), 1, "the pair survives for the sleeping body");
        assert!(!pairs.list[0].is_active);
    }

    #[test]
    fn test_sensor_flag_from_parts() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(30.0, 0.0));
        store.get_mut(b).unwrap().is_sensor = true;
        let mut pairs = PairRegistry::new();
        pairs.update(vec![collide(&store, a, b)], 0.0, &store);
        assert!(pairs.list[0].is_sensor);
    }
}
