//! Broad Phase (Sort and Sweep)
//!
//! The detector keeps its own list of body handles sorted by the minimum x
//! of each body's bounds. Scene edits barely perturb that order between
//! steps, so the adaptive sort is close to linear in practice. A sweep then
//! pairs each body with the neighbours its x-interval reaches, gates them on
//! y-overlap, activity and filters, and hands surviving pairs to the SAT
//! narrow phase (per compound part where needed).
//!
//! The handle list is internal and re-sorted every step; callers get a flat
//! list of [`Collision`] records with unspecified ordering.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::body::BodyStore;
use crate::collision::{self, Collision};
use crate::common::BodyId;
use crate::filter::CollisionFilter;

/// Sort-and-sweep broad phase over the bodies of a world.
#[derive(Clone, Debug, Default)]
pub struct Detector {
    bodies: Vec<BodyId>,
    /// Candidate pairs examined by the last sweep
    pub last_candidate_checks: u64,
    /// SAT tests performed by the last sweep
    pub last_narrow_tests: u64,
}

impl Detector {
    /// Create an empty detector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked body set. Called when the world is modified.
    pub fn set_bodies(&mut self, bodies: Vec<BodyId>) {
        self.bodies = bodies;
    }

    /// Drop every tracked body.
    pub fn clear(&mut self) {
        self.bodies.clear();
    }

    /// Number of tracked bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the detector tracks no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Run broad and narrow phase, returning every colliding part pair.
    pub fn collisions(&mut self, bodies: &BodyStore) -> Vec<Collision> {
        self.bodies.retain(|&id| bodies.contains(id));
        self.bodies.sort_by(|&a, &b| {
            let ax = bodies.get(a).map_or(f64::INFINITY, |body| body.bounds.min.x);
            let bx = bodies.get(b).map_or(f64::INFINITY, |body| body.bounds.min.x);
            ax.partial_cmp(&bx).unwrap_or(core::cmp::Ordering::Equal)
        });

        let mut collisions = Vec::new();
        let mut candidate_checks = 0u64;
        let mut narrow_tests = 0u64;
        let list = &self.bodies;

        for i in 0..list.len() {
            let Some(body_a) = bodies.get(list[i]) else {
                continue;
            };
            let bounds_a = body_a.bounds;
            let inactive_a = body_a.is_static || body_a.is_sleeping;
            let single_a = body_a.parts.len() == 1;

            for &id_b in &list[i + 1..] {
                let Some(body_b) = bodies.get(id_b) else {
                    continue;
                };
                candidate_checks += 1;

                // the list is sorted on min x, nothing further right can reach back
                if body_b.bounds.min.x > bounds_a.max.x {
                    break;
                }
                if bounds_a.max.y < body_b.bounds.min.y || bounds_a.min.y > body_b.bounds.max.y {
                    continue;
                }
                if inactive_a && (body_b.is_static || body_b.is_sleeping) {
                    continue;
                }
                if !CollisionFilter::can_collide(
                    &body_a.collision_filter,
                    &body_b.collision_filter,
                ) {
                    continue;
                }

                if single_a && body_b.parts.len() == 1 {
                    narrow_tests += 1;
                    if let Some(collision) = collision::collides(body_a, body_b) {
                        collisions.push(collision);
                    }
                } else {
                    let start_a = if body_a.parts.len() > 1 { 1 } else { 0 };
                    let start_b = if body_b.parts.len() > 1 { 1 } else { 0 };
                    for &part_a_id in &body_a.parts[start_a..] {
                        let Some(part_a) = bodies.get(part_a_id) else {
                            continue;
                        };
                        for &part_b_id in &body_b.parts[start_b..] {
                            let Some(part_b) = bodies.get(part_b_id) else {
                                continue;
                            };
                            if !part_a.bounds.overlaps(&part_b.bounds) {
                                continue;
                            }
                            narrow_tests += 1;
                            if let Some(collision) = collision::collides(part_a, part_b) {
                                collisions.push(collision);
                            }
                        }
                    }
                }
            }
        }

        self.last_candidate_checks = candidate_checks;
        self.last_narrow_tests = narrow_tests;
        collisions
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyOptions, BodyStore};
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

    fn detector_for(ids: &[BodyId]) -> Detector {
        let mut detector = Detector::new();
        detector.set_bodies(ids.to_vec());
        detector
    }

    #[test]
    fn test_finds_overlapping_pair() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(30.0, 0.0));
        let c = add_square(&mut store, 40.0, Vector::new(500.0, 0.0));

        let mut detector = detector_for(&[a, b, c]);
        let collisions = detector.collisions(&store);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].body_a, a);
        assert_eq!(collisions[0].body_b, b);
    }

    #[test]
    fn test_y_disjoint_pairs_skipped() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(0.0, 200.0));
        let mut detector = detector_for(&[a, b]);
        assert!(detector.collisions(&store).is_empty());
    }

    #[test]
    fn test_static_pair_skipped() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(20.0, 0.0));
        store.set_static(a, true);
        store.set_static(b, true);
        let mut detector = detector_for(&[a, b]);
        assert!(
            detector.collisions(&store).is_empty(),
            "two static bodies never produce a collision"
        );
    }

    #[test]
    fn test_filtered_pair_skipped() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(20.0, 0.0));
        store.get_mut(a).unwrap().collision_filter = CollisionFilter::new(0x2, 0x4);
        store.get_mut(b).unwrap().collision_filter = CollisionFilter::new(0x8, 0x10);
        let mut detector = detector_for(&[a, b]);
        assert!(detector.collisions(&store).is_empty());
    }

    #[test]
    fn test_removed_bodies_are_dropped() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO);
        let b = add_square(&mut store, 40.0, Vector::new(20.0, 0.0));
        let mut detector = detector_for(&[a, b]);
        assert_eq!(detector.collisions(&store).len(), 1);

        store.remove(b);
        assert!(detector.collisions(&store).is_empty());
        assert_eq!(detector.len(), 1, "stale handles are pruned");
    }

    #[test]
    fn test_compound_parts_tested_individually() {
        let mut store = BodyStore::new();
        let root = add_square(&mut store, 20.0, Vector::ZERO);
        let part = add_square(&mut store, 20.0, Vector::new(20.0, 0.0));
        store.set_parts(root, vec![part], true).unwrap();
        // overlaps the part's region, not the root part's original square
        let other = add_square(&mut store, 20.0, Vector::new(35.0, 0.0));

        let mut detector = detector_for(&[root, other]);
        let collisions = detector.collisions(&store);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].parent_a, root);
        assert_eq!(collisions[0].body_a, part, "the part is the collider");
    }
}
