//! Contact Resolver
//!
//! Two Gauss–Seidel impulse phases run over the active pairs each step.
//!
//! The **position phase** removes interpenetration without injecting energy:
//! each iteration measures the remaining separation (accounting for
//! corrections already pending on both bodies), then spreads a damped push
//! across every contact a body is involved in. The correction moves
//! `position` and `position_prev` together, so velocity is untouched, and a
//! damped remainder is kept as next step's starting guess.
//!
//! The **velocity phase** is sequential impulses with accumulated clamping:
//! contacts below the resting threshold accumulate their normal impulse and
//! clamp it non-positive, applying only the delta. That keeps resting stacks
//! from jittering while fast impacts still resolve in one application.
//! Friction follows the Coulomb limit against the pair's combined
//! coefficients. Impulses are applied by mutating `position_prev` and
//! `angle_prev`, the Verlet representation of velocity.
//!
//! Iterations mutate shared body state on purpose; later contacts see the
//! corrections of earlier ones within the same pass.

use crate::body::BodyStore;
use crate::common::{BodyId, BASE_DELTA};
use crate::math::Vector;
use crate::pairs::Pair;
use crate::vertices;

/// Contacts closing faster than this (scaled by the timestep) bypass
/// impulse accumulation.
const RESTING_THRESH: f64 = 2.0;

/// Tangential speed beyond which the cached friction impulse resets.
const RESTING_THRESH_TANGENT: f64 = 2.449_489_742_783_178; // sqrt(6)

/// Base damping of positional corrections.
const POSITION_DAMPEN: f64 = 0.9;

/// Fraction of the positional correction kept as next step's warm start.
const POSITION_WARMING: f64 = 0.8;

/// Scales separation into the friction normal force estimate.
const FRICTION_NORMAL_MULTIPLIER: f64 = 5.0;

#[inline]
fn sign(value: f64) -> f64 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

// ============================================================================
// Position phase
// ============================================================================

/// Count how many contacts each body participates in, so its correction
/// budget can be divided among them.
pub fn pre_solve_position(pairs: &mut [Pair], bodies: &mut BodyStore) {
    for pair in pairs {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let count = pair.contact_count as u32;
        if let Some(body) = bodies.get_mut(pair.collision.parent_a) {
            body.total_contacts += count;
        }
        if let Some(body) = bodies.get_mut(pair.collision.parent_b) {
            body.total_contacts += count;
        }
    }
}

/// One iteration of positional correction across all active pairs.
pub fn solve_position(pairs: &mut [Pair], bodies: &mut BodyStore, delta: f64, damping: f64) {
    let position_dampen = POSITION_DAMPEN * damping;
    let slop_dampen = (delta / BASE_DELTA).clamp(0.0, 1.0);

    // current separation, including corrections pending on both bodies
    for pair in pairs.iter_mut() {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let collision = &pair.collision;
        let (impulse_a, impulse_b) = match (
            bodies.get(collision.parent_a),
            bodies.get(collision.parent_b),
        ) {
            (Some(a), Some(b)) => (a.position_impulse, b.position_impulse),
            _ => continue,
        };
        pair.separation = collision.depth + collision.normal.dot(impulse_b - impulse_a);
    }

    for pair in pairs.iter_mut() {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let collision = pair.collision;
        let Some((body_a, body_b)) = bodies.get_pair_mut(collision.parent_a, collision.parent_b)
        else {
            continue;
        };

        let mut position_impulse = pair.separation - pair.slop * slop_dampen;
        if body_a.is_static || body_b.is_static {
            // the dynamic side must absorb the whole correction
            position_impulse *= 2.0;
        }

        if !(body_a.is_static || body_a.is_sleeping) {
            let contact_share = position_dampen / body_a.total_contacts as f64;
            body_a.position_impulse += collision.normal * (position_impulse * contact_share);
        }
        if !(body_b.is_static || body_b.is_sleeping) {
            let contact_share = position_dampen / body_b.total_contacts as f64;
            body_b.position_impulse -= collision.normal * (position_impulse * contact_share);
        }
    }
}

/// Apply the accumulated positional corrections to the geometry, preserving
/// velocity, and keep a damped remainder as warm start.
pub fn post_solve_position(ids: &[BodyId], bodies: &mut BodyStore) {
    for &id in ids {
        let (impulse, velocity, parts) = {
            let Some(body) = bodies.get_mut(id) else {
                continue;
            };
            body.total_contacts = 0;
            let impulse = body.position_impulse;
            if impulse.x == 0.0 && impulse.y == 0.0 {
                continue;
            }
            (impulse, body.velocity, body.parts.clone())
        };

        for part_id in &parts {
            let Some(part) = bodies.get_mut(*part_id) else {
                continue;
            };
            vertices::translate(&mut part.vertices, impulse);
            part.bounds.update(&part.vertices, Some(velocity));
            part.position += impulse;
        }

        let Some(body) = bodies.get_mut(id) else {
            continue;
        };
        // move position_prev with the body so velocity is unchanged
        body.position_prev += impulse;

        if impulse.dot(body.velocity) < 0.0 {
            // moving against the correction: drop the cache
            body.position_impulse = Vector::ZERO;
        } else {
            body.position_impulse = impulse * POSITION_WARMING;
        }
    }
}

// ============================================================================
// Velocity phase
// ============================================================================

/// Warm start: re-apply each contact's cached impulses from the previous
/// step before iterating.
pub fn pre_solve_velocity(pairs: &mut [Pair], bodies: &mut BodyStore) {
    for pair in pairs.iter_mut() {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let collision = pair.collision;
        let normal = collision.normal;
        let tangent = collision.tangent;

        for contact in &pair.contacts[..pair.contact_count] {
            if contact.normal_impulse == 0.0 && contact.tangent_impulse == 0.0 {
                continue;
            }
            let impulse = normal * contact.normal_impulse + tangent * contact.tangent_impulse;
            let vertex = contact.vertex.point;

            let Some((body_a, body_b)) =
                bodies.get_pair_mut(collision.parent_a, collision.parent_b)
            else {
                break;
            };
            if !(body_a.is_static || body_a.is_sleeping) {
                body_a.position_prev += impulse * body_a.inverse_mass;
                body_a.angle_prev += body_a.inverse_inertia
                    * ((vertex.x - body_a.position.x) * impulse.y
                        - (vertex.y - body_a.position.y) * impulse.x);
            }
            if !(body_b.is_static || body_b.is_sleeping) {
                body_b.position_prev -= impulse * body_b.inverse_mass;
                body_b.angle_prev -= body_b.inverse_inertia
                    * ((vertex.x - body_b.position.x) * impulse.y
                        - (vertex.y - body_b.position.y) * impulse.x);
            }
        }
    }
}

/// One sequential-impulse iteration over all active pairs.
pub fn solve_velocity(pairs: &mut [Pair], bodies: &mut BodyStore, delta: f64) {
    let time_scale = delta / BASE_DELTA;
    let time_scale_squared = time_scale * time_scale;
    let time_scale_cubed = time_scale_squared * time_scale;
    let resting_thresh = -RESTING_THRESH * time_scale;
    let friction_normal_multiplier = FRICTION_NORMAL_MULTIPLIER * time_scale;

    for pair in pairs.iter_mut() {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let collision = pair.collision;
        let normal = collision.normal;
        let tangent = collision.tangent;
        let inverse_mass_total = pair.inverse_mass;
        let friction = pair.friction * pair.friction_static * friction_normal_multiplier;
        let contact_share = 1.0 / pair.contact_count as f64;

        let Some((body_a, body_b)) = bodies.get_pair_mut(collision.parent_a, collision.parent_b)
        else {
            continue;
        };

        // current velocities in Verlet form
        let body_a_velocity = body_a.position - body_a.position_prev;
        let body_b_velocity = body_b.position - body_b.position_prev;
        let angular_velocity_a = body_a.angle - body_a.angle_prev;
        let angular_velocity_b = body_b.angle - body_b.angle_prev;

        for contact in &mut pair.contacts[..pair.contact_count] {
            let vertex = contact.vertex.point;
            let offset_a = vertex - body_a.position;
            let offset_b = vertex - body_b.position;

            let velocity_point_a = Vector::new(
                body_a_velocity.x - offset_a.y * angular_velocity_a,
                body_a_velocity.y + offset_a.x * angular_velocity_a,
            );
            let velocity_point_b = Vector::new(
                body_b_velocity.x - offset_b.y * angular_velocity_b,
                body_b_velocity.y + offset_b.x * angular_velocity_b,
            );
            let relative_velocity = velocity_point_a - velocity_point_b;
            let normal_velocity = normal.dot(relative_velocity);
            let tangent_velocity = tangent.dot(relative_velocity);

            // Coulomb friction limited by the estimated normal force
            let normal_overlap = pair.separation + normal_velocity;
            let normal_force = if normal_overlap < 0.0 {
                0.0
            } else {
                normal_overlap.min(1.0)
            };
            let friction_limit = normal_force * friction;

            let mut tangent_impulse;
            let max_friction;
            if tangent_velocity < -friction_limit || tangent_velocity > friction_limit {
                // kinetic friction
                max_friction = tangent_velocity.abs();
                tangent_impulse = (pair.friction * sign(tangent_velocity) * time_scale_cubed)
                    .clamp(-max_friction, max_friction);
            } else {
                // static friction cancels the tangential velocity outright
                tangent_impulse = tangent_velocity;
                max_friction = f64::INFINITY;
            }

            // effective inverse mass at this contact
            let offset_a_cross_normal = offset_a.cross(normal);
            let offset_b_cross_normal = offset_b.cross(normal);
            let share = contact_share
                / (inverse_mass_total
                    + body_a.inverse_inertia * offset_a_cross_normal * offset_a_cross_normal
                    + body_b.inverse_inertia * offset_b_cross_normal * offset_b_cross_normal);

            let mut normal_impulse = (1.0 + pair.restitution) * normal_velocity * share;
            tangent_impulse *= share;

            if normal_velocity < resting_thresh {
                // high closing velocity: apply raw, reset the accumulator
                contact.normal_impulse = 0.0;
            } else {
                // resting contact: accumulate, clamp non-positive, apply the delta
                let previous = contact.normal_impulse;
                contact.normal_impulse = (previous + normal_impulse).min(0.0);
                normal_impulse = contact.normal_impulse - previous;
            }

            if tangent_velocity < -RESTING_THRESH_TANGENT
                || tangent_velocity > RESTING_THRESH_TANGENT
            {
                contact.tangent_impulse = 0.0;
            } else {
                let previous = contact.tangent_impulse;
                contact.tangent_impulse =
                    (previous + tangent_impulse).clamp(-max_friction, max_friction);
                tangent_impulse = contact.tangent_impulse - previous;
            }

            let impulse = normal * normal_impulse + tangent * tangent_impulse;
            if !(body_a.is_static || body_a.is_sleeping) {
                body_a.position_prev += impulse * body_a.inverse_mass;
                body_a.angle_prev +=
                    (offset_a.x * impulse.y - offset_a.y * impulse.x) * body_a.inverse_inertia;
            }
            if !(body_b.is_static || body_b.is_sleeping) {
                body_b.position_prev -= impulse * body_b.inverse_mass;
                body_b.angle_prev -=
                    (offset_b.x * impulse.y - offset_b.y * impulse.x) * body_b.inverse_inertia;
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
    use crate::common::BodyId;
    use crate::pairs::PairRegistry;

    fn add_square(
        store: &mut BodyStore,
        size: f64,
        position: Vector,
        is_static: bool,
    ) -> BodyId {
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
        if is_static {
            store.set_static(id, true);
        }
        id
    }

    fn pairs_for(store: &BodyStore, a: BodyId, b: BodyId) -> PairRegistry {
        let collision =
            collision::collides(store.get(a).unwrap(), store.get(b).unwrap()).expect("collide");
        let mut pairs = PairRegistry::new();
        pairs.update(vec![collision], 0.0, store);
        pairs
    }

    #[test]
    fn test_pre_solve_position_counts_contacts() {
        let mut store = BodyStore::new();
        let a = add_square(&mut store, 40.0, Vector::ZERO, false);
        let b = add_square(&mut store, 40.0, Vector::new(35.0, 0.0), false);
        let mut pairs = pairs_for(&store, a, b);

        pre_solve_position(&mut pairs.list, &mut store);
        let count = pairs.list[0].contact_count as u32;
        assert!(count >= 1);
        assert_eq!(store.get(a).unwrap().total_contacts, count);
        assert_eq!(store.get(b).unwrap().total_contacts, count);
    }

    #[test]
    fn test_position_solver_reduces_overlap() {
        let mut store = BodyStore::new();
        let floor = add_square(&mut store, 100.0, Vector::new(0.0, 60.0), true);
        let body = add_square(&mut store, 40.0, Vector::new(0.0, 5.0), false);
        let _ = floor;
        let overlap_before = {
            let floor_top = store.get(floor).unwrap().bounds.min.y;
            store.get(body).unwrap().bounds.max.y - floor_top
        };
        assert!(overlap_before > 0.0, "setup must overlap");

        let mut pairs = pairs_for(&store, body, floor);
        for _ in 0..6 {
            pre_solve_position(&mut pairs.list, &mut store);
            solve_position(&mut pairs.list, &mut store, BASE_DELTA, 1.0);
            post_solve_position(&[body, floor], &mut store);
        }

        let floor_top = store.get(floor).unwrap().bounds.min.y;
        let overlap_after = store.get(body).unwrap().bounds.max.y - floor_top;
        assert!(
            overlap_after < overlap_before,
            "penetration must shrink: {overlap_before} -> {overlap_after}"
        );
        assert_eq!(
            store.get(floor).unwrap().position,
            Vector::new(0.0, 60.0),
            "static bodies never move"
        );
    }

    #[test]
    fn test_position_correction_preserves_velocity() {
        let mut store = BodyStore::new();
        let floor = add_square(&mut store, 100.0, Vector::new(0.0, 60.0), true);
        let body = add_square(&mut store, 40.0, Vector::new(0.0, 5.0), false);
        store
            .get_mut(body)
            .unwrap()
            .set_velocity(Vector::new(2.0, 0.0));

        let mut pairs = pairs_for(&store, body, floor);
        pre_solve_position(&mut pairs.list, &mut store);
        solve_position(&mut pairs.list, &mut store, BASE_DELTA, 1.0);
        post_solve_position(&[body, floor], &mut store);

        let velocity = store.get(body).unwrap().get_velocity();
        assert!(
            (velocity.x - 2.0).abs() < 1e-9,
            "positional correction must not change velocity"
        );
    }

    #[test]
    fn test_velocity_solver_stops_approach() {
        let mut store = BodyStore::new();
        let floor = add_square(&mut store, 100.0, Vector::new(0.0, 60.0), true);
        let body = add_square(&mut store, 40.0, Vector::new(0.0, 1.0), false);
        // closing velocity straight into the floor
        store
            .get_mut(body)
            .unwrap()
            .set_velocity(Vector::new(0.0, 3.0));

        let mut pairs = pairs_for(&store, body, floor);
        pre_solve_velocity(&mut pairs.list, &mut store);
        for _ in 0..4 {
            solve_velocity(&mut pairs.list, &mut store, BASE_DELTA);
        }
        store.get_mut(body).unwrap().update_velocities();

        let vy = store.get(body).unwrap().get_velocity().y;
        assert!(
            vy < 3.0,
            "impulses must reduce the closing velocity, got {vy}"
        );
    }

    #[test]
    fn test_normal_impulse_accumulator_stays_non_positive() {
        let mut store = BodyStore::new();
        let floor = add_square(&mut store, 100.0, Vector::new(0.0, 60.0), true);
        let body = add_square(&mut store, 40.0, Vector::new(0.0, 5.0), false);
        let mut pairs = pairs_for(&store, body, floor);

        for _ in 0..4 {
            solve_velocity(&mut pairs.list, &mut store, BASE_DELTA);
        }
        for contact in &pairs.list[0].contacts[..pairs.list[0].contact_count] {
            assert!(
                contact.normal_impulse <= 0.0,
                "accumulator must be clamped non-positive"
            );
        }
    }

    #[test]
    fn test_warm_start_moves_bodies() {
        let mut store = BodyStore::new();
        let floor = add_square(&mut store, 100.0, Vector::new(0.0, 60.0), true);
        let body = add_square(&mut store, 40.0, Vector::new(0.0, 5.0), false);
        let mut pairs = pairs_for(&store, body, floor);
        pairs.list[0].contacts[0].normal_impulse = -0.5;

        let prev_before = store.get(body).unwrap().position_prev;
        pre_solve_velocity(&mut pairs.list, &mut store);
        let prev_after = store.get(body).unwrap().position_prev;
        assert!(
            (prev_after - prev_before).magnitude() > 0.0,
            "cached impulses must be re-applied"
        );
    }

    #[test]
    fn test_sensor_pairs_are_not_resolved() {
        let mut store = BodyStore::new();
        let floor = add_square(&mut store, 100.0, Vector::new(0.0, 60.0), true);
        let body = add_square(&mut store, 40.0, Vector::new(0.0, 5.0), false);
        store.get_mut(body).unwrap().is_sensor = true;
        let mut pairs = pairs_for(&store, body, floor);
        assert!(pairs.list[0].is_sensor);

        let before = store.get(body).unwrap().position_prev;
        pre_solve_position(&mut pairs.list, &mut store);
        solve_position(&mut pairs.list, &mut store, BASE_DELTA, 1.0);
        post_solve_position(&[body, floor], &mut store);
        solve_velocity(&mut pairs.list, &mut store, BASE_DELTA);
        let after = store.get(body).unwrap().position_prev;
        assert_eq!(before, after, "sensors detect but never resolve");
    }
}
