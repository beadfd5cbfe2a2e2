//! Distance and Spring Constraints
//!
//! A constraint holds two anchors at a rest length apart. Anchors are
//! body-local when the endpoint has a body, world-space otherwise. Stiffness
//! at or above 1 (or a zero rest length) behaves as a rigid rod solved once
//! per iteration; softer values integrate as a spring.
//!
//! Corrections applied by [`solve_all`] accumulate on each body's
//! `constraint_impulse`, which warm-starts the next step in
//! [`pre_solve_all`] and is damped by [`post_solve_all`] after the geometry
//! has been synchronised.

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::axes;
use crate::body::BodyStore;
use crate::common::{BodyId, ConstraintId, BASE_DELTA};
use crate::error::PhysicsError;
use crate::events::Events;
use crate::math::Vector;
use crate::sleeping;
use crate::vertices;

/// Anchor distances below this are clamped to avoid singular corrections.
const MIN_LENGTH: f64 = 1e-6;

/// Cached constraint impulses are damped by this factor between steps.
const WARMING: f64 = 0.4;

/// Scales the angular correction derived from anchor torque.
const TORQUE_DAMPEN: f64 = 1.0;

// ============================================================================
// Options
// ============================================================================

/// Construction options for a constraint.
#[derive(Clone, Debug, Default)]
pub struct ConstraintOptions {
    /// Display label
    pub label: Option<String>,
    /// First endpoint body
    pub body_a: Option<BodyId>,
    /// Second endpoint body
    pub body_b: Option<BodyId>,
    /// Anchor for the first endpoint (body-local when `body_a` is set)
    pub point_a: Option<Vector>,
    /// Anchor for the second endpoint (body-local when `body_b` is set)
    pub point_b: Option<Vector>,
    /// Rest length; derived from the initial anchor distance when unset
    pub length: Option<f64>,
    /// Stiffness in `[0, 1]`; defaults to 1 for a rod, 0.7 for a pin
    pub stiffness: Option<f64>,
    /// Velocity damping along the constraint normal
    pub damping: Option<f64>,
    /// How strongly anchor torque is suppressed, in `[0, 1]`
    pub angular_stiffness: f64,
}

// ============================================================================
// Constraint
// ============================================================================

/// A distance/spring constraint between two anchors.
#[derive(Clone, Debug)]
pub struct Constraint {
    /// Stable handle of this constraint within its world
    pub id: ConstraintId,
    /// Display label
    pub label: String,
    /// First endpoint body
    pub body_a: Option<BodyId>,
    /// Second endpoint body
    pub body_b: Option<BodyId>,
    /// Anchor for the first endpoint (body-local when `body_a` is set)
    pub point_a: Vector,
    /// Anchor for the second endpoint (body-local when `body_b` is set)
    pub point_b: Vector,
    /// Rest length
    pub length: f64,
    /// Stiffness in `[0, 1]`
    pub stiffness: f64,
    /// Velocity damping along the constraint normal
    pub damping: f64,
    /// How strongly anchor torque is suppressed, in `[0, 1]`
    pub angular_stiffness: f64,
    /// Body angle when `point_a` was last rotated into place
    pub angle_a: f64,
    /// Body angle when `point_b` was last rotated into place
    pub angle_b: f64,
}

/// Build a constraint from options, deriving the rest length and default
/// stiffness from the current anchor positions.
pub(crate) fn build(
    id: ConstraintId,
    options: ConstraintOptions,
    bodies: &BodyStore,
) -> Result<Constraint, PhysicsError> {
    if options.body_a.is_none() && options.body_b.is_none() {
        return Err(PhysicsError::InvalidConstraint {
            reason: "at least one endpoint body is required",
        });
    }
    for id in [options.body_a, options.body_b].into_iter().flatten() {
        if !bodies.contains(id) {
            return Err(PhysicsError::UnknownBody { id });
        }
    }

    let point_a = options.point_a.unwrap_or(Vector::ZERO);
    let point_b = options.point_b.unwrap_or(Vector::ZERO);

    let world_a = options
        .body_a
        .and_then(|id| bodies.get(id))
        .map_or(point_a, |body| body.position + point_a);
    let world_b = options
        .body_b
        .and_then(|id| bodies.get(id))
        .map_or(point_b, |body| body.position + point_b);

    let length = options
        .length
        .unwrap_or_else(|| (world_a - world_b).magnitude());
    let stiffness = options
        .stiffness
        .unwrap_or(if length > 0.0 { 1.0 } else { 0.7 });

    Ok(Constraint {
        id,
        label: options.label.unwrap_or_else(|| String::from("Constraint")),
        body_a: options.body_a,
        body_b: options.body_b,
        point_a,
        point_b,
        length,
        stiffness,
        damping: options.damping.unwrap_or(0.0),
        angular_stiffness: options.angular_stiffness,
        angle_a: options
            .body_a
            .and_then(|id| bodies.get(id))
            .map_or(0.0, |body| body.angle),
        angle_b: options
            .body_b
            .and_then(|id| bodies.get(id))
            .map_or(0.0, |body| body.angle),
    })
}

impl Constraint {
    /// Current world-space position of the first anchor.
    #[must_use]
    pub fn point_a_world(&self, bodies: &BodyStore) -> Vector {
        self.body_a
            .and_then(|id| bodies.get(id))
            .map_or(self.point_a, |body| body.position + self.point_a)
    }

    /// Current world-space position of the second anchor.
    #[must_use]
    pub fn point_b_world(&self, bodies: &BodyStore) -> Vector {
        self.body_b
            .and_then(|id| bodies.get(id))
            .map_or(self.point_b, |body| body.position + self.point_b)
    }
}

// ============================================================================
// ConstraintStore
// ============================================================================

/// Arena owning every constraint of a world, addressed by [`ConstraintId`].
#[derive(Clone, Debug, Default)]
pub struct ConstraintStore {
    entries: Vec<Option<Constraint>>,
}

impl ConstraintStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn next_id(&self) -> ConstraintId {
        ConstraintId(self.entries.len() as u32)
    }

    pub(crate) fn insert(&mut self, constraint: Constraint) -> ConstraintId {
        let id = constraint.id;
        debug_assert_eq!(id.0 as usize, self.entries.len());
        self.entries.push(Some(constraint));
        id
    }

    pub(crate) fn remove(&mut self, id: ConstraintId) -> Option<Constraint> {
        self.entries.get_mut(id.0 as usize)?.take()
    }

    /// Whether `id` resolves to a live constraint.
    #[must_use]
    pub fn contains(&self, id: ConstraintId) -> bool {
        matches!(self.entries.get(id.0 as usize), Some(Some(_)))
    }

    /// Borrow a constraint.
    #[must_use]
    pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
        self.entries.get(id.0 as usize)?.as_ref()
    }

    /// Mutably borrow a constraint.
    pub fn get_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.entries.get_mut(id.0 as usize)?.as_mut()
    }

    /// Iterate over live constraints.
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.entries.iter().filter_map(|entry| entry.as_ref())
    }
}

// ============================================================================
// Solver
// ============================================================================

/// Warm-start: apply each body's cached constraint impulse to its pose
/// before the first solver iteration.
pub fn pre_solve_all(bodies: &mut BodyStore, ids: &[BodyId]) {
    for &id in ids {
        let Some(body) = bodies.get_mut(id) else {
            continue;
        };
        let impulse = body.constraint_impulse;
        if body.is_static || (impulse.x == 0.0 && impulse.y == 0.0 && impulse.angle == 0.0) {
            continue;
        }
        body.position.x += impulse.x;
        body.position.y += impulse.y;
        body.angle += impulse.angle;
    }
}

/// Solve every constraint once.
///
/// Constraints with a fixed endpoint (missing or static body) are solved
/// first; chains anchored at one end settle noticeably faster this way.
pub fn solve_all(
    constraints: &mut ConstraintStore,
    ids: &[ConstraintId],
    bodies: &mut BodyStore,
    delta: f64,
) {
    let time_scale = (delta / BASE_DELTA).clamp(0.0, 1.0);

    for pass in 0..2 {
        for &id in ids {
            let fixed = {
                let Some(constraint) = constraints.get(id) else {
                    continue;
                };
                let fixed_a = constraint
                    .body_a
                    .and_then(|id| bodies.get(id))
                    .map_or(true, |body| body.is_static);
                let fixed_b = constraint
                    .body_b
                    .and_then(|id| bodies.get(id))
                    .map_or(true, |body| body.is_static);
                fixed_a || fixed_b
            };
            let solve_now = if pass == 0 { fixed } else { !fixed };
            if solve_now {
                if let Some(constraint) = constraints.get_mut(id) {
                    solve(constraint, bodies, time_scale);
                }
            }
        }
    }
}

/// Endpoint state copied out of the store for one solve.
#[derive(Clone, Copy)]
struct Anchor {
    position: Vector,
    position_prev: Vector,
    inverse_mass: f64,
    inverse_inertia: f64,
}

fn anchor(bodies: &BodyStore, id: Option<BodyId>) -> Option<Anchor> {
    let body = bodies.get(id?)?;
    Some(Anchor {
        position: body.position,
        position_prev: body.position_prev,
        inverse_mass: body.inverse_mass,
        inverse_inertia: body.inverse_inertia,
    })
}

fn solve(constraint: &mut Constraint, bodies: &mut BodyStore, time_scale: f64) {
    if constraint.body_a.is_none() && constraint.body_b.is_none() {
        return;
    }

    // keep body-local anchors attached to spinning bodies
    if let Some(id) = constraint.body_a {
        if let Some(body) = bodies.get(id) {
            if !body.is_static {
                constraint.point_a = constraint.point_a.rotate(body.angle - constraint.angle_a);
                constraint.angle_a = body.angle;
            }
        }
    }
    if let Some(id) = constraint.body_b {
        if let Some(body) = bodies.get(id) {
            if !body.is_static {
                constraint.point_b = constraint.point_b.rotate(body.angle - constraint.angle_b);
                constraint.angle_b = body.angle;
            }
        }
    }

    let anchor_a = anchor(bodies, constraint.body_a);
    let anchor_b = anchor(bodies, constraint.body_b);

    let point_a_world = anchor_a.map_or(constraint.point_a, |a| a.position + constraint.point_a);
    let point_b_world = anchor_b.map_or(constraint.point_b, |b| b.position + constraint.point_b);

    let delta = point_a_world - point_b_world;
    let mut current_length = delta.magnitude();
    if current_length < MIN_LENGTH {
        current_length = MIN_LENGTH;
    }

    let difference = (current_length - constraint.length) / current_length;
    let is_rigid = constraint.stiffness >= 1.0 || constraint.length == 0.0;
    let stiffness = if is_rigid {
        constraint.stiffness * time_scale
    } else {
        constraint.stiffness * time_scale * time_scale
    };
    let damping = constraint.damping * time_scale;
    let force = delta * (difference * stiffness);

    let mass_total =
        anchor_a.map_or(0.0, |a| a.inverse_mass) + anchor_b.map_or(0.0, |b| b.inverse_mass);
    let inertia_total =
        anchor_a.map_or(0.0, |a| a.inverse_inertia) + anchor_b.map_or(0.0, |b| b.inverse_inertia);
    let resistance_total = mass_total + inertia_total;
    if mass_total == 0.0 {
        return;
    }

    let (normal, normal_velocity) = if damping > 0.0 {
        let normal = delta / current_length;
        let velocity_a = anchor_a.map_or(Vector::ZERO, |a| a.position - a.position_prev);
        let velocity_b = anchor_b.map_or(Vector::ZERO, |b| b.position - b.position_prev);
        (normal, normal.dot(velocity_b - velocity_a))
    } else {
        (Vector::ZERO, 0.0)
    };

    if let Some(id) = constraint.body_a {
        if let Some(body) = bodies.get_mut(id) {
            if !body.is_static {
                let share = body.inverse_mass / mass_total;

                body.constraint_impulse.x -= force.x * share;
                body.constraint_impulse.y -= force.y * share;
                body.position -= force * share;

                if damping > 0.0 {
                    body.position_prev -= normal * (damping * normal_velocity * share);
                }

                let torque = (constraint.point_a.cross(force) / resistance_total)
                    * TORQUE_DAMPEN
                    * body.inverse_inertia
                    * (1.0 - constraint.angular_stiffness);
                body.constraint_impulse.angle -= torque;
                body.angle -= torque;
            }
        }
    }

    if let Some(id) = constraint.body_b {
        if let Some(body) = bodies.get_mut(id) {
            if !body.is_static {
                let share = body.inverse_mass / mass_total;

                body.constraint_impulse.x += force.x * share;
                body.constraint_impulse.y += force.y * share;
                body.position += force * share;

                if damping > 0.0 {
                    body.position_prev += normal * (damping * normal_velocity * share);
                }

                let torque = (constraint.point_b.cross(force) / resistance_total)
                    * TORQUE_DAMPEN
                    * body.inverse_inertia
                    * (1.0 - constraint.angular_stiffness);
                body.constraint_impulse.angle += torque;
                body.angle += torque;
            }
        }
    }
}

/// Synchronise geometry with the corrections applied during
/// [`solve_all`], wake the affected bodies and damp the cached impulses
/// ready for the next step's warm start.
pub fn post_solve_all(bodies: &mut BodyStore, ids: &[BodyId], events: &mut Events) {
    for &id in ids {
        let skip = match bodies.get(id) {
            Some(body) => {
                let impulse = body.constraint_impulse;
                body.is_static
                    || (impulse.x == 0.0 && impulse.y == 0.0 && impulse.angle == 0.0)
            }
            None => true,
        };
        if skip {
            continue;
        }

        if let Some(body) = bodies.get_mut(id) {
            sleeping::set(body, false, events);
        }

        let Some(body) = bodies.get(id) else {
            continue;
        };
        let (impulse, position, velocity, parts) = (
            body.constraint_impulse,
            body.position,
            body.velocity,
            body.parts.clone(),
        );

        for (i, part_id) in parts.iter().enumerate() {
            let Some(part) = bodies.get_mut(*part_id) else {
                continue;
            };
            vertices::translate(&mut part.vertices, Vector::new(impulse.x, impulse.y));
            if i > 0 {
                part.position.x += impulse.x;
                part.position.y += impulse.y;
            }
            if impulse.angle != 0.0 {
                vertices::rotate(&mut part.vertices, impulse.angle, position);
                axes::rotate(&mut part.axes, impulse.angle);
                if i > 0 {
                    part.position = part.position.rotate_about(impulse.angle, position);
                }
            }
            part.bounds.update(&part.vertices, Some(velocity));
        }

        if let Some(body) = bodies.get_mut(id) {
            body.constraint_impulse.x *= WARMING;
            body.constraint_impulse.y *= WARMING;
            body.constraint_impulse.angle *= WARMING;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyOptions};

    fn store_with_body(position: Vector) -> (BodyStore, BodyId) {
        let mut bodies = BodyStore::new();
        let id = bodies.next_id();
        bodies.insert(
            Body::standalone(
                id,
                BodyOptions {
                    position,
                    ..BodyOptions::default()
                },
            )
            .unwrap(),
        );
        (bodies, id)
    }

    #[test]
    fn test_build_derives_length() {
        let (bodies, id) = store_with_body(Vector::new(100.0, 0.0));
        let constraint = build(
            ConstraintId(0),
            ConstraintOptions {
                body_a: Some(id),
                point_b: Some(Vector::ZERO),
                ..ConstraintOptions::default()
            },
            &bodies,
        )
        .unwrap();
        assert!((constraint.length - 100.0).abs() < 1e-9);
        assert_eq!(constraint.stiffness, 1.0, "rods default to full stiffness");
    }

    #[test]
    fn test_build_pin_default_stiffness() {
        let (bodies, id) = store_with_body(Vector::ZERO);
        let constraint = build(
            ConstraintId(0),
            ConstraintOptions {
                body_a: Some(id),
                point_b: Some(Vector::ZERO),
                ..ConstraintOptions::default()
            },
            &bodies,
        )
        .unwrap();
        assert_eq!(constraint.length, 0.0);
        assert_eq!(constraint.stiffness, 0.7, "pins default to 0.7");
    }

    #[test]
    fn test_build_requires_a_body() {
        let bodies = BodyStore::new();
        let result = build(
            ConstraintId(0),
            ConstraintOptions {
                point_a: Some(Vector::ZERO),
                point_b: Some(Vector::new(10.0, 0.0)),
                ..ConstraintOptions::default()
            },
            &bodies,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_solve_pulls_body_toward_rest_length() {
        let (mut bodies, id) = store_with_body(Vector::new(150.0, 0.0));
        let mut constraints = ConstraintStore::new();
        let cid = constraints.next_id();
        let constraint = build(
            cid,
            ConstraintOptions {
                body_a: Some(id),
                point_b: Some(Vector::ZERO),
                length: Some(100.0),
                stiffness: Some(1.0),
                ..ConstraintOptions::default()
            },
            &bodies,
        )
        .unwrap();
        constraints.insert(constraint);

        let before = bodies.get(id).unwrap().position.x;
        solve_all(&mut constraints, &[cid], &mut bodies, BASE_DELTA);
        let after = bodies.get(id).unwrap().position.x;
        assert!(
            after < before,
            "body should be pulled toward the anchor: {before} -> {after}"
        );
    }

    #[test]
    fn test_solve_skips_static_bodies() {
        let (mut bodies, id) = store_with_body(Vector::new(150.0, 0.0));
        bodies.set_static(id, true);
        let mut constraints = ConstraintStore::new();
        let cid = constraints.next_id();
        let constraint = build(
            cid,
            ConstraintOptions {
                body_a: Some(id),
                point_b: Some(Vector::ZERO),
                length: Some(100.0),
                ..ConstraintOptions::default()
            },
            &bodies,
        )
        .unwrap();
        constraints.insert(constraint);

        solve_all(&mut constraints, &[cid], &mut bodies, BASE_DELTA);
        let body = bodies.get(id).unwrap();
        assert_eq!(body.position, Vector::new(150.0, 0.0));
    }

    #[test]
    fn test_post_solve_damps_cached_impulse() {
        let (mut bodies, id) = store_with_body(Vector::ZERO);
        {
            let body = bodies.get_mut(id).unwrap();
            body.constraint_impulse.x = 1.0;
            body.constraint_impulse.y = -2.0;
            body.constraint_impulse.angle = 0.5;
        }
        let mut events = Events::new();
        post_solve_all(&mut bodies, &[id], &mut events);
        let body = bodies.get(id).unwrap();
        assert!((body.constraint_impulse.x - 0.4).abs() < 1e-12);
        assert!((body.constraint_impulse.y + 0.8).abs() < 1e-12);
        assert!((body.constraint_impulse.angle - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_pre_solve_applies_cached_impulse() {
        let (mut bodies, id) = store_with_body(Vector::ZERO);
        {
            let body = bodies.get_mut(id).unwrap();
            body.constraint_impulse.x = 2.0;
            body.constraint_impulse.angle = 0.1;
        }
        pre_solve_all(&mut bodies, &[id]);
        let body = bodies.get(id).unwrap();
        assert!((body.position.x - 2.0).abs() < 1e-12);
        assert!((body.angle - 0.1).abs() < 1e-12);
    }
}
