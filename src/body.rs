//! Rigid Bodies
//!
//! [`Body`] is the primary entity of the simulation: a convex vertex ring
//! with pose, Verlet state, force accumulators and material properties.
//! Compound bodies keep a `parts` list of sub-bodies sharing the root's pose;
//! `parts[0]` is always the root itself.
//!
//! # Integration
//!
//! Position integration is Verlet with a time correction factor, so velocity
//! is implicit in `position - position_prev`. The solver mutates
//! `position_prev` directly to apply impulses; [`Body::update_velocities`]
//! re-derives the reported velocity afterwards, normalised to the base
//! timestep.
//!
//! All operations that touch a compound's parts live on [`BodyStore`], the
//! arena owning every body of a world. Single-body operations live on
//! [`Body`] itself.

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::axes;
use crate::common::{BodyId, BASE_DELTA};
use crate::error::PhysicsError;
use crate::filter::CollisionFilter;
use crate::math::{Bounds, Vector};
use crate::vertices::{self, Vertex};

/// Inertia derived from the vertex ring is multiplied by this factor.
pub(crate) const INERTIA_SCALE: f64 = 4.0;

#[inline]
fn sign(value: f64) -> f64 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

// ============================================================================
// Options
// ============================================================================

/// Construction options for a body.
///
/// Unset optional fields are derived: mass and inertia from density and the
/// vertex ring, velocity from a resting start.
#[derive(Clone, Debug)]
pub struct BodyOptions {
    /// Display label
    pub label: String,
    /// Vertex ring; sorted clockwise and validated convex on creation
    pub vertices: Vec<Vector>,
    /// World position of the centre of mass
    pub position: Vector,
    /// Initial angle in radians
    pub angle: f64,
    /// Initial velocity, in units per base step
    pub velocity: Option<Vector>,
    /// Initial angular velocity, in radians per base step
    pub angular_velocity: Option<f64>,
    /// Whether the body is immovable
    pub is_static: bool,
    /// Whether the body detects collisions without resolving them
    pub is_sensor: bool,
    /// Mass per unit area
    pub density: f64,
    /// Coefficient of restitution (bounciness)
    pub restitution: f64,
    /// Kinetic friction coefficient
    pub friction: f64,
    /// Static friction multiplier
    pub friction_static: f64,
    /// Air drag per base step
    pub friction_air: f64,
    /// Tolerated interpenetration depth
    pub slop: f64,
    /// Per-body time scaling
    pub time_scale: f64,
    /// Idle steps (at base delta) before the body may sleep
    pub sleep_threshold: f64,
    /// Collision filtering
    pub collision_filter: CollisionFilter,
    /// Set when the ring approximates a circle of this radius
    pub circle_radius: Option<f64>,
    /// Explicit mass override
    pub mass: Option<f64>,
    /// Explicit inertia override
    pub inertia: Option<f64>,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            label: String::from("Body"),
            vertices: vec![
                Vector::new(0.0, 0.0),
                Vector::new(40.0, 0.0),
                Vector::new(40.0, 40.0),
                Vector::new(0.0, 40.0),
            ],
            position: Vector::ZERO,
            angle: 0.0,
            velocity: None,
            angular_velocity: None,
            is_static: false,
            is_sensor: false,
            density: 0.001,
            restitution: 0.0,
            friction: 0.1,
            friction_static: 0.5,
            friction_air: 0.01,
            slop: 0.05,
            time_scale: 1.0,
            sleep_threshold: 60.0,
            collision_filter: CollisionFilter::DEFAULT,
            circle_radius: None,
            mass: None,
            inertia: None,
        }
    }
}

// ============================================================================
// Body
// ============================================================================

/// Physical attributes snapshotted when a body becomes static, restored when
/// it becomes dynamic again.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticSnapshot {
    /// Restitution before the body became static
    pub restitution: f64,
    /// Friction before the body became static
    pub friction: f64,
    /// Mass before the body became static
    pub mass: f64,
    /// Inertia before the body became static
    pub inertia: f64,
    /// Density before the body became static
    pub density: f64,
    /// Inverse mass before the body became static
    pub inverse_mass: f64,
    /// Inverse inertia before the body became static
    pub inverse_inertia: f64,
}

/// Accumulated constraint impulse, cached between steps for warm starting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConstraintImpulse {
    /// Linear x component
    pub x: f64,
    /// Linear y component
    pub y: f64,
    /// Angular component
    pub angle: f64,
}

/// A rigid body.
#[derive(Clone, Debug)]
pub struct Body {
    /// Stable handle of this body within its world
    pub id: BodyId,
    /// Display label
    pub label: String,
    /// Root of the compound this body is a part of; `None` for roots
    pub parent: Option<BodyId>,
    /// Compound part handles; `parts[0]` is always `id`
    pub parts: Vec<BodyId>,
    /// Convex clockwise vertex ring, world space
    pub vertices: Vec<Vertex>,
    /// Unique outward edge normals
    pub axes: Vec<Vector>,
    /// AABB of the ring, extended by the velocity hint
    pub bounds: Bounds,
    /// Set when the ring approximates a circle of this radius
    pub circle_radius: Option<f64>,
    /// Centre of mass, world space
    pub position: Vector,
    /// Position at the previous step
    pub position_prev: Vector,
    /// Orientation in radians
    pub angle: f64,
    /// Angle at the previous step
    pub angle_prev: f64,
    /// Velocity in units per base step (derived)
    pub velocity: Vector,
    /// Angular velocity in radians per base step (derived)
    pub angular_velocity: f64,
    /// Magnitude of `velocity` (derived)
    pub speed: f64,
    /// Magnitude of `angular_velocity` (derived)
    pub angular_speed: f64,
    /// Force accumulator, cleared after every step
    pub force: Vector,
    /// Torque accumulator, cleared after every step
    pub torque: f64,
    /// Pending broad position correction from the position solver
    pub position_impulse: Vector,
    /// Warm-start cache for the constraint solver
    pub constraint_impulse: ConstraintImpulse,
    /// Number of solver contacts sharing this body's correction budget
    pub total_contacts: u32,
    /// Mass (infinite for static bodies)
    pub mass: f64,
    /// `1 / mass` (zero for static bodies)
    pub inverse_mass: f64,
    /// Moment of inertia (infinite for static bodies)
    pub inertia: f64,
    /// `1 / inertia` (zero for static bodies)
    pub inverse_inertia: f64,
    /// Mass per unit area
    pub density: f64,
    /// Ring area
    pub area: f64,
    /// Coefficient of restitution
    pub restitution: f64,
    /// Kinetic friction coefficient
    pub friction: f64,
    /// Static friction multiplier
    pub friction_static: f64,
    /// Air drag per base step
    pub friction_air: f64,
    /// Tolerated interpenetration depth
    pub slop: f64,
    /// Per-body time scaling
    pub time_scale: f64,
    /// Effective delta of the last integration step
    pub delta_time: f64,
    /// Whether the body is immovable
    pub is_static: bool,
    /// Whether the body detects collisions without resolving them
    pub is_sensor: bool,
    /// Whether the body is currently asleep
    pub is_sleeping: bool,
    /// Consecutive low-motion steps
    pub sleep_counter: u32,
    /// Idle steps (at base delta) before the body may sleep
    pub sleep_threshold: f64,
    /// Biased moving average of kinetic activity
    pub motion: f64,
    /// Collision filtering
    pub collision_filter: CollisionFilter,
    /// Snapshot of dynamic attributes while static
    pub original: Option<StaticSnapshot>,
}

impl Body {
    /// Build a fully initialised standalone body. Used by the world factory
    /// (with an arena handle) and by query probes (with a sentinel handle).
    pub(crate) fn standalone(id: BodyId, options: BodyOptions) -> Result<Self, PhysicsError> {
        if options.vertices.len() < 3 {
            return Err(PhysicsError::InvalidBody {
                reason: "a body needs at least 3 vertices",
            });
        }

        let mut ring = vertices::create(&options.vertices);
        vertices::clockwise_sort(&mut ring);
        if !vertices::is_convex(&ring) {
            return Err(PhysicsError::InvalidBody {
                reason: "vertices must form a convex polygon",
            });
        }

        let mut body = Self {
            id,
            label: options.label,
            parent: None,
            parts: vec![id],
            vertices: Vec::new(),
            axes: Vec::new(),
            bounds: Bounds::default(),
            circle_radius: options.circle_radius,
            position: options.position,
            position_prev: options.position,
            angle: 0.0,
            angle_prev: 0.0,
            velocity: Vector::ZERO,
            angular_velocity: 0.0,
            speed: 0.0,
            angular_speed: 0.0,
            force: Vector::ZERO,
            torque: 0.0,
            position_impulse: Vector::ZERO,
            constraint_impulse: ConstraintImpulse::default(),
            total_contacts: 0,
            mass: 0.0,
            inverse_mass: 0.0,
            inertia: 0.0,
            inverse_inertia: 0.0,
            density: options.density,
            area: 0.0,
            restitution: options.restitution,
            friction: options.friction,
            friction_static: options.friction_static,
            friction_air: options.friction_air,
            slop: options.slop,
            time_scale: options.time_scale,
            delta_time: BASE_DELTA,
            is_static: false,
            is_sensor: options.is_sensor,
            is_sleeping: false,
            sleep_counter: 0,
            sleep_threshold: options.sleep_threshold,
            motion: 0.0,
            collision_filter: options.collision_filter,
            original: None,
        };

        body.set_ring(ring);

        if options.angle != 0.0 {
            body.angle = options.angle;
            body.angle_prev = options.angle;
            vertices::rotate(&mut body.vertices, options.angle, body.position);
            axes::rotate(&mut body.axes, options.angle);
        }

        if let Some(mass) = options.mass {
            body.set_mass(mass);
        }
        if let Some(inertia) = options.inertia {
            body.set_inertia(inertia);
        }
        if let Some(velocity) = options.velocity {
            body.set_velocity(velocity);
        }
        if let Some(angular_velocity) = options.angular_velocity {
            body.set_angular_velocity(angular_velocity);
        }

        body.bounds.update(&body.vertices, Some(body.velocity));
        Ok(body)
    }

    /// Install a pre-validated ring and recompute every derived attribute.
    fn set_ring(&mut self, ring: Vec<Vertex>) {
        self.vertices = ring;
        self.axes = axes::from_vertices(&self.vertices);
        self.area = vertices::area(&self.vertices, false);
        self.set_mass(self.density * self.area);

        // centre the ring on the origin to measure inertia, then move it to
        // the body position
        let centre = vertices::centre(&self.vertices);
        vertices::translate(&mut self.vertices, -centre);
        let inertia = INERTIA_SCALE * vertices::inertia(&self.vertices, self.mass);
        self.set_inertia(inertia);
        vertices::translate(&mut self.vertices, self.position);

        self.bounds.update(&self.vertices, Some(self.velocity));
    }

    /// Replace the vertex ring, preserving the body position as the new
    /// centre of mass. The ring is re-sorted clockwise and must be convex.
    pub fn set_vertices(&mut self, points: &[Vector]) -> Result<(), PhysicsError> {
        if points.len() < 3 {
            return Err(PhysicsError::InvalidBody {
                reason: "a body needs at least 3 vertices",
            });
        }
        let mut ring = vertices::create(points);
        vertices::clockwise_sort(&mut ring);
        if !vertices::is_convex(&ring) {
            return Err(PhysicsError::InvalidBody {
                reason: "vertices must form a convex polygon",
            });
        }
        self.set_ring(ring);
        Ok(())
    }

    /// Set the mass, scaling inertia to preserve the moment per unit mass.
    pub fn set_mass(&mut self, mass: f64) {
        if self.inertia.is_finite() && self.inertia > 0.0 && self.mass.is_finite() && self.mass > 0.0
        {
            let moment = self.inertia / (self.mass / 6.0);
            self.inertia = moment * (mass / 6.0);
            self.inverse_inertia = 1.0 / self.inertia;
        }
        self.mass = mass;
        self.inverse_mass = 1.0 / mass;
        if self.area > 0.0 {
            self.density = self.mass / self.area;
        }
    }

    /// Set the density, rederiving mass from the ring area.
    pub fn set_density(&mut self, density: f64) {
        self.set_mass(density * self.area);
        self.density = density;
    }

    /// Set the moment of inertia directly.
    pub fn set_inertia(&mut self, inertia: f64) {
        self.inertia = inertia;
        self.inverse_inertia = 1.0 / inertia;
    }

    /// Move the centre of mass without moving the ring.
    ///
    /// With `relative` the centre shifts by the given offset instead of
    /// jumping to it. Velocity is preserved either way.
    pub fn set_centre(&mut self, centre: Vector, relative: bool) {
        if relative {
            self.position_prev += centre;
            self.position += centre;
        } else {
            self.position_prev = centre - (self.position - self.position_prev);
            self.position = centre;
        }
    }

    /// Set the velocity in units per base step.
    pub fn set_velocity(&mut self, velocity: Vector) {
        let time_scale = self.delta_time / BASE_DELTA;
        self.position_prev = self.position - velocity * time_scale;
        self.velocity = velocity;
        self.speed = self.velocity.magnitude();
    }

    /// Current velocity derived from the Verlet state, normalised to the
    /// base step.
    #[must_use]
    pub fn get_velocity(&self) -> Vector {
        (self.position - self.position_prev) * (BASE_DELTA / self.delta_time)
    }

    /// Set the speed, preserving direction.
    pub fn set_speed(&mut self, speed: f64) {
        let direction = self.get_velocity().normalise();
        self.set_velocity(direction * speed);
    }

    /// Set the angular velocity in radians per base step.
    pub fn set_angular_velocity(&mut self, angular_velocity: f64) {
        let time_scale = self.delta_time / BASE_DELTA;
        self.angle_prev = self.angle - angular_velocity * time_scale;
        self.angular_velocity = angular_velocity;
        self.angular_speed = self.angular_velocity.abs();
    }

    /// Current angular velocity derived from the Verlet state, normalised to
    /// the base step.
    #[must_use]
    pub fn get_angular_velocity(&self) -> f64 {
        (self.angle - self.angle_prev) * (BASE_DELTA / self.delta_time)
    }

    /// Set the angular speed, preserving spin direction.
    pub fn set_angular_speed(&mut self, speed: f64) {
        self.set_angular_velocity(sign(self.get_angular_velocity()) * speed);
    }

    /// Accumulate a force applied at a world-space point, inducing torque
    /// about the centre of mass.
    pub fn apply_force(&mut self, position: Vector, force: Vector) {
        let offset = position - self.position;
        self.force += force;
        self.torque += offset.cross(force);
    }

    /// Recompute the reported velocity, speed and angular equivalents from
    /// the Verlet state. Called once per step after the solver has adjusted
    /// `position_prev`.
    pub fn update_velocities(&mut self) {
        let time_scale = BASE_DELTA / self.delta_time;
        self.velocity = (self.position - self.position_prev) * time_scale;
        self.speed = self.velocity.magnitude();
        self.angular_velocity = (self.angle - self.angle_prev) * time_scale;
        self.angular_speed = self.angular_velocity.abs();
    }
}

// ============================================================================
// BodyStore
// ============================================================================

/// Arena owning every body of a world, addressed by [`BodyId`].
///
/// Handles are slot indices; removed bodies leave a tombstone so handles are
/// never reused. Operations that walk a compound's parts live here because
/// they touch several arena entries.
#[derive(Clone, Debug, Default)]
pub struct BodyStore {
    entries: Vec<Option<Body>>,
}

impl BodyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The handle the next inserted body will receive.
    pub(crate) fn next_id(&self) -> BodyId {
        BodyId(self.entries.len() as u32)
    }

    /// Insert a body built with [`Self::next_id`].
    pub(crate) fn insert(&mut self, body: Body) -> BodyId {
        let id = body.id;
        debug_assert_eq!(id.0 as usize, self.entries.len());
        self.entries.push(Some(body));
        id
    }

    /// Remove a body, returning it.
    pub(crate) fn remove(&mut self, id: BodyId) -> Option<Body> {
        self.entries.get_mut(id.0 as usize)?.take()
    }

    /// Whether `id` resolves to a live body.
    #[must_use]
    pub fn contains(&self, id: BodyId) -> bool {
        matches!(self.entries.get(id.0 as usize), Some(Some(_)))
    }

    /// Borrow a body.
    #[must_use]
    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.entries.get(id.0 as usize)?.as_ref()
    }

    /// Mutably borrow a body.
    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.entries.get_mut(id.0 as usize)?.as_mut()
    }

    /// Mutably borrow two distinct bodies at once.
    pub fn get_pair_mut(&mut self, a: BodyId, b: BodyId) -> Option<(&mut Body, &mut Body)> {
        let (ai, bi) = (a.0 as usize, b.0 as usize);
        if ai == bi || ai >= self.entries.len() || bi >= self.entries.len() {
            return None;
        }
        if ai < bi {
            let (left, right) = self.entries.split_at_mut(bi);
            match (left[ai].as_mut(), right[0].as_mut()) {
                (Some(x), Some(y)) => Some((x, y)),
                _ => None,
            }
        } else {
            let (left, right) = self.entries.split_at_mut(ai);
            match (right[0].as_mut(), left[bi].as_mut()) {
                (Some(x), Some(y)) => Some((x, y)),
                _ => None,
            }
        }
    }

    /// Iterate over live bodies.
    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.entries.iter().filter_map(|entry| entry.as_ref())
    }

    /// Number of live bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    /// Whether the store holds no live bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Integration
    // ------------------------------------------------------------------

    /// Advance a body one step of `delta_time` milliseconds using Verlet
    /// integration with time correction, then transform its parts.
    pub fn update_body(&mut self, id: BodyId, delta_time: f64) {
        let (velocity, angular_velocity, position, parts) = {
            let Some(body) = self.get_mut(id) else { return };
            let delta_time = delta_time * body.time_scale;
            let delta_time_squared = delta_time * delta_time;
            let correction = if body.delta_time > 0.0 {
                delta_time / body.delta_time
            } else {
                1.0
            };

            // carried over from the previous step
            let friction_air = 1.0 - body.friction_air * (delta_time / BASE_DELTA);
            let velocity_prev = (body.position - body.position_prev) * correction;

            body.velocity =
                velocity_prev * friction_air + (body.force / body.mass) * delta_time_squared;
            body.position_prev = body.position;
            body.position += body.velocity;

            let angular_velocity_prev = (body.angle - body.angle_prev) * correction;
            body.angular_velocity = angular_velocity_prev * friction_air
                + (body.torque / body.inertia) * delta_time_squared;
            body.angle_prev = body.angle;
            body.angle += body.angular_velocity;

            body.delta_time = delta_time;
            (
                body.velocity,
                body.angular_velocity,
                body.position,
                body.parts.clone(),
            )
        };

        for (i, part_id) in parts.iter().enumerate() {
            let Some(part) = self.get_mut(*part_id) else {
                continue;
            };
            vertices::translate(&mut part.vertices, velocity);
            if i > 0 {
                part.position += velocity;
            }
            if angular_velocity != 0.0 {
                vertices::rotate(&mut part.vertices, angular_velocity, position);
                axes::rotate(&mut part.axes, angular_velocity);
                if i > 0 {
                    part.position = part.position.rotate_about(angular_velocity, position);
                }
            }
            part.bounds.update(&part.vertices, Some(velocity));
        }
    }

    // ------------------------------------------------------------------
    // Pose setters
    // ------------------------------------------------------------------

    /// Move a body (and its parts) to `position`.
    ///
    /// By default `position_prev` follows, preserving velocity; with
    /// `update_velocity` the jump is turned into velocity instead.
    pub fn set_position(&mut self, id: BodyId, position: Vector, update_velocity: bool) {
        let (delta, velocity, parts) = {
            let Some(body) = self.get_mut(id) else { return };
            let delta = position - body.position;
            if update_velocity {
                body.position_prev = body.position;
                body.velocity = delta;
                body.speed = delta.magnitude();
            } else {
                body.position_prev += delta;
            }
            (delta, body.velocity, body.parts.clone())
        };

        for part_id in &parts {
            let Some(part) = self.get_mut(*part_id) else {
                continue;
            };
            part.position += delta;
            vertices::translate(&mut part.vertices, delta);
            part.bounds.update(&part.vertices, Some(velocity));
        }
    }

    /// Rotate a body (and its parts) to `angle` about its centre of mass.
    pub fn set_angle(&mut self, id: BodyId, angle: f64, update_velocity: bool) {
        let (delta, position, velocity, parts) = {
            let Some(body) = self.get_mut(id) else { return };
            let delta = angle - body.angle;
            if update_velocity {
                body.angle_prev = body.angle;
                body.angular_velocity = delta;
                body.angular_speed = delta.abs();
            } else {
                body.angle_prev += delta;
            }
            (delta, body.position, body.velocity, body.parts.clone())
        };

        for (i, part_id) in parts.iter().enumerate() {
            let Some(part) = self.get_mut(*part_id) else {
                continue;
            };
            part.angle += delta;
            vertices::rotate(&mut part.vertices, delta, position);
            axes::rotate(&mut part.axes, delta);
            part.bounds.update(&part.vertices, Some(velocity));
            if i > 0 {
                part.position = part.position.rotate_about(delta, position);
            }
        }
    }

    /// Translate a body by `translation`.
    pub fn translate_body(&mut self, id: BodyId, translation: Vector, update_velocity: bool) {
        let Some(body) = self.get(id) else { return };
        let target = body.position + translation;
        self.set_position(id, target, update_velocity);
    }

    /// Rotate a body by `rotation` radians, optionally about an external
    /// pivot instead of its centre of mass.
    pub fn rotate_body(
        &mut self,
        id: BodyId,
        rotation: f64,
        point: Option<Vector>,
        update_velocity: bool,
    ) {
        let Some(body) = self.get(id) else { return };
        let angle = body.angle + rotation;
        match point {
            None => self.set_angle(id, angle, update_velocity),
            Some(point) => {
                let position = body.position.rotate_about(rotation, point);
                self.set_position(id, position, update_velocity);
                self.set_angle(id, angle, update_velocity);
            }
        }
    }

    // ------------------------------------------------------------------
    // Static toggle
    // ------------------------------------------------------------------

    /// Make a body (and its parts) static or dynamic.
    ///
    /// Going static snapshots the physical attributes and pins the Verlet
    /// state; going dynamic restores the snapshot.
    pub fn set_static(&mut self, id: BodyId, is_static: bool) {
        let Some(body) = self.get(id) else { return };
        let parts = body.parts.clone();

        for part_id in parts {
            let Some(part) = self.get_mut(part_id) else {
                continue;
            };
            if is_static {
                if !part.is_static {
                    part.original = Some(StaticSnapshot {
                        restitution: part.restitution,
                        friction: part.friction,
                        mass: part.mass,
                        inertia: part.inertia,
                        density: part.density,
                        inverse_mass: part.inverse_mass,
                        inverse_inertia: part.inverse_inertia,
                    });
                }
                part.is_static = true;
                part.restitution = 0.0;
                part.friction = 1.0;
                part.mass = f64::INFINITY;
                part.inertia = f64::INFINITY;
                part.density = f64::INFINITY;
                part.inverse_mass = 0.0;
                part.inverse_inertia = 0.0;
                part.position_prev = part.position;
                part.angle_prev = part.angle;
                part.velocity = Vector::ZERO;
                part.angular_velocity = 0.0;
                part.speed = 0.0;
                part.angular_speed = 0.0;
                part.motion = 0.0;
            } else {
                part.is_static = false;
                if let Some(original) = part.original.take() {
                    part.restitution = original.restitution;
                    part.friction = original.friction;
                    part.mass = original.mass;
                    part.inertia = original.inertia;
                    part.density = original.density;
                    part.inverse_mass = original.inverse_mass;
                    part.inverse_inertia = original.inverse_inertia;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Compound parts
    // ------------------------------------------------------------------

    /// Attach `part_ids` as sub-parts of `root`, making it a compound body.
    ///
    /// With `auto_hull` the root's own ring becomes the convex hull of all
    /// part rings. The root's mass, area, inertia and centre are rebuilt
    /// from the parts either way.
    pub fn set_parts(
        &mut self,
        root: BodyId,
        part_ids: Vec<BodyId>,
        auto_hull: bool,
    ) -> Result<(), PhysicsError> {
        if !self.contains(root) {
            return Err(PhysicsError::UnknownBody { id: root });
        }
        for &part_id in &part_ids {
            let Some(part) = self.get(part_id) else {
                return Err(PhysicsError::UnknownBody { id: part_id });
            };
            if part_id != root && part.parent.is_some() {
                return Err(PhysicsError::InvalidBody {
                    reason: "part already belongs to a compound body",
                });
            }
            if part_id != root && part.parts.len() > 1 {
                return Err(PhysicsError::InvalidBody {
                    reason: "a compound body cannot become a part",
                });
            }
        }

        let mut parts = vec![root];
        for part_id in part_ids {
            if part_id != root {
                parts.push(part_id);
                if let Some(part) = self.get_mut(part_id) {
                    part.parent = Some(root);
                }
            }
        }
        if let Some(body) = self.get_mut(root) {
            body.parts = parts.clone();
            body.parent = None;
        }
        if parts.len() == 1 {
            return Ok(());
        }

        if auto_hull {
            let mut all_vertices: Vec<Vertex> = Vec::new();
            for &part_id in &parts {
                if let Some(part) = self.get(part_id) {
                    all_vertices.extend_from_slice(&part.vertices);
                }
            }
            vertices::clockwise_sort(&mut all_vertices);
            let hull = vertices::hull(&all_vertices);
            let hull_centre = vertices::centre(&hull);
            let points: Vec<Vector> = hull.iter().map(Vertex::point).collect();
            if let Some(body) = self.get_mut(root) {
                body.set_vertices(&points)?;
                vertices::translate(&mut body.vertices, hull_centre);
            }
        }

        let total = self.total_properties(root);
        if let Some(body) = self.get_mut(root) {
            body.area = total.area;
            body.position = total.centre;
            body.position_prev = total.centre;
            body.set_mass(total.mass);
            body.set_inertia(total.inertia);
        }
        self.set_position(root, total.centre, false);
        Ok(())
    }

    /// Summed mass, area, inertia and the mass-weighted centre of a
    /// compound's sub-parts.
    fn total_properties(&self, root: BodyId) -> TotalProperties {
        let mut total = TotalProperties::default();
        let Some(body) = self.get(root) else {
            return total;
        };
        let start = if body.parts.len() == 1 { 0 } else { 1 };
        for &part_id in &body.parts[start..] {
            let Some(part) = self.get(part_id) else {
                continue;
            };
            let mass = if part.mass.is_finite() { part.mass } else { 1.0 };
            total.mass += mass;
            total.area += part.area;
            total.inertia += part.inertia;
            total.centre += part.position * mass;
        }
        total.centre = total.centre / total.mass;
        total
    }

    // ------------------------------------------------------------------
    // Scaling
    // ------------------------------------------------------------------

    /// Scale a body (and its parts) about `point`, defaulting to its centre
    /// of mass. Mass, inertia and bounds are rebuilt from the scaled rings.
    pub fn scale_body(&mut self, id: BodyId, scale_x: f64, scale_y: f64, point: Option<Vector>) {
        let (point, density, parts, is_static, velocity) = {
            let Some(body) = self.get(id) else { return };
            (
                point.unwrap_or(body.position),
                body.density,
                body.parts.clone(),
                body.is_static,
                body.velocity,
            )
        };

        let mut total_area = 0.0;
        let mut total_inertia = 0.0;

        for (i, part_id) in parts.iter().enumerate() {
            let Some(part) = self.get_mut(*part_id) else {
                continue;
            };
            vertices::scale(&mut part.vertices, scale_x, scale_y, Some(point));

            part.axes = axes::from_vertices(&part.vertices);
            part.area = vertices::area(&part.vertices, false);
            part.set_mass(density * part.area);

            // inertia is measured with the ring at the origin
            let part_position = part.position;
            vertices::translate(&mut part.vertices, -part_position);
            let inertia = INERTIA_SCALE * vertices::inertia(&part.vertices, part.mass);
            part.set_inertia(inertia);
            vertices::translate(&mut part.vertices, part_position);

            if i > 0 {
                total_area += part.area;
                total_inertia += part.inertia;
            }

            part.position = Vector::new(
                point.x + (part.position.x - point.x) * scale_x,
                point.y + (part.position.y - point.y) * scale_y,
            );
            part.bounds.update(&part.vertices, Some(velocity));
        }

        if parts.len() > 1 {
            if let Some(body) = self.get_mut(id) {
                body.area = total_area;
                if !is_static {
                    body.set_mass(density * total_area);
                    body.set_inertia(total_inertia);
                }
            }
        }

        if let Some(body) = self.get_mut(id) {
            if let Some(radius) = body.circle_radius {
                if scale_x == scale_y {
                    body.circle_radius = Some(radius * scale_x);
                } else {
                    // non-uniform scaling breaks the circle approximation
                    body.circle_radius = None;
                }
            }
        }
    }
}

/// Aggregate of a compound's sub-part properties.
#[derive(Clone, Copy, Debug, Default)]
struct TotalProperties {
    mass: f64,
    area: f64,
    inertia: f64,
    centre: Vector,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn square_options(size: f64, position: Vector) -> BodyOptions {
        BodyOptions {
            vertices: vec![
                Vector::new(0.0, 0.0),
                Vector::new(size, 0.0),
                Vector::new(size, size),
                Vector::new(0.0, size),
            ],
            position,
            ..BodyOptions::default()
        }
    }

    fn store_with_square(size: f64, position: Vector) -> (BodyStore, BodyId) {
        let mut store = BodyStore::new();
        let id = store.next_id();
        let body = Body::standalone(id, square_options(size, position)).unwrap();
        store.insert(body);
        (store, id)
    }

    #[test]
    fn test_create_derives_mass_and_inertia() {
        let (store, id) = store_with_square(40.0, Vector::ZERO);
        let body = store.get(id).unwrap();
        assert!((body.area - 1600.0).abs() < 1e-9);
        assert!((body.mass - 1.6).abs() < 1e-9, "mass = density * area");
        assert!((body.inverse_mass - 1.0 / body.mass).abs() < 1e-12);
        assert!(body.inertia > 0.0);
        assert!((body.inverse_inertia - 1.0 / body.inertia).abs() < 1e-12);
        assert_eq!(body.parts, vec![id], "parts[0] must be the body itself");
    }

    #[test]
    fn test_create_rejects_degenerate_ring() {
        let result = Body::standalone(
            BodyId(0),
            BodyOptions {
                vertices: vec![Vector::ZERO, Vector::new(1.0, 0.0)],
                ..BodyOptions::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_vertices_centred_on_position() {
        let (store, id) = store_with_square(40.0, Vector::new(100.0, 200.0));
        let body = store.get(id).unwrap();
        let centre = vertices::centre(&body.vertices);
        assert!((centre.x - 100.0).abs() < 1e-9);
        assert!((centre.y - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_position_is_idempotent() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        store.set_position(id, Vector::new(10.0, 10.0), false);
        store.set_position(id, Vector::new(25.0, -5.0), false);
        let direct = store.get(id).unwrap().clone();

        let (mut store2, id2) = store_with_square(40.0, Vector::ZERO);
        store2.set_position(id2, Vector::new(25.0, -5.0), false);
        let single = store2.get(id2).unwrap();

        assert!((direct.position.x - single.position.x).abs() < 1e-9);
        assert!((direct.position.y - single.position.y).abs() < 1e-9);
        for (a, b) in direct.vertices.iter().zip(single.vertices.iter()) {
            assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_set_position_preserves_velocity_by_default() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        store.get_mut(id).unwrap().set_velocity(Vector::new(3.0, 0.0));
        let before = store.get(id).unwrap().get_velocity();
        store.set_position(id, Vector::new(500.0, 0.0), false);
        let after = store.get(id).unwrap().get_velocity();
        assert!((before.x - after.x).abs() < 1e-9);
    }

    #[test]
    fn test_set_velocity_round_trip() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        let body = store.get_mut(id).unwrap();
        body.set_velocity(Vector::new(5.0, -2.0));
        let v = body.get_velocity();
        assert!((v.x - 5.0).abs() < 1e-9 && (v.y + 2.0).abs() < 1e-9);
        assert!((body.speed - v.magnitude()).abs() < 1e-9);
    }

    #[test]
    fn test_set_static_snapshots_and_restores() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        let original_mass = store.get(id).unwrap().mass;

        store.set_static(id, true);
        {
            let body = store.get(id).unwrap();
            assert!(body.is_static);
            assert_eq!(body.inverse_mass, 0.0);
            assert_eq!(body.inverse_inertia, 0.0);
            assert!(body.mass.is_infinite());
        }

        store.set_static(id, false);
        let body = store.get(id).unwrap();
        assert!(!body.is_static);
        assert!((body.mass - original_mass).abs() < 1e-9, "mass restored");
        assert!((body.inverse_mass - 1.0 / original_mass).abs() < 1e-12);
    }

    #[test]
    fn test_update_moves_body_under_force() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        {
            let body = store.get_mut(id).unwrap();
            let mass = body.mass;
            body.apply_force(body.position, Vector::new(0.0, 0.001 * mass));
        }
        store.update_body(id, BASE_DELTA);
        let body = store.get(id).unwrap();
        assert!(body.position.y > 0.0, "force should move the body");
        let centre = vertices::centre(&body.vertices);
        assert!(
            (centre.y - body.position.y).abs() < 1e-9,
            "vertices must follow the body"
        );
        assert!(body.bounds.contains(body.position));
    }

    #[test]
    fn test_update_applies_angular_velocity_to_ring() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        store
            .get_mut(id)
            .unwrap()
            .set_angular_velocity(core::f64::consts::FRAC_PI_4);
        store.update_body(id, BASE_DELTA);
        let body = store.get(id).unwrap();
        assert!(body.angle > 0.0);
        assert!(vertices::is_convex(&body.vertices), "ring stays convex");
    }

    #[test]
    fn test_apply_force_induces_torque() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        let body = store.get_mut(id).unwrap();
        body.apply_force(body.position + Vector::new(10.0, 0.0), Vector::new(0.0, 1.0));
        assert!((body.torque - 10.0).abs() < 1e-9);
        assert!((body.force.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_updates_mass_area() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        let before_mass = store.get(id).unwrap().mass;
        store.scale_body(id, 2.0, 2.0, None);
        let body = store.get(id).unwrap();
        assert!((body.area - 6400.0).abs() < 1e-6);
        assert!((body.mass - before_mass * 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_non_uniform_clears_circle_radius() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        store.get_mut(id).unwrap().circle_radius = Some(20.0);
        store.scale_body(id, 2.0, 2.0, None);
        assert_eq!(store.get(id).unwrap().circle_radius, Some(40.0));
        store.scale_body(id, 1.0, 2.0, None);
        assert_eq!(store.get(id).unwrap().circle_radius, None);
    }

    #[test]
    fn test_set_parts_builds_compound() {
        let mut store = BodyStore::new();
        let root_id = store.next_id();
        store.insert(Body::standalone(root_id, square_options(20.0, Vector::ZERO)).unwrap());
        let part_id = store.next_id();
        store.insert(
            Body::standalone(part_id, square_options(20.0, Vector::new(20.0, 0.0))).unwrap(),
        );

        store.set_parts(root_id, vec![part_id], true).unwrap();

        let root = store.get(root_id).unwrap();
        assert_eq!(root.parts[0], root_id, "parts[0] is the root");
        assert_eq!(root.parts.len(), 2);
        assert_eq!(store.get(part_id).unwrap().parent, Some(root_id));
        // one 20x20 part: totals come from the part alone
        assert!((root.area - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_parts_rejects_claimed_part() {
        let mut store = BodyStore::new();
        let a = store.next_id();
        store.insert(Body::standalone(a, square_options(20.0, Vector::ZERO)).unwrap());
        let b = store.next_id();
        store.insert(Body::standalone(b, square_options(20.0, Vector::new(30.0, 0.0))).unwrap());
        let c = store.next_id();
        store.insert(Body::standalone(c, square_options(20.0, Vector::new(60.0, 0.0))).unwrap());

        store.set_parts(a, vec![b], true).unwrap();
        let result = store.set_parts(c, vec![b], true);
        assert!(result.is_err(), "a part cannot join two compounds");
    }

    #[test]
    fn test_update_velocities_normalises_to_base_delta() {
        let (mut store, id) = store_with_square(40.0, Vector::ZERO);
        let body = store.get_mut(id).unwrap();
        body.delta_time = BASE_DELTA / 2.0;
        body.position_prev = Vector::new(-1.0, 0.0);
        body.position = Vector::ZERO;
        body.update_velocities();
        assert!(
            (body.velocity.x - 2.0).abs() < 1e-9,
            "half-step displacement doubles when normalised"
        );
    }
}
