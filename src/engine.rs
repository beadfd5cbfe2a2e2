//! Engine
//!
//! Orchestrates one fixed step of the pipeline: gravity, Verlet integration,
//! constraint solving, broad + narrow phase collision detection, pair
//! bookkeeping, the position and velocity impulse passes, and the lifecycle
//! notifications around them.
//!
//! A step is synchronous and runs to completion; the world may only be
//! edited between steps. Edits mark the world modified, and the next step
//! resynchronises the broad phase before using it. Within a step the event
//! order is fixed: `beforeUpdate`, `beforeSolve`, `collisionStart`,
//! `collisionActive`, `collisionEnd`, `afterUpdate`.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::common::{BodyId, ConstraintId, BASE_DELTA};
use crate::constraint;
use crate::detector::Detector;
use crate::events::{EventName, EventPayload, Events};
use crate::math::Vector;
use crate::pairs::PairRegistry;
use crate::profiling::Profiler;
use crate::resolver;
use crate::sleeping;
use crate::world::World;

// ============================================================================
// Configuration
// ============================================================================

/// World gravity. The effective acceleration is `(x, y) * scale` per unit
/// mass, applied as force each step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gravity {
    /// Horizontal component
    pub x: f64,
    /// Vertical component (positive points down the screen)
    pub y: f64,
    /// Scaling applied to both components
    pub scale: f64,
}

impl Default for Gravity {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 1.0,
            scale: 0.001,
        }
    }
}

/// Step timing bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    /// Accumulated simulation time in milliseconds
    pub timestamp: f64,
    /// Global time scaling applied to every step delta
    pub time_scale: f64,
    /// Delta used by the most recent step
    pub last_delta: f64,
    /// Wall-clock duration of the most recent step in milliseconds
    /// (0 without the `std` feature)
    pub last_elapsed: f64,
    /// Steps an external runner performed last frame; maintained by that
    /// runner, not by the engine
    pub last_updates_per_frame: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            time_scale: 1.0,
            last_delta: 0.0,
            last_elapsed: 0.0,
            last_updates_per_frame: 0,
        }
    }
}

/// Construction options for an engine.
#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    /// Iterations of the positional correction pass
    pub position_iterations: u32,
    /// Iterations of the velocity impulse pass
    pub velocity_iterations: u32,
    /// Iterations of each constraint pass
    pub constraint_iterations: u32,
    /// Whether quiescent bodies are put to sleep
    pub enable_sleeping: bool,
    /// World gravity
    pub gravity: Gravity,
    /// Global time scaling
    pub time_scale: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            position_iterations: 6,
            velocity_iterations: 4,
            constraint_iterations: 2,
            enable_sleeping: false,
            gravity: Gravity::default(),
            time_scale: 1.0,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The simulation driver.
#[derive(Debug)]
pub struct Engine {
    /// The world being simulated
    pub world: World,
    /// Persistent contact pairs
    pub pairs: PairRegistry,
    /// Broad-phase detector
    pub detector: Detector,
    /// World gravity
    pub gravity: Gravity,
    /// Step timing
    pub timing: Timing,
    /// Iterations of the positional correction pass
    pub position_iterations: u32,
    /// Iterations of the velocity impulse pass
    pub velocity_iterations: u32,
    /// Iterations of each constraint pass
    pub constraint_iterations: u32,
    /// Whether quiescent bodies are put to sleep
    pub enable_sleeping: bool,
    /// Hub for step and collision lifecycle notifications
    pub events: Events,
    /// Deterministic per-step pipeline counters
    pub profiler: Profiler,
}

impl Engine {
    /// Create an engine with a fresh world.
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self::with_world(World::new(), options)
    }

    /// Create an engine around an existing world.
    #[must_use]
    pub fn with_world(world: World, options: EngineOptions) -> Self {
        Self {
            world,
            pairs: PairRegistry::new(),
            detector: Detector::new(),
            gravity: options.gravity,
            timing: Timing {
                time_scale: options.time_scale,
                ..Timing::default()
            },
            position_iterations: options.position_iterations,
            velocity_iterations: options.velocity_iterations,
            constraint_iterations: options.constraint_iterations,
            enable_sleeping: options.enable_sleeping,
            events: Events::new(),
            profiler: Profiler::new(),
        }
    }

    /// Advance the simulation one step of `delta` milliseconds (the base
    /// 60 Hz delta when `None`), scaled by `timing.time_scale`.
    pub fn update(&mut self, delta: Option<f64>) {
        #[cfg(feature = "std")]
        let started = std::time::Instant::now();

        let delta = delta.unwrap_or(BASE_DELTA) * self.timing.time_scale;
        // pairs are stamped with the step's starting time
        let timestamp = self.timing.timestamp;
        self.timing.timestamp += delta;
        self.timing.last_delta = delta;

        let step = EventPayload::Step {
            timestamp: self.timing.timestamp,
            delta,
        };
        self.events.emit(EventName::BeforeUpdate, &step);

        let all_bodies: Vec<BodyId> = self.world.all_bodies();
        let all_constraints: Vec<ConstraintId> = self.world.all_constraints();

        if self.world.take_modified() {
            self.detector.set_bodies(all_bodies.clone());
        }

        if self.enable_sleeping {
            sleeping::update(&mut self.world.bodies, &all_bodies, delta, &mut self.events);
        }

        self.apply_gravity(&all_bodies);

        if delta > 0.0 {
            for &id in &all_bodies {
                let skip = self
                    .world
                    .bodies
                    .get(id)
                    .map_or(true, |body| body.is_static || body.is_sleeping);
                if !skip {
                    self.world.bodies.update_body(id, delta);
                }
            }
        }

        self.events.emit(EventName::BeforeSolve, &step);

        // constraints, first pass
        constraint::pre_solve_all(&mut self.world.bodies, &all_bodies);
        for _ in 0..self.constraint_iterations {
            constraint::solve_all(
                &mut self.world.constraints,
                &all_constraints,
                &mut self.world.bodies,
                delta,
            );
        }
        constraint::post_solve_all(&mut self.world.bodies, &all_bodies, &mut self.events);

        // collision detection
        let collisions = self.detector.collisions(&self.world.bodies);
        self.profiler
            .broad_phase_checks
            .record(self.detector.last_candidate_checks);
        self.profiler
            .narrow_phase_tests
            .record(self.detector.last_narrow_tests);
        self.profiler
            .collisions_found
            .record(collisions.len() as u64);

        self.pairs.update(collisions, timestamp, &self.world.bodies);
        let active_pairs = self.pairs.list.iter().filter(|p| p.is_active).count() as u64;
        self.profiler.active_pairs.record(active_pairs);

        if self.enable_sleeping {
            sleeping::after_collisions(&self.pairs.list, &mut self.world.bodies, &mut self.events);
        }

        if !self.pairs.collision_start.is_empty() {
            let payload = EventPayload::Collisions {
                timestamp: self.timing.timestamp,
                pairs: &self.pairs.collision_start,
            };
            self.events.emit(EventName::CollisionStart, &payload);
        }

        // position pass
        let position_damping = (20.0 / f64::from(self.position_iterations)).clamp(0.0, 1.0);
        resolver::pre_solve_position(&mut self.pairs.list, &mut self.world.bodies);
        for _ in 0..self.position_iterations {
            resolver::solve_position(
                &mut self.pairs.list,
                &mut self.world.bodies,
                delta,
                position_damping,
            );
        }
        resolver::post_solve_position(&all_bodies, &mut self.world.bodies);

        // constraints, second pass
        constraint::pre_solve_all(&mut self.world.bodies, &all_bodies);
        for _ in 0..self.constraint_iterations {
            constraint::solve_all(
                &mut self.world.constraints,
                &all_constraints,
                &mut self.world.bodies,
                delta,
            );
        }
        constraint::post_solve_all(&mut self.world.bodies, &all_bodies, &mut self.events);

        // velocity pass
        resolver::pre_solve_velocity(&mut self.pairs.list, &mut self.world.bodies);
        for _ in 0..self.velocity_iterations {
            resolver::solve_velocity(&mut self.pairs.list, &mut self.world.bodies, delta);
        }

        self.profiler.solver_iterations.record(
            u64::from(self.position_iterations + self.velocity_iterations) * active_pairs,
        );
        self.profiler.constraints_solved.record(
            all_constraints.len() as u64 * u64::from(self.constraint_iterations) * 2,
        );

        for &id in &all_bodies {
            if let Some(body) = self.world.bodies.get_mut(id) {
                body.update_velocities();
            }
        }

        if !self.pairs.collision_active.is_empty() {
            let payload = EventPayload::Collisions {
                timestamp: self.timing.timestamp,
                pairs: &self.pairs.collision_active,
            };
            self.events.emit(EventName::CollisionActive, &payload);
        }
        if !self.pairs.collision_end.is_empty() {
            let payload = EventPayload::Collisions {
                timestamp: self.timing.timestamp,
                pairs: &self.pairs.collision_end,
            };
            self.events.emit(EventName::CollisionEnd, &payload);
        }

        for &id in &all_bodies {
            if let Some(body) = self.world.bodies.get_mut(id) {
                body.force = Vector::ZERO;
                body.torque = 0.0;
            }
        }

        self.events.emit(EventName::AfterUpdate, &step);

        #[cfg(feature = "std")]
        {
            self.timing.last_elapsed = started.elapsed().as_secs_f64() * 1000.0;
        }
    }

    fn apply_gravity(&mut self, ids: &[BodyId]) {
        let gravity = self.gravity;
        if (gravity.x == 0.0 && gravity.y == 0.0) || gravity.scale == 0.0 {
            return;
        }
        for &id in ids {
            let Some(body) = self.world.bodies.get_mut(id) else {
                continue;
            };
            if body.is_static || body.is_sleeping {
                continue;
            }
            body.force.x += body.mass * gravity.x * gravity.scale;
            body.force.y += body.mass * gravity.y * gravity.scale;
        }
    }

    /// Adopt another engine's world, waking every body and resetting
    /// collision state.
    pub fn merge(&mut self, other: Engine) {
        self.world = other.world;
        self.clear();
        let ids = self.world.all_bodies();
        for id in ids {
            if let Some(body) = self.world.bodies.get_mut(id) {
                sleeping::set(body, false, &mut self.events);
            }
        }
    }

    /// Drop all collision state and resynchronise the detector with the
    /// current world.
    pub fn clear(&mut self) {
        self.pairs.clear();
        let bodies = self.world.all_bodies();
        self.detector.set_bodies(bodies);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
