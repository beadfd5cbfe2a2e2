//! VERA-Physics: Deterministic 2D Rigid-Body Physics Engine
//!
//! An impulse-based 2D physics engine for interactive simulation: stacking,
//! chains, ropes, compound bodies and everything in between. One fixed step
//! integrates body motion with Verlet integration, detects contacts with a
//! sort-and-sweep broad phase plus SAT narrow phase, and resolves them with
//! a warm-started Gauss–Seidel impulse solver.
//!
//! # Features
//!
//! - **Verlet Integration**: velocity lives implicitly in `position -
//!   position_prev`, so the solver can apply impulses by editing the past
//! - **SAT Collision Detection**: convex polygons with deduplicated
//!   projection axes and persistent support points
//! - **Warm-Started Solver**: contact impulses survive across steps, so low
//!   iteration counts (6 position, 4 velocity) yield stable stacks
//! - **Distance Constraints**: rigid rods, springs and pins with anchor
//!   rotation and warm starting
//! - **Sleeping**: quiescent bodies freeze and wake on contact or force
//! - **Deterministic**: same scene, same deltas, same iteration counts give
//!   the same trajectories on one platform; randomness is funnelled through
//!   a seeded generator
//!
//! # Example
//!
//! ```
//! use vera_physics::{BodyOptions, Engine, Vector};
//!
//! let mut engine = Engine::default();
//! let root = engine.world.root();
//!
//! // a dynamic box over a static floor
//! let ball = engine
//!     .world
//!     .create_body(BodyOptions {
//!         position: Vector::new(0.0, -100.0),
//!         ..BodyOptions::default()
//!     })
//!     .unwrap();
//! let floor = engine
//!     .world
//!     .create_body(BodyOptions {
//!         position: Vector::new(0.0, 40.0),
//!         is_static: true,
//!         ..BodyOptions::default()
//!     })
//!     .unwrap();
//! engine.world.add_body(root, ball).unwrap();
//! engine.world.add_body(root, floor).unwrap();
//!
//! // one second of simulation at 60 Hz
//! for _ in 0..60 {
//!     engine.update(None);
//! }
//! assert!(engine.world.bodies.get(ball).unwrap().position.y > -100.0);
//! ```
//!
//! # Modules
//!
//! - [`math`]: 2D vector and velocity-extended AABB primitives
//! - [`vertices`]: polygon rings (area, centroid, inertia, hull, chamfer)
//! - [`axes`]: deduplicated SAT projection axes
//! - [`body`]: rigid bodies, integration and the body arena
//! - [`world`]: entity arenas, factories, id allocators
//! - [`composite`]: recursive containers with modification tracking
//! - [`collision`]: SAT narrow phase
//! - [`detector`]: sort-and-sweep broad phase
//! - [`pairs`]: persistent contact pairs with warm-start impulses
//! - [`resolver`]: position and velocity impulse passes
//! - [`constraint`]: distance/spring constraints
//! - [`sleeping`]: motion-biased sleep and wake policy
//! - [`engine`]: the step orchestrator
//! - [`query`]: point, region, ray and overlap queries
//! - [`events`]: synchronous lifecycle notifications
//! - [`filter`]: category/mask/group collision filtering
//! - [`common`]: base timestep, entity handles, seeded RNG
//! - [`error`]: unified error type
//! - [`profiling`]: deterministic per-step pipeline counters
//!
//! # Concurrency
//!
//! A step is single-threaded and synchronous by design: the solver is
//! Gauss–Seidel and later contacts must observe the corrections of earlier
//! ones. The optional `parallel` feature accelerates read-only spatial
//! queries with Rayon; it never touches the solver.

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(feature = "parallel", not(feature = "std")))]
compile_error!("Feature `parallel` requires `std`.");

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod axes;
pub mod body;
pub mod collision;
pub mod common;
pub mod composite;
pub mod constraint;
pub mod detector;
pub mod engine;
pub mod error;
pub mod events;
pub mod filter;
pub mod math;
pub mod pairs;
pub mod profiling;
pub mod query;
pub mod resolver;
pub mod sleeping;
pub mod vertices;
pub mod world;

pub use body::{Body, BodyOptions, BodyStore, ConstraintImpulse, StaticSnapshot};
pub use collision::{Collision, Support};
pub use common::{BodyId, CompositeId, ConstraintId, Prng, BASE_DELTA};
pub use composite::{Child, Composite, CompositeStore};
pub use constraint::{Constraint, ConstraintOptions, ConstraintStore};
pub use detector::Detector;
pub use engine::{Engine, EngineOptions, Gravity, Timing};
pub use error::PhysicsError;
pub use events::{EventName, EventPayload, Events, SubscriptionId};
pub use filter::CollisionFilter;
pub use math::{Bounds, Vector};
pub use pairs::{Contact, Pair, PairKey, PairRegistry};
pub use profiling::{Profiler, StageCounter};
pub use query::RayHit;
pub use vertices::Vertex;
pub use world::World;
