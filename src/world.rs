//! World
//!
//! The [`World`] owns every entity of a simulation: arenas of bodies,
//! constraints and composites, the root composite they hang from, and the
//! counters handing out collision groups and category bits. Entities refer
//! to each other through stable integer handles, never through shared
//! pointers, so cycles in the scene graph (body ↔ part, composite ↔
//! composite) stay trivially safe.
//!
//! Factory methods validate their inputs and return handles; the tree
//! operations that place entities into composites live in
//! [`composite`](crate::composite).

use crate::body::{Body, BodyOptions, BodyStore};
use crate::common::{BodyId, CompositeId, ConstraintId};
use crate::composite::CompositeStore;
use crate::constraint::{self, ConstraintOptions, ConstraintStore};
use crate::error::PhysicsError;
use crate::events::Events;

/// Owner of all simulation entities.
#[derive(Debug)]
pub struct World {
    /// Arena of bodies (including compound parts)
    pub bodies: BodyStore,
    /// Arena of constraints
    pub constraints: ConstraintStore,
    /// Arena of composites
    pub composites: CompositeStore,
    /// Hub for `beforeAdd`/`afterAdd`/`beforeRemove`/`afterRemove`
    pub events: Events,
    root: CompositeId,
    colliding_group: i32,
    non_colliding_group: i32,
    category_bit: u32,
}

impl World {
    /// Create an empty world with a root composite.
    #[must_use]
    pub fn new() -> Self {
        let mut composites = CompositeStore::new();
        let root = composites.create("World");
        Self {
            bodies: BodyStore::new(),
            constraints: ConstraintStore::new(),
            composites,
            events: Events::new(),
            root,
            colliding_group: 0,
            non_colliding_group: 0,
            category_bit: 0,
        }
    }

    /// The root composite.
    #[must_use]
    pub fn root(&self) -> CompositeId {
        self.root
    }

    /// Build a body from options and store it.
    ///
    /// The body exists but belongs to no composite until added with
    /// [`World::add_body`].
    pub fn create_body(&mut self, options: BodyOptions) -> Result<BodyId, PhysicsError> {
        let is_static = options.is_static;
        let id = self.bodies.next_id();
        let body = Body::standalone(id, options)?;
        self.bodies.insert(body);
        if is_static {
            self.bodies.set_static(id, true);
        }
        Ok(id)
    }

    /// Build a constraint from options and store it.
    pub fn create_constraint(
        &mut self,
        options: ConstraintOptions,
    ) -> Result<ConstraintId, PhysicsError> {
        let id = self.constraints.next_id();
        let constraint = constraint::build(id, options, &self.bodies)?;
        Ok(self.constraints.insert(constraint))
    }

    /// Create an empty composite.
    pub fn create_composite(&mut self, label: &str) -> CompositeId {
        self.composites.create(label)
    }

    /// Hand out a fresh collision group id.
    ///
    /// Positive ids collide only with themselves; `non_colliding` ids never
    /// collide with each other.
    pub fn next_group(&mut self, non_colliding: bool) -> i32 {
        if non_colliding {
            self.non_colliding_group -= 1;
            self.non_colliding_group
        } else {
            self.colliding_group += 1;
            self.colliding_group
        }
    }

    /// Hand out the next collision category bit.
    ///
    /// The 32-bit field saturates at the top bit once exhausted.
    pub fn next_category(&mut self) -> u32 {
        if self.category_bit < 31 {
            self.category_bit += 1;
        }
        1 << self.category_bit
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
