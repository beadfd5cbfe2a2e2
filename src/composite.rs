//! Composites
//!
//! A [`Composite`] is a recursive container of bodies, constraints and other
//! composites. Every world has a root composite; scene helpers build their
//! own and attach them. Mutating any composite invalidates the flattened
//! `all_*` caches along the path to the root and raises the root's modified
//! flag, which tells the engine to resynchronise its broad phase on the next
//! step.
//!
//! Tree operations live on [`World`] because they touch several arenas at
//! once (detaching a body can destroy it, and destruction reaches into the
//! body arena).

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::common::{BodyId, CompositeId, ConstraintId};
use crate::error::PhysicsError;
use crate::events::{EventName, EventPayload};
use crate::math::{Bounds, Vector};
use crate::world::World;

// ============================================================================
// Child
// ============================================================================

/// A reference to anything a composite can contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    /// A body handle
    Body(BodyId),
    /// A constraint handle
    Constraint(ConstraintId),
    /// A composite handle
    Composite(CompositeId),
}

// ============================================================================
// Composite
// ============================================================================

/// Flattened-descendant caches, rebuilt lazily after mutations.
#[derive(Clone, Debug, Default)]
struct CompositeCache {
    all_bodies: Option<Vec<BodyId>>,
    all_constraints: Option<Vec<ConstraintId>>,
    all_composites: Option<Vec<CompositeId>>,
}

/// A recursive container of bodies, constraints and composites.
#[derive(Clone, Debug)]
pub struct Composite {
    /// Stable handle of this composite within its world
    pub id: CompositeId,
    /// Display label
    pub label: String,
    /// Parent composite; `None` for roots
    pub parent: Option<CompositeId>,
    /// Set when this composite or any descendant has been mutated
    pub is_modified: bool,
    /// Directly contained bodies
    pub bodies: Vec<BodyId>,
    /// Directly contained constraints
    pub constraints: Vec<ConstraintId>,
    /// Directly contained composites
    pub composites: Vec<CompositeId>,
    cache: CompositeCache,
}

// ============================================================================
// CompositeStore
// ============================================================================

/// Arena owning every composite of a world, addressed by [`CompositeId`].
#[derive(Clone, Debug, Default)]
pub struct CompositeStore {
    entries: Vec<Option<Composite>>,
}

impl CompositeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Allocate a fresh composite.
    pub(crate) fn create(&mut self, label: &str) -> CompositeId {
        let id = CompositeId(self.entries.len() as u32);
        self.entries.push(Some(Composite {
            id,
            label: String::from(label),
            parent: None,
            is_modified: false,
            bodies: Vec::new(),
            constraints: Vec::new(),
            composites: Vec::new(),
            cache: CompositeCache::default(),
        }));
        id
    }

    /// Whether `id` resolves to a live composite.
    #[must_use]
    pub fn contains(&self, id: CompositeId) -> bool {
        matches!(self.entries.get(id.0 as usize), Some(Some(_)))
    }

    /// Borrow a composite.
    #[must_use]
    pub fn get(&self, id: CompositeId) -> Option<&Composite> {
        self.entries.get(id.0 as usize)?.as_ref()
    }

    /// Mutably borrow a composite.
    pub fn get_mut(&mut self, id: CompositeId) -> Option<&mut Composite> {
        self.entries.get_mut(id.0 as usize)?.as_mut()
    }

    /// Iterate over live composites.
    pub fn iter(&self) -> impl Iterator<Item = &Composite> {
        self.entries.iter().filter_map(|entry| entry.as_ref())
    }
}

// ============================================================================
// Tree operations
// ============================================================================

impl World {
    /// Add a child to a composite.
    ///
    /// Compound parts cannot be added directly (their root carries them), a
    /// composite can only be attached while detached, and attachments that
    /// would create a cycle are rejected.
    pub fn add(&mut self, composite: CompositeId, child: Child) -> Result<(), PhysicsError> {
        if !self.composites.contains(composite) {
            return Err(PhysicsError::UnknownComposite { id: composite });
        }
        match child {
            Child::Body(id) => {
                let Some(body) = self.bodies.get(id) else {
                    return Err(PhysicsError::UnknownBody { id });
                };
                if body.parent.is_some() {
                    return Err(PhysicsError::InvalidBody {
                        reason: "compound parts cannot be added directly",
                    });
                }
            }
            Child::Constraint(id) => {
                if !self.constraints.contains(id) {
                    return Err(PhysicsError::UnknownConstraint { id });
                }
            }
            Child::Composite(id) => {
                let Some(target) = self.composites.get(id) else {
                    return Err(PhysicsError::UnknownComposite { id });
                };
                if target.parent.is_some() {
                    return Err(PhysicsError::InvalidComposite {
                        reason: "composite is already attached; detach or move it instead",
                    });
                }
                let mut cursor = Some(composite);
                while let Some(current) = cursor {
                    if current == id {
                        return Err(PhysicsError::InvalidComposite {
                            reason: "attachment would create a cycle",
                        });
                    }
                    cursor = self.composites.get(current).and_then(|c| c.parent);
                }
            }
        }

        self.events
            .emit(EventName::BeforeAdd, &EventPayload::Tree { child });

        if let Some(parent) = self.composites.get_mut(composite) {
            match child {
                Child::Body(id) => {
                    if !parent.bodies.contains(&id) {
                        parent.bodies.push(id);
                    }
                }
                Child::Constraint(id) => {
                    if !parent.constraints.contains(&id) {
                        parent.constraints.push(id);
                    }
                }
                Child::Composite(id) => {
                    if !parent.composites.contains(&id) {
                        parent.composites.push(id);
                    }
                }
            }
        }
        if let Child::Composite(id) = child {
            if let Some(target) = self.composites.get_mut(id) {
                target.parent = Some(composite);
            }
        }

        self.set_modified(composite, true, true, false);
        self.events
            .emit(EventName::AfterAdd, &EventPayload::Tree { child });
        Ok(())
    }

    /// Add a body to a composite.
    pub fn add_body(&mut self, composite: CompositeId, id: BodyId) -> Result<(), PhysicsError> {
        self.add(composite, Child::Body(id))
    }

    /// Add a constraint to a composite.
    pub fn add_constraint(
        &mut self,
        composite: CompositeId,
        id: ConstraintId,
    ) -> Result<(), PhysicsError> {
        self.add(composite, Child::Constraint(id))
    }

    /// Attach a composite under another composite.
    pub fn add_composite(
        &mut self,
        composite: CompositeId,
        id: CompositeId,
    ) -> Result<(), PhysicsError> {
        self.add(composite, Child::Composite(id))
    }

    /// Remove a child from a composite (searching descendants when `deep`).
    ///
    /// A body or constraint no longer referenced by any composite is
    /// destroyed; a removed composite is merely detached and survives with
    /// its contents.
    pub fn remove(
        &mut self,
        composite: CompositeId,
        child: Child,
        deep: bool,
    ) -> Result<(), PhysicsError> {
        if !self.composites.contains(composite) {
            return Err(PhysicsError::UnknownComposite { id: composite });
        }

        self.events
            .emit(EventName::BeforeRemove, &EventPayload::Tree { child });
        self.detach(composite, child, deep);
        match child {
            Child::Body(id) => self.destroy_body_if_orphaned(id),
            Child::Constraint(id) => self.destroy_constraint_if_orphaned(id),
            Child::Composite(_) => {}
        }
        self.events
            .emit(EventName::AfterRemove, &EventPayload::Tree { child });
        Ok(())
    }

    /// Remove a body from a composite.
    pub fn remove_body(&mut self, composite: CompositeId, id: BodyId) -> Result<(), PhysicsError> {
        self.remove(composite, Child::Body(id), false)
    }

    /// Remove a constraint from a composite.
    pub fn remove_constraint(
        &mut self,
        composite: CompositeId,
        id: ConstraintId,
    ) -> Result<(), PhysicsError> {
        self.remove(composite, Child::Constraint(id), false)
    }

    /// Detach a composite from another composite.
    pub fn remove_composite(
        &mut self,
        composite: CompositeId,
        id: CompositeId,
    ) -> Result<(), PhysicsError> {
        self.remove(composite, Child::Composite(id), false)
    }

    /// Detach every occurrence of `child` below `composite`. Returns whether
    /// anything was removed.
    fn detach(&mut self, composite: CompositeId, child: Child, deep: bool) -> bool {
        let mut removed = false;
        if let Some(parent) = self.composites.get_mut(composite) {
            let before;
            match child {
                Child::Body(id) => {
                    before = parent.bodies.len();
                    parent.bodies.retain(|&b| b != id);
                    removed = parent.bodies.len() != before;
                }
                Child::Constraint(id) => {
                    before = parent.constraints.len();
                    parent.constraints.retain(|&c| c != id);
                    removed = parent.constraints.len() != before;
                }
                Child::Composite(id) => {
                    before = parent.composites.len();
                    parent.composites.retain(|&c| c != id);
                    removed = parent.composites.len() != before;
                }
            }
        }
        if removed {
            if let Child::Composite(id) = child {
                if let Some(target) = self.composites.get_mut(id) {
                    target.parent = None;
                }
            }
            self.set_modified(composite, true, true, false);
        }
        if deep {
            let children = self
                .composites
                .get(composite)
                .map(|c| c.composites.clone())
                .unwrap_or_default();
            for sub in children {
                removed |= self.detach(sub, child, true);
            }
        }
        removed
    }

    /// Move a child between composites without destroying it.
    pub fn move_child(
        &mut self,
        from: CompositeId,
        child: Child,
        to: CompositeId,
    ) -> Result<(), PhysicsError> {
        if !self.composites.contains(from) {
            return Err(PhysicsError::UnknownComposite { id: from });
        }
        if !self.composites.contains(to) {
            return Err(PhysicsError::UnknownComposite { id: to });
        }
        if !self.detach(from, child, false) {
            return Err(PhysicsError::InvalidComposite {
                reason: "child not found in the source composite",
            });
        }
        self.add(to, child)
    }

    /// Detach a composite from its parent, making it a standalone root.
    pub fn rebase(&mut self, composite: CompositeId) -> Result<(), PhysicsError> {
        let Some(parent) = self.composites.get(composite).map(|c| c.parent) else {
            return Err(PhysicsError::UnknownComposite { id: composite });
        };
        if let Some(parent) = parent {
            self.detach(parent, Child::Composite(composite), false);
        }
        self.set_modified(composite, true, false, false);
        Ok(())
    }

    /// Remove every child of a composite.
    ///
    /// Static bodies survive when `keep_static` is set; with `deep` the
    /// descendants are cleared first. Cleared child composites are detached,
    /// not destroyed.
    pub fn clear_composite(
        &mut self,
        composite: CompositeId,
        keep_static: bool,
        deep: bool,
    ) -> Result<(), PhysicsError> {
        if !self.composites.contains(composite) {
            return Err(PhysicsError::UnknownComposite { id: composite });
        }

        if deep {
            let children = self
                .composites
                .get(composite)
                .map(|c| c.composites.clone())
                .unwrap_or_default();
            for sub in children {
                self.clear_composite(sub, keep_static, true)?;
            }
        }

        let direct: Vec<BodyId> = self
            .composites
            .get(composite)
            .map(|c| c.bodies.clone())
            .unwrap_or_default();
        let (kept, removed_bodies): (Vec<BodyId>, Vec<BodyId>) = if keep_static {
            direct
                .into_iter()
                .partition(|&id| self.bodies.get(id).map_or(false, |body| body.is_static))
        } else {
            (Vec::new(), direct)
        };

        let (removed_constraints, removed_composites) = {
            let Some(target) = self.composites.get_mut(composite) else {
                return Err(PhysicsError::UnknownComposite { id: composite });
            };
            target.bodies = kept;
            (
                core::mem::take(&mut target.constraints),
                core::mem::take(&mut target.composites),
            )
        };

        for id in removed_composites {
            if let Some(target) = self.composites.get_mut(id) {
                target.parent = None;
            }
        }
        for id in removed_bodies {
            self.destroy_body_if_orphaned(id);
        }
        for id in removed_constraints {
            self.destroy_constraint_if_orphaned(id);
        }

        self.set_modified(composite, true, true, false);
        Ok(())
    }

    fn body_referenced(&self, id: BodyId) -> bool {
        self.composites.iter().any(|c| c.bodies.contains(&id))
    }

    fn constraint_referenced(&self, id: ConstraintId) -> bool {
        self.composites.iter().any(|c| c.constraints.contains(&id))
    }

    fn destroy_body_if_orphaned(&mut self, id: BodyId) {
        if self.body_referenced(id) {
            return;
        }
        if let Some(body) = self.bodies.remove(id) {
            for part in body.parts {
                if part != id {
                    self.bodies.remove(part);
                }
            }
        }
    }

    fn destroy_constraint_if_orphaned(&mut self, id: ConstraintId) {
        if self.constraint_referenced(id) {
            return;
        }
        self.constraints.remove(id);
    }

    // ------------------------------------------------------------------
    // Flattened views
    // ------------------------------------------------------------------

    /// Every body below the root composite, depth first.
    pub fn all_bodies(&mut self) -> Vec<BodyId> {
        let root = self.root();
        self.all_bodies_of(root)
    }

    /// Every constraint below the root composite, depth first.
    pub fn all_constraints(&mut self) -> Vec<ConstraintId> {
        let root = self.root();
        self.all_constraints_of(root)
    }

    /// Every body below `composite`, depth first. Cached until a mutation.
    pub fn all_bodies_of(&mut self, composite: CompositeId) -> Vec<BodyId> {
        if let Some(c) = self.composites.get(composite) {
            if let Some(cached) = &c.cache.all_bodies {
                return cached.clone();
            }
        }
        let (own, children) = match self.composites.get(composite) {
            Some(c) => (c.bodies.clone(), c.composites.clone()),
            None => return Vec::new(),
        };
        let mut out = own;
        for child in children {
            out.extend(self.all_bodies_of(child));
        }
        if let Some(c) = self.composites.get_mut(composite) {
            c.cache.all_bodies = Some(out.clone());
        }
        out
    }

    /// Every constraint below `composite`, depth first. Cached until a
    /// mutation.
    pub fn all_constraints_of(&mut self, composite: CompositeId) -> Vec<ConstraintId> {
        if let Some(c) = self.composites.get(composite) {
            if let Some(cached) = &c.cache.all_constraints {
                return cached.clone();
            }
        }
        let (own, children) = match self.composites.get(composite) {
            Some(c) => (c.constraints.clone(), c.composites.clone()),
            None => return Vec::new(),
        };
        let mut out = own;
        for child in children {
            out.extend(self.all_constraints_of(child));
        }
        if let Some(c) = self.composites.get_mut(composite) {
            c.cache.all_constraints = Some(out.clone());
        }
        out
    }

    /// Every composite below `composite` (exclusive), depth first. Cached
    /// until a mutation.
    pub fn all_composites_of(&mut self, composite: CompositeId) -> Vec<CompositeId> {
        if let Some(c) = self.composites.get(composite) {
            if let Some(cached) = &c.cache.all_composites {
                return cached.clone();
            }
        }
        let children = match self.composites.get(composite) {
            Some(c) => c.composites.clone(),
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        for child in children {
            out.push(child);
            out.extend(self.all_composites_of(child));
        }
        if let Some(c) = self.composites.get_mut(composite) {
            c.cache.all_composites = Some(out.clone());
        }
        out
    }

    /// Whether `child` appears anywhere below `composite`.
    pub fn contains_child(&mut self, composite: CompositeId, child: Child) -> bool {
        match child {
            Child::Body(id) => self.all_bodies_of(composite).contains(&id),
            Child::Constraint(id) => self.all_constraints_of(composite).contains(&id),
            Child::Composite(id) => self.all_composites_of(composite).contains(&id),
        }
    }

    // ------------------------------------------------------------------
    // Bulk transforms
    // ------------------------------------------------------------------

    /// Translate every body of a composite.
    pub fn translate_composite(
        &mut self,
        composite: CompositeId,
        translation: Vector,
        recursive: bool,
    ) {
        let ids = if recursive {
            self.all_bodies_of(composite)
        } else {
            self.composites
                .get(composite)
                .map(|c| c.bodies.clone())
                .unwrap_or_default()
        };
        for id in ids {
            self.bodies.translate_body(id, translation, false);
        }
        self.set_modified(composite, true, true, false);
    }

    /// Rotate every body of a composite about `point`.
    pub fn rotate_composite(
        &mut self,
        composite: CompositeId,
        rotation: f64,
        point: Vector,
        recursive: bool,
    ) {
        let ids = if recursive {
            self.all_bodies_of(composite)
        } else {
            self.composites
                .get(composite)
                .map(|c| c.bodies.clone())
                .unwrap_or_default()
        };
        for id in ids {
            let Some(body) = self.bodies.get(id) else {
                continue;
            };
            let position = body.position.rotate_about(rotation, point);
            let angle = body.angle + rotation;
            self.bodies.set_position(id, position, false);
            self.bodies.set_angle(id, angle, false);
        }
        self.set_modified(composite, true, true, false);
    }

    /// Scale every body of a composite about `point`.
    pub fn scale_composite(
        &mut self,
        composite: CompositeId,
        scale_x: f64,
        scale_y: f64,
        point: Vector,
        recursive: bool,
    ) {
        let ids = if recursive {
            self.all_bodies_of(composite)
        } else {
            self.composites
                .get(composite)
                .map(|c| c.bodies.clone())
                .unwrap_or_default()
        };
        for id in ids {
            let Some(body) = self.bodies.get(id) else {
                continue;
            };
            let position = Vector::new(
                point.x + (body.position.x - point.x) * scale_x,
                point.y + (body.position.y - point.y) * scale_y,
            );
            self.bodies.set_position(id, position, false);
            // geometry scales about the body's own (already moved) centre
            self.bodies.scale_body(id, scale_x, scale_y, None);
        }
        self.set_modified(composite, true, true, false);
    }

    /// Union of the bounds of every body below `composite`.
    pub fn bounds_of(&mut self, composite: CompositeId) -> Bounds {
        let ids = self.all_bodies_of(composite);
        let mut bounds = Bounds::new(
            Vector::new(f64::INFINITY, f64::INFINITY),
            Vector::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        );
        for id in ids {
            let Some(body) = self.bodies.get(id) else {
                continue;
            };
            bounds.min.x = bounds.min.x.min(body.bounds.min.x);
            bounds.min.y = bounds.min.y.min(body.bounds.min.y);
            bounds.max.x = bounds.max.x.max(body.bounds.max.x);
            bounds.max.y = bounds.max.y.max(body.bounds.max.y);
        }
        bounds
    }

    // ------------------------------------------------------------------
    // Modification tracking
    // ------------------------------------------------------------------

    /// Set or clear the modified flag, invalidating caches; propagates to
    /// ancestors and/or descendants as requested.
    pub(crate) fn set_modified(
        &mut self,
        composite: CompositeId,
        flag: bool,
        update_parents: bool,
        update_children: bool,
    ) {
        let parent = {
            let Some(c) = self.composites.get_mut(composite) else {
                return;
            };
            c.is_modified = flag;
            if flag {
                c.cache = CompositeCache::default();
            }
            c.parent
        };
        if update_parents {
            if let Some(parent) = parent {
                self.set_modified(parent, flag, true, false);
            }
        }
        if update_children {
            let children = self
                .composites
                .get(composite)
                .map(|c| c.composites.clone())
                .unwrap_or_default();
            for child in children {
                self.set_modified(child, flag, false, true);
            }
        }
    }

    /// Whether the tree below the root has been mutated since the flag was
    /// last cleared.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.composites
            .get(self.root())
            .map_or(false, |c| c.is_modified)
    }

    /// Clear the modified flag across the whole tree and report whether it
    /// was set.
    pub(crate) fn take_modified(&mut self) -> bool {
        let root = self.root();
        let modified = self.is_modified();
        if modified {
            self.set_modified(root, false, false, true);
        }
        modified
    }
}

// ============================================================================
// Tests
// ============================================================================
