//! Spatial Queries
//!
//! Point, region, ray and body-overlap queries for game logic. Everything
//! here is read-only over the body store: bounds act as the cheap gate and
//! the SAT narrow phase (or the polygon containment test) decides.
//!
//! Rays are modelled as a thin rectangle probe between the two endpoints,
//! reusing the polygon pipeline instead of a dedicated segment test.
//!
//! With the `parallel` feature the region and point queries offer Rayon
//! variants. The solver itself is never parallelised.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::body::{Body, BodyOptions, BodyStore};
use crate::collision::{self, Collision};
use crate::common::BodyId;
use crate::math::{Bounds, Vector};
use crate::vertices;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Sentinel handle for query probe bodies; never stored in a world.
const PROBE_ID: BodyId = BodyId(u32::MAX);

/// One ray intersection.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// The body the ray passed through
    pub body: BodyId,
    /// The underlying overlap record between the ray probe and the body
    pub collision: Collision,
}

/// Find every target body overlapping `body`, testing compound parts
/// individually behind a bounds gate.
#[must_use]
pub fn collides(body: &Body, bodies: &BodyStore, targets: &[BodyId]) -> Vec<Collision> {
    let mut collisions = Vec::new();
    for &id in targets {
        let Some(target) = bodies.get(id) else {
            continue;
        };
        if !target.bounds.overlaps(&body.bounds) {
            continue;
        }
        let start = if target.parts.len() > 1 { 1 } else { 0 };
        for &part_id in &target.parts[start..] {
            let Some(part) = bodies.get(part_id) else {
                continue;
            };
            if !part.bounds.overlaps(&body.bounds) {
                continue;
            }
            if let Some(collision) = collision::collides(part, body) {
                collisions.push(collision);
                break;
            }
        }
    }
    collisions
}

/// Cast a ray from `start` to `end` and return every body it crosses.
///
/// `width` fattens the ray; the default is effectively zero.
#[must_use]
pub fn ray(
    bodies: &BodyStore,
    targets: &[BodyId],
    start: Vector,
    end: Vector,
    width: Option<f64>,
) -> Vec<RayHit> {
    let width = width.unwrap_or(1e-100);
    let length = (end - start).magnitude();
    if length == 0.0 {
        return Vec::new();
    }
    let angle = start.angle_to(end);
    let centre = (start + end) * 0.5;

    let Ok(probe) = Body::standalone(
        PROBE_ID,
        BodyOptions {
            vertices: vec![
                Vector::new(0.0, 0.0),
                Vector::new(length, 0.0),
                Vector::new(length, width),
                Vector::new(0.0, width),
            ],
            position: centre,
            angle,
            ..BodyOptions::default()
        },
    ) else {
        return Vec::new();
    };

    collides(&probe, bodies, targets)
        .into_iter()
        .map(|collision| RayHit {
            // the probe's sentinel id sorts last, so the hit is always side a
            body: collision.parent_a,
            collision,
        })
        .collect()
}

/// All bodies whose bounds overlap `bounds` (or, with `outside`, those whose
/// bounds do not).
#[must_use]
pub fn region(bodies: &BodyStore, targets: &[BodyId], bounds: &Bounds, outside: bool) -> Vec<BodyId> {
    let mut result = Vec::new();
    for &id in targets {
        let Some(body) = bodies.get(id) else {
            continue;
        };
        let overlaps = body.bounds.overlaps(bounds);
        if overlaps != outside {
            result.push(id);
        }
    }
    result
}

/// All bodies containing `point`, testing each compound part's ring.
#[must_use]
pub fn point(bodies: &BodyStore, targets: &[BodyId], point: Vector) -> Vec<BodyId> {
    let mut result = Vec::new();
    for &id in targets {
        if body_contains_point(bodies, id, point) {
            result.push(id);
        }
    }
    result
}

fn body_contains_point(bodies: &BodyStore, id: BodyId, point: Vector) -> bool {
    let Some(body) = bodies.get(id) else {
        return false;
    };
    if !body.bounds.contains(point) {
        return false;
    }
    let start = if body.parts.len() > 1 { 1 } else { 0 };
    for &part_id in &body.parts[start..] {
        let Some(part) = bodies.get(part_id) else {
            continue;
        };
        if part.bounds.contains(point) && vertices::contains(&part.vertices, point) {
            return true;
        }
    }
    false
}

/// Rayon variant of [`region`]. Result order matches the target order.
#[cfg(feature = "parallel")]
#[must_use]
pub fn region_parallel(
    bodies: &BodyStore,
    targets: &[BodyId],
    bounds: &Bounds,
    outside: bool,
) -> Vec<BodyId> {
    targets
        .par_iter()
        .filter(|&&id| {
            bodies
                .get(id)
                .map_or(false, |body| body.bounds.overlaps(bounds) != outside)
        })
        .copied()
        .collect()
}

/// Rayon variant of [`point`]. Result order matches the target order.
#[cfg(feature = "parallel")]
#[must_use]
pub fn point_parallel(bodies: &BodyStore, targets: &[BodyId], point: Vector) -> Vec<BodyId> {
    targets
        .par_iter()
        .filter(|&&id| body_contains_point(bodies, id, point))
        .copied()
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
