//! SAT Narrow Phase
//!
//! Polygon-polygon overlap testing by the separating axis theorem. Both
//! bodies project onto each other's unique edge normals; the axis with the
//! smallest overlap gives the collision normal and depth, and support points
//! are found by scanning the incident ring for its deepest vertices.
//!
//! A collision record carries the part bodies it was measured between and
//! their compound roots, which is what the resolver actually moves.

use crate::body::Body;
use crate::common::BodyId;
use crate::math::Vector;
use crate::vertices::{self, Vertex};

// ============================================================================
// Records
// ============================================================================

/// One support point: a vertex of the incident body identified by ring
/// index, so contacts can be matched across steps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Support {
    /// Body the vertex belongs to
    pub body: BodyId,
    /// Ring index of the vertex
    pub index: usize,
    /// World position of the vertex at detection time
    pub point: Vector,
}

/// Result of a narrow-phase test between two convex parts.
#[derive(Clone, Copy, Debug)]
pub struct Collision {
    /// First part, always the lower body id
    pub body_a: BodyId,
    /// Second part, always the higher body id
    pub body_b: BodyId,
    /// Compound root of `body_a` (itself when not compound)
    pub parent_a: BodyId,
    /// Compound root of `body_b` (itself when not compound)
    pub parent_b: BodyId,
    /// Whether the parts currently overlap
    pub collided: bool,
    /// Overlap depth along the minimum axis
    pub depth: f64,
    /// Unit collision normal, oriented away from `body_a`
    pub normal: Vector,
    /// Unit tangent, perpendicular to the normal
    pub tangent: Vector,
    /// `normal * depth`
    pub penetration: Vector,
    /// Up to two support points
    pub supports: [Support; 2],
    /// Number of valid entries in `supports` (1 or 2)
    pub support_count: usize,
}

/// Projection overlap along a set of axes.
#[derive(Clone, Copy, Debug)]
struct Overlap {
    overlap: f64,
    axis: Vector,
}

// ============================================================================
// SAT
// ============================================================================

/// Project both rings onto each axis and keep the axis of minimum overlap,
/// short-circuiting as soon as a separating axis is found.
fn overlap_axes(vertices_a: &[Vertex], vertices_b: &[Vertex], axes: &[Vector]) -> Overlap {
    let mut overlap_min = f64::MAX;
    let mut axis_number = 0;

    for (i, axis) in axes.iter().enumerate() {
        let mut min_a = axis.x * vertices_a[0].x + axis.y * vertices_a[0].y;
        let mut max_a = min_a;
        for vertex in &vertices_a[1..] {
            let dot = axis.x * vertex.x + axis.y * vertex.y;
            if dot > max_a {
                max_a = dot;
            } else if dot < min_a {
                min_a = dot;
            }
        }

        let mut min_b = axis.x * vertices_b[0].x + axis.y * vertices_b[0].y;
        let mut max_b = min_b;
        for vertex in &vertices_b[1..] {
            let dot = axis.x * vertex.x + axis.y * vertex.y;
            if dot > max_b {
                max_b = dot;
            } else if dot < min_b {
                min_b = dot;
            }
        }

        let overlap_ab = max_a - min_b;
        let overlap_ba = max_b - min_a;
        let overlap = if overlap_ab < overlap_ba {
            overlap_ab
        } else {
            overlap_ba
        };

        if overlap < overlap_min {
            overlap_min = overlap;
            axis_number = i;
            if overlap <= 0.0 {
                // can not be intersecting
                break;
            }
        }
    }

    Overlap {
        overlap: overlap_min,
        axis: axes[axis_number],
    }
}

/// The two deepest vertices of `body_b` along the collision normal, measured
/// from `body_a`'s position. `direction` flips the normal for the symmetric
/// search.
fn find_supports(body_a: &Body, body_b: &Body, normal: Vector, direction: f64) -> [Support; 2] {
    let vertices = &body_b.vertices;
    let count = vertices.len();
    let position = body_a.position;
    let normal = normal * direction;

    let mut nearest_index = 0;
    let mut nearest_distance =
        normal.x * (position.x - vertices[0].x) + normal.y * (position.y - vertices[0].y);
    for (index, vertex) in vertices.iter().enumerate().skip(1) {
        let distance =
            normal.x * (position.x - vertex.x) + normal.y * (position.y - vertex.y);
        if distance < nearest_distance {
            nearest_distance = distance;
            nearest_index = index;
        }
    }

    // pick the deeper of the two ring neighbours as the second support
    let prev_index = (nearest_index + count - 1) % count;
    let next_index = (nearest_index + 1) % count;
    let prev = &vertices[prev_index];
    let next = &vertices[next_index];
    let prev_distance = normal.x * (position.x - prev.x) + normal.y * (position.y - prev.y);
    let next_distance = normal.x * (position.x - next.x) + normal.y * (position.y - next.y);
    let second_index = if next_distance < prev_distance {
        next_index
    } else {
        prev_index
    };

    let support = |index: usize| Support {
        body: body_b.id,
        index,
        point: vertices[index].point(),
    };
    [support(nearest_index), support(second_index)]
}

/// Full SAT test between two convex parts.
///
/// Returns `None` when a separating axis exists. The record's `body_a` is
/// always the part with the lower id regardless of argument order, so pair
/// identity is stable.
#[must_use]
pub fn collides(body_a: &Body, body_b: &Body) -> Option<Collision> {
    let overlap_ab = overlap_axes(&body_a.vertices, &body_b.vertices, &body_a.axes);
    if overlap_ab.overlap <= 0.0 {
        return None;
    }
    let overlap_ba = overlap_axes(&body_b.vertices, &body_a.vertices, &body_b.axes);
    if overlap_ba.overlap <= 0.0 {
        return None;
    }

    let min_overlap = if overlap_ab.overlap < overlap_ba.overlap {
        overlap_ab
    } else {
        overlap_ba
    };

    let (body_a, body_b) = if body_a.id <= body_b.id {
        (body_a, body_b)
    } else {
        (body_b, body_a)
    };

    let min_axis = min_overlap.axis;
    let towards_b = body_b.position - body_a.position;
    let normal = if min_axis.dot(towards_b) < 0.0 {
        min_axis
    } else {
        -min_axis
    };
    let tangent = normal.perp();
    let depth = min_overlap.overlap;

    let mut supports = [Support::default(); 2];
    let mut support_count = 0;

    // deepest vertices of B contained in A
    let supports_b = find_supports(body_a, body_b, normal, 1.0);
    if vertices::contains(&body_a.vertices, supports_b[0].point) {
        supports[support_count] = supports_b[0];
        support_count += 1;
    }
    if vertices::contains(&body_a.vertices, supports_b[1].point) {
        supports[support_count] = supports_b[1];
        support_count += 1;
    }

    // too few: search the other way around
    if support_count < 2 {
        let supports_a = find_supports(body_b, body_a, normal, -1.0);
        if vertices::contains(&body_b.vertices, supports_a[0].point) {
            supports[support_count] = supports_a[0];
            support_count += 1;
        }
        if support_count < 2 && vertices::contains(&body_b.vertices, supports_a[1].point) {
            supports[support_count] = supports_a[1];
            support_count += 1;
        }
    }

    // overlapping but no contained vertex: fall back to the deepest B vertex
    if support_count == 0 {
        supports[0] = supports_b[0];
        support_count = 1;
    }

    Some(Collision {
        body_a: body_a.id,
        body_b: body_b.id,
        parent_a: body_a.parent.unwrap_or(body_a.id),
        parent_b: body_b.parent.unwrap_or(body_b.id),
        collided: true,
        depth,
        normal,
        tangent,
        penetration: normal * depth,
        supports,
        support_count,
    })
}

// ============================================================================
// Tests
// ============================================================================
