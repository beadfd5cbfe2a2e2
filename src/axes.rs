//! SAT Projection Axes
//!
//! The unique outward edge normals of a vertex ring. Parallel edges would
//! contribute identical projection axes, so normals are deduplicated by their
//! gradient rounded to three decimals. The limited precision is a deliberate
//! tuning knob: it trades axis count (SAT cost) against rare false merges of
//! nearly-parallel edges.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::math::Vector;
use crate::vertices::Vertex;

/// Dedupe key for an axis: its gradient `x / y` rounded to three decimals,
/// with vertical gradients collapsed onto a single sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gradient {
    Vertical,
    Slope(i64),
}

fn gradient(normal: Vector) -> Gradient {
    if normal.y == 0.0 {
        Gradient::Vertical
    } else {
        Gradient::Slope(((normal.x / normal.y) * 1000.0).round() as i64)
    }
}

/// Outward normal of each directed edge, deduplicated by rounded gradient.
///
/// Insertion order follows the edge order of the ring, which keeps SAT
/// tie-breaking deterministic.
#[must_use]
pub fn from_vertices(vertices: &[Vertex]) -> Vec<Vector> {
    let mut axes: Vec<(Gradient, Vector)> = Vec::new();

    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        let normal = Vector::new(
            vertices[j].y - vertices[i].y,
            vertices[i].x - vertices[j].x,
        )
        .normalise();
        let key = gradient(normal);

        if !axes.iter().any(|(existing, _)| *existing == key) {
            axes.push((key, normal));
        }
    }

    axes.into_iter().map(|(_, normal)| normal).collect()
}

/// Rotate every axis in place by `angle` radians.
pub fn rotate(axes: &mut [Vector], angle: f64) {
    if angle == 0.0 {
        return;
    }
    let (sin, cos) = angle.sin_cos();
    for axis in axes {
        let x = axis.x * cos - axis.y * sin;
        axis.y = axis.x * sin + axis.y * cos;
        axis.x = x;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertices;

    #[test]
    fn test_rectangle_has_two_axes() {
        let verts = vertices::create(&[
            Vector::new(0.0, 0.0),
            Vector::new(40.0, 0.0),
            Vector::new(40.0, 40.0),
            Vector::new(0.0, 40.0),
        ]);
        let axes = from_vertices(&verts);
        assert_eq!(axes.len(), 2, "parallel edges must merge");
    }

    #[test]
    fn test_triangle_has_three_axes() {
        let verts = vertices::create(&[
            Vector::new(0.0, 0.0),
            Vector::new(30.0, 0.0),
            Vector::new(15.0, 20.0),
        ]);
        assert_eq!(from_vertices(&verts).len(), 3);
    }

    #[test]
    fn test_axes_are_unit_length() {
        let verts = vertices::create(&[
            Vector::new(0.0, 0.0),
            Vector::new(35.0, 5.0),
            Vector::new(20.0, 30.0),
            Vector::new(-5.0, 20.0),
        ]);
        for axis in from_vertices(&verts) {
            assert!((axis.magnitude() - 1.0).abs() < 1e-12, "got {axis:?}");
        }
    }

    #[test]
    fn test_rotate_preserves_count_and_length() {
        let verts = vertices::create(&[
            Vector::new(0.0, 0.0),
            Vector::new(40.0, 0.0),
            Vector::new(40.0, 40.0),
            Vector::new(0.0, 40.0),
        ]);
        let mut axes = from_vertices(&verts);
        rotate(&mut axes, 0.7);
        assert_eq!(axes.len(), 2);
        for axis in &axes {
            assert!((axis.magnitude() - 1.0).abs() < 1e-12);
        }
    }
}
