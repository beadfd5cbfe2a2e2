//! Polygon Vertex Rings
//!
//! A body's geometry is a ring of [`Vertex`] values, convex and wound
//! clockwise (screen coordinates, y down) around its centre of mass. This
//! module holds every operation performed on rings: area, centroid, second
//! moment of area, containment, convex hull, corner chamfering and the
//! in-place transforms used by integration.
//!
//! Rings are world-space and mutated in place by the pipeline; every function
//! here either reads a `&[Vertex]` or transforms a `&mut [Vertex]`.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::math::Vector;

// ============================================================================
// Vertex
// ============================================================================

/// One point of a body's vertex ring.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    /// World-space x coordinate
    pub x: f64,
    /// World-space y coordinate
    pub y: f64,
    /// Position of this vertex within its ring
    pub index: usize,
    /// Marks an edge coincident with a neighbouring part of a compound body
    pub is_internal: bool,
}

impl Vertex {
    /// The vertex position as a [`Vector`].
    #[inline]
    #[must_use]
    pub fn point(&self) -> Vector {
        Vector::new(self.x, self.y)
    }
}

/// Build an indexed ring from raw points.
#[must_use]
pub fn create(points: &[Vector]) -> Vec<Vertex> {
    points
        .iter()
        .enumerate()
        .map(|(index, point)| Vertex {
            x: point.x,
            y: point.y,
            index,
            is_internal: false,
        })
        .collect()
}

/// Rewrite ring indices to match the current order.
fn reindex(vertices: &mut [Vertex]) {
    for (index, vertex) in vertices.iter_mut().enumerate() {
        vertex.index = index;
    }
}

// ============================================================================
// Measures
// ============================================================================

/// Polygon area via the trapezoid formula.
///
/// Unsigned unless `signed` is set; the signed value is positive for a
/// clockwise ring in screen coordinates.
#[must_use]
pub fn area(vertices: &[Vertex], signed: bool) -> f64 {
    let mut area = 0.0;
    let mut j = vertices.len() - 1;
    for (i, vertex) in vertices.iter().enumerate() {
        area += (vertices[j].x - vertex.x) * (vertices[j].y + vertex.y);
        j = i;
    }
    if signed {
        area / 2.0
    } else {
        (area / 2.0).abs()
    }
}

/// Polygon centroid (signed-area weighted).
#[must_use]
pub fn centre(vertices: &[Vertex]) -> Vector {
    let signed_area = area(vertices, true);
    let mut centre = Vector::ZERO;
    for (i, vertex) in vertices.iter().enumerate() {
        let j = (i + 1) % vertices.len();
        let cross = vertex.point().cross(vertices[j].point());
        centre += (vertex.point() + vertices[j].point()) * cross;
    }
    centre / (6.0 * signed_area)
}

/// Arithmetic mean of the ring points.
#[must_use]
pub fn mean(vertices: &[Vertex]) -> Vector {
    let mut sum = Vector::ZERO;
    for vertex in vertices {
        sum += vertex.point();
    }
    sum / vertices.len() as f64
}

/// Second moment of area about the centroid, scaled by `mass / 6` using the
/// triangle-fan formula with cross magnitudes as weights.
///
/// The ring is expected to be centred on the origin when this is called.
#[must_use]
pub fn inertia(vertices: &[Vertex], mass: f64) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for n in 0..vertices.len() {
        let j = (n + 1) % vertices.len();
        let a = vertices[j].point();
        let b = vertices[n].point();
        let cross = a.cross(b).abs();
        numerator += cross * (a.dot(a) + a.dot(b) + b.dot(b));
        denominator += cross;
    }
    (mass / 6.0) * (numerator / denominator)
}

/// Half-plane containment test for a clockwise ring.
///
/// Returns `false` as soon as any directed edge places the point on its
/// right-hand side.
#[must_use]
pub fn contains(vertices: &[Vertex], point: Vector) -> bool {
    let mut vertex = &vertices[vertices.len() - 1];
    for next_vertex in vertices {
        if (point.x - vertex.x) * (next_vertex.y - vertex.y)
            + (point.y - vertex.y) * (vertex.x - next_vertex.x)
            > 0.0
        {
            return false;
        }
        vertex = next_vertex;
    }
    true
}

/// Convexity check (flag-based sign test over consecutive edge turns).
///
/// Degenerate rings (fewer than three points, or zero area) report `false`.
#[must_use]
pub fn is_convex(vertices: &[Vertex]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut flag = 0;
    for i in 0..n {
        let j = (i + 1) % n;
        let k = (i + 2) % n;
        let mut z = (vertices[j].x - vertices[i].x) * (vertices[k].y - vertices[j].y);
        z -= (vertices[j].y - vertices[i].y) * (vertices[k].x - vertices[j].x);
        if z < 0.0 {
            flag |= 1;
        } else if z > 0.0 {
            flag |= 2;
        }
        if flag == 3 {
            return false;
        }
    }
    flag != 0
}

// ============================================================================
// Transforms
// ============================================================================

/// Translate a ring in place.
#[inline]
pub fn translate(vertices: &mut [Vertex], vector: Vector) {
    for vertex in vertices {
        vertex.x += vector.x;
        vertex.y += vector.y;
    }
}

/// Rotate a ring in place about `point`.
pub fn rotate(vertices: &mut [Vertex], angle: f64, point: Vector) {
    if angle == 0.0 {
        return;
    }
    let (sin, cos) = angle.sin_cos();
    for vertex in vertices {
        let dx = vertex.x - point.x;
        let dy = vertex.y - point.y;
        vertex.x = point.x + (dx * cos - dy * sin);
        vertex.y = point.y + (dx * sin + dy * cos);
    }
}

/// Scale a ring in place about `point` (defaults to the ring centroid).
pub fn scale(vertices: &mut [Vertex], scale_x: f64, scale_y: f64, point: Option<Vector>) {
    if scale_x == 1.0 && scale_y == 1.0 {
        return;
    }
    let point = point.unwrap_or_else(|| centre(vertices));
    for vertex in vertices {
        let delta = vertex.point() - point;
        vertex.x = point.x + delta.x * scale_x;
        vertex.y = point.y + delta.y * scale_y;
    }
}

// ============================================================================
// Construction Helpers
// ============================================================================

/// Replace each corner with a circular arc of the given `radius`.
///
/// `quality` picks the number of arc points; `-1.0` derives it from the
/// radius as `radius^0.32 * 1.75`. The chosen value is clamped to
/// `[quality_min, quality_max]` and rounded up to an even count. A zero
/// radius passes the corner through untouched.
#[must_use]
pub fn chamfer(
    vertices: &[Vertex],
    radius: f64,
    quality: f64,
    quality_min: f64,
    quality_max: f64,
) -> Vec<Vertex> {
    let mut new_points: Vec<Vector> = Vec::new();

    for i in 0..vertices.len() {
        let prev_vertex = &vertices[if i > 0 { i - 1 } else { vertices.len() - 1 }];
        let vertex = &vertices[i];
        let next_vertex = &vertices[(i + 1) % vertices.len()];

        if radius == 0.0 {
            new_points.push(vertex.point());
            continue;
        }

        let prev_normal = Vector::new(vertex.y - prev_vertex.y, prev_vertex.x - vertex.x).normalise();
        let next_normal = Vector::new(next_vertex.y - vertex.y, vertex.x - next_vertex.x).normalise();

        let diagonal_radius = (2.0 * radius * radius).sqrt();
        let radius_vector = prev_normal * radius;
        let mid_normal = ((prev_normal + next_normal) * 0.5).normalise();
        let scaled_vertex = vertex.point() - mid_normal * diagonal_radius;

        let mut precision = if quality == -1.0 {
            radius.powf(0.32) * 1.75
        } else {
            quality
        };
        precision = precision.clamp(quality_min, quality_max);

        // use an even number of arc points
        let mut steps = precision.ceil() as usize;
        if steps % 2 == 1 {
            steps += 1;
        }

        let alpha = prev_normal.dot(next_normal).clamp(-1.0, 1.0).acos();
        let theta = alpha / steps as f64;

        for j in 0..steps {
            new_points.push(radius_vector.rotate(theta * j as f64) + scaled_vertex);
        }
    }

    create(&new_points)
}

/// Convex hull by the monotone chain method.
///
/// Input order does not matter; the result is wound to match the engine's
/// clockwise convention and re-indexed.
#[must_use]
pub fn hull(vertices: &[Vertex]) -> Vec<Vertex> {
    let mut sorted: Vec<Vertex> = vertices.to_vec();
    sorted.sort_by(|a, b| {
        let dx = a.x - b.x;
        let key = if dx != 0.0 { dx } else { a.y - b.y };
        key.partial_cmp(&0.0).unwrap_or(core::cmp::Ordering::Equal)
    });

    let mut lower: Vec<Vertex> = Vec::new();
    for vertex in &sorted {
        while lower.len() >= 2
            && Vector::cross3(
                lower[lower.len() - 2].point(),
                lower[lower.len() - 1].point(),
                vertex.point(),
            ) <= 0.0
        {
            lower.pop();
        }
        lower.push(*vertex);
    }

    let mut upper: Vec<Vertex> = Vec::new();
    for vertex in sorted.iter().rev() {
        while upper.len() >= 2
            && Vector::cross3(
                upper[upper.len() - 2].point(),
                upper[upper.len() - 1].point(),
                vertex.point(),
            ) <= 0.0
        {
            upper.pop();
        }
        upper.push(*vertex);
    }

    upper.pop();
    lower.pop();

    let mut result = upper;
    result.extend(lower);
    reindex(&mut result);
    result
}

/// Sort a ring clockwise by angle about its arithmetic mean, re-indexing.
pub fn clockwise_sort(vertices: &mut Vec<Vertex>) {
    let centre = mean(vertices);
    vertices.sort_by(|a, b| {
        let angle_a = centre.angle_to(a.point());
        let angle_b = centre.angle_to(b.point());
        angle_a
            .partial_cmp(&angle_b)
            .unwrap_or(core::cmp::Ordering::Equal)
    });
    reindex(vertices);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    /// Clockwise unit-ish square centred on the origin.
    fn square(half: f64) -> Vec<Vertex> {
        create(&[
            Vector::new(-half, -half),
            Vector::new(half, -half),
            Vector::new(half, half),
            Vector::new(-half, half),
        ])
    }

    #[test]
    fn test_area_square() {
        let verts = square(20.0);
        assert!((area(&verts, false) - 1600.0).abs() < EPSILON);
        // clockwise winding in screen coordinates gives positive signed area
        assert!(area(&verts, true) > 0.0);
    }

    #[test]
    fn test_centre_square() {
        let mut verts = square(10.0);
        translate(&mut verts, Vector::new(5.0, 7.0));
        let c = centre(&verts);
        assert!((c.x - 5.0).abs() < EPSILON, "got {c:?}");
        assert!((c.y - 7.0).abs() < EPSILON, "got {c:?}");
    }

    #[test]
    fn test_mean_vs_centre() {
        let verts = square(10.0);
        let m = mean(&verts);
        let c = centre(&verts);
        assert!((m.x - c.x).abs() < EPSILON && (m.y - c.y).abs() < EPSILON);
    }

    #[test]
    fn test_inertia_square() {
        // For a solid square of side a and mass m: I = m * a^2 / 6
        let verts = square(20.0);
        let mass = 12.0;
        let expected = mass * 40.0 * 40.0 / 6.0;
        assert!(
            (inertia(&verts, mass) - expected).abs() / expected < 1e-9,
            "got {}",
            inertia(&verts, mass)
        );
    }

    #[test]
    fn test_contains() {
        let verts = square(10.0);
        assert!(contains(&verts, Vector::ZERO));
        assert!(contains(&verts, Vector::new(9.9, 9.9)));
        assert!(!contains(&verts, Vector::new(10.1, 0.0)));
        assert!(!contains(&verts, Vector::new(0.0, -11.0)));
    }

    #[test]
    fn test_is_convex() {
        assert!(is_convex(&square(5.0)));
        let concave = create(&[
            Vector::new(0.0, 0.0),
            Vector::new(10.0, 0.0),
            Vector::new(10.0, 10.0),
            Vector::new(5.0, 2.0),
            Vector::new(0.0, 10.0),
        ]);
        assert!(!is_convex(&concave));
        assert!(!is_convex(&create(&[Vector::ZERO, Vector::new(1.0, 1.0)])));
    }

    #[test]
    fn test_chamfer_zero_radius_is_identity() {
        let verts = square(10.0);
        let chamfered = chamfer(&verts, 0.0, -1.0, 2.0, 14.0);
        assert_eq!(chamfered.len(), verts.len());
        for (a, b) in verts.iter().zip(chamfered.iter()) {
            assert!((a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON);
        }
    }

    #[test]
    fn test_chamfer_rounds_corners() {
        let verts = square(10.0);
        let chamfered = chamfer(&verts, 2.0, -1.0, 2.0, 14.0);
        assert!(
            chamfered.len() > verts.len(),
            "chamfer should add arc points, got {}",
            chamfered.len()
        );
        // all chamfered points stay inside the original square
        for v in &chamfered {
            assert!(v.x.abs() <= 10.0 + EPSILON && v.y.abs() <= 10.0 + EPSILON);
        }
    }

    #[test]
    fn test_hull_drops_interior_points() {
        let points = create(&[
            Vector::new(0.0, 0.0),
            Vector::new(10.0, 0.0),
            Vector::new(5.0, 5.0), // interior
            Vector::new(10.0, 10.0),
            Vector::new(0.0, 10.0),
        ]);
        let h = hull(&points);
        assert_eq!(h.len(), 4, "square hull should have 4 vertices");
        assert!(is_convex(&h), "hull must be convex");
        for (i, v) in h.iter().enumerate() {
            assert_eq!(v.index, i, "hull output must be re-indexed");
        }
    }

    #[test]
    fn test_clockwise_sort() {
        let mut shuffled = create(&[
            Vector::new(10.0, 10.0),
            Vector::new(-10.0, -10.0),
            Vector::new(-10.0, 10.0),
            Vector::new(10.0, -10.0),
        ]);
        clockwise_sort(&mut shuffled);
        assert!(is_convex(&shuffled), "sorted square should be convex");
        assert!(area(&shuffled, true) > 0.0, "winding should be clockwise");
    }
}
