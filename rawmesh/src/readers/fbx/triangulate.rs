//! Polygon triangulation
//!
//! Convex faces are fanned from corner 0. Concave faces are ear clipped in
//! the plane of their Newell normal. Output triangles keep the winding of
//! the input polygon.

use glam::{Vec2, Vec3};

/// Largest triangle count a face with `corners` corners can produce
pub(super) fn max_face_triangles(corners: usize) -> usize {
    corners.saturating_sub(2)
}

fn newell_normal(points: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Drop the dominant normal axis, keeping the projected polygon's winding
/// counter-clockwise when the normal points at the viewer
fn project(points: &[Vec3], normal: Vec3) -> Vec<Vec2> {
    let n = normal.abs();
    points
        .iter()
        .map(|p| {
            if n.z >= n.x && n.z >= n.y {
                if normal.z >= 0.0 { Vec2::new(p.x, p.y) } else { Vec2::new(p.y, p.x) }
            } else if n.x >= n.y {
                if normal.x >= 0.0 { Vec2::new(p.y, p.z) } else { Vec2::new(p.z, p.y) }
            } else if normal.y >= 0.0 {
                Vec2::new(p.z, p.x)
            } else {
                Vec2::new(p.x, p.z)
            }
        })
        .collect()
}

fn cross(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a - o).perp_dot(b - o)
}

fn inside_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

fn fan(corners: impl Iterator<Item = u32>, out: &mut Vec<u32>) {
    let corners: Vec<u32> = corners.collect();
    for pair in corners.windows(2).skip(1) {
        out.extend_from_slice(&[corners[0], pair[0], pair[1]]);
    }
}

/// Triangulate one face, appending corner indices (0-based within the face)
/// to `out`; returns the number of triangles written
pub(super) fn triangulate(points: &[Vec3], out: &mut Vec<u32>) -> usize {
    let count = points.len();
    let before = out.len();
    if count < 3 {
        return 0;
    }
    if count == 3 {
        out.extend_from_slice(&[0, 1, 2]);
        return 1;
    }

    let normal = newell_normal(points);
    if normal.length_squared() <= f32::EPSILON * f32::EPSILON {
        fan(0..count as u32, out);
        return (out.len() - before) / 3;
    }
    let flat = project(points, normal);

    let convex = (0..count).all(|i| {
        cross(flat[i], flat[(i + 1) % count], flat[(i + 2) % count]) >= 0.0
    });
    if convex {
        fan(0..count as u32, out);
        return (out.len() - before) / 3;
    }

    let mut remaining: Vec<usize> = (0..count).collect();
    while remaining.len() > 3 {
        let m = remaining.len();
        let ear = (0..m).find(|&i| {
            let a = remaining[(i + m - 1) % m];
            let b = remaining[i];
            let c = remaining[(i + 1) % m];
            if cross(flat[a], flat[b], flat[c]) <= 0.0 {
                return false;
            }
            !remaining.iter().any(|&other| {
                other != a
                    && other != b
                    && other != c
                    && flat[other] != flat[a]
                    && flat[other] != flat[b]
                    && flat[other] != flat[c]
                    && inside_triangle(flat[other], flat[a], flat[b], flat[c])
            })
        });
        let Some(i) = ear else {
            // self-intersecting or degenerate outline
            fan(remaining.iter().map(|&r| r as u32), out);
            return (out.len() - before) / 3;
        };
        let a = remaining[(i + m - 1) % m] as u32;
        let c = remaining[(i + 1) % m] as u32;
        out.extend_from_slice(&[a, remaining[i] as u32, c]);
        remaining.remove(i);
    }
    out.extend(remaining.iter().map(|&r| r as u32));
    (out.len() - before) / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(points: &[Vec3], triangles: &[u32]) -> f32 {
        triangles
            .chunks_exact(3)
            .map(|t| {
                let (a, b, c) = (points[t[0] as usize], points[t[1] as usize], points[t[2] as usize]);
                (b - a).cross(c - a).z * 0.5
            })
            .sum()
    }

    #[test]
    fn quad_is_fanned() {
        let quad = [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y];
        let mut out = Vec::new();
        assert_eq!(triangulate(&quad, &mut out), 2);
        assert_eq!(out, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn concave_face_is_ear_clipped() {
        // L shape, counter-clockwise, reflex corner at (1, 1)
        let shape = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        let mut out = Vec::new();
        assert_eq!(triangulate(&shape, &mut out), max_face_triangles(shape.len()));
        assert!((area(&shape, &out) - 3.0).abs() < 1e-5);
        // every triangle keeps the face winding
        for t in out.chunks_exact(3) {
            let (a, b, c) = (shape[t[0] as usize], shape[t[1] as usize], shape[t[2] as usize]);
            assert!((b - a).cross(c - a).z > 0.0);
        }
    }

    #[test]
    fn downward_facing_face_keeps_winding() {
        let quad = [Vec3::ZERO, Vec3::Y, Vec3::new(1.0, 1.0, 0.0), Vec3::X];
        let mut out = Vec::new();
        assert_eq!(triangulate(&quad, &mut out), 2);
        assert!((area(&quad, &out) + 1.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_faces() {
        let mut out = Vec::new();
        assert_eq!(triangulate(&[Vec3::ZERO, Vec3::X], &mut out), 0);
        let line = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0];
        assert_eq!(triangulate(&line, &mut out), 2);
    }
}
