//! Tangent space and normal generation
//!
//! MikkTSpace tangents go through the `mikktspace` crate's per-face callback
//! protocol: faces are the index triples, corners are looked up by
//! `(face, vert)`, and the computed tangent + sign is written back to the
//! vertex the corner refers to.
//!
//! Handedness convention: `w = dot(cross(n, t), b) < 0 ? -1 : 1`, so the
//! bitangent is reconstructed as `cross(n, t) * w`.

use glam::{Vec2, Vec3, Vec4};

use crate::model::MeshVertex;

/// Separate-stream view handed to MikkTSpace
struct IndexedGeometry<'a> {
    positions: &'a [Vec3],
    tex_coords: &'a [Vec2],
    normals: &'a [Vec3],
    indices: &'a [u32],
    tangents: &'a mut [Vec4],
}

impl IndexedGeometry<'_> {
    fn vertex(&self, face: usize, vert: usize) -> usize {
        self.indices[face * 3 + vert] as usize
    }
}

impl mikktspace::Geometry for IndexedGeometry<'_> {
    fn num_faces(&self) -> usize {
        self.indices.len() / 3
    }

    fn num_vertices_of_face(&self, _face: usize) -> usize {
        3
    }

    fn position(&self, face: usize, vert: usize) -> [f32; 3] {
        self.positions[self.vertex(face, vert)].to_array()
    }

    fn normal(&self, face: usize, vert: usize) -> [f32; 3] {
        self.normals[self.vertex(face, vert)].to_array()
    }

    fn tex_coord(&self, face: usize, vert: usize) -> [f32; 2] {
        self.tex_coords[self.vertex(face, vert)].to_array()
    }

    fn set_tangent_encoded(&mut self, tangent: [f32; 4], face: usize, vert: usize) {
        let index = self.vertex(face, vert);
        self.tangents[index] = encode_tangent(tangent);
    }
}

/// Interleaved view handed to MikkTSpace
struct InterleavedGeometry<'a> {
    vertices: &'a mut [MeshVertex],
    indices: &'a [u32],
}

impl InterleavedGeometry<'_> {
    fn vertex(&self, face: usize, vert: usize) -> &MeshVertex {
        &self.vertices[self.indices[face * 3 + vert] as usize]
    }
}

impl mikktspace::Geometry for InterleavedGeometry<'_> {
    fn num_faces(&self) -> usize {
        self.indices.len() / 3
    }

    fn num_vertices_of_face(&self, _face: usize) -> usize {
        3
    }

    fn position(&self, face: usize, vert: usize) -> [f32; 3] {
        self.vertex(face, vert).position.to_array()
    }

    fn normal(&self, face: usize, vert: usize) -> [f32; 3] {
        self.vertex(face, vert).normal.to_array()
    }

    fn tex_coord(&self, face: usize, vert: usize) -> [f32; 2] {
        self.vertex(face, vert).tex_coord.to_array()
    }

    fn set_tangent_encoded(&mut self, tangent: [f32; 4], face: usize, vert: usize) {
        let index = self.indices[face * 3 + vert] as usize;
        let encoded = encode_tangent(tangent);
        let vertex = &mut self.vertices[index];
        vertex.tangent = encoded.truncate();
        vertex.handedness = encoded.w;
    }
}

/// Force the sign to exactly +1/-1
fn encode_tangent(t: [f32; 4]) -> Vec4 {
    let sign = if t[3] < 0.0 { -1.0 } else { 1.0 };
    Vec4::new(t[0], t[1], t[2], sign)
}

/// Compute per-vertex MikkTSpace tangents into `tangents`
///
/// Returns false (after logging) if the algorithm fails, in which case
/// `tangents` keeps its previous contents.
pub fn calc_tangent_space(
    positions: &[Vec3],
    tex_coords: &[Vec2],
    normals: &[Vec3],
    indices: &[u32],
    tangents: &mut [Vec4],
) -> bool {
    let n = positions.len();
    if tex_coords.len() != n || normals.len() != n || tangents.len() != n {
        tracing::warn!(
            "calc_tangent_space: stream sizes differ (positions {}, uvs {}, normals {}, tangents {})",
            n,
            tex_coords.len(),
            normals.len(),
            tangents.len()
        );
        return false;
    }
    if indices.iter().any(|&i| i as usize >= n) {
        tracing::warn!("calc_tangent_space: index out of range, skipping");
        return false;
    }

    let mut geometry = IndexedGeometry {
        positions,
        tex_coords,
        normals,
        indices,
        tangents,
    };
    let ok = mikktspace::generate_tangents(&mut geometry);
    if !ok {
        tracing::warn!(
            "calc_tangent_space: MikkTSpace failed for {} triangles",
            indices.len() / 3
        );
    }
    ok
}

/// In-place MikkTSpace tangents for interleaved vertices
pub fn calc_tangent_space_interleaved(vertices: &mut [MeshVertex], indices: &[u32]) -> bool {
    if indices.iter().any(|&i| i as usize >= vertices.len()) {
        tracing::warn!("calc_tangent_space_interleaved: index out of range, skipping");
        return false;
    }
    let mut geometry = InterleavedGeometry { vertices, indices };
    let ok = mikktspace::generate_tangents(&mut geometry);
    if !ok {
        tracing::warn!(
            "calc_tangent_space_interleaved: MikkTSpace failed for {} triangles",
            indices.len() / 3
        );
    }
    ok
}

/// Normals as the normalized sum of adjacent (area-weighted) face normals
///
/// The output buffer is zeroed first; vertices not referenced by any
/// triangle end up with a zero normal.
pub fn calc_normals(positions: &[Vec3], indices: &[u32], normals: &mut [Vec3]) {
    normals.fill(Vec3::ZERO);

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let face = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        for i in [i0, i1, i2] {
            if let Some(n) = normals.get_mut(i) {
                *n += face;
            }
        }
    }

    for n in normals.iter_mut() {
        *n = n.normalize_or_zero();
    }
}

/// Analytic tangent/bitangent accumulation (pre-MikkTSpace method)
///
/// Per-triangle UV derivatives are summed per vertex, the tangent is
/// Gram-Schmidt orthogonalized against the normal and the handedness is
/// taken from the accumulated bitangent.
pub fn calc_tangent_space_legacy(
    positions: &[Vec3],
    tex_coords: &[Vec2],
    normals: &[Vec3],
    indices: &[u32],
    tangents: &mut [Vec4],
) {
    let n = positions.len();
    if tex_coords.len() != n || normals.len() != n || tangents.len() != n {
        tracing::warn!("calc_tangent_space_legacy: stream sizes differ, skipping");
        return;
    }

    let mut tan = vec![Vec3::ZERO; n];
    let mut bitan = vec![Vec3::ZERO; n];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if i0 >= n || i1 >= n || i2 >= n {
            continue;
        }
        let e1 = positions[i1] - positions[i0];
        let e2 = positions[i2] - positions[i0];
        let d1 = tex_coords[i1] - tex_coords[i0];
        let d2 = tex_coords[i2] - tex_coords[i0];

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let b = (e2 * d1.x - e1 * d2.x) * r;

        for i in [i0, i1, i2] {
            tan[i] += t;
            bitan[i] += b;
        }
    }

    for i in 0..n {
        let normal = normals[i];
        let t = (tan[i] - normal * normal.dot(tan[i])).normalize_or_zero();
        let sign = if normal.cross(t).dot(bitan[i]) < 0.0 {
            -1.0
        } else {
            1.0
        };
        tangents[i] = t.extend(sign);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit quad on XY facing +Z with UVs matching XY
    fn quad() -> (Vec<Vec3>, Vec<Vec2>, Vec<Vec3>, Vec<u32>) {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let uvs = positions.iter().map(|p| p.truncate()).collect();
        let normals = vec![Vec3::Z; 4];
        (positions, uvs, normals, vec![0, 1, 2, 2, 3, 0])
    }

    #[test]
    fn mikktspace_tangent_follows_u() {
        let (p, uv, n, idx) = quad();
        let mut tangents = vec![Vec4::ZERO; 4];
        assert!(calc_tangent_space(&p, &uv, &n, &idx, &mut tangents));
        for t in tangents {
            assert!(t.truncate().abs_diff_eq(Vec3::X, 1e-5), "{t:?}");
            assert_eq!(t.w, 1.0);
        }
    }

    #[test]
    fn mirrored_uvs_flip_handedness() {
        let (p, mut uv, n, idx) = quad();
        for t in &mut uv {
            t.y = 1.0 - t.y;
        }
        let mut tangents = vec![Vec4::ZERO; 4];
        assert!(calc_tangent_space(&p, &uv, &n, &idx, &mut tangents));
        assert!(tangents.iter().all(|t| t.w == -1.0));
    }

    #[test]
    fn interleaved_matches_separate_streams() {
        let (p, uv, n, idx) = quad();
        let mut separate = vec![Vec4::ZERO; 4];
        calc_tangent_space(&p, &uv, &n, &idx, &mut separate);

        let mut vertices: Vec<MeshVertex> = (0..4)
            .map(|i| MeshVertex {
                position: p[i],
                tex_coord: uv[i],
                normal: n[i],
                ..Default::default()
            })
            .collect();
        assert!(calc_tangent_space_interleaved(&mut vertices, &idx));
        for (v, t) in vertices.iter().zip(&separate) {
            assert!(v.tangent.abs_diff_eq(t.truncate(), 1e-6));
            assert_eq!(v.handedness, t.w);
        }
    }

    #[test]
    fn mismatched_streams_leave_buffer_untouched() {
        let (p, uv, _, idx) = quad();
        let normals = vec![Vec3::Z; 3];
        let mut tangents = vec![Vec4::ZERO; 4];
        assert!(!calc_tangent_space(&p, &uv, &normals, &idx, &mut tangents));
        assert!(tangents.iter().all(|t| *t == Vec4::ZERO));
    }

    #[test]
    fn flat_normals_zero_output_first() {
        let (p, _, _, idx) = quad();
        let mut normals = vec![Vec3::splat(5.0); 5];
        calc_normals(&p, &idx, &mut normals);
        for n in &normals[..4] {
            assert!(n.abs_diff_eq(Vec3::Z, 1e-6));
        }
        // unreferenced vertex
        assert_eq!(normals[4], Vec3::ZERO);
    }

    #[test]
    fn legacy_tangents_agree_on_planar_quad() {
        let (p, uv, n, idx) = quad();
        let mut tangents = vec![Vec4::ZERO; 4];
        calc_tangent_space_legacy(&p, &uv, &n, &idx, &mut tangents);
        for t in tangents {
            assert!(t.truncate().abs_diff_eq(Vec3::X, 1e-5));
            assert_eq!(t.w, 1.0);
        }
    }
}
