//! Surface - one material-homogeneous part of a mesh

use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat3, Mat4, Vec2, Vec3, Vec4};

use super::Aabb;
use crate::geometry::GeneratedMesh;
use crate::tangent_space;

/// Per-vertex skin binding: four skin-local joint slots and their weights
///
/// Weights are unorm8 and always sum to exactly 255.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct SkinVertex {
    pub joint_indices: [u8; 4],
    pub joint_weights: [u8; 4],
}

/// Interleaved vertex layout for upload and in-place tangent generation
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: Vec3,
    pub tex_coord: Vec2,
    pub normal: Vec3,
    pub tangent: Vec3,
    /// Bitangent sign, +1.0 or -1.0
    pub handedness: f32,
}

/// One drawable part with one material binding
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    /// Object space positions, or bind space for skinned surfaces
    pub positions: Vec<Vec3>,
    /// Primary UV channel (empty if the source had none)
    pub tex_coords: Vec<Vec2>,
    /// Secondary UV channel, e.g. lightmap UVs
    pub tex_coords2: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    /// xyz = tangent, w = handedness (exactly +1 or -1)
    pub tangents: Vec<Vec4>,
    pub skin_verts: Vec<SkinVertex>,
    /// Triangle list
    pub indices: Vec<u32>,
    /// Index into `RawMesh::skins`
    pub skin: Option<usize>,
    /// Skeleton joint this surface is rigidly attached to, 0 if none
    pub joint_index: usize,
    /// Inverse of the node world transform baked into the vertices at import
    pub inverse_transform: Affine3A,
    /// Bounds; rest-pose bounds for skinned surfaces
    pub bounding_box: Aabb,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            tex_coords: Vec::new(),
            tex_coords2: Vec::new(),
            normals: Vec::new(),
            tangents: Vec::new(),
            skin_verts: Vec::new(),
            indices: Vec::new(),
            skin: None,
            joint_index: 0,
            inverse_transform: Affine3A::IDENTITY,
            bounding_box: Aabb::EMPTY,
        }
    }
}

impl Surface {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_skinned(&self) -> bool {
        self.skin.is_some() && !self.skin_verts.is_empty()
    }

    /// Recompute the bounding box from the stored positions
    pub fn compute_bounds(&mut self) {
        self.bounding_box = Aabb::from_points(&self.positions);
    }

    /// Compute MikkTSpace tangents; no-op without normals and UVs
    pub fn compute_tangents(&mut self) -> bool {
        if self.normals.is_empty() || self.tex_coords.is_empty() {
            return false;
        }
        self.tangents = vec![Vec4::ZERO; self.positions.len()];
        tangent_space::calc_tangent_space(
            &self.positions,
            &self.tex_coords,
            &self.normals,
            &self.indices,
            &mut self.tangents,
        )
    }

    /// Replace normals with area-weighted face normals
    pub fn compute_normals(&mut self) {
        self.normals = vec![Vec3::ZERO; self.positions.len()];
        tangent_space::calc_normals(&self.positions, &self.indices, &mut self.normals);
    }

    /// Check the stream consistency invariant
    ///
    /// Every non-empty attribute stream has one entry per position, the index
    /// list is a whole number of triangles and every index is in range.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.positions.len();
        let streams = [
            ("tex_coords", self.tex_coords.len()),
            ("tex_coords2", self.tex_coords2.len()),
            ("normals", self.normals.len()),
            ("tangents", self.tangents.len()),
            ("skin_verts", self.skin_verts.len()),
        ];
        for (name, len) in streams {
            if len != 0 && len != n {
                return Err(format!("{name} has {len} entries, expected {n}"));
            }
        }
        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            ));
        }
        if let Some((at, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= n)
        {
            return Err(format!("index {index} at {at} out of range ({n} vertices)"));
        }
        Ok(())
    }

    /// Transform vertices in place (used to bake node transforms)
    ///
    /// Mirroring transforms flip the winding and the bitangent sign so faces
    /// keep facing outward.
    pub fn apply_transform(&mut self, transform: Mat4) {
        let linear = Mat3::from_mat4(transform);
        let normal_matrix = linear.inverse().transpose();

        for p in &mut self.positions {
            *p = transform.transform_point3(*p);
        }
        for normal in &mut self.normals {
            *normal = (normal_matrix * *normal).normalize_or_zero();
        }
        let mirrored = linear.determinant() < 0.0;
        for tangent in &mut self.tangents {
            let t = (linear * tangent.truncate()).normalize_or_zero();
            let w = if mirrored { -tangent.w } else { tangent.w };
            *tangent = t.extend(w);
        }
        if mirrored {
            for tri in self.indices.chunks_exact_mut(3) {
                tri.swap(1, 2);
            }
        }
    }

    /// Interleave position/UV/normal/tangent for upload
    ///
    /// Missing channels are filled with zeros (handedness defaults to +1).
    pub fn interleaved_vertices(&self) -> Vec<MeshVertex> {
        (0..self.positions.len())
            .map(|i| {
                let tangent = self.tangents.get(i).copied().unwrap_or(Vec4::W);
                MeshVertex {
                    position: self.positions[i],
                    tex_coord: self.tex_coords.get(i).copied().unwrap_or(Vec2::ZERO),
                    normal: self.normals.get(i).copied().unwrap_or(Vec3::ZERO),
                    tangent: tangent.truncate(),
                    handedness: if tangent.w < 0.0 { -1.0 } else { 1.0 },
                }
            })
            .collect()
    }
}

impl From<GeneratedMesh> for Surface {
    fn from(mesh: GeneratedMesh) -> Self {
        Self {
            positions: mesh.positions,
            tex_coords: mesh.tex_coords,
            normals: mesh.normals,
            tangents: mesh.tangents,
            indices: mesh.indices,
            bounding_box: mesh.bounds,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Surface {
        Surface {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn validate_accepts_consistent_surface() {
        assert_eq!(triangle().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_mismatched_stream() {
        let mut surface = triangle();
        surface.normals = vec![Vec3::Z; 2];
        assert!(surface.validate().unwrap_err().contains("normals"));
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        let mut surface = triangle();
        surface.indices = vec![0, 1, 3];
        assert!(surface.validate().is_err());
    }

    #[test]
    fn compute_normals_then_tangents() {
        let mut surface = triangle();
        surface.compute_normals();
        assert!(surface.normals.iter().all(|n| n.abs_diff_eq(Vec3::Z, 1e-6)));
        assert!(surface.compute_tangents());
        for t in &surface.tangents {
            assert!(t.w == 1.0 || t.w == -1.0);
            assert!(t.truncate().abs_diff_eq(Vec3::X, 1e-5));
        }
    }

    #[test]
    fn mirrored_transform_flips_winding_and_handedness() {
        let mut surface = triangle();
        surface.normals = vec![Vec3::Z; 3];
        surface.tangents = vec![Vec4::new(1.0, 0.0, 0.0, 1.0); 3];
        surface.apply_transform(Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0)));
        assert_eq!(surface.indices, vec![0, 2, 1]);
        assert_eq!(surface.positions[1], Vec3::NEG_X);
        assert!(surface.normals.iter().all(|n| n.abs_diff_eq(Vec3::Z, 1e-6)));
        assert!(surface.tangents.iter().all(|t| t.w == -1.0));
    }

    #[test]
    fn transform_rotates_normals() {
        let mut surface = triangle();
        surface.normals = vec![Vec3::Z; 3];
        let transform = Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2)
            * Mat4::from_scale(Vec3::splat(2.0));
        surface.apply_transform(transform);
        assert_eq!(surface.indices, vec![0, 1, 2]);
        assert!(surface.normals[0].abs_diff_eq(Vec3::NEG_Y, 1e-5));
        assert!(surface.positions[2].abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));
    }

    #[test]
    fn interleaved_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 48);
        assert_eq!(std::mem::size_of::<SkinVertex>(), 8);
        let vertices = triangle().interleaved_vertices();
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[1].tex_coord, Vec2::X);
        assert_eq!(vertices[1].handedness, 1.0);
    }
}
