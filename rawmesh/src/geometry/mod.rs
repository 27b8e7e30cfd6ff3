//! Procedural mesh primitives
//!
//! Every generator returns a ready-to-use triangle list with positions,
//! UVs, normals and MikkTSpace tangents. Generators never fail: bad
//! dimensions are clamped with a warning, subdivision counts are clamped
//! silently to their minimum.
//!
//! Winding is counter-clockwise seen from outside. Skybox and skydome are
//! viewed from inside, so they reverse winding and point normals inward.

mod flat;
mod revolve;


pub use flat::{box_mesh, patch_mesh, plane_mesh_xy, plane_mesh_xz, skybox_mesh};
pub use revolve::{capsule_mesh, cone_mesh, cylinder_mesh, skydome_mesh, sphere_mesh};

use glam::{Vec2, Vec3, Vec4};
use tracing::warn;

use crate::model::Aabb;
use crate::tangent_space;

/// Minimum segment/ring count for round shapes
pub const MIN_ROUND_SUBDIVS: u32 = 4;
/// Minimum vertices per axis for patches
pub const MIN_PATCH_SUBDIVS: u32 = 2;

/// Output of a primitive generator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedMesh {
    pub positions: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    /// xyz = tangent, w = handedness
    pub tangents: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl GeneratedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn add_vertex(&mut self, position: Vec3, uv: Vec2, normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.tex_coords.push(uv);
        self.normals.push(normal);
        index
    }

    /// Push a triangle, reversing it for inside-facing shapes
    fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32, inward: bool) {
        if inward {
            self.indices.extend_from_slice(&[i0, i2, i1]);
        } else {
            self.indices.extend_from_slice(&[i0, i1, i2]);
        }
    }

    /// Quad spanning `center ± half_u ± half_v`, front side along `half_u × half_v`
    ///
    /// U runs along `half_u`, V runs against `half_v` (V = 0 at the top edge).
    fn add_quad(
        &mut self,
        center: Vec3,
        half_u: Vec3,
        half_v: Vec3,
        normal: Vec3,
        tex_coord_scale: f32,
        inward: bool,
    ) {
        let corners = [
            (center - half_u - half_v, Vec2::new(0.0, 1.0)),
            (center + half_u - half_v, Vec2::new(1.0, 1.0)),
            (center + half_u + half_v, Vec2::new(1.0, 0.0)),
            (center - half_u + half_v, Vec2::new(0.0, 0.0)),
        ];
        let base = self.positions.len() as u32;
        for (position, uv) in corners {
            self.add_vertex(position, uv * tex_coord_scale, normal);
        }
        self.add_triangle(base, base + 1, base + 2, inward);
        self.add_triangle(base, base + 2, base + 3, inward);
    }

    /// Compute bounds and tangents
    fn finish(mut self) -> Self {
        self.bounds = Aabb::from_points(&self.positions);
        self.tangents = vec![Vec4::ZERO; self.positions.len()];
        tangent_space::calc_tangent_space(
            &self.positions,
            &self.tex_coords,
            &self.normals,
            &self.indices,
            &mut self.tangents,
        );
        self
    }
}

/// Clamp a dimension that must be strictly positive
fn positive(generator: &str, name: &str, value: f32) -> f32 {
    if value > 0.0 {
        value
    } else {
        warn!("{generator}: {name} must be > 0.0, clamping to 0.001");
        0.001
    }
}
