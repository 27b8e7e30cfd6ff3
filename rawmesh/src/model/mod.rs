//! In-memory mesh model
//!
//! [`RawMesh`] owns everything imported from one asset. Surfaces refer to
//! their skin by index into [`RawMesh::skins`]; nothing refers outside the
//! aggregate.

mod animation;
mod bounds;
mod skeleton;
mod surface;

pub use animation::{Animation, Channel, ChannelType, Interpolation};
pub use bounds::Aabb;
pub use skeleton::{Joint, Skeleton, Skin, MAX_SKELETON_JOINTS};
pub use surface::{MeshVertex, SkinVertex, Surface};

use glam::{Vec2, Vec3};
use std::path::Path;

use crate::geometry::{self, GeneratedMesh};
use crate::readers::Importer;
use crate::stream::SourceStream;
use crate::{LoadError, LoadFlags, LoadReport, MeshFormat};

/// Unified imported asset: surfaces, skins, skeleton and animations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    pub surfaces: Vec<Surface>,
    pub skins: Vec<Skin>,
    pub skeleton: Skeleton,
    pub animations: Vec<Animation>,
}

impl RawMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all four collections
    pub fn purge(&mut self) {
        self.surfaces.clear();
        self.skins.clear();
        self.skeleton.clear();
        self.animations.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
            && self.skins.is_empty()
            && self.skeleton.is_empty()
            && self.animations.is_empty()
    }

    /// Load a file, choosing the reader from its extension
    pub fn load(&mut self, path: impl AsRef<Path>, flags: LoadFlags) -> Result<LoadReport, LoadError> {
        Importer::default().load_path(path.as_ref(), flags, self)
    }

    /// Load from a stream, choosing the reader from the stream name's extension
    pub fn load_stream(
        &mut self,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
    ) -> Result<LoadReport, LoadError> {
        Importer::default().load_stream(stream, flags, self)
    }

    pub fn load_obj(
        &mut self,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
    ) -> Result<LoadReport, LoadError> {
        Importer::default().load_format(MeshFormat::Obj, stream, flags, self)
    }

    pub fn load_gltf(
        &mut self,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
    ) -> Result<LoadReport, LoadError> {
        Importer::default().load_format(MeshFormat::Gltf, stream, flags, self)
    }

    pub fn load_fbx(
        &mut self,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
    ) -> Result<LoadReport, LoadError> {
        Importer::default().load_format(MeshFormat::Fbx, stream, flags, self)
    }

    /// Check every surface, skin, the skeleton and every channel
    pub fn validate(&self) -> Result<(), String> {
        for (i, surface) in self.surfaces.iter().enumerate() {
            surface
                .validate()
                .map_err(|e| format!("surface {i}: {e}"))?;
            if let Some(skin) = surface.skin {
                if skin >= self.skins.len() {
                    return Err(format!("surface {i}: skin {skin} out of range"));
                }
            }
        }
        for (i, skin) in self.skins.iter().enumerate() {
            if skin.joint_remaps.len() != skin.inverse_bind_poses.len() {
                return Err(format!("skin {i}: joint remaps and bind poses differ in length"));
            }
        }
        self.skeleton.validate()?;
        for animation in &self.animations {
            for (i, channel) in animation.channels.iter().enumerate() {
                channel
                    .validate()
                    .map_err(|e| format!("animation '{}' channel {i}: {e}", animation.name))?;
            }
        }
        Ok(())
    }

    /// Union of all surface bounds
    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::EMPTY;
        for surface in &self.surfaces {
            aabb.add_aabb(&surface.bounding_box);
        }
        aabb
    }

    fn set_primitive(&mut self, mesh: GeneratedMesh) {
        self.purge();
        self.surfaces.push(Surface::from(mesh));
    }

    // ------------------------------------------------------------------------
    // Procedural primitives (each replaces the current contents)
    // ------------------------------------------------------------------------

    pub fn create_box(&mut self, extents: Vec3, tex_coord_scale: f32) {
        self.set_primitive(geometry::box_mesh(extents, tex_coord_scale));
    }

    pub fn create_sphere(
        &mut self,
        radius: f32,
        tex_coord_scale: f32,
        vertical_subdivs: u32,
        horizontal_subdivs: u32,
    ) {
        self.set_primitive(geometry::sphere_mesh(
            radius,
            tex_coord_scale,
            vertical_subdivs,
            horizontal_subdivs,
        ));
    }

    pub fn create_plane_xz(&mut self, width: f32, height: f32, tex_coord_scale: f32) {
        self.set_primitive(geometry::plane_mesh_xz(width, height, tex_coord_scale));
    }

    pub fn create_plane_xy(&mut self, width: f32, height: f32, tex_coord_scale: f32) {
        self.set_primitive(geometry::plane_mesh_xy(width, height, tex_coord_scale));
    }

    pub fn create_patch(
        &mut self,
        corners: [Vec3; 4],
        tex_coord_scale: f32,
        two_sided: bool,
        subdivs: (u32, u32),
    ) {
        self.set_primitive(geometry::patch_mesh(
            corners,
            tex_coord_scale,
            two_sided,
            subdivs.0,
            subdivs.1,
        ));
    }

    pub fn create_cylinder(&mut self, radius: f32, height: f32, tex_coord_scale: f32, subdivs: u32) {
        self.set_primitive(geometry::cylinder_mesh(radius, height, tex_coord_scale, subdivs));
    }

    pub fn create_cone(&mut self, radius: f32, height: f32, tex_coord_scale: f32, subdivs: u32) {
        self.set_primitive(geometry::cone_mesh(radius, height, tex_coord_scale, subdivs));
    }

    pub fn create_capsule(
        &mut self,
        radius: f32,
        height: f32,
        tex_coord_scale: f32,
        vertical_subdivs: u32,
        horizontal_subdivs: u32,
    ) {
        self.set_primitive(geometry::capsule_mesh(
            radius,
            height,
            tex_coord_scale,
            vertical_subdivs,
            horizontal_subdivs,
        ));
    }

    pub fn create_skybox(&mut self, extents: Vec3, tex_coord_scale: f32) {
        self.set_primitive(geometry::skybox_mesh(extents, tex_coord_scale));
    }

    pub fn create_skydome(
        &mut self,
        radius: f32,
        tex_coord_scale: f32,
        vertical_subdivs: u32,
        horizontal_subdivs: u32,
        hemisphere: bool,
    ) {
        self.set_primitive(geometry::skydome_mesh(
            radius,
            tex_coord_scale,
            vertical_subdivs,
            horizontal_subdivs,
            hemisphere,
        ));
    }
}

/// Flip V of a UV set (`1 - v`)
pub(crate) fn flip_v(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, 1.0 - uv.y)
}
