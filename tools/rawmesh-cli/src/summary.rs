//! Printable summary of a loaded mesh

use rawmesh::{Aabb, ChannelType, RawMesh};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MeshSummary {
    pub format: Option<String>,
    pub surfaces: Vec<SurfaceSummary>,
    pub skins: Vec<usize>,
    pub joints: usize,
    pub animations: Vec<AnimationSummary>,
    pub bounds: Option<BoundsSummary>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SurfaceSummary {
    pub vertices: usize,
    pub triangles: usize,
    pub uv_sets: usize,
    pub normals: bool,
    pub tangents: bool,
    pub skin: Option<usize>,
    pub joint_index: usize,
}

#[derive(Debug, Serialize)]
pub struct AnimationSummary {
    pub name: String,
    pub duration: f32,
    pub translation: usize,
    pub rotation: usize,
    pub scale: usize,
    pub weights: usize,
}

#[derive(Debug, Serialize)]
pub struct BoundsSummary {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl From<Aabb> for BoundsSummary {
    fn from(aabb: Aabb) -> Self {
        Self {
            min: aabb.mins.to_array(),
            max: aabb.maxs.to_array(),
        }
    }
}

impl MeshSummary {
    pub fn new(mesh: &RawMesh, format: Option<String>, warnings: Vec<String>) -> Self {
        let bounds = mesh.bounding_box();
        Self {
            format,
            surfaces: mesh
                .surfaces
                .iter()
                .map(|s| SurfaceSummary {
                    vertices: s.vertex_count(),
                    triangles: s.triangle_count(),
                    uv_sets: usize::from(!s.tex_coords.is_empty())
                        + usize::from(!s.tex_coords2.is_empty()),
                    normals: !s.normals.is_empty(),
                    tangents: !s.tangents.is_empty(),
                    skin: s.skin,
                    joint_index: s.joint_index,
                })
                .collect(),
            skins: mesh.skins.iter().map(|s| s.joint_count()).collect(),
            joints: mesh.skeleton.joints.len(),
            animations: mesh
                .animations
                .iter()
                .map(|a| {
                    let count = |kind| a.channels.iter().filter(|c| c.kind == kind).count();
                    AnimationSummary {
                        name: a.name.clone(),
                        duration: a.duration(),
                        translation: count(ChannelType::Translation),
                        rotation: count(ChannelType::Rotation),
                        scale: count(ChannelType::Scale),
                        weights: count(ChannelType::Weights),
                    }
                })
                .collect(),
            bounds: (!bounds.is_empty()).then(|| bounds.into()),
            warnings,
        }
    }

    /// Write the summary through `tracing`
    pub fn log(&self) {
        if let Some(format) = &self.format {
            tracing::info!("Format: {}", format);
        }
        for (i, s) in self.surfaces.iter().enumerate() {
            tracing::info!(
                "  surface {}: {} vertices, {} triangles, uv sets: {}, normals: {}, tangents: {}{}",
                i,
                s.vertices,
                s.triangles,
                s.uv_sets,
                s.normals,
                s.tangents,
                match s.skin {
                    Some(skin) => format!(", skin {}", skin),
                    None => String::new(),
                }
            );
        }
        for (i, joints) in self.skins.iter().enumerate() {
            tracing::info!("  skin {}: {} joints", i, joints);
        }
        if self.joints > 0 {
            tracing::info!("  skeleton: {} joints", self.joints);
        }
        for a in &self.animations {
            tracing::info!(
                "  animation '{}': {:.2}s, T/R/S/W channels {}/{}/{}/{}",
                a.name,
                a.duration,
                a.translation,
                a.rotation,
                a.scale,
                a.weights
            );
        }
        if let Some(bounds) = &self.bounds {
            tracing::info!("  bounds: {:?} .. {:?}", bounds.min, bounds.max);
        }
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
    }
}
