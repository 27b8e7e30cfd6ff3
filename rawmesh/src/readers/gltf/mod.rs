//! glTF 2.0 reader (.gltf and .glb)
//!
//! Only the first scene is imported. Passes run in dependency order:
//! skeleton (node -> joint map), surfaces (with skin resolution) and
//! animation. Nodes are mapped to joints through an explicit table keyed on
//! the node index, so nodes outside the scene never resolve.

mod accessor;
mod animation;
mod surfaces;

use ::gltf::Gltf;
use ::gltf::buffer::Data;
use glam::{Affine3A, Quat, Vec3};
use hashbrown::{HashMap, HashSet};

use super::{MeshFormat, MeshReader};
use crate::model::{Joint, MAX_SKELETON_JOINTS, Skeleton, Skin};
use crate::report::ImportLog;
use crate::settings::GltfSettings;
use crate::skinning::{SkinRegistry, inverse_bind_pose};
use crate::stream::{self, SourceStream};
use crate::{LoadError, LoadFlags, RawMesh};

/// glTF / GLB reader
#[derive(Debug, Clone)]
pub struct GltfReader {
    settings: GltfSettings,
}

impl GltfReader {
    pub fn new(settings: &GltfSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

/// State shared by the passes of one load
struct ImportContext<'a> {
    buffers: &'a [Data],
    settings: &'a GltfSettings,
    flags: LoadFlags,
    /// glTF node index -> skeleton joint index
    node_joints: HashMap<usize, usize>,
    /// glTF skin index -> `RawMesh::skins` index (None if unusable)
    resolved_skins: HashMap<usize, Option<usize>>,
    skin_registry: SkinRegistry,
}

/// Buffer lookup callback for the `gltf` reader API
fn buffer_slice<'s>(buffers: &'s [Data]) -> impl Fn(::gltf::Buffer<'_>) -> Option<&'s [u8]> + Clone + 's {
    move |buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice())
}

impl ImportContext<'_> {
    fn joint_of(&self, node: &::gltf::Node) -> Option<usize> {
        self.node_joints.get(&node.index()).copied()
    }

    /// Map a glTF skin to a deduplicated `RawMesh` skin
    fn resolve_skin(
        &mut self,
        skin: &::gltf::Skin,
        mesh: &mut RawMesh,
        log: &mut ImportLog,
    ) -> Option<usize> {
        if let Some(&resolved) = self.resolved_skins.get(&skin.index()) {
            return resolved;
        }
        let resolved = self.build_skin(skin, mesh, log);
        self.resolved_skins.insert(skin.index(), resolved);
        resolved
    }

    fn build_skin(
        &mut self,
        skin: &::gltf::Skin,
        mesh: &mut RawMesh,
        log: &mut ImportLog,
    ) -> Option<usize> {
        let label = skin_label(skin);
        let joint_count = mesh.skeleton.joints.len();
        if joint_count == 0 {
            log.warn(format!("{label}: no skeleton joints to bind to, skinning ignored"));
            return None;
        }

        let joints: Vec<_> = skin.joints().collect();
        let mut joint_remaps = Vec::with_capacity(joints.len());
        for (slot, node) in joints.iter().enumerate() {
            match self.joint_of(node).filter(|&j| j < joint_count) {
                Some(joint) => joint_remaps.push(joint),
                None => {
                    log.warn(format!(
                        "{label}: joint {slot} (node {}) is not part of the skeleton, clamped to joint {}",
                        node.index(),
                        joint_count - 1
                    ));
                    joint_remaps.push(joint_count - 1);
                }
            }
        }

        let matrices_ok = match skin.inverse_bind_matrices() {
            Some(matrices) => match accessor::check_bounds(&matrices, self.buffers) {
                Ok(()) => true,
                Err(err) => {
                    log.warn(format!("{label}: {err}, inverse bind matrices ignored"));
                    false
                }
            },
            None => false,
        };
        let mut inverse_bind_poses: Vec<Affine3A> = if matrices_ok {
            skin.reader(buffer_slice(self.buffers))
                .read_inverse_bind_matrices()
                .map(|matrices| matrices.map(|m| inverse_bind_pose(&m)).collect())
                .unwrap_or_default()
        } else {
            vec![Affine3A::IDENTITY; joint_remaps.len()]
        };
        if inverse_bind_poses.len() != joint_remaps.len() {
            log.warn(format!(
                "{label}: {} inverse bind matrices for {} joints, missing ones are identity",
                inverse_bind_poses.len(),
                joint_remaps.len()
            ));
            inverse_bind_poses.resize(joint_remaps.len(), Affine3A::IDENTITY);
        }

        let skin = Skin {
            joint_remaps,
            inverse_bind_poses,
        };
        Some(self.skin_registry.intern(&mut mesh.skins, skin))
    }
}

fn skin_label(skin: &::gltf::Skin) -> String {
    match skin.name() {
        Some(name) => format!("skin '{name}'"),
        None => format!("skin {}", skin.index()),
    }
}

fn node_name(node: &::gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

/// Rest transform of a node as (translation, normalized rotation, scale)
fn node_trs(node: &::gltf::Node) -> (Vec3, Quat, Vec3) {
    let (t, r, s) = node.transform().decomposed();
    let rotation = Quat::from_array(r);
    let rotation = if rotation.length_squared() > f32::EPSILON {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    };
    (Vec3::from_array(t), rotation, Vec3::from_array(s))
}

/// One joint per scene node in depth-first pre-order
///
/// Parents always precede children. Stops adding at `MAX_SKELETON_JOINTS`.
fn build_skeleton(
    scene: &::gltf::Scene,
    skeleton: &mut Skeleton,
    log: &mut ImportLog,
) -> HashMap<usize, usize> {
    let mut node_joints = HashMap::new();
    let mut visited = HashSet::new();
    let mut dropped = 0usize;

    let mut stack: Vec<(::gltf::Node, i32)> = scene.nodes().map(|n| (n, -1)).collect();
    stack.reverse();

    while let Some((node, parent)) = stack.pop() {
        // a node reachable twice would break the parent ordering
        if !visited.insert(node.index()) {
            continue;
        }
        if skeleton.joints.len() >= MAX_SKELETON_JOINTS {
            dropped += 1;
            stack.extend(node.children().map(|c| (c, -1)));
            continue;
        }

        let index = skeleton.joints.len();
        let (position, rotation, scale) = node_trs(&node);
        skeleton.joints.push(Joint {
            parent,
            name: node_name(&node),
            position,
            rotation,
            scale,
        });
        node_joints.insert(node.index(), index);

        let mut children: Vec<_> = node.children().map(|c| (c, index as i32)).collect();
        children.reverse();
        stack.extend(children);
    }

    if dropped > 0 {
        log.warn(format!(
            "skeleton truncated to {MAX_SKELETON_JOINTS} joints, {dropped} nodes dropped"
        ));
    }
    node_joints
}

impl MeshReader for GltfReader {
    fn format(&self) -> MeshFormat {
        MeshFormat::Gltf
    }

    fn read(
        &self,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
        mesh: &mut RawMesh,
        log: &mut ImportLog,
    ) -> Result<(), LoadError> {
        let name = log.stream().to_string();
        let bytes = stream::read_to_end(stream).map_err(|e| LoadError::io(&name, e))?;

        let Gltf { document, blob } =
            Gltf::from_slice(&bytes).map_err(|e| LoadError::parse(&name, e.to_string()))?;
        let buffers = ::gltf::import_buffers(&document, stream.base_dir(), blob)
            .map_err(|e| LoadError::validation(&name, format!("failed to load buffers: {e}")))?;

        let Some(scene) = document.scenes().next() else {
            tracing::debug!("{name}: no scenes");
            return Ok(());
        };

        let mut ctx = ImportContext {
            buffers: &buffers,
            settings: &self.settings,
            flags,
            node_joints: HashMap::new(),
            resolved_skins: HashMap::new(),
            skin_registry: SkinRegistry::new(),
        };

        if flags.needs_skeleton() {
            ctx.node_joints = build_skeleton(&scene, &mut mesh.skeleton, log);
        }
        if flags.contains(LoadFlags::SURFACES) {
            surfaces::load_surfaces(&mut ctx, &scene, mesh, log);
        }
        if flags.wants_animation() {
            animation::load_animations(&ctx, &document, mesh, log);
        }

        tracing::debug!(
            "{name}: scene 0 of {}, {} nodes mapped to joints",
            document.scenes().len(),
            ctx.node_joints.len()
        );
        Ok(())
    }
}
