//! Skeleton and surface passes over a resolved FBX scene

use std::collections::BTreeMap;

use glam::{Affine3A, Vec2, Vec3, Vec4};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use super::scene::{Geometry, Model, Scene};
use super::triangulate::{max_face_triangles, triangulate};
use crate::model::{self, Aabb, Joint, MAX_SKELETON_JOINTS, Skin, SkinVertex, Surface};
use crate::report::ImportLog;
use crate::settings::FbxSettings;
use crate::skinning::{SkinRegistry, skin_vertex, strongest_influences};
use crate::weld::weld;
use crate::{LoadFlags, RawMesh};

/// Skin slots addressable by a `SkinVertex`
const MAX_SKIN_SLOTS: usize = u8::MAX as usize + 1;

/// One polygon: a run of `PolygonVertexIndex`
struct Polygon {
    /// Ordinal among all polygons of the geometry, skipped ones included
    index: usize,
    /// Offset of the first corner in the polygon-vertex stream
    start: usize,
    control_points: SmallVec<[usize; 4]>,
}

/// Per-corner expanded vertex data for one material part
#[derive(Default)]
struct Expanded {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    tex_coords2: Vec<Vec2>,
    tangents: Vec<Vec4>,
    skin_verts: Vec<SkinVertex>,
}

pub(super) struct FbxImport<'a> {
    pub scene: &'a Scene,
    pub settings: &'a FbxSettings,
    pub flags: LoadFlags,
    /// Model id -> skeleton joint index
    pub model_joints: HashMap<i64, usize>,
    skin_registry: SkinRegistry,
}

impl<'a> FbxImport<'a> {
    pub fn new(scene: &'a Scene, settings: &'a FbxSettings, flags: LoadFlags) -> Self {
        Self {
            scene,
            settings,
            flags,
            model_joints: HashMap::new(),
            skin_registry: SkinRegistry::new(),
        }
    }

    /// One joint per model, depth-first from the scene roots
    pub fn build_skeleton(&mut self, mesh: &mut RawMesh, log: &mut ImportLog) {
        let scene = self.scene;
        let mut dropped = 0usize;
        let mut visited = HashSet::new();
        let mut stack: Vec<(&Model, i32)> = scene.roots().map(|m| (m, -1)).collect();
        stack.reverse();

        while let Some((model, parent)) = stack.pop() {
            if !visited.insert(model.id) {
                continue;
            }
            let children = model.children.iter().rev().filter_map(|&c| scene.model(c));
            if mesh.skeleton.joints.len() >= MAX_SKELETON_JOINTS {
                dropped += 1;
                stack.extend(children.map(|c| (c, -1)));
                continue;
            }

            let index = mesh.skeleton.joints.len();
            mesh.skeleton.joints.push(Joint {
                parent,
                name: model.name.clone(),
                position: model.translation,
                rotation: model.rotation_quat(model.rotation),
                scale: model.scaling,
            });
            self.model_joints.insert(model.id, index);
            stack.extend(children.map(|c| (c, index as i32)));
        }

        if dropped > 0 {
            log.warn(format!(
                "skeleton truncated to {MAX_SKELETON_JOINTS} joints, {dropped} models dropped"
            ));
        }
    }

    /// One surface per material part of every mesh model
    pub fn load_surfaces(&mut self, mesh: &mut RawMesh, log: &mut ImportLog) {
        let scene = self.scene;
        for model in &scene.models {
            let Some(geometry) = model.geometry.and_then(|id| scene.geometries.get(&id)) else {
                continue;
            };
            self.load_model(model, geometry, mesh, log);
        }
    }

    fn load_model(
        &mut self,
        model: &Model,
        geometry: &Geometry,
        mesh: &mut RawMesh,
        log: &mut ImportLog,
    ) {
        let label = format!("model '{}'", model.name);
        let polygons = collect_polygons(geometry, &label, log);
        if polygons.is_empty() {
            log.warn(format!("{label}: geometry has no usable polygons, skipped"));
            return;
        }

        // material slot -> polygons, parts emitted in slot order
        let mut parts: BTreeMap<i64, Vec<&Polygon>> = BTreeMap::new();
        for polygon in &polygons {
            let slot = geometry
                .materials
                .as_ref()
                .and_then(|m| m.get(polygon.index, polygon.start, polygon.control_points[0]))
                .unwrap_or(0);
            parts.entry(slot).or_default().push(polygon);
        }

        let skin = if self.flags.contains(LoadFlags::SKINS) {
            self.bind_skin(geometry, &label, mesh, log)
        } else {
            None
        };

        let world = self.scene.world_matrix(model.id);
        let joint_index = self.model_joints.get(&model.id).copied().unwrap_or(0);
        let largest = polygons.iter().map(|p| p.control_points.len()).max().unwrap_or(3);
        let mut scratch: Vec<u32> = Vec::with_capacity(max_face_triangles(largest) * 3);

        for (slot, part) in parts {
            let expanded = expand_part(geometry, &part, skin.as_ref().map(|s| &s.1), &mut scratch);
            if expanded.positions.is_empty() {
                continue;
            }

            let welded = weld(expanded.positions.len(), |i, key| {
                key.vec3(expanded.positions[i]);
                if let Some(n) = expanded.normals.get(i) {
                    key.vec3(*n);
                }
                if let Some(uv) = expanded.tex_coords.get(i) {
                    key.vec2(*uv);
                }
                if let Some(uv) = expanded.tex_coords2.get(i) {
                    key.vec2(*uv);
                }
                if let Some(t) = expanded.tangents.get(i) {
                    key.vec4(*t);
                }
                if let Some(s) = expanded.skin_verts.get(i) {
                    key.bytes4(s.joint_indices).bytes4(s.joint_weights);
                }
            });
            tracing::debug!(
                "{label} part {slot}: {} corners welded to {} vertices",
                expanded.positions.len(),
                welded.unique_count()
            );

            let mut surface = Surface {
                positions: welded.gather(&expanded.positions),
                normals: welded.gather(&expanded.normals),
                tex_coords: welded.gather(&expanded.tex_coords),
                tex_coords2: welded.gather(&expanded.tex_coords2),
                tangents: welded.gather(&expanded.tangents),
                skin_verts: welded.gather(&expanded.skin_verts),
                indices: welded.remap,
                joint_index,
                ..Default::default()
            };

            if let Some((skin_index, _)) = &skin {
                surface.skin = Some(*skin_index);
                surface.apply_transform(model.geometric);
                surface.bounding_box =
                    Aabb::from_transformed_points(&surface.positions, &Affine3A::from_mat4(world));
            } else {
                let transform = world * model.geometric;
                surface.apply_transform(transform);
                surface.inverse_transform = Affine3A::from_mat4(transform).inverse();
                surface.compute_bounds();
            }

            if surface.normals.is_empty() {
                surface.compute_normals();
                surface.tangents.clear();
            }
            if surface.tangents.is_empty()
                && !surface.tex_coords.is_empty()
                && self.settings.generate_tangents
            {
                surface.compute_tangents();
            }

            mesh.surfaces.push(surface);
        }
    }

    /// Skin for a geometry plus the skin vertex of every control point
    fn bind_skin(
        &mut self,
        geometry: &Geometry,
        label: &str,
        mesh: &mut RawMesh,
        log: &mut ImportLog,
    ) -> Option<(usize, Vec<SkinVertex>)> {
        let deformer = self.scene.skins.get(&geometry.skin?)?;
        let control_points = geometry.vertices.len();
        let mut influences: Vec<SmallVec<[(u32, f32); 4]>> =
            vec![SmallVec::new(); control_points];
        let mut joint_remaps = Vec::new();
        let mut inverse_bind_poses = Vec::new();
        let mut skipped = 0usize;

        for cluster in deformer.clusters.iter().filter_map(|id| self.scene.clusters.get(id)) {
            // bones beyond the joint cap have no joint and lose their weights
            let joint = cluster.bone.and_then(|b| self.model_joints.get(&b).copied());
            let Some(joint) = joint.filter(|_| joint_remaps.len() < MAX_SKIN_SLOTS) else {
                skipped += 1;
                continue;
            };

            let slot = joint_remaps.len() as u32;
            joint_remaps.push(joint);
            inverse_bind_poses.push(Affine3A::from_mat4(
                cluster.transform_link.inverse() * cluster.transform,
            ));
            for (&cp, &weight) in cluster.indexes.iter().zip(&cluster.weights) {
                if let Some(list) = usize::try_from(cp).ok().and_then(|cp| influences.get_mut(cp)) {
                    list.push((slot, weight as f32));
                }
            }
        }

        if skipped > 0 {
            log.warn(format!(
                "{label}: {skipped} skin clusters have no skeleton joint, their weights are dropped"
            ));
        }
        if joint_remaps.is_empty() {
            log.warn(format!("{label}: skin has no usable clusters, imported unskinned"));
            return None;
        }

        let joint_count = joint_remaps.len();
        let skin_index = self.skin_registry.intern(
            &mut mesh.skins,
            Skin {
                joint_remaps,
                inverse_bind_poses,
            },
        );
        let skin_verts = influences
            .iter()
            .map(|list| {
                let (joints, weights) = strongest_influences(list);
                skin_vertex(joints, weights, joint_count).0
            })
            .collect();
        Some((skin_index, skin_verts))
    }
}

/// Split `PolygonVertexIndex` into polygons, dropping broken ones
fn collect_polygons(geometry: &Geometry, label: &str, log: &mut ImportLog) -> Vec<Polygon> {
    let control_points = geometry.vertices.len();
    let mut polygons = Vec::new();
    let mut current = Polygon {
        index: 0,
        start: 0,
        control_points: SmallVec::new(),
    };
    let mut out_of_range = 0usize;
    let mut degenerate = 0usize;
    let mut valid = true;

    for (corner, &raw) in geometry.polygon_vertex_index.iter().enumerate() {
        // the last corner of a polygon is stored as !index
        let last = raw < 0;
        let cp = if last { !raw } else { raw };
        match usize::try_from(cp).ok().filter(|&cp| cp < control_points) {
            Some(cp) => current.control_points.push(cp),
            None => valid = false,
        }
        if last {
            let next = Polygon {
                index: current.index + 1,
                start: corner + 1,
                control_points: SmallVec::new(),
            };
            let finished = std::mem::replace(&mut current, next);
            if !valid {
                out_of_range += 1;
            } else if finished.control_points.len() < 3 {
                degenerate += 1;
            } else {
                polygons.push(finished);
            }
            valid = true;
        }
    }

    if !current.control_points.is_empty() {
        log.warn(format!("{label}: unterminated polygon at the end of PolygonVertexIndex ignored"));
    }
    if out_of_range > 0 {
        log.warn(format!(
            "{label}: {out_of_range} polygons reference missing control points, skipped"
        ));
    }
    if degenerate > 0 {
        log.warn(format!("{label}: {degenerate} polygons with fewer than 3 corners skipped"));
    }
    polygons
}

/// Triangulate a material part and expand it to one vertex per corner
fn expand_part(
    geometry: &Geometry,
    part: &[&Polygon],
    skin_verts: Option<&Vec<SkinVertex>>,
    scratch: &mut Vec<u32>,
) -> Expanded {
    let mut out = Expanded::default();
    let uv = geometry.uv_sets.first();
    let uv2 = geometry.uv_sets.get(1);
    let mut points: SmallVec<[Vec3; 8]> = SmallVec::new();

    for polygon in part {
        let polygon_index = polygon.index;
        points.clear();
        points.extend(polygon.control_points.iter().map(|&cp| geometry.vertices[cp]));
        scratch.clear();
        triangulate(&points, scratch);

        for &local in scratch.iter() {
            let local = local as usize;
            let corner = polygon.start + local;
            let cp = polygon.control_points[local];

            out.positions.push(geometry.vertices[cp]);
            let normal = geometry.normals.as_ref().map(|n| {
                n.get(polygon_index, corner, cp).unwrap_or(Vec3::ZERO)
            });
            if let Some(normal) = normal {
                out.normals.push(normal);
            }
            if let Some(uv) = uv {
                let value = uv.get(polygon_index, corner, cp).unwrap_or(Vec2::ZERO);
                out.tex_coords.push(model::flip_v(value));
            }
            if let Some(uv2) = uv2 {
                let value = uv2.get(polygon_index, corner, cp).unwrap_or(Vec2::ZERO);
                out.tex_coords2.push(model::flip_v(value));
            }
            if let (Some(tangents), Some(normal)) = (&geometry.tangents, normal) {
                let t = tangents.get(polygon_index, corner, cp).unwrap_or(Vec3::X);
                let handedness = match &geometry.binormals {
                    Some(b) => {
                        let b = b.get(polygon_index, corner, cp).unwrap_or(Vec3::ZERO);
                        if normal.cross(t).dot(b) < 0.0 { -1.0 } else { 1.0 }
                    }
                    None => 1.0,
                };
                out.tangents.push(t.extend(handedness));
            }
            if let Some(skin_verts) = skin_verts {
                out.skin_verts.push(skin_verts.get(cp).copied().unwrap_or_default());
            }
        }
    }
    out
}
