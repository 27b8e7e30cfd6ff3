//! Mesh pass: one surface per triangle primitive

use ::gltf::accessor::Dimensions;
use ::gltf::mesh::{Mode, Semantic};
use glam::{Affine3A, Mat4, Vec2, Vec3, Vec4};
use hashbrown::HashSet;

use super::{ImportContext, accessor, buffer_slice};
use crate::model::{Aabb, Surface};
use crate::report::ImportLog;
use crate::skinning::skin_vertex;
use crate::{LoadFlags, RawMesh};

/// Walk the scene and append a surface for every usable primitive
pub(super) fn load_surfaces(
    ctx: &mut ImportContext,
    scene: &::gltf::Scene,
    mesh: &mut RawMesh,
    log: &mut ImportLog,
) {
    let mut visited = HashSet::new();
    let mut stack: Vec<(::gltf::Node, Mat4)> =
        scene.nodes().map(|n| (n, Mat4::IDENTITY)).collect();
    stack.reverse();

    while let Some((node, parent_world)) = stack.pop() {
        if !visited.insert(node.index()) {
            continue;
        }
        let world = parent_world * Mat4::from_cols_array_2d(&node.transform().matrix());

        if let Some(node_mesh) = node.mesh() {
            for primitive in node_mesh.primitives() {
                let label = match node_mesh.name() {
                    Some(name) => format!("mesh '{name}' primitive {}", primitive.index()),
                    None => format!("mesh {} primitive {}", node_mesh.index(), primitive.index()),
                };
                match read_primitive(ctx, &node, &primitive, world, mesh, log, &label) {
                    Ok(surface) => mesh.surfaces.push(surface),
                    Err(reason) => log.warn(format!("{label}: {reason}, skipped")),
                }
            }
        }

        let mut children: Vec<_> = node.children().map(|c| (c, world)).collect();
        children.reverse();
        stack.extend(children);
    }
}

/// Count-checked attribute stream; a mismatched stream is dropped
fn checked<T>(
    values: Option<Vec<T>>,
    count: usize,
    what: &str,
    label: &str,
    log: &mut ImportLog,
) -> Vec<T> {
    match values {
        Some(values) if values.len() == count => values,
        Some(values) => {
            log.warn(format!(
                "{label}: {what} has {} entries for {count} positions, ignored",
                values.len()
            ));
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn read_primitive(
    ctx: &mut ImportContext,
    node: &::gltf::Node,
    primitive: &::gltf::Primitive,
    world: Mat4,
    mesh: &mut RawMesh,
    log: &mut ImportLog,
    label: &str,
) -> Result<Surface, String> {
    if primitive.mode() != Mode::Triangles {
        return Err(format!("mode {:?} is not a triangle list", primitive.mode()));
    }
    if primitive
        .attributes()
        .map(|(_, a)| a)
        .chain(primitive.indices())
        .any(|a| a.sparse().is_some())
    {
        return Err("sparse accessors are not supported".to_string());
    }
    let attributes = primitive.attributes().map(|(semantic, a)| (Some(semantic), a));
    for (semantic, used) in attributes.chain(primitive.indices().map(|a| (None, a))) {
        accessor::check_component_type(semantic.as_ref(), &used)?;
        accessor::check_bounds(&used, ctx.buffers)?;
    }

    let position_accessor = primitive
        .get(&Semantic::Positions)
        .ok_or("no POSITION attribute")?;
    let components = match position_accessor.dimensions() {
        Dimensions::Vec2 => 2,
        Dimensions::Vec3 => 3,
        other => return Err(format!("POSITION must be vec2 or vec3, found {other:?}")),
    };
    if position_accessor.count() == 0 {
        return Err("POSITION has no vertices".to_string());
    }
    let positions: Vec<Vec3> = accessor::read_floats(&position_accessor, ctx.buffers)?
        .chunks_exact(components)
        .map(|p| Vec3::new(p[0], p[1], p.get(2).copied().unwrap_or(0.0)))
        .collect();
    let n = positions.len();

    let reader = primitive.reader(buffer_slice(ctx.buffers));

    let tex_coords = checked(
        reader
            .read_tex_coords(0)
            .map(|t| t.into_f32().map(Vec2::from).collect()),
        n,
        "TEXCOORD_0",
        label,
        log,
    );
    let tex_coords2: Vec<Vec2> = reader
        .read_tex_coords(1)
        .map(|t| t.into_f32().map(Vec2::from).collect::<Vec<_>>())
        .filter(|uv| uv.len() == n)
        .unwrap_or_default();
    let mut normals = checked(
        reader.read_normals().map(|it| it.map(Vec3::from).collect()),
        n,
        "NORMAL",
        label,
        log,
    );
    if ctx.settings.normalize_normals {
        for normal in &mut normals {
            *normal = normal.normalize_or_zero();
        }
    }
    let mut tangents = checked(
        reader.read_tangents().map(|it| {
            it.map(|t| {
                let w = if t[3] < 0.0 { -1.0 } else { 1.0 };
                Vec4::new(t[0], t[1], t[2], w)
            })
            .collect()
        }),
        n,
        "TANGENT",
        label,
        log,
    );

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..n as u32).collect(),
    };
    if indices.len() % 3 != 0 {
        return Err(format!("{} indices do not form whole triangles", indices.len()));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= n) {
        return Err(format!("index {bad} out of range ({n} vertices)"));
    }

    if normals.is_empty() {
        // tangents are meaningless without the normals they were built against
        tangents.clear();
    }

    let mut surface = Surface {
        positions,
        tex_coords,
        tex_coords2,
        normals,
        tangents,
        indices,
        joint_index: ctx.joint_of(node).unwrap_or(0),
        ..Default::default()
    };

    let world_affine = Affine3A::from_mat4(world);
    if ctx.flags.contains(LoadFlags::SKINS) {
        if let Some(skin) = node.skin() {
            bind_skin(ctx, &skin, &reader, &mut surface, mesh, log, label);
        }
    }

    if surface.is_skinned() {
        // bind space stays untouched, only the bounds see the node transform
        surface.bounding_box = Aabb::from_transformed_points(&surface.positions, &world_affine);
    } else {
        surface.apply_transform(world);
        surface.inverse_transform = world_affine.inverse();
        surface.compute_bounds();
    }

    if surface.normals.is_empty() {
        tracing::debug!("{label}: no normals, computing flat normals");
        surface.compute_normals();
    }
    if surface.tangents.is_empty()
        && !surface.tex_coords.is_empty()
        && ctx.settings.generate_tangents
    {
        surface.compute_tangents();
    }

    Ok(surface)
}

/// Attach a skin and per-vertex weights when JOINTS_0 and WEIGHTS_0 are usable
#[allow(clippy::too_many_arguments)]
fn bind_skin<'a, 's, F>(
    ctx: &mut ImportContext,
    skin: &::gltf::Skin,
    reader: &::gltf::mesh::Reader<'a, 's, F>,
    surface: &mut Surface,
    mesh: &mut RawMesh,
    log: &mut ImportLog,
    label: &str,
) where
    F: Clone + Fn(::gltf::Buffer<'a>) -> Option<&'s [u8]>,
{
    let n = surface.positions.len();
    let joints: Option<Vec<[u16; 4]>> = reader.read_joints(0).map(|j| j.into_u16().collect());
    let weights: Option<Vec<[f32; 4]>> = reader.read_weights(0).map(|w| w.into_f32().collect());
    let (joints, weights) = match (joints, weights) {
        (Some(j), Some(w)) if j.len() == n && w.len() == n => (j, w),
        (Some(_), Some(_)) => {
            log.warn(format!(
                "{label}: JOINTS_0/WEIGHTS_0 counts do not match {n} positions, imported unskinned"
            ));
            return;
        }
        _ => {
            log.warn(format!(
                "{label}: node has a skin but no JOINTS_0/WEIGHTS_0, imported unskinned"
            ));
            return;
        }
    };

    let Some(skin_index) = ctx.resolve_skin(skin, mesh, log) else {
        return;
    };
    let joint_count = mesh.skins[skin_index].joint_count();

    let mut clamped = 0usize;
    surface.skin_verts = joints
        .iter()
        .zip(&weights)
        .map(|(j, w)| {
            let (vertex, was_clamped) = skin_vertex(j.map(u32::from), *w, joint_count);
            clamped += usize::from(was_clamped);
            vertex
        })
        .collect();
    if clamped > 0 {
        log.warn(format!(
            "{label}: {clamped} vertices reference joints beyond the skin's {joint_count}, clamped"
        ));
    }
    surface.skin = Some(skin_index);
}
