//! glTF reader tests against GLB assets built in memory

mod common;

use common::{GlbBuilder, triangle_glb};
use glam::Vec3;
use rawmesh::{
    ChannelType, Interpolation, LoadError, LoadFlags, MAX_SKELETON_JOINTS, MemoryStream, RawMesh,
};
use serde_json::json;

fn load(name: &str, bytes: Vec<u8>, flags: LoadFlags) -> (RawMesh, Result<rawmesh::LoadReport, LoadError>) {
    let mut mesh = RawMesh::default();
    let mut stream = MemoryStream::new(name, bytes);
    let result = mesh.load_stream(&mut stream, flags);
    (mesh, result)
}

/// Two-joint chain plus a skinned triangle whose third vertex names joint 5
fn skinned_glb() -> Vec<u8> {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let joints = glb.joints(&[[0, 0, 0, 0], [1, 0, 0, 0], [5, 0, 0, 0]]);
    let weights = glb.weights(&[
        [1.0, 0.0, 0.0, 0.0],
        [0.5, 0.5, 0.0, 0.0],
        [0.2, 0.2, 0.2, 0.0],
    ]);
    let indices = glb.indices(&[0, 1, 2]);
    let identity = [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];
    let mut arm_inverse = identity;
    arm_inverse[13] = -1.0;
    let ibm = glb.matrices(&[identity, arm_inverse]);
    let times = glb.floats("SCALAR", 1, &[0.0, 1.0]);
    let rotations = glb.floats(
        "VEC4",
        4,
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.707_106_8, 0.707_106_8],
    );

    glb.build(json!({
        "scene": 0,
        "scenes": [{ "nodes": [0, 2] }],
        "nodes": [
            { "name": "root", "children": [1] },
            { "name": "arm", "translation": [0.0, 1.0, 0.0] },
            { "name": "body", "mesh": 0, "skin": 0, "translation": [10.0, 0.0, 0.0] },
        ],
        "skins": [{ "name": "rig", "joints": [0, 1], "inverseBindMatrices": ibm }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": position, "JOINTS_0": joints, "WEIGHTS_0": weights },
                "indices": indices,
            }],
        }],
        "animations": [{
            "name": "wave",
            "samplers": [{ "input": times, "output": rotations, "interpolation": "LINEAR" }],
            "channels": [{ "sampler": 0, "target": { "node": 1, "path": "rotation" } }],
        }],
    }))
}

#[test]
fn node_transform_is_baked_into_static_surfaces() {
    let (mesh, result) = load("tri.glb", triangle_glb(), LoadFlags::ALL);
    let report = result.unwrap();
    assert!(!report.has_warnings(), "{:?}", report.warnings);

    assert_eq!(mesh.surfaces.len(), 1);
    let surface = &mesh.surfaces[0];
    assert_eq!(surface.indices, vec![0, 1, 2]);
    assert!(surface.positions.iter().all(|p| p.z == 5.0));
    assert_eq!(surface.bounding_box.mins.z, 5.0);
    assert_eq!(surface.normals.len(), 3);
    assert!(surface.normals[0].abs_diff_eq(Vec3::Z, 1e-5));
    assert!(
        surface
            .inverse_transform
            .transform_point3(surface.positions[1])
            .abs_diff_eq(Vec3::X, 1e-5)
    );
    surface.validate().unwrap();
}

#[test]
fn skin_binds_and_clamps_out_of_range_joints() {
    let (mesh, result) = load("skinned.glb", skinned_glb(), LoadFlags::ALL);
    let report = result.unwrap();

    let names: Vec<&str> = mesh.skeleton.joints.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, ["root", "arm", "body"]);
    assert_eq!(mesh.skeleton.joints[1].parent, 0);

    assert_eq!(mesh.skins.len(), 1);
    assert_eq!(mesh.skins[0].joint_remaps, vec![0, 1]);
    assert!((mesh.skins[0].inverse_bind_poses[1].translation.y + 1.0).abs() < 1e-6);

    let surface = &mesh.surfaces[0];
    assert_eq!(surface.skin, Some(0));
    assert_eq!(surface.joint_index, 2);
    assert_eq!(surface.skin_verts[2].joint_indices[0], 1);
    for vertex in &surface.skin_verts {
        let sum: u32 = vertex.joint_weights.iter().map(|&w| u32::from(w)).sum();
        assert_eq!(sum, 255);
    }
    assert!(report.warnings.iter().any(|w| w.contains("clamped")), "{:?}", report.warnings);

    // skinned surfaces stay in bind space; only the bounds see the node
    assert_eq!(surface.positions[1], Vec3::X);
    assert_eq!(surface.bounding_box.mins.x, 10.0);
    mesh.validate().unwrap();
}

#[test]
fn animation_channels_target_joints() {
    let (mesh, result) = load("skinned.glb", skinned_glb(), LoadFlags::ALL);
    result.unwrap();

    assert_eq!(mesh.animations.len(), 1);
    let clip = &mesh.animations[0];
    assert_eq!(clip.name, "wave");
    assert_eq!(clip.channels.len(), 1);
    let channel = &clip.channels[0];
    assert_eq!(channel.kind, ChannelType::Rotation);
    assert_eq!(channel.interpolation, Interpolation::Linear);
    assert_eq!(channel.joint_index, 1);
    assert_eq!(channel.timestamps, vec![0.0, 1.0]);
    assert_eq!(channel.data.len(), 8);
    assert!((clip.duration() - 1.0).abs() < 1e-6);
}

#[test]
fn surfaces_only_skips_skeleton_and_skins() {
    let (mesh, result) = load("skinned.glb", skinned_glb(), LoadFlags::SURFACES);
    result.unwrap();

    assert_eq!(mesh.surfaces.len(), 1);
    assert!(mesh.skeleton.is_empty());
    assert!(mesh.skins.is_empty());
    assert!(mesh.animations.is_empty());
    assert!(!mesh.surfaces[0].is_skinned());
}

#[test]
fn identical_skins_are_shared() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let joints = glb.joints(&[[0, 0, 0, 0]; 3]);
    let weights = glb.weights(&[[1.0, 0.0, 0.0, 0.0]; 3]);
    let bytes = glb.build(json!({
        "scenes": [{ "nodes": [0, 1, 2] }],
        "nodes": [
            { "name": "joint" },
            { "mesh": 0, "skin": 0 },
            { "mesh": 0, "skin": 1 },
        ],
        "skins": [{ "joints": [0] }, { "joints": [0] }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": position, "JOINTS_0": joints, "WEIGHTS_0": weights },
            }],
        }],
    }));

    let (mesh, result) = load("shared.glb", bytes, LoadFlags::ALL);
    result.unwrap();
    assert_eq!(mesh.surfaces.len(), 2);
    assert_eq!(mesh.skins.len(), 1);
    assert_eq!(mesh.surfaces[0].skin, Some(0));
    assert_eq!(mesh.surfaces[1].skin, Some(0));
    // no indices: one triangle per three vertices
    assert_eq!(mesh.surfaces[0].indices, vec![0, 1, 2]);
}

#[test]
fn skeleton_is_truncated_at_the_joint_cap() {
    let count = MAX_SKELETON_JOINTS + 1;
    let nodes: Vec<_> = (0..count).map(|i| json!({ "name": format!("n{i}") })).collect();
    let roots: Vec<usize> = (0..count).collect();
    let bytes = GlbBuilder::new().build(json!({
        "scenes": [{ "nodes": roots }],
        "nodes": nodes,
    }));

    let (mesh, result) = load("wide.glb", bytes, LoadFlags::SKELETON);
    let report = result.unwrap();
    assert_eq!(mesh.skeleton.joints.len(), MAX_SKELETON_JOINTS);
    assert!(
        report.warnings.iter().any(|w| w.contains("truncated")),
        "{:?}",
        report.warnings
    );
    mesh.skeleton.validate().unwrap();
}

#[test]
fn cyclic_nodes_past_the_joint_cap_terminate() {
    let cap = MAX_SKELETON_JOINTS;
    let mut nodes: Vec<_> = (0..cap).map(|i| json!({ "name": format!("n{i}") })).collect();
    nodes.push(json!({ "name": "a", "children": [cap + 1] }));
    nodes.push(json!({ "name": "b", "children": [cap] }));
    let roots: Vec<usize> = (0..=cap).collect();
    let bytes = GlbBuilder::new().build(json!({
        "scenes": [{ "nodes": roots }],
        "nodes": nodes,
    }));

    let (mesh, result) = load("cycle.glb", bytes, LoadFlags::SKELETON);
    let report = result.unwrap();
    assert_eq!(mesh.skeleton.joints.len(), MAX_SKELETON_JOINTS);
    assert!(
        report.warnings.iter().any(|w| w.contains("2 nodes dropped")),
        "{:?}",
        report.warnings
    );
}

#[test]
fn cyclic_nodes_under_the_cap_become_a_tree() {
    let bytes = GlbBuilder::new().build(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "a", "children": [1] },
            { "name": "b", "children": [0] },
        ],
    }));

    let (mesh, result) = load("loop.glb", bytes, LoadFlags::SKELETON);
    result.unwrap();
    assert_eq!(mesh.skeleton.joints.len(), 2);
    assert_eq!(mesh.skeleton.joints[1].parent, 0);
    mesh.skeleton.validate().unwrap();
}

/// One primitive over a valid triangle, with its accessors open to tampering
fn tampered_glb(tamper: impl FnOnce(&mut GlbBuilder, usize, usize)) -> Vec<u8> {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let indices = glb.indices(&[0, 1, 2]);
    tamper(&mut glb, position, indices);
    glb.build(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "name": "hostile",
            "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }],
        }],
    }))
}

fn assert_skipped(bytes: Vec<u8>, reason: &str) {
    let (mesh, result) = load("hostile.glb", bytes, LoadFlags::ALL);
    let report = result.unwrap();
    assert!(mesh.surfaces.is_empty());
    assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
    assert!(report.warnings[0].starts_with("mesh 'hostile' primitive 0"));
    assert!(report.warnings[0].contains(reason), "{:?}", report.warnings);
}

#[test]
fn huge_accessor_count_is_rejected() {
    let bytes = tampered_glb(|glb, position, _| {
        glb.accessor_mut(position)["count"] = json!(4_294_967_295u64);
    });
    assert_skipped(bytes, "past the end");
}

#[test]
fn overflowing_index_count_is_rejected() {
    let bytes = tampered_glb(|glb, _, indices| {
        glb.accessor_mut(indices)["count"] = json!(u64::MAX);
    });
    assert_skipped(bytes, "past the end");
}

#[test]
fn accessor_offset_past_the_view_is_rejected() {
    let bytes = tampered_glb(|glb, _, indices| {
        glb.accessor_mut(indices)["byteOffset"] = json!(1000);
    });
    assert_skipped(bytes, "past the end");
}

#[test]
fn float_indices_are_rejected() {
    let bytes = tampered_glb(|glb, _, indices| {
        glb.accessor_mut(indices)["componentType"] = json!(5126);
    });
    assert_skipped(bytes, "component type");
}

#[test]
fn unreadable_inverse_bind_matrices_fall_back_to_identity() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let joints = glb.joints(&[[0, 0, 0, 0]; 3]);
    let weights = glb.weights(&[[1.0, 0.0, 0.0, 0.0]; 3]);
    let ibm = glb.matrices(&[[0.0; 16]]);
    glb.accessor_mut(ibm)["count"] = json!(4_294_967_295u64);
    let bytes = glb.build(json!({
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [{ "name": "joint" }, { "mesh": 0, "skin": 0 }],
        "skins": [{ "joints": [0], "inverseBindMatrices": ibm }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": position, "JOINTS_0": joints, "WEIGHTS_0": weights },
            }],
        }],
    }));

    let (mesh, result) = load("ibm.glb", bytes, LoadFlags::ALL);
    let report = result.unwrap();
    assert_eq!(mesh.skins.len(), 1);
    assert_eq!(mesh.skins[0].inverse_bind_poses, vec![glam::Affine3A::IDENTITY]);
    assert!(
        report.warnings.iter().any(|w| w.contains("inverse bind matrices ignored")),
        "{:?}",
        report.warnings
    );
}

#[test]
fn animation_without_buffer_views_is_bounded() {
    let mut glb = GlbBuilder::new();
    let times = glb.empty_accessor("SCALAR", 4_294_967_295);
    let rotations = glb.empty_accessor("VEC4", 4_294_967_295);
    let bytes = glb.build(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "bone" }],
        "animations": [{
            "name": "endless",
            "samplers": [{ "input": times, "output": rotations }],
            "channels": [{ "sampler": 0, "target": { "node": 0, "path": "rotation" } }],
        }],
    }));

    let (mesh, result) = load("endless.glb", bytes, LoadFlags::ALL);
    let report = result.unwrap();
    assert!(mesh.animations.is_empty());
    assert!(
        report.warnings.iter().any(|w| w.contains("no buffer view")),
        "{:?}",
        report.warnings
    );
}

#[test]
fn non_triangle_primitives_are_skipped() {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let bytes = glb.build(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "name": "mixed",
            "primitives": [
                { "attributes": { "POSITION": position }, "mode": 1 },
                { "attributes": { "POSITION": position } },
            ],
        }],
    }));

    let (mesh, result) = load("mixed.glb", bytes, LoadFlags::ALL);
    let report = result.unwrap();
    assert_eq!(mesh.surfaces.len(), 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("mesh 'mixed' primitive 0"));
}

#[test]
fn malformed_container_is_a_parse_error_and_purges() {
    let mut mesh = RawMesh::default();
    mesh.create_box(Vec3::ONE, 1.0);

    let mut stream = MemoryStream::new("broken.glb", b"glTF\x02\0\0\0garbage".to_vec());
    let err = mesh.load_stream(&mut stream, LoadFlags::ALL).unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }), "{err}");
    assert!(mesh.is_empty());
}

#[test]
fn document_without_scenes_loads_empty() {
    let bytes = GlbBuilder::new().build(json!({}));
    let (mesh, result) = load("empty.glb", bytes, LoadFlags::ALL);
    result.unwrap();
    assert!(mesh.is_empty());
}
