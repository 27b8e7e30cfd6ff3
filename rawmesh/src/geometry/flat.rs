//! Box, skybox, planes and bilinear patches

use glam::{Vec2, Vec3};

use super::{GeneratedMesh, MIN_PATCH_SUBDIVS, positive};

/// (outward normal, U axis, V axis) per box face, with `U × V = normal`
const BOX_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
];

fn box_faces(extents: Vec3, tex_coord_scale: f32, inward: bool) -> GeneratedMesh {
    let generator = if inward { "skybox_mesh" } else { "box_mesh" };
    let half = Vec3::new(
        positive(generator, "extents.x", extents.x),
        positive(generator, "extents.y", extents.y),
        positive(generator, "extents.z", extents.z),
    ) * 0.5;

    let mut mesh = GeneratedMesh::default();
    for (normal, u, v) in BOX_FACES {
        let normal_out = if inward { -normal } else { normal };
        mesh.add_quad(
            normal * half,
            u * half,
            v * half,
            normal_out,
            tex_coord_scale,
            inward,
        );
    }
    mesh.finish()
}

/// Axis-aligned box centered on the origin, 4 vertices per face
pub fn box_mesh(extents: Vec3, tex_coord_scale: f32) -> GeneratedMesh {
    box_faces(extents, tex_coord_scale, false)
}

/// Box seen from inside
pub fn skybox_mesh(extents: Vec3, tex_coord_scale: f32) -> GeneratedMesh {
    box_faces(extents, tex_coord_scale, true)
}

/// Single quad in the XZ plane facing +Y
pub fn plane_mesh_xz(width: f32, height: f32, tex_coord_scale: f32) -> GeneratedMesh {
    let w = positive("plane_mesh_xz", "width", width);
    let h = positive("plane_mesh_xz", "height", height);

    let mut mesh = GeneratedMesh::default();
    mesh.add_quad(
        Vec3::ZERO,
        Vec3::X * (w * 0.5),
        Vec3::NEG_Z * (h * 0.5),
        Vec3::Y,
        tex_coord_scale,
        false,
    );
    mesh.finish()
}

/// Single quad in the XY plane facing +Z
pub fn plane_mesh_xy(width: f32, height: f32, tex_coord_scale: f32) -> GeneratedMesh {
    let w = positive("plane_mesh_xy", "width", width);
    let h = positive("plane_mesh_xy", "height", height);

    let mut mesh = GeneratedMesh::default();
    mesh.add_quad(
        Vec3::ZERO,
        Vec3::X * (w * 0.5),
        Vec3::Y * (h * 0.5),
        Vec3::Z,
        tex_coord_scale,
        false,
    );
    mesh.finish()
}

/// Bilinear patch through four corners
///
/// Corners go counter-clockwise seen from the front: `[0]` is (u0, v1),
/// `[1]` is (u1, v1), `[2]` is (u1, v0), `[3]` is (u0, v0). `subdivs_x` and
/// `subdivs_y` are vertex counts per axis (at least 2). A two-sided patch
/// duplicates every vertex with a flipped normal and reversed winding.
pub fn patch_mesh(
    corners: [Vec3; 4],
    tex_coord_scale: f32,
    two_sided: bool,
    subdivs_x: u32,
    subdivs_y: u32,
) -> GeneratedMesh {
    let sx = subdivs_x.max(MIN_PATCH_SUBDIVS);
    let sy = subdivs_y.max(MIN_PATCH_SUBDIVS);
    let [c0, c1, c2, c3] = corners;

    let face_normal = (c1 - c0).cross(c3 - c0).try_normalize().unwrap_or(Vec3::Y);

    let mut mesh = GeneratedMesh::default();
    for j in 0..sy {
        let t = j as f32 / (sy - 1) as f32;
        for i in 0..sx {
            let s = i as f32 / (sx - 1) as f32;

            let position = c0.lerp(c1, s).lerp(c3.lerp(c2, s), t);
            let ds = (c1 - c0).lerp(c2 - c3, t);
            let dt = (c3 - c0).lerp(c2 - c1, s);
            let normal = ds.cross(dt).try_normalize().unwrap_or(face_normal);

            mesh.add_vertex(position, Vec2::new(s, 1.0 - t) * tex_coord_scale, normal);
        }
    }

    let front_vertices = mesh.positions.len() as u32;
    let grid = |i: u32, j: u32| j * sx + i;
    for j in 0..sy - 1 {
        for i in 0..sx - 1 {
            let (i0, i1) = (grid(i, j), grid(i + 1, j));
            let (i2, i3) = (grid(i, j + 1), grid(i + 1, j + 1));
            mesh.add_triangle(i0, i1, i3, false);
            mesh.add_triangle(i0, i3, i2, false);
        }
    }

    if two_sided {
        for v in 0..front_vertices as usize {
            let (position, uv, normal) = (mesh.positions[v], mesh.tex_coords[v], mesh.normals[v]);
            mesh.add_vertex(position, uv, -normal);
        }
        let front_indices = mesh.indices.len();
        for tri in 0..front_indices / 3 {
            let [a, b, c] = [
                mesh.indices[tri * 3],
                mesh.indices[tri * 3 + 1],
                mesh.indices[tri * 3 + 2],
            ];
            mesh.add_triangle(
                a + front_vertices,
                b + front_vertices,
                c + front_vertices,
                true,
            );
        }
    }

    mesh.finish()
}
