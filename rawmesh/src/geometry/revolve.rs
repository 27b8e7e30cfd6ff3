//! Surfaces of revolution around the Y axis (sphere, skydome, capsule,
//! cylinder, cone)
//!
//! Shapes are described as rows from top to bottom; each row becomes a ring
//! of `segments + 1` vertices so the U seam gets its own column.

use glam::{Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use super::{GeneratedMesh, MIN_ROUND_SUBDIVS, positive};

/// One ring of a surface of revolution
#[derive(Clone, Copy, Debug)]
struct Row {
    y: f32,
    /// Ring radius, exactly 0.0 at poles
    radius: f32,
    /// Normal in the (radial, y) half plane
    normal_r: f32,
    normal_y: f32,
    /// Unscaled V coordinate
    v: f32,
}

fn revolve(
    mesh: &mut GeneratedMesh,
    rows: &[Row],
    segments: u32,
    tex_coord_scale: f32,
    inward: bool,
) {
    let base = mesh.positions.len() as u32;
    let columns = segments + 1;

    for row in rows {
        for s in 0..columns {
            let u = s as f32 / segments as f32;
            let (sin, cos) = (u * TAU).sin_cos();
            let position = Vec3::new(row.radius * cos, row.y, row.radius * sin);
            let normal = Vec3::new(row.normal_r * cos, row.normal_y, row.normal_r * sin)
                .normalize_or_zero();
            let normal = if inward { -normal } else { normal };
            mesh.add_vertex(position, Vec2::new(u, row.v) * tex_coord_scale, normal);
        }
    }

    for (k, pair) in rows.windows(2).enumerate() {
        let top_pole = pair[0].radius == 0.0;
        let bottom_pole = pair[1].radius == 0.0;
        for s in 0..segments {
            let i0 = base + k as u32 * columns + s;
            let i1 = i0 + 1;
            let i2 = i0 + columns;
            let i3 = i2 + 1;
            // at a pole one of the two triangles collapses
            if !top_pole {
                mesh.add_triangle(i0, i1, i3, inward);
            }
            if !bottom_pole {
                mesh.add_triangle(i0, i3, i2, inward);
            }
        }
    }
}

/// Flat disc at height `y`, facing +Y (`up`) or -Y
fn add_cap(
    mesh: &mut GeneratedMesh,
    y: f32,
    radius: f32,
    segments: u32,
    tex_coord_scale: f32,
    up: bool,
) {
    let normal = if up { Vec3::Y } else { Vec3::NEG_Y };
    let center = mesh.add_vertex(
        Vec3::new(0.0, y, 0.0),
        Vec2::splat(0.5) * tex_coord_scale,
        normal,
    );
    for s in 0..=segments {
        let (sin, cos) = (s as f32 / segments as f32 * TAU).sin_cos();
        mesh.add_vertex(
            Vec3::new(radius * cos, y, radius * sin),
            Vec2::new(0.5 + 0.5 * cos, 0.5 + 0.5 * sin) * tex_coord_scale,
            normal,
        );
    }
    for s in 0..segments {
        let i0 = center + 1 + s;
        let i1 = i0 + 1;
        if up {
            mesh.add_triangle(center, i1, i0, false);
        } else {
            mesh.add_triangle(center, i0, i1, false);
        }
    }
}

/// Latitude rows from the north pole down to `phi_max`
fn latitude_rows(radius: f32, rings: u32, phi_max: f32) -> Vec<Row> {
    (0..=rings)
        .map(|ring| {
            let t = ring as f32 / rings as f32;
            let phi = t * phi_max;
            let (sin, cos) = phi.sin_cos();
            let at_pole = ring == 0 || (ring == rings && phi_max >= PI);
            Row {
                y: if at_pole { radius * cos.signum() } else { radius * cos },
                radius: if at_pole { 0.0 } else { radius * sin },
                normal_r: if at_pole { 0.0 } else { sin },
                normal_y: cos,
                v: t,
            }
        })
        .collect()
}

/// UV sphere
///
/// `vertical_subdivs` rings from pole to pole, `horizontal_subdivs` segments
/// around the equator.
pub fn sphere_mesh(
    radius: f32,
    tex_coord_scale: f32,
    vertical_subdivs: u32,
    horizontal_subdivs: u32,
) -> GeneratedMesh {
    let radius = positive("sphere_mesh", "radius", radius);
    let rings = vertical_subdivs.max(MIN_ROUND_SUBDIVS);
    let segments = horizontal_subdivs.max(MIN_ROUND_SUBDIVS);

    let mut mesh = GeneratedMesh::default();
    let rows = latitude_rows(radius, rings, PI);
    revolve(&mut mesh, &rows, segments, tex_coord_scale, false);
    mesh.finish()
}

/// Sphere or upper hemisphere seen from inside
pub fn skydome_mesh(
    radius: f32,
    tex_coord_scale: f32,
    vertical_subdivs: u32,
    horizontal_subdivs: u32,
    hemisphere: bool,
) -> GeneratedMesh {
    let radius = positive("skydome_mesh", "radius", radius);
    let rings = vertical_subdivs.max(MIN_ROUND_SUBDIVS);
    let segments = horizontal_subdivs.max(MIN_ROUND_SUBDIVS);
    let phi_max = if hemisphere { FRAC_PI_2 } else { PI };

    let mut mesh = GeneratedMesh::default();
    let rows = latitude_rows(radius, rings, phi_max);
    revolve(&mut mesh, &rows, segments, tex_coord_scale, true);
    mesh.finish()
}

/// Capsule along Y: a cylinder of `height` between two hemispheres
///
/// Total height is `height + 2 * radius`. `vertical_subdivs` is rounded up to
/// an even count and split between the hemispheres. V follows arc length.
pub fn capsule_mesh(
    radius: f32,
    height: f32,
    tex_coord_scale: f32,
    vertical_subdivs: u32,
    horizontal_subdivs: u32,
) -> GeneratedMesh {
    let radius = positive("capsule_mesh", "radius", radius);
    let half_height = height.max(0.0) * 0.5;
    let mut rings = vertical_subdivs.max(MIN_ROUND_SUBDIVS);
    rings += rings % 2;
    let segments = horizontal_subdivs.max(MIN_ROUND_SUBDIVS);

    let total_length = PI * radius + 2.0 * half_height;
    let sphere = latitude_rows(radius, rings, PI);
    let half = (rings / 2) as usize;

    let mut rows = Vec::with_capacity(sphere.len() + 1);
    for (k, row) in sphere.iter().enumerate() {
        let phi = k as f32 / rings as f32 * PI;
        let (offset, arc) = if k <= half {
            (half_height, radius * phi)
        } else {
            (-half_height, radius * phi + 2.0 * half_height)
        };
        rows.push(Row {
            y: row.y + offset,
            v: arc / total_length,
            ..*row
        });
        // the equator ring is repeated at the bottom of the cylinder section
        if k == half && half_height > 0.0 {
            rows.push(Row {
                y: row.y - half_height,
                v: (arc + 2.0 * half_height) / total_length,
                ..*row
            });
        }
    }

    let mut mesh = GeneratedMesh::default();
    revolve(&mut mesh, &rows, segments, tex_coord_scale, false);
    mesh.finish()
}

/// Capped cylinder along Y, centered on the origin
pub fn cylinder_mesh(
    radius: f32,
    height: f32,
    tex_coord_scale: f32,
    subdivs: u32,
) -> GeneratedMesh {
    let radius = positive("cylinder_mesh", "radius", radius);
    let half_height = positive("cylinder_mesh", "height", height) * 0.5;
    let segments = subdivs.max(MIN_ROUND_SUBDIVS);

    let side = |y: f32, v: f32| Row {
        y,
        radius,
        normal_r: 1.0,
        normal_y: 0.0,
        v,
    };

    let mut mesh = GeneratedMesh::default();
    revolve(
        &mut mesh,
        &[side(half_height, 0.0), side(-half_height, 1.0)],
        segments,
        tex_coord_scale,
        false,
    );
    add_cap(&mut mesh, half_height, radius, segments, tex_coord_scale, true);
    add_cap(&mut mesh, -half_height, radius, segments, tex_coord_scale, false);
    mesh.finish()
}

/// Cone along Y with the apex at `+height / 2` and a capped base
pub fn cone_mesh(radius: f32, height: f32, tex_coord_scale: f32, subdivs: u32) -> GeneratedMesh {
    let radius = positive("cone_mesh", "radius", radius);
    let height = positive("cone_mesh", "height", height);
    let half_height = height * 0.5;
    let segments = subdivs.max(MIN_ROUND_SUBDIVS);

    let slant = (height * height + radius * radius).sqrt();
    let (normal_r, normal_y) = (height / slant, radius / slant);

    let rows = [
        Row {
            y: half_height,
            radius: 0.0,
            normal_r,
            normal_y,
            v: 0.0,
        },
        Row {
            y: -half_height,
            radius,
            normal_r,
            normal_y,
            v: 1.0,
        },
    ];

    let mut mesh = GeneratedMesh::default();
    revolve(&mut mesh, &rows, segments, tex_coord_scale, false);
    add_cap(&mut mesh, -half_height, radius, segments, tex_coord_scale, false);
    mesh.finish()
}
