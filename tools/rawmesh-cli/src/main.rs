//! rawmesh CLI
//!
//! Usage:
//!   rawmesh inspect model.glb [--flags surfaces,skins] [--settings import.toml] [--json]
//!   rawmesh check [assets.toml]
//!   rawmesh primitive sphere [--radius 2] [--subdivs 24]

mod manifest;
mod summary;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glam::Vec3;
use rawmesh::{ImportSettings, Importer, LoadFlags, RawMesh};
use std::path::PathBuf;

use summary::MeshSummary;

#[derive(Parser)]
#[command(name = "rawmesh")]
#[command(about = "Inspect mesh assets and check asset manifests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one asset and print what was imported
    Inspect {
        /// OBJ, glTF/GLB or FBX file
        input: PathBuf,

        /// Comma separated load flags (surfaces, skins, skeleton, animation, single_animation, all)
        #[arg(short, long, default_value = "all")]
        flags: String,

        /// Import settings file
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Print the summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Load every asset of a manifest and fail on any error
    Check {
        /// Path to assets.toml
        #[arg(default_value = "assets.toml")]
        manifest: PathBuf,
    },

    /// Generate a procedural primitive and print its summary
    Primitive {
        shape: Shape,

        /// Box/skybox extents, or plane width and height
        #[arg(long, value_delimiter = ',', default_values_t = [1.0, 1.0, 1.0])]
        extents: Vec<f32>,

        #[arg(short, long, default_value_t = 1.0)]
        radius: f32,

        #[arg(long, default_value_t = 2.0)]
        height: f32,

        /// Vertical (or radial) subdivisions
        #[arg(long, default_value_t = 16)]
        subdivs: u32,

        /// Horizontal subdivisions for spheres, capsules and domes
        #[arg(long, default_value_t = 16)]
        horizontal_subdivs: u32,

        #[arg(long, default_value_t = 1.0)]
        tex_scale: f32,

        /// Print the summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Shape {
    Box,
    Sphere,
    PlaneXz,
    PlaneXy,
    Patch,
    Cylinder,
    Cone,
    Capsule,
    Skybox,
    Skydome,
    Hemisphere,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            input,
            flags,
            settings,
            json,
        } => {
            let flags = LoadFlags::parse_list(&flags).map_err(anyhow::Error::msg)?;
            let settings = match settings {
                Some(path) => ImportSettings::load(&path)
                    .with_context(|| format!("Failed to load import settings {:?}", path))?,
                None => ImportSettings::default(),
            };

            tracing::info!("Loading {:?}", input);
            let mut mesh = RawMesh::default();
            let report = Importer::new(settings)
                .load_path(&input, flags, &mut mesh)
                .with_context(|| format!("Failed to load {:?}", input))?;
            mesh.validate()
                .map_err(|e| anyhow::anyhow!("{:?} is inconsistent: {}", input, e))?;

            let summary = MeshSummary::new(&mesh, Some(report.format.to_string()), report.warnings);
            print_summary(&summary, json)?;
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let loaded = manifest::load_manifest(&manifest)?;
            let summary = loaded.check_all()?;
            for failure in &summary.failures {
                tracing::error!("{}", failure);
            }
            if !summary.failures.is_empty() {
                anyhow::bail!(
                    "{} of {} assets failed",
                    summary.failures.len(),
                    loaded.manifest.assets.len()
                );
            }
            tracing::info!(
                "All {} assets loaded ({} warnings)",
                summary.passed,
                summary.warnings
            );
        }

        Commands::Primitive {
            shape,
            extents,
            radius,
            height,
            subdivs,
            horizontal_subdivs,
            tex_scale,
            json,
        } => {
            let extents = match extents.as_slice() {
                [x, y, z] => Vec3::new(*x, *y, *z),
                [x, y] => Vec3::new(*x, *y, 1.0),
                [s] => Vec3::splat(*s),
                _ => anyhow::bail!("--extents takes one, two or three values"),
            };

            let mut mesh = RawMesh::default();
            match shape {
                Shape::Box => mesh.create_box(extents, tex_scale),
                Shape::Skybox => mesh.create_skybox(extents, tex_scale),
                Shape::Sphere => mesh.create_sphere(radius, tex_scale, subdivs, horizontal_subdivs),
                Shape::PlaneXz => mesh.create_plane_xz(extents.x, extents.y, tex_scale),
                Shape::PlaneXy => mesh.create_plane_xy(extents.x, extents.y, tex_scale),
                Shape::Patch => {
                    let (hx, hz) = (extents.x * 0.5, extents.y * 0.5);
                    let corners = [
                        Vec3::new(-hx, 0.0, hz),
                        Vec3::new(hx, 0.0, hz),
                        Vec3::new(hx, 0.0, -hz),
                        Vec3::new(-hx, 0.0, -hz),
                    ];
                    mesh.create_patch(corners, tex_scale, false, (subdivs, horizontal_subdivs));
                }
                Shape::Cylinder => mesh.create_cylinder(radius, height, tex_scale, subdivs),
                Shape::Cone => mesh.create_cone(radius, height, tex_scale, subdivs),
                Shape::Capsule => {
                    mesh.create_capsule(radius, height, tex_scale, subdivs, horizontal_subdivs)
                }
                Shape::Skydome | Shape::Hemisphere => mesh.create_skydome(
                    radius,
                    tex_scale,
                    subdivs,
                    horizontal_subdivs,
                    matches!(shape, Shape::Hemisphere),
                ),
            }

            tracing::info!("Generated {:?}", shape);
            print_summary(&MeshSummary::new(&mesh, None, Vec::new()), json)?;
        }
    }

    Ok(())
}

fn print_summary(summary: &MeshSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        summary.log();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_defaults_to_assets_toml() {
        let cli = Cli::try_parse_from(["rawmesh", "check"]).unwrap();
        match cli.command {
            Commands::Check { manifest } => assert_eq!(manifest, PathBuf::from("assets.toml")),
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn primitive_extents_split_on_commas() {
        let cli =
            Cli::try_parse_from(["rawmesh", "primitive", "box", "--extents", "2,3,4"]).unwrap();
        match cli.command {
            Commands::Primitive { shape, extents, .. } => {
                assert!(matches!(shape, Shape::Box));
                assert_eq!(extents, vec![2.0, 3.0, 4.0]);
            }
            _ => panic!("expected primitive"),
        }
    }
}
