//! FBX 7.x reader
//!
//! Binary files are decoded by `fbxcel`, ASCII files by the tokenizer in
//! [`ascii`]. Both produce the same [`node::FbxNode`] tree, which
//! [`scene::Scene`] resolves into models, geometry, skins and animation
//! curves. External files referenced by the document are never opened.

mod animation;
mod ascii;
mod binary;
mod import;
mod node;
mod scene;
mod triangulate;

use super::{MeshFormat, MeshReader};
use crate::report::ImportLog;
use crate::settings::FbxSettings;
use crate::stream::{self, SourceStream};
use crate::{LoadError, LoadFlags, RawMesh};

/// Oldest document version the scene builder understands
const MIN_FBX_VERSION: i64 = 7000;

/// FBX reader
#[derive(Debug, Clone)]
pub struct FbxReader {
    settings: FbxSettings,
}

impl FbxReader {
    pub fn new(settings: &FbxSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

impl MeshReader for FbxReader {
    fn format(&self) -> MeshFormat {
        MeshFormat::Fbx
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

        let root = if binary::is_binary(&bytes) {
            binary::parse(&bytes)
        } else if ascii::looks_like_ascii(&bytes) {
            ascii::parse(&String::from_utf8_lossy(&bytes))
        } else {
            Err("not an FBX document".to_string())
        }
        .map_err(|e| LoadError::parse(&name, e))?;

        let version = root
            .child("FBXHeaderExtension")
            .and_then(|h| h.child_i64("FBXVersion"));
        if let Some(version) = version.filter(|&v| v < MIN_FBX_VERSION) {
            return Err(LoadError::unsupported(
                &name,
                format!("FBX version {version} is older than {MIN_FBX_VERSION}"),
            ));
        }

        let mut warnings = Vec::new();
        let scene = scene::Scene::from_document(&root, &mut warnings)
            .map_err(|e| LoadError::parse(&name, e))?;
        for warning in warnings {
            log.warn(warning);
        }
        tracing::debug!(
            "{name}: {} models, {} geometries, {} animation stacks",
            scene.models.len(),
            scene.geometries.len(),
            scene.stacks.len()
        );

        let mut import = import::FbxImport::new(&scene, &self.settings, flags);
        if flags.needs_skeleton() {
            import.build_skeleton(mesh, log);
        }
        if flags.contains(LoadFlags::SURFACES) {
            import.load_surfaces(mesh, log);
        }
        if flags.wants_animation() {
            animation::load_animations(&import, mesh, log);
        }
        Ok(())
    }
}
