//! Format readers and the import driver
//!
//! Each format implements [`MeshReader`]. [`Importer`] picks the reader,
//! purges the target mesh, runs the reader and turns the collected warnings
//! into a [`LoadReport`]. A failed load always leaves the mesh purged.

pub mod fbx;
pub mod gltf;
pub mod obj;

use std::fmt;
use std::path::Path;

use crate::report::ImportLog;
use crate::settings::ImportSettings;
use crate::stream::{FileStream, SourceStream};
use crate::{LoadError, LoadFlags, LoadReport, RawMesh};

/// Supported asset container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// Wavefront OBJ (text)
    Obj,
    /// glTF 2.0, JSON (.gltf) or binary (.glb)
    Gltf,
    /// Autodesk FBX 7.x, binary or ASCII
    Fbx,
}

impl MeshFormat {
    /// Format for a file extension (case-insensitive, without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "obj" => Some(Self::Obj),
            "gltf" | "glb" => Some(Self::Gltf),
            "fbx" => Some(Self::Fbx),
            _ => None,
        }
    }

    /// Format from the extension of a path or stream name
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Gltf => "gltf",
            Self::Fbx => "fbx",
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asset format
///
/// `read` is called on a freshly purged mesh. Recoverable anomalies go to
/// `log`; returning an error aborts the load (the caller purges).
pub trait MeshReader {
    fn format(&self) -> MeshFormat;

    fn read(
        &self,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
        mesh: &mut RawMesh,
        log: &mut ImportLog,
    ) -> Result<(), LoadError>;
}

/// Import driver carrying the reader settings
#[derive(Debug, Clone, Default)]
pub struct Importer {
    settings: ImportSettings,
}

impl Importer {
    pub fn new(settings: ImportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Open `path` and load it, choosing the reader from the extension
    pub fn load_path(
        &self,
        path: &Path,
        flags: LoadFlags,
        mesh: &mut RawMesh,
    ) -> Result<LoadReport, LoadError> {
        mesh.purge();
        let name = path.display().to_string();
        let format = MeshFormat::from_path(path)
            .ok_or_else(|| failed(LoadError::unsupported(&name, "unknown file extension")))?;
        let mut stream = FileStream::open(path).map_err(|e| failed(LoadError::io(&name, e)))?;
        self.load_format(format, &mut stream, flags, mesh)
    }

    /// Load a stream, choosing the reader from the stream name's extension
    pub fn load_stream(
        &self,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
        mesh: &mut RawMesh,
    ) -> Result<LoadReport, LoadError> {
        mesh.purge();
        let format = MeshFormat::from_path(stream.name()).ok_or_else(|| {
            failed(LoadError::unsupported(stream.name(), "unknown file extension"))
        })?;
        self.load_format(format, stream, flags, mesh)
    }

    /// Load a stream with an explicit reader
    pub fn load_format(
        &self,
        format: MeshFormat,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
        mesh: &mut RawMesh,
    ) -> Result<LoadReport, LoadError> {
        mesh.purge();
        let mut log = ImportLog::new(stream.name());

        let result = match format {
            MeshFormat::Obj => {
                obj::ObjReader::new(&self.settings.obj).read(stream, flags, mesh, &mut log)
            }
            MeshFormat::Gltf => {
                gltf::GltfReader::new(&self.settings.gltf).read(stream, flags, mesh, &mut log)
            }
            MeshFormat::Fbx => {
                fbx::FbxReader::new(&self.settings.fbx).read(stream, flags, mesh, &mut log)
            }
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    stream = %log.stream(),
                    "Loaded {}: {} surfaces, {} skins, {} joints, {} animations, {} warnings",
                    format,
                    mesh.surfaces.len(),
                    mesh.skins.len(),
                    mesh.skeleton.joints.len(),
                    mesh.animations.len(),
                    log.warnings().len()
                );
                Ok(log.into_report(format))
            }
            Err(e) => {
                mesh.purge();
                Err(failed(e))
            }
        }
    }
}

/// Log a load failure on its way out
fn failed(error: LoadError) -> LoadError {
    tracing::error!("{error}");
    error
}
