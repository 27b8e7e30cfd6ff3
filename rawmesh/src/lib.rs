//! rawmesh - mesh and animation import core
//!
//! Loads OBJ, glTF/GLB and FBX assets (or generates procedural primitives) into
//! a single in-memory model, [`RawMesh`], ready for GPU upload:
//! - surfaces with positions, UVs, normals, tangents and skin weights
//! - deduplicated skins (joint remaps + inverse bind poses)
//! - one joint hierarchy
//! - animation clips
//!
//! # Example
//! ```no_run
//! use rawmesh::{LoadFlags, RawMesh};
//!
//! let mut mesh = RawMesh::default();
//! let report = mesh.load("character.glb", LoadFlags::ALL)?;
//! for warning in &report.warnings {
//!     eprintln!("{warning}");
//! }
//! println!("{} surfaces, {} joints", mesh.surfaces.len(), mesh.skeleton.joints.len());
//! # Ok::<(), rawmesh::LoadError>(())
//! ```

pub mod error;
pub mod flags;
pub mod geometry;
pub mod keyframes;
pub mod model;
pub mod readers;
pub mod report;
pub mod settings;
pub mod skinning;
pub mod stream;
pub mod tangent_space;
pub mod weld;

pub use error::LoadError;
pub use flags::LoadFlags;
pub use model::{
    Aabb, Animation, Channel, ChannelType, Interpolation, Joint, MeshVertex, RawMesh, Skeleton,
    Skin, SkinVertex, Surface, MAX_SKELETON_JOINTS,
};
pub use readers::{Importer, MeshFormat, MeshReader};
pub use report::LoadReport;
pub use settings::ImportSettings;
pub use stream::{FileStream, MemoryStream, SourceStream};
