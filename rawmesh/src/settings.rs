//! Import settings (import.toml)
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! [gltf]
//! normalize_normals = true
//! generate_tangents = true
//!
//! [fbx]
//! sample_rate = 30.0
//! max_samples = 4096
//! generate_tangents = true
//!
//! [obj]
//! position_quantization = 100.0
//! ```

use serde::Deserialize;
use std::path::Path;

/// Tunables shared by all readers
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportSettings {
    pub gltf: GltfSettings,
    pub fbx: FbxSettings,
    pub obj: ObjSettings,
}

/// glTF reader settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GltfSettings {
    /// Re-normalize normals read from the file.
    /// Default: true
    pub normalize_normals: bool,

    /// Compute MikkTSpace tangents when normals and UVs exist but tangents don't.
    /// Default: true
    pub generate_tangents: bool,
}

impl Default for GltfSettings {
    fn default() -> Self {
        Self {
            normalize_normals: true,
            generate_tangents: true,
        }
    }
}

/// FBX reader settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FbxSettings {
    /// Animation sampling rate in Hz.
    /// Default: 30
    pub sample_rate: f32,

    /// Upper bound on samples per clip.
    /// Default: 4096
    pub max_samples: usize,

    /// Compute MikkTSpace tangents when normals and UVs exist but tangents don't.
    /// Default: true
    pub generate_tangents: bool,
}

impl Default for FbxSettings {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            max_samples: 4096,
            generate_tangents: true,
        }
    }
}

/// OBJ reader settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObjSettings {
    /// Positions are multiplied by this factor and truncated before spatial hashing.
    /// Default: 100
    pub position_quantization: f32,
}

impl Default for ObjSettings {
    fn default() -> Self {
        Self {
            position_quantization: 100.0,
        }
    }
}

/// Error reading an import.toml
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl ImportSettings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse settings from a TOML string
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.fbx.sample_rate.is_finite() && self.fbx.sample_rate > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "fbx.sample_rate must be > 0 (got {})",
                self.fbx.sample_rate
            )));
        }
        if self.fbx.max_samples == 0 {
            return Err(SettingsError::Invalid(
                "fbx.max_samples must be at least 1".to_string(),
            ));
        }
        if !(self.obj.position_quantization.is_finite() && self.obj.position_quantization > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "obj.position_quantization must be > 0 (got {})",
                self.obj.position_quantization
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings = ImportSettings::parse("").unwrap();
        assert_eq!(settings, ImportSettings::default());
        assert_eq!(settings.fbx.sample_rate, 30.0);
        assert_eq!(settings.fbx.max_samples, 4096);
        assert!(settings.gltf.normalize_normals);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = ImportSettings::parse("[fbx]\nsample_rate = 60.0\n").unwrap();
        assert_eq!(settings.fbx.sample_rate, 60.0);
        assert_eq!(settings.fbx.max_samples, 4096);
        assert_eq!(settings.obj.position_quantization, 100.0);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let err = ImportSettings::parse("[fbx]\nsample_rate = 0.0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(matches!(
            ImportSettings::parse("[fbx]\nmax_samples = \"many\"\n"),
            Err(SettingsError::Parse(_))
        ));
    }
}
