//! assets.toml manifest parsing
//!
//! ```toml
//! settings = "import.toml"   # optional, relative to the manifest
//!
//! [[assets]]
//! id = "hero"
//! path = "models/hero.glb"
//! flags = "surfaces,skins,skeleton"   # optional, default "all"
//! ```

use anyhow::{Context, Result};
use rawmesh::{ImportSettings, Importer, LoadFlags, RawMesh};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// assets.toml manifest structure
#[derive(Debug, Deserialize)]
pub struct AssetManifest {
    /// Import settings file, relative to the manifest directory
    pub settings: Option<PathBuf>,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

/// One asset to load
#[derive(Debug, Deserialize)]
pub struct AssetEntry {
    pub id: String,
    pub path: PathBuf,
    /// Comma separated load flags.
    /// Default: "all"
    #[serde(default = "default_flags")]
    pub flags: String,
}

fn default_flags() -> String {
    "all".to_string()
}

/// Manifest plus the directory its paths are relative to
#[derive(Debug)]
pub struct LoadedManifest {
    pub manifest: AssetManifest,
    pub base_dir: PathBuf,
}

/// Outcome of checking one manifest
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub passed: usize,
    pub warnings: usize,
    pub failures: Vec<String>,
}

pub fn load_manifest(path: &Path) -> Result<LoadedManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {:?}", path))?;
    let manifest = parse_manifest(&content)
        .with_context(|| format!("Failed to parse manifest {:?}", path))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(LoadedManifest { manifest, base_dir })
}

pub fn parse_manifest(content: &str) -> Result<AssetManifest> {
    let manifest: AssetManifest = toml::from_str(content)?;
    let mut seen = std::collections::HashSet::new();
    for asset in &manifest.assets {
        if !seen.insert(asset.id.as_str()) {
            anyhow::bail!("duplicate asset id '{}'", asset.id);
        }
        LoadFlags::parse_list(&asset.flags)
            .map_err(|e| anyhow::anyhow!("asset '{}': {e}", asset.id))?;
    }
    Ok(manifest)
}

impl LoadedManifest {
    pub fn import_settings(&self) -> Result<ImportSettings> {
        match &self.manifest.settings {
            Some(path) => {
                let path = self.base_dir.join(path);
                ImportSettings::load(&path)
                    .with_context(|| format!("Failed to load import settings {:?}", path))
            }
            None => Ok(ImportSettings::default()),
        }
    }

    /// Load every asset and verify the result is internally consistent
    ///
    /// Every asset is attempted; failures are collected rather than returned early.
    pub fn check_all(&self) -> Result<CheckSummary> {
        let importer = Importer::new(self.import_settings()?);
        let mut summary = CheckSummary::default();
        let mut mesh = RawMesh::default();

        for asset in &self.manifest.assets {
            let path = self.base_dir.join(&asset.path);
            let flags = LoadFlags::parse_list(&asset.flags).map_err(anyhow::Error::msg)?;

            match importer.load_path(&path, flags, &mut mesh) {
                Ok(report) => {
                    if let Err(e) = mesh.validate() {
                        summary.failures.push(format!("{}: {e}", asset.id));
                        continue;
                    }
                    summary.warnings += report.warnings.len();
                    summary.passed += 1;
                    tracing::info!(
                        "  {} ({}): {} surfaces, {} joints, {} animations",
                        asset.id,
                        report.format,
                        mesh.surfaces.len(),
                        mesh.skeleton.joints.len(),
                        mesh.animations.len()
                    );
                }
                Err(e) => summary.failures.push(format!("{}: {e}", asset.id)),
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJ_TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn flags_default_to_all() {
        let manifest = parse_manifest("[[assets]]\nid = \"a\"\npath = \"a.obj\"\n").unwrap();
        assert_eq!(manifest.assets.len(), 1);
        assert_eq!(manifest.assets[0].flags, "all");
        assert!(manifest.settings.is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let content = "[[assets]]\nid = \"a\"\npath = \"a.obj\"\n\n[[assets]]\nid = \"a\"\npath = \"b.obj\"\n";
        assert!(parse_manifest(content).is_err());
    }

    #[test]
    fn rejects_unknown_flags() {
        let content = "[[assets]]\nid = \"a\"\npath = \"a.obj\"\nflags = \"surfaces,morphs\"\n";
        assert!(parse_manifest(content).is_err());
    }

    #[test]
    fn check_collects_every_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tri.obj"), OBJ_TRIANGLE).unwrap();
        let manifest_path = dir.path().join("assets.toml");
        std::fs::write(
            &manifest_path,
            "[[assets]]\nid = \"tri\"\npath = \"tri.obj\"\n\n\
             [[assets]]\nid = \"missing\"\npath = \"missing.obj\"\n\n\
             [[assets]]\nid = \"odd\"\npath = \"tri.xyz\"\n",
        )
        .unwrap();

        let loaded = load_manifest(&manifest_path).unwrap();
        let summary = loaded.check_all().unwrap();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failures.len(), 2);
        assert!(summary.failures[0].starts_with("missing:"));
        assert!(summary.failures[1].starts_with("odd:"));
    }

    #[test]
    fn settings_path_is_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("import.toml"), "[fbx]\nsample_rate = 60.0\n").unwrap();
        let manifest_path = dir.path().join("assets.toml");
        std::fs::write(&manifest_path, "settings = \"import.toml\"\n").unwrap();

        let loaded = load_manifest(&manifest_path).unwrap();
        let settings = loaded.import_settings().unwrap();
        assert_eq!(settings.fbx.sample_rate, 60.0);
    }
}
