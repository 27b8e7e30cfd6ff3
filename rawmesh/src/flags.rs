//! Load flags selecting which parts of an asset are imported

use serde::{Deserialize, Deserializer};

bitflags::bitflags! {
    /// Parts of an asset to import
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LoadFlags: u8 {
        /// Drawable surfaces (vertex and index streams)
        const SURFACES = 0b0000_0001;
        /// Skin bindings and per-vertex skin weights
        const SKINS = 0b0000_0010;
        /// Joint hierarchy
        const SKELETON = 0b0000_0100;
        /// Every animation clip
        const ANIMATION = 0b0000_1000;
        /// Only the first animation clip (implies ANIMATION)
        const SINGLE_ANIMATION = 0b0001_0000 | Self::ANIMATION.bits();
        /// Every part with every clip; `SINGLE_ANIMATION` is left out since it
        /// narrows animation import to the first clip
        const ALL = Self::SURFACES.bits()
            | Self::SKINS.bits()
            | Self::SKELETON.bits()
            | Self::ANIMATION.bits();
    }
}

impl LoadFlags {
    /// Whether the joint hierarchy has to be built (skins and animation channels
    /// reference joints)
    pub fn needs_skeleton(self) -> bool {
        self.intersects(Self::SKELETON | Self::SKINS | Self::ANIMATION)
    }

    /// Whether animation clips are requested at all
    pub fn wants_animation(self) -> bool {
        self.contains(Self::ANIMATION)
    }

    /// Whether only the first animation clip is requested
    pub fn single_animation(self) -> bool {
        self.contains(Self::SINGLE_ANIMATION)
    }

    /// Parse a comma separated list such as `"surfaces,skins"` or `"all"`
    pub fn parse_list(s: &str) -> Result<Self, String> {
        let mut flags = Self::empty();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            flags |= match part.to_ascii_lowercase().as_str() {
                "surfaces" => Self::SURFACES,
                "skins" => Self::SKINS,
                "skeleton" => Self::SKELETON,
                "animation" | "animations" => Self::ANIMATION,
                "single_animation" | "single-animation" => Self::SINGLE_ANIMATION,
                "all" => Self::ALL,
                other => return Err(format!("unknown load flag '{other}'")),
            };
        }
        Ok(flags)
    }
}

impl Default for LoadFlags {
    fn default() -> Self {
        Self::ALL
    }
}

// Manifests spell flags as a string list
impl<'de> Deserialize<'de> for LoadFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse_list(&s).map_err(serde::de::Error::custom)
    }
}
