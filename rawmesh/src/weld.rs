//! Exact-attribute vertex welding
//!
//! Readers that expand geometry per polygon corner (FBX) produce one vertex
//! per corner. [`weld`] collapses corners whose attributes are bit-identical
//! (with `-0.0 == 0.0`) and returns the re-indexing.

use glam::{Vec2, Vec3, Vec4};
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use smallvec::SmallVec;

/// Attribute bits of one vertex; 24 words covers position, normal, two UV
/// sets, tangent and skin without spilling
pub type WeldKey = SmallVec<[u32; 24]>;

/// Collects the attribute bits of one vertex
#[derive(Debug, Default)]
pub struct KeyWriter {
    key: WeldKey,
}

impl KeyWriter {
    pub fn f32(&mut self, value: f32) -> &mut Self {
        // fold negative zero so it welds with positive zero
        let value = if value == 0.0 { 0.0 } else { value };
        self.key.push(value.to_bits());
        self
    }

    pub fn vec2(&mut self, v: Vec2) -> &mut Self {
        self.f32(v.x).f32(v.y)
    }

    pub fn vec3(&mut self, v: Vec3) -> &mut Self {
        self.f32(v.x).f32(v.y).f32(v.z)
    }

    pub fn vec4(&mut self, v: Vec4) -> &mut Self {
        self.f32(v.x).f32(v.y).f32(v.z).f32(v.w)
    }

    pub fn bytes4(&mut self, b: [u8; 4]) -> &mut Self {
        self.key.push(u32::from_le_bytes(b));
        self
    }
}

/// Result of welding `n` input vertices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Welded {
    /// Input vertex -> output vertex
    pub remap: Vec<u32>,
    /// Output vertex -> first input vertex with those attributes
    pub kept: Vec<usize>,
}

impl Welded {
    pub fn unique_count(&self) -> usize {
        self.kept.len()
    }

    /// Pick the kept entries out of a per-input-vertex stream
    ///
    /// Empty streams stay empty.
    pub fn gather<T: Copy>(&self, stream: &[T]) -> Vec<T> {
        if stream.is_empty() {
            return Vec::new();
        }
        self.kept.iter().map(|&i| stream[i]).collect()
    }

    /// Rewrite indices that refer to input vertices
    pub fn remap_indices(&self, indices: &mut [u32]) {
        for index in indices {
            *index = self.remap[*index as usize];
        }
    }
}

/// Weld `vertex_count` vertices whose attributes `describe` writes into the key
///
/// Output order follows first appearance, so welding is stable.
pub fn weld(vertex_count: usize, mut describe: impl FnMut(usize, &mut KeyWriter)) -> Welded {
    let mut lookup: HashMap<WeldKey, u32> = HashMap::with_capacity(vertex_count);
    let mut welded = Welded {
        remap: Vec::with_capacity(vertex_count),
        kept: Vec::new(),
    };
    let mut writer = KeyWriter::default();

    for v in 0..vertex_count {
        writer.key.clear();
        describe(v, &mut writer);
        let next = welded.kept.len() as u32;
        let index = match lookup.entry(writer.key.clone()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                entry.insert(next);
                welded.kept.push(v);
                next
            }
        };
        welded.remap.push(index);
    }

    welded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_corners_collapse() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::ZERO, Vec3::Y, Vec3::X];
        let welded = weld(positions.len(), |i, key| {
            key.vec3(positions[i]);
        });
        assert_eq!(welded.remap, vec![0, 1, 0, 2, 1]);
        assert_eq!(welded.kept, vec![0, 1, 3]);
        assert_eq!(welded.gather(&positions), vec![Vec3::ZERO, Vec3::X, Vec3::Y]);
    }

    #[test]
    fn any_differing_attribute_keeps_vertices_apart() {
        let positions = [Vec3::ZERO, Vec3::ZERO];
        let uvs = [Vec2::ZERO, Vec2::new(0.0, 1.0)];
        let welded = weld(2, |i, key| {
            key.vec3(positions[i]).vec2(uvs[i]);
        });
        assert_eq!(welded.unique_count(), 2);
    }

    #[test]
    fn negative_zero_welds_with_zero() {
        let positions = [Vec3::new(0.0, 1.0, 0.0), Vec3::new(-0.0, 1.0, 0.0)];
        let welded = weld(2, |i, key| {
            key.vec3(positions[i]);
        });
        assert_eq!(welded.unique_count(), 1);
    }

    #[test]
    fn remap_indices_and_empty_streams() {
        let welded = weld(4, |i, key| {
            key.f32((i % 2) as f32);
        });
        let mut indices = vec![0, 1, 2, 3, 2, 1];
        welded.remap_indices(&mut indices);
        assert_eq!(indices, vec![0, 1, 0, 1, 0, 1]);
        assert!(welded.gather::<Vec2>(&[]).is_empty());
    }
}
