//! Skin weight quantization and skin interning shared by the glTF and FBX
//! readers

use glam::Affine3A;
use hashbrown::HashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_64;

use crate::model::{Skin, SkinVertex};

/// Maximum abs difference for inverse bind poses to count as the same skin
pub const SKIN_MATCH_EPSILON: f32 = 1e-5;

/// Quantize four weights to unorm8 summing to exactly 255
///
/// Each channel gets `floor(w * 255 / sum)`; the rounding residual goes to
/// channel 0. Negative and non-finite weights count as zero; an all-zero
/// input binds fully to slot 0.
pub fn quantize_weights(weights: [f32; 4]) -> [u8; 4] {
    let weights = weights.map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 });
    let sum: f32 = weights.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return [255, 0, 0, 0];
    }

    let quantized = weights.map(|w| ((w * 255.0 / sum).floor() as u32).min(255));
    settle_to_unorm8(quantized).map(|q| q as u8)
}

/// Make quantized weights sum to exactly 255
///
/// A shortfall goes to channel 0. An overshoot from float rounding is taken
/// off the largest channels first so every influence survives.
fn settle_to_unorm8(mut quantized: [u32; 4]) -> [u32; 4] {
    let mut total: u32 = quantized.iter().sum();
    if total <= 255 {
        quantized[0] += 255 - total;
        return quantized;
    }
    while total > 255 {
        let (largest, _) = quantized
            .iter()
            .enumerate()
            .fold((0, 0), |best, (i, &q)| if q > best.1 { (i, q) } else { best });
        let take = (total - 255).min(quantized[largest]);
        quantized[largest] -= take;
        total -= take;
    }
    quantized
}

/// Build a skin vertex from up to four (joint slot, weight) pairs
///
/// Joint slots are clamped to `[0, joint_count - 1]`; the returned flag is
/// true when any slot had to be clamped.
pub fn skin_vertex(joints: [u32; 4], weights: [f32; 4], joint_count: usize) -> (SkinVertex, bool) {
    let max_slot = joint_count.saturating_sub(1).min(u8::MAX as usize) as u32;
    let mut clamped = false;
    let joint_indices = joints.map(|j| {
        if j > max_slot {
            clamped = true;
            max_slot as u8
        } else {
            j as u8
        }
    });
    let vertex = SkinVertex {
        joint_indices,
        joint_weights: quantize_weights(weights),
    };
    (vertex, clamped)
}

/// Keep the four largest influences of a control point
///
/// Influences are `(skin slot, weight)`; unused slots are zero-weight slot 0.
pub fn strongest_influences(influences: &[(u32, f32)]) -> ([u32; 4], [f32; 4]) {
    let mut sorted: SmallVec<[(u32, f32); 8]> = influences
        .iter()
        .copied()
        .filter(|(_, w)| *w > 0.0)
        .collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut joints = [0u32; 4];
    let mut weights = [0f32; 4];
    for (slot, (joint, weight)) in sorted.into_iter().take(4).enumerate() {
        joints[slot] = joint;
        weights[slot] = weight;
    }
    (joints, weights)
}

/// Content-keyed skin set for one load
///
/// Skins are bucketed by the xxh3 hash of their joint remap array; a bucket
/// hit only counts when remaps are equal and every inverse bind pose matches
/// within [`SKIN_MATCH_EPSILON`].
#[derive(Debug, Default)]
pub struct SkinRegistry {
    buckets: HashMap<u64, SmallVec<[usize; 2]>>,
}

impl SkinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn remap_hash(joint_remaps: &[usize]) -> u64 {
        let bytes: Vec<u8> = joint_remaps
            .iter()
            .flat_map(|&j| (j as u64).to_le_bytes())
            .collect();
        xxh3_64(&bytes)
    }

    /// Index of an equivalent skin in `skins`, appending `skin` if there is none
    pub fn intern(&mut self, skins: &mut Vec<Skin>, skin: Skin) -> usize {
        let hash = Self::remap_hash(&skin.joint_remaps);
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(&existing) = bucket
            .iter()
            .find(|&&i| skins[i].matches(&skin, SKIN_MATCH_EPSILON))
        {
            return existing;
        }
        let index = skins.len();
        skins.push(skin);
        bucket.push(index);
        index
    }
}

/// Inverse bind pose from a column-major 4x4, dropping the projective row
pub fn inverse_bind_pose(cols: &[[f32; 4]; 4]) -> Affine3A {
    Affine3A::from_mat4(glam::Mat4::from_cols_array_2d(cols))
}
