//! Keyframe reduction for densely sampled curves
//!
//! Resampled FBX curves hold one key per sample tick. Reduction drops what
//! linear playback does not need: a curve that never leaves the rest pose
//! produces no channel, a constant curve produces one key, and inside runs
//! of identical samples only the run endpoints survive.

use glam::Quat;

use crate::model::{Channel, ChannelType, Interpolation};

/// Flip quaternions onto the hemisphere of their predecessor
///
/// Afterwards `dot(q[i], q[i - 1]) >= 0` for every `i`.
pub fn make_quaternions_continuous(samples: &mut [Quat]) {
    for i in 1..samples.len() {
        if samples[i].dot(samples[i - 1]) < 0.0 {
            samples[i] = -samples[i];
        }
    }
}

fn nearly_equal(a: &[f32], b: &[f32]) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() <= f32::EPSILON)
}

fn equals_rest(kind: ChannelType, value: &[f32], rest: &[f32]) -> bool {
    if nearly_equal(value, rest) {
        return true;
    }
    // q and -q are the same rotation
    kind == ChannelType::Rotation && value.iter().zip(rest).all(|(x, y)| (x + y).abs() <= f32::EPSILON)
}

/// Reduce one sampled curve to a linear channel
///
/// `samples` holds `timestamps.len() * kind.components()` floats and `rest`
/// the rest-pose value. Returns `None` when the curve is constant at the rest
/// value. Rotation samples are expected to be continuous already.
pub fn reduce_channel(
    kind: ChannelType,
    joint_index: usize,
    timestamps: &[f32],
    samples: &[f32],
    rest: &[f32],
) -> Option<Channel> {
    let c = kind.components();
    let count = timestamps.len();
    if count == 0 || samples.len() != count * c {
        return None;
    }
    let sample = |i: usize| &samples[i * c..(i + 1) * c];

    let first = sample(0);
    let constant = (1..count).all(|i| nearly_equal(sample(i), first));
    let mut channel = Channel {
        kind,
        interpolation: Interpolation::Linear,
        joint_index,
        timestamps: Vec::new(),
        data: Vec::new(),
    };

    if constant {
        if equals_rest(kind, first, rest) {
            return None;
        }
        channel.timestamps.push(timestamps[0]);
        channel.data.extend_from_slice(first);
        return Some(channel);
    }

    for i in 0..count {
        let interior = i > 0
            && i + 1 < count
            && nearly_equal(sample(i), sample(i - 1))
            && nearly_equal(sample(i), sample(i + 1));
        if !interior {
            channel.timestamps.push(timestamps[i]);
            channel.data.extend_from_slice(sample(i));
        }
    }
    Some(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn times(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 / 30.0).collect()
    }

    #[test]
    fn rest_pose_curve_emits_nothing() {
        let samples: Vec<f32> = [0.0, 0.0, 0.0, 1.0].repeat(10);
        let rest = [0.0, 0.0, 0.0, 1.0];
        assert!(reduce_channel(ChannelType::Rotation, 3, &times(10), &samples, &rest).is_none());
    }

    #[test]
    fn negated_rest_rotation_still_matches() {
        let samples: Vec<f32> = [0.0, 0.0, 0.0, -1.0].repeat(4);
        assert!(
            reduce_channel(ChannelType::Rotation, 0, &times(4), &samples, &[0.0, 0.0, 0.0, 1.0])
                .is_none()
        );
        // sign does not matter for translations
        let samples: Vec<f32> = [-1.0, 0.0, 0.0].repeat(4);
        assert!(
            reduce_channel(ChannelType::Translation, 0, &times(4), &samples, &[1.0, 0.0, 0.0])
                .is_some()
        );
    }

    #[test]
    fn constant_off_rest_curve_keeps_one_key() {
        let samples: Vec<f32> = [1.0, 2.0, 3.0].repeat(30);
        let channel =
            reduce_channel(ChannelType::Translation, 1, &times(30), &samples, &[0.0; 3]).unwrap();
        assert_eq!(channel.timestamps, vec![0.0]);
        assert_eq!(channel.data, vec![1.0, 2.0, 3.0]);
        assert!(channel.validate().is_ok());
    }

    #[test]
    fn runs_keep_their_endpoints() {
        // 0 0 0 1 1 1 2
        let values = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0];
        let samples: Vec<f32> = values.iter().flat_map(|&v| Vec3::splat(v).to_array()).collect();
        let t = times(values.len());
        let channel = reduce_channel(ChannelType::Scale, 0, &t, &samples, &[1.0; 3]).unwrap();
        assert_eq!(channel.timestamps, vec![t[0], t[2], t[3], t[5], t[6]]);
        assert_eq!(channel.data.len(), 5 * 3);
        assert!(channel.validate().is_ok());
    }

    #[test]
    fn continuity_removes_sign_flips() {
        let q = Quat::from_rotation_y(0.3);
        let mut samples = vec![q, -q, q, -q];
        make_quaternions_continuous(&mut samples);
        assert!(samples.iter().all(|s| *s == q));
        assert!(samples.windows(2).all(|w| w[0].dot(w[1]) >= 0.0));
    }
}
