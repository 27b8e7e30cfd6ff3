//! Animation stacks resampled to fixed-rate keyframes
//!
//! FBX curves are evaluated per transform component at `sample_rate`, the
//! local transform of every animated joint is rebuilt at each sample, and
//! each of translation, rotation and scale is reduced independently.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use super::import::FbxImport;
use super::scene::{AnimStack, AnimatedProperty, CurveNode, KTIME_PER_SECOND, Model, Scene};
use crate::RawMesh;
use crate::keyframes::{make_quaternions_continuous, reduce_channel};
use crate::model::{Animation, ChannelType};
use crate::report::ImportLog;

/// Curve nodes driving one joint
#[derive(Default)]
struct JointCurves<'a> {
    translation: Option<&'a CurveNode>,
    rotation: Option<&'a CurveNode>,
    scaling: Option<&'a CurveNode>,
}

/// Sample times of a clip in KTime, plus the matching seconds
struct Sampling {
    ticks: Vec<i64>,
    seconds: Vec<f32>,
}

impl Sampling {
    /// Uniform samples covering `[start, stop]` at no less than `rate` Hz
    /// unless capped by `max_samples`
    fn new(start: i64, stop: i64, rate: f32, max_samples: usize) -> Self {
        let duration = (stop - start).max(0) as f64 / KTIME_PER_SECOND;
        let wanted = (duration * f64::from(rate)).ceil() as usize + 1;
        let count = wanted.clamp(1, max_samples.max(1));
        let step = if count > 1 { duration / (count - 1) as f64 } else { 0.0 };

        let seconds: Vec<f64> = (0..count).map(|i| i as f64 * step).collect();
        Self {
            ticks: seconds
                .iter()
                .map(|s| start + (s * KTIME_PER_SECOND).round() as i64)
                .collect(),
            seconds: seconds.into_iter().map(|s| s as f32).collect(),
        }
    }
}

/// Component `axis` of a curve node at `time`, falling back to the node
/// default and then to the static value
fn component(scene: &Scene, node: Option<&CurveNode>, axis: usize, time: i64, fallback: f32) -> f32 {
    let Some(node) = node else {
        return fallback;
    };
    node.curves[axis]
        .and_then(|id| scene.curves.get(&id))
        .and_then(|curve| curve.evaluate(time))
        .unwrap_or(node.defaults[axis])
}

fn vector(scene: &Scene, node: Option<&CurveNode>, time: i64, fallback: Vec3) -> Vec3 {
    Vec3::new(
        component(scene, node, 0, time, fallback.x),
        component(scene, node, 1, time, fallback.y),
        component(scene, node, 2, time, fallback.z),
    )
}

/// Key range over every curve the joints use
fn curve_range(scene: &Scene, joints: &BTreeMap<usize, (&Model, JointCurves)>) -> Option<(i64, i64)> {
    joints
        .values()
        .flat_map(|(_, c)| [c.translation, c.rotation, c.scaling])
        .flatten()
        .flat_map(|node| node.curves.iter().flatten())
        .filter_map(|id| scene.curves.get(id)?.time_range())
        .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
}

pub(super) fn load_animations(import: &FbxImport, mesh: &mut RawMesh, log: &mut ImportLog) {
    let scene = import.scene;
    if scene.stacks.is_empty() {
        tracing::debug!("no animation stacks");
        return;
    }
    let limit = if import.flags.single_animation() { 1 } else { usize::MAX };

    for stack in scene.stacks.iter().take(limit) {
        match load_stack(import, stack, mesh) {
            Ok(animation) if animation.channels.is_empty() => {
                log.warn(format!("animation '{}' does not move any joint, skipped", stack.name));
            }
            Ok(animation) => {
                tracing::debug!(
                    "animation '{}': {} channels, {:.2}s",
                    animation.name,
                    animation.channels.len(),
                    animation.duration()
                );
                mesh.animations.push(animation);
            }
            Err(reason) => log.warn(format!("animation '{}': {reason}, skipped", stack.name)),
        }
    }
}

fn load_stack(import: &FbxImport, stack: &AnimStack, mesh: &RawMesh) -> Result<Animation, String> {
    let scene = import.scene;
    let layer = stack
        .layers
        .first()
        .and_then(|id| scene.layers.get(id))
        .ok_or("no animation layer")?;
    if stack.layers.len() > 1 {
        tracing::debug!(
            "animation '{}': {} layers, only the first is imported",
            stack.name,
            stack.layers.len()
        );
    }

    let mut joints: BTreeMap<usize, (&Model, JointCurves)> = BTreeMap::new();
    for node in layer.curve_nodes.iter().filter_map(|id| scene.curve_nodes.get(id)) {
        let Some((model_id, property)) = node.target else {
            continue;
        };
        let (Some(&joint), Some(model)) =
            (import.model_joints.get(&model_id), scene.model(model_id))
        else {
            continue;
        };
        let (_, curves) = joints.entry(joint).or_insert_with(|| (model, JointCurves::default()));
        match property {
            AnimatedProperty::Translation => curves.translation = Some(node),
            AnimatedProperty::Rotation => curves.rotation = Some(node),
            AnimatedProperty::Scaling => curves.scaling = Some(node),
        }
    }

    let (start, stop) = if stack.stop > stack.start {
        (stack.start, stack.stop)
    } else {
        curve_range(scene, &joints).unwrap_or((stack.start, stack.start))
    };
    let sampling = Sampling::new(
        start,
        stop,
        import.settings.sample_rate,
        import.settings.max_samples,
    );

    let mut animation = Animation {
        name: stack.name.clone(),
        channels: Vec::new(),
    };
    for (&joint_index, (model, curves)) in &joints {
        let Some(rest) = mesh.skeleton.joints.get(joint_index) else {
            continue;
        };

        let mut translations = Vec::with_capacity(sampling.ticks.len() * 3);
        let mut rotations = Vec::with_capacity(sampling.ticks.len());
        let mut scales = Vec::with_capacity(sampling.ticks.len() * 3);
        for &time in &sampling.ticks {
            translations.extend_from_slice(
                &vector(scene, curves.translation, time, model.translation).to_array(),
            );
            let euler = vector(scene, curves.rotation, time, model.rotation);
            rotations.push(model.rotation_quat(euler));
            scales.extend_from_slice(&vector(scene, curves.scaling, time, model.scaling).to_array());
        }

        // start on the rest hemisphere so a constant clip compares cleanly
        if let Some(first) = rotations.first_mut() {
            if first.dot(rest.rotation) < 0.0 {
                *first = -*first;
            }
        }
        make_quaternions_continuous(&mut rotations);
        let rotations: Vec<f32> = rotations.iter().flat_map(|q: &Quat| q.to_array()).collect();

        let streams = [
            (ChannelType::Translation, translations, rest.position.to_array().to_vec()),
            (ChannelType::Rotation, rotations, rest.rotation.to_array().to_vec()),
            (ChannelType::Scale, scales, rest.scale.to_array().to_vec()),
        ];
        for (kind, samples, rest_value) in streams {
            if let Some(channel) =
                reduce_channel(kind, joint_index, &sampling.seconds, &samples, &rest_value)
            {
                animation.channels.push(channel);
            }
        }
    }
    Ok(animation)
}
