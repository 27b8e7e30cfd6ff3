//! Animation pass: keyframes are copied verbatim, without resampling

use ::gltf::accessor::Dimensions;
use ::gltf::animation::{Interpolation as GltfInterpolation, Property};

use super::{ImportContext, accessor};
use crate::RawMesh;
use crate::model::{Animation, Channel, ChannelType, Interpolation};
use crate::report::ImportLog;

pub(super) fn load_animations(
    ctx: &ImportContext,
    document: &::gltf::Document,
    mesh: &mut RawMesh,
    log: &mut ImportLog,
) {
    let limit = if ctx.flags.single_animation() { 1 } else { usize::MAX };

    for clip in document.animations().take(limit) {
        let name = clip
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation_{}", clip.index()));

        let mut channels = Vec::new();
        for (i, channel) in clip.channels().enumerate() {
            match read_channel(ctx, &channel) {
                Ok(channel) => channels.push(channel),
                Err(reason) => log.warn(format!("animation '{name}' channel {i}: {reason}, skipped")),
            }
        }

        if channels.is_empty() {
            log.warn(format!("animation '{name}' has no usable channels, skipped"));
            continue;
        }
        tracing::debug!("animation '{name}': {} channels", channels.len());
        mesh.animations.push(Animation { name, channels });
    }
}

fn read_channel(ctx: &ImportContext, channel: &::gltf::animation::Channel) -> Result<Channel, String> {
    let target = channel.target();
    let node = target.node();
    let joint_index = ctx
        .joint_of(&node)
        .ok_or_else(|| format!("target node {} is not a skeleton joint", node.index()))?;

    let (kind, dimensions) = match target.property() {
        Property::Translation => (ChannelType::Translation, Dimensions::Vec3),
        Property::Rotation => (ChannelType::Rotation, Dimensions::Vec4),
        Property::Scale => (ChannelType::Scale, Dimensions::Vec3),
        Property::MorphTargetWeights => (ChannelType::Weights, Dimensions::Scalar),
    };

    let sampler = channel.sampler();
    let interpolation = match sampler.interpolation() {
        GltfInterpolation::Linear => Interpolation::Linear,
        GltfInterpolation::Step => Interpolation::Step,
        GltfInterpolation::CubicSpline => Interpolation::CubicSpline,
    };

    let input = sampler.input();
    let output = sampler.output();
    if input.sparse().is_some() || output.sparse().is_some() {
        return Err("sparse accessors are not supported".to_string());
    }
    if input.dimensions() != Dimensions::Scalar {
        return Err(format!("input must be scalar, found {:?}", input.dimensions()));
    }
    if output.dimensions() != dimensions {
        return Err(format!(
            "{kind:?} output must be {dimensions:?}, found {:?}",
            output.dimensions()
        ));
    }

    let keys = input.count();
    if keys == 0 {
        return Err("no keyframes".to_string());
    }
    let per_key = if interpolation == Interpolation::CubicSpline { 3 } else { 1 };
    let expected = keys
        .checked_mul(per_key)
        .ok_or_else(|| format!("{keys} keyframes overflow"))?;
    let count_ok = if kind == ChannelType::Weights {
        // one scalar per morph target per key
        output.count() >= expected && output.count() % expected == 0
    } else {
        output.count() == expected
    };
    if !count_ok {
        return Err(format!(
            "output has {} values for {keys} keyframes ({interpolation:?})",
            output.count()
        ));
    }

    let timestamps = accessor::read_floats(&input, ctx.buffers)?;
    let data = accessor::read_floats(&output, ctx.buffers)?;

    let channel = Channel {
        kind,
        interpolation,
        joint_index,
        timestamps,
        data,
    };
    channel.validate()?;
    Ok(channel)
}
