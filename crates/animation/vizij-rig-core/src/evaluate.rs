//! Clip evaluation into an animation stream.
//!
//! For every bound channel the clip is sampled at `time` (see
//! [`crate::sampling`]) and written to the mapped rig channel, either
//! replacing the stream value or added on top of it. Channels the clip does
//! not bind are left untouched. The stream's write mask, when present,
//! records every channel written.

use crate::binding::ChannelKind;
use crate::config::EvaluationOptions;
use crate::error::{Result, RigError};
use crate::instance::ClipInstance;
use crate::interp::functions::add_quat_weighted;
use crate::sampling::{frame_position, sample_channel};
use crate::stream::AnimationStream;

/// How sampled values combine with what is already in the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Blend {
    /// Replace the stream value.
    #[default]
    Overwrite,
    /// Add the weighted sample.
    ///
    /// Translation, scale and float add `weight * sample`; rotation becomes
    /// `current * nlerp(identity, sample, weight)`; int adds
    /// `round(weight * sample)`.
    Additive(f32),
}

/// Evaluate `instance` at `time` seconds into `stream` with default options.
pub fn evaluate(
    instance: &ClipInstance,
    time: f32,
    stream: &mut AnimationStream<'_>,
    blend: Blend,
) -> Result<()> {
    evaluate_with(&EvaluationOptions::default(), instance, time, stream, blend)
}

pub fn evaluate_with(
    options: &EvaluationOptions,
    instance: &ClipInstance,
    time: f32,
    stream: &mut AnimationStream<'_>,
    blend: Blend,
) -> Result<()> {
    let rig = stream.rig()?;
    if stream.is_read_only() {
        return Err(RigError::ReadOnlyStream {
            operation: "evaluate",
        });
    }
    if rig.content_hash() != instance.rig_hash() {
        return Err(RigError::RigMismatch {
            clip: instance.clip().name().to_string(),
            expected: instance.rig_hash(),
            actual: rig.content_hash(),
        });
    }
    if let Blend::Additive(weight) = blend {
        if !weight.is_finite() {
            return Err(RigError::NonFiniteWeight(weight));
        }
    }

    let clip = instance.clip();
    let pos = frame_position(clip, time)?;
    let rotation = options.rotation_interpolation;
    let mut sample = [0.0f32; 4];
    for kind in ChannelKind::ALL {
        let n = kind.curves();
        for (c, r) in instance.map(kind).pairs() {
            sample_channel(clip, kind, c, pos, rotation, &mut sample);
            if let Blend::Additive(weight) = blend {
                let current = stream.channel(kind, r)?;
                sample = additive(kind, current, &sample, weight);
            }
            stream.set_channel(kind, r, &sample[..n])?;
        }
    }
    Ok(())
}

fn additive(kind: ChannelKind, current: &[f32], sample: &[f32; 4], weight: f32) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    match kind {
        ChannelKind::Rotation => {
            let base = [current[0], current[1], current[2], current[3]];
            out = add_quat_weighted(base, *sample, weight);
        }
        ChannelKind::Int => {
            out[0] = current[0] + (weight * sample[0]).round();
        }
        _ => {
            for i in 0..kind.curves() {
                out[i] = current[i] + weight * sample[i];
            }
        }
    }
    out
}
