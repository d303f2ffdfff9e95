use serde::Deserialize;

use crate::binding::ChannelKind;
use crate::clip::{frame_count_for, Clip, ClipBuilder, PartialFrame};
use crate::error::{Result, RigError};
use crate::rig::{RigBuilder, RigDefinition, ROOT_PARENT};
use glam::{Quat, Vec3};

/// Public API: parse a JSON rig descriptor (see fixtures/rigs/*.json) into a
/// frozen [`RigDefinition`].
///
/// Notes:
/// - Nodes are listed parent-first; `parent` defaults to -1 (root).
/// - Node transforms default to identity; rotations are `[x, y, z, w]`.
/// - Custom channels carry an optional `default` shaped like one sample of
///   their kind (number for float/int, array for vector kinds).
pub fn parse_rig_json(s: &str) -> Result<RigDefinition> {
    let doc: RigDoc =
        serde_json::from_str(s).map_err(|e| RigError::Json(format!("rig parse error: {e}")))?;

    let mut builder = RigBuilder::new(doc.name.clone());
    for n in &doc.nodes {
        builder.add_node_trs(
            &n.name,
            n.parent,
            Vec3::from_array(n.translation),
            Quat::from_array(n.rotation),
            Vec3::from_array(n.scale),
        );
        if let Some(axis) = n.axis {
            builder.with_axis(axis);
        }
    }
    for c in &doc.channels {
        let what = || format!("rig '{}' channel '{}'", doc.name, c.name);
        match c.kind {
            ChannelKind::Translation => {
                let v = vector_default(c.default.as_ref(), [0.0; 4], c.kind, &what)?;
                builder.add_translation(&c.name, Vec3::new(v[0], v[1], v[2]));
            }
            ChannelKind::Rotation => {
                let v = vector_default(c.default.as_ref(), [0.0, 0.0, 0.0, 1.0], c.kind, &what)?;
                builder.add_rotation(&c.name, Quat::from_array(v));
            }
            ChannelKind::Scale => {
                let v = vector_default(c.default.as_ref(), [1.0; 4], c.kind, &what)?;
                builder.add_scale(&c.name, Vec3::new(v[0], v[1], v[2]));
            }
            ChannelKind::Float => {
                let v = vector_default(c.default.as_ref(), [0.0; 4], c.kind, &what)?;
                builder.add_float(&c.name, v[0]);
            }
            ChannelKind::Int => {
                let v = vector_default(c.default.as_ref(), [0.0; 4], c.kind, &what)?;
                builder.add_int(&c.name, v[0] as i32);
            }
        }
    }
    builder.build()
}

/// Public API: parse a JSON clip descriptor (see fixtures/clips/*.json) into a
/// dense [`Clip`].
///
/// Notes:
/// - Length is given as `frameCount` (whole frames) or `duration` (seconds,
///   last interval may be partial); when both are present they must agree.
/// - `partialFrame` (`"last"` or `"first"`, default last) places the short
///   interval of a partial-duration clip.
/// - Each channel lists one sample per row, i.e. `frameCount + 1` entries.
/// - Sync tag `time` is normalized to [0, 1]; `type` is a name, hashed.
pub fn parse_clip_json(s: &str) -> Result<Clip> {
    let doc: ClipDoc =
        serde_json::from_str(s).map_err(|e| RigError::Json(format!("clip parse error: {e}")))?;

    let mut builder = match (doc.frame_count, doc.duration) {
        (Some(frames), None) => ClipBuilder::new(doc.name.clone(), doc.sample_rate, frames),
        (None, Some(duration)) => ClipBuilder::with_duration(doc.name.clone(), doc.sample_rate, duration),
        (Some(frames), Some(duration)) => {
            let expected = frame_count_for(duration, doc.sample_rate);
            if expected != frames {
                return Err(RigError::InvalidClip {
                    clip: doc.name,
                    reason: format!(
                        "frameCount {frames} disagrees with duration {duration}s (expected {expected})"
                    ),
                });
            }
            ClipBuilder::with_duration(doc.name.clone(), doc.sample_rate, duration)
        }
        (None, None) => {
            return Err(RigError::InvalidClip {
                clip: doc.name,
                reason: "one of frameCount or duration is required".to_string(),
            })
        }
    };

    builder.partial_frame(doc.partial_frame);

    for c in &doc.channels {
        let n = c.kind.curves();
        let mut flat = Vec::with_capacity(c.samples.len() * n);
        for (row, sample) in c.samples.iter().enumerate() {
            let values = sample.values();
            if values.len() != n {
                return Err(RigError::InvalidClip {
                    clip: doc.name.clone(),
                    reason: format!(
                        "{} channel '{}' row {row} has {} components, expected {n}",
                        c.kind,
                        c.name,
                        values.len()
                    ),
                });
            }
            flat.extend(values.iter().map(|v| *v as f32));
        }
        builder.add_raw(c.kind, &c.name, flat);
    }
    for t in &doc.sync_tags {
        builder.add_sync_tag(t.time, &t.tag_type, t.state);
    }
    builder.build()
}

fn vector_default(
    raw: Option<&RawSample>,
    fallback: [f32; 4],
    kind: ChannelKind,
    what: &dyn Fn() -> String,
) -> Result<[f32; 4]> {
    let Some(raw) = raw else {
        return Ok(fallback);
    };
    let values = raw.values();
    if values.len() != kind.curves() {
        return Err(RigError::Json(format!(
            "{}: default has {} components, {kind} needs {}",
            what(),
            values.len(),
            kind.curves()
        )));
    }
    let mut out = fallback;
    for (dst, src) in out.iter_mut().zip(values.iter()) {
        *dst = *src as f32;
    }
    Ok(out)
}

// ----- JSON schema (serde) -----

#[derive(Debug, Deserialize)]
struct RigDoc {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub channels: Vec<ChannelDoc>,
}

fn root_parent() -> i32 {
    ROOT_PARENT
}

fn zero3() -> [f32; 3] {
    [0.0; 3]
}

fn one3() -> [f32; 3] {
    [1.0; 3]
}

fn identity4() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

#[derive(Debug, Deserialize)]
struct NodeDoc {
    pub name: String,
    #[serde(default = "root_parent")]
    pub parent: i32,
    #[serde(default = "zero3")]
    pub translation: [f32; 3],
    #[serde(default = "identity4")]
    pub rotation: [f32; 4],
    #[serde(default = "one3")]
    pub scale: [f32; 3],
    pub axis: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ChannelDoc {
    pub kind: ChannelKind,
    pub name: String,
    pub default: Option<RawSample>,
}

#[derive(Debug, Deserialize)]
struct ClipDoc {
    pub name: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: f32,
    #[serde(rename = "frameCount")]
    pub frame_count: Option<u32>,
    pub duration: Option<f32>,
    #[serde(default, rename = "partialFrame")]
    pub partial_frame: PartialFrame,
    #[serde(default)]
    pub channels: Vec<ClipChannelDoc>,
    #[serde(default, rename = "syncTags")]
    pub sync_tags: Vec<SyncTagDoc>,
}

#[derive(Debug, Deserialize)]
struct ClipChannelDoc {
    pub kind: ChannelKind,
    pub name: String,
    pub samples: Vec<RawSample>,
}

#[derive(Debug, Deserialize)]
struct SyncTagDoc {
    pub time: f32,
    #[serde(rename = "type")]
    pub tag_type: String,
    pub state: i32,
}

/// One sample: a bare number for scalar kinds, an array for vector kinds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSample {
    Number(f64),
    Vector(Vec<f64>),
}

impl RawSample {
    fn values(&self) -> &[f64] {
        match self {
            RawSample::Number(n) => std::slice::from_ref(n),
            RawSample::Vector(v) => v,
        }
    }
}
