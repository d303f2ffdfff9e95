//! Dense animation clips.
//!
//! A clip is a binding set plus `row_count() == frame_count + 1` rows of
//! samples, each row laid out like a stream over the clip's own bindings.
//! Rows are one frame apart except for a single short interval when the
//! duration is not a whole number of frames. [`PartialFrame`] says whether
//! that interval closes the clip (authored clips) or opens it (reversed
//! clips); see [`Clip::row_time`].

use glam::{Quat, Vec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::binding::{BindingSet, BindingSetBuilder, ChannelKind};
use crate::error::{Result, RigError};
use crate::hash::{ContentHasher, StringHash};

/// Tolerance used when converting a duration into whole frame intervals.
pub const FRAME_EPSILON: f32 = 1e-4;

/// Number of frame intervals needed to cover `duration` at `sample_rate`.
///
/// `ceil(duration * sample_rate - FRAME_EPSILON)`: a duration that is a whole
/// number of frames up to float noise does not gain an extra partial frame.
pub fn frame_count_for(duration: f32, sample_rate: f32) -> u32 {
    let frames = duration * sample_rate - FRAME_EPSILON;
    if frames <= 0.0 {
        0
    } else {
        frames.ceil() as u32
    }
}

/// Placement of the short interval of a clip whose duration is not a whole
/// number of frames. Whole-frame clips always report `Last`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialFrame {
    #[default]
    Last,
    First,
}

impl PartialFrame {
    pub fn flipped(self) -> Self {
        match self {
            PartialFrame::Last => PartialFrame::First,
            PartialFrame::First => PartialFrame::Last,
        }
    }
}

/// Whether `duration` is `frame_count` whole frames, up to [`FRAME_EPSILON`].
pub fn is_frame_aligned(frame_count: u32, sample_rate: f32, duration: f32) -> bool {
    (frame_count as f32 / sample_rate - duration).abs() <= FRAME_EPSILON / sample_rate
}

/// Discrete state change at a normalized clip time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncTag {
    /// Normalized time in [0, 1].
    pub normalized_time: f32,
    pub tag_type: StringHash,
    pub state: i32,
}

/// Immutable dense clip.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    name: String,
    bindings: BindingSet,
    frame_count: u32,
    sample_rate: f32,
    duration: f32,
    partial_frame: PartialFrame,
    samples: Vec<f32>,
    sync_tags: Vec<SyncTag>,
    content_hash: u64,
}

impl Clip {
    /// Assemble and validate a clip from laid-out parts.
    ///
    /// `partial_frame` is normalized to `Last` when the duration is a whole
    /// number of frames.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        name: impl Into<String>,
        bindings: BindingSet,
        frame_count: u32,
        sample_rate: f32,
        duration: f32,
        partial_frame: PartialFrame,
        samples: Vec<f32>,
        sync_tags: Vec<SyncTag>,
    ) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| RigError::InvalidClip {
            clip: name.clone(),
            reason,
        };

        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(invalid(format!("sample rate must be > 0, got {sample_rate}")));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(invalid(format!("duration must be >= 0, got {duration}")));
        }
        let expected_frames = frame_count_for(duration, sample_rate);
        let whole = frame_count as f32 / sample_rate;
        let whole_match = (whole - duration).abs() <= f32::EPSILON * whole.max(1.0) * 4.0;
        if expected_frames != frame_count && !whole_match {
            return Err(invalid(format!(
                "frame count {frame_count} does not match duration {duration}s at {sample_rate}Hz (expected {expected_frames})"
            )));
        }
        let partial_frame = if is_frame_aligned(frame_count, sample_rate, duration) {
            PartialFrame::Last
        } else {
            partial_frame
        };
        let rows = frame_count as usize + 1;
        let width = bindings.curve_count();
        if samples.len() != rows * width {
            return Err(invalid(format!(
                "sample buffer has {} values, expected {rows} rows x {width} curves",
                samples.len()
            )));
        }
        if let Some(pos) = samples.iter().position(|v| !v.is_finite()) {
            return Err(invalid(format!(
                "sample {pos} (row {}) is not finite",
                pos / width.max(1)
            )));
        }
        let mut last = 0.0f32;
        for (i, tag) in sync_tags.iter().enumerate() {
            let t = tag.normalized_time;
            if !(0.0..=1.0).contains(&t) {
                return Err(invalid(format!("sync tag {i} time {t} outside [0, 1]")));
            }
            if t < last {
                return Err(invalid(format!("sync tag {i} is out of order")));
            }
            last = t;
        }

        let content_hash = clip_content_hash(
            &bindings,
            frame_count,
            sample_rate,
            duration,
            partial_frame,
            &samples,
            &sync_tags,
        );
        log::debug!(
            "clip '{}' ready: {} frames @ {}Hz, {} curves, hash {:#018x}",
            name,
            frame_count,
            sample_rate,
            width,
            content_hash
        );
        Ok(Self {
            name,
            bindings,
            frame_count,
            sample_rate,
            duration,
            partial_frame,
            samples,
            sync_tags,
            content_hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn row_count(&self) -> usize {
        self.frame_count as usize + 1
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn partial_frame(&self) -> PartialFrame {
        self.partial_frame
    }

    /// Length of the short interval in frames, `1.0` for whole-frame clips.
    pub(crate) fn partial_span(&self) -> f32 {
        if self.frame_count == 0 {
            return 0.0;
        }
        if is_frame_aligned(self.frame_count, self.sample_rate, self.duration) {
            return 1.0;
        }
        self.duration * self.sample_rate - (self.frame_count - 1) as f32
    }

    /// Clip-local time (seconds) of row `frame`, clamped to the last row.
    pub fn row_time(&self, frame: usize) -> f32 {
        let frames = self.frame_count as usize;
        if frame >= frames {
            return self.duration;
        }
        match self.partial_frame {
            PartialFrame::Last => frame as f32 / self.sample_rate,
            PartialFrame::First if frame == 0 => 0.0,
            PartialFrame::First => {
                (self.partial_span() + (frame - 1) as f32) / self.sample_rate
            }
        }
    }

    /// Curves per row.
    pub fn curve_count(&self) -> usize {
        self.bindings.curve_count()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// All curves of one row. `frame` must be `<= frame_count`.
    pub fn row(&self, frame: usize) -> &[f32] {
        let width = self.curve_count();
        &self.samples[frame * width..(frame + 1) * width]
    }

    /// Curves of one channel at one row.
    pub fn channel_sample(&self, kind: ChannelKind, channel: usize, frame: usize) -> Result<&[f32]> {
        let count = self.bindings.count(kind);
        if channel >= count {
            return Err(RigError::IndexOutOfRange {
                kind,
                index: channel,
                count,
            });
        }
        if frame > self.frame_count as usize {
            return Err(RigError::InvalidClip {
                clip: self.name.clone(),
                reason: format!("row {frame} past last frame {}", self.frame_count),
            });
        }
        let start = self.bindings.curve_offset(kind) + channel * kind.curves();
        Ok(&self.row(frame)[start..start + kind.curves()])
    }

    pub fn sync_tags(&self) -> &[SyncTag] {
        &self.sync_tags
    }

    /// Last tag of `tag_type` at or before `normalized_time`.
    pub fn active_sync_tag(&self, tag_type: StringHash, normalized_time: f32) -> Option<&SyncTag> {
        self.sync_tags
            .iter()
            .filter(|t| t.tag_type == tag_type && t.normalized_time <= normalized_time)
            .last()
    }

    /// Stable identity of layout + samples + tags (name excluded).
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// Same content under a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Clip {
        Clip {
            name: name.into(),
            ..self.clone()
        }
    }
}

fn clip_content_hash(
    bindings: &BindingSet,
    frame_count: u32,
    sample_rate: f32,
    duration: f32,
    partial_frame: PartialFrame,
    samples: &[f32],
    tags: &[SyncTag],
) -> u64 {
    let mut h = ContentHasher::new(b"CLIP");
    h.u32(frame_count)
        .f32(sample_rate)
        .f32(duration)
        .u32(partial_frame as u32);
    bindings.hash_into(&mut h);
    h.floats(samples);
    h.u32(tags.len() as u32);
    for t in tags {
        h.f32(t.normalized_time).u32(t.tag_type.0).i32(t.state);
    }
    h.finish()
}

#[derive(Clone, Debug)]
struct CurveDecl {
    name: String,
    kind: ChannelKind,
    /// Row-major curves for this channel only.
    values: Vec<f32>,
}

#[derive(Clone, Copy, Debug)]
enum Length {
    Frames(u32),
    Duration(f32),
}

/// Builds a dense [`Clip`] from per-channel sample arrays.
///
/// Each channel must supply exactly `row_count()` samples: one per frame plus
/// the final sample at the clip duration.
#[derive(Clone, Debug)]
pub struct ClipBuilder {
    name: String,
    sample_rate: f32,
    length: Length,
    partial_frame: PartialFrame,
    curves: Vec<CurveDecl>,
    tags: Vec<SyncTag>,
}

impl ClipBuilder {
    /// A clip of `frame_count` whole frames at `sample_rate`.
    pub fn new(name: impl Into<String>, sample_rate: f32, frame_count: u32) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            length: Length::Frames(frame_count),
            partial_frame: PartialFrame::Last,
            curves: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// A clip covering `duration` seconds; the last interval may be partial.
    pub fn with_duration(name: impl Into<String>, sample_rate: f32, duration: f32) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            length: Length::Duration(duration),
            partial_frame: PartialFrame::Last,
            curves: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Put the short interval of a partial-duration clip first or last.
    pub fn partial_frame(&mut self, placement: PartialFrame) -> &mut Self {
        self.partial_frame = placement;
        self
    }

    fn timing(&self) -> (u32, f32) {
        match self.length {
            Length::Frames(n) => (n, n as f32 / self.sample_rate),
            Length::Duration(d) => (frame_count_for(d, self.sample_rate), d),
        }
    }

    /// Samples each channel must provide.
    pub fn row_count(&self) -> usize {
        self.timing().0 as usize + 1
    }

    pub fn add_translation(&mut self, name: &str, values: &[Vec3]) -> &mut Self {
        let flat = values.iter().flat_map(|v| v.to_array()).collect();
        self.push(ChannelKind::Translation, name, flat)
    }

    pub fn add_rotation(&mut self, name: &str, values: &[Quat]) -> &mut Self {
        let flat = values.iter().flat_map(|q| q.to_array()).collect();
        self.push(ChannelKind::Rotation, name, flat)
    }

    pub fn add_scale(&mut self, name: &str, values: &[Vec3]) -> &mut Self {
        let flat = values.iter().flat_map(|v| v.to_array()).collect();
        self.push(ChannelKind::Scale, name, flat)
    }

    pub fn add_float(&mut self, name: &str, values: &[f32]) -> &mut Self {
        self.push(ChannelKind::Float, name, values.to_vec())
    }

    pub fn add_int(&mut self, name: &str, values: &[i32]) -> &mut Self {
        let flat = values.iter().map(|v| *v as f32).collect();
        self.push(ChannelKind::Int, name, flat)
    }

    /// Add a channel from raw row-major curves (`row_count() * kind.curves()` values).
    pub fn add_raw(&mut self, kind: ChannelKind, name: &str, values: Vec<f32>) -> &mut Self {
        self.push(kind, name, values)
    }

    pub fn add_sync_tag(&mut self, normalized_time: f32, tag_type: &str, state: i32) -> &mut Self {
        self.tags.push(SyncTag {
            normalized_time,
            tag_type: StringHash::new(tag_type),
            state,
        });
        self
    }

    fn push(&mut self, kind: ChannelKind, name: &str, values: Vec<f32>) -> &mut Self {
        self.curves.push(CurveDecl {
            name: name.to_string(),
            kind,
            values,
        });
        self
    }

    pub fn build(&self) -> Result<Clip> {
        let (frame_count, duration) = self.timing();
        let rows = frame_count as usize + 1;

        let mut set = BindingSetBuilder::new();
        let mut by_hash: HashMap<(ChannelKind, StringHash), &CurveDecl> = HashMap::new();
        for c in &self.curves {
            let expected = rows * c.kind.curves();
            if c.values.len() != expected {
                return Err(RigError::InvalidClip {
                    clip: self.name.clone(),
                    reason: format!(
                        "{} channel '{}' has {} values, expected {expected} ({rows} rows)",
                        c.kind,
                        c.name,
                        c.values.len()
                    ),
                });
            }
            let hash = StringHash::new(&c.name);
            set.push(c.kind, hash);
            by_hash.insert((c.kind, hash), c);
        }
        let bindings = set.build(&self.name)?;

        let width = bindings.curve_count();
        let mut samples = vec![0.0f32; rows * width];
        for kind in ChannelKind::ALL {
            let base = bindings.curve_offset(kind);
            let n = kind.curves();
            for (ch, hash) in bindings.get(kind).iter().enumerate() {
                let Some(decl) = by_hash.get(&(kind, *hash)) else {
                    continue;
                };
                for row in 0..rows {
                    let dst = row * width + base + ch * n;
                    samples[dst..dst + n].copy_from_slice(&decl.values[row * n..(row + 1) * n]);
                }
            }
        }

        let mut tags = self.tags.clone();
        tags.sort_by(|a, b| a.normalized_time.total_cmp(&b.normalized_time));

        Clip::from_parts(
            self.name.clone(),
            bindings,
            frame_count,
            self.sample_rate,
            duration,
            self.partial_frame,
            samples,
            tags,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_rounding_at_duration_edges() {
        assert_eq!(frame_count_for(1.0, 30.0), 30);
        // Float noise just above a whole frame does not add a partial frame.
        assert_eq!(frame_count_for(1.000_001, 30.0), 30);
        // A real remainder does.
        assert_eq!(frame_count_for(1.01, 30.0), 31);
        assert_eq!(frame_count_for(0.0, 30.0), 0);
        assert_eq!(frame_count_for(1.4, 1.0), 2);
    }

    #[test]
    fn builder_packs_rows_in_binding_order() {
        let mut b = ClipBuilder::new("two", 1.0, 1);
        b.add_float("b", &[10.0, 11.0]).add_float("a", &[20.0, 21.0]);
        let clip = b.build().expect("clip");
        assert_eq!(clip.row_count(), 2);
        let a = clip
            .bindings()
            .find(ChannelKind::Float, StringHash::new("a"))
            .expect("a");
        assert_eq!(clip.channel_sample(ChannelKind::Float, a, 1).expect("a1"), &[21.0]);
        assert_eq!(clip.duration(), 1.0);
    }

    #[test]
    fn builder_rejects_wrong_sample_count() {
        let mut b = ClipBuilder::new("short", 30.0, 2);
        b.add_translation("Hips", &[Vec3::ZERO, Vec3::ONE]);
        let err = b.build().unwrap_err();
        assert!(matches!(err, RigError::InvalidClip { .. }), "{err}");
    }

    #[test]
    fn rejects_bad_rate_and_non_finite() {
        assert!(ClipBuilder::new("zero", 0.0, 0).build().is_err());
        let mut b = ClipBuilder::new("nan", 1.0, 0);
        b.add_float("x", &[f32::NAN]);
        assert!(b.build().is_err());
    }

    #[test]
    fn partial_final_frame() {
        let mut b = ClipBuilder::with_duration("partial", 10.0, 0.25);
        assert_eq!(b.row_count(), 4);
        b.add_float("x", &[0.0, 1.0, 2.0, 2.5]);
        let clip = b.build().expect("clip");
        assert_eq!(clip.frame_count(), 3);
        assert!((clip.duration() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn row_times_follow_partial_placement() {
        let mut b = ClipBuilder::with_duration("partial", 10.0, 0.25);
        b.add_float("x", &[0.0, 1.0, 2.0, 3.0]);
        let last = b.build().expect("last");
        let first = b.partial_frame(PartialFrame::First).build().expect("first");
        let times = |c: &Clip| (0..c.row_count()).map(|k| c.row_time(k)).collect::<Vec<_>>();
        for (got, want) in times(&last).iter().zip([0.0, 0.1, 0.2, 0.25]) {
            assert!((got - want).abs() < 1e-6, "{:?}", times(&last));
        }
        for (got, want) in times(&first).iter().zip([0.0, 0.05, 0.15, 0.25]) {
            assert!((got - want).abs() < 1e-6, "{:?}", times(&first));
        }
        assert_ne!(last.content_hash(), first.content_hash());
    }

    #[test]
    fn whole_frame_clips_normalize_to_last() {
        let mut b = ClipBuilder::new("whole", 2.0, 2);
        b.add_float("x", &[0.0, 1.0, 2.0])
            .partial_frame(PartialFrame::First);
        let clip = b.build().expect("clip");
        assert_eq!(clip.partial_frame(), PartialFrame::Last);
        assert_eq!(clip.row_time(1), 0.5);
    }

    #[test]
    fn sync_tags_sorted_and_queried() {
        let mut b = ClipBuilder::new("tags", 1.0, 0);
        b.add_sync_tag(0.5, "foot", 1)
            .add_sync_tag(0.0, "foot", 0)
            .add_sync_tag(0.25, "hand", 7);
        let clip = b.build().expect("clip");
        let times: Vec<f32> = clip.sync_tags().iter().map(|t| t.normalized_time).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5]);
        let foot = StringHash::new("foot");
        assert_eq!(clip.active_sync_tag(foot, 0.4).map(|t| t.state), Some(0));
        assert_eq!(clip.active_sync_tag(foot, 0.9).map(|t| t.state), Some(1));
        assert!(clip.active_sync_tag(StringHash::new("none"), 1.0).is_none());
    }

    #[test]
    fn tag_outside_unit_range_is_rejected() {
        let mut b = ClipBuilder::new("tags", 1.0, 0);
        b.add_sync_tag(1.5, "foot", 1);
        assert!(b.build().is_err());
    }

    #[test]
    fn content_hash_ignores_name() {
        let mut b = ClipBuilder::new("a", 1.0, 0);
        b.add_float("x", &[1.0]);
        let clip = b.build().expect("clip");
        let renamed = clip.renamed("b");
        assert_eq!(clip.content_hash(), renamed.content_hash());
        assert_eq!(renamed.name(), "b");
    }
}
