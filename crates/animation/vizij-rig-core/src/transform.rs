//! Clip transformations producing new immutable clips.
//!
//! Every result is built through [`Clip::from_parts`], so it is validated and
//! carries its own content hash.

use crate::binding::{intersect, BindingSet, ChannelKind};
use crate::clip::{Clip, PartialFrame, SyncTag};
use crate::error::Result;
use crate::hash::StringHash;

/// Deep copy under a new name. Content hash is unchanged.
pub fn clone_clip(clip: &Clip, name: impl Into<String>) -> Clip {
    clip.renamed(name)
}

/// Single-row clip holding row `frame` of `clip`, clamped to `[0, frame_count]`.
///
/// The pose has zero duration, keeps the sample rate and drops sync tags.
pub fn create_pose(clip: &Clip, frame: u32) -> Result<Clip> {
    let row = frame.min(clip.frame_count()) as usize;
    log::debug!("extracting pose at row {} from clip '{}'", row, clip.name());
    Clip::from_parts(
        format!("{}@{}", clip.name(), row),
        clip.bindings().clone(),
        0,
        clip.sample_rate(),
        0.0,
        PartialFrame::Last,
        clip.row(row).to_vec(),
        Vec::new(),
    )
}

/// Time-reversed copy: evaluating the result at `t` matches the source at
/// `duration - t`.
///
/// Rows are reindexed last-to-first and the short interval of a
/// partial-duration clip moves to the other end, so no sample is resampled.
/// Int channels hold the lower row, so they match the source at row times.
/// Sync tag times are mirrored to `1 - t`.
pub fn reverse(clip: &Clip) -> Result<Clip> {
    let frames = clip.frame_count() as usize;
    let rows = clip.row_count();

    let mut samples = Vec::with_capacity(rows * clip.curve_count());
    for k in 0..rows {
        samples.extend_from_slice(clip.row(frames - k));
    }

    let mut tags: Vec<SyncTag> = clip
        .sync_tags()
        .iter()
        .map(|t| SyncTag {
            normalized_time: 1.0 - t.normalized_time,
            ..*t
        })
        .collect();
    tags.sort_by(|a, b| a.normalized_time.total_cmp(&b.normalized_time));

    let reversed = Clip::from_parts(
        clip.name(),
        clip.bindings().clone(),
        clip.frame_count(),
        clip.sample_rate(),
        clip.duration(),
        clip.partial_frame().flipped(),
        samples,
        tags,
    )?;
    log::debug!(
        "reversed clip '{}' ({} rows, short interval {:?})",
        clip.name(),
        rows,
        reversed.partial_frame()
    );
    Ok(reversed)
}

/// Keep only the channels also present in `keep`, repacking samples.
///
/// Timing and sync tags are preserved. Filtering twice with the same set
/// yields the same clip.
pub fn filter_bindings(clip: &Clip, keep: &BindingSet) -> Result<Clip> {
    let source = clip.bindings();
    let mut kinds: [Vec<StringHash>; 5] = Default::default();
    // (source curve offset, curve count) for every kept channel, in layout order.
    let mut spans = Vec::new();
    for (slot, kind) in ChannelKind::ALL.into_iter().enumerate() {
        let n = kind.curves();
        let base = source.curve_offset(kind);
        for (c, _) in intersect(source.get(kind), keep.get(kind)) {
            kinds[slot].push(source.get(kind)[c]);
            spans.push((base + c * n, n));
        }
    }
    let bindings = BindingSet::from_sorted(clip.name(), kinds)?;

    let width = bindings.curve_count();
    let mut samples = Vec::with_capacity(clip.row_count() * width);
    for frame in 0..clip.row_count() {
        let row = clip.row(frame);
        for &(start, n) in &spans {
            samples.extend_from_slice(&row[start..start + n]);
        }
    }
    log::debug!(
        "filtered clip '{}': {} of {} channels kept",
        clip.name(),
        bindings.channel_count(),
        source.channel_count()
    );
    Clip::from_parts(
        clip.name(),
        bindings,
        clip.frame_count(),
        clip.sample_rate(),
        clip.duration(),
        clip.partial_frame(),
        samples,
        clip.sync_tags().to_vec(),
    )
}
