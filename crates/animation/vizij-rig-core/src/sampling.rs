//! Frame-space sampling of dense clips.
//!
//! Model:
//! - `time * sample_rate` is clamped to `[0, duration * sample_rate]`.
//! - Rows are one frame apart except for the short interval of a
//!   partial-duration clip, which sits last or first per
//!   [`Clip::partial_frame`]. Inside it the fraction is rescaled so `t` still
//!   runs from 0 to 1 between the two rows.
//! - Translation/scale/float lerp, rotation nlerp/slerp, int holds `f0`
//!   (or `f1` once `t` is within [`FRAME_EPSILON`] of it).

use crate::binding::ChannelKind;
use crate::clip::{Clip, PartialFrame, FRAME_EPSILON};
use crate::config::RotationInterp;
use crate::error::{Result, RigError};
use crate::interp::functions::{lerp_into, nlerp_quat, slerp_quat};

/// Two neighbouring rows and the blend fraction between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FramePosition {
    pub f0: usize,
    pub f1: usize,
    pub t: f32,
}

impl FramePosition {
    /// Exactly on row `frame`.
    pub fn at_row(frame: usize) -> Self {
        Self {
            f0: frame,
            f1: frame,
            t: 0.0,
        }
    }
}

/// Map a clip-local time (seconds) to rows. Out-of-range time is clamped.
///
/// NaN is rejected; infinities clamp to the edges.
pub fn frame_position(clip: &Clip, time: f32) -> Result<FramePosition> {
    if time.is_nan() {
        return Err(RigError::InvalidClip {
            clip: clip.name().to_string(),
            reason: "evaluation time is NaN".to_string(),
        });
    }
    let frames = clip.frame_count() as usize;
    if frames == 0 {
        return Ok(FramePosition::at_row(0));
    }
    let rate = clip.sample_rate();
    let end = clip.duration() * rate;
    let pos = (time * rate).clamp(0.0, end);
    let span = clip.partial_span();

    Ok(match clip.partial_frame() {
        PartialFrame::Last => whole_frames(pos, 0, frames, end - (frames - 1) as f32),
        PartialFrame::First if pos < span => interval(0, pos, span),
        PartialFrame::First => whole_frames(pos - span, 1, frames, 1.0),
    })
}

/// Position `offset` frames past row `first`, rows one frame apart except the
/// final interval, which spans `last_span` frames.
fn whole_frames(offset: f32, first: usize, frames: usize, last_span: f32) -> FramePosition {
    let whole = offset.floor();
    let f0 = first + whole as usize;
    if f0 >= frames {
        return FramePosition::at_row(frames);
    }
    let span = if f0 + 1 == frames { last_span } else { 1.0 };
    interval(f0, offset - whole, span)
}

fn interval(f0: usize, into: f32, span: f32) -> FramePosition {
    if into <= 0.0 || span <= 0.0 {
        return FramePosition::at_row(f0);
    }
    FramePosition {
        f0,
        f1: f0 + 1,
        t: (into / span).clamp(0.0, 1.0),
    }
}

impl Clip {
    /// Rows and fraction for `time`; see [`frame_position`].
    pub fn frame_position(&self, time: f32) -> Result<FramePosition> {
        frame_position(self, time)
    }
}

/// Sample one clip channel into `out` (`kind.curves()` values).
///
/// Index bounds are the caller's contract: `channel < clip.bindings().count(kind)`.
pub fn sample_channel(
    clip: &Clip,
    kind: ChannelKind,
    channel: usize,
    pos: FramePosition,
    rotation: RotationInterp,
    out: &mut [f32],
) {
    let n = kind.curves();
    let width = clip.curve_count();
    let start = clip.bindings().curve_offset(kind) + channel * n;
    let samples = clip.samples();
    let a = &samples[pos.f0 * width + start..pos.f0 * width + start + n];
    if pos.f0 == pos.f1 || pos.t == 0.0 {
        out[..n].copy_from_slice(a);
        return;
    }
    let b = &samples[pos.f1 * width + start..pos.f1 * width + start + n];
    if kind == ChannelKind::Int {
        let held = if pos.t >= 1.0 - FRAME_EPSILON { b } else { a };
        out[..n].copy_from_slice(held);
        return;
    }
    match kind {
        ChannelKind::Rotation => {
            let qa = [a[0], a[1], a[2], a[3]];
            let qb = [b[0], b[1], b[2], b[3]];
            let q = match rotation {
                RotationInterp::Nlerp => nlerp_quat(qa, qb, pos.t),
                RotationInterp::Slerp => slerp_quat(qa, qb, pos.t),
            };
            out[..4].copy_from_slice(&q);
        }
        _ => lerp_into(a, b, pos.t, &mut out[..n]),
    }
}

/// Sample every channel of a clip into a flat row (the clip's own layout).
pub fn sample_row(
    clip: &Clip,
    pos: FramePosition,
    rotation: RotationInterp,
    out: &mut [f32],
) {
    for kind in ChannelKind::ALL {
        let base = clip.bindings().curve_offset(kind);
        let n = kind.curves();
        for ch in 0..clip.bindings().count(kind) {
            let dst = base + ch * n;
            sample_channel(clip, kind, ch, pos, rotation, &mut out[dst..dst + n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipBuilder;

    fn ramp(frames: u32, rate: f32) -> Clip {
        let values: Vec<f32> = (0..=frames).map(|f| f as f32).collect();
        let mut b = ClipBuilder::new("ramp", rate, frames);
        b.add_float("x", &values).add_int("i", &(0..=frames as i32).collect::<Vec<_>>());
        b.build().expect("clip")
    }

    #[test]
    fn clamps_before_start_and_after_end() {
        let clip = ramp(4, 2.0);
        assert_eq!(frame_position(&clip, -1.0).expect("pos"), FramePosition::at_row(0));
        assert_eq!(frame_position(&clip, 0.0).expect("pos"), FramePosition::at_row(0));
        assert_eq!(frame_position(&clip, 99.0).expect("pos"), FramePosition::at_row(4));
        assert_eq!(
            frame_position(&clip, f32::INFINITY).expect("pos"),
            FramePosition::at_row(4)
        );
        assert!(frame_position(&clip, f32::NAN).is_err());
    }

    #[test]
    fn interior_fraction() {
        let clip = ramp(4, 2.0);
        let p = frame_position(&clip, 0.75).expect("pos");
        assert_eq!((p.f0, p.f1), (1, 2));
        assert!((p.t - 0.5).abs() < 1e-6);
    }

    #[test]
    fn float_lerps_int_holds() {
        let clip = ramp(4, 2.0);
        let p = frame_position(&clip, 0.9).expect("pos");
        let mut f = [0.0];
        sample_channel(&clip, ChannelKind::Float, 0, p, RotationInterp::Nlerp, &mut f);
        assert!((f[0] - 1.8).abs() < 1e-5);
        let mut i = [0.0];
        sample_channel(&clip, ChannelKind::Int, 0, p, RotationInterp::Nlerp, &mut i);
        assert_eq!(i[0], 1.0);
    }

    #[test]
    fn partial_last_interval_is_rescaled() {
        // 0.25s at 10Hz: rows at 0, 0.1, 0.2 and 0.25.
        let mut b = ClipBuilder::with_duration("partial", 10.0, 0.25);
        b.add_float("x", &[0.0, 1.0, 2.0, 4.0]);
        let clip = b.build().expect("clip");
        let p = frame_position(&clip, 0.225).expect("pos");
        assert_eq!((p.f0, p.f1), (2, 3));
        assert!((p.t - 0.5).abs() < 1e-4, "{p:?}");
        let mut out = [0.0];
        sample_channel(&clip, ChannelKind::Float, 0, p, RotationInterp::Nlerp, &mut out);
        assert!((out[0] - 3.0).abs() < 1e-3);
        let end = frame_position(&clip, 0.25).expect("end");
        sample_channel(&clip, ChannelKind::Float, 0, end, RotationInterp::Nlerp, &mut out);
        assert!((out[0] - 4.0).abs() < 1e-4);
    }

    #[test]
    fn leading_partial_interval_is_rescaled() {
        // Rows at 0, 0.05, 0.15 and 0.25.
        let mut b = ClipBuilder::with_duration("lead", 10.0, 0.25);
        b.add_float("x", &[0.0, 1.0, 2.0, 4.0])
            .partial_frame(PartialFrame::First);
        let clip = b.build().expect("clip");
        let p = frame_position(&clip, 0.025).expect("pos");
        assert_eq!((p.f0, p.f1), (0, 1));
        assert!((p.t - 0.5).abs() < 1e-4, "{p:?}");
        let p = frame_position(&clip, 0.2).expect("pos");
        assert_eq!((p.f0, p.f1), (2, 3));
        assert!((p.t - 0.5).abs() < 1e-4, "{p:?}");
        let mut out = [0.0];
        sample_channel(&clip, ChannelKind::Float, 0, p, RotationInterp::Nlerp, &mut out);
        assert!((out[0] - 3.0).abs() < 1e-3);
        assert_eq!(frame_position(&clip, 0.25).expect("end"), FramePosition::at_row(3));
    }

    #[test]
    fn int_snaps_forward_at_row_boundary() {
        let clip = ramp(4, 2.0);
        let p = FramePosition {
            f0: 1,
            f1: 2,
            t: 1.0 - 1e-6,
        };
        let mut i = [0.0];
        sample_channel(&clip, ChannelKind::Int, 0, p, RotationInterp::Nlerp, &mut i);
        assert_eq!(i[0], 2.0);
    }

    #[test]
    fn single_row_clip() {
        let mut b = ClipBuilder::new("pose", 30.0, 0);
        b.add_float("x", &[7.0]);
        let clip = b.build().expect("clip");
        let p = frame_position(&clip, 3.0).expect("pos");
        assert_eq!(p, FramePosition::at_row(0));
        let mut row = vec![0.0; clip.curve_count()];
        sample_row(&clip, p, RotationInterp::Nlerp, &mut row);
        assert_eq!(row, vec![7.0]);
    }
}
