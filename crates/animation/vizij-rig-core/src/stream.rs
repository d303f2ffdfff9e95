//! Animation streams: typed views over a caller-owned pose buffer.
//!
//! A stream never owns its buffer. The rig fixes the layout (see
//! [`crate::binding`]) and the buffer length must equal
//! `rig.curve_count()`. Streams come in two flavors sharing one type:
//! read-write (from `&mut [f32]`) and read-only (from `&[f32]`); mutators on
//! a read-only stream fail with [`RigError::ReadOnlyStream`].
//!
//! Check order on every accessor: null rig, read-only (mutators), index,
//! finiteness (mutators). A failed call leaves the buffer untouched.
//!
//! Local-to-root queries take a skeleton node index and walk the parent
//! chain on every call; nothing is memoized.

use glam::{Mat4, Quat, Vec3};

use crate::binding::ChannelKind;
use crate::error::{Result, RigError};
use crate::rig::RigDefinition;

/// Bit per rig channel (all kinds, layout order) recording writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelMask {
    bits: Vec<u64>,
    len: usize,
}

impl ChannelMask {
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn for_rig(rig: &RigDefinition) -> Self {
        Self::new(rig.channel_count())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Out-of-range bits read as unset.
    pub fn get(&self, bit: usize) -> bool {
        bit < self.len && self.bits[bit / 64] & (1u64 << (bit % 64)) != 0
    }

    /// Out-of-range bits are ignored.
    pub fn set(&mut self, bit: usize, value: bool) {
        if bit >= self.len {
            return;
        }
        let word = &mut self.bits[bit / 64];
        if value {
            *word |= 1u64 << (bit % 64);
        } else {
            *word &= !(1u64 << (bit % 64));
        }
    }

    pub fn fill(&mut self, value: bool) {
        let word = if value { u64::MAX } else { 0 };
        for w in self.bits.iter_mut() {
            *w = word;
        }
        // Keep bits past `len` clear.
        let tail = self.len % 64;
        if value && tail != 0 {
            if let Some(last) = self.bits.last_mut() {
                *last = (1u64 << tail) - 1;
            }
        }
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[derive(Debug)]
enum Buffer<'a> {
    ReadOnly(&'a [f32]),
    ReadWrite(&'a mut [f32]),
}

impl Buffer<'_> {
    fn as_slice(&self) -> &[f32] {
        match self {
            Buffer::ReadOnly(b) => b,
            Buffer::ReadWrite(b) => b,
        }
    }
}

/// View over a pose buffer laid out by a rig.
#[derive(Debug)]
pub struct AnimationStream<'a> {
    rig: Option<&'a RigDefinition>,
    buffer: Buffer<'a>,
    mask: Option<&'a mut ChannelMask>,
}

impl Default for AnimationStream<'_> {
    fn default() -> Self {
        Self::null()
    }
}

fn check_len(rig: &RigDefinition, len: usize) -> Result<()> {
    if len != rig.curve_count() {
        return Err(RigError::BufferSizeMismatch {
            rig: rig.name().to_string(),
            expected: rig.curve_count(),
            actual: len,
        });
    }
    Ok(())
}

impl<'a> AnimationStream<'a> {
    /// Read-write stream. Fails if `buffer.len() != rig.curve_count()`.
    pub fn new(rig: &'a RigDefinition, buffer: &'a mut [f32]) -> Result<Self> {
        check_len(rig, buffer.len())?;
        Ok(Self {
            rig: Some(rig),
            buffer: Buffer::ReadWrite(buffer),
            mask: None,
        })
    }

    /// Read-only stream. Fails if `buffer.len() != rig.curve_count()`.
    pub fn read_only(rig: &'a RigDefinition, buffer: &'a [f32]) -> Result<Self> {
        check_len(rig, buffer.len())?;
        Ok(Self {
            rig: Some(rig),
            buffer: Buffer::ReadOnly(buffer),
            mask: None,
        })
    }

    /// A stream with no rig; every accessor reports [`RigError::NullRig`].
    pub fn null() -> Self {
        Self {
            rig: None,
            buffer: Buffer::ReadOnly(&[]),
            mask: None,
        }
    }

    /// Attach a write mask (read-write streams only).
    pub fn with_mask(mut self, mask: &'a mut ChannelMask) -> Result<Self> {
        let rig = self.require_rig("with_mask")?;
        self.require_writable("with_mask")?;
        if mask.len() != rig.channel_count() {
            return Err(RigError::MaskSizeMismatch {
                rig: rig.name().to_string(),
                expected: rig.channel_count(),
                actual: mask.len(),
            });
        }
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn is_null(&self) -> bool {
        self.rig.is_none()
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.buffer, Buffer::ReadOnly(_))
    }

    pub fn rig(&self) -> Result<&'a RigDefinition> {
        self.require_rig("rig")
    }

    pub fn values(&self) -> &[f32] {
        self.buffer.as_slice()
    }

    pub fn channel_mask(&self) -> Option<&ChannelMask> {
        self.mask.as_deref()
    }

    fn require_rig(&self, operation: &'static str) -> Result<&'a RigDefinition> {
        self.rig.ok_or(RigError::NullRig { operation })
    }

    fn require_writable(&self, operation: &'static str) -> Result<()> {
        if self.is_read_only() {
            return Err(RigError::ReadOnlyStream { operation });
        }
        Ok(())
    }

    /// Buffer range of channel `index` of `kind`.
    fn slot(&self, kind: ChannelKind, index: usize, operation: &'static str) -> Result<usize> {
        let rig = self.require_rig(operation)?;
        let count = rig.bindings().count(kind);
        if index >= count {
            return Err(RigError::IndexOutOfRange { kind, index, count });
        }
        Ok(rig.bindings().curve_offset(kind) + index * kind.curves())
    }

    /// Raw curves of one channel.
    pub fn channel(&self, kind: ChannelKind, index: usize) -> Result<&[f32]> {
        let start = self.slot(kind, index, "channel")?;
        Ok(&self.buffer.as_slice()[start..start + kind.curves()])
    }

    /// Overwrite the curves of one channel and mark it in the mask.
    pub fn set_channel(&mut self, kind: ChannelKind, index: usize, values: &[f32]) -> Result<()> {
        self.write_channel(kind, index, values, "set_channel")
    }

    fn write_channel(
        &mut self,
        kind: ChannelKind,
        index: usize,
        values: &[f32],
        operation: &'static str,
    ) -> Result<()> {
        let rig = self.require_rig(operation)?;
        self.require_writable(operation)?;
        let start = self.slot(kind, index, operation)?;
        let n = kind.curves();
        if values.len() < n || values[..n].iter().any(|v| !v.is_finite()) {
            return Err(RigError::NotFinite { kind, index });
        }
        if let Buffer::ReadWrite(buf) = &mut self.buffer {
            buf[start..start + n].copy_from_slice(&values[..n]);
        }
        if let Some(mask) = self.mask.as_deref_mut() {
            mask.set(rig.bindings().channel_offset(kind) + index, true);
        }
        Ok(())
    }

    pub fn get_translation(&self, index: usize) -> Result<Vec3> {
        Ok(Vec3::from_slice(self.channel(ChannelKind::Translation, index)?))
    }

    pub fn set_translation(&mut self, index: usize, value: Vec3) -> Result<()> {
        self.write_channel(
            ChannelKind::Translation,
            index,
            &value.to_array(),
            "set_translation",
        )
    }

    pub fn get_rotation(&self, index: usize) -> Result<Quat> {
        Ok(Quat::from_slice(self.channel(ChannelKind::Rotation, index)?))
    }

    pub fn set_rotation(&mut self, index: usize, value: Quat) -> Result<()> {
        self.write_channel(ChannelKind::Rotation, index, &value.to_array(), "set_rotation")
    }

    pub fn get_scale(&self, index: usize) -> Result<Vec3> {
        Ok(Vec3::from_slice(self.channel(ChannelKind::Scale, index)?))
    }

    pub fn set_scale(&mut self, index: usize, value: Vec3) -> Result<()> {
        self.write_channel(ChannelKind::Scale, index, &value.to_array(), "set_scale")
    }

    pub fn get_float(&self, index: usize) -> Result<f32> {
        Ok(self.channel(ChannelKind::Float, index)?[0])
    }

    pub fn set_float(&mut self, index: usize, value: f32) -> Result<()> {
        self.write_channel(ChannelKind::Float, index, &[value], "set_float")
    }

    /// Int channels hold the numeric value as f32 (exact within ±2^24).
    pub fn get_int(&self, index: usize) -> Result<i32> {
        Ok(self.channel(ChannelKind::Int, index)?[0] as i32)
    }

    pub fn set_int(&mut self, index: usize, value: i32) -> Result<()> {
        self.write_channel(ChannelKind::Int, index, &[value as f32], "set_int")
    }

    /// Local transform of skeleton node `node`.
    pub fn local_trs(&self, node: usize) -> Result<(Vec3, Quat, Vec3)> {
        let rig = self.require_rig("local_trs")?;
        let ch = rig.node_channels(node)?;
        Ok((
            self.get_translation(ch.translation)?,
            self.get_rotation(ch.rotation)?,
            self.get_scale(ch.scale)?,
        ))
    }

    /// Set the local transform of skeleton node `node`; nothing is written
    /// unless all three components are finite.
    pub fn set_local_trs(&mut self, node: usize, t: Vec3, r: Quat, s: Vec3) -> Result<()> {
        let rig = self.require_rig("set_local_trs")?;
        self.require_writable("set_local_trs")?;
        let ch = rig.node_channels(node)?;
        if !t.is_finite() {
            return Err(RigError::NotFinite {
                kind: ChannelKind::Translation,
                index: ch.translation,
            });
        }
        if !r.is_finite() {
            return Err(RigError::NotFinite {
                kind: ChannelKind::Rotation,
                index: ch.rotation,
            });
        }
        if !s.is_finite() {
            return Err(RigError::NotFinite {
                kind: ChannelKind::Scale,
                index: ch.scale,
            });
        }
        self.set_translation(ch.translation, t)?;
        self.set_rotation(ch.rotation, r)?;
        self.set_scale(ch.scale, s)
    }

    /// Compose local transforms from `node` up to its root.
    ///
    /// `T = Tp + Rp * (Sp * Tc)`, `R = Rp * Rc`, `S = Sp * Sc`.
    pub fn local_to_root_trs(&self, node: usize) -> Result<(Vec3, Quat, Vec3)> {
        let rig = self.require_rig("local_to_root_trs")?;
        let (mut t, mut r, mut s) = self.local_trs(node)?;
        let mut parent = rig.parent(node)?;
        while let Some(p) = parent {
            let (pt, pr, ps) = self.local_trs(p)?;
            t = pt + pr * (ps * t);
            r = (pr * r).normalize();
            s = ps * s;
            parent = rig.parent(p)?;
        }
        Ok((t, r, s))
    }

    pub fn local_to_root_tr(&self, node: usize) -> Result<(Vec3, Quat)> {
        let (t, r, _) = self.local_to_root_trs(node)?;
        Ok((t, r))
    }

    pub fn local_to_root_translation(&self, node: usize) -> Result<Vec3> {
        Ok(self.local_to_root_trs(node)?.0)
    }

    pub fn local_to_root_rotation(&self, node: usize) -> Result<Quat> {
        Ok(self.local_to_root_trs(node)?.1)
    }

    pub fn local_to_root_scale(&self, node: usize) -> Result<Vec3> {
        Ok(self.local_to_root_trs(node)?.2)
    }

    /// Product of local matrices `M_root * ... * M_node`.
    pub fn local_to_root_matrix(&self, node: usize) -> Result<Mat4> {
        let rig = self.require_rig("local_to_root_matrix")?;
        let (t, r, s) = self.local_trs(node)?;
        let mut m = Mat4::from_scale_rotation_translation(s, r, t);
        let mut parent = rig.parent(node)?;
        while let Some(p) = parent {
            let (pt, pr, ps) = self.local_trs(p)?;
            m = Mat4::from_scale_rotation_translation(ps, pr, pt) * m;
            parent = rig.parent(p)?;
        }
        Ok(m)
    }

    pub fn local_to_root_inverse_matrix(&self, node: usize) -> Result<Mat4> {
        Ok(self.local_to_root_matrix(node)?.inverse())
    }

    /// Copy the rig's default pose over the whole buffer.
    pub fn reset_to_default_values(&mut self) -> Result<()> {
        let rig = self.require_rig("reset_to_default_values")?;
        self.require_writable("reset_to_default_values")?;
        if let Buffer::ReadWrite(buf) = &mut self.buffer {
            buf.copy_from_slice(rig.default_values());
        }
        Ok(())
    }

    pub fn clear_channel_masks(&mut self) -> Result<()> {
        self.set_channel_masks(false)
    }

    pub fn set_channel_masks(&mut self, value: bool) -> Result<()> {
        self.require_rig("set_channel_masks")?;
        self.require_writable("set_channel_masks")?;
        if let Some(mask) = self.mask.as_deref_mut() {
            mask.fill(value);
        }
        Ok(())
    }

    /// Whether channel `index` of `kind` has been written since the last clear.
    /// Always false without a mask.
    pub fn is_channel_written(&self, kind: ChannelKind, index: usize) -> Result<bool> {
        let rig = self.require_rig("is_channel_written")?;
        self.slot(kind, index, "is_channel_written")?;
        Ok(self
            .mask
            .as_deref()
            .is_some_and(|m| m.get(rig.bindings().channel_offset(kind) + index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::rig::RigBuilder;

    fn rig() -> RigDefinition {
        RigBuilder::new("chain")
            .add_node_trs("Root", -1, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE)
            .add_node_trs(
                "Child1",
                0,
                Vec3::new(1.0, 0.0, 0.0),
                Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
                Vec3::ONE,
            )
            .add_node_trs("Child2", 1, Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE)
            .add_float("blink", 0.5)
            .build()
            .expect("rig")
    }

    #[test]
    fn mask_fill_keeps_tail_clear() {
        let mut m = ChannelMask::new(70);
        m.fill(true);
        assert_eq!(m.count_ones(), 70);
        m.set(3, false);
        assert!(!m.get(3));
        assert!(!m.get(200));
        m.fill(false);
        assert_eq!(m.count_ones(), 0);
    }

    #[test]
    fn null_stream_reports_null_reference() {
        let s = AnimationStream::null();
        assert!(s.is_null());
        let err = s.get_float(0).unwrap_err();
        assert_eq!(err.class(), ErrorClass::NullReference);
        let mut d = AnimationStream::default();
        assert_eq!(
            d.set_float(0, 1.0).unwrap_err().class(),
            ErrorClass::NullReference
        );
    }

    #[test]
    fn reset_and_float_roundtrip() {
        let rig = rig();
        let mut buf = vec![0.0; rig.curve_count()];
        let mut s = AnimationStream::new(&rig, &mut buf).expect("stream");
        s.reset_to_default_values().expect("reset");
        assert_eq!(s.get_float(0).expect("blink"), 0.5);
        s.set_float(0, 2.0).expect("set");
        assert_eq!(s.get_float(0).expect("blink"), 2.0);
    }

    #[test]
    fn local_to_root_walks_chain() {
        let rig = rig();
        let mut buf = vec![0.0; rig.curve_count()];
        let mut s = AnimationStream::new(&rig, &mut buf).expect("stream");
        s.reset_to_default_values().expect("reset");
        // Root at (0,1,0); Child1 at +X rotated 90deg about Z; Child2 +X in Child1 space -> +Y.
        let t = s.local_to_root_translation(2).expect("t");
        assert!((t - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5, "{t}");
        let m = s.local_to_root_matrix(2).expect("m");
        assert!((m.w_axis.truncate() - t).length() < 1e-5);
        let inv = s.local_to_root_inverse_matrix(2).expect("inv");
        let id = m * inv;
        assert!(id.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        let (_, r) = s.local_to_root_tr(2).expect("tr");
        assert!(r.abs_diff_eq(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), 1e-5));
    }

    #[test]
    fn node_index_out_of_range() {
        let rig = rig();
        let buf = vec![0.0; rig.curve_count()];
        let s = AnimationStream::read_only(&rig, &buf).expect("stream");
        assert_eq!(
            s.local_to_root_matrix(9).unwrap_err().class(),
            ErrorClass::IndexOutOfRange
        );
    }

    #[test]
    fn mask_tracks_writes() {
        let rig = rig();
        let mut buf = vec![0.0; rig.curve_count()];
        let mut mask = ChannelMask::for_rig(&rig);
        let mut s = AnimationStream::new(&rig, &mut buf)
            .expect("stream")
            .with_mask(&mut mask)
            .expect("mask");
        s.set_translation(1, Vec3::ONE).expect("set");
        assert!(s.is_channel_written(ChannelKind::Translation, 1).expect("bit"));
        assert!(!s.is_channel_written(ChannelKind::Translation, 0).expect("bit"));
        s.clear_channel_masks().expect("clear");
        assert!(!s.is_channel_written(ChannelKind::Translation, 1).expect("bit"));
        s.set_channel_masks(true).expect("fill");
        drop(s);
        assert_eq!(mask.count_ones(), rig.channel_count());
    }

    #[test]
    fn mask_size_must_match() {
        let rig = rig();
        let mut buf = vec![0.0; rig.curve_count()];
        let mut mask = ChannelMask::new(1);
        let err = AnimationStream::new(&rig, &mut buf)
            .expect("stream")
            .with_mask(&mut mask)
            .unwrap_err();
        assert!(matches!(err, RigError::MaskSizeMismatch { .. }));
    }
}
