//! Clip instances: the resolved clip → rig channel mapping.
//!
//! Built by merge-intersecting the clip's and the rig's sorted bindings per
//! kind. Channels the rig does not know are dropped; rig channels the clip
//! does not animate are simply not in the map. Samples stay in the clip's
//! own layout and are translated through the map at evaluation time.

use std::sync::Arc;

use crate::binding::{intersect, BindingSet, ChannelKind};
use crate::clip::Clip;
use crate::error::Result;
use crate::hash::StringHash;
use crate::rig::RigDefinition;

/// Cache identity of a (rig, clip) pairing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct InstanceKey {
    pub rig: u64,
    pub clip: u64,
}

impl InstanceKey {
    pub fn new(rig: &RigDefinition, clip: &Clip) -> Self {
        Self {
            rig: rig.content_hash(),
            clip: clip.content_hash(),
        }
    }
}

/// Per-kind index pairs for the bound channels, both strictly increasing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindingMap {
    clip: Vec<usize>,
    rig: Vec<usize>,
}

impl BindingMap {
    fn from_pairs(pairs: Vec<(usize, usize)>) -> Self {
        let (clip, rig) = pairs.into_iter().unzip();
        Self { clip, rig }
    }

    pub fn len(&self) -> usize {
        self.rig.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rig.is_empty()
    }

    /// Rig channel index of bound channel `i`.
    pub fn rig_indices(&self) -> &[usize] {
        &self.rig
    }

    /// Source clip channel index of bound channel `i`.
    pub fn clip_indices(&self) -> &[usize] {
        &self.clip
    }

    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.clip.iter().copied().zip(self.rig.iter().copied())
    }
}

/// A clip bound to a rig layout. Immutable; share behind `Arc`.
#[derive(Clone, Debug)]
pub struct ClipInstance {
    key: InstanceKey,
    rig_name: String,
    rig_counts: [usize; 5],
    clip: Arc<Clip>,
    bindings: BindingSet,
    maps: [BindingMap; 5],
}

impl ClipInstance {
    /// Resolve `clip` against `rig`. Zero overlap yields empty maps.
    pub fn new(rig: &RigDefinition, clip: Arc<Clip>) -> Result<Self> {
        let rig_bindings = rig.bindings();
        let clip_bindings = clip.bindings();
        let mut maps: [BindingMap; 5] = Default::default();
        let mut kinds: [Vec<StringHash>; 5] = Default::default();
        let mut rig_counts = [0usize; 5];
        for (slot, kind) in ChannelKind::ALL.into_iter().enumerate() {
            let pairs = intersect(clip_bindings.get(kind), rig_bindings.get(kind));
            kinds[slot] = pairs
                .iter()
                .map(|(c, _)| clip_bindings.get(kind)[*c])
                .collect();
            maps[slot] = BindingMap::from_pairs(pairs);
            rig_counts[slot] = rig_bindings.count(kind);
        }
        let bindings = BindingSet::from_sorted(clip.name(), kinds)?;
        log::debug!(
            "bound clip '{}' to rig '{}': {} of {} channels",
            clip.name(),
            rig.name(),
            bindings.channel_count(),
            clip_bindings.channel_count()
        );
        Ok(Self {
            key: InstanceKey::new(rig, &clip),
            rig_name: rig.name().to_string(),
            rig_counts,
            clip,
            bindings,
            maps,
        })
    }

    pub fn key(&self) -> InstanceKey {
        self.key
    }

    pub fn rig_hash(&self) -> u64 {
        self.key.rig
    }

    pub fn rig_name(&self) -> &str {
        &self.rig_name
    }

    pub fn clip(&self) -> &Arc<Clip> {
        &self.clip
    }

    /// Clip bindings restricted to channels the rig also has.
    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn map(&self, kind: ChannelKind) -> &BindingMap {
        &self.maps[kind.slot()]
    }

    /// Channel count of `kind` in the bound rig.
    pub fn rig_count(&self, kind: ChannelKind) -> usize {
        self.rig_counts[kind.slot()]
    }

    /// Bound channels across all kinds.
    pub fn bound_channel_count(&self) -> usize {
        self.maps.iter().map(BindingMap::len).sum()
    }
}
