//! Binding sets: per-kind sorted channel identities.
//!
//! A `BindingSet` fixes the channel layout of a rig or a clip. Each of the
//! five kinds keeps its hashes strictly ascending, which is what makes
//! binary-search lookup and the two-cursor intersection in [`intersect`]
//! valid. A set can only be obtained through [`BindingSetBuilder`] (which
//! sorts) or [`BindingSet::from_sorted`] (which checks), so the invariant
//! holds for every value of the type.
//!
//! Flat buffer layout (one row of a clip, or a whole stream):
//! `[translations ×3][rotations ×4][scales ×3][floats ×1][ints ×1]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};
use crate::hash::{ContentHasher, StringHash};

/// Kind of an animatable channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Translation,
    Rotation,
    Scale,
    Float,
    Int,
}

impl ChannelKind {
    /// All kinds in buffer layout order.
    pub const ALL: [ChannelKind; 5] = [
        ChannelKind::Translation,
        ChannelKind::Rotation,
        ChannelKind::Scale,
        ChannelKind::Float,
        ChannelKind::Int,
    ];

    /// Scalar curves per channel of this kind.
    #[inline]
    pub const fn curves(self) -> usize {
        match self {
            ChannelKind::Translation | ChannelKind::Scale => 3,
            ChannelKind::Rotation => 4,
            ChannelKind::Float | ChannelKind::Int => 1,
        }
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        match self {
            ChannelKind::Translation => 0,
            ChannelKind::Rotation => 1,
            ChannelKind::Scale => 2,
            ChannelKind::Float => 3,
            ChannelKind::Int => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Translation => "translation",
            ChannelKind::Rotation => "rotation",
            ChannelKind::Scale => "scale",
            ChannelKind::Float => "float",
            ChannelKind::Int => "int",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary search for `hash` in a strictly ascending slice.
///
/// Returns the first matching index. Slices produced by this crate never hold
/// duplicates; for a hand-built slice that does, the lowest index wins.
pub fn find_binding_index(sorted: &[StringHash], hash: StringHash) -> Option<usize> {
    let i = sorted.partition_point(|h| *h < hash);
    (i < sorted.len() && sorted[i] == hash).then_some(i)
}

/// Two-cursor merge intersection of two ascending slices.
///
/// Returns `(a_index, b_index)` pairs for every hash present in both, in
/// ascending order of both indices. O(a.len() + b.len()).
pub fn intersect(a: &[StringHash], b: &[StringHash]) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0usize, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                out.push((i, j));
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    out
}

/// Five strictly ascending hash sequences, one per [`ChannelKind`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BindingSet {
    kinds: [Vec<StringHash>; 5],
}

impl BindingSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from per-kind sequences that must already be strictly ascending.
    ///
    /// `owner` names the rig/clip in error messages.
    pub fn from_sorted(owner: &str, kinds: [Vec<StringHash>; 5]) -> Result<Self> {
        for kind in ChannelKind::ALL {
            let seq = &kinds[kind.slot()];
            for (i, pair) in seq.windows(2).enumerate() {
                if pair[0] == pair[1] {
                    return Err(RigError::DuplicateBinding {
                        owner: owner.to_string(),
                        kind,
                        hash: pair[0],
                    });
                }
                if pair[0] > pair[1] {
                    return Err(RigError::UnsortedBindings { kind, index: i + 1 });
                }
            }
        }
        Ok(Self { kinds })
    }

    #[inline]
    pub fn get(&self, kind: ChannelKind) -> &[StringHash] {
        &self.kinds[kind.slot()]
    }

    pub fn translations(&self) -> &[StringHash] {
        self.get(ChannelKind::Translation)
    }

    pub fn rotations(&self) -> &[StringHash] {
        self.get(ChannelKind::Rotation)
    }

    pub fn scales(&self) -> &[StringHash] {
        self.get(ChannelKind::Scale)
    }

    pub fn floats(&self) -> &[StringHash] {
        self.get(ChannelKind::Float)
    }

    pub fn ints(&self) -> &[StringHash] {
        self.get(ChannelKind::Int)
    }

    #[inline]
    pub fn count(&self, kind: ChannelKind) -> usize {
        self.kinds[kind.slot()].len()
    }

    /// Scalar curves contributed by one kind.
    #[inline]
    pub fn curve_count_of(&self, kind: ChannelKind) -> usize {
        self.count(kind) * kind.curves()
    }

    /// Total scalar slots (stream size / clip row width).
    pub fn curve_count(&self) -> usize {
        ChannelKind::ALL.iter().map(|k| self.curve_count_of(*k)).sum()
    }

    /// Total channels across kinds (mask width).
    pub fn channel_count(&self) -> usize {
        self.kinds.iter().map(Vec::len).sum()
    }

    /// Offset of the first curve of `kind` within a flat row.
    pub fn curve_offset(&self, kind: ChannelKind) -> usize {
        ChannelKind::ALL[..kind.slot()]
            .iter()
            .map(|k| self.curve_count_of(*k))
            .sum()
    }

    /// Ordinal of the first channel of `kind` across all kinds.
    pub fn channel_offset(&self, kind: ChannelKind) -> usize {
        ChannelKind::ALL[..kind.slot()]
            .iter()
            .map(|k| self.count(*k))
            .sum()
    }

    pub fn find(&self, kind: ChannelKind, hash: StringHash) -> Option<usize> {
        find_binding_index(self.get(kind), hash)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.iter().all(Vec::is_empty)
    }

    /// Channels present in both sets, per kind, in ascending order.
    pub fn intersection(&self, other: &BindingSet) -> BindingSet {
        let mut kinds: [Vec<StringHash>; 5] = Default::default();
        for kind in ChannelKind::ALL {
            let a = self.get(kind);
            kinds[kind.slot()] = intersect(a, other.get(kind))
                .into_iter()
                .map(|(i, _)| a[i])
                .collect();
        }
        BindingSet { kinds }
    }

    pub(crate) fn hash_into(&self, h: &mut ContentHasher) {
        for kind in ChannelKind::ALL {
            h.hashes(self.get(kind));
        }
    }
}

/// Accumulates unordered channel declarations and freezes them sorted.
#[derive(Clone, Debug, Default)]
pub struct BindingSetBuilder {
    kinds: [Vec<StringHash>; 5],
}

impl BindingSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ChannelKind, hash: StringHash) -> &mut Self {
        self.kinds[kind.slot()].push(hash);
        self
    }

    pub fn push_name(&mut self, kind: ChannelKind, name: &str) -> &mut Self {
        self.push(kind, StringHash::new(name))
    }

    /// Sort every kind and reject duplicate hashes.
    pub fn build(&self, owner: &str) -> Result<BindingSet> {
        let mut kinds = self.kinds.clone();
        for seq in kinds.iter_mut() {
            seq.sort_unstable();
        }
        BindingSet::from_sorted(owner, kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(v: u32) -> StringHash {
        StringHash::from_raw(v)
    }

    #[test]
    fn builder_sorts_each_kind() {
        let mut b = BindingSetBuilder::new();
        b.push(ChannelKind::Float, h(9))
            .push(ChannelKind::Float, h(3))
            .push(ChannelKind::Rotation, h(5))
            .push(ChannelKind::Float, h(4));
        let set = b.build("test").expect("build");
        assert_eq!(set.floats(), &[h(3), h(4), h(9)]);
        assert_eq!(set.rotations(), &[h(5)]);
        assert_eq!(set.curve_count(), 3 + 4);
        assert_eq!(set.channel_count(), 4);
    }

    #[test]
    fn builder_rejects_duplicates() {
        let mut b = BindingSetBuilder::new();
        b.push(ChannelKind::Int, h(1)).push(ChannelKind::Int, h(1));
        let err = b.build("dup").unwrap_err();
        assert!(matches!(
            err,
            RigError::DuplicateBinding {
                kind: ChannelKind::Int,
                ..
            }
        ));
    }

    #[test]
    fn same_hash_in_different_kinds_is_allowed() {
        let mut b = BindingSetBuilder::new();
        b.push(ChannelKind::Translation, h(1))
            .push(ChannelKind::Rotation, h(1))
            .push(ChannelKind::Scale, h(1));
        assert!(b.build("node").is_ok());
    }

    #[test]
    fn from_sorted_rejects_unsorted() {
        let kinds = [vec![h(2), h(1)], vec![], vec![], vec![], vec![]];
        let err = BindingSet::from_sorted("x", kinds).unwrap_err();
        assert_eq!(
            err,
            RigError::UnsortedBindings {
                kind: ChannelKind::Translation,
                index: 1
            }
        );
    }

    #[test]
    fn find_returns_first_match() {
        let seq = [h(1), h(4), h(4), h(8)];
        assert_eq!(find_binding_index(&seq, h(4)), Some(1));
        assert_eq!(find_binding_index(&seq, h(8)), Some(3));
        assert_eq!(find_binding_index(&seq, h(5)), None);
        assert_eq!(find_binding_index(&[], h(5)), None);
    }

    #[test]
    fn offsets_follow_layout() {
        let mut b = BindingSetBuilder::new();
        b.push(ChannelKind::Translation, h(1))
            .push(ChannelKind::Translation, h(2))
            .push(ChannelKind::Rotation, h(1))
            .push(ChannelKind::Scale, h(1))
            .push(ChannelKind::Float, h(7))
            .push(ChannelKind::Int, h(8));
        let set = b.build("layout").expect("build");
        assert_eq!(set.curve_offset(ChannelKind::Translation), 0);
        assert_eq!(set.curve_offset(ChannelKind::Rotation), 6);
        assert_eq!(set.curve_offset(ChannelKind::Scale), 10);
        assert_eq!(set.curve_offset(ChannelKind::Float), 13);
        assert_eq!(set.curve_offset(ChannelKind::Int), 14);
        assert_eq!(set.curve_count(), 15);
        assert_eq!(set.channel_offset(ChannelKind::Float), 4);
        assert_eq!(set.channel_offset(ChannelKind::Int), 5);
    }

    #[test]
    fn intersect_walks_both_cursors() {
        let a = [h(1), h(3), h(5), h(7)];
        let b = [h(2), h(3), h(4), h(7), h(9)];
        assert_eq!(intersect(&a, &b), vec![(1, 1), (3, 3)]);
        assert!(intersect(&a, &[]).is_empty());
    }
}
