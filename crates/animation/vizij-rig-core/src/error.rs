//! Error taxonomy shared by builders, streams, evaluation and the blob codec.
//!
//! Variants are grouped by class so callers (and tests) can tell a
//! construction failure from a write validation failure from an indexing
//! failure. Use [`RigError::class`] when only the class matters.

use thiserror::Error;

use crate::binding::ChannelKind;
use crate::hash::StringHash;

/// Coarse classification of a [`RigError`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Malformed input to a builder or decoder, or a mismatched pairing.
    Construction,
    /// Accessor called on a stream without a rig.
    NullReference,
    /// Mutation attempted through a read-only stream.
    InvalidOperation,
    /// Channel or node index outside its valid range.
    IndexOutOfRange,
    /// NaN or infinity supplied to, or produced by, a write path.
    NotFinite,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RigError {
    #[error("invalid skeleton: node {node} ('{name}') has parent {parent}, expected -1 or < {node}")]
    InvalidSkeleton {
        node: usize,
        name: String,
        parent: i32,
    },
    #[error("duplicate {kind} binding {hash} in '{owner}'")]
    DuplicateBinding {
        owner: String,
        kind: ChannelKind,
        hash: StringHash,
    },
    #[error("{kind} bindings are not strictly ascending at index {index}")]
    UnsortedBindings { kind: ChannelKind, index: usize },
    #[error("stream buffer has {actual} slots, rig '{rig}' requires {expected}")]
    BufferSizeMismatch {
        rig: String,
        expected: usize,
        actual: usize,
    },
    #[error("channel mask holds {actual} bits, rig '{rig}' has {expected} channels")]
    MaskSizeMismatch {
        rig: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid clip '{clip}': {reason}")]
    InvalidClip { clip: String, reason: String },
    #[error("invalid rig '{rig}': {reason}")]
    InvalidRig { rig: String, reason: String },
    #[error("clip instance for '{clip}' was bound to rig {expected:#018x}, stream uses rig {actual:#018x}")]
    RigMismatch {
        clip: String,
        expected: u64,
        actual: u64,
    },
    #[error("{0}")]
    Blob(#[from] BlobError),
    #[error("json error: {0}")]
    Json(String),

    #[error("animation stream has no rig ({operation})")]
    NullRig { operation: &'static str },

    #[error("animation stream is read-only ({operation})")]
    ReadOnlyStream { operation: &'static str },

    #[error("{kind} index {index} out of range (count {count})")]
    IndexOutOfRange {
        kind: ChannelKind,
        index: usize,
        count: usize,
    },
    #[error("skeleton node index {index} out of range (count {count})")]
    NodeOutOfRange { index: usize, count: usize },

    #[error("non-finite value for {kind} channel {index}")]
    NotFinite { kind: ChannelKind, index: usize },
    #[error("additive blend weight {0} is not finite")]
    NonFiniteWeight(f32),
}

impl RigError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RigError::NullRig { .. } => ErrorClass::NullReference,
            RigError::ReadOnlyStream { .. } => ErrorClass::InvalidOperation,
            RigError::IndexOutOfRange { .. } | RigError::NodeOutOfRange { .. } => {
                ErrorClass::IndexOutOfRange
            }
            RigError::NotFinite { .. } | RigError::NonFiniteWeight(_) => ErrorClass::NotFinite,
            _ => ErrorClass::Construction,
        }
    }
}

/// Errors produced while decoding a binary rig or clip blob.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlobError {
    #[error("blob too short: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("bad magic bytes {found:?}, expected {expected:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },
    #[error("unsupported blob version {0}")]
    UnsupportedVersion(u32),
    #[error("section '{section}' at offset {offset} is out of bounds")]
    SectionOutOfBounds { section: &'static str, offset: usize },
    #[error("section '{section}' is not valid UTF-8")]
    InvalidUtf8 { section: &'static str },
    #[error("content hash mismatch: header {expected:#018x}, computed {actual:#018x}")]
    HashMismatch { expected: u64, actual: u64 },
}

pub type Result<T, E = RigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_are_distinct_per_taxonomy() {
        let idx = RigError::IndexOutOfRange {
            kind: ChannelKind::Float,
            index: 4,
            count: 2,
        };
        assert_eq!(idx.class(), ErrorClass::IndexOutOfRange);
        let ro = RigError::ReadOnlyStream {
            operation: "set_float",
        };
        assert_eq!(ro.class(), ErrorClass::InvalidOperation);
        let nf = RigError::NotFinite {
            kind: ChannelKind::Translation,
            index: 0,
        };
        assert_eq!(nf.class(), ErrorClass::NotFinite);
        let null = RigError::NullRig {
            operation: "get_float",
        };
        assert_eq!(null.class(), ErrorClass::NullReference);
        let bad = RigError::BufferSizeMismatch {
            rig: "r".into(),
            expected: 3,
            actual: 2,
        };
        assert_eq!(bad.class(), ErrorClass::Construction);
    }

    #[test]
    fn messages_name_the_offender() {
        let err = RigError::InvalidSkeleton {
            node: 2,
            name: "Hand".into(),
            parent: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("Hand"), "{msg}");
        assert!(msg.contains('5'), "{msg}");
    }
}
