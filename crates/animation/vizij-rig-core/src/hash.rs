//! Name hashing and content identity.
//!
//! `StringHash` is the channel identity used everywhere: xxh32 (seed 0) over
//! the UTF-8 bytes of the name. The empty string hashes the single byte
//! `0x00` instead of zero bytes. Both rules are part of the blob format, so
//! changing either invalidates every serialized rig and clip.

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;
use xxhash_rust::xxh32::xxh32;

const STRING_HASH_SEED: u32 = 0;

/// 32-bit hash of a channel or node name.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringHash(pub u32);

impl StringHash {
    /// Hash a name. Empty input hashes as `"\0"`.
    pub fn new(name: &str) -> Self {
        if name.is_empty() {
            return Self(xxh32(&[0u8], STRING_HASH_SEED));
        }
        Self(xxh32(name.as_bytes(), STRING_HASH_SEED))
    }

    /// Wrap an already computed hash (e.g. read from a blob).
    #[inline]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StringHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

/// Streaming xxh3-64 over the canonical content of a rig or clip.
///
/// Fields are fed as little-endian bytes so the digest matches the one
/// embedded in blobs regardless of host.
pub(crate) struct ContentHasher(Xxh3);

impl ContentHasher {
    pub fn new(tag: &[u8; 4]) -> Self {
        let mut h = Xxh3::new();
        h.update(tag);
        Self(h)
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.0.update(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.0.update(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.0.update(&v.to_bits().to_le_bytes());
        self
    }

    pub fn hashes(&mut self, hs: &[StringHash]) -> &mut Self {
        self.u32(hs.len() as u32);
        for h in hs {
            self.u32(h.0);
        }
        self
    }

    pub fn floats(&mut self, vs: &[f32]) -> &mut Self {
        self.u32(vs.len() as u32);
        for v in vs {
            self.f32(*v);
        }
        self
    }

    pub fn finish(&self) -> u64 {
        self.0.digest()
    }
}
