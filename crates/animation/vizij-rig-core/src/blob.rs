//! Flat binary blobs for rigs and clips.
//!
//! A blob is a fixed `#[repr(C)]` header followed by sections addressed by
//! byte offsets from the start of the blob, so it can be relocated or mapped
//! as-is. Every field is little-endian: records are cast with bytemuck,
//! which is only byte-exact on little-endian targets, so big-endian targets
//! are refused at compile time. Reads go through `pod_read_unaligned`, so
//! sections need no alignment.
//!
//! Rig blob:
//! ```text
//! RigHeader | NodeRecord * node_count | u32 hashes (T, R, S, F, I) | f32 defaults | name
//! ```
//! Clip blob:
//! ```text
//! ClipHeader | u32 hashes (T, R, S, F, I) | f32 samples (rows * curves) | SyncTagRecord * n | name
//! ```
//!
//! The header embeds the content hash of the decoded object; decoding rebuilds
//! the object through its validating constructor and rejects a mismatch.

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};

use crate::binding::{BindingSet, ChannelKind};
use crate::clip::{Clip, PartialFrame, SyncTag};
use crate::error::{BlobError, Result, RigError};
use crate::hash::StringHash;
use crate::rig::{RigDefinition, SkeletonNode};

#[cfg(target_endian = "big")]
compile_error!("rig and clip blobs are little-endian; big-endian targets are not supported");

pub const RIG_MAGIC: [u8; 4] = *b"VZRG";
pub const CLIP_MAGIC: [u8; 4] = *b"VZCL";
pub const BLOB_VERSION: u32 = 2;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct RigHeader {
    magic: [u8; 4],
    version: u32,
    content_hash: u64,
    counts: [u32; 5],
    node_count: u32,
    nodes_offset: u32,
    bindings_offset: u32,
    defaults_offset: u32,
    name_offset: u32,
    name_len: u32,
    _reserved: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct NodeRecord {
    parent: i32,
    id: u32,
    translation: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
    axis: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct ClipHeader {
    magic: [u8; 4],
    version: u32,
    content_hash: u64,
    counts: [u32; 5],
    frame_count: i32,
    sample_rate: f32,
    duration: f32,
    tag_count: u32,
    bindings_offset: u32,
    samples_offset: u32,
    tags_offset: u32,
    name_offset: u32,
    name_len: u32,
    /// 0: short interval last, 1: short interval first.
    partial_frame: u32,
    _reserved: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SyncTagRecord {
    normalized_time: f32,
    tag_type: u32,
    state: i32,
}

fn push_hashes(out: &mut Vec<u8>, bindings: &BindingSet) {
    for kind in ChannelKind::ALL {
        let raw: Vec<u32> = bindings.get(kind).iter().map(|h| h.id()).collect();
        out.extend_from_slice(bytemuck::cast_slice(&raw));
    }
}

fn counts_of(bindings: &BindingSet) -> [u32; 5] {
    ChannelKind::ALL.map(|kind| bindings.count(kind) as u32)
}

pub fn encode_rig(rig: &RigDefinition) -> Vec<u8> {
    let bindings = rig.bindings();
    let nodes_offset = size_of::<RigHeader>();
    let bindings_offset = nodes_offset + rig.node_count() * size_of::<NodeRecord>();
    let defaults_offset = bindings_offset + bindings.channel_count() * size_of::<u32>();
    let name_offset = defaults_offset + rig.curve_count() * size_of::<f32>();

    let header = RigHeader {
        magic: RIG_MAGIC,
        version: BLOB_VERSION,
        content_hash: rig.content_hash(),
        counts: counts_of(bindings),
        node_count: rig.node_count() as u32,
        nodes_offset: nodes_offset as u32,
        bindings_offset: bindings_offset as u32,
        defaults_offset: defaults_offset as u32,
        name_offset: name_offset as u32,
        name_len: rig.name().len() as u32,
        _reserved: 0,
    };
    let mut out = Vec::with_capacity(name_offset + rig.name().len());
    out.extend_from_slice(bytemuck::bytes_of(&header));
    for n in rig.nodes() {
        let record = NodeRecord {
            parent: n.parent,
            id: n.id.id(),
            translation: n.translation.to_array(),
            rotation: n.rotation.to_array(),
            scale: n.scale.to_array(),
            axis: n.axis,
        };
        out.extend_from_slice(bytemuck::bytes_of(&record));
    }
    push_hashes(&mut out, bindings);
    out.extend_from_slice(bytemuck::cast_slice(rig.default_values()));
    out.extend_from_slice(rig.name().as_bytes());
    out
}

pub fn encode_clip(clip: &Clip) -> Vec<u8> {
    let bindings = clip.bindings();
    let bindings_offset = size_of::<ClipHeader>();
    let samples_offset = bindings_offset + bindings.channel_count() * size_of::<u32>();
    let tags_offset = samples_offset + clip.samples().len() * size_of::<f32>();
    let name_offset = tags_offset + clip.sync_tags().len() * size_of::<SyncTagRecord>();

    let header = ClipHeader {
        magic: CLIP_MAGIC,
        version: BLOB_VERSION,
        content_hash: clip.content_hash(),
        counts: counts_of(bindings),
        frame_count: clip.frame_count() as i32,
        sample_rate: clip.sample_rate(),
        duration: clip.duration(),
        tag_count: clip.sync_tags().len() as u32,
        bindings_offset: bindings_offset as u32,
        samples_offset: samples_offset as u32,
        tags_offset: tags_offset as u32,
        name_offset: name_offset as u32,
        name_len: clip.name().len() as u32,
        partial_frame: match clip.partial_frame() {
            PartialFrame::Last => 0,
            PartialFrame::First => 1,
        },
        _reserved: 0,
    };
    let mut out = Vec::with_capacity(name_offset + clip.name().len());
    out.extend_from_slice(bytemuck::bytes_of(&header));
    push_hashes(&mut out, bindings);
    out.extend_from_slice(bytemuck::cast_slice(clip.samples()));
    for t in clip.sync_tags() {
        let record = SyncTagRecord {
            normalized_time: t.normalized_time,
            tag_type: t.tag_type.id(),
            state: t.state,
        };
        out.extend_from_slice(bytemuck::bytes_of(&record));
    }
    out.extend_from_slice(clip.name().as_bytes());
    out
}

/// Bounds-checked view of `len` bytes at `offset`.
fn section<'b>(
    bytes: &'b [u8],
    section: &'static str,
    offset: u32,
    len: usize,
) -> Result<&'b [u8], BlobError> {
    let start = offset as usize;
    start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or(BlobError::SectionOutOfBounds {
            section,
            offset: start,
        })
}

fn read_header<H: Pod>(bytes: &[u8], magic: [u8; 4]) -> Result<H, BlobError> {
    if bytes.len() < 4 {
        return Err(BlobError::Truncated {
            needed: 4,
            actual: bytes.len(),
        });
    }
    let mut found = [0u8; 4];
    found.copy_from_slice(&bytes[..4]);
    if found != magic {
        return Err(BlobError::BadMagic {
            expected: magic,
            found,
        });
    }
    let needed = size_of::<H>();
    if bytes.len() < needed {
        return Err(BlobError::Truncated {
            needed,
            actual: bytes.len(),
        });
    }
    Ok(bytemuck::pod_read_unaligned(&bytes[..needed]))
}

fn check_version(version: u32) -> Result<(), BlobError> {
    if version != BLOB_VERSION {
        return Err(BlobError::UnsupportedVersion(version));
    }
    Ok(())
}

fn read_hashes(
    bytes: &[u8],
    owner: &str,
    offset: u32,
    counts: [u32; 5],
) -> Result<BindingSet> {
    let total: usize = counts.iter().map(|c| *c as usize).sum();
    let raw: Vec<u32> =
        bytemuck::pod_collect_to_vec(section(bytes, "bindings", offset, total * size_of::<u32>())?);
    let mut kinds: [Vec<StringHash>; 5] = Default::default();
    let mut cursor = 0;
    for (slot, count) in counts.iter().enumerate() {
        let end = cursor + *count as usize;
        kinds[slot] = raw[cursor..end].iter().map(|v| StringHash::from_raw(*v)).collect();
        cursor = end;
    }
    BindingSet::from_sorted(owner, kinds)
}

fn read_name(bytes: &[u8], offset: u32, len: u32) -> Result<String> {
    let raw = section(bytes, "name", offset, len as usize)?;
    let name = std::str::from_utf8(raw).map_err(|_| BlobError::InvalidUtf8 { section: "name" })?;
    Ok(name.to_string())
}

fn check_hash(expected: u64, actual: u64) -> Result<(), BlobError> {
    if expected != actual {
        return Err(BlobError::HashMismatch { expected, actual });
    }
    Ok(())
}

/// Decode and validate a rig blob.
pub fn decode_rig(bytes: &[u8]) -> Result<RigDefinition> {
    decode_rig_inner(bytes).map_err(|e| {
        log::warn!("rejected rig blob ({} bytes): {}", bytes.len(), e);
        e
    })
}

fn decode_rig_inner(bytes: &[u8]) -> Result<RigDefinition> {
    let header: RigHeader = read_header(bytes, RIG_MAGIC)?;
    check_version(header.version)?;
    let name = read_name(bytes, header.name_offset, header.name_len)?;

    let node_count = header.node_count as usize;
    let records = section(
        bytes,
        "nodes",
        header.nodes_offset,
        node_count * size_of::<NodeRecord>(),
    )?;
    let nodes: Vec<SkeletonNode> = records
        .chunks_exact(size_of::<NodeRecord>())
        .map(|chunk| {
            let r: NodeRecord = bytemuck::pod_read_unaligned(chunk);
            SkeletonNode {
                parent: r.parent,
                id: StringHash::from_raw(r.id),
                translation: Vec3::from_array(r.translation),
                rotation: Quat::from_array(r.rotation),
                scale: Vec3::from_array(r.scale),
                axis: r.axis,
            }
        })
        .collect();

    let bindings = read_hashes(bytes, &name, header.bindings_offset, header.counts)?;
    let defaults: Vec<f32> = bytemuck::pod_collect_to_vec(section(
        bytes,
        "defaults",
        header.defaults_offset,
        bindings.curve_count() * size_of::<f32>(),
    )?);

    let rig = RigDefinition::from_parts(name, nodes, bindings, defaults)?;
    check_hash(header.content_hash, rig.content_hash())?;
    Ok(rig)
}

/// Decode and validate a clip blob.
pub fn decode_clip(bytes: &[u8]) -> Result<Clip> {
    decode_clip_inner(bytes).map_err(|e| {
        log::warn!("rejected clip blob ({} bytes): {}", bytes.len(), e);
        e
    })
}

fn decode_clip_inner(bytes: &[u8]) -> Result<Clip> {
    let header: ClipHeader = read_header(bytes, CLIP_MAGIC)?;
    check_version(header.version)?;
    let name = read_name(bytes, header.name_offset, header.name_len)?;
    if header.frame_count < 0 {
        return Err(RigError::InvalidClip {
            clip: name,
            reason: format!("negative frame count {}", header.frame_count),
        });
    }

    let partial_frame = match header.partial_frame {
        0 => PartialFrame::Last,
        1 => PartialFrame::First,
        other => {
            return Err(RigError::InvalidClip {
                clip: name,
                reason: format!("unknown partial frame placement {other}"),
            })
        }
    };

    let bindings = read_hashes(bytes, &name, header.bindings_offset, header.counts)?;
    let rows = header.frame_count as usize + 1;
    let sample_bytes = rows
        .checked_mul(bindings.curve_count() * size_of::<f32>())
        .ok_or(BlobError::SectionOutOfBounds {
            section: "samples",
            offset: header.samples_offset as usize,
        })?;
    let samples: Vec<f32> = bytemuck::pod_collect_to_vec(section(
        bytes,
        "samples",
        header.samples_offset,
        sample_bytes,
    )?);
    let tag_bytes = section(
        bytes,
        "sync_tags",
        header.tags_offset,
        header.tag_count as usize * size_of::<SyncTagRecord>(),
    )?;
    let tags: Vec<SyncTag> = tag_bytes
        .chunks_exact(size_of::<SyncTagRecord>())
        .map(|chunk| {
            let r: SyncTagRecord = bytemuck::pod_read_unaligned(chunk);
            SyncTag {
                normalized_time: r.normalized_time,
                tag_type: StringHash::from_raw(r.tag_type),
                state: r.state,
            }
        })
        .collect();

    let clip = Clip::from_parts(
        name,
        bindings,
        header.frame_count as u32,
        header.sample_rate,
        header.duration,
        partial_frame,
        samples,
        tags,
    )?;
    check_hash(header.content_hash, clip.content_hash())?;
    Ok(clip)
}
