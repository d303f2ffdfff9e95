//! Vizij Rig Core (engine-agnostic)
//!
//! Runtime for dense skeletal/channel animation:
//! - rigs (skeleton + sorted channel bindings + default pose),
//! - clips (sorted bindings + row-major samples + sync tags),
//! - clip instances binding a clip to a rig, shared through an explicit cache,
//! - animation streams viewing a caller-owned pose buffer,
//! - evaluation of an instance at a time into a stream (overwrite or additive),
//! - clip transformations (pose extraction, reverse, binding filter),
//! - JSON authoring descriptors and a flat binary blob format.
//!
//! Rig, clip and instance values are immutable once built and safe to share
//! across threads; streams are exclusively owned by the caller.

pub mod authoring;
pub mod binding;
pub mod blob;
pub mod cache;
pub mod clip;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod hash;
pub mod instance;
pub mod interp;
pub mod rig;
pub mod sampling;
pub mod stream;
pub mod transform;

// Re-exports for consumers
pub use authoring::{parse_clip_json, parse_rig_json};
pub use binding::{find_binding_index, BindingSet, BindingSetBuilder, ChannelKind};
pub use blob::{decode_clip, decode_rig, encode_clip, encode_rig};
pub use cache::ClipInstanceCache;
pub use clip::{Clip, ClipBuilder, PartialFrame, SyncTag};
pub use config::{Config, EvaluationOptions, RotationInterp};
pub use error::{BlobError, ErrorClass, Result, RigError};
pub use evaluate::{evaluate, evaluate_with, Blend};
pub use hash::StringHash;
pub use instance::{BindingMap, ClipInstance, InstanceKey};
pub use rig::{NodeChannels, RigBuilder, RigDefinition, SkeletonNode, ROOT_PARENT};
pub use sampling::{frame_position, FramePosition};
pub use stream::{AnimationStream, ChannelMask};
pub use transform::{clone_clip, create_pose, filter_bindings, reverse};
