//! Interpolation primitives used by clip sampling and additive writes.
//!
//! Translation/scale/float curves lerp; rotations use NLERP (default) or
//! SLERP with shortest-arc sign correction; ints never interpolate.

pub mod functions;

pub use functions::{lerp_f32, nlerp_quat, slerp_quat};
