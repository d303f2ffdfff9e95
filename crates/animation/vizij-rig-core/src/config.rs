//! Runtime configuration for vizij-rig-core.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};

/// Quaternion interpolation used between neighbouring frames.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationInterp {
    /// Normalized linear blend (cheap, constant-speed error is small at clip rates).
    #[default]
    Nlerp,
    Slerp,
}

/// Options consumed by clip evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct EvaluationOptions {
    pub rotation_interpolation: RotationInterp,
}

/// Configuration for cache sizing and evaluation.
/// Keep this minimal; expand as needed without breaking API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    /// Initial capacity hint for the clip-instance cache table.
    pub instance_cache_capacity: usize,
    pub evaluation: EvaluationOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_cache_capacity: 64,
            evaluation: EvaluationOptions::default(),
        }
    }
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| RigError::Json(format!("config: {e}")))
    }
}
