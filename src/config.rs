//! Engine-wide knobs that aren't part of any single pipeline's topology.

use crate::error::ErrorPolicy;

/// Configuration a host application loads however it likes (its own TOML/JSON/
/// env layer) and hands to the engine; this crate mandates no file format.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub default_error_policy: ErrorPolicy,
    /// Build the write lock's inner mutex with `no_deadlocks` instrumentation.
    /// Only takes effect when compiled with the `debug-tools` feature; this flag
    /// just lets a host decide whether to *request* it at runtime.
    #[cfg_attr(feature = "serde", serde(default))]
    pub debug_tools: bool,
    /// Upper bound on how many times [`ErrorPolicy::Retry`] re-invokes a
    /// processor for a single failed input before falling back to propagate.
    #[cfg_attr(feature = "serde", serde(default = "default_retry_attempts"))]
    pub retry_attempts: u32,
}

fn default_retry_attempts() -> u32 {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_error_policy: ErrorPolicy::default(),
            debug_tools: false,
            retry_attempts: default_retry_attempts(),
        }
    }
}
