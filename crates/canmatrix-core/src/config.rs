//! Codec configuration
//!
//! Options callers may pick per encode/decode call. Hosts typically embed
//! this in their own configuration file; the core itself reads no files.

use serde::{Deserialize, Serialize};

/// Options for [`crate::encode::encode`] and [`crate::decode::decode`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    /// Decode to the value-table label when the raw value has one
    #[serde(default = "default_true")]
    pub decode_labels: bool,
    /// Log a warning when an encoded physical value lies outside min/max
    #[serde(default = "default_true")]
    pub warn_out_of_range: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            decode_labels: default_true(),
            warn_out_of_range: default_true(),
        }
    }
}

impl CodecOptions {
    /// Options that decode to numbers only
    pub fn numeric() -> Self {
        Self {
            decode_labels: false,
            ..Self::default()
        }
    }
}
