//! Serialization protocol for checkpoints
//!
//! The wire form is structural JSON with the field names of the checkpoint
//! record (`runId`, `currentNodeId`, `executionState`, ...). Values pass
//! through untouched - no HTML entity replacement, so URIs and query
//! payloads survive verbatim. Decoders ignore unknown fields, and integers
//! may widen to 64-bit on the way back.

use crate::checkpoint::Checkpoint;
use crate::error::Result;

/// Protocol for encoding and decoding checkpoints
///
/// Implementations can provide alternative wire formats as long as they
/// round-trip the full checkpoint record.
pub trait CheckpointSerializer: Send + Sync {
    /// Encode a checkpoint
    fn serialize(&self, checkpoint: &Checkpoint) -> Result<String>;

    /// Decode a checkpoint
    fn deserialize(&self, raw: &str) -> Result<Checkpoint>;
}

/// JSON serializer with compact and human-readable modes
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact single-line output (default)
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    /// Indented human-readable output
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl CheckpointSerializer for JsonSerializer {
    fn serialize(&self, checkpoint: &Checkpoint) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(checkpoint)?)
        } else {
            Ok(serde_json::to_string(checkpoint)?)
        }
    }

    fn deserialize(&self, raw: &str) -> Result<Checkpoint> {
        Ok(serde_json::from_str(raw)?)
    }
}
