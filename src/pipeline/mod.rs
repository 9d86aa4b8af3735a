// Signature / delta / patch pipelines.
//
// Each pipeline frames the inputs and outputs of one `SyncEngine` call over
// plain `Read` / `Write` streams. Opening files is left to `crate::io`.

pub mod delta;
pub mod patch;
pub mod signature;

pub use delta::{DeltaStats, generate_delta};
pub use patch::{PatchStats, apply_patch};
pub use signature::{SignatureStats, generate_signature};

use thiserror::Error;

use crate::checksum::ChecksumAlgorithm;
use crate::engine::EngineError;
use crate::framing::{BlockSize, FrameError};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Default depth of the decode -> apply queue in the patch pipeline.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Configuration shared by the three pipelines.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Block size written to new signatures. Delta and patch take the block
    /// size from their input stream instead.
    pub block_size: BlockSize,
    /// Embed (delta) and verify (patch) the whole-file checksum.
    pub check: bool,
    /// Whole-file checksum algorithm.
    pub checksum: ChecksumAlgorithm,
    /// Operations buffered between the patch decoder and the applier.
    /// Zero makes every handoff a rendezvous.
    pub channel_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            block_size: BlockSize::DEFAULT,
            check: true,
            checksum: ChecksumAlgorithm::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl PipelineOptions {
    /// Options with a block size given in KiB, as on the command line.
    pub fn with_block_kib(kib: u32) -> Result<Self, ConfigError> {
        let block_size = BlockSize::from_kib(kib).ok_or(ConfigError::InvalidBlockSize(kib))?;
        Ok(Self {
            block_size,
            ..Self::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Invalid configuration, detected before any pipeline runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid block size: {0} KiB")]
    InvalidBlockSize(u32),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Checking was requested but the delta carries no checksum sentinel.
    #[error("no target checksum present in delta")]
    MissingChecksum,

    #[error(
        "checksum does not match: expected {}, got {}",
        crate::checksum::to_hex(.expected),
        crate::checksum::to_hex(.actual)
    )]
    ChecksumMismatch { expected: Vec<u8>, actual: Vec<u8> },

    #[error("delta decoder thread panicked")]
    DecoderPanicked,
}
