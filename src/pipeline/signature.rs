// Signature pipeline: basis stream -> framed block-hash stream.

use std::io::{Read, Write};

use super::{PipelineError, PipelineOptions};
use crate::engine::SyncEngine;
use crate::framing::{BlockSize, FrameEncoder};

/// Statistics returned by `generate_signature()`.
#[derive(Debug, Clone)]
pub struct SignatureStats {
    pub block_size: BlockSize,
    /// Number of block-hash records written.
    pub blocks: u64,
}

/// Write the signature of `basis` to `out`.
///
/// Each block hash is encoded and flushed before the engine reads the next
/// block, so memory use does not depend on the basis size. On error the
/// partial output must be discarded by the caller.
pub fn generate_signature<E, R, W>(
    engine: &E,
    basis: R,
    out: W,
    opts: &PipelineOptions,
) -> Result<SignatureStats, PipelineError>
where
    E: SyncEngine,
    R: Read,
    W: Write,
{
    let mut encoder = FrameEncoder::new(out);
    encoder.write_block_size(opts.block_size)?;

    engine.signature(basis, opts.block_size, |block| {
        encoder.write_block_hash(&block)?;
        encoder.flush()
    })?;
    encoder.flush()?;

    let blocks = encoder.records_written();
    log::debug!("signature: {blocks} blocks of {}", opts.block_size);
    Ok(SignatureStats {
        block_size: opts.block_size,
        blocks,
    })
}
