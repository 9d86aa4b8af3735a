// Delta pipeline: framed signature + new file -> framed operation stream.

use std::io::{self, Read, Write};

use super::{PipelineError, PipelineOptions};
use crate::engine::SyncEngine;
use crate::framing::{BlockHash, BlockSize, FrameDecoder, FrameEncoder, FrameError, Operation};

/// Statistics returned by `generate_delta()`.
#[derive(Debug, Clone, Default)]
pub struct DeltaStats {
    /// Block size taken from the signature.
    pub block_size: Option<BlockSize>,
    /// Block-hash records loaded from the signature.
    pub signature_blocks: u64,
    pub copy_ops: u64,
    pub insert_ops: u64,
    /// Bytes carried as INSERT payloads.
    pub literal_bytes: u64,
    /// Bytes of the new file referenced from the basis.
    pub copied_bytes: u64,
    /// Whole-file checksum written as the trailing sentinel, if any.
    pub checksum: Option<Vec<u8>>,
}

/// Load a complete framed signature into memory.
///
/// An empty stream is `FrameError::UnexpectedEnd`. Records must appear in
/// block order.
pub fn read_signature<R: Read>(signature: R) -> Result<(BlockSize, Vec<BlockHash>), FrameError> {
    let mut decoder = FrameDecoder::new(signature);
    let block_size = decoder.read_block_size()?;
    let mut blocks = Vec::new();
    while let Some(block) = decoder.read_block_hash()? {
        let expected = blocks.len() as u32;
        if block.index != expected {
            return Err(FrameError::BlockOutOfOrder {
                expected,
                found: block.index,
            });
        }
        blocks.push(block);
    }
    Ok((block_size, blocks))
}

/// Compute the delta turning the basis described by `signature` into
/// `target`, writing the framed operations to `out`.
///
/// With `opts.check` set, the new file is hashed while it is read and the
/// digest is appended as a final `Operation::Checksum`. If the engine fails the
/// sentinel is never written.
pub fn generate_delta<E, S, R, W>(
    engine: &E,
    signature: S,
    target: R,
    out: W,
    opts: &PipelineOptions,
) -> Result<DeltaStats, PipelineError>
where
    E: SyncEngine,
    S: Read,
    R: Read,
    W: Write,
{
    let (block_size, blocks) = read_signature(signature)?;
    log::debug!("delta: loaded {} signature blocks ({block_size})", blocks.len());

    let mut encoder = FrameEncoder::new(out);
    encoder.write_block_size(block_size)?;

    let mut stats = DeltaStats {
        block_size: Some(block_size),
        signature_blocks: blocks.len() as u64,
        ..Default::default()
    };
    let mut hasher = opts.check.then(|| opts.checksum.hasher());

    engine.delta(target, block_size, &blocks, hasher.as_mut(), |op| {
        match &op {
            Operation::Copy { len, .. } => {
                stats.copy_ops += 1;
                stats.copied_bytes += len;
            }
            Operation::Insert(data) => {
                stats.insert_ops += 1;
                stats.literal_bytes += data.len() as u64;
            }
            Operation::Checksum(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "sync engine emitted a checksum sentinel",
                ));
            }
        }
        encoder.write_operation(&op)?;
        encoder.flush()
    })?;
    drop(blocks);

    if let Some(hasher) = hasher {
        let digest = hasher.finalize();
        log::debug!(
            "delta: {} checksum {}",
            opts.checksum,
            crate::checksum::to_hex(&digest)
        );
        encoder.write_operation(&Operation::Checksum(digest.clone()))?;
        stats.checksum = Some(digest);
    }
    encoder.flush()?;

    log::debug!(
        "delta: {} copies ({} bytes), {} inserts ({} bytes)",
        stats.copy_ops,
        stats.copied_bytes,
        stats.insert_ops,
        stats.literal_bytes
    );
    Ok(stats)
}
