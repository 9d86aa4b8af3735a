// Patch pipeline: basis + framed delta stream -> reconstructed file.
//
// Two concurrent halves joined by a bounded channel:
//
//   decode thread                         calling thread
//   ─────────────                         ──────────────
//   read block size                       engine.apply(basis, out, rx, hasher)
//   loop read_operation ── sync_channel ──▶ consumes ops in order
//     Checksum → captured, not forwarded
//   EOF / error → sender dropped (channel closed)
//
// The decoder blocks once the channel is full. Decode errors are returned
// from the thread and checked after the join even when the apply side
// succeeded, so a truncated or corrupt delta is never reported as success.

use std::io::{Read, Seek, Write};
use std::sync::mpsc;
use std::thread;

use super::{PipelineError, PipelineOptions};
use crate::engine::SyncEngine;
use crate::framing::{BlockSize, FrameDecoder, FrameError, Operation};

/// Statistics returned by `apply_patch()`.
#[derive(Debug, Clone, Default)]
pub struct PatchStats {
    /// Block size read from the delta header.
    pub block_size: Option<BlockSize>,
    /// Operations handed to the engine (sentinel excluded).
    pub operations: u64,
    /// Bytes written to the output.
    pub output_size: u64,
    /// Whether the whole-file checksum was compared and matched.
    pub checksum_verified: bool,
}

/// What the decode thread hands back when it finishes.
struct DecodeOutcome {
    block_size: Option<BlockSize>,
    forwarded: u64,
    checksum: Option<Vec<u8>>,
    error: Option<FrameError>,
}

/// Reconstruct the new file from `basis` and the framed `delta`, writing it
/// to `out`.
///
/// Error precedence after both halves finish: engine error, then decode
/// error, then (when checking) missing or mismatching checksum.
pub fn apply_patch<E, B, D, W>(
    engine: &E,
    basis: B,
    delta: D,
    out: W,
    opts: &PipelineOptions,
) -> Result<PatchStats, PipelineError>
where
    E: SyncEngine,
    B: Read + Seek,
    D: Read + Send,
    W: Write,
{
    let (tx, rx) = mpsc::sync_channel::<Operation>(opts.channel_capacity);
    let mut hasher = opts.check.then(|| opts.checksum.hasher());

    let (applied, decoded) = thread::scope(|s| {
        let decoder = s.spawn(move || decode_operations(delta, tx));
        let applied = engine.apply(basis, out, rx, hasher.as_mut());
        // `rx` was consumed by `apply`, so a decoder blocked on a full
        // channel sees a disconnect and exits.
        (applied, decoder.join())
    });

    let decoded = decoded.map_err(|_| PipelineError::DecoderPanicked)?;
    let output_size = applied?;
    if let Some(e) = decoded.error {
        return Err(e.into());
    }

    let mut stats = PatchStats {
        block_size: decoded.block_size,
        operations: decoded.forwarded,
        output_size,
        checksum_verified: false,
    };

    let Some(hasher) = hasher else {
        log::debug!("patch: checksum verification disabled");
        return Ok(stats);
    };
    let Some(expected) = decoded.checksum else {
        return Err(PipelineError::MissingChecksum);
    };
    let actual = hasher.finalize();
    if expected != actual {
        return Err(PipelineError::ChecksumMismatch { expected, actual });
    }
    log::debug!(
        "patch: {} checksum verified ({})",
        opts.checksum,
        crate::checksum::to_hex(&actual)
    );
    stats.checksum_verified = true;
    Ok(stats)
}

/// Decode half. Owns the sender; dropping it on return closes the channel on
/// every exit path.
fn decode_operations<D: Read>(delta: D, tx: mpsc::SyncSender<Operation>) -> DecodeOutcome {
    let mut outcome = DecodeOutcome {
        block_size: None,
        forwarded: 0,
        checksum: None,
        error: None,
    };
    let mut decoder = FrameDecoder::new(delta);

    match decoder.read_block_size() {
        Ok(bs) => outcome.block_size = Some(bs),
        Err(e) => {
            outcome.error = Some(e);
            return outcome;
        }
    }
    log::trace!("patch: delta block size {:?}", outcome.block_size);

    loop {
        match decoder.read_operation() {
            Ok(None) => break,
            Ok(Some(Operation::Checksum(sum))) => {
                if outcome.checksum.is_some() {
                    log::warn!("patch: delta carries more than one checksum; using the last");
                }
                outcome.checksum = Some(sum);
            }
            Ok(Some(op @ (Operation::Copy { .. } | Operation::Insert(_)))) => {
                if tx.send(op).is_err() {
                    // Apply side stopped early; its error is reported instead.
                    log::debug!("patch: applier hung up after {} operations", outcome.forwarded);
                    break;
                }
                outcome.forwarded += 1;
            }
            Err(e) => {
                log::debug!("patch: decode failed after {} records: {e}", decoder.records_read());
                outcome.error = Some(e);
                break;
            }
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
