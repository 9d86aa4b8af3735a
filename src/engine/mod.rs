// Sync engine: the block-matching algorithms behind signature, delta and patch.
//
// The pipelines only talk to the engine through `SyncEngine`; they own the
// framing, the files and the concurrency. `RsyncEngine` is the built-in
// implementation (rolling weak checksum + MD5 strong hash per block).

pub mod rolling;
pub mod rsync;

use std::io::{Read, Seek, Write};

use thiserror::Error;

use crate::checksum::FileHasher;
use crate::framing::{BlockHash, BlockSize, Operation};

pub use rsync::RsyncEngine;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("copy of {len} bytes at offset {offset} exceeds basis length {basis_len}")]
    CopyOutOfRange {
        offset: u64,
        len: u64,
        basis_len: u64,
    },

    #[error("checksum sentinel passed to delta application")]
    UnexpectedChecksum,

    #[error("basis file has more than {} blocks", u32::MAX)]
    TooManyBlocks,
}

/// Failure reported by an emit callback, or by the engine itself.
///
/// Callbacks write to the output stream, so their failures are I/O errors
/// that must abort generation untouched.
pub type EmitResult = Result<(), std::io::Error>;

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// The three algorithms a delta-transfer run needs.
pub trait SyncEngine {
    /// Read `basis` to its end and call `emit` with one `BlockHash` per block,
    /// in basis order. `emit` is called before the next block is read.
    fn signature<R, F>(&self, basis: R, block_size: BlockSize, emit: F) -> Result<(), EngineError>
    where
        R: Read,
        F: FnMut(BlockHash) -> EmitResult;

    /// Read `target` to its end and call `emit` with the operations that turn
    /// the basis described by `signature` into `target`.
    ///
    /// When `hasher` is given, every byte of `target` is fed to it exactly
    /// once, in order.
    fn delta<R, F>(
        &self,
        target: R,
        block_size: BlockSize,
        signature: &[BlockHash],
        hasher: Option<&mut FileHasher>,
        emit: F,
    ) -> Result<(), EngineError>
    where
        R: Read,
        F: FnMut(Operation) -> EmitResult;

    /// Apply `ops` in order, reading copies from `basis` and writing the
    /// reconstructed file to `output`. When `hasher` is given, every byte
    /// written is fed to it. Returns the number of bytes written.
    fn apply<B, W, I>(
        &self,
        basis: B,
        output: W,
        ops: I,
        hasher: Option<&mut FileHasher>,
    ) -> Result<u64, EngineError>
    where
        B: Read + Seek,
        W: Write,
        I: IntoIterator<Item = Operation>;
}
