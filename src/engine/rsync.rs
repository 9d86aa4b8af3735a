// Built-in rsync-style engine.
//
// Signature: fixed-size blocks, each summarized by the rolling weak checksum
// and an MD5 strong hash (the last block may be short).
//
// Delta: slide a block-sized window over the new file. A weak hit is
// confirmed with the strong hash; confirmed blocks become COPY operations
// (adjacent ones coalesced), everything else becomes INSERT literals capped at
// `max_literal` bytes. The new file is streamed through a compacting buffer,
// so memory stays bounded by `max_literal + block_size + read_size`.
//
// Apply: COPY seeks the basis and streams `len` bytes, INSERT writes literals.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};

use md5::{Digest, Md5};

use super::rolling::{Rolling, weak_checksum};
use super::{EmitResult, EngineError, SyncEngine};
use crate::checksum::FileHasher;
use crate::framing::{BlockHash, BlockSize, Operation};

/// Default cap on a single INSERT payload (1 MiB).
pub const DEFAULT_MAX_LITERAL: usize = 1024 * 1024;

const DEFAULT_READ_SIZE: usize = 64 * 1024;
const COPY_BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RsyncEngine {
    max_literal: usize,
    read_size: usize,
}

impl Default for RsyncEngine {
    fn default() -> Self {
        Self {
            max_literal: DEFAULT_MAX_LITERAL,
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

impl RsyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap INSERT payloads at `bytes` (minimum 1).
    pub fn with_max_literal(mut self, bytes: usize) -> Self {
        self.max_literal = bytes.max(1);
        self
    }

    /// Read the new file in chunks of `bytes` (minimum 1).
    pub fn with_read_size(mut self, bytes: usize) -> Self {
        self.read_size = bytes.max(1);
        self
    }
}

/// Strong hash of one block.
pub fn strong_hash(data: &[u8]) -> Vec<u8> {
    Md5::digest(data).to_vec()
}

impl SyncEngine for RsyncEngine {
    fn signature<R, F>(
        &self,
        mut basis: R,
        block_size: BlockSize,
        mut emit: F,
    ) -> Result<(), EngineError>
    where
        R: Read,
        F: FnMut(BlockHash) -> EmitResult,
    {
        let bs = block_size.get();
        // Grows with the bytes actually read, not with the requested block size.
        let mut block: Vec<u8> = Vec::with_capacity(bs.min(self.read_size));
        let mut index: u64 = 0;
        loop {
            block.clear();
            let n = basis.by_ref().take(bs as u64).read_to_end(&mut block)?;
            if n == 0 {
                break;
            }
            emit(BlockHash {
                index: u32::try_from(index).map_err(|_| EngineError::TooManyBlocks)?,
                weak: weak_checksum(&block),
                strong: strong_hash(&block),
            })?;
            if n < bs {
                break;
            }
            index += 1;
        }
        Ok(())
    }

    fn delta<R, F>(
        &self,
        mut target: R,
        block_size: BlockSize,
        signature: &[BlockHash],
        mut hasher: Option<&mut FileHasher>,
        emit: F,
    ) -> Result<(), EngineError>
    where
        R: Read,
        F: FnMut(Operation) -> EmitResult,
    {
        let bs = block_size.get();
        let table = BlockTable::new(signature);
        let mut out = OpSink::new(emit);

        let mut buf: Vec<u8> = Vec::with_capacity(self.read_size);
        let mut pos = 0usize;
        let mut lit_start = 0usize;
        let mut eof = false;
        let mut weak: Option<Rolling> = None;

        loop {
            // Keep one full window plus the byte that rolls in next.
            if !eof && buf.len() < pos + bs + 1 {
                if lit_start > 0 && (lit_start >= self.read_size || lit_start * 2 >= buf.len()) {
                    buf.drain(..lit_start);
                    pos -= lit_start;
                    lit_start = 0;
                }
                eof = fill(
                    &mut target,
                    &mut buf,
                    pos + bs + 1,
                    self.read_size,
                    hasher.as_deref_mut(),
                )?;
            }
            if buf.len() - pos < bs {
                break;
            }

            let window = &buf[pos..pos + bs];
            let rolling = *weak.get_or_insert_with(|| Rolling::new(window));
            if let Some(index) = table.find(rolling.digest(), window) {
                out.literal(&buf[lit_start..pos])?;
                out.copy(u64::from(index) * bs as u64, bs as u64)?;
                pos += bs;
                lit_start = pos;
                weak = None;
                continue;
            }

            if pos + bs >= buf.len() {
                // End of input: the remaining window is literal.
                break;
            }
            let mut rolling = rolling;
            rolling.roll(buf[pos], buf[pos + bs]);
            weak = Some(rolling);
            pos += 1;
            if pos - lit_start >= self.max_literal {
                out.literal(&buf[lit_start..pos])?;
                lit_start = pos;
            }
        }

        // Only the final basis block may be shorter than a full window.
        let tail = &buf[pos..];
        let tail_match = if !tail.is_empty() && tail.len() < bs {
            table
                .find(weak_checksum(tail), tail)
                .filter(|&index| table.is_last(index))
        } else {
            None
        };
        match tail_match {
            Some(index) => {
                out.literal(&buf[lit_start..pos])?;
                out.copy(u64::from(index) * bs as u64, tail.len() as u64)?;
            }
            None => out.literal(&buf[lit_start..])?,
        }
        out.finish()?;
        Ok(())
    }

    fn apply<B, W, I>(
        &self,
        mut basis: B,
        mut output: W,
        ops: I,
        mut hasher: Option<&mut FileHasher>,
    ) -> Result<u64, EngineError>
    where
        B: Read + Seek,
        W: Write,
        I: IntoIterator<Item = Operation>,
    {
        let basis_len = basis.seek(SeekFrom::End(0))?;
        let mut basis_pos = basis_len;
        let mut copy_buf = vec![0u8; COPY_BUF_SIZE];
        let mut written = 0u64;

        for op in ops {
            match op {
                Operation::Copy { offset, len } => {
                    let in_range = offset.checked_add(len).is_some_and(|end| end <= basis_len);
                    if !in_range {
                        return Err(EngineError::CopyOutOfRange {
                            offset,
                            len,
                            basis_len,
                        });
                    }
                    if basis_pos != offset {
                        basis.seek(SeekFrom::Start(offset))?;
                    }
                    let mut remaining = len;
                    while remaining > 0 {
                        let n = remaining.min(copy_buf.len() as u64) as usize;
                        basis.read_exact(&mut copy_buf[..n])?;
                        output.write_all(&copy_buf[..n])?;
                        if let Some(h) = hasher.as_deref_mut() {
                            h.update(&copy_buf[..n]);
                        }
                        remaining -= n as u64;
                    }
                    basis_pos = offset + len;
                    written += len;
                }
                Operation::Insert(data) => {
                    output.write_all(&data)?;
                    if let Some(h) = hasher.as_deref_mut() {
                        h.update(&data);
                    }
                    written += data.len() as u64;
                }
                Operation::Checksum(_) => return Err(EngineError::UnexpectedChecksum),
            }
        }
        output.flush()?;
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Block lookup
// ---------------------------------------------------------------------------

/// Weak checksum -> candidate blocks, confirmed by strong hash.
struct BlockTable<'a> {
    by_weak: HashMap<u32, Vec<usize>>,
    blocks: &'a [BlockHash],
}

impl<'a> BlockTable<'a> {
    fn new(blocks: &'a [BlockHash]) -> Self {
        let mut by_weak: HashMap<u32, Vec<usize>> = HashMap::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            by_weak.entry(block.weak).or_default().push(i);
        }
        Self { by_weak, blocks }
    }

    /// Index of a block whose checksums match `data`.
    fn find(&self, weak: u32, data: &[u8]) -> Option<u32> {
        let candidates = self.by_weak.get(&weak)?;
        let strong = strong_hash(data);
        candidates
            .iter()
            .map(|&i| &self.blocks[i])
            .find(|b| b.strong == strong)
            .map(|b| b.index)
    }

    fn is_last(&self, index: u32) -> bool {
        self.blocks.last().is_some_and(|b| b.index == index)
    }
}

// ---------------------------------------------------------------------------
// Operation sink (coalesces adjacent copies)
// ---------------------------------------------------------------------------

struct OpSink<F: FnMut(Operation) -> EmitResult> {
    emit: F,
    pending_copy: Option<(u64, u64)>,
}

impl<F: FnMut(Operation) -> EmitResult> OpSink<F> {
    fn new(emit: F) -> Self {
        Self {
            emit,
            pending_copy: None,
        }
    }

    fn copy(&mut self, offset: u64, len: u64) -> EmitResult {
        if let Some((start, run)) = self.pending_copy.as_mut() {
            if *start + *run == offset {
                *run += len;
                return Ok(());
            }
        }
        self.flush_copy()?;
        self.pending_copy = Some((offset, len));
        Ok(())
    }

    fn literal(&mut self, data: &[u8]) -> EmitResult {
        if data.is_empty() {
            return Ok(());
        }
        self.flush_copy()?;
        (self.emit)(Operation::Insert(data.to_vec()))
    }

    fn flush_copy(&mut self) -> EmitResult {
        match self.pending_copy.take() {
            Some((offset, len)) => (self.emit)(Operation::Copy { offset, len }),
            None => Ok(()),
        }
    }

    fn finish(mut self) -> EmitResult {
        self.flush_copy()
    }
}

// ---------------------------------------------------------------------------
// Read helpers
// ---------------------------------------------------------------------------

/// Append to `buf` until it holds `want` bytes. Returns `true` at end-of-stream.
/// Each read adds at most `chunk` bytes, so `buf` only grows by what the
/// reader actually delivers. Every byte appended is hashed exactly once.
fn fill<R: Read>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    want: usize,
    chunk: usize,
    mut hasher: Option<&mut FileHasher>,
) -> io::Result<bool> {
    while buf.len() < want {
        let start = buf.len();
        buf.resize(start + chunk, 0);
        let n = match read_full_once(reader, &mut buf[start..]) {
            Ok(n) => n,
            Err(e) => {
                buf.truncate(start);
                return Err(e);
            }
        };
        buf.truncate(start + n);
        if n == 0 {
            return Ok(true);
        }
        if let Some(h) = hasher.as_deref_mut() {
            h.update(&buf[start..]);
        }
    }
    Ok(false)
}

fn read_full_once<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
