// Parallel byte-for-byte comparator.
//
//   left reader ──▶ sync_channel(queue_depth) ──┐
//                                               ├──▶ merge loop (calling thread)
//   right reader ─▶ sync_channel(queue_depth) ──┘        │
//        ▲                                              │ spent buffers
//        └────────────────── BufferPool ◀───────────────┘
//
// Each buffer has exactly one owner at a time: pool, reader, queue, merge
// loop, then back to the pool. Read errors travel on a separate small
// channel and are checked before every merge step and whenever a queue
// closes. Whatever way the merge loop exits, the pool is closed and both
// queues are dropped, so readers blocked on either one wake up and exit
// before the scope joins them.

pub mod pool;

pub use pool::BufferPool;

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use thiserror::Error;

/// Default number of pooled buffers.
pub const DEFAULT_BUFFERS: usize = 30;
/// Default size of one pooled buffer (32 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;
/// Default depth of each reader's chunk queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

// Each reader reports at most one error.
const ERROR_QUEUE_DEPTH: usize = 4;

// ---------------------------------------------------------------------------
// Options / results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub buffers: usize,
    pub buffer_size: usize,
    pub queue_depth: usize,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            buffers: DEFAULT_BUFFERS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl CompareOptions {
    /// One reader can hold `queue_depth` queued chunks, one chunk blocked in
    /// `send` and the merge loop's current chunk. The pool must leave at
    /// least one buffer for the other reader beyond that.
    fn normalized(&self) -> Self {
        let min_buffers = self.queue_depth.saturating_add(3);
        if self.buffers < min_buffers {
            log::debug!(
                "compare: raising buffer count from {} to {min_buffers} for queue depth {}",
                self.buffers,
                self.queue_depth
            );
        }
        Self {
            buffers: self.buffers.max(min_buffers),
            buffer_size: self.buffer_size.max(1),
            queue_depth: self.queue_depth,
        }
    }
}

/// Result of a successful comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareStats {
    /// Bytes compared on each side.
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("size different: {left} bytes vs {right} bytes")]
    SizeDifferent { left: u64, right: u64 },

    /// One stream ended while the other still had data.
    #[error("length different: {shorter} input ends at byte {offset}")]
    LengthDifferent { shorter: Side, offset: u64 },

    #[error("files differ at byte offset {offset}")]
    BytesDiffer { offset: u64 },

    #[error("read error on {side} input: {source}")]
    Read {
        side: Side,
        #[source]
        source: io::Error,
    },

    #[error("{0} reader thread panicked")]
    ReaderPanicked(Side),
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compare two open files. Sizes are checked from metadata first; a mismatch
/// fails without reading any content.
pub fn compare_files(
    left: File,
    right: File,
    opts: &CompareOptions,
) -> Result<CompareStats, CompareError> {
    let left_len = left.metadata()?.len();
    let right_len = right.metadata()?.len();
    if left_len != right_len {
        return Err(CompareError::SizeDifferent {
            left: left_len,
            right: right_len,
        });
    }
    compare_streams(left, right, opts)
}

/// Compare two streams byte for byte, reading both concurrently.
pub fn compare_streams<L, R>(
    left: L,
    right: R,
    opts: &CompareOptions,
) -> Result<CompareStats, CompareError>
where
    L: Read + Send,
    R: Read + Send,
{
    let opts = opts.normalized();
    let pool = BufferPool::new(opts.buffers, opts.buffer_size);
    let (left_tx, left_rx) = mpsc::sync_channel(opts.queue_depth);
    let (right_tx, right_rx) = mpsc::sync_channel(opts.queue_depth);
    let (err_tx, err_rx) = mpsc::sync_channel(ERROR_QUEUE_DEPTH);

    thread::scope(|s| {
        let pool = &pool;
        let left_err = err_tx.clone();
        let left_reader = s.spawn(move || read_side(left, Side::Left, pool, left_tx, left_err));
        let right_reader = s.spawn(move || read_side(right, Side::Right, pool, right_tx, err_tx));

        let merged = {
            let _close = ClosePool(pool);
            merge(pool, left_rx, right_rx, &err_rx)
        };

        // A panicked reader drops its sender, which looks like a clean end of
        // stream to the merge loop; never let that pass as a match.
        if left_reader.join().is_err() {
            return Err(CompareError::ReaderPanicked(Side::Left));
        }
        if right_reader.join().is_err() {
            return Err(CompareError::ReaderPanicked(Side::Right));
        }
        let bytes = merged?;
        log::debug!("compare: {bytes} bytes identical");
        Ok(CompareStats { bytes })
    })
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Filled prefix of a pooled buffer.
struct Chunk {
    buf: Vec<u8>,
    len: usize,
}

fn read_side<R: Read>(
    mut input: R,
    side: Side,
    pool: &BufferPool,
    queue: SyncSender<Chunk>,
    errors: SyncSender<(Side, io::Error)>,
) {
    loop {
        let Some(mut buf) = pool.acquire() else {
            // Pool closed: the merge loop has finished.
            return;
        };
        let len = match read_retrying(&mut input, &mut buf) {
            Ok(0) => {
                pool.release(buf);
                log::trace!("compare: {side} input at end of stream");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                pool.release(buf);
                let _ = errors.send((side, e));
                return;
            }
        };
        if let Err(mpsc::SendError(chunk)) = queue.send(Chunk { buf, len }) {
            pool.release(chunk.buf);
            return;
        }
    }
}

fn read_retrying<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match input.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

// ---------------------------------------------------------------------------
// Merge loop
// ---------------------------------------------------------------------------

struct ClosePool<'a>(&'a BufferPool);

impl Drop for ClosePool<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// One side's current chunk and read position.
struct Cursor {
    queue: Receiver<Chunk>,
    current: Option<Chunk>,
    pos: usize,
}

impl Cursor {
    fn new(queue: Receiver<Chunk>) -> Self {
        Self {
            queue,
            current: None,
            pos: 0,
        }
    }

    fn remaining(&self) -> &[u8] {
        match &self.current {
            Some(chunk) => &chunk.buf[self.pos..chunk.len],
            None => &[],
        }
    }

    /// Make sure unread bytes are available. Returns `false` once the
    /// reader has closed its queue.
    fn refill(&mut self, pool: &BufferPool) -> bool {
        if !self.remaining().is_empty() {
            return true;
        }
        if let Some(spent) = self.current.take() {
            pool.release(spent.buf);
        }
        self.pos = 0;
        match self.queue.recv() {
            Ok(chunk) => {
                self.current = Some(chunk);
                true
            }
            Err(_) => false,
        }
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }
}

fn check_errors(errors: &Receiver<(Side, io::Error)>) -> Result<(), CompareError> {
    match errors.try_recv() {
        Ok((side, source)) => Err(CompareError::Read { side, source }),
        Err(_) => Ok(()),
    }
}

fn merge(
    pool: &BufferPool,
    left: Receiver<Chunk>,
    right: Receiver<Chunk>,
    errors: &Receiver<(Side, io::Error)>,
) -> Result<u64, CompareError> {
    let mut left = Cursor::new(left);
    let mut right = Cursor::new(right);
    let mut offset = 0u64;

    loop {
        check_errors(errors)?;

        if !left.refill(pool) {
            check_errors(errors)?;
            if right.refill(pool) {
                return Err(CompareError::LengthDifferent {
                    shorter: Side::Left,
                    offset,
                });
            }
            check_errors(errors)?;
            return Ok(offset);
        }
        if !right.refill(pool) {
            check_errors(errors)?;
            return Err(CompareError::LengthDifferent {
                shorter: Side::Right,
                offset,
            });
        }

        let a = left.remaining();
        let b = right.remaining();
        let n = a.len().min(b.len());
        if let Some(i) = a[..n].iter().zip(&b[..n]).position(|(x, y)| x != y) {
            return Err(CompareError::BytesDiffer {
                offset: offset + i as u64,
            });
        }
        offset += n as u64;
        left.advance(n);
        right.advance(n);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
