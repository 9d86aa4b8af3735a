// Fixed-size buffer pool shared by the comparator's reader threads.
//
// Buffers are allocated once up front. `acquire` blocks while every buffer is
// checked out and returns `None` once the pool is closed, which is how the
// merge loop stops readers that are waiting for memory.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct PoolState {
    free: Vec<Vec<u8>>,
    closed: bool,
}

/// Bounded free list of pre-allocated byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    state: Mutex<PoolState>,
    available: Condvar,
    capacity: usize,
    buffer_size: usize,
}

impl BufferPool {
    /// Allocate `count` buffers of `buffer_size` bytes each.
    pub fn new(count: usize, buffer_size: usize) -> Self {
        let free = (0..count).map(|_| vec![0u8; buffer_size]).collect();
        Self {
            state: Mutex::new(PoolState {
                free,
                closed: false,
            }),
            available: Condvar::new(),
            capacity: count,
            buffer_size,
        }
    }

    /// Take a buffer, waiting for one to be released if none is free.
    ///
    /// Returns `None` after `close()`.
    pub fn acquire(&self) -> Option<Vec<u8>> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(buf) = state.free.pop() {
                return Some(buf);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Hand a buffer back. Buffers returned after `close()` are dropped.
    pub fn release(&self, mut buf: Vec<u8>) {
        let mut state = self.lock();
        if state.closed || state.free.len() >= self.capacity {
            return;
        }
        // Readers may only fill a prefix; restore the full length.
        buf.resize(self.buffer_size, 0);
        state.free.push(buf);
        drop(state);
        self.available.notify_one();
    }

    /// Wake every waiter; later `acquire` calls return `None`.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.free.clear();
        drop(state);
        self.available.notify_all();
    }

    /// Buffers currently sitting in the pool.
    pub fn available(&self) -> usize {
        self.lock().free.len()
    }

    // A panicking holder cannot leave the free list half-updated, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
