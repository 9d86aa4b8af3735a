// Record types carried by signature and delta streams.

use std::fmt;
use std::num::NonZeroU32;

use super::FrameError;

// ---------------------------------------------------------------------------
// BlockSize
// ---------------------------------------------------------------------------

/// Number of basis bytes summarized by one signature block.
///
/// Always positive. The same value heads the signature stream and every delta
/// computed against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockSize(NonZeroU32);

impl BlockSize {
    /// Default block size used by the CLI (6 KiB).
    pub const DEFAULT: BlockSize = match NonZeroU32::new(6 * 1024) {
        Some(n) => BlockSize(n),
        None => unreachable!(),
    };

    /// Block size of `bytes` bytes; `None` for zero.
    pub fn new(bytes: u32) -> Option<Self> {
        NonZeroU32::new(bytes).map(Self)
    }

    /// Block size given in KiB; `None` for zero or on overflow.
    pub fn from_kib(kib: u32) -> Option<Self> {
        kib.checked_mul(1024).and_then(Self::new)
    }

    /// Size in bytes.
    #[inline]
    pub fn get(self) -> usize {
        self.0.get() as usize
    }

    pub(crate) fn from_wire(raw: u64) -> Result<Self, FrameError> {
        u32::try_from(raw)
            .ok()
            .and_then(Self::new)
            .ok_or(FrameError::InvalidBlockSize(raw))
    }

    pub(crate) fn to_wire(self) -> u64 {
        u64::from(self.0.get())
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

// ---------------------------------------------------------------------------
// BlockHash
// ---------------------------------------------------------------------------

/// Weak and strong checksum of one basis block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockHash {
    /// Block position in the basis (0-based).
    pub index: u32,
    /// Rolling checksum of the block.
    pub weak: u32,
    /// Strong hash of the block.
    pub strong: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// One record of a delta stream.
///
/// `Copy` and `Insert` reconstruct the new file when applied in order.
/// `Checksum` is the in-band sentinel carrying the whole-file digest of the
/// new file; it is not a reconstruction instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Copy `len` bytes from the basis starting at `offset`.
    Copy { offset: u64, len: u64 },
    /// Insert literal bytes.
    Insert(Vec<u8>),
    /// Whole-file digest of the reconstructed file.
    Checksum(Vec<u8>),
}

impl Operation {
    pub(crate) const TAG_COPY: u8 = 0x01;
    pub(crate) const TAG_INSERT: u8 = 0x02;
    pub(crate) const TAG_CHECKSUM: u8 = 0x03;

    /// Wire tag for this operation.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Copy { .. } => Self::TAG_COPY,
            Self::Insert(_) => Self::TAG_INSERT,
            Self::Checksum(_) => Self::TAG_CHECKSUM,
        }
    }

    /// Number of output bytes this operation produces.
    pub fn output_len(&self) -> u64 {
        match self {
            Self::Copy { len, .. } => *len,
            Self::Insert(data) => data.len() as u64,
            Self::Checksum(_) => 0,
        }
    }

    /// Whether this is the whole-file checksum sentinel.
    pub fn is_checksum(&self) -> bool {
        matches!(self, Self::Checksum(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_rejects_zero() {
        assert!(BlockSize::new(0).is_none());
        assert!(BlockSize::from_kib(0).is_none());
        assert!(BlockSize::from_kib(u32::MAX).is_none());
        assert_eq!(BlockSize::from_kib(6), Some(BlockSize::DEFAULT));
        assert_eq!(BlockSize::DEFAULT.get(), 6144);
    }

    #[test]
    fn block_size_from_wire() {
        assert_eq!(BlockSize::from_wire(512).unwrap().get(), 512);
        assert!(matches!(
            BlockSize::from_wire(0),
            Err(FrameError::InvalidBlockSize(0))
        ));
        assert!(BlockSize::from_wire(u64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn operation_lengths() {
        assert_eq!(Operation::Copy { offset: 9, len: 4 }.output_len(), 4);
        assert_eq!(Operation::Insert(vec![1, 2, 3]).output_len(), 3);
        assert_eq!(Operation::Checksum(vec![0; 32]).output_len(), 0);
        assert!(Operation::Checksum(Vec::new()).is_checksum());
    }
}
