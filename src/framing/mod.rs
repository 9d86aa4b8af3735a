// Framing codec for signature and delta streams.
//
// Submodules:
//   - varint: base-128 integers used by every record
//   - record: BlockSize / BlockHash / Operation value types
//   - codec:  FrameEncoder / FrameDecoder over `Write` / `Read`

pub mod codec;
pub mod record;
pub mod varint;

pub use codec::{FrameDecoder, FrameEncoder, MAX_PAYLOAD_LEN};
pub use record::{BlockHash, BlockSize, Operation};

use thiserror::Error;

/// Errors raised while decoding a record stream.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before its block-size header.
    #[error("unexpected end of stream")]
    UnexpectedEnd,

    /// The stream ended in the middle of a record.
    #[error("truncated record")]
    TruncatedRecord,

    #[error("unknown operation tag {0:#04x}")]
    UnknownTag(u8),

    #[error("integer field overflows")]
    VarIntOverflow,

    #[error("payload length {0} exceeds limit of {MAX_PAYLOAD_LEN} bytes")]
    PayloadTooLarge(u64),

    #[error("invalid block size {0}")]
    InvalidBlockSize(u64),

    #[error("signature block {found} out of order, expected {expected}")]
    BlockOutOfOrder { expected: u32, found: u32 },
}

impl From<varint::VarIntError> for FrameError {
    fn from(e: varint::VarIntError) -> Self {
        match e {
            varint::VarIntError::Truncated => Self::TruncatedRecord,
            varint::VarIntError::Overflow => Self::VarIntOverflow,
            varint::VarIntError::Io(e) => Self::Io(e),
        }
    }
}
