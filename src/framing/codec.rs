// Streaming encoder/decoder for signature and delta record streams.
//
// Layout:
//   signature = varint(block_size) { varint(index) weak:u32be varint(n) strong[n] }*
//   delta     = varint(block_size) { tag payload }*
//
// Operation payloads:
//   0x01 Copy      varint(offset) varint(len)
//   0x02 Insert    varint(n) bytes[n]
//   0x03 Checksum  varint(n) bytes[n]
//
// There is no trailer: end-of-stream at a record boundary terminates the stream.

use std::io::{self, Read, Write};

use super::FrameError;
use super::record::{BlockHash, BlockSize, Operation};
use super::varint::{self, VarIntError};

/// Upper bound for a single length-prefixed payload. Larger lengths are
/// treated as corruption rather than allocated.
pub const MAX_PAYLOAD_LEN: u64 = 64 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Writes framed records to an output stream.
pub struct FrameEncoder<W: Write> {
    inner: W,
    scratch: Vec<u8>,
    records: u64,
}

impl<W: Write> FrameEncoder<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: Vec::with_capacity(64),
            records: 0,
        }
    }

    /// Write the stream header.
    pub fn write_block_size(&mut self, block_size: BlockSize) -> io::Result<()> {
        varint::write_u64(&mut self.inner, block_size.to_wire())
    }

    /// Write one signature record.
    pub fn write_block_hash(&mut self, block: &BlockHash) -> io::Result<()> {
        self.scratch.clear();
        varint::push_u64(&mut self.scratch, u64::from(block.index));
        self.scratch.extend_from_slice(&block.weak.to_be_bytes());
        varint::push_u64(&mut self.scratch, block.strong.len() as u64);
        self.scratch.extend_from_slice(&block.strong);
        self.inner.write_all(&self.scratch)?;
        self.records += 1;
        Ok(())
    }

    /// Write one delta record.
    pub fn write_operation(&mut self, op: &Operation) -> io::Result<()> {
        self.scratch.clear();
        self.scratch.push(op.tag());
        match op {
            Operation::Copy { offset, len } => {
                varint::push_u64(&mut self.scratch, *offset);
                varint::push_u64(&mut self.scratch, *len);
                self.inner.write_all(&self.scratch)?;
            }
            Operation::Insert(data) | Operation::Checksum(data) => {
                varint::push_u64(&mut self.scratch, data.len() as u64);
                // Literal payloads can be large; avoid copying them into scratch.
                self.inner.write_all(&self.scratch)?;
                self.inner.write_all(data)?;
            }
        }
        self.records += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Records written so far (header excluded).
    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Reads framed records from an input stream.
pub struct FrameDecoder<R: Read> {
    inner: R,
    records: u64,
}

impl<R: Read> FrameDecoder<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, records: 0 }
    }

    /// Read the stream header.
    ///
    /// An exhausted stream is `FrameError::UnexpectedEnd`: a record stream
    /// without its header is structurally incomplete.
    pub fn read_block_size(&mut self) -> Result<BlockSize, FrameError> {
        match varint::read_u64(&mut self.inner) {
            Ok(Some(raw)) => BlockSize::from_wire(raw),
            Ok(None) | Err(VarIntError::Truncated) => Err(FrameError::UnexpectedEnd),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the next signature record, or `None` at end-of-stream.
    pub fn read_block_hash(&mut self) -> Result<Option<BlockHash>, FrameError> {
        let Some(index) = varint::read_u64(&mut self.inner)? else {
            return Ok(None);
        };
        let index = u32::try_from(index).map_err(|_| FrameError::VarIntOverflow)?;
        let mut weak = [0u8; 4];
        self.read_exact(&mut weak)?;
        let strong = self.read_payload()?;
        self.records += 1;
        Ok(Some(BlockHash {
            index,
            weak: u32::from_be_bytes(weak),
            strong,
        }))
    }

    /// Read the next delta record, or `None` at end-of-stream.
    pub fn read_operation(&mut self) -> Result<Option<Operation>, FrameError> {
        let Some(tag) = varint::read_byte(&mut self.inner)? else {
            return Ok(None);
        };
        let op = match tag {
            Operation::TAG_COPY => {
                let offset = self.read_varint()?;
                let len = self.read_varint()?;
                Operation::Copy { offset, len }
            }
            Operation::TAG_INSERT => Operation::Insert(self.read_payload()?),
            Operation::TAG_CHECKSUM => Operation::Checksum(self.read_payload()?),
            other => return Err(FrameError::UnknownTag(other)),
        };
        self.records += 1;
        Ok(Some(op))
    }

    /// Records decoded so far (header excluded).
    pub fn records_read(&self) -> u64 {
        self.records
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    // Inside a record every byte is mandatory.
    fn read_varint(&mut self) -> Result<u64, FrameError> {
        match varint::read_u64(&mut self.inner)? {
            Some(v) => Ok(v),
            None => Err(FrameError::TruncatedRecord),
        }
    }

    fn read_payload(&mut self) -> Result<Vec<u8>, FrameError> {
        let len = self.read_varint()?;
        if len > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge(len));
        }
        let mut data = vec![0u8; len as usize];
        self.read_exact(&mut data)?;
        Ok(data)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FrameError> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                FrameError::TruncatedRecord
            } else {
                FrameError::Io(e)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_ops(block_size: BlockSize, ops: &[Operation]) -> Vec<u8> {
        let mut enc = FrameEncoder::new(Vec::<u8>::new());
        enc.write_block_size(block_size).unwrap();
        for op in ops {
            enc.write_operation(op).unwrap();
        }
        enc.into_inner()
    }

    #[test]
    fn operations_roundtrip_exactly() {
        let ops = vec![
            Operation::Copy { offset: 0, len: 6144 },
            Operation::Insert(b"literal bytes".to_vec()),
            Operation::Insert(Vec::new()),
            Operation::Copy {
                offset: u64::MAX - 1,
                len: 1,
            },
            Operation::Checksum(vec![0xAB; 32]),
        ];
        let bytes = encode_ops(BlockSize::DEFAULT, &ops);

        let mut dec = FrameDecoder::new(bytes.as_slice());
        assert_eq!(dec.read_block_size().unwrap(), BlockSize::DEFAULT);
        let mut decoded = Vec::new();
        while let Some(op) = dec.read_operation().unwrap() {
            decoded.push(op);
        }
        assert_eq!(decoded, ops);
        assert_eq!(dec.records_read(), ops.len() as u64);
    }

    #[test]
    fn block_hashes_roundtrip() {
        let blocks: Vec<BlockHash> = (0..3)
            .map(|i| BlockHash {
                index: i,
                weak: 0xDEAD_0000 | i,
                strong: vec![i as u8; 16],
            })
            .collect();
        let mut enc = FrameEncoder::new(Vec::<u8>::new());
        enc.write_block_size(BlockSize::new(512).unwrap()).unwrap();
        for b in &blocks {
            enc.write_block_hash(b).unwrap();
        }
        assert_eq!(enc.records_written(), 3);
        let bytes = enc.into_inner();

        let mut dec = FrameDecoder::new(bytes.as_slice());
        assert_eq!(dec.read_block_size().unwrap().get(), 512);
        let mut decoded = Vec::new();
        while let Some(b) = dec.read_block_hash().unwrap() {
            decoded.push(b);
        }
        assert_eq!(decoded, blocks);
    }

    #[test]
    fn empty_stream_header_is_unexpected_end() {
        let mut dec = FrameDecoder::new(&[][..]);
        assert!(matches!(
            dec.read_block_size(),
            Err(FrameError::UnexpectedEnd)
        ));
    }

    #[test]
    fn half_written_header_is_unexpected_end() {
        let mut dec = FrameDecoder::new(&[0xB0][..]);
        assert!(matches!(
            dec.read_block_size(),
            Err(FrameError::UnexpectedEnd)
        ));
    }

    #[test]
    fn zero_block_size_rejected() {
        let mut dec = FrameDecoder::new(&[0x00][..]);
        assert!(matches!(
            dec.read_block_size(),
            Err(FrameError::InvalidBlockSize(0))
        ));
    }

    #[test]
    fn end_of_stream_after_header_is_not_an_error() {
        let bytes = encode_ops(BlockSize::DEFAULT, &[]);
        let mut dec = FrameDecoder::new(bytes.as_slice());
        dec.read_block_size().unwrap();
        assert!(dec.read_operation().unwrap().is_none());
        assert!(dec.read_operation().unwrap().is_none());
    }

    #[test]
    fn unknown_tag_rejected() {
        let mut bytes = encode_ops(BlockSize::DEFAULT, &[]);
        bytes.push(0x7E);
        let mut dec = FrameDecoder::new(bytes.as_slice());
        dec.read_block_size().unwrap();
        assert!(matches!(
            dec.read_operation(),
            Err(FrameError::UnknownTag(0x7E))
        ));
    }

    #[test]
    fn truncated_insert_payload() {
        let mut bytes = encode_ops(BlockSize::DEFAULT, &[Operation::Insert(vec![7; 40])]);
        bytes.truncate(bytes.len() - 5);
        let mut dec = FrameDecoder::new(bytes.as_slice());
        dec.read_block_size().unwrap();
        assert!(matches!(
            dec.read_operation(),
            Err(FrameError::TruncatedRecord)
        ));
    }

    #[test]
    fn truncated_copy_fields() {
        let mut bytes = encode_ops(BlockSize::DEFAULT, &[]);
        bytes.extend_from_slice(&[Operation::TAG_COPY, 0x05]);
        let mut dec = FrameDecoder::new(bytes.as_slice());
        dec.read_block_size().unwrap();
        assert!(matches!(
            dec.read_operation(),
            Err(FrameError::TruncatedRecord)
        ));
    }

    #[test]
    fn oversize_payload_rejected_without_allocating() {
        let mut bytes = encode_ops(BlockSize::DEFAULT, &[]);
        bytes.push(Operation::TAG_INSERT);
        varint::push_u64(&mut bytes, MAX_PAYLOAD_LEN + 1);
        let mut dec = FrameDecoder::new(bytes.as_slice());
        dec.read_block_size().unwrap();
        assert!(matches!(
            dec.read_operation(),
            Err(FrameError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn truncated_block_hash() {
        let mut enc = FrameEncoder::new(Vec::<u8>::new());
        enc.write_block_size(BlockSize::DEFAULT).unwrap();
        enc.write_block_hash(&BlockHash {
            index: 0,
            weak: 1,
            strong: vec![9; 16],
        })
        .unwrap();
        let mut bytes = enc.into_inner();
        bytes.pop();
        let mut dec = FrameDecoder::new(bytes.as_slice());
        dec.read_block_size().unwrap();
        assert!(matches!(
            dec.read_block_hash(),
            Err(FrameError::TruncatedRecord)
        ));
    }
}
