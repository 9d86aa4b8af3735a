// Whole-file checksums for the delta integrity sentinel.
//
// The delta side hashes every byte of the new file as it is read; the patch
// side hashes every byte it writes. Both must be configured with the same
// algorithm for the digests to be comparable.

use std::fmt;

use digest::DynDigest;

/// Hash algorithm used for the whole-file checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ChecksumAlgorithm {
    #[default]
    #[cfg_attr(feature = "cli", value(alias = "sha-256"))]
    Sha256,
    Md5,
}

impl ChecksumAlgorithm {
    /// Start a fresh streaming hasher.
    pub fn hasher(self) -> FileHasher {
        let inner: Box<dyn DynDigest + Send> = match self {
            Self::Sha256 => Box::new(sha2::Sha256::default()),
            Self::Md5 => Box::new(md5::Md5::default()),
        };
        FileHasher {
            algorithm: self,
            inner,
            bytes: 0,
        }
    }

    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Md5 => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Md5 => "md5",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming whole-file hasher. Finalized exactly once.
pub struct FileHasher {
    algorithm: ChecksumAlgorithm,
    inner: Box<dyn DynDigest + Send>,
    bytes: u64,
}

impl FileHasher {
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Bytes hashed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    pub fn finalize(self) -> Vec<u8> {
        self.inner.finalize().into_vec()
    }
}

impl fmt::Debug for FileHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHasher")
            .field("algorithm", &self.algorithm)
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// Lowercase hex rendering for logs and error messages.
pub fn to_hex(digest: &[u8]) -> String {
    use fmt::Write;
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(out, "{b:02x}");
    }
    out
}
