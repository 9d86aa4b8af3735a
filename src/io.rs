// File-level helpers for the signature, delta and patch pipelines.
//
// Provides `signature_file()`, `delta_file()`, `patch_file()` and
// `compare_paths()`, which open their inputs, wrap them in buffered readers and
// writers and run the matching pipeline with the built-in `RsyncEngine`.
// Outputs are refused if they already exist unless `overwrite` is set, or if
// they name one of the inputs. A partially written output is removed when its
// pipeline or the final flush fails.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compare::{self, CompareError, CompareOptions, CompareStats};
use crate::engine::RsyncEngine;
use crate::pipeline::{self, DeltaStats, PipelineError, PipelineOptions};

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `signature_file()`.
#[derive(Debug, Clone)]
pub struct SignatureFileStats {
    pub basis_size: u64,
    pub signature_size: u64,
    pub block_size: usize,
    pub blocks: u64,
}

/// Statistics returned by `delta_file()`.
#[derive(Debug, Clone)]
pub struct DeltaFileStats {
    pub signature_size: u64,
    pub new_size: u64,
    pub delta_size: u64,
    /// Operation counts and checksum from the delta pipeline.
    pub delta: DeltaStats,
}

/// Statistics returned by `patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchFileStats {
    pub basis_size: u64,
    pub delta_size: u64,
    pub output_size: u64,
    pub operations: u64,
    pub checksum_verified: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Output exists and overwriting was not requested.
    #[error("output file exists, use -f to overwrite: {}", .0.display())]
    Exists(PathBuf),

    /// Output path resolves to one of the inputs.
    #[error("output {} is the same file as input {}", .output.display(), .input.display())]
    SameFile { output: PathBuf, input: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Compare(#[from] CompareError),
}

impl FileError {
    /// True for errors the user can fix by changing the command line.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Exists(_) | Self::SameFile { .. })
    }
}

// ---------------------------------------------------------------------------
// signature_file
// ---------------------------------------------------------------------------

/// Write the signature of `basis_path` to `signature_path`.
pub fn signature_file(
    basis_path: &Path,
    signature_path: &Path,
    opts: &PipelineOptions,
    overwrite: bool,
) -> Result<SignatureFileStats, FileError> {
    let basis = open_input(basis_path)?;
    let basis_size = basis.metadata()?.len();
    let basis_reader = BufReader::with_capacity(BUF_SIZE, basis);

    check_distinct(signature_path, &[basis_path])?;
    let (stats, signature_size) = write_output(signature_path, overwrite, |writer| {
        Ok(pipeline::generate_signature(
            &RsyncEngine::default(),
            basis_reader,
            writer,
            opts,
        )?)
    })?;

    Ok(SignatureFileStats {
        basis_size,
        signature_size,
        block_size: stats.block_size.get(),
        blocks: stats.blocks,
    })
}

// ---------------------------------------------------------------------------
// delta_file
// ---------------------------------------------------------------------------

/// Compute the delta from the basis described by `signature_path` to
/// `new_path`, writing it to `delta_path`.
pub fn delta_file(
    signature_path: &Path,
    new_path: &Path,
    delta_path: &Path,
    opts: &PipelineOptions,
    overwrite: bool,
) -> Result<DeltaFileStats, FileError> {
    let signature = open_input(signature_path)?;
    let signature_size = signature.metadata()?.len();
    let new_file = open_input(new_path)?;
    let new_size = new_file.metadata()?.len();

    check_distinct(delta_path, &[signature_path, new_path])?;
    let (delta, delta_size) = write_output(delta_path, overwrite, |writer| {
        Ok(pipeline::generate_delta(
            &RsyncEngine::default(),
            BufReader::with_capacity(BUF_SIZE, signature),
            BufReader::with_capacity(BUF_SIZE, new_file),
            writer,
            opts,
        )?)
    })?;

    Ok(DeltaFileStats {
        signature_size,
        new_size,
        delta_size,
        delta,
    })
}

// ---------------------------------------------------------------------------
// patch_file
// ---------------------------------------------------------------------------

/// Rebuild the new file from `basis_path` and `delta_path` into `output_path`.
pub fn patch_file(
    basis_path: &Path,
    delta_path: &Path,
    output_path: &Path,
    opts: &PipelineOptions,
    overwrite: bool,
) -> Result<PatchFileStats, FileError> {
    let basis = open_input(basis_path)?;
    let basis_size = basis.metadata()?.len();
    let delta = open_input(delta_path)?;
    let delta_size = delta.metadata()?.len();

    check_distinct(output_path, &[basis_path, delta_path])?;
    let (stats, output_size) = write_output(output_path, overwrite, |writer| {
        Ok(pipeline::apply_patch(
            &RsyncEngine::default(),
            BufReader::with_capacity(BUF_SIZE, basis),
            BufReader::with_capacity(BUF_SIZE, delta),
            writer,
            opts,
        )?)
    })?;

    Ok(PatchFileStats {
        basis_size,
        delta_size,
        output_size,
        operations: stats.operations,
        checksum_verified: stats.checksum_verified,
    })
}

// ---------------------------------------------------------------------------
// compare_paths
// ---------------------------------------------------------------------------

/// Byte-for-byte comparison of two files.
pub fn compare_paths(
    left: &Path,
    right: &Path,
    opts: &CompareOptions,
) -> Result<CompareStats, FileError> {
    let left_file = open_input(left)?;
    let right_file = open_input(right)?;
    Ok(compare::compare_files(left_file, right_file, opts)?)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_input(path: &Path) -> Result<File, FileError> {
    File::open(path).map_err(|source| FileError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn create_output(path: &Path, overwrite: bool) -> Result<BufWriter<File>, FileError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let file = options.open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::AlreadyExists {
            FileError::Exists(path.to_path_buf())
        } else {
            FileError::Create {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Ok(BufWriter::with_capacity(BUF_SIZE, file))
}

/// Refuse an existing `output` that resolves to one of `inputs`.
fn check_distinct(output: &Path, inputs: &[&Path]) -> Result<(), FileError> {
    // A missing output cannot alias an input that was just opened.
    let Ok(resolved) = fs::canonicalize(output) else {
        return Ok(());
    };
    for input in inputs {
        if fs::canonicalize(input).is_ok_and(|p| p == resolved) {
            return Err(FileError::SameFile {
                output: output.to_path_buf(),
                input: input.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Create `path`, run `produce` against it, flush, and return the result with
/// the final file size. On any failure after creation the file is removed.
fn write_output<T, F>(path: &Path, overwrite: bool, produce: F) -> Result<(T, u64), FileError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T, FileError>,
{
    let mut writer = create_output(path, overwrite)?;
    let result = produce(&mut writer).and_then(|value| Ok((value, finish_output(writer)?)));
    result.map_err(|e| {
        match fs::remove_file(path) {
            Ok(()) => log::debug!("removed incomplete output {}", path.display()),
            Err(rm) => log::warn!("could not remove incomplete output {}: {rm}", path.display()),
        }
        e
    })
}

/// Flush the writer and return the size of the file it produced.
fn finish_output(writer: BufWriter<File>) -> Result<u64, FileError> {
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(file.metadata()?.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
