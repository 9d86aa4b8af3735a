// Command-line front end for oxirdiff.
//
// One subcommand per verb (signature, delta, patch, test) with the tuning
// flags shared as global options. Exit status: 0 on success, 1 for usage and
// configuration errors, 2 when a verb fails while running.

use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use thiserror::Error;

use crate::checksum::{self, ChecksumAlgorithm};
use crate::compare::CompareOptions;
use crate::io::{self as file_io, FileError};
use crate::pipeline::{ConfigError, PipelineOptions};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_BLOCK_KIB: u32 = 6;

const EXIT_USAGE: i32 = 1;
const EXIT_FAILURE: i32 = 2;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// rsync-style signature, delta and patch for single files.
#[derive(Parser, Debug)]
#[command(
    name = "oxirdiff",
    version,
    about = "rsync-style signature, delta and patch for single files",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Block size in KiB for new signatures.
    #[arg(
        long,
        global = true,
        value_name = "KIB",
        default_value_t = DEFAULT_BLOCK_KIB,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    block: u32,

    /// Embed (delta) and verify (patch) a whole-file checksum.
    #[arg(long, global = true, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    check: bool,

    /// Whole-file checksum algorithm (sha256 or md5). Use the same value for
    /// delta and patch.
    #[arg(
        long,
        global = true,
        value_name = "ALGO",
        value_enum,
        ignore_case = true,
        default_value_t = ChecksumAlgorithm::Sha256
    )]
    checksum: ChecksumAlgorithm,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (errors only).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write the block signature of a basis file.
    Signature {
        #[arg(value_hint = ValueHint::FilePath)]
        basis: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        signature: PathBuf,
    },
    /// Compute the delta from a signature to a new file.
    Delta {
        #[arg(value_hint = ValueHint::FilePath)]
        signature: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        newfile: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        delta: PathBuf,
    },
    /// Rebuild the new file from a basis and a delta.
    Patch {
        #[arg(value_hint = ValueHint::FilePath)]
        basis: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        delta: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        newfile: PathBuf,
    },
    /// Compare two files byte for byte.
    Test {
        #[arg(value_hint = ValueHint::FilePath)]
        file1: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        file2: PathBuf,
    },
}

impl Cmd {
    fn verb(&self) -> &'static str {
        match self {
            Self::Signature { .. } => "signature",
            Self::Delta { .. } => "delta",
            Self::Patch { .. } => "patch",
            Self::Test { .. } => "test",
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    File(#[from] FileError),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_USAGE,
            Self::File(e) if e.is_usage() => EXIT_USAGE,
            Self::File(_) => EXIT_FAILURE,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn pipeline_options(cli: &Cli) -> Result<PipelineOptions, ConfigError> {
    let mut opts = PipelineOptions::with_block_kib(cli.block)?;
    opts.check = cli.check;
    opts.checksum = cli.checksum;
    Ok(opts)
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxirdiff".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = pipeline_options(&cli);
        let _ = log_filter(&cli);
        let _ = cli.command.verb();
    }
}

fn log_filter(cli: &Cli) -> &'static str {
    match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    }
}

/// Run the selected verb and return its stats for `--json`.
fn execute(cli: &Cli) -> Result<serde_json::Value, CliError> {
    let opts = pipeline_options(cli)?;
    let force = cli.force;

    let report = match &cli.command {
        Cmd::Signature { basis, signature } => {
            let s = file_io::signature_file(basis, signature, &opts, force)?;
            log::info!(
                "signature: {} blocks of {} bytes, {} -> {} bytes",
                s.blocks,
                s.block_size,
                s.basis_size,
                s.signature_size
            );
            serde_json::json!({
                "command": "signature",
                "basis_size": s.basis_size,
                "signature_size": s.signature_size,
                "block_size": s.block_size,
                "blocks": s.blocks,
            })
        }
        Cmd::Delta {
            signature,
            newfile,
            delta,
        } => {
            let s = file_io::delta_file(signature, newfile, delta, &opts, force)?;
            log::info!(
                "delta: {} copies, {} literal bytes, {} -> {} bytes",
                s.delta.copy_ops,
                s.delta.literal_bytes,
                s.new_size,
                s.delta_size
            );
            serde_json::json!({
                "command": "delta",
                "signature_size": s.signature_size,
                "new_size": s.new_size,
                "delta_size": s.delta_size,
                "block_size": s.delta.block_size.map(|b| b.get()),
                "signature_blocks": s.delta.signature_blocks,
                "copy_ops": s.delta.copy_ops,
                "insert_ops": s.delta.insert_ops,
                "copied_bytes": s.delta.copied_bytes,
                "literal_bytes": s.delta.literal_bytes,
                "checksum": s.delta.checksum.as_deref().map(checksum::to_hex),
            })
        }
        Cmd::Patch {
            basis,
            delta,
            newfile,
        } => {
            let s = file_io::patch_file(basis, delta, newfile, &opts, force)?;
            log::info!(
                "patch: {} operations, {} bytes written, checksum {}",
                s.operations,
                s.output_size,
                if s.checksum_verified { "verified" } else { "not checked" }
            );
            serde_json::json!({
                "command": "patch",
                "basis_size": s.basis_size,
                "delta_size": s.delta_size,
                "output_size": s.output_size,
                "operations": s.operations,
                "checksum_verified": s.checksum_verified,
            })
        }
        Cmd::Test { file1, file2 } => {
            let s = file_io::compare_paths(file1, file2, &CompareOptions::default())?;
            log::info!("test: {} bytes identical", s.bytes);
            serde_json::json!({
                "command": "test",
                "bytes": s.bytes,
                "identical": true,
            })
        }
    };
    Ok(report)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches the verb and
/// exits with its status code.
pub fn run() -> ! {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                process::exit(EXIT_USAGE);
            }
        },
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&cli)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match execute(&cli) {
        Ok(report) => {
            if cli.json_output {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => eprintln!("{json}"),
                    Err(e) => log::warn!("cannot render stats: {e}"),
                }
            }
            0
        }
        Err(e) => {
            eprintln!("oxirdiff: error in {}: {e}", cli.command.verb());
            e.exit_code()
        }
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
