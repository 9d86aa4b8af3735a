//! Oxirdiff: rsync-style signature, delta and patch for single files.
//!
//! The crate provides:
//! - A self-delimiting record codec for signature and delta streams (`framing`)
//! - Pluggable whole-file checksums for the delta integrity sentinel (`checksum`)
//! - The `SyncEngine` abstraction and a built-in rsync engine (`engine`)
//! - Streaming signature / delta / patch pipelines (`pipeline`)
//! - A parallel byte-for-byte file comparator (`compare`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::io::Cursor;
//! use oxirdiff::engine::RsyncEngine;
//! use oxirdiff::pipeline::{self, PipelineOptions};
//!
//! let basis = b"hello old world".to_vec();
//! let target = b"hello new world".to_vec();
//! let engine = RsyncEngine::new();
//! let opts = PipelineOptions::default();
//!
//! let mut signature: Vec<u8> = Vec::new();
//! pipeline::generate_signature(&engine, basis.as_slice(), &mut signature, &opts).unwrap();
//! let mut delta: Vec<u8> = Vec::new();
//! pipeline::generate_delta(&engine, signature.as_slice(), target.as_slice(), &mut delta, &opts)
//!     .unwrap();
//! let mut rebuilt: Vec<u8> = Vec::new();
//! pipeline::apply_patch(&engine, Cursor::new(&basis), delta.as_slice(), &mut rebuilt, &opts)
//!     .unwrap();
//! assert_eq!(rebuilt, target);
//! ```

pub mod checksum;
pub mod compare;
pub mod engine;
pub mod framing;
pub mod io;
pub mod pipeline;

#[cfg(feature = "cli")]
pub mod cli;
