//! # pkq-source — The Record Source
//!
//! Produces package records lazily, one at a time, from the system package
//! database. Nothing here knows about patterns or filters; a source only
//! promises a finite, single-pass sequence of [`PackageRecord`]s.
//!
//! - [`DpkgSource`] reads the dpkg status file and the apt package lists,
//!   memory-mapped, on a background loader thread.
//! - [`VecSource`] serves records from memory.

pub mod control;
pub mod cursor;
pub mod dpkg;
pub mod index;
pub mod loader;
pub mod memory;

use std::io;
use std::path::PathBuf;

use pkq_core::PackageRecord;

pub use dpkg::{DatabasePaths, DpkgSource};
pub use loader::RecordStream;
pub use memory::VecSource;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The database could not be opened at all. Nothing was produced.
    #[error("package database {} is unavailable: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read failed after the scan had started.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record source was already opened")]
    AlreadyOpened,

    #[error("record loader stopped unexpectedly")]
    LoaderDied,
}

pub type SourceResult<T> = Result<T, SourceError>;

/// A lazy, single-pass provider of package records.
///
/// `open` fails with [`SourceError::Unavailable`] before yielding anything
/// if the underlying database cannot be opened. Items of the returned stream
/// are `Err` when a read fails mid-scan; consumers stop at the first one.
///
/// `close` is idempotent and releases whatever `open` acquired. A stream
/// still being read when `close` is called ends early.
pub trait RecordSource {
    type Stream: Iterator<Item = SourceResult<PackageRecord>>;

    fn open(&mut self) -> SourceResult<Self::Stream>;

    fn close(&mut self);

    /// Human-readable label for status lines.
    fn describe(&self) -> String {
        "package database".to_string()
    }
}
