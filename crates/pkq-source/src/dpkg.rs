//! # dpkg/apt Record Source
//!
//! The system package database as a [`RecordSource`]: the dpkg status file
//! (installed and remembered packages) followed by every `*_Packages` index
//! apt has downloaded, plain or compressed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::control;
use crate::index::{Codec, IndexFile};
use crate::loader::{self, LoadJob, RecordStream, DEFAULT_CHANNEL_DEPTH};
use crate::{RecordSource, SourceError, SourceResult};

pub const DEFAULT_STATUS_FILE: &str = "/var/lib/dpkg/status";
pub const DEFAULT_LISTS_DIR: &str = "/var/lib/apt/lists";

/// Where the database lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePaths {
    pub status_file: PathBuf,
    /// `None` reads the status file only.
    pub lists_dir: Option<PathBuf>,
}

impl Default for DatabasePaths {
    fn default() -> Self {
        Self {
            status_file: PathBuf::from(DEFAULT_STATUS_FILE),
            lists_dir: Some(PathBuf::from(DEFAULT_LISTS_DIR)),
        }
    }
}

impl DatabasePaths {
    /// Re-anchor absolute paths below `root` (a chroot or mounted image).
    pub fn under_root(self, root: &Path) -> Self {
        let anchor = |p: PathBuf| match p.strip_prefix("/") {
            Ok(rel) => root.join(rel),
            Err(_) => root.join(p),
        };
        Self {
            status_file: anchor(self.status_file),
            lists_dir: self.lists_dir.map(anchor),
        }
    }
}

pub struct DpkgSource {
    paths: DatabasePaths,
    native_arch: String,
    channel_depth: usize,
    /// Stop flag of the loader started by the last `open`.
    stop: Option<Arc<AtomicBool>>,
}

impl DpkgSource {
    pub fn new(paths: DatabasePaths) -> Self {
        Self {
            paths,
            native_arch: control::native_arch().to_string(),
            channel_depth: DEFAULT_CHANNEL_DEPTH,
            stop: None,
        }
    }

    pub fn with_native_arch(mut self, arch: impl Into<String>) -> Self {
        self.native_arch = arch.into();
        self
    }

    pub fn with_channel_depth(mut self, depth: usize) -> Self {
        self.channel_depth = depth.max(1);
        self
    }

    pub fn paths(&self) -> &DatabasePaths {
        &self.paths
    }

    fn is_open(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| !stop.load(Ordering::Relaxed))
    }
}

impl Default for DpkgSource {
    fn default() -> Self {
        Self::new(DatabasePaths::default())
    }
}

impl RecordSource for DpkgSource {
    type Stream = RecordStream;

    fn open(&mut self) -> SourceResult<RecordStream> {
        if self.is_open() {
            return Err(SourceError::AlreadyOpened);
        }

        let status_path = &self.paths.status_file;
        let status = IndexFile::open(status_path).map_err(|source| SourceError::Unavailable {
            path: status_path.clone(),
            source,
        })?;

        let package_lists = match &self.paths.lists_dir {
            Some(dir) => match discover_package_lists(dir) {
                Ok(lists) => lists,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot read apt lists, using dpkg status only");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        info!(
            status = %status_path.display(),
            lists = package_lists.len(),
            arch = %self.native_arch,
            "opening package database"
        );

        let stop = Arc::new(AtomicBool::new(false));
        let job = LoadJob {
            status,
            package_lists,
            native_arch: self.native_arch.clone(),
            channel_depth: self.channel_depth,
        };
        let stream = loader::spawn(job, stop.clone()).map_err(|source| SourceError::Unavailable {
            path: status_path.clone(),
            source,
        })?;

        self.stop = Some(stop);
        Ok(stream)
    }

    fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
            debug!("package database closed");
        }
    }

    fn describe(&self) -> String {
        match &self.paths.lists_dir {
            Some(dir) => format!(
                "{} and {}",
                self.paths.status_file.display(),
                dir.display()
            ),
            None => self.paths.status_file.display().to_string(),
        }
    }
}

/// `*_Packages` lists in `dir`, sorted by file name.
///
/// Lists apt keeps compressed (`*_Packages.gz`, `.lz4`, `.xz`, …) are
/// included and decoded when read. Symlinked lists are followed.
pub fn discover_package_lists(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut lists = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Mirror host names carry dots, so only the last one can start an
        // extension.
        let is_list = name.ends_with("_Packages")
            || name.rsplit_once('.').is_some_and(|(stem, ext)| {
                stem.ends_with("_Packages") && Codec::from_extension(ext).is_some()
            });
        if is_list && path.is_file() {
            lists.push(path);
        }
    }

    lists.sort();
    debug!(dir = %dir.display(), count = lists.len(), "found package lists");
    Ok(lists)
}
