//! # Loader — Background Database Reader
//!
//! Parses the package database on its own thread and hands records to the
//! consumer through a bounded channel. The consumer evaluates record *n*
//! while the loader parses record *n+1*; neither side ever holds the whole
//! database.
//!
//! The loader stops when:
//! - every index has been read,
//! - a read fails (the error is the last item sent),
//! - the stop flag is set ([`RecordSource::close`](crate::RecordSource::close)),
//! - the [`RecordStream`] is dropped.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use pkq_core::PackageRecord;

use crate::control::{parse_stanza, Origin};
use crate::index::IndexFile;
use crate::{SourceError, SourceResult};

/// Default number of parsed records allowed to queue ahead of the consumer.
pub const DEFAULT_CHANNEL_DEPTH: usize = 256;

/// Everything the loader thread needs. The status file is opened by the
/// caller so that an unreadable database fails before the thread starts.
pub struct LoadJob {
    pub status: IndexFile,
    pub package_lists: Vec<PathBuf>,
    pub native_arch: String,
    pub channel_depth: usize,
}

/// Counters reported when the loader finishes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoaderStats {
    pub files_read: usize,
    pub stanzas_read: u64,
    pub records_sent: u64,
    pub duplicates: u64,
    pub cruft: u64,
}

/// Start the loader thread. `stop` is shared with the owning source.
pub fn spawn(job: LoadJob, stop: Arc<AtomicBool>) -> std::io::Result<RecordStream> {
    let (tx, rx) = mpsc::sync_channel(job.channel_depth.max(1));
    let thread_stop = stop.clone();

    let handle = thread::Builder::new()
        .name("pkq-loader".into())
        .spawn(move || {
            let mut feeder = Feeder {
                tx,
                stop: thread_stop,
                seen: HashSet::new(),
                native_arch: job.native_arch,
                stats: LoaderStats::default(),
            };
            feeder.run(job.status, &job.package_lists);
            feeder.stats
        })?;

    Ok(RecordStream {
        rx: Some(rx),
        stop,
        handle: Some(handle),
    })
}

// =============================================================================
// Producer side
// =============================================================================

struct Feeder {
    tx: SyncSender<SourceResult<PackageRecord>>,
    stop: Arc<AtomicBool>,
    /// `name:arch` keys already sent. The status file is read first, so an
    /// installed package shadows the same package in the lists.
    seen: HashSet<String>,
    native_arch: String,
    stats: LoaderStats,
}

impl Feeder {
    fn run(&mut self, status: IndexFile, lists: &[PathBuf]) {
        if !self.feed(&status, Origin::Status) {
            return;
        }
        drop(status);

        for path in lists {
            if self.stopped() {
                return;
            }
            let index = match IndexFile::open(path) {
                Ok(index) => index,
                Err(source) => {
                    let _ = self.tx.send(Err(SourceError::Read {
                        path: path.clone(),
                        source,
                    }));
                    return;
                }
            };
            if !self.feed(&index, Origin::List) {
                return;
            }
        }
    }

    /// Send every new record in `index`. Returns `false` once the consumer
    /// is gone or a stop was requested.
    fn feed(&mut self, index: &IndexFile, origin: Origin) -> bool {
        debug!(path = %index.path().display(), bytes = index.len(), "reading index");
        self.stats.files_read += 1;

        for stanza in index.stanzas() {
            if self.stopped() {
                return false;
            }
            self.stats.stanzas_read += 1;

            let Some(parsed) = parse_stanza(&stanza, origin, &self.native_arch) else {
                self.stats.cruft += 1;
                continue;
            };
            if !self.seen.insert(parsed.key) {
                self.stats.duplicates += 1;
                continue;
            }
            if self.tx.send(Ok(parsed.record)).is_err() {
                // Consumer dropped the stream.
                return false;
            }
            self.stats.records_sent += 1;
        }
        true
    }

    #[inline]
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Consumer side
// =============================================================================

/// The lazy record sequence handed out by [`DpkgSource`](crate::DpkgSource).
///
/// Iteration blocks only while the loader is still parsing. Dropping the
/// stream stops the loader and joins its thread.
pub struct RecordStream {
    rx: Option<Receiver<SourceResult<PackageRecord>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<LoaderStats>>,
}

impl RecordStream {
    /// Join the loader after its channel closed. A panicked loader is
    /// reported as [`SourceError::LoaderDied`] instead of a clean end.
    fn finish(&mut self) -> Option<SourceResult<PackageRecord>> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(stats) => {
                debug!(
                    files = stats.files_read,
                    stanzas = stats.stanzas_read,
                    records = stats.records_sent,
                    duplicates = stats.duplicates,
                    cruft = stats.cruft,
                    "record loader finished"
                );
                None
            }
            Err(_) => {
                warn!("record loader thread panicked");
                Some(Err(SourceError::LoaderDied))
            }
        }
    }
}

impl Iterator for RecordStream {
    type Item = SourceResult<PackageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let rx = self.rx.as_ref()?;
        match rx.recv() {
            Ok(item) => Some(item),
            Err(_) => {
                self.rx = None;
                self.finish()
            }
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Closing the receiver unblocks a loader waiting on a full channel.
        drop(self.rx.take());
        let _ = self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn job(status: &std::path::Path, lists: Vec<PathBuf>, depth: usize) -> LoadJob {
        LoadJob {
            status: IndexFile::open(status).unwrap(),
            package_lists: lists,
            native_arch: "amd64".into(),
            channel_depth: depth,
        }
    }

    #[test]
    fn test_status_then_lists_without_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let status = write(
            dir.path(),
            "status",
            "Package: vim\nStatus: install ok installed\nArchitecture: amd64\nVersion: 2\n",
        );
        let list = write(
            dir.path(),
            "a_Packages",
            "Package: vim\nArchitecture: amd64\nVersion: 3\n\n\
             Package: vim-tiny\nArchitecture: amd64\nVersion: 3\n",
        );

        let stop = Arc::new(AtomicBool::new(false));
        let stream = spawn(job(&status, vec![list], 4), stop).unwrap();
        let records: Vec<PackageRecord> = stream.map(|r| r.unwrap()).collect();

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["vim", "vim-tiny"]);
        assert!(records[0].is_installed());
        assert_eq!(records[0].version, "2");
        assert!(!records[1].is_installed());
    }

    #[test]
    fn test_unreadable_list_ends_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let status = write(dir.path(), "status", "Package: a\nVersion: 1\n");
        let missing = dir.path().join("gone_Packages");

        let stop = Arc::new(AtomicBool::new(false));
        let items: Vec<SourceResult<PackageRecord>> =
            spawn(job(&status, vec![missing], 4), stop).unwrap().collect();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(SourceError::Read { .. })));
    }

    #[test]
    fn test_dropping_stream_releases_blocked_loader() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (0..100)
            .map(|i| format!("Package: p{}\nVersion: 1\n\n", i))
            .collect();
        let status = write(dir.path(), "status", &body);

        let stop = Arc::new(AtomicBool::new(false));
        let mut stream = spawn(job(&status, vec![], 1), stop.clone()).unwrap();
        assert!(stream.next().is_some());
        // The loader is now blocked on the depth-1 channel; drop must not hang.
        drop(stream);
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn test_stop_flag_truncates_stream() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (0..100)
            .map(|i| format!("Package: p{}\nVersion: 1\n\n", i))
            .collect();
        let status = write(dir.path(), "status", &body);

        let stop = Arc::new(AtomicBool::new(false));
        let mut stream = spawn(job(&status, vec![], 1), stop.clone()).unwrap();
        assert!(stream.next().is_some());
        stop.store(true, Ordering::Relaxed);
        let rest = stream.count();
        assert!(rest < 99);
    }
}
