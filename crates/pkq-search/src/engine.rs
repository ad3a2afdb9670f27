//! # Streaming Search Engine
//!
//! Pulls records from a [`RecordSource`] one at a time, runs each through the
//! [`FilterPredicate`] and hands accepted records to a [`ResultSink`] before
//! the next record is pulled.
//!
//! - Discovery order is preserved; nothing is sorted or batched.
//! - At most one record is in flight; results are never accumulated.
//! - The [`CancelToken`] is checked before each pull and again before each
//!   evaluation. A tripped token ends the scan with
//!   [`ScanStatus::Cancelled`] and no further sink calls.
//! - The source is closed on every exit path.

use std::io;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use pkq_core::PackageRecord;
use pkq_source::RecordSource;

use crate::cancel::CancelToken;
use crate::predicate::{FilterPredicate, TextMatch, Verdict};
use crate::SearchError;

/// Consumer of accepted records.
///
/// Called once per accepted record, in discovery order. A slow sink stalls
/// the scan. An error from the sink stops the scan.
pub trait ResultSink {
    fn emit(&mut self, record: &PackageRecord, matched: Option<&TextMatch>) -> io::Result<()>;
}

impl<F> ResultSink for F
where
    F: FnMut(&PackageRecord, Option<&TextMatch>) -> io::Result<()>,
{
    fn emit(&mut self, record: &PackageRecord, matched: Option<&TextMatch>) -> io::Result<()> {
        self(record, matched)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// The source was read to exhaustion.
    Completed,
    /// The operator stopped the scan. Results already emitted stand.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub status: ScanStatus,
    /// Records pulled and evaluated.
    pub scanned: u64,
    /// Records handed to the sink.
    pub emitted: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Run one scan of `source` through `predicate` into `sink`.
pub fn run<S, K>(
    source: &mut S,
    predicate: &FilterPredicate,
    sink: &mut K,
    cancel: &CancelToken,
) -> Result<ScanSummary, SearchError>
where
    S: RecordSource,
    K: ResultSink + ?Sized,
{
    let start = Instant::now();

    if cancel.is_cancelled() {
        return Ok(ScanSummary {
            status: ScanStatus::Cancelled,
            scanned: 0,
            emitted: 0,
            elapsed: start.elapsed(),
        });
    }

    let stream = source.open().map_err(SearchError::SourceUnavailable)?;
    info!(
        source = %source.describe(),
        pattern = predicate.matcher().as_str(),
        fragments = predicate.matcher().fragment_count(),
        scope = ?predicate.scope(),
        state = %predicate.state_filter(),
        reverse = predicate.is_reverse(),
        "scan started"
    );

    let outcome = drive(stream, predicate, sink, cancel);
    // The stream is gone by now; closing releases the source.
    source.close();

    let mut counters = outcome?;
    counters.elapsed = start.elapsed();
    info!(
        status = ?counters.status,
        scanned = counters.scanned,
        emitted = counters.emitted,
        elapsed_ms = counters.elapsed.as_millis() as u64,
        "scan finished"
    );
    Ok(counters)
}

fn drive<I, K>(
    mut stream: I,
    predicate: &FilterPredicate,
    sink: &mut K,
    cancel: &CancelToken,
) -> Result<ScanSummary, SearchError>
where
    I: Iterator<Item = pkq_source::SourceResult<PackageRecord>>,
    K: ResultSink + ?Sized,
{
    let mut summary = ScanSummary {
        status: ScanStatus::Completed,
        scanned: 0,
        emitted: 0,
        elapsed: Duration::ZERO,
    };

    loop {
        if cancel.is_cancelled() {
            summary.status = ScanStatus::Cancelled;
            break;
        }
        let Some(item) = stream.next() else {
            break;
        };
        // The pull may have blocked for a while.
        if cancel.is_cancelled() {
            summary.status = ScanStatus::Cancelled;
            break;
        }

        let record = item.map_err(|source| SearchError::SourceInterrupted {
            emitted: summary.emitted,
            source,
        })?;
        summary.scanned += 1;

        if let Verdict::Emit(matched) = predicate.evaluate(&record) {
            sink.emit(&record, matched.as_ref())
                .map_err(|source| SearchError::Sink {
                    emitted: summary.emitted,
                    source,
                })?;
            summary.emitted += 1;
        }
    }

    if summary.status == ScanStatus::Cancelled {
        debug!(emitted = summary.emitted, "scan cancelled");
    }
    Ok(summary)
}
