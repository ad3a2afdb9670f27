//! In-memory record source.

use pkq_core::PackageRecord;

use crate::{RecordSource, SourceError, SourceResult};

/// Serves a fixed list of items once. Items may include errors, which lets
/// callers exercise mid-scan failures.
pub struct VecSource {
    items: Option<Vec<SourceResult<PackageRecord>>>,
    closed: bool,
}

impl VecSource {
    pub fn new(records: Vec<PackageRecord>) -> Self {
        Self::from_results(records.into_iter().map(Ok).collect())
    }

    pub fn from_results(items: Vec<SourceResult<PackageRecord>>) -> Self {
        Self {
            items: Some(items),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RecordSource for VecSource {
    type Stream = std::vec::IntoIter<SourceResult<PackageRecord>>;

    fn open(&mut self) -> SourceResult<Self::Stream> {
        let items = self.items.take().ok_or(SourceError::AlreadyOpened)?;
        Ok(items.into_iter())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn describe(&self) -> String {
        "in-memory records".to_string()
    }
}
