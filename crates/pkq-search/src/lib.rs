//! # pkq-search — Streaming Package Search
//!
//! Compiles the operator's patterns once, then streams every record of a
//! [`RecordSource`] through a [`FilterPredicate`] into a [`ResultSink`].
//!
//! ```text
//!   SearchRequest ──compile──► FilterPredicate
//!                                   │
//!   RecordSource ──pull──► engine::run ──emit──► ResultSink
//!                                   ▲
//!                              CancelToken
//! ```
//!
//! A bad pattern fails before the source is opened. A cancelled scan is not
//! an error: [`engine::run`] returns [`ScanStatus::Cancelled`] with the
//! counts reached so far.

pub mod cancel;
pub mod engine;
pub mod pattern;
pub mod predicate;

use std::io;

use pkq_core::InstallStateFilter;
use pkq_source::{RecordSource, SourceError};
use serde::{Deserialize, Serialize};

pub use cancel::CancelToken;
pub use engine::{run, ResultSink, ScanStatus, ScanSummary};
pub use pattern::{compile, CompiledMatcher, JoinMode, PatternOptions};
pub use predicate::{FilterPredicate, MatchField, Scope, TextMatch, Verdict};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A fragment (or the composed query) is not a valid expression.
    #[error("Bad search query '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The source could not be opened; nothing was emitted.
    #[error("{0}")]
    SourceUnavailable(#[source] SourceError),

    /// The source failed after `emitted` results had been delivered.
    #[error("search stopped after {emitted} result(s): {source}")]
    SourceInterrupted {
        emitted: u64,
        #[source]
        source: SourceError,
    },

    /// The sink refused a result after `emitted` had been delivered.
    #[error("could not write result after {emitted} result(s): {source}")]
    Sink {
        emitted: u64,
        #[source]
        source: io::Error,
    },
}

impl SearchError {
    /// Results delivered before the failure.
    pub fn emitted(&self) -> u64 {
        match self {
            Self::InvalidPattern { .. } | Self::SourceUnavailable(_) => 0,
            Self::SourceInterrupted { emitted, .. } | Self::Sink { emitted, .. } => *emitted,
        }
    }

    /// The sink's reader went away (`pkq … | head`).
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Sink { source, .. } if source.kind() == io::ErrorKind::BrokenPipe)
    }
}

// =============================================================================
// Request
// =============================================================================

/// Everything that shapes one search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub patterns: Vec<String>,
    pub join: JoinMode,
    pub ignore_case: bool,
    pub fixed_strings: bool,
    pub dev_only: bool,
    pub scope: Scope,
    pub state_filter: InstallStateFilter,
    pub reverse: bool,
}

impl SearchRequest {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            join: self.join,
            ignore_case: self.ignore_case,
            fixed_strings: self.fixed_strings,
            dev_only: self.dev_only,
        }
    }

    pub fn compile(&self) -> Result<FilterPredicate, SearchError> {
        let matcher = pattern::compile(&self.patterns, &self.pattern_options())?;
        Ok(FilterPredicate::new(
            matcher,
            self.scope,
            self.state_filter,
            self.reverse,
        ))
    }
}

/// Compile `request` and run one scan of `source` into `sink`.
///
/// The source is not opened when the request does not compile.
pub fn search<S, K>(
    request: &SearchRequest,
    source: &mut S,
    sink: &mut K,
    cancel: &CancelToken,
) -> Result<ScanSummary, SearchError>
where
    S: RecordSource,
    K: ResultSink + ?Sized,
{
    let predicate = request.compile()?;
    engine::run(source, &predicate, sink, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkq_core::{InstallState, PackageRecord};
    use pkq_source::{DatabasePaths, DpkgSource, VecSource};
    use std::fs;

    fn collect_names(
        request: &SearchRequest,
        source: &mut impl RecordSource,
    ) -> (Result<ScanSummary, SearchError>, Vec<String>) {
        let mut seen = Vec::new();
        let mut sink = |r: &PackageRecord, _: Option<&TextMatch>| -> io::Result<()> {
            seen.push(r.name.clone());
            Ok(())
        };
        let result = search(request, source, &mut sink, &CancelToken::new());
        (result, seen)
    }

    #[test]
    fn test_bad_pattern_fails_before_source_is_opened() {
        let mut source = VecSource::new(vec![PackageRecord::new("vim", InstallState::Installed)]);
        let request = SearchRequest::new(["(unclosed"]);
        let (result, seen) = collect_names(&request, &mut source);

        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("Bad search query '(unclosed':"));
        assert_eq!(err.emitted(), 0);
        assert!(seen.is_empty());
        // Untouched: still opens.
        assert!(source.open().is_ok());
    }

    #[test]
    fn test_request_options_flow_into_predicate() {
        let request = SearchRequest {
            patterns: vec!["PY".into(), "DEV".into()],
            join: JoinMode::AllOrdered,
            ignore_case: true,
            scope: Scope::NamesOnly,
            state_filter: InstallStateFilter::NotInstalledOnly,
            reverse: true,
            ..Default::default()
        };
        let predicate = request.compile().unwrap();
        assert_eq!(predicate.matcher().fragment_count(), 2);
        assert_eq!(predicate.scope(), Scope::NamesOnly);
        assert_eq!(predicate.state_filter(), InstallStateFilter::NotInstalledOnly);
        assert!(predicate.is_reverse());

        let request = SearchRequest {
            reverse: false,
            ..request
        };
        let mut source = VecSource::new(vec![
            PackageRecord::new("python3-dev", InstallState::NotInstalled),
            PackageRecord::new("python3-dev:i386", InstallState::Installed),
            PackageRecord::new("devpython", InstallState::NotInstalled),
        ]);
        let (result, seen) = collect_names(&request, &mut source);
        assert_eq!(seen, vec!["python3-dev"]);
        assert_eq!(result.unwrap().emitted, 1);
    }

    #[test]
    fn test_broken_pipe_detection() {
        let err = SearchError::Sink {
            emitted: 3,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "closed"),
        };
        assert!(err.is_broken_pipe());
        assert_eq!(err.emitted(), 3);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"patterns":["vim"],"join":"all_ordered","state_filter":"installed_only"}"#)
                .unwrap();
        assert_eq!(request.join, JoinMode::AllOrdered);
        assert_eq!(request.state_filter, InstallStateFilter::InstalledOnly);
        assert_eq!(request.scope, Scope::NamesAndDescriptions);
    }

    #[test]
    fn test_search_over_dpkg_database() {
        let dir = tempfile::tempdir().unwrap();
        let lists = dir.path().join("lists");
        fs::create_dir(&lists).unwrap();
        fs::write(
            dir.path().join("status"),
            "Package: vim\nStatus: install ok installed\nArchitecture: amd64\n\
             Version: 2:9.0\nDescription: Vi IMproved - enhanced vi editor\n\n\
             Package: removed-thing\nStatus: deinstall ok config-files\nArchitecture: amd64\n",
        )
        .unwrap();
        fs::write(
            lists.join("deb_main_binary-amd64_Packages"),
            "Package: vim\nArchitecture: amd64\nVersion: 2:9.0\n\n\
             Package: vim-tiny\nArchitecture: amd64\nVersion: 2:9.0\n\
             Description: Vi IMproved - compact version\n\n\
             Package: nano\nArchitecture: amd64\nVersion: 7.2\n\
             Description: small editor\n\n\
             Package: vim\nArchitecture: i386\nVersion: 2:9.0\n",
        )
        .unwrap();

        let paths = DatabasePaths {
            status_file: dir.path().join("status"),
            lists_dir: Some(lists),
        };
        let mut source = DpkgSource::new(paths).with_native_arch("amd64");
        let request = SearchRequest::new(["vim"]);
        let (result, seen) = collect_names(&request, &mut source);

        assert_eq!(seen, vec!["vim", "vim-tiny", "vim:i386"]);
        let summary = result.unwrap();
        assert_eq!(summary.status, ScanStatus::Completed);
        assert_eq!(summary.scanned, 4);

        let mut source = DpkgSource::new(DatabasePaths {
            status_file: dir.path().join("status"),
            lists_dir: Some(dir.path().join("lists")),
        })
        .with_native_arch("amd64");
        let request = SearchRequest {
            state_filter: InstallStateFilter::InstalledOnly,
            ..SearchRequest::new(["editor"])
        };
        let (_, seen) = collect_names(&request, &mut source);
        assert_eq!(seen, vec!["vim"]);
    }
}
