//! Result sinks for stdout.
//!
//! ```text
//! text    [i] vim                                 : Vi IMproved - enhanced vi editor
//!             2:9.1.0016-1
//! short   [u] vim-tiny                            2:9.1.0016-1
//! json    {"name":"vim","version":"2:9.1.0016-1",...,"matched":"vim"}
//! ```

use std::io::{self, Write};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use pkq_core::PackageRecord;
use pkq_search::{MatchField, ResultSink, TextMatch};

const NAME_WIDTH: usize = 35;
/// Marker, space and padded name, for lines without a description.
const SHORT_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Human-readable results. Flushes after every record so results appear
/// while the scan is still running.
pub struct TextSink<W: Write> {
    out: W,
    short: bool,
    written: u64,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W, short: bool) -> Self {
        Self {
            out,
            short,
            written: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for TextSink<W> {
    fn emit(&mut self, record: &PackageRecord, _matched: Option<&TextMatch>) -> io::Result<()> {
        let head = format!(
            "{} {:<width$}",
            record.install_state.marker(),
            record.name,
            width = NAME_WIDTH
        );

        if self.short {
            writeln!(self.out, "{:<width$} {}", head, record.version, width = SHORT_WIDTH)?;
        } else {
            if self.written > 0 {
                writeln!(self.out)?;
            }
            let summary = record.summary();
            if summary.is_empty() {
                writeln!(self.out, "{}", head.trim_end())?;
            } else {
                writeln!(self.out, "{} : {}", head, summary)?;
            }
            if !record.version.is_empty() {
                writeln!(self.out, "    {}", record.version)?;
            }
        }

        self.written += 1;
        self.out.flush()
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    name: &'a str,
    version: &'a str,
    architecture: &'a str,
    installed: bool,
    description: &'a str,
    matched: Option<&'a str>,
    matched_field: Option<MatchField>,
}

/// One JSON object per line.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for JsonSink<W> {
    fn emit(&mut self, record: &PackageRecord, matched: Option<&TextMatch>) -> io::Result<()> {
        let line = JsonRecord {
            name: &record.name,
            version: &record.version,
            architecture: &record.architecture,
            installed: record.is_installed(),
            description: &record.description,
            matched: matched.map(|m| m.text.as_str()),
            matched_field: matched.map(|m| m.field),
        };
        serde_json::to_writer(&mut self.out, &line)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
