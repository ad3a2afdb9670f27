//! # pkq — Package Query
//!
//! Searches the dpkg/apt package database by name and description, printing
//! each match as soon as it is found.
//!
//! - `pkq vim` — packages whose name or description matches `vim`.
//! - `pkq -a py dev` — `py` followed somewhere later by `dev`.
//! - `pkq -I -n ^lib` — installed packages whose name starts with `lib`.
//! - `pkq -r -N -n dev` — not-installed packages without `dev` in the name.
//!
//! Exit status: 0 when the scan completes (with or without results), 1 on a
//! bad pattern or database/output failure, 2 when cancelled with Ctrl-C.

mod config;
mod render;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pkq_core::InstallStateFilter;
use pkq_search::{
    CancelToken, FilterPredicate, JoinMode, ResultSink, ScanStatus, ScanSummary, Scope,
    SearchError, SearchRequest,
};
use pkq_source::{DatabasePaths, DpkgSource, RecordSource};

use crate::config::Config;
use crate::render::{JsonSink, OutputFormat, TextSink};

const EXIT_OK: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_CANCELLED: u8 = 2;

/// Search installed and available packages by name and description.
#[derive(Parser, Debug)]
#[command(name = "pkq", version, about, long_about = None)]
struct Cli {
    /// Regular expressions to search for.
    #[arg(required = true)]
    patterns: Vec<String>,

    /// All patterns must match, in the given order (default: any).
    #[arg(short = 'a', long = "all")]
    all: bool,

    /// Case-insensitive matching.
    #[arg(short = 'x', long = "ignorecase", overrides_with = "case_sensitive")]
    ignore_case: bool,

    /// Case-sensitive matching, even if the config file says otherwise.
    #[arg(long, overrides_with = "ignore_case")]
    case_sensitive: bool,

    /// Treat patterns as literal text.
    #[arg(short = 'F', long)]
    fixed_strings: bool,

    /// Search package names only.
    #[arg(short = 'n', long = "names", overrides_with = "descriptions")]
    names_only: bool,

    /// Search names and descriptions, even if the config file says names only.
    #[arg(long, overrides_with = "names_only")]
    descriptions: bool,

    /// Only installed packages.
    #[arg(short = 'I', long, conflicts_with = "not_installed")]
    installed: bool,

    /// Only packages that are not installed.
    #[arg(short = 'N', long)]
    not_installed: bool,

    /// Show packages that do NOT match.
    #[arg(short = 'r', long)]
    reverse: bool,

    /// Only development packages (`…dev` after the query).
    #[arg(short = 'D', long)]
    dev: bool,

    /// Do not print descriptions.
    #[arg(short = 's', long, overrides_with = "long")]
    short: bool,

    /// Print descriptions, even if the config file says short.
    #[arg(long, overrides_with = "short")]
    long: bool,

    /// Do not print status lines.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Output format.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// dpkg status file.
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// apt lists directory.
    #[arg(long)]
    lists_dir: Option<PathBuf>,

    /// Read the database below this root directory.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Native architecture (default: the build target's).
    #[arg(long)]
    arch: Option<String>,

    /// Path to config file.
    #[arg(long)]
    config: Option<PathBuf>,
}

// =============================================================================
// Setup
// =============================================================================

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "pkq=warn,pkq_source=warn,pkq_search=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(explicit: Option<&Path>) -> Config {
    let Some(path) = config::resolve_path(explicit) else {
        return Config::default();
    };
    match config::load(&path) {
        Ok(Some(config)) => {
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        Ok(None) => {
            if explicit.is_some() {
                tracing::warn!("config file {} not found, using defaults", path.display());
            }
            Config::default()
        }
        Err(e) => {
            tracing::warn!("ignoring config file {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// A flag pair wins over the config file; the later flag of the pair wins
/// over the earlier one.
fn switch(on: bool, off: bool, configured: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        configured
    }
}

/// Flags win over the config file.
fn build_request(cli: &Cli, config: &Config) -> SearchRequest {
    SearchRequest {
        patterns: cli.patterns.clone(),
        join: if cli.all {
            JoinMode::AllOrdered
        } else {
            JoinMode::Any
        },
        ignore_case: switch(cli.ignore_case, cli.case_sensitive, config.search.ignore_case),
        fixed_strings: cli.fixed_strings,
        dev_only: cli.dev,
        scope: if switch(cli.names_only, cli.descriptions, config.search.names_only) {
            Scope::NamesOnly
        } else {
            Scope::NamesAndDescriptions
        },
        state_filter: InstallStateFilter::from_flags(cli.installed, cli.not_installed),
        reverse: cli.reverse,
    }
}

fn database_paths(cli: &Cli, config: &Config) -> DatabasePaths {
    let paths = DatabasePaths {
        status_file: cli
            .status_file
            .clone()
            .unwrap_or_else(|| config.database.status_file.clone()),
        lists_dir: Some(
            cli.lists_dir
                .clone()
                .unwrap_or_else(|| config.database.lists_dir.clone()),
        ),
    };
    match cli.root.as_ref().or(config.database.root.as_ref()) {
        Some(root) => paths.under_root(root),
        None => paths,
    }
}

#[cfg(unix)]
fn interrupt_stream() -> io::Result<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
}

#[cfg(windows)]
fn interrupt_stream() -> io::Result<tokio::signal::windows::CtrlC> {
    tokio::signal::windows::ctrl_c()
}

/// Trip `cancel` on Ctrl-C.
///
/// The handler is registered before this returns, so an interrupt that
/// arrives while the watcher thread is still starting is not lost. The wait
/// runs on a small runtime on its own thread so the scan stays synchronous.
fn install_interrupt_handler(cancel: CancelToken) -> io::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut interrupts = {
        let _guard = rt.enter();
        interrupt_stream()?
    };
    std::thread::Builder::new()
        .name("pkq-signal".into())
        .spawn(move || {
            rt.block_on(async {
                if interrupts.recv().await.is_some() {
                    tracing::debug!("interrupt received");
                    cancel.cancel();
                }
            });
        })?;
    Ok(())
}

// =============================================================================
// Status Lines
// =============================================================================

/// Non-critical messages on stderr, silenced by `--quiet`.
struct Status {
    quiet: bool,
}

impl Status {
    fn line(&self, msg: impl std::fmt::Display) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    fn finished(&self, found: u64) {
        self.line(format_args!(
            "\nFinished searching, found {} {}.",
            found,
            if found == 1 { "result" } else { "results" }
        ));
    }

    fn runtime(&self, elapsed: Duration) {
        if elapsed > Duration::from_millis(10) {
            self.line(format_args!("{:.3}s", elapsed.as_secs_f64()));
        }
    }
}

/// The query as the operator would write it as a single expression.
fn display_query(request: &SearchRequest) -> String {
    let gap = match request.join {
        JoinMode::Any => "|",
        JoinMode::AllOrdered => ".*",
    };
    let query = request.patterns.join(gap);
    if request.dev_only {
        format!("{} (dev packages)", query)
    } else {
        query
    }
}

// =============================================================================
// Main
// =============================================================================

fn scan<S: RecordSource>(
    source: &mut S,
    predicate: &FilterPredicate,
    format: OutputFormat,
    short: bool,
    cancel: &CancelToken,
) -> Result<ScanSummary, SearchError> {
    let stdout = io::stdout().lock();
    let mut sink: Box<dyn ResultSink> = match format {
        OutputFormat::Text => Box::new(TextSink::new(stdout, short)),
        OutputFormat::Json => Box::new(JsonSink::new(stdout)),
    };
    pkq_search::run(source, predicate, sink.as_mut(), cancel)
}

fn exit_code(result: &Result<ScanSummary, SearchError>) -> u8 {
    match result {
        Ok(summary) => match summary.status {
            ScanStatus::Completed => EXIT_OK,
            ScanStatus::Cancelled => EXIT_CANCELLED,
        },
        Err(e) if e.is_broken_pipe() => EXIT_OK,
        Err(_) => EXIT_ERROR,
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_ERROR } else { EXIT_OK });
        }
    };
    init_tracing();
    let start = Instant::now();

    let config = load_config(cli.config.as_deref());
    let status = Status { quiet: cli.quiet };
    let request = build_request(&cli, &config);

    let predicate = match request.compile() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("\n{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut source = DpkgSource::new(database_paths(&cli, &config))
        .with_channel_depth(config.database.channel_depth);
    if let Some(arch) = cli.arch.clone().or_else(|| config.database.arch.clone()) {
        source = source.with_native_arch(arch);
    }

    let cancel = CancelToken::new();
    if let Err(e) = install_interrupt_handler(cancel.clone()) {
        tracing::warn!("Ctrl-C handling unavailable: {}", e);
    }

    status.line(format_args!(
        "Searching {} for {}",
        source.describe(),
        display_query(&request)
    ));

    let format = cli.format.unwrap_or(config.search.format);
    let short = switch(cli.short, cli.long, config.search.short);
    let result = scan(&mut source, &predicate, format, short, &cancel);

    match &result {
        Ok(summary) => {
            if summary.status == ScanStatus::Cancelled {
                eprintln!("\nUser cancelled.\n");
            }
            status.finished(summary.emitted);
        }
        Err(e) if e.is_broken_pipe() => {}
        Err(e) => {
            let _ = io::stdout().flush();
            eprintln!("\n{}", e);
            if e.emitted() > 0 {
                status.finished(e.emitted());
            }
        }
    }
    status.runtime(start.elapsed());

    ExitCode::from(exit_code(&result))
}
