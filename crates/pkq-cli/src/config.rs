//! Configuration file (`config.toml`).
//!
//! Looked up at `--config`, then `$PKQ_CONFIG`, then
//! `$HOME/.config/pkq/config.toml`. A missing file means defaults; a file
//! that does not parse is reported and ignored.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use pkq_source::dpkg::{DEFAULT_LISTS_DIR, DEFAULT_STATUS_FILE};
use pkq_source::loader::DEFAULT_CHANNEL_DEPTH;

use crate::render::OutputFormat;

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
    #[serde(default = "default_lists_dir")]
    pub lists_dir: PathBuf,
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default = "default_channel_depth")]
    pub channel_depth: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            status_file: default_status_file(),
            lists_dir: default_lists_dir(),
            root: None,
            arch: None,
            channel_depth: default_channel_depth(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct SearchConfig {
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub names_only: bool,
    #[serde(default)]
    pub short: bool,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_status_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATUS_FILE)
}
fn default_lists_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LISTS_DIR)
}
fn default_channel_depth() -> usize {
    DEFAULT_CHANNEL_DEPTH
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{0}")]
    Read(#[from] io::Error),
    #[error("{0}")]
    Parse(#[from] toml::de::Error),
}

/// Where to look for the config file.
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_path_from(explicit, env::var_os("PKQ_CONFIG"), env::var_os("HOME"))
}

fn resolve_path_from(
    explicit: Option<&Path>,
    pkq_config: Option<OsString>,
    home: Option<OsString>,
) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| pkq_config.filter(|v| !v.is_empty()).map(PathBuf::from))
        .or_else(|| {
            home.filter(|v| !v.is_empty())
                .map(|h| PathBuf::from(h).join(".config/pkq/config.toml"))
        })
}

/// Read `path`. `Ok(None)` when the file does not exist.
pub fn load(path: &Path) -> Result<Option<Config>, LoadError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LoadError::Read(e)),
    };
    toml::from_str(&content).map(Some).map_err(LoadError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database.status_file, PathBuf::from("/var/lib/dpkg/status"));
        assert_eq!(config.database.channel_depth, 256);
        assert_eq!(config.search.format, OutputFormat::Text);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [database]
            root = "/srv/chroot"
            arch = "arm64"

            [search]
            ignore_case = true
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.root, Some(PathBuf::from("/srv/chroot")));
        assert_eq!(config.database.arch.as_deref(), Some("arm64"));
        assert_eq!(config.database.lists_dir, PathBuf::from("/var/lib/apt/lists"));
        assert!(config.search.ignore_case);
        assert!(!config.search.short);
        assert_eq!(config.search.format, OutputFormat::Json);
    }

    #[test]
    fn test_load_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(&dir.path().join("absent.toml")), Ok(None)));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[search]\nignore_case = maybe\n").unwrap();
        assert!(matches!(load(&broken), Err(LoadError::Parse(_))));

        let good = dir.path().join("good.toml");
        fs::write(&good, "[search]\nshort = true\n").unwrap();
        let config = load(&good).unwrap().unwrap();
        assert!(config.search.short);
    }

    #[test]
    fn test_path_precedence() {
        let explicit = Path::new("/etc/pkq.toml");
        assert_eq!(
            resolve_path_from(Some(explicit), Some("/env.toml".into()), Some("/home/u".into())),
            Some(PathBuf::from("/etc/pkq.toml"))
        );
        assert_eq!(
            resolve_path_from(None, Some("/env.toml".into()), Some("/home/u".into())),
            Some(PathBuf::from("/env.toml"))
        );
        assert_eq!(
            resolve_path_from(None, None, Some("/home/u".into())),
            Some(PathBuf::from("/home/u/.config/pkq/config.toml"))
        );
        assert_eq!(resolve_path_from(None, Some("".into()), None), None);
    }
}
