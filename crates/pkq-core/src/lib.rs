//! # pkq-core — The Record Model
//!
//! Defines what a package looks like once it leaves the package database:
//! a [`PackageRecord`] with a name, a free-text description and an
//! [`InstallState`]. Every other crate in the workspace speaks in these types.
//!
//! The emit rule shared by the filter predicate and the proofs in
//! `pkq-verify` lives here as [`emit_decision`]:
//!
//! ```text
//! emit = state_accepted AND (text_matched XOR reverse)
//! ```
//!
//! `reverse` inverts only the text-match outcome. The install-state gate is
//! never inverted.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Install State
// =============================================================================

/// Whether a package is currently installed on the system.
///
/// Derived from the package database at enumeration time and never mutated
/// by the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Installed,
    NotInstalled,
}

impl InstallState {
    #[inline]
    pub fn is_installed(self) -> bool {
        matches!(self, Self::Installed)
    }

    /// Short marker used in listings: `[i]` installed, `[u]` not installed.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Installed => "[i]",
            Self::NotInstalled => "[u]",
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed => write!(f, "installed"),
            Self::NotInstalled => write!(f, "not installed"),
        }
    }
}

/// Gate restricting results to installed, not-installed, or either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStateFilter {
    #[default]
    Any,
    InstalledOnly,
    NotInstalledOnly,
}

impl InstallStateFilter {
    /// Build the filter from the two mutually exclusive command-line switches.
    /// `installed_only` wins if both are somehow set.
    pub fn from_flags(installed_only: bool, not_installed_only: bool) -> Self {
        if installed_only {
            Self::InstalledOnly
        } else if not_installed_only {
            Self::NotInstalledOnly
        } else {
            Self::Any
        }
    }

    /// Returns `true` if a package in `state` passes this gate.
    #[inline]
    pub fn accepts(self, state: InstallState) -> bool {
        match self {
            Self::Any => true,
            Self::InstalledOnly => state.is_installed(),
            Self::NotInstalledOnly => !state.is_installed(),
        }
    }
}

impl fmt::Display for InstallStateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "all"),
            Self::InstalledOnly => write!(f, "installed"),
            Self::NotInstalledOnly => write!(f, "uninstalled"),
        }
    }
}

/// The single emit rule: the state gate AND the (possibly reversed) text match.
#[inline]
pub const fn emit_decision(state_accepted: bool, text_matched: bool, reverse: bool) -> bool {
    state_accepted && (text_matched != reverse)
}

// =============================================================================
// Package Record
// =============================================================================

/// One entry from the package database.
///
/// Created by a record source for the duration of one scan pass and
/// immutable once produced. `version` and `architecture` are carried for
/// display only; the matcher never looks at them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Unique within one database snapshot. Foreign-architecture packages
    /// carry a `name:arch` suffix.
    pub name: String,

    /// Free text, possibly multi-line, possibly empty.
    #[serde(default)]
    pub description: String,

    pub install_state: InstallState,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub architecture: String,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, install_state: InstallState) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            install_state,
            version: String::new(),
            architecture: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    #[inline]
    pub fn is_installed(&self) -> bool {
        self.install_state.is_installed()
    }

    /// First line of the description (the synopsis), or `""`.
    pub fn summary(&self) -> &str {
        self.description.lines().next().unwrap_or("").trim()
    }
}
