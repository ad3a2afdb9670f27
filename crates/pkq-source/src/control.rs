//! # Control Stanza → PackageRecord
//!
//! Turns one deb822 paragraph into a [`PackageRecord`]. Where the paragraph
//! came from decides how its install state is read:
//!
//! - [`Origin::Status`]: the dpkg status file. Installed iff the third word
//!   of `Status:` is `installed`.
//! - [`Origin::List`]: an apt `Packages` index. Always not installed; an
//!   installed package has already been produced from the status file.

use pkq_core::{InstallState, PackageRecord};

use crate::cursor::Stanza;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Status,
    List,
}

/// A record plus the `name:arch` key used to drop repeats across files.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub key: String,
    pub record: PackageRecord,
}

/// Build a record from `stanza`, or `None` for cruft.
///
/// Paragraphs without a `Package` or a `Version` field carry no installable
/// version (purged dpkg entries, truncated lists) and are skipped.
pub fn parse_stanza(stanza: &Stanza<'_>, origin: Origin, native_arch: &str) -> Option<ParsedRecord> {
    let mut package = None;
    let mut version = None;
    let mut architecture = String::new();
    let mut status = None;
    let mut description = String::new();

    for field in stanza.fields() {
        let name = field.name;
        if name.eq_ignore_ascii_case("Package") {
            package = Some(field.first_line());
        } else if name.eq_ignore_ascii_case("Version") {
            version = Some(field.first_line());
        } else if name.eq_ignore_ascii_case("Architecture") {
            architecture = field.first_line();
        } else if name.eq_ignore_ascii_case("Status") {
            status = Some(field.first_line());
        } else if name.eq_ignore_ascii_case("Description") {
            description = field.text();
        }
    }

    let package = package.filter(|p| !p.is_empty())?;
    let version = version.filter(|v| !v.is_empty())?;

    let install_state = match origin {
        Origin::Status => status
            .as_deref()
            .map(state_from_status)
            .unwrap_or(InstallState::NotInstalled),
        Origin::List => InstallState::NotInstalled,
    };

    let key = format!("{}:{}", package, architecture);
    let name = display_name(&package, &architecture, native_arch);

    Some(ParsedRecord {
        key,
        record: PackageRecord::new(name, install_state)
            .with_version(version)
            .with_architecture(architecture)
            .with_description(description),
    })
}

/// `install ok installed` → installed; everything else is not.
pub fn state_from_status(status: &str) -> InstallState {
    match status.split_whitespace().nth(2) {
        Some("installed") => InstallState::Installed,
        _ => InstallState::NotInstalled,
    }
}

/// Multi-arch "pretty" name: foreign architectures get a `:arch` suffix so
/// that names stay unique within a snapshot.
pub fn display_name(package: &str, architecture: &str, native_arch: &str) -> String {
    if architecture.is_empty() || architecture == "all" || architecture == native_arch {
        package.to_string()
    } else {
        format!("{}:{}", package, architecture)
    }
}

/// Debian architecture name of the machine this binary was built for.
pub fn native_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64el",
        "powerpc64" => "ppc64",
        "powerpc" => "powerpc",
        "mips64" => "mips64el",
        "loongarch64" => "loong64",
        other => other,
    }
}
