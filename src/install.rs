//! Engine installation discovery.
//!
//! Resolution order:
//! 1. explicit override (`LO_PATH`), returned without any check
//! 2. platform well-known locations, first one holding a version marker
//! 3. versioned directories under the scan root (`/opt/libreoffice<M>.<m>`),
//!    newest version wins
//!
//! Unlike a plain `DT_DIR`/`DT_UNKNOWN` filter, the scan also follows
//! symlinked `libreoffice<M>.<m>` entries; they count when the version marker
//! resolves through the link.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::types::{EngineConfig, INSTALL_PATH_ENV};

/// File that must exist (as a regular file) inside a usable installation.
pub const VERSION_MARKER: &str = "versionrc";

/// Name prefix of versioned installation directories under the scan root.
pub const SCAN_PREFIX: &str = "libreoffice";

/// Sub-directory of a versioned installation that holds the engine.
const PROGRAM_DIR: &str = "program";

/// Scanned installations must be strictly newer than this.
pub const VERSION_FLOOR: EngineVersion = EngineVersion { major: 4, minor: 2 };

#[cfg(target_os = "macos")]
const WELL_KNOWN_PATHS: &[&str] = &["/Applications/LibreOffice.app/Contents/MacOS"];

#[cfg(all(not(target_os = "macos"), target_pointer_width = "64"))]
const WELL_KNOWN_PATHS: &[&str] = &[
    "/usr/lib/libreoffice/program",
    "/usr/lib64/libreoffice/program",
];

#[cfg(all(not(target_os = "macos"), not(target_pointer_width = "64")))]
const WELL_KNOWN_PATHS: &[&str] = &["/usr/lib/libreoffice/program"];

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "engine installation not found; set {var} to the 'program' directory, \
         e.g. {var}=/opt/libreoffice/program",
        var = INSTALL_PATH_ENV
    )]
    NotFound,
}

/// `major.minor` version parsed from an installation directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
}

impl EngineVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse the `<major>.<minor>` that follows [`SCAN_PREFIX`] in a
    /// directory name. Further components (`7.6.2`) are ignored.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(SCAN_PREFIX)?;
        let mut parts = rest.split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        Some(Self { major, minor })
    }
}

fn parse_component(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A scanned installation that passed the marker check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCandidate {
    pub path: PathBuf,
    pub version: EngineVersion,
}

/// How an installation was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallSource {
    EnvOverride,
    WellKnown,
    Scanned,
}

/// The installation chosen for engine initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    /// The engine's `program` directory.
    pub path: PathBuf,
    /// Known only for scanned installations.
    pub version: Option<EngineVersion>,
    pub source: InstallSource,
}

/// Locates the engine installation to use.
#[derive(Debug, Clone)]
pub struct InstallResolver {
    env_override: Option<PathBuf>,
    well_known: Vec<PathBuf>,
    scan_root: PathBuf,
}

impl InstallResolver {
    /// Resolver using the platform's well-known locations.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            env_override: config.install_path.clone(),
            well_known: WELL_KNOWN_PATHS.iter().map(PathBuf::from).collect(),
            scan_root: config.scan_root.clone(),
        }
    }

    /// Resolver with explicit locations.
    pub fn with_locations(
        env_override: Option<PathBuf>,
        well_known: Vec<PathBuf>,
        scan_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            env_override,
            well_known,
            scan_root: scan_root.into(),
        }
    }

    /// Pick the installation to initialize.
    pub fn resolve(&self) -> Result<Installation, ResolveError> {
        if let Some(path) = &self.env_override {
            info!(path = %path.display(), "using engine installation from {}", INSTALL_PATH_ENV);
            return Ok(Installation {
                path: path.clone(),
                version: None,
                source: InstallSource::EnvOverride,
            });
        }

        if let Some(path) = self.well_known.iter().find(|p| has_marker(p)) {
            info!(path = %path.display(), "using well-known engine installation");
            return Ok(Installation {
                path: path.clone(),
                version: None,
                source: InstallSource::WellKnown,
            });
        }

        match self.scan() {
            Some(best) => {
                info!(path = %best.path.display(), version = %best.version, "using newest scanned engine installation");
                Ok(Installation {
                    path: best.path,
                    version: Some(best.version),
                    source: InstallSource::Scanned,
                })
            }
            None => Err(ResolveError::NotFound),
        }
    }

    /// Scan the root for versioned installations and return the newest one
    /// above [`VERSION_FLOOR`].
    pub fn scan(&self) -> Option<InstallCandidate> {
        let entries = match fs::read_dir(&self.scan_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.scan_root.display(), "cannot scan for installations: {}", e);
                return None;
            }
        };

        let mut best: Option<InstallCandidate> = None;
        for entry in entries.flatten() {
            // Skip entries that are cheaply known not to be directories.
            // Unknown types and symlinks fall through to the marker check.
            if let Ok(file_type) = entry.file_type() {
                if !file_type.is_dir() && !file_type.is_symlink() {
                    continue;
                }
            }

            let name = entry.file_name();
            let Some(version) = name.to_str().and_then(EngineVersion::from_dir_name) else {
                continue;
            };

            let program = entry.path().join(PROGRAM_DIR);
            if !has_marker(&program) {
                debug!(path = %program.display(), "skipping candidate without {}", VERSION_MARKER);
                continue;
            }

            let floor = best.as_ref().map_or(VERSION_FLOOR, |b| b.version);
            if version > floor {
                best = Some(InstallCandidate {
                    path: program,
                    version,
                });
            }
        }
        best
    }
}

/// True when the version marker is a regular file directly under `dir`.
fn has_marker(dir: &Path) -> bool {
    fs::metadata(dir.join(VERSION_MARKER))
        .map(|m| m.is_file())
        .unwrap_or(false)
}
