//! Headless `soffice` conversion engine.
//!
//! One [`SofficeEngine`] owns a private user profile for its whole lifetime,
//! so repeated conversions skip first-start profile creation and never
//! collide with a desktop session's profile lock.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ConversionEngine, EngineError, EngineProvider};
use crate::install::{InstallResolver, Installation};
use crate::types::{ConversionJob, EngineConfig, InputLocation};

/// Name of the engine binary inside an installation's `program` directory.
pub const SOFFICE_BIN: &str = "soffice";

/// Drives `soffice --headless --convert-to`.
#[derive(Debug)]
pub struct SofficeEngine {
    binary: PathBuf,
    profile: TempDir,
    timeout: Option<Duration>,
}

impl SofficeEngine {
    /// Bring up an engine for `install`.
    pub fn init(install: &Installation, timeout: Option<Duration>) -> Result<Self, EngineError> {
        let binary = install.path.join(SOFFICE_BIN);
        if !binary.is_file() {
            return Err(EngineError::init(format!(
                "{} not found in {}",
                SOFFICE_BIN,
                install.path.display()
            )));
        }

        let profile = tempfile::Builder::new()
            .prefix("officeconv-profile-")
            .tempdir()
            .map_err(|e| EngineError::init(format!("cannot create profile directory: {}", e)))?;

        info!(binary = %binary.display(), profile = %profile.path().display(), "engine ready");
        Ok(Self {
            binary,
            profile,
            timeout,
        })
    }

    fn profile_arg(&self) -> OsString {
        let mut arg = OsString::from("-env:UserInstallation=file://");
        arg.push(self.profile.path());
        arg
    }

    async fn run(&self, job: &ConversionJob, target: &str, outdir: &Path) -> Result<(), EngineError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless")
            .arg("--norestore")
            .arg("--nologo")
            .arg(self.profile_arg())
            .arg("--convert-to")
            .arg(target)
            .arg("--outdir")
            .arg(outdir);
        match &job.input {
            InputLocation::Path(path) => cmd.arg(path),
            InputLocation::Url(url) => cmd.arg(url),
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(?cmd, "running engine");
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| EngineError::Timeout(limit))??,
            None => cmd.output().await?,
        };

        if !output.status.success() {
            return Err(EngineError::load(format!(
                "{} exited with {}: {}",
                SOFFICE_BIN,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversionEngine for SofficeEngine {
    async fn convert(&mut self, job: &ConversionJob) -> Result<(), EngineError> {
        let format = match job.format.as_deref() {
            Some(format) => format.to_string(),
            None => infer_format(&job.output)?,
        };
        let target = convert_target(&format, job.options.as_deref());

        // Scratch directory next to the output keeps the final rename on
        // one filesystem.
        let parent = match job.output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let outdir = tempfile::Builder::new()
            .prefix(".officeconv-")
            .tempdir_in(&parent)
            .map_err(|e| EngineError::export(format!("cannot write to {}: {}", parent.display(), e)))?;

        self.run(job, &target, outdir.path()).await?;

        let produced = first_file(outdir.path()).await?.ok_or_else(|| {
            EngineError::load(format!("{} produced no output for {}", SOFFICE_BIN, job.input))
        })?;
        move_file(&produced, &job.output).await
    }
}

/// `format[:options]` argument for `--convert-to`.
fn convert_target(format: &str, options: Option<&str>) -> String {
    match options {
        Some(options) => format!("{}:{}", format, options),
        None => format.to_string(),
    }
}

/// Use the output file's extension when no format was given.
fn infer_format(output: &Path) -> Result<String, EngineError> {
    output
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| {
            EngineError::export(format!(
                "no format given and none can be inferred from {}",
                output.display()
            ))
        })
}

async fn first_file(dir: &Path) -> Result<Option<PathBuf>, EngineError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

async fn move_file(from: &Path, to: &Path) -> Result<(), EngineError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| EngineError::export(format!("cannot write {}: {}", to.display(), e)))?;
    Ok(())
}

/// Resolves an installation and starts a [`SofficeEngine`] on it.
#[derive(Debug, Clone)]
pub struct SofficeProvider {
    resolver: InstallResolver,
    timeout: Option<Duration>,
}

impl SofficeProvider {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            resolver: InstallResolver::new(config),
            timeout: config.convert_timeout,
        }
    }

    pub fn with_resolver(resolver: InstallResolver, timeout: Option<Duration>) -> Self {
        Self { resolver, timeout }
    }
}

#[async_trait]
impl EngineProvider for SofficeProvider {
    async fn init(&self) -> Result<Box<dyn ConversionEngine>, EngineError> {
        let install = self.resolver.resolve()?;
        let engine = SofficeEngine::init(&install, self.timeout)?;
        Ok(Box::new(engine))
    }
}
