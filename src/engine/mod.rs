//! Conversion engine boundary.
//!
//! The engine itself is an external collaborator. [`ConversionEngine`] and
//! [`EngineProvider`] describe what we need from it; [`EngineAdapter`] owns
//! one engine instance and guarantees that nothing the engine does (errors or
//! panics) escapes as anything but an exit code.

pub mod soffice;

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error};

use crate::install::ResolveError;
use crate::types::{exit_code, ConversionJob};

pub use soffice::{SofficeEngine, SofficeProvider};

/// Failures reported by an engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No installation to initialize.
    #[error(transparent)]
    Install(#[from] ResolveError),

    /// The engine could not be brought up.
    #[error("failed to initialise engine: {0}")]
    Init(String),

    /// The input document could not be loaded.
    #[error("failed to load document: {0}")]
    Load(String),

    /// The loaded document could not be exported.
    #[error("failed to export: {0}")]
    Export(String),

    /// The engine did not finish in time.
    #[error("engine timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The engine panicked; caught at the adapter boundary.
    #[error("engine panicked: {0}")]
    Panicked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl EngineError {
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }
}

/// One initialized engine instance. Not safe for concurrent use; callers
/// hold it exclusively (`&mut self`).
#[async_trait]
pub trait ConversionEngine: Send {
    /// Load `job.input` and save it to `job.output`.
    async fn convert(&mut self, job: &ConversionJob) -> Result<(), EngineError>;
}

/// Brings up an engine instance.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    async fn init(&self) -> Result<Box<dyn ConversionEngine>, EngineError>;
}

/// Owns one engine instance for its lifetime.
pub struct EngineAdapter {
    engine: Box<dyn ConversionEngine>,
}

impl std::fmt::Debug for EngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAdapter").finish_non_exhaustive()
    }
}

impl EngineAdapter {
    /// Initialize an engine through `provider`. Panics during initialization
    /// are reported as [`EngineError::Panicked`].
    pub async fn init(provider: &dyn EngineProvider) -> Result<Self, EngineError> {
        let outcome = AssertUnwindSafe(provider.init()).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(EngineError::Panicked(panic_message(panic.as_ref()))),
        };

        match result {
            Ok(engine) => {
                debug!("engine initialised");
                Ok(Self { engine })
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    /// Run one conversion. Never fails: engine errors and panics are logged
    /// and reported as a non-zero exit code.
    pub async fn convert(&mut self, job: &ConversionJob) -> i32 {
        let outcome = AssertUnwindSafe(self.engine.convert(job))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(EngineError::Panicked(panic_message(panic.as_ref()))),
        };

        match result {
            Ok(()) => {
                debug!(input = %job.input, output = %job.output.display(), "conversion succeeded");
                exit_code::SUCCESS
            }
            Err(e) => {
                error!(input = %job.input, output = %job.output.display(), "{}", e);
                exit_code::FAILURE
            }
        }
    }

    /// Release the engine.
    pub fn cleanup(self) {
        drop(self.engine);
        debug!("engine released");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
