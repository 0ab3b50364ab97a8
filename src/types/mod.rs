//! Core types shared across officeconv.
//!
//! - **Errors**: application error types with thiserror derives and exit-code mapping
//! - **Config**: layered configuration for engine, daemon, client and logging
//! - **Requests**: the conversion request/job/result model

mod config;
mod errors;
mod request;

pub use config::{
    ClientConfig, Config, DaemonConfig, EngineConfig, ObservabilityConfig, INSTALL_PATH_ENV,
    LOG_FORMAT_ENV,
};
pub use errors::{exit_code, Error, Result};
pub use request::{ConversionJob, ConversionRequest, ConversionResult, InputLocation};
