//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Each concern keeps its own enum
//! ([`FrameError`](crate::ipc::codec::FrameError),
//! [`ResolveError`](crate::install::ResolveError),
//! [`EngineError`](crate::engine::EngineError)); [`Error`] ties them together
//! and maps every failure onto a process exit code.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;
use crate::ipc::codec::FrameError;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes (sysexits-style).
pub mod exit_code {
    /// Conversion succeeded.
    pub const SUCCESS: i32 = 0;
    /// Generic failure: transport, protocol, or engine operation.
    pub const FAILURE: i32 = 1;
    /// Bad command line (`EX_USAGE`).
    pub const USAGE: i32 = 64;
    /// Engine could not be located or initialized (`EX_UNAVAILABLE`).
    pub const UNAVAILABLE: i32 = 69;
}

/// Main error enum for officeconv.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed command-line usage.
    #[error("usage error: {0}")]
    Usage(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// Engine initialization failed; the process has no useful work to do.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(#[source] EngineError),

    /// Binding the daemon socket failed.
    #[error("failed to bind {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a connection on the daemon socket failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// Connecting to the daemon socket failed.
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Launching a replacement daemon failed.
    #[error("failed to launch daemon: {0}")]
    Spawn(#[source] std::io::Error),

    /// A launched daemon never became reachable.
    #[error("daemon unavailable: {0}")]
    DaemonUnavailable(String),

    /// Framing errors on the socket.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Well-framed but semantically invalid message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map to the exit status the process should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => exit_code::USAGE,
            Error::EngineUnavailable(_) => exit_code::UNAVAILABLE,
            Error::Config(_)
            | Error::Bind { .. }
            | Error::Accept(_)
            | Error::Connect { .. }
            | Error::Spawn(_)
            | Error::DaemonUnavailable(_)
            | Error::Frame(_)
            | Error::Protocol(_)
            | Error::Serialization(_)
            | Error::Io(_) => exit_code::FAILURE,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn daemon_unavailable(msg: impl Into<String>) -> Self {
        Self::DaemonUnavailable(msg.into())
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Self::EngineUnavailable(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::ResolveError;

    #[test]
    fn usage_maps_to_ex_usage() {
        assert_eq!(Error::usage("bad").exit_code(), 64);
    }

    #[test]
    fn engine_failures_map_to_unavailable() {
        let err: Error = EngineError::init("no soffice").into();
        assert_eq!(err.exit_code(), exit_code::UNAVAILABLE);

        let err: Error = EngineError::Install(ResolveError::NotFound).into();
        assert_eq!(err.exit_code(), exit_code::UNAVAILABLE);
    }

    #[test]
    fn transport_failures_are_generic() {
        let err = Error::Connect {
            path: PathBuf::from("/tmp/x.sock"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.exit_code(), exit_code::FAILURE);
        assert!(err.to_string().contains("/tmp/x.sock"));
    }
}
