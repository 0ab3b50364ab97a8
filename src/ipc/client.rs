//! Conversion client - connect to a daemon, launching one on demand.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ipc::protocol::{read_result, write_request};
use crate::types::{ClientConfig, ConversionRequest, Error, Result};

/// Starts a daemon bound to a socket path.
pub trait DaemonLauncher: Send + Sync {
    /// Start a daemon for `socket_path` without waiting for it to be ready.
    fn launch(&self, socket_path: &Path) -> io::Result<()>;
}

/// Launches the daemon by re-executing a binary in listen mode.
#[derive(Debug, Clone)]
pub struct ExecLauncher {
    program: PathBuf,
    config_file: Option<PathBuf>,
}

impl ExecLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config_file: None,
        }
    }

    /// Launcher for the currently running executable.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Pass a config file through to the launched daemon.
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }
}

impl DaemonLauncher for ExecLauncher {
    fn launch(&self, socket_path: &Path) -> io::Result<()> {
        use std::os::unix::process::CommandExt;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--listen").arg("--socket").arg(socket_path);
        if let Some(config) = &self.config_file {
            cmd.arg("--config").arg(config);
        }
        // Own process group so the daemon outlives the client's terminal
        // signals; stderr stays attached for diagnostics.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .process_group(0);

        let child = cmd.spawn()?;
        info!(pid = child.id(), socket = %socket_path.display(), "launched daemon");
        Ok(())
    }
}

/// Talks to a conversion daemon over its socket.
#[derive(Clone)]
pub struct ConversionClient {
    config: ClientConfig,
    launcher: Arc<dyn DaemonLauncher>,
}

impl std::fmt::Debug for ConversionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConversionClient {
    pub fn new(config: ClientConfig, launcher: Arc<dyn DaemonLauncher>) -> Self {
        Self { config, launcher }
    }

    /// Send one request and return the daemon's exit code.
    pub async fn convert(&self, socket_path: &Path, request: &ConversionRequest) -> Result<i32> {
        let mut stream = self.connect(socket_path).await?;
        write_request(&mut stream, request).await?;
        let result = read_result(&mut stream, self.config.max_frame_bytes).await?;
        debug!(exit_code = result.exit_code, "daemon replied");
        Ok(result.exit_code)
    }

    /// Connect, launching a daemon when nothing is listening.
    ///
    /// Only "connection refused" (stale socket file) and "not found" (no
    /// socket file) trigger a launch; any other error is returned as-is.
    pub async fn connect(&self, socket_path: &Path) -> Result<UnixStream> {
        let err = match UnixStream::connect(socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(e) => e,
        };

        if !should_autostart(&err) || !self.config.auto_spawn {
            return Err(Error::Connect {
                path: socket_path.to_path_buf(),
                source: err,
            });
        }

        if err.kind() == io::ErrorKind::ConnectionRefused {
            debug!(socket = %socket_path.display(), "removing stale socket");
            if let Err(e) = std::fs::remove_file(socket_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(socket = %socket_path.display(), "failed to remove stale socket: {}", e);
                }
            }
        }

        self.launcher.launch(socket_path).map_err(Error::Spawn)?;
        self.wait_for_daemon(socket_path).await
    }

    /// Retry the connect with bounded exponential backoff until the launched
    /// daemon binds or `spawn_timeout` elapses.
    async fn wait_for_daemon(&self, socket_path: &Path) -> Result<UnixStream> {
        let deadline = Instant::now() + self.config.spawn_timeout;
        let mut backoff = self.config.initial_backoff;

        loop {
            tokio::time::sleep(backoff).await;
            match UnixStream::connect(socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(e) if should_autostart(&e) => {
                    if Instant::now() >= deadline {
                        return Err(Error::daemon_unavailable(format!(
                            "no daemon listening on {} after {:?}",
                            socket_path.display(),
                            self.config.spawn_timeout
                        )));
                    }
                    debug!(?backoff, "daemon not ready yet");
                    backoff = next_backoff(backoff, self.config.max_backoff);
                }
                Err(source) => {
                    return Err(Error::Connect {
                        path: socket_path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    std::cmp::min(current.saturating_mul(2), max)
}

fn should_autostart(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl DaemonLauncher for Counting {
        fn launch(&self, _socket_path: &Path) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn quick_config(auto_spawn: bool) -> ClientConfig {
        ClientConfig {
            auto_spawn,
            spawn_timeout: Duration::from_millis(100),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(20),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn autostart_only_for_missing_listener() {
        assert!(should_autostart(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(should_autostart(&io::Error::from(
            io::ErrorKind::ConnectionRefused
        )));
        assert!(!should_autostart(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let max = Duration::from_millis(500);
        assert_eq!(
            next_backoff(Duration::from_millis(50), max),
            Duration::from_millis(100)
        );
        assert_eq!(next_backoff(Duration::from_millis(400), max), max);
    }

    #[test]
    fn backoff_saturates_on_huge_values() {
        assert_eq!(next_backoff(Duration::MAX, Duration::MAX), Duration::MAX);
        assert_eq!(
            next_backoff(Duration::MAX, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[tokio::test]
    async fn launch_that_never_binds_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(Counting::default());
        let client = ConversionClient::new(quick_config(true), launcher.clone());

        let err = client.connect(&dir.path().join("d.sock")).await.unwrap_err();
        assert!(matches!(err, Error::DaemonUnavailable(_)));
        assert_eq!(launcher.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_launch_is_spawn_error() {
        struct Broken;
        impl DaemonLauncher for Broken {
            fn launch(&self, _socket_path: &Path) -> io::Result<()> {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let client = ConversionClient::new(quick_config(true), Arc::new(Broken));
        let err = client.connect(&dir.path().join("d.sock")).await.unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
    }

    #[tokio::test]
    async fn exec_launcher_reports_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ExecLauncher::new(dir.path().join("no-such-binary"));
        assert!(launcher.launch(&dir.path().join("d.sock")).is_err());
    }
}
