//! Conversion daemon - bind, start the engine, then serve one connection at
//! a time.
//!
//! ```text
//! ConversionDaemon::bind ──► BoundDaemon::start_engine ──► ListeningDaemon::serve
//!      (Binding)          (engine init, then Listening)        (Accepting ⇄ Handling)*
//! ```
//! The engine is not safe for concurrent use, so each accepted connection is
//! handled to completion before the next `accept`. There is no in-protocol
//! shutdown; the daemon runs until it is killed.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::time::Duration;

use socket2::{Domain, SockAddr, Socket, Type};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::engine::{EngineAdapter, EngineProvider};
use crate::ipc::protocol::{read_request, write_result};
use crate::types::{ConversionJob, ConversionResult, DaemonConfig, Error, Result};

const LISTEN_BACKLOG: i32 = 128;

/// Entry point for the daemon state machine.
#[derive(Debug)]
pub struct ConversionDaemon;

impl ConversionDaemon {
    /// Bind the socket without listening on it. Never retries and never
    /// removes an existing path. Until the engine is up, connects are refused.
    pub fn bind(socket_path: impl Into<PathBuf>, config: DaemonConfig) -> Result<BoundDaemon> {
        let socket_path = socket_path.into();
        let bind_err = |source: std::io::Error| Error::Bind {
            path: socket_path.clone(),
            source,
        };
        let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(bind_err)?;
        let addr = SockAddr::unix(&socket_path).map_err(bind_err)?;
        socket.bind(&addr).map_err(bind_err)?;
        info!(socket = %socket_path.display(), "daemon socket bound");
        Ok(BoundDaemon {
            socket,
            socket_path,
            config,
        })
    }

    /// Bind, start the engine and serve forever. Only returns on a fatal
    /// error.
    pub async fn run(
        socket_path: impl Into<PathBuf>,
        config: DaemonConfig,
        provider: &dyn EngineProvider,
    ) -> Error {
        let bound = match Self::bind(socket_path, config) {
            Ok(bound) => bound,
            Err(e) => return e,
        };
        let listening = match bound.start_engine(provider).await {
            Ok(listening) => listening,
            Err(e) => return e,
        };
        match listening.serve().await {
            Ok(never) => match never {},
            Err(e) => e,
        }
    }
}

/// Socket bound, engine not started yet.
#[derive(Debug)]
pub struct BoundDaemon {
    socket: Socket,
    socket_path: PathBuf,
    config: DaemonConfig,
}

impl BoundDaemon {
    /// Initialize the one engine this daemon will own, then start listening.
    /// On failure the socket is closed and unlinked without ever having
    /// listened, so clients only ever see a refused connection.
    pub async fn start_engine(self, provider: &dyn EngineProvider) -> Result<ListeningDaemon> {
        let BoundDaemon {
            socket,
            socket_path,
            config,
        } = self;

        let adapter = match EngineAdapter::init(provider).await {
            Ok(adapter) => adapter,
            Err(e) => {
                drop(socket);
                unlink(&socket_path);
                return Err(Error::EngineUnavailable(e));
            }
        };
        let listener = listen(socket).map_err(|source| {
            unlink(&socket_path);
            Error::Bind {
                path: socket_path.clone(),
                source,
            }
        })?;

        info!(socket = %socket_path.display(), "daemon listening");
        Ok(ListeningDaemon {
            listener,
            config,
            adapter,
            served: 0,
        })
    }
}

fn listen(socket: Socket) -> std::io::Result<UnixListener> {
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    UnixListener::from_std(socket.into())
}

fn unlink(socket_path: &Path) {
    if let Err(e) = std::fs::remove_file(socket_path) {
        warn!(socket = %socket_path.display(), "failed to remove socket: {}", e);
    }
}

/// Engine up, accepting connections.
#[derive(Debug)]
pub struct ListeningDaemon {
    listener: UnixListener,
    config: DaemonConfig,
    adapter: EngineAdapter,
    served: u64,
}

impl ListeningDaemon {
    /// Accept and handle connections, strictly one at a time. An accept
    /// failure is fatal.
    pub async fn serve(mut self) -> Result<Infallible> {
        loop {
            let (stream, _addr) = self.listener.accept().await.map_err(|e| {
                error!("accept failed: {}", e);
                Error::Accept(e)
            })?;
            self.served += 1;
            let conn = self.served;
            debug!(conn, "connection accepted");

            if let Err(e) = self.handle_connection(stream).await {
                warn!(conn, "connection dropped: {}", e);
            }
        }
    }

    /// Read one request, convert, write one result, close.
    async fn handle_connection(&mut self, mut stream: UnixStream) -> Result<()> {
        let request = with_timeout(
            self.config.read_timeout,
            "read",
            read_request(&mut stream, self.config.max_frame_bytes),
        )
        .await?;
        debug!(
            input = %request.input.display(),
            output = %request.output.display(),
            format = request.format.as_deref().unwrap_or(""),
            "request received"
        );

        let job = ConversionJob::from_request(request);
        let exit_code = self.adapter.convert(&job).await;

        with_timeout(
            self.config.write_timeout,
            "write",
            write_result(&mut stream, ConversionResult::new(exit_code)),
        )
        .await?;
        info!(input = %job.input, exit_code, "request served");
        Ok(())
    }
}

async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{} timeout ({:?})", what, limit),
        ))
    })?
}
