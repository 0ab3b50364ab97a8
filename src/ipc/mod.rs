//! Unix-socket transport between conversion clients and the daemon.
//!
//! Length-prefixed frames ([`codec`]) carry positional request/response
//! fields ([`protocol`]); [`server`] is the daemon side, [`client`] the
//! connect-or-launch side.

pub mod client;
pub mod codec;
pub mod protocol;
pub mod server;

pub use client::{ConversionClient, DaemonLauncher, ExecLauncher};
pub use server::{BoundDaemon, ConversionDaemon, ListeningDaemon};
