//! # officeconv - office document conversion service
//!
//! Converts documents through an external office engine, either in-process
//! for a single document or through a long-lived daemon that keeps one
//! initialized engine and serves requests over a Unix socket:
//! ```text
//!   client ──(unix socket, framed fields)──► daemon ──► EngineAdapter ──► engine
//!      ▲                                        │
//!      └──────────── exit code frame ◄──────────┘
//! ```
//! - [`install`] locates the engine installation (override, well-known
//!   paths, then newest versioned directory)
//! - [`engine`] is the boundary to the engine; nothing it does escapes as
//!   anything but an exit code
//! - [`ipc`] holds the frame codec, the daemon and the connect-or-launch
//!   client
//! - [`direct`] is the one-shot, in-process mode

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod direct;
pub mod engine;
pub mod install;
pub mod ipc;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

// Internal utilities
pub mod observability;

pub use types::{exit_code, Config, Error, Result};
