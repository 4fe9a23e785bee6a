//! SSH transport layer wrapping russh.
//!
//! This module handles connection setup, authentication, and opening the
//! PTY shell channel the driver reads from.

pub mod config;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;
