//! # sshprompt
//!
//! Async reader for interactive SSH shells.
//!
//! sshprompt reads streamed shell output, decodes it incrementally, and
//! matches it against two sets of patterns: auto-reply patterns (answered
//! with scripted text, e.g. a password) and prompt patterns (which end the
//! read). Reads give up after an idle timeout or when the channel closes.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Idle timeout that restarts only when an auto-reply is sent
//! - Multi-byte characters split across reads are reassembled
//! - Transport-independent core: anything implementing
//!   [`SessionChannel`](channel::SessionChannel) can be driven
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sshprompt::DriverBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sshprompt::Error> {
//!     let mut driver = DriverBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .prompt(r"[$#]\s*$")
//!         .build()?;
//!
//!     driver.open_shell().await?;
//!     driver.recv_text().await?;
//!
//!     driver.send_text("sudo whoami\n").await?;
//!     let mut replies = indexmap::IndexMap::new();
//!     replies.insert(r"\[sudo\] password".to_string(), "secret\n".to_string());
//!     let outcome = driver.recv_text_with(Some(&replies), None).await?;
//!     println!("{}", outcome.text);
//!
//!     driver.close_shell().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod transport;

// Re-export main types for convenience
pub use channel::{Encoding, SessionChannel};
pub use driver::{DriverBuilder, InteractiveDriver, ReaderConfig, RecvOutcome, StopReason};
pub use error::Error;
pub use transport::{AuthMethod, SshConfig};
