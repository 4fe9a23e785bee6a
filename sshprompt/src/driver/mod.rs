//! Interactive driver: the receive loop and the API around it.
//!
//! [`InteractiveDriver::recv_text`] reads shell output until one of the
//! prompt patterns matches, answering auto-reply patterns (password
//! prompts, confirmations) along the way. It gives up without error when
//! the channel closes or goes quiet for longer than the idle timeout.

mod builder;
mod config;
mod interactive;
pub mod recv;
pub(crate) mod response;
mod state;

pub use builder::DriverBuilder;
pub use config::ReaderConfig;
pub use interactive::InteractiveDriver;
pub use recv::{PartialTextHandler, forward_to, wait_recv_ready, write_text};
pub use response::{RecvOutcome, StopReason};
pub use state::{Classification, RecvState};
