//! Channel layer: the session channel contract, its implementations,
//! text encodings and pattern sets.
//!
//! The reader never talks to russh directly. It is written against
//! [`SessionChannel`], which [`SshChannel`] implements for real shells and
//! [`ScriptedChannel`] implements for tests.

mod encoding;
mod patterns;
pub mod scripted;
mod session;
mod ssh;

pub use encoding::Encoding;
pub use patterns::{AutoReplies, PatternSet};
pub use scripted::ScriptedChannel;
pub use session::SessionChannel;
pub use ssh::SshChannel;
