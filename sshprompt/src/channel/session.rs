//! The session channel contract the reader is written against.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// A live interactive byte channel.
///
/// The reader only ever needs these five operations, which keeps it
/// independent of the transport. [`SshChannel`](super::SshChannel) is the
/// production implementation; [`ScriptedChannel`](super::ScriptedChannel)
/// replays a fixed script for tests.
pub trait SessionChannel: Send {
    /// Wait until data can be read or `timeout` elapses.
    ///
    /// Returns `false` on timeout. `None` waits without bound. A closed
    /// channel must not make this fail.
    fn readable(&mut self, timeout: Option<Duration>) -> impl Future<Output = bool> + Send;

    /// Whether the remote end has closed the channel.
    fn is_closed(&self) -> bool;

    /// Take up to `max_bytes` of data without waiting. May be empty.
    fn read_available(&mut self, max_bytes: usize) -> Bytes;

    /// Whether [`read_available`](Self::read_available) would return data
    /// right now.
    fn has_more_available(&mut self) -> bool;

    /// Write `data`, returning how many bytes the channel accepted.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<usize>> + Send;
}
