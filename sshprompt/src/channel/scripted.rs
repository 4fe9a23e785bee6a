//! Deterministic in-memory channel that replays a script.
//!
//! Useful for exercising code built on [`SessionChannel`] without a server.
//! Pauses are real `tokio::time` sleeps, so tests can run them instantly
//! under `#[tokio::test(start_paused = true)]`.
//!
//! ```rust
//! use std::time::Duration;
//! use sshprompt::channel::ScriptedChannel;
//!
//! let channel = ScriptedChannel::new()
//!     .data("Password: ")
//!     .await_write()
//!     .pause(Duration::from_millis(50))
//!     .data("user@host:~$ ");
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

use super::session::SessionChannel;
use crate::error::{ChannelError, Result};

/// One step of a [`ScriptedChannel`] script.
#[derive(Debug, Clone)]
pub enum Step {
    /// Make these bytes readable.
    Data(Bytes),

    /// Produce nothing for this long.
    Pause(Duration),

    /// Produce nothing until the next write.
    AwaitWrite,

    /// Close the channel.
    Close,

    /// Make these bytes readable and close the channel at once, like a
    /// server that sends its last output and hangs up.
    Hangup(Bytes),
}

/// A [`SessionChannel`] that replays a fixed script and records writes.
///
/// Once the script is exhausted the channel stays open and silent.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    script: VecDeque<Step>,
    pending: BytesMut,
    closed: bool,
    writes: Vec<Bytes>,
    writes_seen: usize,
    write_limit: Option<usize>,
}

impl ScriptedChannel {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a data step.
    pub fn data(mut self, data: impl AsRef<[u8]>) -> Self {
        self.script
            .push_back(Step::Data(Bytes::copy_from_slice(data.as_ref())));
        self
    }

    /// Append a pause.
    pub fn pause(mut self, duration: Duration) -> Self {
        self.script.push_back(Step::Pause(duration));
        self
    }

    /// Append a step that blocks until something is written.
    pub fn await_write(mut self) -> Self {
        self.script.push_back(Step::AwaitWrite);
        self
    }

    /// Append a close.
    pub fn close(mut self) -> Self {
        self.script.push_back(Step::Close);
        self
    }

    /// Append final data that arrives together with the close.
    pub fn hang_up_with(mut self, data: impl AsRef<[u8]>) -> Self {
        self.script
            .push_back(Step::Hangup(Bytes::copy_from_slice(data.as_ref())));
        self
    }

    /// Accept at most `limit` bytes per write.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Everything written so far, one entry per write call.
    pub fn writes(&self) -> &[Bytes] {
        &self.writes
    }

    /// Steps not yet replayed.
    pub fn remaining_steps(&self) -> usize {
        self.script.len()
    }

    /// Wait until `deadline`, or forever without one.
    async fn idle_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

impl SessionChannel for ScriptedChannel {
    async fn readable(&mut self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if !self.pending.is_empty() || self.closed {
                return true;
            }

            match self.script.pop_front() {
                Some(Step::Data(data)) => self.pending.extend_from_slice(&data),
                Some(Step::Close) => self.closed = true,
                Some(Step::Hangup(data)) => {
                    self.pending.extend_from_slice(&data);
                    self.closed = true;
                }
                Some(Step::Pause(duration)) => {
                    let wake = Instant::now() + duration;
                    match deadline {
                        Some(deadline) if deadline < wake => {
                            tokio::time::sleep_until(deadline).await;
                            self.script.push_front(Step::Pause(wake - deadline));
                            return false;
                        }
                        _ => tokio::time::sleep_until(wake).await,
                    }
                }
                Some(Step::AwaitWrite) => {
                    if self.writes.len() > self.writes_seen {
                        self.writes_seen = self.writes.len();
                    } else {
                        self.script.push_front(Step::AwaitWrite);
                        Self::idle_until(deadline).await;
                        return false;
                    }
                }
                None => {
                    Self::idle_until(deadline).await;
                    return false;
                }
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed && self.pending.is_empty()
    }

    fn read_available(&mut self, max_bytes: usize) -> Bytes {
        let n = max_bytes.min(self.pending.len());
        self.pending.split_to(n).freeze()
    }

    fn has_more_available(&mut self) -> bool {
        !self.pending.is_empty()
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(ChannelError::Closed.into());
        }
        let n = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.writes.push(Bytes::copy_from_slice(&data[..n]));
        Ok(n)
    }
}
