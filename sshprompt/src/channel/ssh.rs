//! Session channel backed by a russh shell channel.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::FutureExt;
use log::{debug, trace};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::time::Instant;

use super::session::SessionChannel;
use crate::error::{ChannelError, Result};

/// Channel state built from the russh message stream.
#[derive(Debug, Default)]
struct Inbox {
    /// Received but not yet read output.
    pending: BytesMut,

    /// The remote end will send no more data. Writes still go through.
    eof: bool,

    /// The channel is gone in both directions.
    closed: bool,

    exit_status: Option<u32>,
}

impl Inbox {
    /// Apply one message; `None` means russh dropped the channel.
    fn push(&mut self, msg: Option<ChannelMsg>) {
        match msg {
            Some(ChannelMsg::Data { data }) => {
                trace!("ssh channel: {} bytes", data.len());
                self.pending.extend_from_slice(&data);
            }
            // stderr is interleaved with stdout, as a terminal would show it
            Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                self.pending.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                debug!("remote shell exited with status {}", exit_status);
                self.exit_status = Some(exit_status);
            }
            Some(ChannelMsg::Eof) => self.eof = true,
            Some(ChannelMsg::Close) | None => self.closed = true,
            Some(_) => {}
        }
    }

    /// No more data will arrive.
    fn ended(&self) -> bool {
        self.eof || self.closed
    }

    fn readable(&self) -> bool {
        !self.pending.is_empty() || self.ended()
    }

    fn drained(&self) -> bool {
        self.ended() && self.pending.is_empty()
    }

    fn take(&mut self, max_bytes: usize) -> Bytes {
        let n = max_bytes.min(self.pending.len());
        self.pending.split_to(n).freeze()
    }
}

/// Interactive shell channel over SSH.
///
/// russh delivers channel output as a stream of messages. This adapter
/// queues the payload of `Data`/`ExtendedData` messages so the reader can
/// poll for readability and drain the queue without waiting.
pub struct SshChannel {
    channel: Channel<Msg>,
    inbox: Inbox,
}

impl SshChannel {
    /// Wrap a channel that already has a PTY and shell.
    pub fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            inbox: Inbox {
                pending: BytesMut::with_capacity(4096),
                ..Default::default()
            },
        }
    }

    /// Exit status of the remote shell, once it has exited.
    pub fn exit_status(&self) -> Option<u32> {
        self.inbox.exit_status
    }

    /// Close the channel.
    pub async fn close(&mut self) -> Result<()> {
        self.inbox.closed = true;
        self.channel.close().await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    /// Handle every message russh has already queued, without waiting.
    fn pump(&mut self) {
        while !self.inbox.closed {
            match self.channel.wait().now_or_never() {
                Some(msg) => self.inbox.push(msg),
                None => break,
            }
        }
    }
}

impl SessionChannel for SshChannel {
    async fn readable(&mut self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            self.pump();
            // EOF counts as readable, like select() on a socket at EOF
            if self.inbox.readable() {
                return true;
            }

            let msg = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.channel.wait()).await {
                        Ok(msg) => msg,
                        Err(_) => return false,
                    }
                }
                None => self.channel.wait().await,
            };
            self.inbox.push(msg);
        }
    }

    fn is_closed(&self) -> bool {
        self.inbox.drained()
    }

    fn read_available(&mut self, max_bytes: usize) -> Bytes {
        self.pump();
        self.inbox.take(max_bytes)
    }

    fn has_more_available(&mut self) -> bool {
        self.pump();
        !self.inbox.pending.is_empty()
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.inbox.closed {
            return Err(ChannelError::Closed.into());
        }
        self.channel.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(data.len())
    }
}
