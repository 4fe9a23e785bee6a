//! Interactive shell driver.

use indexmap::IndexMap;
use log::{error, info, warn};

use super::config::ReaderConfig;
use super::recv::{self, PartialTextHandler};
use super::response::RecvOutcome;
use crate::channel::{AutoReplies, PatternSet, SessionChannel, SshChannel};
use crate::error::{DriverError, Result};
use crate::transport::{SshConfig, SshTransport};

/// Reader for an interactive shell.
///
/// Wraps one [`SessionChannel`] and answers scripted prompts while waiting
/// for a terminal prompt. Over SSH, [`open_shell`](Self::open_shell) and
/// [`close_shell`](Self::close_shell) manage the connection; any other
/// channel can be plugged in with [`attach`](Self::attach).
///
/// # Example
///
/// ```rust
/// use sshprompt::channel::ScriptedChannel;
/// use sshprompt::driver::{InteractiveDriver, ReaderConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), sshprompt::Error> {
/// let config = ReaderConfig::default()
///     .with_auto_reply("Password:", "secret\n")
///     .with_prompt(r"\$ $");
/// let mut driver = InteractiveDriver::with_config(config);
/// driver.attach(
///     ScriptedChannel::new()
///         .data("Password:")
///         .await_write()
///         .data("\nuser@host:~$ "),
/// )?;
///
/// let outcome = driver.recv_text().await?;
/// assert_eq!(outcome.prompt.as_deref(), Some(r"\$ $"));
/// # Ok(())
/// # }
/// ```
pub struct InteractiveDriver<C: SessionChannel = SshChannel> {
    /// Reader defaults.
    config: ReaderConfig,

    /// Observer for each decoded chunk.
    on_recv_partial_text: Option<PartialTextHandler>,

    /// The shell channel (None when disconnected).
    channel: Option<C>,

    /// Where `open_shell` connects to.
    ssh_config: Option<SshConfig>,

    /// SSH connection owning the channel, when opened via `open_shell`.
    transport: Option<SshTransport>,
}

impl<C: SessionChannel> InteractiveDriver<C> {
    /// Create a driver with default configuration.
    pub fn new() -> Self {
        Self::with_config(ReaderConfig::default())
    }

    /// Create a driver with the given configuration.
    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            config,
            on_recv_partial_text: None,
            channel: None,
            ssh_config: None,
            transport: None,
        }
    }

    /// Get the reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Get a mutable reference to the reader configuration.
    pub fn config_mut(&mut self) -> &mut ReaderConfig {
        &mut self.config
    }

    /// Call `handler` with each chunk of text as it is decoded.
    pub fn set_partial_text_handler(&mut self, handler: impl FnMut(&str) + Send + 'static) {
        self.on_recv_partial_text = Some(Box::new(handler));
    }

    /// Install an already boxed handler, e.g. from [`recv::forward_to`].
    pub fn set_boxed_partial_text_handler(&mut self, handler: PartialTextHandler) {
        self.on_recv_partial_text = Some(handler);
    }

    /// Remove the partial text handler.
    pub fn clear_partial_text_handler(&mut self) {
        self.on_recv_partial_text = None;
    }

    /// Use `channel` as the shell channel.
    pub fn attach(&mut self, channel: C) -> Result<()> {
        if self.channel.is_some() {
            return Err(DriverError::AlreadyConnected.into());
        }
        self.channel = Some(channel);
        Ok(())
    }

    /// Take the shell channel back out of the driver.
    pub fn detach(&mut self) -> Option<C> {
        self.channel.take()
    }

    /// Get a reference to the shell channel, if attached.
    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    /// Check if a shell channel is attached.
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Receive text using the configured auto-replies and prompts.
    pub async fn recv_text(&mut self) -> Result<RecvOutcome> {
        self.recv_text_with(None, None).await
    }

    /// Receive text, overriding the configured auto-replies and/or prompts.
    ///
    /// `None` uses the configured default. `Some` of an empty collection
    /// means no patterns of that kind.
    ///
    /// Returns once a prompt matches, the channel closes, or nothing new
    /// arrives within the idle timeout. Only configuration errors, invalid
    /// patterns, a missing channel, and failed auto-reply writes are
    /// reported as errors.
    pub async fn recv_text_with(
        &mut self,
        auto_replies: Option<&IndexMap<String, String>>,
        prompts: Option<&[String]>,
    ) -> Result<RecvOutcome> {
        self.config.validate()?;

        let auto_replies = auto_replies.unwrap_or(&self.config.auto_replies);
        let prompts = prompts.unwrap_or(&self.config.prompts);
        let auto_replies = AutoReplies::compile(auto_replies).map_err(DriverError::from)?;
        let prompts = PatternSet::compile(prompts).map_err(DriverError::from)?;

        let channel = self.channel.as_mut().ok_or(DriverError::NotConnected)?;

        recv::recv_text(
            channel,
            &self.config,
            &auto_replies,
            &prompts,
            self.on_recv_partial_text.as_mut(),
        )
        .await
    }

    /// Send text to the shell, returning the number of encoded bytes sent.
    pub async fn send_text(&mut self, text: &str) -> Result<usize> {
        let channel = self.channel.as_mut().ok_or(DriverError::NotConnected)?;
        recv::write_text(channel, self.config.encoding, text).await
    }
}

impl InteractiveDriver<SshChannel> {
    /// Create a driver that connects with `ssh_config` on
    /// [`open_shell`](Self::open_shell).
    pub fn ssh(ssh_config: SshConfig, config: ReaderConfig) -> Self {
        let mut driver = Self::with_config(config);
        driver.ssh_config = Some(ssh_config);
        driver
    }

    /// Get the SSH configuration, if one is set.
    pub fn ssh_config(&self) -> Option<&SshConfig> {
        self.ssh_config.as_ref()
    }

    /// Connect to the configured host and open an interactive shell.
    ///
    /// If the shell cannot be started the connection is closed again
    /// before the error is returned.
    pub async fn open_shell(&mut self) -> Result<()> {
        if self.channel.is_some() || self.transport.is_some() {
            return Err(DriverError::AlreadyConnected.into());
        }
        let ssh_config = self
            .ssh_config
            .as_ref()
            .ok_or_else(|| DriverError::invalid_argument("no SSH configuration set"))?;

        let addr = ssh_config.socket_addr();
        let transport = SshTransport::connect(ssh_config).await.inspect_err(|e| {
            error!("Failed to connect to {}: {}", addr, e);
        })?;
        info!("Successfully connected to {}.", addr);

        match transport.open_shell().await {
            Ok(channel) => {
                info!("Successfully opened an interactive shell.");
                self.channel = Some(channel);
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => {
                error!("Failed to open an interactive shell: {}", e);
                if let Err(close_err) = transport.close().await {
                    warn!("Failed to close connection after shell failure: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Terminate the interactive shell and close the connection.
    ///
    /// The connection is closed even if closing the shell fails; the first
    /// error is returned.
    pub async fn close_shell(&mut self) -> Result<()> {
        let channel = self.channel.take();
        let transport = self.transport.take();

        let close_channel = async move {
            let Some(mut channel) = channel else {
                return Ok(());
            };
            if let Some(status) = channel.exit_status() {
                info!("Remote shell exited with status {}.", status);
            }
            if channel.is_closed() {
                return Ok(());
            }
            channel
                .close()
                .await
                .inspect(|_| info!("Interactive shell terminated."))
                .inspect_err(|e| warn!("Failed to terminate interactive shell: {}", e))
        };
        let close_transport = async move {
            match transport {
                Some(transport) => transport.close().await.inspect(|_| info!("Connection closed.")),
                None => Ok(()),
            }
        };

        close_in_order(close_channel, close_transport).await
    }

    /// Check if the SSH session is still alive.
    pub fn is_alive(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| !t.is_closed())
            && self.channel.as_ref().is_some_and(|c| !c.is_closed())
    }
}

/// Run `first` then `second` regardless of how `first` went, returning the
/// first error.
async fn close_in_order(
    first: impl Future<Output = Result<()>>,
    second: impl Future<Output = Result<()>>,
) -> Result<()> {
    let first = first.await;
    let second = second.await;
    first.and(second)
}

impl<C: SessionChannel> Default for InteractiveDriver<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SessionChannel> Drop for InteractiveDriver<C> {
    fn drop(&mut self) {
        if self.transport.is_some() {
            warn!("InteractiveDriver dropped with an open SSH connection; call close_shell() first");
        }
    }
}
