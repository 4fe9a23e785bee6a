//! Builder for creating SSH-backed interactive drivers.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::config::ReaderConfig;
use super::interactive::InteractiveDriver;
use super::recv::PartialTextHandler;
use crate::channel::{Encoding, SshChannel};
use crate::error::{DriverError, Result};
use crate::transport::config::{AuthMethod, HostKeyVerification, SshConfig};

/// Builder for constructing an [`InteractiveDriver`] over SSH.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use sshprompt::DriverBuilder;
///
/// # async fn example() -> Result<(), sshprompt::Error> {
/// let mut driver = DriverBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .prompt(r"[$#]\s*$")
///     .auto_reply(r"\[sudo\] password for \w+:", "secret\n")
///     .recv_timeout(Duration::from_secs(10))
///     .build()?;
///
/// driver.open_shell().await?;
/// let outcome = driver.recv_text().await?;
/// println!("{}", outcome.text);
/// driver.close_shell().await?;
/// # Ok(())
/// # }
/// ```
pub struct DriverBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    timeout: Duration,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    reader: ReaderConfig,
    encoding_label: Option<String>,
    on_recv_partial_text: Option<PartialTextHandler>,
}

impl DriverBuilder {
    /// Create a new driver builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            reader: ReaderConfig::default(),
            encoding_label: None,
            on_recv_partial_text: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Accept any host key. For lab use only.
    pub fn danger_disable_host_key_verification(self) -> Self {
        self.host_key_verification(HostKeyVerification::Disabled)
    }

    /// Use a specific known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Replace the whole reader configuration.
    pub fn reader_config(mut self, config: ReaderConfig) -> Self {
        self.reader = config;
        self
    }

    /// Set the text encoding.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.reader.encoding = encoding;
        self.encoding_label = None;
        self
    }

    /// Set the text encoding by label, e.g. `"utf-8"` or `"latin-1"`.
    ///
    /// Unknown labels are reported by [`build`](Self::build).
    pub fn encoding_label(mut self, label: impl Into<String>) -> Self {
        self.encoding_label = Some(label.into());
        self
    }

    /// Set the maximum bytes taken per read (default: 1024).
    pub fn recv_chunk_size(mut self, size: usize) -> Self {
        self.reader.recv_chunk_size = size;
        self
    }

    /// Set the idle timeout for receive calls (default: 30s).
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.reader.recv_timeout = timeout;
        self
    }

    /// Add a default prompt pattern.
    pub fn prompt(mut self, pattern: impl Into<String>) -> Self {
        self.reader.prompts.push(pattern.into());
        self
    }

    /// Add a default auto-reply.
    pub fn auto_reply(mut self, pattern: impl Into<String>, reply: impl Into<String>) -> Self {
        self.reader.auto_replies.insert(pattern.into(), reply.into());
        self
    }

    /// Call `handler` with each chunk of decoded text.
    pub fn on_recv_partial_text(mut self, handler: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_recv_partial_text = Some(Box::new(handler));
        self
    }

    /// Build the driver.
    ///
    /// This validates the configuration but does not connect. Call
    /// `open_shell()` on the returned driver to establish the connection.
    pub fn build(self) -> Result<InteractiveDriver<SshChannel>> {
        let username = self
            .username
            .ok_or_else(|| DriverError::invalid_argument("username is required"))?;

        let mut reader = self.reader;
        if let Some(label) = self.encoding_label {
            reader.encoding = label.parse()?;
        }
        reader.validate()?;

        let ssh_config = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        let mut driver = InteractiveDriver::ssh(ssh_config, reader);
        if let Some(handler) = self.on_recv_partial_text {
            driver.set_boxed_partial_text_handler(handler);
        }
        Ok(driver)
    }
}
