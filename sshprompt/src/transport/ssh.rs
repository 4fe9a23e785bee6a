//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::client::{self, Handle};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::channel::SshChannel;
use crate::error::{ChannelError, Result, TransportError};

/// SSH transport wrapping russh client.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Terminal size requested for shells.
    terminal_width: u32,
    terminal_height: u32,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            known_hosts: KnownHosts {
                host: config.host.clone(),
                port: config.port,
                path: config.known_hosts_path.clone(),
            },
            host_key_verification: config.host_key_verification,
            host_key_error: host_key_error.clone(),
        };

        debug!("Connecting to {}.", config.socket_addr());
        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed error recorded by check_server_key over
            // russh's generic UnknownKey
            let stored = host_key_error
                .lock()
                .ok()
                .and_then(|mut slot| slot.take());
            stored.unwrap_or(TransportError::Ssh(e))
        })?;

        Self::authenticate(&mut session, config).await?;

        Ok(Self {
            session,
            terminal_width: config.terminal_width,
            terminal_height: config.terminal_height,
        })
    }

    /// Open a session channel, allocate a PTY and start a shell on it.
    pub async fn open_shell(&self) -> Result<SshChannel> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.terminal_width,
                self.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(ChannelError::PtyOpenFailed)?;

        channel
            .request_shell(true)
            .await
            .map_err(ChannelError::ShellRequestFailed)?;

        Ok(SshChannel::new(channel))
    }

    /// Whether the underlying session has shut down.
    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let passphrase = passphrase.as_ref().map(|p| p.expose_secret());
                let key = load_secret_key(path, passphrase)
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// Lookup result for a server key in known_hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostKeyStatus {
    Known,
    Unknown,
    /// A different key is recorded for this host on `line`.
    Mismatch { line: usize },
}

/// What to do with a server key that passed the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Accept,
    AcceptAndRecord,
}

/// The known_hosts entry point for one host.
struct KnownHosts {
    host: String,
    port: u16,
    path: Option<PathBuf>,
}

impl KnownHosts {
    fn lookup(&self, key: &PublicKey) -> std::result::Result<HostKeyStatus, TransportError> {
        let found = match &self.path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        match found {
            Ok(true) => Ok(HostKeyStatus::Known),
            Ok(false) => Ok(HostKeyStatus::Unknown),
            Err(russh::keys::Error::KeyChanged { line }) => Ok(HostKeyStatus::Mismatch { line }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn record(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        use russh::keys::known_hosts::{learn_known_hosts, learn_known_hosts_path};

        let learned = match &self.path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        learned.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    /// Apply `mode` to a lookup result.
    fn admit(
        &self,
        mode: HostKeyVerification,
        status: HostKeyStatus,
    ) -> std::result::Result<Admission, TransportError> {
        match (status, mode) {
            (_, HostKeyVerification::Disabled) | (HostKeyStatus::Known, _) => Ok(Admission::Accept),
            (HostKeyStatus::Unknown, HostKeyVerification::AcceptNew) => {
                Ok(Admission::AcceptAndRecord)
            }
            (HostKeyStatus::Unknown, HostKeyVerification::Strict) => {
                Err(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })
            }
            (HostKeyStatus::Mismatch { line }, _) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
        }
    }
}

/// russh client callbacks.
struct SshHandler {
    known_hosts: KnownHosts,
    host_key_verification: HostKeyVerification,
    /// Why the last server key was refused, for connect() to report.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    fn verify(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        if self.host_key_verification == HostKeyVerification::Disabled {
            debug!("host key verification disabled for {}", self.known_hosts.host);
            return Ok(());
        }

        let status = self.known_hosts.lookup(key)?;
        if self.known_hosts.admit(self.host_key_verification, status)? == Admission::AcceptAndRecord {
            debug!("recording new host key for {}", self.known_hosts.host);
            if let Err(e) = self.known_hosts.record(key) {
                warn!("Failed to save host key: {}", e);
            }
        }
        Ok(())
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.verify(server_public_key) {
            Ok(()) => Ok(true),
            Err(e) => {
                if let Ok(mut slot) = self.host_key_error.lock() {
                    *slot = Some(e);
                }
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known_hosts() -> KnownHosts {
        KnownHosts {
            host: "router1".into(),
            port: 2222,
            path: None,
        }
    }

    #[test]
    fn test_known_key_is_accepted_in_every_mode() {
        let hosts = known_hosts();
        for mode in [
            HostKeyVerification::Strict,
            HostKeyVerification::AcceptNew,
            HostKeyVerification::Disabled,
        ] {
            assert_eq!(hosts.admit(mode, HostKeyStatus::Known).unwrap(), Admission::Accept);
        }
    }

    #[test]
    fn test_unknown_key() {
        let hosts = known_hosts();
        assert_eq!(
            hosts
                .admit(HostKeyVerification::AcceptNew, HostKeyStatus::Unknown)
                .unwrap(),
            Admission::AcceptAndRecord
        );
        assert!(matches!(
            hosts.admit(HostKeyVerification::Strict, HostKeyStatus::Unknown),
            Err(TransportError::HostKeyUnknown { port: 2222, .. })
        ));
    }

    #[test]
    fn test_changed_key_is_rejected_unless_disabled() {
        let hosts = known_hosts();
        let changed = HostKeyStatus::Mismatch { line: 7 };
        for mode in [HostKeyVerification::Strict, HostKeyVerification::AcceptNew] {
            assert!(matches!(
                hosts.admit(mode, changed),
                Err(TransportError::HostKeyChanged { line: 7, .. })
            ));
        }
        assert_eq!(
            hosts.admit(HostKeyVerification::Disabled, changed).unwrap(),
            Admission::Accept
        );
    }
}
