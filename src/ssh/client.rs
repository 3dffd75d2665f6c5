//! SSH transport implementation using russh.
//!
//! Provides connection management, key authentication and host key policy.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};

use crate::client::error::{ClientError, ClientResult, ConnectFailure};
use crate::connection::{CommandOutput, ConnectionState, Transport};
use crate::ssh::config::{HostKeyPolicy, SshSettings};
use crate::ssh::keys::{decode_private_key, key_fingerprint};
use crate::ssh::sftp::SftpClient;
use crate::utils::command_line;

const TRANSPORT: &str = "ssh";

/// SSH connection authenticated with a private key.
pub struct SshConnection {
    settings: SshSettings,
    session: Option<Handle<ClientHandler>>,
    state: ConnectionState,
}

impl SshConnection {
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings,
            session: None,
            state: ConnectionState::Uninitialized,
        }
    }

    pub fn settings(&self) -> &SshSettings {
        &self.settings
    }

    fn session(&self) -> ClientResult<&Handle<ClientHandler>> {
        self.ensure_connected()?;
        self.session.as_ref().ok_or(ClientError::NotConnected {
            transport: TRANSPORT,
        })
    }
}

#[async_trait]
impl Transport for SshConnection {
    fn name(&self) -> &'static str {
        TRANSPORT
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> ClientResult<()> {
        self.settings.validate()?;

        let passphrase = self
            .settings
            .private_key_passphrase
            .as_deref()
            .filter(|p| !p.is_empty());
        let key = decode_private_key(&self.settings.private_key, passphrase)?;
        if let Some(fp) = key_fingerprint(&self.settings.private_key) {
            tracing::debug!("ssh: using key {}", fp);
        }

        let host_key_policy = if self.settings.secure {
            HostKeyPolicy::Pinned(key.public_key().clone())
        } else {
            HostKeyPolicy::AcceptAny
        };

        let russh_config = Arc::new(client::Config {
            // No inactivity timeout - keep connection alive indefinitely
            inactivity_timeout: None,
            // Send keep-alive every 15 seconds
            keepalive_interval: Some(std::time::Duration::from_secs(15)),
            // Allow up to 4 missed keep-alives before disconnect (60 seconds)
            keepalive_max: 4,
            ..Default::default()
        });

        let host = self.settings.host.clone();
        let port = self.settings.effective_port();
        let handler = ClientHandler { host_key_policy };

        let connecting = client::connect(russh_config, (host.as_str(), port), handler);
        let mut session = tokio::time::timeout(self.settings.connect_timeout, connecting)
            .await
            .map_err(|_| {
                ClientError::connect(
                    TRANSPORT,
                    ConnectFailure::Network,
                    format!(
                        "cannot connect to host '{}': handshake timed out after {:?}",
                        host, self.settings.connect_timeout
                    ),
                )
            })?
            .map_err(|e| {
                let kind = match e {
                    russh::Error::UnknownKey => ConnectFailure::Auth,
                    _ => ConnectFailure::Network,
                };
                ClientError::connect(
                    TRANSPORT,
                    kind,
                    format!("cannot connect to host '{}': {}", host, e),
                )
            })?;

        let authenticated = session
            .authenticate_publickey(&self.settings.user, Arc::new(key))
            .await
            .map_err(|e| {
                ClientError::connect(
                    TRANSPORT,
                    ConnectFailure::Auth,
                    format!("cannot authenticate as '{}': {}", self.settings.user, e),
                )
            })?;
        if !authenticated {
            return Err(ClientError::connect(
                TRANSPORT,
                ConnectFailure::Auth,
                format!("host '{}' rejected key for user '{}'", host, self.settings.user),
            ));
        }

        tracing::debug!("ssh: connected to {}@{}:{}", self.settings.user, host, port);
        self.session = Some(session);
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        self.state = ConnectionState::Disconnected;

        session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| ClientError::Disconnect {
                transport: TRANSPORT,
                message: format!("cannot disconnect from host '{}': {}", self.settings.host, e),
            })
    }

    async fn command(&self, argv: &[String]) -> ClientResult<CommandOutput> {
        let session = self.session()?;
        let command = command_line(argv);
        tracing::debug!("ssh: running {}", command);
        crate::ssh::exec::exec_command(session, &command).await
    }

    async fn copy_file(&self, local_path: &Path, remote_path: &str) -> ClientResult<()> {
        let session = self.session()?;
        let sftp = SftpClient::new(session).await.map_err(|e| ClientError::Copy {
            transport: TRANSPORT,
            local: local_path.display().to_string(),
            remote: remote_path.to_string(),
            message: e.to_string(),
        })?;
        sftp.upload(local_path, remote_path).await
    }

    fn info(&self) -> String {
        format!(
            "ssh: host='{}', user='{}', port='{}'",
            self.settings.host,
            self.settings.user,
            self.settings.effective_port()
        )
    }

    async fn user(&self) -> String {
        self.settings.user.clone()
    }
}

/// Client handler for russh connection callbacks.
pub struct ClientHandler {
    pub host_key_policy: HostKeyPolicy,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh_keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let accepted = self.host_key_policy.accepts(server_public_key);
        if !accepted {
            tracing::warn!("ssh: server host key does not match the pinned key");
        }
        Ok(accepted)
    }
}
