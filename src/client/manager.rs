//! Client factory.
//!
//! The manager is the single validation gate for the transport type name: it
//! maps a type name plus a flat settings map to a [`Client`] over the matching
//! [`Connection`]. It holds no state, so one instance is created per provider
//! configuration and passed down explicitly.

use super::error::ClientResult;
use super::settings::{ClientType, ConnectionSettings, Settings};
use super::Client;
use crate::connection::{Connection, SsmConnection};
use crate::ssh::SshConnection;

/// Creates clients by transport type name.
#[derive(Debug, Default, Clone)]
pub struct ClientManager;

impl ClientManager {
    pub fn new() -> Self {
        Self
    }

    /// Build an unconnected client for the given type and settings.
    pub fn make(&self, type_name: &str, settings: &ConnectionSettings) -> ClientResult<Client> {
        let client_type: ClientType = type_name.parse()?;
        let connection = self.connection(client_type, settings)?;
        tracing::debug!("Made {} client", client_type);
        Ok(Client::new(client_type.as_str(), connection))
    }

    fn connection(
        &self,
        client_type: ClientType,
        settings: &ConnectionSettings,
    ) -> ClientResult<Connection> {
        let settings = Settings::new(settings);
        let connection = match client_type {
            ClientType::Ssh => Connection::Ssh(SshConnection::new(settings.ssh()?)),
            ClientType::AwsSsm => Connection::AwsSsm(SsmConnection::new(settings.aws_ssm()?)),
        };
        Ok(connection)
    }

    /// Supported type names
    pub fn supported_types(&self) -> Vec<String> {
        ClientType::supported_names()
    }

    /// Check if a type name is supported
    pub fn is_supported(&self, type_name: &str) -> bool {
        ClientType::from_name(type_name).is_some()
    }
}
