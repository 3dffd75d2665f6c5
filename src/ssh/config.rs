//! SSH connection settings.

use std::time::Duration;

use crate::client::error::{ClientError, ClientResult, ConnectFailure};

/// Default SSH port, used when the `port` setting is absent or zero.
pub const DEFAULT_PORT: u16 = 22;

/// Handshake timeout for one connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// SSH connection settings.
#[derive(Clone)]
pub struct SshSettings {
    /// Remote host name or address.
    pub host: String,

    /// SSH username.
    pub user: String,

    /// SSH port.
    pub port: u16,

    /// Private key content (OpenSSH or PEM).
    pub private_key: String,

    /// Passphrase protecting the private key, if any.
    pub private_key_passphrase: Option<String>,

    /// Pin the host key to the signer key instead of accepting any.
    pub secure: bool,

    /// Handshake timeout.
    pub connect_timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            port: DEFAULT_PORT,
            private_key: String::new(),
            private_key_passphrase: None,
            secure: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for SshSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSettings")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl SshSettings {
    /// Create settings for a host and user; the key is set separately.
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// Set the private key content
    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = key.into();
        self
    }

    /// Check the settings required before any network activity.
    pub fn validate(&self) -> ClientResult<()> {
        let missing = if self.host.is_empty() {
            Some("host")
        } else if self.user.is_empty() {
            Some("user")
        } else if self.private_key.is_empty() {
            Some("private key")
        } else {
            None
        };
        match missing {
            Some(what) => Err(ClientError::connect(
                "ssh",
                ConnectFailure::ConfigInvalid,
                format!("{} is required", what),
            )),
            None => Ok(()),
        }
    }

    /// Port to dial, falling back to 22.
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_PORT
        } else {
            self.port
        }
    }
}

/// Host key verification policy.
#[derive(Debug, Clone, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key (insecure, but matches OpenSSH StrictHostKeyChecking=no).
    #[default]
    AcceptAny,

    /// Accept only a host key equal to the given public key.
    Pinned(russh_keys::PublicKey),
}

impl HostKeyPolicy {
    /// Whether the server key passes this policy.
    pub fn accepts(&self, server_key: &russh_keys::PublicKey) -> bool {
        match self {
            HostKeyPolicy::AcceptAny => true,
            HostKeyPolicy::Pinned(expected) => expected.key_data() == server_key.key_data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_settings_new() {
        let settings = SshSettings::new("10.0.0.5", "ec2-user");

        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(settings.user, "ec2-user");
        assert_eq!(settings.port, 22);
        assert!(!settings.secure);
    }

    #[test]
    fn test_validate_missing_fields() {
        let err = SshSettings::default().validate().unwrap_err();
        assert!(err.to_string().contains("host is required"));

        let err = SshSettings::new("host", "").validate().unwrap_err();
        assert!(err.to_string().contains("user is required"));

        let err = SshSettings::new("host", "user").validate().unwrap_err();
        assert_eq!(err.connect_failure(), Some(ConnectFailure::ConfigInvalid));
        assert!(err.to_string().contains("private key is required"));

        assert!(SshSettings::new("host", "user")
            .with_private_key("key")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_effective_port() {
        let mut settings = SshSettings::new("host", "user");
        settings.port = 0;
        assert_eq!(settings.effective_port(), 22);
        settings.port = 2222;
        assert_eq!(settings.effective_port(), 2222);
    }

    #[test]
    fn test_debug_hides_key() {
        let settings = SshSettings::new("host", "user").with_private_key("SECRET");
        assert!(!format!("{:?}", settings).contains("SECRET"));
    }
}
