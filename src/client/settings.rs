//! Client types and typed access to flat connection settings.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ClientError, ClientResult};
use crate::config::parse_duration;
use crate::connection::SsmSettings;
use crate::ssh::SshSettings;

/// Flat, transport-specific settings map.
pub type ConnectionSettings = HashMap<String, String>;

/// Supported client (transport) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientType {
    Ssh,
    AwsSsm,
}

impl ClientType {
    /// Get all supported client types
    pub fn all() -> &'static [ClientType] {
        &[Self::Ssh, Self::AwsSsm]
    }

    /// Get client type name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::AwsSsm => "aws-ssm",
        }
    }

    /// Get list of supported client type names
    pub fn supported_names() -> Vec<String> {
        Self::all().iter().map(|t| t.as_str().to_string()).collect()
    }

    /// Parse client type from its exact name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ClientType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ClientError::UnknownType {
            name: s.to_string(),
            supported: Self::supported_names(),
        })
    }
}

/// Typed view over a [`ConnectionSettings`] map.
///
/// Absent or empty values fall back to defaults; present values that cannot be
/// coerced are configuration errors.
pub struct Settings<'a> {
    values: &'a ConnectionSettings,
}

impl<'a> Settings<'a> {
    pub fn new(values: &'a ConnectionSettings) -> Self {
        Self { values }
    }

    /// First non-empty value among the given keys.
    fn lookup(&self, keys: &[&'static str]) -> Option<(&'static str, &'a str)> {
        keys.iter().find_map(|key| {
            self.values
                .get(*key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| (*key, v))
        })
    }

    pub fn string(&self, key: &'static str) -> String {
        self.lookup(&[key]).map(|(_, v)| v.to_string()).unwrap_or_default()
    }

    pub fn optional_string(&self, key: &'static str) -> Option<String> {
        self.lookup(&[key]).map(|(_, v)| v.to_string())
    }

    pub fn port(&self, key: &'static str, default: u16) -> ClientResult<u16> {
        match self.lookup(&[key]) {
            None => Ok(default),
            Some((key, value)) => value
                .parse::<u16>()
                .map_err(|e| ClientError::invalid_setting(key, format!("'{}': {}", value, e))),
        }
    }

    pub fn bool(&self, key: &'static str) -> ClientResult<bool> {
        match self.lookup(&[key]) {
            None => Ok(false),
            Some((key, value)) => parse_bool(value).ok_or_else(|| {
                ClientError::invalid_setting(key, format!("'{}' is not a boolean", value))
            }),
        }
    }

    /// Duration from the first present key among aliases.
    pub fn duration(&self, keys: &[&'static str], default: Duration) -> ClientResult<Duration> {
        match self.lookup(keys) {
            None => Ok(default),
            Some((key, value)) => parse_duration(value).ok_or_else(|| {
                ClientError::invalid_setting(
                    key,
                    format!("'{}' is not a duration (use e.g. '30s', '5m', '1h30m')", value),
                )
            }),
        }
    }

    /// SSH transport settings.
    pub fn ssh(&self) -> ClientResult<SshSettings> {
        Ok(SshSettings {
            host: self.string("host"),
            user: self.string("user"),
            port: self.port("port", crate::ssh::config::DEFAULT_PORT)?,
            private_key: self.string("private_key"),
            private_key_passphrase: self.optional_string("private_key_passphrase"),
            secure: self.bool("secure")?,
            connect_timeout: crate::ssh::config::DEFAULT_CONNECT_TIMEOUT,
        })
    }

    /// AWS SSM transport settings.
    pub fn aws_ssm(&self) -> ClientResult<SsmSettings> {
        let defaults = SsmSettings::default();
        Ok(SsmSettings {
            instance_id: self.string("instance_id"),
            region: self.string("region"),
            output_timeout: self.duration(
                &["output_timeout", "command_output_timeout"],
                defaults.output_timeout,
            )?,
            min_wait_delay: self.duration(
                &["min_wait_delay", "command_wait_min"],
                defaults.min_wait_delay,
            )?,
            max_wait_delay: self.duration(
                &["max_wait_delay", "command_wait_max"],
                defaults.max_wait_delay,
            )?,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "yes" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> ConnectionSettings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_client_type_from_str() {
        assert_eq!("ssh".parse::<ClientType>().unwrap(), ClientType::Ssh);
        assert_eq!("aws-ssm".parse::<ClientType>().unwrap(), ClientType::AwsSsm);
        let err = "telnet".parse::<ClientType>().unwrap_err();
        assert!(matches!(err, ClientError::UnknownType { .. }));
        assert!(err.to_string().contains("telnet"));
    }

    #[test]
    fn test_client_type_serde_names() {
        let t: ClientType = serde_yaml::from_str("aws-ssm").unwrap();
        assert_eq!(t, ClientType::AwsSsm);
        assert_eq!(ClientType::Ssh.to_string(), "ssh");
    }

    #[test]
    fn test_ssh_settings_coercion() {
        let values = settings(&[
            ("host", "10.0.0.5"),
            ("user", "ec2-user"),
            ("port", "2222"),
            ("private_key", "KEY"),
            ("secure", "true"),
        ]);
        let ssh = Settings::new(&values).ssh().unwrap();
        assert_eq!(ssh.host, "10.0.0.5");
        assert_eq!(ssh.port, 2222);
        assert!(ssh.secure);
        assert_eq!(ssh.private_key_passphrase, None);
    }

    #[test]
    fn test_ssh_settings_defaults() {
        let values = settings(&[("host", "h"), ("port", ""), ("secure", "")]);
        let ssh = Settings::new(&values).ssh().unwrap();
        assert_eq!(ssh.port, 22);
        assert!(!ssh.secure);
    }

    #[test]
    fn test_invalid_port() {
        let values = settings(&[("port", "twenty-two")]);
        let err = Settings::new(&values).ssh().unwrap_err();
        assert!(matches!(err, ClientError::InvalidSetting { ref key, .. } if key == "port"));
    }

    #[test]
    fn test_invalid_bool() {
        let values = settings(&[("secure", "maybe")]);
        assert!(Settings::new(&values).ssh().is_err());
    }

    #[test]
    fn test_ssm_settings_aliases() {
        let values = settings(&[
            ("instance_id", "i-abc"),
            ("region", "eu-west-1"),
            ("command_output_timeout", "30m"),
            ("min_wait_delay", "2s"),
            ("command_wait_max", "1m"),
        ]);
        let ssm = Settings::new(&values).aws_ssm().unwrap();
        assert_eq!(ssm.instance_id, "i-abc");
        assert_eq!(ssm.output_timeout, Duration::from_secs(1800));
        assert_eq!(ssm.min_wait_delay, Duration::from_secs(2));
        assert_eq!(ssm.max_wait_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_ssm_settings_defaults() {
        let values = settings(&[("instance_id", "i-abc")]);
        let ssm = Settings::new(&values).aws_ssm().unwrap();
        assert_eq!(ssm.output_timeout, Duration::from_secs(3600));
        assert_eq!(ssm.min_wait_delay, Duration::from_secs(5));
        assert_eq!(ssm.max_wait_delay, Duration::from_secs(120));
    }

    #[test]
    fn test_ssm_invalid_duration() {
        let values = settings(&[("output_timeout", "forever")]);
        let err = Settings::new(&values).aws_ssm().unwrap_err();
        assert!(err.is_config());
    }
}
