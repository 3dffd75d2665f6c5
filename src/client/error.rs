//! Client and transport error types.
//!
//! Errors are structured so callers can tell configuration mistakes (never
//! worth retrying) from connect failures (retried by
//! [`Client::connect_with_retry`](super::Client::connect_with_retry)) and from
//! remote command failures (surfaced with the captured output).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why a connect attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Key could not be parsed or the server rejected it
    Auth,
    /// Host unreachable, handshake or session start failed
    Network,
    /// Required setting missing or unusable
    ConfigInvalid,
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectFailure::Auth => write!(f, "authentication failure"),
            ConnectFailure::Network => write!(f, "network failure"),
            ConnectFailure::ConfigInvalid => write!(f, "invalid configuration"),
        }
    }
}

/// Errors raised by connections, the client and the client manager.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Unknown client type name
    #[error("Unknown client type: {name}. Supported types: {supported:?}")]
    UnknownType { name: String, supported: Vec<String> },

    /// A setting is present but cannot be coerced to its type
    #[error("Invalid setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    /// Connect attempt failed
    #[error("{transport}: cannot connect ({kind}): {message}")]
    Connect {
        transport: &'static str,
        kind: ConnectFailure,
        message: String,
    },

    /// Connect loop gave up
    #[error("cannot connect - awaiting timeout reached '{timeout:?}': {source}")]
    ConnectTimeout {
        timeout: Duration,
        #[source]
        source: Box<ClientError>,
    },

    /// Session teardown failed
    #[error("{transport}: cannot disconnect: {message}")]
    Disconnect {
        transport: &'static str,
        message: String,
    },

    /// Command or copy issued on a connection that is not live
    #[error("{transport}: connection is not established")]
    NotConnected { transport: &'static str },

    /// Remote command failed or returned a nonzero status
    #[error("{transport}: cannot run command '{command}': {message}{}", format_output(.output))]
    Execution {
        transport: &'static str,
        command: String,
        message: String,
        output: Option<String>,
    },

    /// Remote command did not finish within its wait budget
    #[error("{transport}: command '{command}' timed out after {elapsed:?}")]
    Timeout {
        transport: &'static str,
        command: String,
        elapsed: Duration,
    },

    /// File transfer failed
    #[error("{transport}: cannot copy local file '{local}' to remote path '{remote}': {message}")]
    Copy {
        transport: &'static str,
        local: String,
        remote: String,
        message: String,
    },

    /// Local file system error
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Higher-level operation failed, with the operation and its arguments
    #[error("{context}: {source}")]
    Operation {
        context: String,
        #[source]
        source: Box<ClientError>,
    },
}

fn format_output(output: &Option<String>) -> String {
    match output {
        Some(out) if !out.trim().is_empty() => format!("\n\n{}", out),
        _ => String::new(),
    }
}

impl ClientError {
    /// Create a connect error
    pub fn connect(
        transport: &'static str,
        kind: ConnectFailure,
        message: impl Into<String>,
    ) -> Self {
        Self::Connect {
            transport,
            kind,
            message: message.into(),
        }
    }

    /// Create an execution error, keeping the output only when some was produced
    pub fn execution(
        transport: &'static str,
        command: impl Into<String>,
        message: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        let output = output.into();
        Self::Execution {
            transport,
            command: command.into(),
            message: message.into(),
            output: if output.is_empty() { None } else { Some(output) },
        }
    }

    /// Create an invalid setting error
    pub fn invalid_setting(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a local IO error
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap this error with the operation that failed
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Operation {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Kind of connect failure, looking through wrapping layers
    pub fn connect_failure(&self) -> Option<ConnectFailure> {
        match self {
            Self::Connect { kind, .. } => Some(*kind),
            Self::ConnectTimeout { source, .. } | Self::Operation { source, .. } => {
                source.connect_failure()
            }
            _ => None,
        }
    }

    /// Check if this error is worth another connect attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => true,
            Self::Operation { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Check if this is a configuration error that no retry can fix
    pub fn is_config(&self) -> bool {
        match self {
            Self::UnknownType { .. } | Self::InvalidSetting { .. } => true,
            Self::Operation { source, .. } => source.is_config(),
            _ => false,
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;
