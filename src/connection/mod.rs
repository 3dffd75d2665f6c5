//! Transport abstraction layer.
//!
//! A [`Connection`] is the transport-specific primitive underneath a
//! [`Client`](crate::client::Client): it opens and closes a session, runs one
//! command line and uploads one local file. Every variant implements the same
//! [`Transport`] contract.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │     Client      │  ← env, sudo, file operations, retry
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Connection    │  ← enum dispatch over Transport
//! └────────┬────────┘
//!          │
//!    ┌─────┼──────┐
//!    ▼     ▼      ▼
//! ┌─────┐┌─────┐┌───────┐
//! │ SSH ││ SSM ││ Local │
//! └─────┘└─────┘└───────┘
//! ```
//!
//! # Lifecycle
//!
//! `Uninitialized -> Connected -> Disconnected`. `command` and `copy_file`
//! fail fast with [`ClientError::NotConnected`] outside `Connected`.
//! `disconnect` on a connection that never connected is a no-op.

pub mod local;
pub mod ssm;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

pub use local::LocalConnection;
pub use ssm::{SsmConnection, SsmSettings};

use crate::client::error::{ClientError, ClientResult};
use crate::ssh::SshConnection;

/// Output captured from one remote command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,

    /// Standard error. Transports that only expose it on failure leave it empty.
    pub stderr: String,

    /// Exit status when the transport reports one.
    pub exit_code: Option<i32>,

    /// Signal that terminated the command, if any.
    pub signal: Option<String>,
}

impl CommandOutput {
    /// Create a new command output.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            signal: None,
        }
    }

    /// Mark the command as terminated by `signal`.
    pub fn with_signal(mut self, signal: impl Into<String>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    /// Whether the command exited normally with status 0.
    ///
    /// A command that ended without reporting a status did not finish.
    pub fn success(&self) -> bool {
        self.signal.is_none() && self.exit_code == Some(0)
    }

    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }

    /// Turn a nonzero exit into an execution error carrying the output.
    pub fn into_result(self, transport: &'static str, command: &str) -> ClientResult<String> {
        if self.success() {
            return Ok(self.combined());
        }
        let message = match (&self.signal, self.exit_code) {
            (Some(signal), _) => format!("killed by signal {}", signal),
            (None, Some(code)) => format!("exit status {}", code),
            (None, None) => "command ended without exit status".to_string(),
        };
        Err(ClientError::execution(
            transport,
            command,
            message,
            self.combined(),
        ))
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Uninitialized => write!(f, "uninitialized"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Contract every transport implements.
///
/// None of the operations are safe to call concurrently on one instance.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name used in error messages
    fn name(&self) -> &'static str;

    /// Current lifecycle state
    fn state(&self) -> ConnectionState;

    /// Establish the session.
    async fn connect(&mut self) -> ClientResult<()>;

    /// Tear the session down. Succeeds when never connected.
    async fn disconnect(&mut self) -> ClientResult<()>;

    /// Run one command line and return its output.
    ///
    /// A nonzero exit is reported through [`CommandOutput::exit_code`], not as
    /// an error; transport failures are errors.
    async fn command(&self, argv: &[String]) -> ClientResult<CommandOutput>;

    /// Transfer one local file to a remote path.
    async fn copy_file(&self, local_path: &Path, remote_path: &str) -> ClientResult<()>;

    /// Human-readable endpoint description, for logs only.
    fn info(&self) -> String;

    /// Effective remote user.
    async fn user(&self) -> String;

    /// Fail fast unless the connection is live
    fn ensure_connected(&self) -> ClientResult<()> {
        if self.state() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(ClientError::NotConnected {
                transport: self.name(),
            })
        }
    }
}

/// Transport variants behind a [`Client`](crate::client::Client).
pub enum Connection {
    Ssh(SshConnection),
    AwsSsm(SsmConnection),
    Local(LocalConnection),
}

impl Connection {
    fn inner(&self) -> &dyn Transport {
        match self {
            Connection::Ssh(c) => c,
            Connection::AwsSsm(c) => c,
            Connection::Local(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Transport {
        match self {
            Connection::Ssh(c) => c,
            Connection::AwsSsm(c) => c,
            Connection::Local(c) => c,
        }
    }
}

#[async_trait]
impl Transport for Connection {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn state(&self) -> ConnectionState {
        self.inner().state()
    }

    async fn connect(&mut self) -> ClientResult<()> {
        self.inner_mut().connect().await
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        self.inner_mut().disconnect().await
    }

    async fn command(&self, argv: &[String]) -> ClientResult<CommandOutput> {
        self.inner().command(argv).await
    }

    async fn copy_file(&self, local_path: &Path, remote_path: &str) -> ClientResult<()> {
        self.inner().copy_file(local_path, remote_path).await
    }

    fn info(&self) -> String {
        self.inner().info()
    }

    async fn user(&self) -> String {
        self.inner().user().await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({}, {})", self.info(), self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_success() {
        let output = CommandOutput::new("hello", "", Some(0));
        assert!(output.success());
        assert_eq!(output.into_result("local", "echo hello").unwrap(), "hello");
    }

    #[test]
    fn test_command_output_failure_keeps_output() {
        let output = CommandOutput::new("partial\n", "boom\n", Some(2));
        assert!(!output.success());
        let err = output.into_result("ssh", "make").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit status 2"));
        assert!(msg.ends_with("partial\nboom\n"));
    }

    #[test]
    fn test_command_output_without_exit_code_fails() {
        let output = CommandOutput::new("half written\n", "", None);
        assert!(!output.success());
        let err = output
            .into_result("ssh", "sh aemw instance launch")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("without exit status"));
        assert!(msg.ends_with("half written\n"));
    }

    #[test]
    fn test_command_output_killed_by_signal() {
        let output = CommandOutput::new("partial", "", Some(0)).with_signal("KILL");
        assert!(!output.success());
        let err = output.into_result("ssh", "sh aemw instance create").unwrap_err();
        assert!(err.to_string().contains("killed by signal KILL"));
    }

    #[tokio::test]
    async fn test_local_connection_lifecycle() {
        let mut conn = Connection::Local(LocalConnection::new());
        assert_eq!(conn.state(), ConnectionState::Uninitialized);

        let err = conn.command(&["true".to_string()]).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected { transport: "local" }));

        conn.connect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);

        conn.disconnect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.command(&["true".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_never_connected_is_noop() {
        let mut conn = Connection::Local(LocalConnection::new());
        assert!(conn.disconnect().await.is_ok());
    }
}
