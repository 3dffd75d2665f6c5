//! Local subprocess transport, for development and tests.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use super::{CommandOutput, ConnectionState, Transport};
use crate::client::error::{ClientError, ClientResult};
use crate::utils::command_line;

const TRANSPORT: &str = "local";

/// Runs commands as subprocesses of the current process.
#[derive(Debug, Default)]
pub struct LocalConnection {
    state: ConnectionState,
}

impl LocalConnection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for LocalConnection {
    fn name(&self) -> &'static str {
        TRANSPORT
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> ClientResult<()> {
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
        }
        Ok(())
    }

    async fn command(&self, argv: &[String]) -> ClientResult<CommandOutput> {
        self.ensure_connected()?;
        let (program, args) = argv.split_first().ok_or_else(|| {
            ClientError::execution(TRANSPORT, "", "empty command line", "")
        })?;

        tracing::debug!("local: running {}", command_line(argv));
        let output = Command::new(program).args(args).output().await.map_err(|e| {
            ClientError::execution(TRANSPORT, command_line(argv), e.to_string(), "")
        })?;

        Ok(CommandOutput::new(
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
            output.status.code().or(Some(-1)),
        ))
    }

    async fn copy_file(&self, local_path: &Path, remote_path: &str) -> ClientResult<()> {
        self.ensure_connected()?;
        tokio::fs::copy(local_path, remote_path)
            .await
            .map(|_| ())
            .map_err(|e| ClientError::Copy {
                transport: TRANSPORT,
                local: local_path.display().to_string(),
                remote: remote_path.to_string(),
                message: e.to_string(),
            })
    }

    fn info(&self) -> String {
        "local environment".to_string()
    }

    async fn user(&self) -> String {
        std::env::var("USER").unwrap_or_default()
    }
}
