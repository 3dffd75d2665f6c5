//! Transport-agnostic remote client.
//!
//! A [`Client`] wraps exactly one [`Connection`] and layers on top of it:
//!
//! - shell composition: environment sourcing, working directory, sudo prefix
//! - idempotent remote file and directory operations (see [`fs`])
//! - a connect-with-retry loop for machines whose agent is still booting
//!
//! `env`, `work_dir` and `sudo` are plain fields mutated by the caller between
//! operations. A client is not meant to be shared between tasks.

pub mod error;
mod fs;
pub mod manager;
pub mod settings;
mod sudo;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use error::{ClientError, ClientResult, ConnectFailure};
pub use manager::ClientManager;
pub use settings::{ClientType, ConnectionSettings};
pub use sudo::SudoGuard;

use crate::connection::{Connection, LocalConnection, Transport};
use crate::utils::{env_to_script, remote_join, shell_quote};

/// Delay between connect attempts in [`Client::connect_with_retry`].
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Remote client over one connection.
pub struct Client {
    type_name: &'static str,
    connection: Connection,
    retry_interval: Duration,

    /// Environment variables exported to every command run through
    /// [`Client::run_shell_command`] (after [`Client::setup_env`]).
    pub env: BTreeMap<String, String>,

    /// Remote directory for the environment script and transient scripts.
    pub work_dir: String,

    /// Prefix commands with `sudo`. Prefer [`Client::with_sudo`] over setting it.
    pub sudo: bool,
}

impl Client {
    pub fn new(type_name: &'static str, connection: Connection) -> Self {
        Self {
            type_name,
            connection,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            env: BTreeMap::new(),
            work_dir: String::new(),
            sudo: false,
        }
    }

    /// Client running commands on the local machine.
    pub fn local() -> Self {
        Self::new("local", Connection::Local(LocalConnection::new()))
    }

    /// Set the delay between connect attempts
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub async fn connect(&mut self) -> ClientResult<()> {
        self.connection.connect().await
    }

    pub async fn disconnect(&mut self) -> ClientResult<()> {
        self.connection.disconnect().await
    }

    /// Connect, retrying until success or until `timeout` elapses.
    ///
    /// `on_retry` is called before every retry. Invalid configuration is
    /// returned at once; every other failure is retried. On timeout the last
    /// connect error is wrapped.
    pub async fn connect_with_retry<F>(&mut self, timeout: Duration, mut on_retry: F) -> ClientResult<()>
    where
        F: FnMut(),
    {
        let started = Instant::now();
        let mut attempt = 1u32;

        loop {
            let err = match self.connection.connect().await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            if err.connect_failure() == Some(ConnectFailure::ConfigInvalid) {
                return Err(err);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ClientError::ConnectTimeout {
                    timeout,
                    source: Box::new(err),
                });
            }

            tracing::debug!("Connect attempt {} failed: {}", attempt, err);
            tokio::time::sleep(self.retry_interval.min(timeout - elapsed)).await;
            on_retry();
            attempt += 1;
        }
    }

    /// Path of the environment script under the work directory.
    pub fn env_script_path(&self) -> String {
        remote_join(&self.work_dir, "env.sh")
    }

    /// Environment script content for the current `env`.
    pub fn env_script(&self) -> String {
        env_to_script(&self.env)
    }

    /// Write the environment script to `<work_dir>/env.sh`.
    pub async fn setup_env(&self) -> ClientResult<()> {
        self.file_write(&self.env_script_path(), &self.env_script())
            .await
            .map_err(|e| e.context("cannot setup environment script"))
    }

    /// Write `script` to `<work_dir>/<name>.sh`, run it, then delete it.
    ///
    /// The script file is removed whatever the outcome; a failed removal is
    /// logged and never replaces the script's own result.
    pub async fn run_shell_script(&self, name: &str, script: &str, dir: &str) -> ClientResult<String> {
        let remote_path = remote_join(&self.work_dir, &format!("{}.sh", name));
        self.file_write(&remote_path, script).await.map_err(|e| {
            e.context(format!(
                "cannot write temporary script at remote path '{}'",
                remote_path
            ))
        })?;

        let result = self
            .run_shell_command(&format!("sh {}", shell_quote(&remote_path)), dir)
            .await;
        self.cleanup(&remote_path).await;
        result
    }

    /// Run `cmd` with the environment script sourced, optionally from `dir`.
    ///
    /// `dir` of `""` or `"."` keeps the login directory.
    pub async fn run_shell_command(&self, cmd: &str, dir: &str) -> ClientResult<String> {
        let env_script = self.env_script_path();
        let composed = if dir.is_empty() || dir == "." {
            format!(". {} && {}", shell_quote(&env_script), cmd)
        } else {
            format!(
                ". {} && cd {} && {}",
                shell_quote(&env_script),
                shell_quote(dir),
                cmd
            )
        };
        self.run_shell_purely(&composed).await
    }

    /// Run `cmd` in `sh -c` without sourcing the environment script.
    ///
    /// The `sudo` prefix is decided here, from the flag's current value.
    pub async fn run_shell_purely(&self, cmd: &str) -> ClientResult<String> {
        let argv = self.shell_argv(cmd);
        let output = self.connection.command(&argv).await?;
        output.into_result(self.connection.name(), cmd)
    }

    fn shell_argv(&self, cmd: &str) -> Vec<String> {
        let mut argv = Vec::with_capacity(4);
        if self.sudo {
            argv.push("sudo".to_string());
        }
        argv.extend(["sh".to_string(), "-c".to_string(), cmd.to_string()]);
        argv
    }

    /// Best-effort delete; failures are logged only.
    async fn cleanup(&self, remote_path: &str) {
        if let Err(e) = self.file_delete(remote_path).await {
            tracing::debug!("Cannot clean up remote path '{}': {}", remote_path, e);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("type_name", &self.type_name)
            .field("connection", &self.connection)
            .field("work_dir", &self.work_dir)
            .field("sudo", &self.sudo)
            .finish_non_exhaustive()
    }
}
