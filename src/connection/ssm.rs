//! AWS Systems Manager transport.
//!
//! SSM has no interactive channel. A command is submitted with SendCommand
//! (`AWS-RunShellScript`), then its invocation is polled with a growing delay
//! until it reaches a terminal status or the output timeout elapses. Files are
//! transferred inline as base64 through the same command path, so their size
//! is bounded by the remote command-line length limit.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::CommandInvocationStatus;
use base64::Engine;

use super::{CommandOutput, ConnectionState, Transport};
use crate::client::error::{ClientError, ClientResult, ConnectFailure};
use crate::utils::{command_line, shell_quote};

const TRANSPORT: &str = "ssm";
const DOCUMENT_NAME: &str = "AWS-RunShellScript";

/// Settings for the AWS SSM transport.
#[derive(Debug, Clone)]
pub struct SsmSettings {
    /// Managed instance id (e.g. `i-0123456789abcdef0`)
    pub instance_id: String,

    /// AWS region; empty means the ambient default
    pub region: String,

    /// Overall ceiling for one command to produce its output
    pub output_timeout: Duration,

    /// First delay between invocation polls
    pub min_wait_delay: Duration,

    /// Upper bound for the delay between invocation polls
    pub max_wait_delay: Duration,
}

impl Default for SsmSettings {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            region: String::new(),
            output_timeout: Duration::from_secs(3600),
            min_wait_delay: Duration::from_secs(5),
            max_wait_delay: Duration::from_secs(120),
        }
    }
}

/// Live SSM handles.
struct SsmSession {
    client: aws_sdk_ssm::Client,
    session_id: Option<String>,
}

/// Connection to an EC2 (or hybrid) instance managed by SSM.
pub struct SsmConnection {
    settings: SsmSettings,
    session: Option<SsmSession>,
    state: ConnectionState,
}

impl SsmConnection {
    pub fn new(settings: SsmSettings) -> Self {
        Self {
            settings,
            session: None,
            state: ConnectionState::Uninitialized,
        }
    }

    pub fn settings(&self) -> &SsmSettings {
        &self.settings
    }

    fn session(&self) -> ClientResult<&SsmSession> {
        self.ensure_connected()?;
        self.session.as_ref().ok_or(ClientError::NotConnected {
            transport: TRANSPORT,
        })
    }

    /// Poll the invocation until it reaches a terminal status.
    async fn wait_for_output(
        &self,
        client: &aws_sdk_ssm::Client,
        command_id: &str,
        command: &str,
    ) -> ClientResult<CommandOutput> {
        let started = Instant::now();
        let deadline = started + self.settings.output_timeout;
        let mut backoff = WaitBackoff::new(self.settings.min_wait_delay, self.settings.max_wait_delay);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout {
                    transport: TRANSPORT,
                    command: command.to_string(),
                    elapsed: started.elapsed(),
                });
            }
            tokio::time::sleep(backoff.next_delay().min(remaining)).await;

            let result = client
                .get_command_invocation()
                .command_id(command_id)
                .instance_id(&self.settings.instance_id)
                .send()
                .await;

            let invocation = match result {
                Ok(invocation) => invocation,
                Err(e)
                    if e.as_service_error()
                        .map(|se| se.is_invocation_does_not_exist())
                        .unwrap_or(false) =>
                {
                    tracing::debug!("ssm: invocation '{}' not registered yet", command_id);
                    continue;
                }
                Err(e) => {
                    return Err(ClientError::execution(
                        TRANSPORT,
                        command,
                        format!("cannot read command invocation: {}", DisplayErrorContext(&e)),
                        "",
                    ))
                }
            };

            let stdout = invocation.standard_output_content().unwrap_or_default();
            match classify(invocation.status()) {
                InvocationProgress::Pending => continue,
                InvocationProgress::Succeeded => {
                    return Ok(CommandOutput::new(stdout, "", Some(0)));
                }
                InvocationProgress::Failed(status) => {
                    tracing::debug!("ssm: command '{}' ended with status {}", command_id, status);
                    let code = match invocation.response_code() {
                        0 => -1,
                        code => code,
                    };
                    return Ok(CommandOutput::new(
                        stdout,
                        invocation.standard_error_content().unwrap_or_default(),
                        Some(code),
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl Transport for SsmConnection {
    fn name(&self) -> &'static str {
        TRANSPORT
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> ClientResult<()> {
        if self.settings.instance_id.is_empty() {
            return Err(ClientError::connect(
                TRANSPORT,
                ConnectFailure::ConfigInvalid,
                "instance_id is required",
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !self.settings.region.is_empty() {
            loader = loader.region(Region::new(self.settings.region.clone()));
        }
        let config = loader.load().await;
        let client = aws_sdk_ssm::Client::new(&config);

        let output = client
            .start_session()
            .target(&self.settings.instance_id)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                let kind = if message.contains("AccessDenied") || message.contains("credentials") {
                    ConnectFailure::Auth
                } else {
                    ConnectFailure::Network
                };
                ClientError::connect(
                    TRANSPORT,
                    kind,
                    format!("error starting session: {}", message),
                )
            })?;

        let session_id = output.session_id().map(str::to_string);
        tracing::debug!("ssm: started session {:?}", session_id);

        self.session = Some(SsmSession { client, session_id });
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        self.state = ConnectionState::Disconnected;

        if let Some(session_id) = session.session_id {
            session
                .client
                .terminate_session()
                .session_id(&session_id)
                .send()
                .await
                .map_err(|e| ClientError::Disconnect {
                    transport: TRANSPORT,
                    message: format!(
                        "error terminating session '{}': {}",
                        session_id,
                        DisplayErrorContext(&e)
                    ),
                })?;
        }
        Ok(())
    }

    async fn command(&self, argv: &[String]) -> ClientResult<CommandOutput> {
        let session = self.session()?;
        let command = command_line(argv);

        let sent = session
            .client
            .send_command()
            .document_name(DOCUMENT_NAME)
            .instance_ids(&self.settings.instance_id)
            .parameters("commands", vec![command.clone()])
            .send()
            .await
            .map_err(|e| {
                ClientError::execution(
                    TRANSPORT,
                    &command,
                    format!("error sending command: {}", DisplayErrorContext(&e)),
                    "",
                )
            })?;

        let command_id = sent
            .command()
            .and_then(|c| c.command_id())
            .ok_or_else(|| ClientError::execution(TRANSPORT, &command, "no command id returned", ""))?
            .to_string();

        tracing::debug!("ssm: sent command '{}' as {}", command, command_id);
        self.wait_for_output(&session.client, &command_id, &command).await
    }

    async fn copy_file(&self, local_path: &Path, remote_path: &str) -> ClientResult<()> {
        let copy_error = |message: String| ClientError::Copy {
            transport: TRANSPORT,
            local: local_path.display().to_string(),
            remote: remote_path.to_string(),
            message,
        };

        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| copy_error(format!("error reading local file: {}", e)))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&content);

        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("echo -n {} | base64 -d > {}", encoded, shell_quote(remote_path)),
        ];
        let output = self.command(&argv).await.map_err(|e| copy_error(e.to_string()))?;
        output
            .into_result(TRANSPORT, "base64 -d")
            .map(|_| ())
            .map_err(|e| copy_error(e.to_string()))
    }

    fn info(&self) -> String {
        format!(
            "ssm: instance_id='{}', region='{}'",
            self.settings.instance_id, self.settings.region
        )
    }

    async fn user(&self) -> String {
        let whoami = match self.command(&["whoami".to_string()]).await {
            Ok(output) => output.into_result(TRANSPORT, "whoami"),
            Err(e) => Err(e),
        };
        match whoami {
            Ok(out) => out.trim().to_string(),
            Err(e) => {
                tracing::warn!("ssm: cannot determine remote user: {}", e);
                String::new()
            }
        }
    }
}

/// Where a command invocation stands.
#[derive(Debug, PartialEq, Eq)]
enum InvocationProgress {
    Pending,
    Succeeded,
    Failed(String),
}

fn classify(status: Option<&CommandInvocationStatus>) -> InvocationProgress {
    match status {
        Some(CommandInvocationStatus::Success) => InvocationProgress::Succeeded,
        Some(CommandInvocationStatus::Failed) => InvocationProgress::Failed("Failed".to_string()),
        Some(CommandInvocationStatus::TimedOut) => {
            InvocationProgress::Failed("TimedOut".to_string())
        }
        Some(CommandInvocationStatus::Cancelled) => {
            InvocationProgress::Failed("Cancelled".to_string())
        }
        _ => InvocationProgress::Pending,
    }
}

/// Delay between invocation polls, doubling from `min` up to `max`.
#[derive(Debug)]
struct WaitBackoff {
    next: Duration,
    max: Duration,
}

impl WaitBackoff {
    fn new(min: Duration, max: Duration) -> Self {
        let min = if min.is_zero() {
            Duration::from_millis(100)
        } else {
            min
        };
        Self {
            next: min,
            max: max.max(min),
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_max() {
        let mut backoff = WaitBackoff::new(Duration::from_secs(5), Duration::from_secs(30));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 30, 30]);
    }

    #[test]
    fn test_backoff_max_below_min() {
        let mut backoff = WaitBackoff::new(Duration::from_secs(10), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_zero_min() {
        let mut backoff = WaitBackoff::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify(None), InvocationProgress::Pending);
        assert_eq!(
            classify(Some(&CommandInvocationStatus::InProgress)),
            InvocationProgress::Pending
        );
        assert_eq!(
            classify(Some(&CommandInvocationStatus::Delayed)),
            InvocationProgress::Pending
        );
        assert_eq!(
            classify(Some(&CommandInvocationStatus::Success)),
            InvocationProgress::Succeeded
        );
        assert!(matches!(
            classify(Some(&CommandInvocationStatus::TimedOut)),
            InvocationProgress::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_connect_requires_instance_id() {
        let mut conn = SsmConnection::new(SsmSettings::default());
        let err = conn.connect().await.unwrap_err();
        assert_eq!(err.connect_failure(), Some(ConnectFailure::ConfigInvalid));
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_command_before_connect_fails_fast() {
        let conn = SsmConnection::new(SsmSettings {
            instance_id: "i-0123456789abcdef0".to_string(),
            ..Default::default()
        });
        let err = conn.command(&["whoami".to_string()]).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected { transport: "ssm" }));
    }

    #[tokio::test]
    async fn test_disconnect_without_session() {
        let mut conn = SsmConnection::new(SsmSettings::default());
        assert!(conn.disconnect().await.is_ok());
    }

    #[test]
    fn test_info() {
        let conn = SsmConnection::new(SsmSettings {
            instance_id: "i-abc".to_string(),
            region: "eu-central-1".to_string(),
            ..Default::default()
        });
        assert_eq!(conn.info(), "ssm: instance_id='i-abc', region='eu-central-1'");
    }
}
