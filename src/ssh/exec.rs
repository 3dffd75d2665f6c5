//! Remote command execution.
//!
//! Provides non-interactive command execution with stdout/stderr capture.

use russh::client::Handle;
use russh::ChannelMsg;

use crate::client::error::{ClientError, ClientResult};
use crate::connection::CommandOutput;
use crate::ssh::client::ClientHandler;

/// Execute a command line on the remote host (non-interactive).
pub async fn exec_command(
    session: &Handle<ClientHandler>,
    command: &str,
) -> ClientResult<CommandOutput> {
    let mut channel = session.channel_open_session().await.map_err(|e| {
        ClientError::execution("ssh", command, format!("cannot open channel: {}", e), "")
    })?;

    channel.exec(true, command.as_bytes()).await.map_err(|e| {
        ClientError::execution("ssh", command, format!("cannot execute command: {}", e), "")
    })?;

    let mut collected = ExecCollector::default();
    while collected.handle(channel.wait().await) {}
    Ok(collected.finish())
}

/// Accumulates channel messages into a [`CommandOutput`].
#[derive(Debug, Default)]
struct ExecCollector {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<i32>,
    signal: Option<String>,
}

impl ExecCollector {
    /// Record one message; returns false once the channel is done.
    ///
    /// Eof may arrive before the exit status, so only Close ends the exchange.
    fn handle(&mut self, msg: Option<ChannelMsg>) -> bool {
        match msg {
            Some(ChannelMsg::Data { data }) => {
                self.stdout.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                if ext == 1 {
                    self.stderr.extend_from_slice(&data);
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                self.exit_code = Some(exit_status as i32);
            }
            Some(ChannelMsg::ExitSignal {
                signal_name,
                error_message,
                ..
            }) => {
                tracing::debug!("ssh: command killed by {:?}: {}", signal_name, error_message);
                self.signal = Some(format!("{:?}", signal_name));
            }
            Some(ChannelMsg::Close) | None => return false,
            _ => {}
        }
        true
    }

    fn finish(self) -> CommandOutput {
        let output = CommandOutput::new(
            String::from_utf8_lossy(&self.stdout),
            String::from_utf8_lossy(&self.stderr),
            self.exit_code,
        );
        match self.signal {
            Some(signal) => output.with_signal(signal),
            None => output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::{CryptoVec, Sig};

    fn data(text: &str) -> Option<ChannelMsg> {
        Some(ChannelMsg::Data {
            data: CryptoVec::from_slice(text.as_bytes()),
        })
    }

    fn collect(messages: Vec<Option<ChannelMsg>>) -> CommandOutput {
        let mut collected = ExecCollector::default();
        for msg in messages {
            if !collected.handle(msg) {
                break;
            }
        }
        collected.finish()
    }

    #[test]
    fn test_exit_status_after_eof() {
        let output = collect(vec![
            data("done\n"),
            Some(ChannelMsg::Eof),
            Some(ChannelMsg::ExitStatus { exit_status: 0 }),
            Some(ChannelMsg::Close),
        ]);
        assert!(output.success());
        assert_eq!(output.into_result("ssh", "true").unwrap(), "done\n");
    }

    #[test]
    fn test_stderr_and_nonzero_status() {
        let output = collect(vec![
            Some(ChannelMsg::ExtendedData {
                data: CryptoVec::from_slice(b"no such file\n"),
                ext: 1,
            }),
            Some(ChannelMsg::ExitStatus { exit_status: 2 }),
            Some(ChannelMsg::Close),
        ]);
        assert_eq!(output.stderr, "no such file\n");
        assert_eq!(output.exit_code, Some(2));
        assert!(!output.success());
    }

    #[test]
    fn test_killed_by_signal_is_failure() {
        let output = collect(vec![
            data("half written\n"),
            Some(ChannelMsg::ExitSignal {
                signal_name: Sig::KILL,
                core_dumped: false,
                error_message: String::new(),
                lang_tag: String::new(),
            }),
            Some(ChannelMsg::Close),
        ]);
        assert!(!output.success());
        let err = output
            .into_result("ssh", "sh aemw instance launch")
            .unwrap_err();
        assert!(err.to_string().contains("killed by signal KILL"));
        assert!(err.to_string().contains("half written"));
    }

    #[test]
    fn test_close_without_exit_status_is_failure() {
        let output = collect(vec![data("half written\n"), Some(ChannelMsg::Close)]);
        assert_eq!(output.exit_code, None);
        assert!(output
            .into_result("ssh", "sh aemw instance launch")
            .is_err());
    }

    #[test]
    fn test_channel_dropped_ends_exchange() {
        let mut collected = ExecCollector::default();
        assert!(collected.handle(data("x")));
        assert!(!collected.handle(None));
    }
}
