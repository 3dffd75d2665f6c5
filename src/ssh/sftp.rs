//! SFTP file transfer implementation.

use std::path::Path;

use russh::client::Handle;
use russh_sftp::client::SftpSession;
use tokio::io::AsyncWriteExt;

use crate::client::error::{ClientError, ClientResult};
use crate::ssh::client::ClientHandler;

/// SFTP client for file transfers.
pub struct SftpClient {
    session: SftpSession,
}

impl SftpClient {
    /// Create a new SFTP client from an SSH session.
    pub async fn new(ssh_session: &Handle<ClientHandler>) -> ClientResult<Self> {
        let sftp_error = |message: String| ClientError::Execution {
            transport: "ssh",
            command: "sftp".to_string(),
            message,
            output: None,
        };

        let channel = ssh_session
            .channel_open_session()
            .await
            .map_err(|e| sftp_error(format!("cannot open SFTP channel: {}", e)))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| sftp_error(format!("cannot request SFTP subsystem: {}", e)))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| sftp_error(format!("cannot initialize SFTP: {}", e)))?;

        Ok(Self { session: sftp })
    }

    /// Upload a file to the remote host, replacing any existing file.
    pub async fn upload(&self, local_path: &Path, remote_path: &str) -> ClientResult<()> {
        let copy_error = |message: String| ClientError::Copy {
            transport: "ssh",
            local: local_path.display().to_string(),
            remote: remote_path.to_string(),
            message,
        };

        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| copy_error(format!("cannot read local file: {}", e)))?;

        let mut remote_file = self
            .session
            .create(remote_path)
            .await
            .map_err(|e| copy_error(format!("cannot create remote file: {}", e)))?;

        remote_file
            .write_all(&content)
            .await
            .map_err(|e| copy_error(format!("cannot write remote file: {}", e)))?;

        // Ensure data is flushed
        remote_file
            .shutdown()
            .await
            .map_err(|e| copy_error(format!("cannot close remote file: {}", e)))?;

        Ok(())
    }
}
