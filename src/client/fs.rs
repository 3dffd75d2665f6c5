//! Remote file system operations.
//!
//! Every mutating operation here is idempotent. Uploads land on a temporary
//! path first and are moved into place, so the destination either keeps its
//! previous content or holds the complete new file.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::{ClientError, ClientResult};
use super::Client;
use crate::connection::Transport;
use crate::utils::{remote_base, remote_dir, remote_join, shell_quote};

impl Client {
    /// Create a remote directory with parents; existing directories are fine.
    pub async fn dir_ensure(&self, path: &str) -> ClientResult<()> {
        self.run_shell_purely(&format!("mkdir -p {}", shell_quote(path)))
            .await
            .map(|_| ())
            .map_err(|e| e.context(format!("cannot ensure directory '{}'", path)))
    }

    /// Whether a regular file exists at `path`.
    pub async fn file_exists(&self, path: &str) -> ClientResult<bool> {
        self.test_path("-f", path)
            .await
            .map_err(|e| e.context(format!("cannot check if file exists '{}'", path)))
    }

    /// Whether a directory exists at `path`.
    pub async fn dir_exists(&self, path: &str) -> ClientResult<bool> {
        self.test_path("-d", path)
            .await
            .map_err(|e| e.context(format!("cannot check if directory exists '{}'", path)))
    }

    // Prints "0" when the test holds
    async fn test_path(&self, flag: &str, path: &str) -> ClientResult<bool> {
        let out = self
            .run_shell_purely(&format!(
                "test {} {} && echo '0' || echo '1'",
                flag,
                shell_quote(path)
            ))
            .await?;
        Ok(out.trim() == "0")
    }

    /// Move a remote file, creating the destination's parent directory.
    pub async fn file_move(&self, old_path: &str, new_path: &str) -> ClientResult<()> {
        self.dir_ensure(remote_dir(new_path)).await?;
        self.run_shell_purely(&format!(
            "mv {} {}",
            shell_quote(old_path),
            shell_quote(new_path)
        ))
        .await
        .map(|_| ())
        .map_err(|e| {
            e.context(format!(
                "cannot move file '{}' to '{}'",
                old_path, new_path
            ))
        })
    }

    pub async fn file_make_executable(&self, path: &str) -> ClientResult<()> {
        self.run_shell_purely(&format!("chmod +x {}", shell_quote(path)))
            .await
            .map(|_| ())
            .map_err(|e| e.context(format!("cannot make file executable '{}'", path)))
    }

    /// Remove a file or directory tree; a missing path is not an error.
    pub async fn file_delete(&self, path: &str) -> ClientResult<()> {
        self.run_shell_purely(&format!("rm -rf {}", shell_quote(path)))
            .await
            .map(|_| ())
            .map_err(|e| e.context(format!("cannot delete file '{}'", path)))
    }

    /// Upload one local file.
    ///
    /// Without `overwrite` an existing remote file is left untouched. With
    /// sudo on, the temporary file goes to the work directory, since the
    /// upload itself runs unprivileged.
    pub async fn file_copy(&self, local_path: &Path, remote_path: &str, overwrite: bool) -> ClientResult<()> {
        if !overwrite && self.file_exists(remote_path).await? {
            tracing::debug!(
                "Skipping copy of '{}', remote file '{}' already exists",
                local_path.display(),
                remote_path
            );
            return Ok(());
        }

        self.dir_ensure(remote_dir(remote_path)).await?;

        let tmp_path = self.upload_temp_path(remote_path);
        self.file_delete(&tmp_path).await?;

        let result = self.upload_then_move(local_path, &tmp_path, remote_path).await;
        self.cleanup(&tmp_path).await;
        result
    }

    fn upload_temp_path(&self, remote_path: &str) -> String {
        if self.sudo {
            remote_join(&self.work_dir, &format!("{}.tmp", remote_base(remote_path)))
        } else {
            format!("{}.tmp", remote_path)
        }
    }

    async fn upload_then_move(&self, local_path: &Path, tmp_path: &str, remote_path: &str) -> ClientResult<()> {
        self.connection().copy_file(local_path, tmp_path).await?;
        self.file_move(tmp_path, remote_path).await
    }

    /// Upload a local directory tree.
    ///
    /// Directories are mirrored as-is; files honor `overwrite` one by one.
    pub async fn dir_copy(&self, local_path: &Path, remote_path: &str, overwrite: bool) -> ClientResult<()> {
        let mut pending: Vec<(PathBuf, String)> =
            vec![(local_path.to_path_buf(), remote_path.to_string())];

        while let Some((local_dir, remote_parent)) = pending.pop() {
            self.dir_ensure(&remote_parent).await?;

            for (name, is_dir) in list_dir(&local_dir).await? {
                let local_child = local_dir.join(&name);
                let remote_child = remote_join(&remote_parent, &name);
                if is_dir {
                    pending.push((local_child, remote_child));
                } else {
                    self.file_copy(&local_child, &remote_child, overwrite).await?;
                }
            }
        }
        Ok(())
    }

    /// Upload a local file or directory; `~` in the local path is expanded.
    pub async fn path_copy(&self, local_path: &str, remote_path: &str, overwrite: bool) -> ClientResult<()> {
        let expanded = PathBuf::from(shellexpand::tilde(local_path).as_ref());
        let metadata = tokio::fs::metadata(&expanded)
            .await
            .map_err(|e| ClientError::io(format!("cannot stat path '{}'", expanded.display()), e))?;

        if metadata.is_dir() {
            self.dir_copy(&expanded, remote_path, overwrite).await
        } else {
            self.file_copy(&expanded, remote_path, overwrite).await
        }
    }

    /// Write `text` to a remote file, replacing it.
    pub async fn file_write(&self, remote_path: &str, text: &str) -> ClientResult<()> {
        let mut local = tempfile::Builder::new()
            .prefix("aem-provision-")
            .suffix(".tmp")
            .tempfile()
            .map_err(|e| ClientError::io("cannot create temporary file", e))?;
        local
            .write_all(text.as_bytes())
            .and_then(|_| local.flush())
            .map_err(|e| {
                ClientError::io(
                    format!("cannot write temporary file '{}'", local.path().display()),
                    e,
                )
            })?;

        self.file_copy(local.path(), remote_path, true).await
    }
}

/// Entries of a local directory as `(name, is_dir)`, sorted by name.
async fn list_dir(path: &Path) -> ClientResult<Vec<(String, bool)>> {
    let read_err = |e| ClientError::io(format!("cannot read directory '{}'", path.display()), e);

    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(path).await.map_err(read_err)?;
    while let Some(entry) = dir.next_entry().await.map_err(read_err)? {
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map_err(read_err)?
            .is_dir();
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    entries.sort();
    Ok(entries)
}
