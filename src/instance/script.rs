//! Hook runner.

use super::InstanceClient;
use crate::config::InstanceScript;
use crate::error::{AemError, Result};
use crate::utils::remote_join;

impl InstanceClient {
    /// Run a hook from `dir`: its multiline script first, then each inline command.
    ///
    /// Every part goes through a transient `<work_dir>/<name>.sh` file. The
    /// first failure stops the hook.
    pub async fn run_script(&self, name: &str, script: &InstanceScript, dir: &str) -> Result<()> {
        if !script.script.trim().is_empty() {
            tracing::info!("Executing instance script '{}'", name);
            let out = self
                .client
                .run_shell_script(name, &script.script, dir)
                .await
                .map_err(|e| AemError::Script {
                    target: format!("script '{}'", name),
                    source: e,
                })?;
            tracing::info!("Executed instance script '{}'", name);
            log_output(&out);
        }

        let total = script.inline.len();
        for (i, cmd) in script.inline.iter().enumerate() {
            tracing::info!(
                "Executing command '{}' of script '{}' ({}/{})",
                cmd,
                name,
                i + 1,
                total
            );
            let out = self
                .client
                .run_shell_script(name, cmd, dir)
                .await
                .map_err(|e| AemError::Script {
                    target: format!("command '{}' of script '{}'", cmd, name),
                    source: e,
                })?;
            tracing::info!(
                "Executed command '{}' of script '{}' ({}/{})",
                cmd,
                name,
                i + 1,
                total
            );
            log_output(&out);
        }

        Ok(())
    }

    /// Run `script` once per machine, recorded by a lock file under the work dir.
    pub(super) async fn run_script_once(&self, name: &str, script: &InstanceScript, dir: &str) -> Result<()> {
        let lock = remote_join(&self.client.work_dir, &format!("provider/{}.lock", name));
        let locked = self
            .client
            .file_exists(&lock)
            .await
            .map_err(|e| AemError::step(format!("read lock file '{}'", lock), e))?;
        if locked {
            tracing::info!(
                "Skipping AEM instance action '{}' (lock file already exists '{}')",
                name,
                lock
            );
            return Ok(());
        }

        self.run_script(name, script, dir).await?;

        self.client
            .file_write(&lock, &chrono::Local::now().to_rfc3339())
            .await
            .map_err(|e| AemError::step(format!("save lock file '{}'", lock), e))
    }
}

pub(super) fn log_output(out: &str) {
    let out = out.trim_end();
    if !out.is_empty() {
        tracing::info!("{}", out);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::local_instance;
    use super::*;

    #[tokio::test]
    async fn test_script_runs_before_inline() {
        let (dir, instance) = local_instance().await;
        let log = dir.path().join("order.log");
        let log = log.to_str().unwrap();

        let script = InstanceScript {
            script: format!("echo script >> {}\n", log),
            inline: vec![
                format!("echo first >> {}", log),
                format!("echo second >> {}", log),
            ],
        };
        instance.run_script("create", &script, ".").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(log).unwrap(),
            "script\nfirst\nsecond\n"
        );
        assert!(!dir.path().join("work/create.sh").exists());
    }

    #[tokio::test]
    async fn test_inline_failure_stops_hook() {
        let (dir, instance) = local_instance().await;
        let log = dir.path().join("order.log");
        let log = log.to_str().unwrap();

        let script = InstanceScript::inline([
            format!("echo first >> {}", log),
            "echo broken; exit 3".to_string(),
            format!("echo never >> {}", log),
        ]);
        let err = instance.run_script("launch", &script, ".").await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("command 'echo broken; exit 3' of script 'launch'"));
        assert!(msg.contains("broken"));
        assert_eq!(std::fs::read_to_string(log).unwrap(), "first\n");
    }

    #[tokio::test]
    async fn test_empty_script_is_noop() {
        let (_dir, instance) = local_instance().await;
        instance
            .run_script("bootstrap", &InstanceScript::default(), ".")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_script_once() {
        let (dir, instance) = local_instance().await;
        let counter = dir.path().join("count.log");
        let script = InstanceScript::inline([format!("echo run >> {}", counter.display())]);

        instance.run_script_once("bootstrap", &script, ".").await.unwrap();
        instance.run_script_once("bootstrap", &script, ".").await.unwrap();

        assert_eq!(std::fs::read_to_string(&counter).unwrap(), "run\n");
        assert!(dir.path().join("work/provider/bootstrap.lock").is_file());
    }
}
