//! AEM instance provisioning over a connected [`Client`].
//!
//! `apply` brings a machine to the configured state: files copied, machine
//! bootstrapped once, AEM Compose installed and configured, instances created
//! and launched. `destroy` terminates the instances and removes the data dir.

pub mod defaults;
mod script;

use crate::client::{Client, ClientManager};
use crate::config::InstanceConfig;
use crate::connection::Transport;
use crate::error::{AemError, Result};
use crate::utils::{env_to_script, remote_join, shell_quote};

use script::log_output;

pub struct InstanceClient {
    client: Client,
    config: InstanceConfig,
}

impl InstanceClient {
    /// Make a client for the configured transport and wait until the machine accepts it.
    pub async fn connect(config: InstanceConfig, manager: &ClientManager) -> Result<Self> {
        let timeout = config.client.action_timeout()?;
        tracing::info!(
            "Connecting to AEM instance machine using {}",
            config.client.client_type
        );

        let mut client = manager.make(
            config.client.client_type.as_str(),
            &config.client.connection_settings(),
        )?;
        client
            .connect_with_retry(timeout, || {
                tracing::info!("Awaiting connection to AEM instance machine")
            })
            .await?;

        Self::attach(client, config).await
    }

    /// Wrap an already connected client and write its environment script.
    pub async fn attach(mut client: Client, config: InstanceConfig) -> Result<Self> {
        client
            .env
            .insert("AEM_CLI_VERSION".to_string(), config.compose.version.clone());
        client
            .env
            .insert("AEM_OUTPUT_LOG_MODE".to_string(), "both".to_string());
        client.work_dir = config.system.work_dir.clone();
        client.setup_env().await?;

        tracing::info!(
            "Connected to AEM instance machine using {} as '{}'",
            client.connection().info(),
            client.connection().user().await
        );
        Ok(Self { client, config })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    fn data_dir(&self) -> &str {
        &self.config.system.data_dir
    }

    /// Set up or update the instances; `create` also bootstraps and creates them.
    pub async fn apply(&mut self, create: bool) -> Result<()> {
        tracing::info!("Started setting up AEM instance");

        self.copy_files().await?;
        if create {
            self.bootstrap().await?;
        }
        self.prepare_work_dir().await?;
        self.prepare_data_dir().await?;
        self.install_compose_cli().await?;
        self.write_config_file().await?;
        if create {
            self.create().await?;
        }
        self.launch().await?;

        tracing::info!("Finished setting up AEM instance");
        Ok(())
    }

    /// Terminate the instances and remove everything under the data dir.
    pub async fn destroy(&mut self) -> Result<()> {
        tracing::info!("Started deleting AEM instance");
        self.terminate().await?;
        self.delete_data_dir().await?;
        tracing::info!("Finished deleting AEM instance");
        Ok(())
    }

    pub async fn prepare_work_dir(&self) -> Result<()> {
        self.client
            .dir_ensure(&self.client.work_dir)
            .await
            .map_err(|e| AemError::step("prepare AEM work directory", e))
    }

    pub async fn prepare_data_dir(&self) -> Result<()> {
        self.client
            .dir_ensure(self.data_dir())
            .await
            .map_err(|e| AemError::step("prepare AEM data directory", e))
    }

    /// Copy the configured local paths, replacing what is on the machine.
    pub async fn copy_files(&self) -> Result<()> {
        for (local_path, remote_path) in &self.config.files {
            self.client
                .path_copy(local_path, remote_path, true)
                .await
                .map_err(|e| {
                    AemError::step(
                        format!("copy path '{}' to '{}'", local_path, remote_path),
                        e,
                    )
                })?;
        }
        Ok(())
    }

    /// Run the bootstrap hook unless it already ran on this machine.
    pub async fn bootstrap(&self) -> Result<()> {
        self.run_script_once("bootstrap", &self.config.system.bootstrap, ".")
            .await
    }

    pub async fn install_compose_cli(&self) -> Result<()> {
        if !self.config.compose.download {
            tracing::info!(
                "Skipping AEM Compose CLI wrapper download. It is expected to be alternatively installed under the data directory."
            );
            return Ok(());
        }

        let wrapper = remote_join(self.data_dir(), "aemw");
        let installed = self
            .client
            .file_exists(&wrapper)
            .await
            .map_err(|e| AemError::step("check if AEM Compose CLI wrapper is installed", e))?;
        if installed {
            return Ok(());
        }

        tracing::info!("Downloading AEM Compose CLI wrapper");
        let out = self
            .client
            .run_shell_command(
                &format!("curl -fsSL {} -o aemw", shell_quote(defaults::AEMW_URL)),
                self.data_dir(),
            )
            .await
            .map_err(|e| AemError::step("download AEM Compose CLI wrapper", e))?;
        log_output(&out);
        tracing::info!("Downloaded AEM Compose CLI wrapper");
        Ok(())
    }

    /// Write `aem.yml` where AEM Compose looks for it.
    pub async fn write_config_file(&self) -> Result<()> {
        let path = remote_join(self.data_dir(), "aem/default/etc/aem.yml");
        self.client
            .file_write(&path, &self.config.compose.config)
            .await
            .map_err(|e| AemError::step("write AEM configuration file", e))
    }

    /// Expose the client and system environment to login shells on the machine.
    pub async fn save_profile_script(&mut self) -> Result<()> {
        let env_file = format!("/etc/profile.d/{}.sh", self.config.system.service_name);
        let mut env = self.client.env.clone();
        env.extend(self.config.system.env.clone());
        let script = env_to_script(&env);

        let client = self.client.with_sudo();
        client.file_write(&env_file, &script).await.map_err(|e| {
            AemError::step(
                format!("write AEM environment variables file '{}'", env_file),
                e,
            )
        })
    }

    /// `systemctl <action>` on the AEM service; a no-op when the service is disabled.
    pub async fn run_service_action(&mut self, action: &str) -> Result<()> {
        if !self.config.system.service_enabled {
            return Ok(());
        }

        let command = format!(
            "systemctl {} {}",
            action,
            shell_quote(&format!("{}.service", self.config.system.service_name))
        );
        let client = self.client.with_sudo();
        let out = client.run_shell_command(&command, ".").await.map_err(|e| {
            AemError::step(format!("perform AEM system service action '{}'", action), e)
        })?;
        log_output(&out);
        Ok(())
    }

    pub async fn create(&mut self) -> Result<()> {
        tracing::info!("Creating AEM instance(s)");
        self.run_service_action("enable").await?;
        self.save_profile_script().await?;
        let data_dir = self.data_dir().to_string();
        self.run_script("create", &self.config.compose.create, &data_dir)
            .await?;
        tracing::info!("Created AEM instance(s)");
        Ok(())
    }

    pub async fn launch(&mut self) -> Result<()> {
        tracing::info!("Launching AEM instance(s)");
        self.run_service_action("start").await?;

        tracing::info!("Applying AEM instance configuration");
        let out = self
            .client
            .run_shell_command("sh aemw instance launch", self.data_dir())
            .await
            .map_err(|e| AemError::step("apply AEM instance configuration", e))?;
        log_output(&out);
        tracing::info!("Applied AEM instance configuration");

        let data_dir = self.data_dir().to_string();
        self.run_script("launch", &self.config.compose.launch, &data_dir)
            .await?;
        tracing::info!("Launched AEM instance(s)");
        Ok(())
    }

    pub async fn terminate(&mut self) -> Result<()> {
        tracing::info!("Terminating AEM instance(s)");
        self.run_service_action("stop").await?;
        let data_dir = self.data_dir().to_string();
        self.run_script("delete", &self.config.compose.delete, &data_dir)
            .await?;
        tracing::info!("Terminated AEM instance(s)");
        Ok(())
    }

    pub async fn delete_data_dir(&self) -> Result<()> {
        self.client
            .file_delete(self.data_dir())
            .await
            .map_err(|e| AemError::step("delete AEM data directory", e))
    }

    /// Disconnect from the machine.
    pub async fn close(mut self) -> Result<()> {
        self.client.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::InstanceScript;
    use tempfile::TempDir;

    /// Instance over the local transport with work and data dirs in a temp dir.
    pub(crate) async fn local_instance() -> (TempDir, InstanceClient) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = InstanceConfig::from_yaml("client:\n  type: ssh\n").unwrap();
        config.system.work_dir = dir.path().join("work").display().to_string();
        config.system.data_dir = dir.path().join("data").display().to_string();

        let mut client = Client::local();
        client.connect().await.unwrap();
        let instance = InstanceClient::attach(client, config).await.unwrap();
        (dir, instance)
    }

    #[tokio::test]
    async fn test_attach_sets_env() {
        let (dir, instance) = local_instance().await;
        let env = std::fs::read_to_string(dir.path().join("work/env.sh")).unwrap();
        assert!(env.starts_with("#!/bin/sh\n"));
        assert!(env.contains("export AEM_CLI_VERSION=\"1.6.12\""));
        assert!(env.contains("export AEM_OUTPUT_LOG_MODE=\"both\""));

        let out = instance
            .client()
            .run_shell_command("echo $AEM_OUTPUT_LOG_MODE", ".")
            .await
            .unwrap();
        assert_eq!(out, "both\n");
    }

    #[tokio::test]
    async fn test_prepare_dirs() {
        let (dir, instance) = local_instance().await;
        instance.prepare_work_dir().await.unwrap();
        instance.prepare_data_dir().await.unwrap();
        assert!(dir.path().join("work").is_dir());
        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn test_write_config_file() {
        let (dir, instance) = local_instance().await;
        instance.write_config_file().await.unwrap();
        let written =
            std::fs::read_to_string(dir.path().join("data/aem/default/etc/aem.yml")).unwrap();
        assert_eq!(written, defaults::CONFIG_YML);
    }

    #[tokio::test]
    async fn test_copy_files() {
        let (dir, mut instance) = local_instance().await;
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("license.properties"), "license.key=1").unwrap();

        let remote = dir.path().join("data/aem/home/lib/license.properties");
        instance.config.files.insert(
            src.path().join("license.properties").display().to_string(),
            remote.display().to_string(),
        );
        instance.copy_files().await.unwrap();
        assert_eq!(std::fs::read_to_string(remote).unwrap(), "license.key=1");
    }

    #[tokio::test]
    async fn test_install_compose_cli_skips_when_disabled() {
        let (dir, mut instance) = local_instance().await;
        instance.config.compose.download = false;
        instance.install_compose_cli().await.unwrap();
        assert!(!dir.path().join("data/aemw").exists());
    }

    #[tokio::test]
    async fn test_install_compose_cli_skips_when_present() {
        let (dir, instance) = local_instance().await;
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/aemw"), "#!/bin/sh\n").unwrap();
        instance.install_compose_cli().await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("data/aemw")).unwrap(),
            "#!/bin/sh\n"
        );
    }

    #[tokio::test]
    async fn test_service_action_disabled_is_noop() {
        let (_dir, mut instance) = local_instance().await;
        instance.run_service_action("start").await.unwrap();
        assert!(!instance.client().sudo);
    }

    #[tokio::test]
    async fn test_bootstrap_runs_once() {
        let (dir, mut instance) = local_instance().await;
        let marker = dir.path().join("bootstrapped");
        instance.config.system.bootstrap =
            InstanceScript::inline([format!("echo once >> {}", marker.display())]);

        instance.bootstrap().await.unwrap();
        instance.bootstrap().await.unwrap();
        assert_eq!(std::fs::read_to_string(marker).unwrap(), "once\n");
    }

    #[tokio::test]
    async fn test_terminate_and_delete_data_dir() {
        let (dir, mut instance) = local_instance().await;
        let marker = dir.path().join("deleted");
        instance.config.compose.delete =
            InstanceScript::inline([format!("touch {}", marker.display())]);
        instance.prepare_data_dir().await.unwrap();

        instance.destroy().await.unwrap();
        assert!(marker.exists());
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn test_close() {
        let (_dir, instance) = local_instance().await;
        instance.close().await.unwrap();
    }
}
