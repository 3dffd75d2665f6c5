use crate::client::Client;
use crate::config::InstanceConfig;
use crate::error::Result;

pub async fn execute(config: InstanceConfig, command: &str, dir: &str, sudo: bool) -> Result<()> {
    let mut instance = super::connect(config).await?;
    let result = run(instance.client_mut(), command, dir, sudo).await;
    super::close(instance).await;

    print!("{}", result?);
    Ok(())
}

async fn run(client: &mut Client, command: &str, dir: &str, sudo: bool) -> Result<String> {
    let output = if sudo {
        client.with_sudo().run_shell_command(command, dir).await?
    } else {
        client.run_shell_command(command, dir).await?
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = Client::local();
        client.work_dir = dir.path().display().to_string();
        client.connect().await.unwrap();
        client.setup_env().await.unwrap();

        std::fs::write(dir.path().join("marker"), "").unwrap();
        let out = run(&mut client, "ls", dir.path().to_str().unwrap(), false)
            .await
            .unwrap();
        assert!(out.contains("marker"));
        assert!(out.contains("env.sh"));
    }
}
