pub mod apply;
pub mod destroy;
pub mod exec;

use console::style;

use crate::client::ClientManager;
use crate::config::InstanceConfig;
use crate::error::Result;
use crate::instance::InstanceClient;

/// Connect to the instance machine, printing where to.
async fn connect(config: InstanceConfig) -> Result<InstanceClient> {
    println!(
        "  {} {} {}",
        style("◐").cyan(),
        style("Connecting via").dim(),
        style(config.client.client_type).white().bold()
    );
    InstanceClient::connect(config, &ClientManager::new()).await
}

/// Disconnect; a failure here never masks the command's own result.
async fn close(instance: InstanceClient) {
    if let Err(e) = instance.close().await {
        tracing::warn!("Unable to disconnect from AEM instance: {}", e);
    }
}

fn print_done(message: &str) {
    println!("  {} {}", style("✓").green().bold(), style(message).white());
}
