use crate::config::InstanceConfig;
use crate::error::Result;

pub async fn execute(config: InstanceConfig) -> Result<()> {
    let mut instance = super::connect(config).await?;
    let result = instance.destroy().await;
    super::close(instance).await;
    result?;

    super::print_done("AEM instance destroyed");
    Ok(())
}
