use crate::config::InstanceConfig;
use crate::error::Result;

pub async fn execute(config: InstanceConfig, create: bool) -> Result<()> {
    let mut instance = super::connect(config).await?;
    let result = instance.apply(create).await;
    super::close(instance).await;
    result?;

    if create {
        super::print_done("AEM instance created and launched");
    } else {
        super::print_done("AEM instance updated");
    }
    Ok(())
}
