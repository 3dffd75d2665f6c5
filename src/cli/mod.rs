pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::InstanceConfig;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "aem-provision")]
#[command(version)]
#[command(about = "Provision AEM instances on remote machines")]
#[command(long_about = "Set up, update and tear down AEM instances managed by AEM Compose on machines reached over SSH or AWS Systems Manager.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Instance configuration file
    #[arg(short, long, global = true, env = "AEM_PROVISION_CONFIG", default_value = "aem.yaml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up or update the AEM instances
    Apply {
        /// First-time setup: also bootstrap the machine and create the instances
        #[arg(long)]
        create: bool,
    },

    /// Terminate the AEM instances and delete the data directory
    Destroy,

    /// Execute a command on the instance machine
    Exec {
        /// Command to execute
        command: String,

        /// Directory to run the command in
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Run the command with sudo
        #[arg(long)]
        sudo: bool,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = InstanceConfig::load(&self.config)?;
        match self.command {
            Commands::Apply { create } => commands::apply::execute(config, create).await,
            Commands::Destroy => commands::destroy::execute(config).await,
            Commands::Exec { command, dir, sudo } => {
                commands::exec::execute(config, &command, &dir, sudo).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["aem-provision", "apply", "--create"]).unwrap();
        assert!(matches!(cli.command, Commands::Apply { create: true }));
        assert_eq!(cli.config, PathBuf::from("aem.yaml"));
    }

    #[test]
    fn test_parse_exec() {
        let cli = Cli::try_parse_from([
            "aem-provision",
            "--config",
            "/etc/aem/instance.yaml",
            "exec",
            "sh aemw instance status",
            "--dir",
            "/mnt/aemc",
            "--sudo",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/aem/instance.yaml"));
        match cli.command {
            Commands::Exec { command, dir, sudo } => {
                assert_eq!(command, "sh aemw instance status");
                assert_eq!(dir, "/mnt/aemc");
                assert!(sudo);
            }
            _ => panic!("expected exec"),
        }
    }

    #[test]
    fn test_parse_destroy_verbose() {
        let cli = Cli::try_parse_from(["aem-provision", "destroy", "-v"]).unwrap();
        assert!(matches!(cli.command, Commands::Destroy));
        assert!(cli.verbose);
    }
}
