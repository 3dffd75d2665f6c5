use thiserror::Error;

use crate::client::ClientError;

#[derive(Error, Debug)]
pub enum AemError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Client(#[from] ClientError),

    /// A provisioning step failed on the remote machine.
    #[error("Unable to {step}: {source}")]
    Step {
        step: String,
        #[source]
        source: ClientError,
    },

    /// A hook script or one of its inline commands failed.
    #[error("Unable to execute {target} properly: {source}")]
    Script {
        target: String,
        #[source]
        source: ClientError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AemError {
    pub fn step(step: impl Into<String>, source: ClientError) -> Self {
        Self::Step {
            step: step.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AemError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_step_keeps_client_error_as_source() {
        let err = AemError::step(
            "write AEM configuration file",
            ClientError::execution("ssh", "mv a b", "exit status 1", "denied\n"),
        );
        let message = err.to_string();
        assert!(message.starts_with("Unable to write AEM configuration file: ssh:"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_yaml_failure_is_typed() {
        let yaml_err = serde_yaml::from_str::<u32>("not a number").unwrap_err();
        let err: AemError = yaml_err.into();
        assert!(matches!(err, AemError::Yaml(_)));
        assert!(err.to_string().starts_with("YAML error:"));
    }
}
