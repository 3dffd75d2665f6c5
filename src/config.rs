use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{ClientType, ConnectionSettings};
use crate::error::{AemError, Result};
use crate::instance::defaults;

/// Instance definition: how to reach the machine and what to run on it.
///
/// Unknown keys are rejected, so a misspelt setting fails loading instead of
/// being ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    pub client: ClientConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
    /// Local path -> remote path, copied before anything else runs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(rename = "type")]
    pub client_type: ClientType,
    #[serde(default)]
    pub settings: HashMap<String, String>,
    /// Kept apart from `settings` so it can come from a secret store.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub credentials: HashMap<String, String>,
    #[serde(default = "default_action_timeout")]
    pub action_timeout: String,
}

fn default_action_timeout() -> String {
    "10m".to_string()
}

impl ClientConfig {
    /// Credentials overlaid with settings; settings win on conflict.
    pub fn connection_settings(&self) -> ConnectionSettings {
        let mut combined = self.credentials.clone();
        combined.extend(self.settings.iter().map(|(k, v)| (k.clone(), v.clone())));
        combined
    }

    pub fn action_timeout(&self) -> Result<Duration> {
        parse_duration(&self.action_timeout).ok_or_else(|| {
            AemError::Config(format!(
                "Invalid action_timeout '{}'. Use format like '10m', '1h30m', or '600'",
                self.action_timeout
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Remote root for AEM Compose files and unpacked instances
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Remote root for transient provisioning files
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    /// Extra variables for the login profile script
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub service_enabled: bool,
    #[serde(default)]
    pub bootstrap: InstanceScript,
}

fn default_data_dir() -> String {
    "/mnt/aemc".to_string()
}

fn default_work_dir() -> String {
    "/tmp/aemc".to_string()
}

fn default_service_name() -> String {
    "aem".to_string()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            work_dir: default_work_dir(),
            env: BTreeMap::new(),
            service_name: default_service_name(),
            service_enabled: false,
            bootstrap: InstanceScript::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComposeConfig {
    /// Download the AEM Compose CLI wrapper; when off it must already be in the data dir
    #[serde(default = "default_true")]
    pub download: bool,
    #[serde(default = "default_compose_version")]
    pub version: String,
    /// Content of `aem.yml`
    #[serde(default = "default_compose_config")]
    pub config: String,
    #[serde(default = "defaults::create_script")]
    pub create: InstanceScript,
    #[serde(default = "defaults::launch_script")]
    pub launch: InstanceScript,
    #[serde(default = "defaults::delete_script")]
    pub delete: InstanceScript,
}

fn default_true() -> bool {
    true
}

fn default_compose_version() -> String {
    "1.6.12".to_string()
}

fn default_compose_config() -> String {
    defaults::CONFIG_YML.to_string()
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            download: true,
            version: default_compose_version(),
            config: default_compose_config(),
            create: defaults::create_script(),
            launch: defaults::launch_script(),
            delete: defaults::delete_script(),
        }
    }
}

/// Hook made of an optional multiline script and a list of single commands.
///
/// The script runs first, then each inline command in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceScript {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub script: String,
}

impl InstanceScript {
    pub fn inline<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inline: commands.into_iter().map(Into::into).collect(),
            script: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.script.trim().is_empty() && self.inline.is_empty()
    }
}

impl InstanceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AemError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| AemError::Config(format!("Invalid config: {}", e)))
    }

    /// Validate the configuration.
    ///
    /// The client type is checked while parsing. Connection settings are
    /// checked by the transport when it connects; this only catches what is
    /// wrong regardless of the machine.
    pub fn validate(&self) -> Result<()> {
        self.client.action_timeout()?;

        if self.system.data_dir.trim().is_empty() {
            return Err(AemError::Config("system.data_dir must not be empty".to_string()));
        }
        if self.system.work_dir.trim().is_empty() {
            return Err(AemError::Config("system.work_dir must not be empty".to_string()));
        }
        if self.system.service_name.trim().is_empty() {
            return Err(AemError::Config("system.service_name must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Parse a duration like `1h30m`, `1.5h`, `500ms` or `45s`.
///
/// Bare numbers are seconds. Units are `h`, `m`, `s`, `ms`, `us`/`µs` and `ns`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    if let Ok(seconds) = s.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut nanos = 0f64;
    let mut rest = s.as_str();

    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let value: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest.find(is_number).unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "h" => 3_600e9,
            "m" => 60e9,
            "s" => 1e9,
            "ms" => 1e6,
            "us" | "µs" => 1e3,
            "ns" => 1.0,
            _ => return None,
        };
        nanos += value * scale;
        rest = &rest[unit_end..];
    }

    Some(Duration::from_nanos(nanos.round() as u64))
}
