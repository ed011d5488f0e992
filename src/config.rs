use std::path::{Path, PathBuf};
use directories_next::ProjectDirs;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::ConfigError;

fn default_use_metric() -> bool {
    true
}

/// Persisted daemon settings. CLI flags take precedence over values read
/// from the file; a missing file yields the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Bluetooth address of the mug to maintain a session with.
    pub mac_address: Option<String>,
    /// Report temperatures in Celsius; false means Fahrenheit.
    pub use_metric: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            mac_address: None,
            use_metric: default_use_metric(),
        }
    }
}

// config path in an os dependent standard directory, such as %AppData% on
// windows.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "embermug", "ember-mugd")
        .map(|dirs| dirs.config_dir().join("ember-mugd.json"))
}

impl Config {
    pub async fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => get_local_config_path().ok_or(ConfigError::NoConfigPath)?,
        };

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No config file at {}; using defaults", path.to_string_lossy());
                return Ok(Config::default());
            }
            Err(err) => return Err(err.into()),
        };

        info!("Using config file {}", path.to_string_lossy());
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_fields_and_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"macAddress": "aa:bb:cc:dd:ee:ff"}"#).unwrap();
        assert_eq!(config.mac_address.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert!(config.use_metric);

        let config: Config = serde_json::from_str(r#"{"useMetric": false}"#).unwrap();
        assert_eq!(config.mac_address, None);
        assert!(!config.use_metric);
    }
}
