use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides `service.host` when set.
pub const HOST_ENV_VAR: &str = "SOH_DASH_HOST";

fn default_api_path() -> String {
    "/api".to_string()
}

fn default_threshold() -> f64 {
    0.6
}

fn default_include_plots() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub host: String,
    #[serde(default = "default_api_path")]
    pub api_path: String,
}

impl ServiceConfig {
    /// `host` + `api_path`, without a trailing slash.
    pub fn api_base(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let path = self.api_path.trim_matches('/');
        if path.is_empty() {
            host.to_string()
        } else {
            format!("{}/{}", host, path)
        }
    }
}

/// What happens to the displayed result when a prediction fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Keep,
    Clear,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictionConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_include_plots")]
    pub include_plots: bool,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            threshold: default_threshold(),
            include_plots: default_include_plots(),
            on_failure: FailurePolicy::Keep,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            service: ServiceConfig {
                host: "http://localhost:8080".to_string(),
                api_path: default_api_path(),
            },
            prediction: PredictionConfig::default(),
            window: WindowConfig {
                width: 1200,
                height: 760,
                min_width: 900,
                min_height: 600,
            },
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("{:#}. Using defaults.", e);
                    Config::default()
                }
            }
        } else {
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            Config::default()
        };

        if let Ok(host) = std::env::var(HOST_ENV_VAR) {
            if !host.trim().is_empty() {
                log::debug!("service host overridden by {}: {}", HOST_ENV_VAR, host);
                config.service.host = host;
            }
        }

        config
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Error reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Error parsing {}", path.display()))
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/soh-dash")
        } else {
            PathBuf::from(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.service.api_base(), "http://localhost:8080/api");
        assert_eq!(config.prediction.threshold, 0.6);
        assert!(config.prediction.include_plots);
        assert_eq!(config.prediction.on_failure, FailurePolicy::Keep);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
host = "http://battery.local:9000/"

[prediction]
on_failure = "clear"

[window]
width = 1000
height = 700
min_width = 800
min_height = 500
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.api_base(), "http://battery.local:9000/api");
        assert_eq!(config.prediction.on_failure, FailurePolicy::Clear);
        assert_eq!(config.prediction.threshold, 0.6);
        assert!(config.prediction.include_plots);
        assert_eq!(config.window.width, 1000);
    }

    #[test]
    fn test_prediction_section_optional() {
        let config: Config = toml::from_str(
            r#"
[service]
host = "http://localhost:8080"
api_path = ""

[window]
width = 800
height = 600
min_width = 400
min_height = 300
"#,
        )
        .unwrap();
        assert_eq!(config.service.api_base(), "http://localhost:8080");
        assert_eq!(config.prediction.threshold, 0.6);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml = [").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Error parsing"));
    }
}
