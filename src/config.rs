use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::DEFAULT_PER_PAGE;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_per_page")]
    pub per_page: u32,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vrid-reader");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("posts.db").to_string_lossy().to_string()
}

fn default_base_url() -> String {
    "https://blog.vrid.in/".to_string()
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_probe_interval() -> u64 {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            base_url: default_base_url(),
            per_page: default_per_page(),
            request_timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_timeout_secs(),
            probe_interval_secs: default_probe_interval(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vrid-reader")
            .join("config.toml")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    fn validate(&self) -> Result<()> {
        if self.per_page == 0 || self.per_page > 100 {
            return Err(AppError::Config(format!(
                "per_page must be between 1 and 100, got {}",
                self.per_page
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = Config::parse("base_url = \"https://example.com/blog/\"\n")
            .expect("partial config should parse");

        assert_eq!(config.base_url, "https://example.com/blog/");
        assert_eq!(config.per_page, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.probe_interval(), Duration::from_secs(15));
        assert!(config.db_path.ends_with("posts.db"));
    }

    #[test]
    fn out_of_range_per_page_is_rejected() {
        assert!(matches!(Config::parse("per_page = 0"), Err(AppError::Config(_))));
        assert!(matches!(Config::parse("per_page = 500"), Err(AppError::Config(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(Config::parse("per_page = ["), Err(AppError::TomlParse(_))));
    }

    #[test]
    fn saved_form_parses_back() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).expect("serialize");
        assert_eq!(Config::parse(&text).expect("parse"), config);
    }
}
