use crate::common::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "warehouse.toml";
pub const CONFIG_PATH_ENV: &str = "WAREHOUSE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub stores: StoresConfig,
    pub keys: KeysConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pins "today" for validity filtering and future-date checks.
    /// Unset means the current UTC date at run start.
    pub run_date: Option<NaiveDate>,
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoresConfig {
    pub raw_dir: String,
    pub conformed_dir: String,
    pub published_dir: String,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            raw_dir: "data/raw".to_string(),
            conformed_dir: "data/conformed".to_string(),
            published_dir: "data/published".to_string(),
        }
    }
}

/// How customer numbers from different source systems are normalized before matching
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub customer_prefixes: Vec<String>,
    pub customer_separators: Vec<char>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            customer_prefixes: vec!["NAS".to_string()],
            customer_separators: vec!['-'],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Exit non-zero when the report contains error-severity findings
    pub fail_on_findings: bool,
}

impl Config {
    /// Load from `WAREHOUSE_CONFIG` or `warehouse.toml`; a missing default file
    /// yields the built-in defaults, a missing explicit file is an error.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.customer_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(PipelineError::Config(
                "keys.customer_prefixes must not contain blank entries".to_string(),
            ));
        }
        let stores = [
            &self.stores.raw_dir,
            &self.stores.conformed_dir,
            &self.stores.published_dir,
        ];
        if stores.iter().any(|dir| dir.trim().is_empty()) {
            return Err(PipelineError::Config("store directories must be set".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.stores.raw_dir, "data/raw");
        assert_eq!(config.keys.customer_prefixes, vec!["NAS".to_string()]);
        assert_eq!(config.keys.customer_separators, vec!['-']);
        assert!(config.run.run_date.is_none());
        assert!(!config.reconcile.fail_on_findings);
    }

    #[test]
    fn test_partial_toml_overrides_sections() {
        let config = Config::from_toml(
            r#"
            [run]
            run_date = "2024-03-01"

            [stores]
            published_dir = "/tmp/published"

            [reconcile]
            fail_on_findings = true
            "#,
        )
        .unwrap();
        assert_eq!(config.run.run_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(config.stores.published_dir, "/tmp/published");
        assert_eq!(config.stores.conformed_dir, "data/conformed");
        assert!(config.reconcile.fail_on_findings);
    }

    #[test]
    fn test_blank_prefix_is_rejected() {
        let err = Config::from_toml("[keys]\ncustomer_prefixes = [\"\"]").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_loading_from_file_validates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("warehouse.toml");
        std::fs::write(&path, "[keys]\ncustomer_prefixes = [\" \"]").unwrap();

        let err = Config::from_file(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
