use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ForecasterConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Completion API settings. `base_url` and `model` are resolved from the API
/// key's provider when left unset.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: u64,
    pub bayesian_temperature: f32,
    pub evolutionary_temperature: f32,
    pub site_url: Option<String>,
    pub site_title: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_seconds: 30,
            bayesian_temperature: 0.6,
            evolutionary_temperature: 0.7,
            site_url: None,
            site_title: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
        }
    }
}

impl ForecasterConfig {
    /// Load from a TOML file, with `FORECASTER__SECTION__KEY` env overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("FORECASTER").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let cfg: ForecasterConfig = Config::builder()
            .add_source(File::from_str(
                r#"
                [service]
                log_level = "debug"

                [database]
                url = "sqlite://forecaster.db"
                max_connections = 4
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.service.log_level, "debug");
        assert_eq!(cfg.database.max_connections, 4);
        assert_eq!(cfg.http.port, 9000);
        assert_eq!(cfg.llm.timeout_seconds, 30);
        assert!((cfg.llm.bayesian_temperature - 0.6).abs() < f32::EPSILON);
        assert!(cfg.llm.base_url.is_none());
    }

    #[test]
    fn test_llm_section_overrides_defaults() {
        let cfg: ForecasterConfig = Config::builder()
            .add_source(File::from_str(
                r#"
                [service]
                log_level = "info"

                [database]
                url = "sqlite::memory:"
                max_connections = 1

                [llm]
                base_url = "http://localhost:1234/v1"
                model = "local-model"
                timeout_seconds = 5
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.llm.base_url.as_deref(), Some("http://localhost:1234/v1"));
        assert_eq!(cfg.llm.model.as_deref(), Some("local-model"));
        assert_eq!(cfg.llm.timeout_seconds, 5);
        assert!((cfg.llm.evolutionary_temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_shipped_config_loads() {
        let cfg = ForecasterConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/../forecaster.toml"))
            .unwrap();
        assert!(cfg.database.url.starts_with("sqlite:"));
        assert!(cfg.llm.model.is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ForecasterConfig::load("does-not-exist.toml").is_err());
    }
}
