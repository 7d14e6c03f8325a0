use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::LyreError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LyreConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub wikidata: WikidataConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WikidataConfig {
    pub query_endpoint: String,
    pub api_endpoint: String,
    /// Entity whose transitive subclasses are the candidate items.
    pub category: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Extra attempts after the first failed GET. Zero disables retrying.
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            query_endpoint: "https://query.wikidata.org/sparql".to_string(),
            api_endpoint: "https://www.wikidata.org/w/api.php".to_string(),
            category: "Q34379".to_string(),
            user_agent: "lyre/0.1 (https://github.com/lyre-app/lyre)".to_string(),
            timeout_seconds: 30,
            max_retries: 0,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelectionConfig {
    pub language: String,
    pub refresh_after_hours: i64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            refresh_after_hours: 5,
        }
    }
}

impl SelectionConfig {
    pub fn refresh_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.refresh_after_hours)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub server_url: String,
    pub app_id: String,
    pub app_key: String,
    pub session_token: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            server_url: "https://api.leancloud.cn".to_string(),
            app_id: String::new(),
            app_key: String::new(),
            session_token: String::new(),
        }
    }
}

impl LyreConfig {
    /// Load from an optional TOML file, then apply `LYRE_SECTION__KEY` env overrides.
    pub fn load(path: &str) -> Result<Self, LyreError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("LYRE").separator("__"))
            .build()?;
        Ok(s.try_deserialize()?)
    }
}
