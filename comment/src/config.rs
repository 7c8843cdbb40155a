use anyhow::Result;
use common::config::{CollaboratorConfig, DatabaseConfig, LoggingConfig, RmqConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// The path to the config file.
    pub config_file: String,

    /// Bind address for the API
    pub bind_address: String,

    pub logging: LoggingConfig,

    pub database: DatabaseConfig,

    pub rmq: RmqConfig,

    /// Tweet service used to check commented tweets exist
    pub tweet_api: CollaboratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: "config".to_string(),
            bind_address: "[::]:8084".to_string(),
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            rmq: RmqConfig::default(),
            tweet_api: CollaboratorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn parse() -> Result<Self> {
        common::config::parse("COMMENT", &AppConfig::default().config_file)
    }
}
