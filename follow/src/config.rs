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

    /// Profile service used to check that followed users exist
    pub profile_api: CollaboratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: "config".to_string(),
            bind_address: "[::]:8081".to_string(),
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            rmq: RmqConfig::default(),
            profile_api: CollaboratorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn parse() -> Result<Self> {
        common::config::parse("FOLLOW", &AppConfig::default().config_file)
    }
}
