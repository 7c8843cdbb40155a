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

    /// Tweet service used to resolve liked and commented tweets
    pub tweet_api: CollaboratorConfig,

    /// Comment service used to resolve parent comments of replies
    pub comment_api: CollaboratorConfig,

    /// Follow service used to enumerate followers during fan-out
    pub follow_api: CollaboratorConfig,

    /// Push gateway notifications are delivered through
    pub push_gateway: CollaboratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: "config".to_string(),
            bind_address: "[::]:8083".to_string(),
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            rmq: RmqConfig::default(),
            tweet_api: CollaboratorConfig::default(),
            comment_api: CollaboratorConfig::default(),
            follow_api: CollaboratorConfig::default(),
            push_gateway: CollaboratorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn parse() -> Result<Self> {
        common::config::parse("NOTIFICATION", &AppConfig::default().config_file)
    }
}
