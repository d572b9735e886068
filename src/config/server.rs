use super::traits::ConfigSection;
use crate::error::FeedmixError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ConfigSection for ServerConfig {
    fn section_name() -> &'static str {
        "server"
    }

    fn validate(&self) -> Result<(), FeedmixError> {
        if self.host.trim().is_empty() {
            return Err(FeedmixError::Configuration(
                "Server host must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
