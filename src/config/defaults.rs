use super::traits::ConfigSection;
use crate::error::FeedmixError;
use crate::types::{validate_feeds, FeedItem, Requirement};
use serde::{Deserialize, Serialize};

/// Seed problem served by `GET /api/config` and used for any field a run
/// request leaves out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub feeds: Vec<FeedItem>,
    pub requirement: Requirement,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            // Daily ration for one dairy cow.
            feeds: vec![
                FeedItem::new("Alang-alang", 500.0, 0.04, 0.45),
                FeedItem::new("Kacang panjang", 2500.0, 0.16, 0.60),
                FeedItem::new("Ampas tahu", 1500.0, 0.20, 0.70),
                FeedItem::new("Bungkil kelapa", 3000.0, 0.22, 0.70),
            ],
            requirement: Requirement::new(1.036, 7.5),
        }
    }
}

impl ConfigSection for DefaultsConfig {
    fn section_name() -> &'static str {
        "defaults"
    }

    fn validate(&self) -> Result<(), FeedmixError> {
        validate_feeds(&self.feeds)
            .and_then(|_| self.requirement.validate())
            .map_err(|e| FeedmixError::Configuration(format!("Invalid default problem: {}", e)))
    }
}
