use crate::error::{FeedmixError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One purchasable feed ingredient.
///
/// Nutrient contents are per kilogram of feed. Wire names follow the
/// front-end contract (`price`, `prdd`, `mp`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub name: String,
    #[serde(rename = "price", alias = "unit_price")]
    pub unit_price: f64,
    #[serde(rename = "prdd", alias = "prdd_per_unit")]
    pub prdd_per_unit: f64,
    #[serde(rename = "mp", alias = "mp_per_unit")]
    pub mp_per_unit: f64,
}

impl FeedItem {
    pub fn new(name: impl Into<String>, unit_price: f64, prdd_per_unit: f64, mp_per_unit: f64) -> Self {
        Self {
            name: name.into(),
            unit_price,
            prdd_per_unit,
            mp_per_unit,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FeedmixError::InvalidInput("feed name must not be empty".to_string()));
        }
        for (field, value) in [
            ("price", self.unit_price),
            ("prdd", self.prdd_per_unit),
            ("mp", self.mp_per_unit),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FeedmixError::InvalidInput(format!(
                    "feed '{}': {} must be a finite non-negative number, got {}",
                    self.name, field, value
                )));
            }
        }
        Ok(())
    }
}

/// Nutrient totals the mix must reach or exceed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "prdd", alias = "required_prdd")]
    pub required_prdd: f64,
    #[serde(rename = "mp", alias = "required_mp")]
    pub required_mp: f64,
}

impl Requirement {
    pub fn new(required_prdd: f64, required_mp: f64) -> Self {
        Self {
            required_prdd,
            required_mp,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("required_prdd", self.required_prdd), ("required_mp", self.required_mp)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FeedmixError::InvalidInput(format!(
                    "{} must be a finite positive number, got {}",
                    field, value
                )));
            }
        }
        Ok(())
    }
}

/// Linear totals of a mix: purchase cost, weight and nutrient sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub cost: f64,
    pub weight: f64,
    pub prdd: f64,
    pub mp: f64,
}

/// Validates a feed table: non-empty, unique names, finite non-negative values.
pub fn validate_feeds(feeds: &[FeedItem]) -> Result<()> {
    if feeds.is_empty() {
        return Err(FeedmixError::InvalidInput("feed list must not be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for feed in feeds {
        feed.validate()?;
        if !seen.insert(feed.name.as_str()) {
            return Err(FeedmixError::InvalidInput(format!(
                "duplicate feed name '{}'",
                feed.name
            )));
        }
    }
    Ok(())
}
