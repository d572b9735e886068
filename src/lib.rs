pub mod api;
pub mod config;
pub mod engines;
pub mod error;
pub mod services;
pub mod types;

pub use error::{FeedmixError, Result};
