use crate::config::AppConfig;
use crate::services::Orchestrator;

/// Shared state handed to every handler.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            orchestrator: Orchestrator::new(config),
        }
    }
}
