use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers;
use crate::api::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/config", get(handlers::get_config))
        .route("/api/run", post(handlers::start_run))
        .route("/api/progress", get(handlers::progress))
        .route("/api/result", get(handlers::get_result))
        .route("/api/cancel", post(handlers::cancel_run))
        .route("/optimize", post(handlers::optimize))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_router_creation() {
        let state = Arc::new(AppState::new(&AppConfig::default()));
        let _router = create_router(state);
    }
}
