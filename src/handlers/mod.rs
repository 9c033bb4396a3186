mod media;

pub use media::get_media;

use crate::storage::StoreRegistry;
use axum::{Router, routing::get};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StoreRegistry>,
}

/// Build the application router. Used by `main` and the test harness.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/media", get(get_media))
        .with_state(state)
}
