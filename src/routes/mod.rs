use std::sync::Arc;

use axum::Router;

use crate::store::Store;

mod error;
mod health;
mod ingest;
mod tools;

// ---

pub fn router(store: Arc<dyn Store>) -> Router {
    // ---
    Router::new()
        .merge(tools::router())
        .merge(ingest::router())
        .merge(health::router())
        .with_state(store)
}
