use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::endpoint::endpoints;
use crate::handler::{self, AppState};

/// Build the axum router with all storage endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::SNAPSHOT, get(handler::snapshot_handler))
        .route(
            endpoints::NAMESPACE,
            axum::routing::put(handler::put_namespace_handler)
                .post(handler::put_namespace_handler)
                .delete(handler::delete_namespace_handler),
        )
        .route(
            endpoints::ENTRY,
            axum::routing::put(handler::put_entry_handler)
                .post(handler::put_entry_handler)
                .delete(handler::delete_entry_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
