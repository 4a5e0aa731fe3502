//! Router assembly: binds routes to handlers and layers CORS + tracing.

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::AppState;
use crate::api::routes;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/config", get(routes::auth_config))
        .route("/health", get(routes::health))
        .route("/vapid", get(routes::vapid_public_key))
        .route("/switch", post(routes::create_switch).get(routes::list_switches))
        .route(
            "/switch/{id}",
            get(routes::get_switch).put(routes::update_switch).delete(routes::delete_switch),
        )
        .route("/switch/{id}/reset", post(routes::reset_switch))
        .route("/switch/{id}/disable", post(routes::disable_switch))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}
