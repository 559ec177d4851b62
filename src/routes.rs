use crate::{
    handlers,
    AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

fn spot_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/spots", post(handlers::create_spot).get(handlers::list_spots))
        .route("/spots/{id}", get(handlers::get_spot))
        .route("/spots/{id}/upvote", post(handlers::upvote_spot))
        .route(
            "/spots/{id}/comments",
            post(handlers::add_comment).get(handlers::list_comments),
        )
        .route("/upvote_by_category", post(handlers::upvote_by_category))
        .route(
            "/comments/by_category",
            post(handlers::add_comment_by_category).get(handlers::list_comments_by_category),
        )
}

fn event_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/visible-passes", get(handlers::visible_passes))
        .route("/meteor-showers", get(handlers::meteor_showers))
        .route("/solar-eclipses", get(handlers::solar_eclipses))
        .route("/lunar-eclipses", get(handlers::lunar_eclipses))
}

/// Creates the Axum router and associates routes with handlers.
pub fn create_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .nest("/spots", spot_routes())
        .nest("/events", event_routes())
        .route("/static/{*key}", get(handlers::get_static_asset))
        .route("/health", get(handlers::health))
        // Middleware Layers
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
