pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{Router, routing::get, routing::post};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public provider ingress
    let webhook_routes = Router::new().route("/provider", post(routes::webhook::receive));

    // Authenticated meeting reads
    let meeting_routes = Router::new()
        .route("/", get(routes::meeting::list))
        .route("/{meeting_id}", get(routes::meeting::get));

    // Authenticated analytics reads
    let analytics_routes = Router::new()
        .route("/stats", get(routes::analytics::stats))
        .route("/insights", get(routes::analytics::insights))
        .route("/leaderboard", get(routes::analytics::leaderboard))
        .route("/trend", get(routes::analytics::trend))
        .route(
            "/meeting/{meeting_id}/activity",
            get(routes::analytics::activity),
        )
        .route(
            "/meeting/{meeting_id}/details",
            get(routes::analytics::details),
        );

    Router::new()
        .nest("/api/webhook", webhook_routes)
        .nest("/api/meeting", meeting_routes)
        .nest("/api/analytics", analytics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
