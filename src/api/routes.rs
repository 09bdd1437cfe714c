use crate::api::handlers::{
    categories, devices, discovery, health, leak, locations, readings, AppState,
};
use crate::ws::ws_handler;
use axum::{
    extract::Request,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(ws_handler));

    let api_routes = Router::new()
        .route("/api/v1/readings/current", get(readings::get_current))
        .route("/api/v1/readings/history", get(readings::get_history))
        .route("/api/v1/devices", get(devices::get_all).post(devices::create))
        .route(
            "/api/v1/devices/{id}",
            get(devices::get_one)
                .put(devices::update)
                .delete(devices::delete),
        )
        .route(
            "/api/v1/locations",
            get(locations::get_all).post(locations::create),
        )
        .route(
            "/api/v1/locations/{id}",
            put(locations::update).delete(locations::delete),
        )
        .route(
            "/api/v1/categories",
            get(categories::get_all).post(categories::create),
        )
        .route(
            "/api/v1/categories/{id}",
            put(categories::update).delete(categories::delete),
        )
        .route(
            "/api/v1/categories/{id}/locations",
            put(categories::set_locations),
        )
        .route("/api/v1/water-leaks", get(leak::get_all).post(leak::create))
        .route(
            "/api/v1/water-leaks/{id}",
            put(leak::update).delete(leak::delete),
        )
        .route("/api/v1/discovery/status", get(discovery::status))
        .route("/api/v1/discovery/setup", post(discovery::setup))
        .route("/api/v1/discovery/teardown", post(discovery::teardown));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}
