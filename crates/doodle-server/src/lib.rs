pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod rate_limit;
pub mod room_loop;
pub mod room_manager;
pub mod state;
pub mod ws;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let cors = cors_layer(&config.cors_origins);
    let state = AppState::new(config);

    let app = Router::new()
        .route("/", get(api::root))
        .route("/health", get(health::health_check))
        .route("/api/v1/rooms", post(api::create_room))
        .route("/api/v1/rooms/{room_id}", get(api::room_detail))
        .route("/ws/{room_id}/{player_name}", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            },
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}
