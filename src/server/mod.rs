pub mod routes;

use crate::errors::EngineError;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match &self {
            EngineError::InvalidParameter { name, .. } => serde_json::json!({
                "error": self.to_string(),
                "parameter": name,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_any = state.config.cors_allow_any;

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/api/greeks", post(routes::post_all_greeks))
        .route("/api/greeks/{kind}", post(routes::post_greek))
        .route(
            "/api/positions",
            get(routes::list_positions).post(routes::create_position),
        )
        .route("/api/positions/enrich", post(routes::enrich_preview))
        .route(
            "/api/positions/{id}",
            get(routes::get_position)
                .put(routes::update_position)
                .delete(routes::delete_position),
        )
        .route("/api/counters", get(routes::get_counters))
        .with_state(state);

    if cors_any {
        app.layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
    } else {
        app
    }
}
