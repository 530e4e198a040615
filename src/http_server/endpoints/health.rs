use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::http_server::{state::ServerState, types::HealthResponse};

pub async fn handle_health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
	Json(HealthResponse {
		name: "coordinatord".to_string(),
		version: env!("CARGO_PKG_VERSION").to_string(),
		started_at: state.started_at.to_rfc3339(),
		pid: state.pid,
	})
}
