use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use crate::{coordinator::RunSummary, http_server::state::ServerState};

/// `POST /api/v1/coordinator/runs` — triggers a single run and returns its
/// summary (spec §6). `202` when anything failed, `200` otherwise.
pub async fn handle_trigger_run(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
	info!("run triggered");
	let summary: RunSummary = state.coordinator.run().await;

	let status = if summary.errors.is_empty() {
		StatusCode::OK
	} else {
		StatusCode::ACCEPTED
	};

	(status, Json(summary))
}
