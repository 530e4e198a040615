use axum::{http::StatusCode, response::IntoResponse};
use tracing::error;

use crate::metrics;

pub async fn handle_metrics() -> impl IntoResponse {
	match metrics::gather_metrics() {
		Ok(metrics) => (StatusCode::OK, metrics).into_response(),
		Err(err) => {
			error!(%err, "failed to gather metrics");
			(
				StatusCode::INTERNAL_SERVER_ERROR,
				format!("failed to gather metrics: {err}\n"),
			)
				.into_response()
		}
	}
}

#[cfg(test)]
mod tests {
	use axum::{http::StatusCode, response::IntoResponse};

	use super::*;

	#[tokio::test]
	async fn metrics_endpoint_returns_prometheus_text() {
		crate::metrics::init_metrics();
		let response = handle_metrics().await.into_response();
		assert_eq!(response.status(), StatusCode::OK);
	}
}
