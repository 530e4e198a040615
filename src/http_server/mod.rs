//! HTTP server exposing the run-trigger endpoint, health, and metrics
//! (spec §6). Modelled on the daemon's own axum server: `TraceLayer`, a
//! multi-address bind-with-fallback loop, graceful startup logging.

use std::{sync::Arc, time::Duration};

use axum::{
	Router,
	middleware,
	routing::{get, post},
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

use crate::coordinator::Coordinator;

/// Bounded wait for in-flight archive moves when the process is asked to
/// shut down (spec §4.6's "shutdown drains the registry" note).
const ARCHIVE_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

mod endpoints;
pub mod state;
#[cfg(test)]
pub mod test_utils;
mod types;

pub use endpoints::*;
pub use state::ServerState;
pub use types::*;

pub async fn start_server(
	config: Arc<crate::config::Config>,
	coordinator: Arc<Coordinator>,
	jwt_secret: Arc<str>,
	addrs: Vec<std::net::SocketAddr>,
) {
	let state = Arc::new(ServerState {
		config,
		coordinator,
		jwt_secret,
		started_at: chrono::Utc::now(),
		pid: std::process::id(),
	});

	let app = Router::new()
		.route("/api/v1/coordinator/runs", post(handle_trigger_run))
		.route_layer(middleware::from_fn_with_state(state.clone(), crate::auth::require_bearer))
		.route("/api/v1/health", get(handle_health))
		.route("/api/v1/metrics", get(handle_metrics))
		.layer(
			TraceLayer::new_for_http()
				.make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
				.on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
					info!(method = %request.method(), uri = %request.uri(), "HTTP request");
				})
				.on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false)),
		)
		.with_state(state);

	let addrs_to_try = if addrs.is_empty() {
		vec!["127.0.0.1:8080".parse().unwrap()]
	} else {
		addrs
	};

	let mut listener = None;
	let mut last_error = None;
	for addr in &addrs_to_try {
		match tokio::net::TcpListener::bind(addr).await {
			Ok(l) => {
				info!("run API listening on http://{addr}");
				listener = Some(l);
				break;
			}
			Err(err) => {
				warn!("failed to bind run API to {addr}: {err}");
				last_error = Some(err);
			}
		}
	}

	let listener = match listener {
		Some(l) => l,
		None => {
			if let Some(err) = last_error {
				error!("failed to bind run API to any address: {err}");
			}
			return;
		}
	};

	let coordinator = state.coordinator.clone();
	if let Err(err) = axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await
	{
		error!("run API server error: {err}");
	}

	info!("draining in-flight archive moves");
	coordinator.archive_registry().shutdown(ARCHIVE_DRAIN_TIMEOUT).await;
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM — whichever arrives first.
async fn shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c().await.expect("installing Ctrl-C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("installing SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
