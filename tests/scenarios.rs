//! End-to-end scenarios against a real control-store database and local
//! stand-ins for FOI/ITM/IQube (spec §8's concrete scenarios and testable
//! properties). Requires `DATABASE_URL` to point at a scratch Postgres
//! instance and the crate to be built with `--features test-support`.

use std::{
	net::SocketAddr,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use axum::{Json, Router, extract::State, routing::post};
use chrono::{Duration as ChronoDuration, Utc};
use coordinatord::{
	config::Config,
	control_store::ControlStore,
	coordinator::Coordinator,
	failpoints,
	share::{ShareGateway, StabilityPolicy, gateway::testing::FakeBackend},
	test_support::test_config,
};
use coordinator_postgres::pool::{create_pool, run_ddl};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Opens a fresh pooled handle onto the real schema. Each scenario opens two
/// of these against the same database: one handed to the `Coordinator`
/// under test, one kept by the test to inspect/clear rows out from under it.
async fn setup_control_store() -> ControlStore {
	let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
	let pool = create_pool(&db_url, "coordinatord-test").await.unwrap();
	let conn = pool.get().await.unwrap();
	run_ddl(&conn).await.unwrap();
	ControlStore::new(pool)
}

async fn clear_row(control: &ControlStore, file_name: &str) {
	let conn = control.acquire().await.unwrap();
	conn.execute(
		"DELETE FROM coordinator_control WHERE file_name = $1",
		&[&file_name],
	)
	.await
	.unwrap();
}

#[derive(Clone)]
struct RecordingServer {
	calls: Arc<AtomicUsize>,
	bodies: Arc<Mutex<Vec<Value>>>,
	response: Value,
}

async fn record(State(server): State<RecordingServer>, body: Option<Json<Value>>) -> Json<Value> {
	server.calls.fetch_add(1, Ordering::SeqCst);
	if let Some(Json(body)) = body {
		server.bodies.lock().await.push(body);
	}
	Json(server.response.clone())
}

/// Spawn a local HTTP stand-in that answers every POST with `response` and
/// records each call's JSON body (FOI's multipart body is ignored).
async fn spawn_server(response: Value) -> (SocketAddr, RecordingServer) {
	let server = RecordingServer {
		calls: Arc::new(AtomicUsize::new(0)),
		bodies: Arc::new(Mutex::new(Vec::new())),
		response,
	};
	let app = Router::new()
		.route("/{*path}", post(record))
		.route("/", post(record))
		.with_state(server.clone());
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(addr, server)
}

fn scenario_config(
	source_root: &str,
	archive_root: &str,
	foi_addr: SocketAddr,
	itm_addr: SocketAddr,
	iqube_addr: SocketAddr,
	database_url: &str,
) -> Config {
	let mut config = test_config();
	config.smb_source_root = source_root.to_string();
	config.smb_archive_root = archive_root.to_string();
	config.foi_api_url = format!("http://{foi_addr}/{{remitter}}");
	config.itm_api_url = format!("http://{itm_addr}/");
	config.iqube_api_url = format!("http://{iqube_addr}/");
	config.database_url = database_url.to_string();
	config.stability_policy = StabilityPolicy::MinAge { min_age_s: 30 };
	config
}

#[tokio::test]
async fn version_selection_archives_older_and_processes_newest() {
	let coordinator_control = setup_control_store().await;
	let inspector = setup_control_store().await;
	let db_url = std::env::var("DATABASE_URL").unwrap();

	let (foi_addr, foi) = spawn_server(json!({ "result": [{"ok": true}] })).await;
	let (itm_addr, itm) = spawn_server(json!({ "status": "success" })).await;
	let (iqube_addr, iqube) = spawn_server(json!({})).await;

	let older_path = "/share/in/r/REPORT_VS_20240101000000.xlsx";
	let newer_path = "/share/in/r/REPORT_VS_20240102000000.xlsx";
	let long_ago = Utc::now() - ChronoDuration::seconds(120);

	let backend = FakeBackend::new()
		.with_file(older_path, 10, Some(long_ago), Some(long_ago))
		.with_file(newer_path, 10, Some(long_ago), Some(long_ago));

	let config = scenario_config("/share/in", "/share/archive", foi_addr, itm_addr, iqube_addr, &db_url);
	let gateway = Arc::new(ShareGateway::new(Box::new(backend), &config));
	let coordinator = Coordinator::new(config, gateway.clone(), coordinator_control, "test-secret");

	clear_row(&inspector, newer_path).await;

	let summary = coordinator.run().await;

	assert_eq!(summary.processed.len(), 1);
	assert_eq!(summary.processed[0].file_name, newer_path);
	assert_eq!(summary.processed[0].status, "success");
	assert_eq!(foi.calls.load(Ordering::SeqCst), 1);
	assert_eq!(itm.calls.load(Ordering::SeqCst), 1);
	assert_eq!(iqube.calls.load(Ordering::SeqCst), 0);

	assert_eq!(
		gateway.compute_archive_path(older_path),
		"/share/archive/r/REPORT_VS_20240101000000.xlsx"
	);
	assert!(
		inspector.get(older_path).await.unwrap().is_none(),
		"archive-only candidate never gets a control row"
	);

	clear_row(&inspector, newer_path).await;
}

#[tokio::test]
async fn unstable_file_is_skipped_without_side_effects() {
	let coordinator_control = setup_control_store().await;
	let inspector = setup_control_store().await;
	let db_url = std::env::var("DATABASE_URL").unwrap();

	let (foi_addr, foi) = spawn_server(json!({ "result": [{"ok": true}] })).await;
	let (itm_addr, itm) = spawn_server(json!({ "status": "success" })).await;
	let (iqube_addr, _iqube) = spawn_server(json!({})).await;

	let path = "/share/in/r/UNSTABLE_20240101000000.pdf";
	let now = Utc::now();
	// Written "just now": well inside the 30s stability window.
	let backend = FakeBackend::new().with_file(path, 10, Some(now), Some(now));

	let config = scenario_config("/share/in", "/share/archive", foi_addr, itm_addr, iqube_addr, &db_url);
	let gateway = Arc::new(ShareGateway::new(Box::new(backend), &config));
	let coordinator = Coordinator::new(config, gateway.clone(), coordinator_control, "test-secret");

	let summary = coordinator.run().await;

	assert!(summary.processed.is_empty());
	assert!(summary.errors.is_empty());
	assert_eq!(foi.calls.load(Ordering::SeqCst), 0);
	assert_eq!(itm.calls.load(Ordering::SeqCst), 0);
	assert!(gateway.read_file(path).await.is_ok(), "file must remain in source");
	assert!(inspector.get(path).await.unwrap().is_none());
}

#[tokio::test]
async fn foi_invalid_password_records_status_and_notifies_iqube() {
	let coordinator_control = setup_control_store().await;
	let inspector = setup_control_store().await;
	let db_url = std::env::var("DATABASE_URL").unwrap();

	let (foi_addr, _foi) = spawn_server(json!({
		"failed": [{"failure_reason": "invalid password"}],
		"result": []
	}))
	.await;
	let (itm_addr, itm) = spawn_server(json!({ "status": "success" })).await;
	let (iqube_addr, iqube) = spawn_server(json!({})).await;

	let path = "/share/in/r/PASSWORDED_20240101000000.xlsx";
	let long_ago = Utc::now() - ChronoDuration::seconds(120);
	let backend = FakeBackend::new().with_file(path, 10, Some(long_ago), Some(long_ago));

	let config = scenario_config("/share/in", "/share/archive", foi_addr, itm_addr, iqube_addr, &db_url);
	let gateway = Arc::new(ShareGateway::new(Box::new(backend), &config));
	let coordinator = Coordinator::new(config, gateway.clone(), coordinator_control, "test-secret");

	clear_row(&inspector, path).await;

	let summary = coordinator.run().await;

	assert_eq!(summary.processed.len(), 1);
	assert_eq!(summary.processed[0].status, "extraction_file_password_failed");
	assert_eq!(itm.calls.load(Ordering::SeqCst), 0, "ITM must not be called");
	assert_eq!(iqube.calls.load(Ordering::SeqCst), 1);

	let bodies = iqube.bodies.lock().await;
	let reason = bodies[0].get("reason").and_then(Value::as_str).unwrap();
	assert!(reason.contains("extraction_file_password_failed"));
	drop(bodies);

	assert!(gateway.read_file(path).await.is_ok(), "file stays in source on extraction failure");

	clear_row(&inspector, path).await;
}

#[tokio::test]
async fn itm_failure_is_terminal_and_idempotent_on_rerun() {
	let coordinator_control = setup_control_store().await;
	let inspector = setup_control_store().await;
	let db_url = std::env::var("DATABASE_URL").unwrap();

	let (foi_addr, foi) = spawn_server(json!({ "result": [{"ok": true}] })).await;
	let (itm_addr, itm) = spawn_server(json!({ "status": "failed" })).await;
	let (iqube_addr, iqube) = spawn_server(json!({})).await;

	let path = "/share/in/r/ITMFAIL_20240101000000.xlsx";
	let long_ago = Utc::now() - ChronoDuration::seconds(120);
	let backend = FakeBackend::new().with_file(path, 10, Some(long_ago), Some(long_ago));

	let config = scenario_config("/share/in", "/share/archive", foi_addr, itm_addr, iqube_addr, &db_url);
	let gateway = Arc::new(ShareGateway::new(Box::new(backend), &config));
	let coordinator = Coordinator::new(config, gateway.clone(), coordinator_control, "test-secret");

	clear_row(&inspector, path).await;

	let first = coordinator.run().await;
	assert_eq!(first.processed.len(), 1);
	assert_eq!(first.processed[0].status, "itm_failed");
	assert_eq!(iqube.calls.load(Ordering::SeqCst), 0, "IQube is not notified of ITM failures");

	let second = coordinator.run().await;
	assert!(second.processed.is_empty());
	assert!(second.errors.is_empty());
	assert_eq!(foi.calls.load(Ordering::SeqCst), 1, "second run must not call FOI again");
	assert_eq!(itm.calls.load(Ordering::SeqCst), 1, "second run must not call ITM again");

	clear_row(&inspector, path).await;
}

#[tokio::test]
async fn unknown_exception_rollback_allows_reprocessing() {
	let coordinator_control = setup_control_store().await;
	let inspector = setup_control_store().await;
	let db_url = std::env::var("DATABASE_URL").unwrap();

	let (foi_addr, foi) = spawn_server(json!({ "result": [{"ok": true}] })).await;
	let (itm_addr, itm) = spawn_server(json!({ "status": "success" })).await;
	let (iqube_addr, _iqube) = spawn_server(json!({})).await;

	let path = "/share/in/r/FAILPOINT_20240101000000.xlsx";
	let long_ago = Utc::now() - ChronoDuration::seconds(120);
	let backend = FakeBackend::new().with_file(path, 10, Some(long_ago), Some(long_ago));

	let mut config = scenario_config("/share/in", "/share/archive", foi_addr, itm_addr, iqube_addr, &db_url);
	config.failpoints_enabled = true;
	let gateway = Arc::new(ShareGateway::new(Box::new(backend), &config));
	let coordinator = Coordinator::new(config, gateway.clone(), coordinator_control, "test-secret");

	clear_row(&inspector, path).await;
	failpoints::arm(path);

	let first = coordinator.run().await;
	assert!(first.processed.is_empty());
	assert_eq!(first.errors.len(), 1);
	assert_eq!(first.errors[0].error, failpoints::ROLLBACK_AFTER_CLAIM);
	assert!(inspector.get(path).await.unwrap().is_none(), "claim must be rolled back");
	assert_eq!(foi.calls.load(Ordering::SeqCst), 0, "failpoint fires before any FOI call");

	let second = coordinator.run().await;
	assert_eq!(second.processed.len(), 1);
	assert_eq!(second.processed[0].status, "success");
	assert_eq!(foi.calls.load(Ordering::SeqCst), 1);
	assert_eq!(itm.calls.load(Ordering::SeqCst), 1);

	clear_row(&inspector, path).await;
}
