use std::sync::Arc;

use crate::{
	control_store::ControlStore,
	coordinator::Coordinator,
	http_server::state::ServerState,
	share::{ShareGateway, gateway::testing::FakeBackend},
	test_support::test_config,
};

pub async fn create_test_state() -> Arc<ServerState> {
	let config = test_config();
	let gateway = Arc::new(ShareGateway::new(Box::new(FakeBackend::new()), &config));
	let pool = coordinator_postgres::pool::lazy(&config.database_url, "coordinatord-test")
		.expect("building lazy test pool");
	let control = ControlStore::new(pool);
	let coordinator = Arc::new(Coordinator::new(config.clone(), gateway, control, "test-secret"));

	Arc::new(ServerState {
		config: Arc::new(config),
		coordinator,
		jwt_secret: Arc::from("test-secret"),
		started_at: chrono::Utc::now(),
		pid: std::process::id(),
	})
}
