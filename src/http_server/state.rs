use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{config::Config, coordinator::Coordinator};

#[derive(Clone)]
pub struct ServerState {
	pub config: Arc<Config>,
	pub coordinator: Arc<Coordinator>,
	pub jwt_secret: Arc<str>,
	pub started_at: DateTime<Utc>,
	pub pid: u32,
}
