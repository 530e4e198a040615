//! IQube failure-notification client: best-effort, never affects a file's
//! terminal status (spec §4.5).

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::warn;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct IqubeNotification<'a> {
	file_path: &'a str,
	reason: &'a str,
}

pub struct IqubeClient {
	http: Client,
	url: String,
}

impl IqubeClient {
	pub fn new(url: String) -> Self {
		let http = Client::builder()
			.timeout(DEFAULT_TIMEOUT)
			.build()
			.expect("building IQube http client");
		Self { http, url }
	}

	/// Notify IQube of an extraction failure. Errors are logged, never
	/// propagated: IQube is advisory (spec §4.5).
	pub async fn notify_failure(&self, file_path: &str, reason: &str) {
		let body = IqubeNotification { file_path, reason };
		if let Err(err) = self.http.post(&self.url).json(&body).send().await {
			warn!(%err, file_path, "IQube notification failed");
		}
	}
}
