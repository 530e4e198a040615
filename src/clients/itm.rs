//! ITM submission client: JSON POST with required headers, judged on the
//! response's `status` field (spec §4.5).

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
pub struct ItmInstruction {
	#[serde(rename = "sourceUniqueRef")]
	pub source_unique_ref: String,
	#[serde(rename = "clientAccountRegion")]
	pub client_account_region: String,
	#[serde(rename = "messageCategory")]
	pub message_category: String,
	#[serde(rename = "productIdentifier")]
	pub product_identifier: String,
	pub payload: Value,
}

#[derive(Debug, Serialize)]
struct ItmRequestBody {
	instructions: Vec<ItmInstruction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItmResult {
	Success,
	Failed,
}

pub struct ItmClient {
	http: Client,
	url: String,
	consumer_type: String,
	source_system: String,
}

impl ItmClient {
	pub fn new(url: String, consumer_type: String, source_system: String) -> Self {
		let http = Client::builder()
			.timeout(DEFAULT_TIMEOUT)
			.build()
			.expect("building ITM http client");
		Self {
			http,
			url,
			consumer_type,
			source_system,
		}
	}

	pub async fn submit(&self, auth_token: &str, instruction: ItmInstruction) -> ItmResult {
		let body = ItmRequestBody {
			instructions: vec![instruction],
		};

		let response = match self
			.http
			.post(&self.url)
			.header("Authorization", auth_token)
			.header("Consumer-Type", &self.consumer_type)
			.header("source-system", &self.source_system)
			.json(&body)
			.send()
			.await
		{
			Ok(response) => response,
			Err(err) => {
				warn!(%err, "ITM request failed");
				return ItmResult::Failed;
			}
		};

		if !response.status().is_success() {
			return ItmResult::Failed;
		}

		let parsed: Option<Value> = response.json().await.ok();
		match parsed.as_ref().and_then(|v| v.get("status")).and_then(Value::as_str) {
			Some("success") => ItmResult::Success,
			_ => ItmResult::Failed,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn status_of(body: Value) -> ItmResult {
		match body.get("status").and_then(Value::as_str) {
			Some("success") => ItmResult::Success,
			_ => ItmResult::Failed,
		}
	}

	#[test]
	fn success_status_is_ok() {
		assert_eq!(status_of(json!({"status": "success"})), ItmResult::Success);
	}

	#[test]
	fn any_other_status_is_failure() {
		assert_eq!(status_of(json!({"status": "failed"})), ItmResult::Failed);
		assert_eq!(status_of(json!({})), ItmResult::Failed);
	}
}
