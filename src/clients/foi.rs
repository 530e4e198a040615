//! FOI extraction client: multipart upload and the extraction outcome
//! taxonomy (spec §4.5). The response-shape table is reproduced exactly in
//! [`classify`]; nothing downstream should re-inspect the raw body.

use std::time::Duration;

use reqwest::{Client, StatusCode, multipart};
use serde_json::Value;
use tracing::warn;

use crate::errors::FoiOutcome;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct FoiClient {
	http: Client,
	url_template: String,
}

impl FoiClient {
	pub fn new(url_template: String) -> Self {
		let http = Client::builder()
			.timeout(DEFAULT_TIMEOUT)
			.build()
			.expect("building FOI http client");
		Self { http, url_template }
	}

	/// Upload `file_bytes` under `basename` for `remitter`, with optional
	/// passwords, and classify the response per the extraction taxonomy.
	pub async fn extract(
		&self,
		remitter: &str,
		basename: &str,
		file_bytes: Vec<u8>,
		temp_pwd: Option<&str>,
		replace_pwd: Option<&str>,
	) -> FoiOutcome {
		let url = self.url_template.replace("{remitter}", remitter);

		let part = match multipart::Part::bytes(file_bytes).file_name(basename.to_string()).mime_str("application/octet-stream") {
			Ok(part) => part,
			Err(err) => {
				warn!(%err, "building FOI multipart part");
				return FoiOutcome::ExtractionServiceFailed {
					detail: err.to_string(),
				};
			}
		};
		let mut form = multipart::Form::new().part("file", part);
		if let Some(pwd) = temp_pwd {
			form = form.text("temp_pwd", pwd.to_string());
		}
		if let Some(pwd) = replace_pwd {
			form = form.text("replace_pwd", pwd.to_string());
		}

		let response = match self.http.post(&url).multipart(form).send().await {
			Ok(response) => response,
			Err(err) => {
				warn!(%err, remitter, "FOI request failed");
				return FoiOutcome::ExtractionServiceFailed {
					detail: err.to_string(),
				};
			}
		};

		let status = response.status();
		let body: Option<Value> = response.json().await.ok();
		classify(status, body)
	}
}

fn classify(status: StatusCode, body: Option<Value>) -> FoiOutcome {
	if status.is_server_error() {
		return FoiOutcome::ExtractionServiceFailed {
			detail: format!("FOI returned {status}"),
		};
	}
	if status.is_client_error() {
		return FoiOutcome::ExtractionFileFailed {
			detail: format!("FOI returned {status}"),
		};
	}
	if !status.is_success() {
		return FoiOutcome::ExtractionServiceFailed {
			detail: format!("FOI returned {status}"),
		};
	}

	let Some(Value::Object(obj)) = body else {
		return FoiOutcome::ExtractionServiceFailed {
			detail: "FOI response body is not a JSON object".to_string(),
		};
	};

	if let Some(failed) = obj.get("failed").and_then(Value::as_array) {
		if let Some(first) = failed.first() {
			let reason = first
				.get("failure_reason")
				.and_then(Value::as_str)
				.unwrap_or("unknown failure")
				.to_string();
			let lower = reason.to_lowercase();
			if lower.contains("invalid password") {
				return FoiOutcome::ExtractionFilePasswordFailed { detail: reason };
			}
			return FoiOutcome::ExtractionFileFailed { detail: reason };
		}
	}

	match obj.get("result").and_then(Value::as_array) {
		Some(results) if !results.is_empty() => FoiOutcome::Success,
		_ => FoiOutcome::ExtractionServiceFailed {
			detail: "FOI response carried no result[]".to_string(),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn success_when_result_non_empty_and_no_failed() {
		let body = json!({ "result": [{"field": "value"}] });
		assert_eq!(classify(StatusCode::OK, Some(body)), FoiOutcome::Success);
	}

	#[test]
	fn service_failed_when_result_missing() {
		let body = json!({});
		assert!(matches!(
			classify(StatusCode::OK, Some(body)),
			FoiOutcome::ExtractionServiceFailed { .. }
		));
	}

	#[test]
	fn service_failed_when_result_empty() {
		let body = json!({ "result": [] });
		assert!(matches!(
			classify(StatusCode::OK, Some(body)),
			FoiOutcome::ExtractionServiceFailed { .. }
		));
	}

	#[test]
	fn service_failed_when_body_not_object() {
		let body = json!([1, 2, 3]);
		assert!(matches!(
			classify(StatusCode::OK, Some(body)),
			FoiOutcome::ExtractionServiceFailed { .. }
		));
	}

	#[test]
	fn password_failed_is_case_insensitive_substring() {
		let body = json!({ "failed": [{"failure_reason": "Invalid Password supplied"}], "result": [] });
		let outcome = classify(StatusCode::OK, Some(body));
		assert!(matches!(outcome, FoiOutcome::ExtractionFilePasswordFailed { .. }));
	}

	#[test]
	fn no_matched_template_is_file_failed() {
		let body = json!({ "failed": [{"failure_reason": "no matched template"}] });
		assert!(matches!(
			classify(StatusCode::OK, Some(body)),
			FoiOutcome::ExtractionFileFailed { .. }
		));
	}

	#[test]
	fn other_failure_reasons_are_file_failed() {
		let body = json!({ "failed": [{"failure_reason": "data format error"}] });
		assert!(matches!(
			classify(StatusCode::OK, Some(body)),
			FoiOutcome::ExtractionFileFailed { .. }
		));
	}

	#[test]
	fn client_error_status_is_file_failed() {
		assert!(matches!(
			classify(StatusCode::UNPROCESSABLE_ENTITY, None),
			FoiOutcome::ExtractionFileFailed { .. }
		));
	}

	#[test]
	fn server_error_status_is_service_failed() {
		assert!(matches!(
			classify(StatusCode::BAD_GATEWAY, None),
			FoiOutcome::ExtractionServiceFailed { .. }
		));
	}
}
