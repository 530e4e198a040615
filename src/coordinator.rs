//! Run coordinator: orchestrates a single run end to end (spec §4.6).
//! Leaf collaborators (gateway, control store, external clients) are owned
//! here and never depend back on this module (spec §9).

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::{
	archive_registry::ArchiveRegistry,
	auth,
	clients::{FoiClient, IqubeClient, ItmClient, itm::ItmInstruction},
	config::Config,
	control_store::{ControlStore, Status},
	errors::FoiOutcome,
	failpoints,
	metrics,
	share::{Candidate, ShareGateway},
	versioning::{extract_ts, strip_ts_basename},
};

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
	pub file_name: String,
	pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunError {
	pub file_name: String,
	pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
	pub processed: Vec<ProcessedFile>,
	#[serde(rename = "error")]
	pub errors: Vec<RunError>,
}

/// Identity-token TTL. Re-minted lazily whenever it's within this window of
/// expiring, so a long-running process never submits a stale bearer token.
const IDENTITY_TOKEN_TTL_SECONDS: i64 = 300;

pub struct Coordinator {
	config: Config,
	gateway: Arc<ShareGateway>,
	control: ControlStore,
	foi: FoiClient,
	itm: ItmClient,
	iqube: IqubeClient,
	archive_registry: ArchiveRegistry,
	jwt_secret: Arc<str>,
	identity_token: tokio::sync::Mutex<(String, i64)>,
}

impl Coordinator {
	pub fn new(
		config: Config,
		gateway: Arc<ShareGateway>,
		control: ControlStore,
		jwt_secret: &str,
	) -> Self {
		let foi = FoiClient::new(config.foi_api_url.clone());
		let itm = ItmClient::new(
			config.itm_api_url.clone(),
			config.itm_consumer_type.clone(),
			config.itm_source_system.clone(),
		);
		let iqube = IqubeClient::new(config.iqube_api_url.clone());

		Self {
			config,
			gateway,
			control,
			foi,
			itm,
			iqube,
			archive_registry: ArchiveRegistry::new(),
			jwt_secret: Arc::from(jwt_secret),
			// Already-expired placeholder: the first call to `identity_token`
			// mints the real thing.
			identity_token: tokio::sync::Mutex::new((String::new(), 0)),
		}
	}

	pub fn archive_registry(&self) -> &ArchiveRegistry {
		&self.archive_registry
	}

	/// ENV=local disables outbound identity-token acquisition (spec §6); in
	/// production the coordinator mints its own short-lived token from the
	/// same secret used to validate inbound run-trigger requests, refreshing
	/// it whenever the cached one has expired.
	async fn identity_token(&self) -> String {
		if self.config.is_local_env {
			return "local".to_string();
		}

		let mut cached = self.identity_token.lock().await;
		if Utc::now().timestamp() < cached.1 {
			return cached.0.clone();
		}

		match auth::issue_token(&self.jwt_secret, "coordinatord", IDENTITY_TOKEN_TTL_SECONDS) {
			Ok(token) => {
				*cached = (token.clone(), Utc::now().timestamp() + IDENTITY_TOKEN_TTL_SECONDS);
				token
			}
			Err(err) => {
				warn!(%err, "failed to mint outbound identity token");
				cached.0.clone()
			}
		}
	}

	/// Run once: scan, group, select, gate, claim, process, summarize.
	#[instrument(skip(self))]
	pub async fn run(&self) -> RunSummary {
		metrics::inc_runs();
		let started = std::time::Instant::now();
		let now = Utc::now();

		let candidates = match self.gateway.list_files().await {
			Ok(candidates) => candidates,
			Err(err) => {
				warn!(%err, "listing source root failed");
				metrics::set_last_run_duration(started.elapsed().as_secs_f64());
				return RunSummary {
					processed: vec![],
					errors: vec![RunError {
						file_name: self.gateway.source_root().to_string(),
						error: err.to_string(),
					}],
				};
			}
		};

		let groups = group_candidates(candidates);

		let mut summary = RunSummary::default();
		let mut process_candidates = Vec::new();

		for ((_remitter, _stripped), mut members) in groups {
			members.sort_by_key(|c| {
				(
					extract_ts(&c.basename).unwrap_or(i64::MIN),
					c.chgtime.timestamp(),
					c.path.clone(),
				)
			});

			let process_candidate = members.pop();
			for archive_only in members {
				self.handle_archive_only(&archive_only, now).await;
			}
			if let Some(candidate) = process_candidate {
				process_candidates.push(candidate);
			}
		}

		let concurrency = self.config.concurrency;
		let results: Vec<Option<RunResult>> = stream::iter(process_candidates)
			.map(|candidate| self.handle_process_candidate(candidate, now))
			.buffer_unordered(concurrency)
			.collect()
			.await;

		for result in results.into_iter().flatten() {
			match result {
				RunResult::Processed(file) => summary.processed.push(file),
				RunResult::Error(error) => summary.errors.push(error),
			}
		}

		metrics::set_last_run_duration(started.elapsed().as_secs_f64());
		info!(
			processed = summary.processed.len(),
			errors = summary.errors.len(),
			"run complete"
		);
		summary
	}

	async fn handle_archive_only(&self, candidate: &Candidate, now: chrono::DateTime<Utc>) {
		if !self.gateway.is_stable(&candidate.path, now).await {
			debug!(path = candidate.path, "archive-only candidate unstable, skipping");
			metrics::inc_files_skipped();
			return;
		}

		let dst = self.gateway.compute_archive_path(&candidate.path);
		if let Err(err) = self.gateway.move_to_archive(&candidate.path, &dst).await {
			warn!(%err, path = candidate.path, "failed to archive older version");
		} else {
			metrics::inc_archive_moves();
		}
	}

	async fn handle_process_candidate(&self, candidate: Candidate, now: chrono::DateTime<Utc>) -> Option<RunResult> {
		if !self.gateway.is_stable(&candidate.path, now).await {
			debug!(path = candidate.path, "process candidate unstable, skipping");
			metrics::inc_files_skipped();
			return None;
		}

		let mut conn = match self.control.acquire().await {
			Ok(conn) => conn,
			Err(err) => {
				return Some(RunResult::Error(RunError {
					file_name: candidate.path.clone(),
					error: err.to_string(),
				}));
			}
		};

		let claim = match self.control.try_claim(&mut conn, &candidate.path).await {
			Ok(Some(claim)) => claim,
			Ok(None) => {
				metrics::inc_files_skipped();
				return None;
			}
			Err(err) => {
				return Some(RunResult::Error(RunError {
					file_name: candidate.path.clone(),
					error: err.to_string(),
				}));
			}
		};

		if self.config.failpoints_enabled && failpoints::fire_if_armed(&candidate.path) {
			if let Err(err) = claim.rollback().await {
				warn!(%err, path = candidate.path, "failpoint rollback itself failed");
			}
			return Some(RunResult::Error(RunError {
				file_name: candidate.path.clone(),
				error: failpoints::ROLLBACK_AFTER_CLAIM.to_string(),
			}));
		}

		let outcome = self.pipeline(&candidate).await;

		metrics::inc_files_processed();
		match outcome {
			Ok(PipelineOutcome::Success) => {
				if let Err(err) = claim.finalize(Status::Success, None).await {
					return Some(RunResult::Error(RunError {
						file_name: candidate.path.clone(),
						error: err.to_string(),
					}));
				}
				metrics::inc_files_success();

				let dst = self.gateway.compute_archive_path(&candidate.path);
				self.archive_registry
					.schedule_move(self.gateway.clone(), candidate.path.clone(), dst)
					.await;
				metrics::inc_archive_moves();

				Some(RunResult::Processed(ProcessedFile {
					file_name: candidate.path.clone(),
					status: Status::Success.as_str().to_string(),
				}))
			}
			Ok(PipelineOutcome::ItmFailed) => {
				if let Err(err) = claim
					.finalize(Status::ItmFailed, Some("ITM submission returned a failure status"))
					.await
				{
					return Some(RunResult::Error(RunError {
						file_name: candidate.path.clone(),
						error: err.to_string(),
					}));
				}
				metrics::inc_files_failed();
				Some(RunResult::Processed(ProcessedFile {
					file_name: candidate.path.clone(),
					status: Status::ItmFailed.as_str().to_string(),
				}))
			}
			Ok(PipelineOutcome::ExtractionFailed(status, detail)) => {
				if let Err(err) = claim.finalize(status, Some(&detail)).await {
					return Some(RunResult::Error(RunError {
						file_name: candidate.path.clone(),
						error: err.to_string(),
					}));
				}
				metrics::inc_files_failed();

				self.iqube
					.notify_failure(&candidate.path, &format!("{}: {detail}", status.as_str()))
					.await;

				Some(RunResult::Processed(ProcessedFile {
					file_name: candidate.path.clone(),
					status: status.as_str().to_string(),
				}))
			}
			Err(err) => {
				if let Err(rollback_err) = claim.rollback().await {
					warn!(%rollback_err, path = candidate.path, "rollback after unknown exception failed");
				}
				Some(RunResult::Error(RunError {
					file_name: candidate.path.clone(),
					error: err,
				}))
			}
		}
	}

	/// Read the file, call FOI, and (on FOI success) call ITM. Any share
	/// error here is an "unknown exception" (spec §4.6) and rolls the claim
	/// back; classified FOI/ITM outcomes are not errors and are returned as
	/// `Ok`.
	async fn pipeline(&self, candidate: &Candidate) -> Result<PipelineOutcome, String> {
		let bytes = self
			.gateway
			.read_file(&candidate.path)
			.await
			.map_err(|err| err.to_string())?;

		let foi_outcome = self
			.foi
			.extract(&candidate.remitter, &candidate.basename, bytes, None, None)
			.await;

		match foi_outcome {
			FoiOutcome::Success => {
				let instruction = ItmInstruction {
					source_unique_ref: candidate.basename.clone(),
					client_account_region: candidate.remitter.clone(),
					message_category: "remittance".to_string(),
					product_identifier: "coordinatord".to_string(),
					payload: json!({ "file_name": candidate.path }),
				};
				let identity_token = self.identity_token().await;
				match self.itm.submit(&identity_token, instruction).await {
					crate::clients::itm::ItmResult::Success => Ok(PipelineOutcome::Success),
					crate::clients::itm::ItmResult::Failed => Ok(PipelineOutcome::ItmFailed),
				}
			}
			FoiOutcome::ExtractionFilePasswordFailed { detail } => Ok(PipelineOutcome::ExtractionFailed(
				Status::ExtractionFilePasswordFailed,
				detail,
			)),
			FoiOutcome::ExtractionFileFailed { detail } => {
				Ok(PipelineOutcome::ExtractionFailed(Status::ExtractionFileFailed, detail))
			}
			FoiOutcome::ExtractionServiceFailed { detail } => Ok(PipelineOutcome::ExtractionFailed(
				Status::ExtractionServiceFailed,
				detail,
			)),
		}
	}
}

enum PipelineOutcome {
	Success,
	ItmFailed,
	ExtractionFailed(Status, String),
}

enum RunResult {
	Processed(ProcessedFile),
	Error(RunError),
}

fn group_candidates(candidates: Vec<Candidate>) -> HashMap<(String, String), Vec<Candidate>> {
	let mut groups: HashMap<(String, String), Vec<Candidate>> = HashMap::new();
	for candidate in candidates {
		let key = (candidate.remitter.clone(), strip_ts_basename(&candidate.basename));
		groups.entry(key).or_default().push(candidate);
	}
	groups
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(path: &str, basename: &str, remitter: &str, ts_secs: i64) -> Candidate {
		Candidate {
			path: path.to_string(),
			basename: basename.to_string(),
			remitter: remitter.to_string(),
			size: 10,
			chgtime: chrono::DateTime::from_timestamp(ts_secs, 0).unwrap(),
		}
	}

	#[test]
	fn groups_by_remitter_and_stripped_basename() {
		let candidates = vec![
			candidate("/in/r/REPORT_20251105120000.xlsx", "REPORT_20251105120000.xlsx", "r", 0),
			candidate("/in/r/REPORT_20251106120000.xlsx", "REPORT_20251106120000.xlsx", "r", 1),
			candidate("/in/other/DATA.pdf", "DATA.pdf", "other", 2),
		];
		let groups = group_candidates(candidates);
		assert_eq!(groups.len(), 2);
		assert_eq!(groups[&("r".to_string(), "REPORT.xlsx".to_string())].len(), 2);
		assert_eq!(groups[&("other".to_string(), "DATA.pdf".to_string())].len(), 1);
	}
}
