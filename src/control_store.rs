//! Control store: the `coordinator_control` exactly-once claim table (spec §4.4).

use chrono::{DateTime, Utc};
use coordinator_postgres::pool::{PgConnection, PgPool};
use tokio_postgres::Transaction;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ControlStoreError;

/// A control row as read back from the database.
#[derive(Debug, Clone)]
pub struct ControlRow {
	pub record_id: String,
	pub file_name: String,
	pub status: String,
	pub message: Option<String>,
	pub attempt_no: i32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Terminal (or transient `processing`) status recorded against a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	Processing,
	Success,
	ItmFailed,
	ExtractionFilePasswordFailed,
	ExtractionFileFailed,
	ExtractionServiceFailed,
}

impl Status {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Processing => "processing",
			Self::Success => "success",
			Self::ItmFailed => "itm_failed",
			Self::ExtractionFilePasswordFailed => "extraction_file_password_failed",
			Self::ExtractionFileFailed => "extraction_file_failed",
			Self::ExtractionServiceFailed => "extraction_service_failed",
		}
	}
}

/// One claimed file's transaction, open from the moment `try_claim` commits
/// the claim insert through to `finalize`. Dropping this without finalizing
/// and committing rolls back the claim (spec §4.4's "unknown exception"
/// path) — callers should prefer `rollback` for explicit intent, but relying
/// on drop is also correct.
pub struct Claim<'a> {
	tx: Transaction<'a>,
	pub record_id: String,
	pub file_name: String,
}

impl<'a> Claim<'a> {
	/// Update the claimed row to a terminal status and commit.
	pub async fn finalize(self, status: Status, message: Option<&str>) -> Result<(), ControlStoreError> {
		self.tx
			.execute(
				"UPDATE coordinator_control SET status = $1, message = $2, updated_at = now() WHERE file_name = $3",
				&[&status.as_str(), &message, &self.file_name],
			)
			.await?;
		self.tx.commit().await?;
		Ok(())
	}

	/// Commit without changing status, e.g. the already-claimed skip path.
	pub async fn commit_unchanged(self) -> Result<(), ControlStoreError> {
		self.tx.commit().await?;
		Ok(())
	}

	/// Roll back, erasing the claim so the file is eligible next run.
	pub async fn rollback(self) -> Result<(), ControlStoreError> {
		self.tx.rollback().await?;
		Ok(())
	}
}

pub struct ControlStore {
	pool: PgPool,
}

impl ControlStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Pre-check optimisation only; `try_claim`'s unique-constraint failure
	/// is the authoritative guard (spec §4.4).
	pub async fn exists(&self, file_name: &str) -> Result<bool, ControlStoreError> {
		let conn = self.acquire().await?;
		let row = conn
			.query_opt(
				"SELECT 1 FROM coordinator_control WHERE file_name = $1",
				&[&file_name],
			)
			.await?;
		Ok(row.is_some())
	}

	/// Look up the existing row for a file, if any (the `existing_row` half
	/// of `try_claim`'s contract, spec §4.4).
	pub async fn get(&self, file_name: &str) -> Result<Option<ControlRow>, ControlStoreError> {
		let conn = self.acquire().await?;
		let row = conn
			.query_opt(
				"SELECT record_id, file_name, status, message, attempt_no, created_at, updated_at \
				 FROM coordinator_control WHERE file_name = $1",
				&[&file_name],
			)
			.await?;
		Ok(row.map(|row| ControlRow {
			record_id: row.get(0),
			file_name: row.get(1),
			status: row.get(2),
			message: row.get(3),
			attempt_no: row.get(4),
			created_at: row.get(5),
			updated_at: row.get(6),
		}))
	}

	/// Open a transaction and attempt the claim insert within it. Returns
	/// `Ok(None)` when the unique constraint fired (already claimed) after
	/// committing the empty transaction; returns `Ok(Some(claim))` with the
	/// transaction still open, ready for `finalize` or `rollback`, when the
	/// claim succeeded.
	pub async fn try_claim<'a>(
		&self,
		conn: &'a mut PgConnection,
		file_name: &str,
	) -> Result<Option<Claim<'a>>, ControlStoreError> {
		let tx = conn.transaction().await?;
		let record_id = Uuid::now_v7().simple().to_string();

		let inserted = tx
			.execute(
				"INSERT INTO coordinator_control (record_id, file_name, status, attempt_no) \
				 VALUES ($1, $2, $3, 1) ON CONFLICT (file_name) DO NOTHING",
				&[&record_id, &file_name, &Status::Processing.as_str()],
			)
			.await?;

		if inserted == 0 {
			debug!(file_name, "claim already held, skipping");
			tx.commit().await?;
			return Ok(None);
		}

		Ok(Some(Claim {
			tx,
			record_id,
			file_name: file_name.to_string(),
		}))
	}

	/// Borrow a pooled connection for a single claimed file's lifetime.
	pub async fn acquire(&self) -> Result<PgConnection, ControlStoreError> {
		self.pool
			.get()
			.await
			.map_err(|err| ControlStoreError::Pool(format!("{err:?}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_strings_match_spec_enumeration() {
		assert_eq!(Status::Processing.as_str(), "processing");
		assert_eq!(Status::Success.as_str(), "success");
		assert_eq!(Status::ItmFailed.as_str(), "itm_failed");
		assert_eq!(
			Status::ExtractionFilePasswordFailed.as_str(),
			"extraction_file_password_failed"
		);
		assert_eq!(Status::ExtractionFileFailed.as_str(), "extraction_file_failed");
		assert_eq!(
			Status::ExtractionServiceFailed.as_str(),
			"extraction_service_failed"
		);
	}
}
