use thiserror::Error;

/// Terminal extraction outcomes from FOI, one variant per row of the
/// response-shape table. Parsed once in `clients::foi`, then matched on
/// here and in the coordinator — never re-inspected by string content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoiOutcome {
	Success,
	ExtractionServiceFailed { detail: String },
	ExtractionFilePasswordFailed { detail: String },
	ExtractionFileFailed { detail: String },
}

impl FoiOutcome {
	/// The status string persisted to `coordinator_control.status`.
	pub fn status_str(&self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::ExtractionServiceFailed { .. } => "extraction_service_failed",
			Self::ExtractionFilePasswordFailed { .. } => "extraction_file_password_failed",
			Self::ExtractionFileFailed { .. } => "extraction_file_failed",
		}
	}

	pub fn detail(&self) -> Option<&str> {
		match self {
			Self::Success => None,
			Self::ExtractionServiceFailed { detail }
			| Self::ExtractionFilePasswordFailed { detail }
			| Self::ExtractionFileFailed { detail } => Some(detail),
		}
	}

	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success)
	}
}

/// Whether an SMB/IO failure should be retried by the gateway or treated as
/// final and propagated to the caller. Mirrors spec §4.1's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmbFailureKind {
	Retryable,
	Permanent,
}

/// An error surfaced by the share gateway. Kept separate from `CoordinatorError`
/// so the retry loop inside the gateway can match on it without threading the
/// whole error enum through.
#[derive(Debug, Error)]
pub enum ShareError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("transient share error: {0}")]
	Transient(String),

	#[error("permanent share error: {0}")]
	Permanent(String),
}

impl ShareError {
	pub fn kind(&self) -> SmbFailureKind {
		match self {
			Self::Transient(_) => SmbFailureKind::Retryable,
			Self::NotFound(_) | Self::Permanent(_) => SmbFailureKind::Permanent,
		}
	}
}

/// Errors from the control store. The already-claimed case isn't here: it's
/// not an error, just `try_claim` returning `Ok(None)`.
#[derive(Debug, Error)]
pub enum ControlStoreError {
	#[error("database error: {0}")]
	Database(#[from] tokio_postgres::Error),

	#[error("could not borrow a control-store connection: {0}")]
	Pool(String),
}

/// Top-level error type for anything that should roll the per-file
/// transaction back and surface in the run summary's `error[]`. This is
/// deliberately the catch-all "unknown exception" bucket from spec §4.6/§7 —
/// classified FOI/ITM outcomes never reach it, they're handled inline.
#[derive(Debug, Error)]
pub enum CoordinatorError {
	#[error(transparent)]
	Share(#[from] ShareError),

	#[error(transparent)]
	ControlStore(#[from] ControlStoreError),

	#[error("http client error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("{0}")]
	Other(String),
}
