//! Share gateway: listing, stat'ing, and archiving files on the SMB share
//! (spec §4.1), plus the retryable/permanent error classification.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::warn;

use super::stability::{self, StabilityPolicy};
use crate::{
	config::{Config, IGNORE_PREFIX},
	errors::ShareError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
	pub size: u64,
	pub mtime: Option<DateTime<Utc>>,
	pub chgtime: Option<DateTime<Utc>>,
}

/// An in-memory candidate discovered by a scan. `remitter` is the first
/// path segment under the source root.
#[derive(Debug, Clone)]
pub struct Candidate {
	pub path: String,
	pub basename: String,
	pub remitter: String,
	pub size: u64,
	pub chgtime: DateTime<Utc>,
}

/// Abstraction over the SMB transport so the gateway's filtering,
/// classification, and retry logic can be unit-tested without a network.
/// The production implementation wraps the `smb` crate; tests use
/// [`testing::FakeBackend`], an in-memory share fixture.
#[async_trait]
pub trait ShareBackend: Send + Sync {
	async fn list(&self, root: &str) -> Result<Vec<Candidate>, ShareError>;
	async fn stat(&self, path: &str) -> Result<Stat, ShareError>;
	async fn read(&self, path: &str) -> Result<Vec<u8>, ShareError>;
	async fn rename(&self, src: &str, dst: &str) -> Result<(), ShareError>;
	async fn create_parents(&self, path: &str) -> Result<(), ShareError>;
}

pub struct ShareGateway {
	backend: Box<dyn ShareBackend>,
	source_root: String,
	archive_root: String,
	ignore_suffixes: Vec<String>,
	stability_policy: StabilityPolicy,
}

impl ShareGateway {
	pub fn new(backend: Box<dyn ShareBackend>, config: &Config) -> Self {
		Self {
			backend,
			source_root: config.smb_source_root.clone(),
			archive_root: config.smb_archive_root.clone(),
			ignore_suffixes: config.ignore_suffixes.clone(),
			stability_policy: config.stability_policy,
		}
	}

	pub fn source_root(&self) -> &str {
		&self.source_root
	}

	/// Probe `path` for stability under the configured policy (spec §4.2).
	/// Bypasses the gateway's retry loop: a raw `stat` failure — transient
	/// or not — makes the file unstable for this run, per §4.2.
	pub async fn is_stable(&self, path: &str, now: DateTime<Utc>) -> bool {
		stability::is_stable(self.backend.as_ref(), path, &self.stability_policy, now).await
	}

	/// List candidates under the source root, dropping ignored basenames.
	pub async fn list_files(&self) -> Result<Vec<Candidate>, ShareError> {
		let candidates = self.with_retry(|| self.backend.list(&self.source_root)).await?;
		Ok(candidates
			.into_iter()
			.filter(|c| !self.is_ignored(&c.basename))
			.collect())
	}

	pub fn is_ignored(&self, basename: &str) -> bool {
		if basename.starts_with(IGNORE_PREFIX) {
			return true;
		}
		self.ignore_suffixes.iter().any(|suffix| basename.ends_with(suffix.as_str()))
	}

	pub async fn stat(&self, path: &str) -> Result<Stat, ShareError> {
		self.with_retry(|| self.backend.stat(path)).await
	}

	pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, ShareError> {
		self.with_retry(|| self.backend.read(path)).await
	}

	/// Mirror `src`'s path, relative to the source root, under the archive
	/// root. Basename collisions are not resolved here (spec §4.1).
	pub fn compute_archive_path(&self, src: &str) -> String {
		let rel = src
			.strip_prefix(&self.source_root)
			.unwrap_or(src)
			.trim_start_matches(['/', '\\']);
		join_unc(&self.archive_root, rel)
	}

	/// Move `src` to `dst`, creating destination parents first. On failure
	/// the source is left in place (spec §4.1).
	pub async fn move_to_archive(&self, src: &str, dst: &str) -> Result<(), ShareError> {
		self.with_retry(|| self.backend.create_parents(dst)).await?;
		self.with_retry(|| self.backend.rename(src, dst)).await
	}

	/// Bounded exponential retry with jitter for retryable errors;
	/// permanent errors propagate immediately (spec §4.1).
	async fn with_retry<'a, F, Fut, T>(&'a self, mut op: F) -> Result<T, ShareError>
	where
		F: FnMut() -> Fut,
		Fut: std::future::Future<Output = Result<T, ShareError>> + 'a,
	{
		const MAX_ATTEMPTS: u32 = 5;
		let mut attempt = 0;
		loop {
			attempt += 1;
			match op().await {
				Ok(value) => return Ok(value),
				Err(err) if attempt < MAX_ATTEMPTS && err.kind() == crate::errors::SmbFailureKind::Retryable => {
					let base_ms = 100u64 * 2u64.pow(attempt - 1);
					let jitter_ms = rand::thread_rng().gen_range(0..base_ms.max(1));
					warn!(attempt, %err, "retrying transient share error");
					tokio::time::sleep(Duration::from_millis(base_ms + jitter_ms)).await;
				}
				Err(err) => return Err(err),
			}
		}
	}
}

fn join_unc(root: &str, rel: &str) -> String {
	let root = root.trim_end_matches(['/', '\\']);
	let rel = rel.replace('\\', "/");
	format!("{root}/{rel}")
}

/// Derive the remitter (first path segment under `source_root`) and
/// basename for a discovered path.
pub fn remitter_of(path: &str, source_root: &str) -> String {
	let rel = path.strip_prefix(source_root).unwrap_or(path).trim_start_matches(['/', '\\']);
	rel.split(['/', '\\']).next().unwrap_or("").to_string()
}

pub fn basename_of(path: &str) -> String {
	Path::new(path)
		.file_name()
		.map(|n| n.to_string_lossy().to_string())
		.unwrap_or_else(|| path.to_string())
}

/// An in-memory fake backend for unit and integration tests, and the
/// trait-bound retry-loop test below. Exposed behind the `test-support`
/// feature so integration tests (which can't see `#[cfg(test)]` items) can
/// use the same fixture the unit tests do.
#[cfg(any(test, feature = "test-support"))]
pub mod testing {
	use std::{collections::HashMap, sync::Mutex};

	use super::*;

	#[derive(Clone)]
	struct Entry {
		size: u64,
		mtime: Option<DateTime<Utc>>,
		chgtime: Option<DateTime<Utc>>,
		bytes: Vec<u8>,
	}

	/// An in-memory share: a flat map of absolute path -> stat entry. No
	/// directory structure is modelled; `list` simply returns everything
	/// under the given root prefix.
	pub struct FakeBackend {
		entries: Mutex<HashMap<String, Entry>>,
		pub fail_next_stat: Mutex<Option<String>>,
	}

	impl Default for FakeBackend {
		fn default() -> Self {
			Self::new()
		}
	}

	impl FakeBackend {
		pub fn new() -> Self {
			Self {
				entries: Mutex::new(HashMap::new()),
				fail_next_stat: Mutex::new(None),
			}
		}

		pub fn with_file(
			self,
			path: &str,
			size: u64,
			mtime: Option<DateTime<Utc>>,
			chgtime: Option<DateTime<Utc>>,
		) -> Self {
			self.entries.lock().unwrap().insert(
				path.to_string(),
				Entry {
					size,
					mtime,
					chgtime,
					bytes: vec![0u8; size as usize],
				},
			);
			self
		}

		pub fn remove(&self, path: &str) {
			self.entries.lock().unwrap().remove(path);
		}

		pub fn contains(&self, path: &str) -> bool {
			self.entries.lock().unwrap().contains_key(path)
		}

		pub fn paths(&self) -> Vec<String> {
			self.entries.lock().unwrap().keys().cloned().collect()
		}
	}

	#[async_trait]
	impl ShareBackend for FakeBackend {
		async fn list(&self, root: &str) -> Result<Vec<Candidate>, ShareError> {
			let entries = self.entries.lock().unwrap();
			Ok(entries
				.iter()
				.filter(|(path, _)| path.starts_with(root))
				.map(|(path, entry)| Candidate {
					path: path.clone(),
					basename: basename_of(path),
					remitter: remitter_of(path, root),
					size: entry.size,
					chgtime: entry.chgtime.unwrap_or_else(Utc::now),
				})
				.collect())
		}

		async fn stat(&self, path: &str) -> Result<Stat, ShareError> {
			let entries = self.entries.lock().unwrap();
			entries
				.get(path)
				.map(|entry| Stat {
					size: entry.size,
					mtime: entry.mtime,
					chgtime: entry.chgtime,
				})
				.ok_or_else(|| ShareError::NotFound(path.to_string()))
		}

		async fn read(&self, path: &str) -> Result<Vec<u8>, ShareError> {
			let entries = self.entries.lock().unwrap();
			entries
				.get(path)
				.map(|entry| entry.bytes.clone())
				.ok_or_else(|| ShareError::NotFound(path.to_string()))
		}

		async fn rename(&self, src: &str, dst: &str) -> Result<(), ShareError> {
			let mut entries = self.entries.lock().unwrap();
			let entry = entries
				.remove(src)
				.ok_or_else(|| ShareError::NotFound(src.to_string()))?;
			entries.insert(dst.to_string(), entry);
			Ok(())
		}

		async fn create_parents(&self, _path: &str) -> Result<(), ShareError> {
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::test_config;

	#[test]
	fn ignores_tilde_dollar_prefix() {
		let gw = ShareGateway::new(Box::new(testing::FakeBackend::new()), &test_config());
		assert!(gw.is_ignored("~$LOCK.xlsx"));
	}

	#[test]
	fn ignores_configured_suffixes() {
		let gw = ShareGateway::new(Box::new(testing::FakeBackend::new()), &test_config());
		assert!(gw.is_ignored("DATA.pdf.part"));
		assert!(gw.is_ignored("DATA.tmp"));
		assert!(gw.is_ignored("DATA.crdownload"));
		assert!(!gw.is_ignored("DATA.pdf"));
	}

	#[test]
	fn computes_archive_path_mirroring_relative_path() {
		let gw = ShareGateway::new(Box::new(testing::FakeBackend::new()), &test_config());
		assert_eq!(
			gw.compute_archive_path("/share/in/remitterA/REPORT.xlsx"),
			"/share/archive/remitterA/REPORT.xlsx"
		);
	}

	#[tokio::test]
	async fn list_files_drops_ignored_names() {
		let backend = testing::FakeBackend::new()
			.with_file("/share/in/r/DATA.pdf", 10, Some(Utc::now()), None)
			.with_file("/share/in/r/~$LOCK.xlsx", 10, Some(Utc::now()), None)
			.with_file("/share/in/r/DATA.pdf.part", 10, Some(Utc::now()), None);
		let gw = ShareGateway::new(Box::new(backend), &test_config());
		let files = gw.list_files().await.unwrap();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].basename, "DATA.pdf");
	}
}
