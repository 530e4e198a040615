//! Stability policy ("Policy A", spec §4.2).

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::gateway::{ShareBackend, Stat};
use crate::errors::ShareError;

#[derive(Debug, Clone, Copy)]
pub enum StabilityPolicy {
	MinAge { min_age_s: u64 },
	MultiSample { check_count: u32, check_interval_s: u64 },
}

/// Evaluate whether `path` is stable under the configured policy. Any
/// `stat` failure — not-found or transient — makes the file unstable for
/// this run; it is silently re-evaluated next run (spec §4.2).
pub async fn is_stable(
	backend: &dyn ShareBackend,
	path: &str,
	policy: &StabilityPolicy,
	now: DateTime<Utc>,
) -> bool {
	match policy {
		StabilityPolicy::MinAge { min_age_s } => is_stable_min_age(backend, path, *min_age_s, now).await,
		StabilityPolicy::MultiSample {
			check_count,
			check_interval_s,
		} => is_stable_multi_sample(backend, path, *check_count, *check_interval_s).await,
	}
}

async fn is_stable_min_age(
	backend: &dyn ShareBackend,
	path: &str,
	min_age_s: u64,
	now: DateTime<Utc>,
) -> bool {
	let stat = match backend.stat(path).await {
		Ok(stat) => stat,
		Err(_) => return false,
	};
	let Some(latest_change) = latest_change_time(&stat) else {
		return false;
	};
	let age = now.signed_duration_since(latest_change);
	age.num_seconds() >= min_age_s as i64
}

async fn is_stable_multi_sample(
	backend: &dyn ShareBackend,
	path: &str,
	check_count: u32,
	check_interval_s: u64,
) -> bool {
	if check_count == 0 {
		return false;
	}

	let mut previous: Option<Stat> = None;
	for sample_no in 0..check_count {
		if sample_no > 0 {
			tokio::time::sleep(Duration::from_secs(check_interval_s)).await;
		}

		let stat = match backend.stat(path).await {
			Ok(stat) => stat,
			Err(_) => return false,
		};
		if latest_change_time(&stat).is_none() {
			return false;
		}

		if let Some(prev) = &previous {
			if prev.size != stat.size || prev.mtime != stat.mtime || prev.chgtime != stat.chgtime {
				return false;
			}
		}
		previous = Some(stat);
	}
	true
}

fn latest_change_time(stat: &Stat) -> Option<DateTime<Utc>> {
	match (stat.mtime, stat.chgtime) {
		(Some(m), Some(c)) => Some(m.max(c)),
		(Some(m), None) => Some(m),
		(None, Some(c)) => Some(c),
		(None, None) => None,
	}
}

/// Classify an SMB/IO error as retryable or permanent per spec §4.1's table.
/// Used by [`super::gateway::ShareGateway`]'s bounded retry loop.
pub fn is_retryable(err: &ShareError) -> bool {
	matches!(err.kind(), crate::errors::SmbFailureKind::Retryable)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::share::gateway::testing::FakeBackend;

	#[tokio::test]
	async fn min_age_stable_when_old_enough() {
		let now = Utc::now();
		let backend = FakeBackend::new().with_file(
			"/r/a.xlsx",
			100,
			Some(now - chrono::Duration::seconds(120)),
			None,
		);
		let policy = StabilityPolicy::MinAge { min_age_s: 60 };
		assert!(is_stable(&backend, "/r/a.xlsx", &policy, now).await);
	}

	#[tokio::test]
	async fn min_age_unstable_when_too_recent() {
		let now = Utc::now();
		let backend = FakeBackend::new().with_file(
			"/r/a.xlsx",
			100,
			Some(now - chrono::Duration::seconds(5)),
			None,
		);
		let policy = StabilityPolicy::MinAge { min_age_s: 60 };
		assert!(!is_stable(&backend, "/r/a.xlsx", &policy, now).await);
	}

	#[tokio::test]
	async fn unstable_when_stat_fails() {
		let now = Utc::now();
		let backend = FakeBackend::new();
		let policy = StabilityPolicy::MinAge { min_age_s: 60 };
		assert!(!is_stable(&backend, "/missing.xlsx", &policy, now).await);
	}

	#[tokio::test]
	async fn multi_sample_stable_when_unchanged() {
		let now = Utc::now();
		let backend = FakeBackend::new().with_file("/r/a.xlsx", 100, Some(now), None);
		let policy = StabilityPolicy::MultiSample {
			check_count: 2,
			check_interval_s: 0,
		};
		assert!(is_stable(&backend, "/r/a.xlsx", &policy, now).await);
	}
}
