//! Archive task registry: fire-and-forget background archive moves, owned
//! by the coordinator rather than a process-wide global (spec §9 redesign
//! note; `alertd::Scheduler`'s `tasks` map is the shape this generalizes).

use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};

use crate::share::ShareGateway;

/// Registers and drains background archive moves. Cloning shares the same
/// underlying task list, so a handle can be passed down to wherever a move
/// is scheduled from.
#[derive(Clone)]
pub struct ArchiveRegistry {
	tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Default for ArchiveRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl ArchiveRegistry {
	pub fn new() -> Self {
		Self {
			tasks: Arc::new(Mutex::new(Vec::new())),
		}
	}

	/// Schedule `src -> dst` as a background move and return immediately.
	/// Failures are logged; the next run will re-derive archival need from
	/// the share and control table (spec §9 open question).
	pub async fn schedule_move(&self, gateway: Arc<ShareGateway>, src: String, dst: String) {
		let handle = tokio::spawn(async move {
			if let Err(err) = gateway.move_to_archive(&src, &dst).await {
				warn!(%err, src, dst, "background archive move failed");
			} else {
				debug!(src, dst, "archived");
			}
		});

		let mut tasks = self.tasks.lock().await;
		tasks.retain(|h| !h.is_finished());
		tasks.push(handle);
	}

	/// Wait up to `timeout` for in-flight moves to finish, then abort
	/// whatever remains (spec §4.6's "shutdown drains the registry with a
	/// bounded wait").
	pub async fn shutdown(&self, timeout: Duration) {
		let mut tasks = self.tasks.lock().await;
		let pending = std::mem::take(&mut *tasks);
		debug!(count = pending.len(), "draining archive registry");

		let handles: Vec<JoinHandle<()>> = pending;
		let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

		let joined = tokio::time::timeout(timeout, futures::future::join_all(handles)).await;
		if joined.is_err() {
			warn!("archive registry drain timed out; aborting remaining moves");
			for handle in abort_handles {
				handle.abort();
			}
		}
	}

	#[cfg(test)]
	pub async fn pending_count(&self) -> usize {
		self.tasks.lock().await.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{config::Config, share::gateway::testing::FakeBackend};

	fn test_config() -> Config {
		crate::test_support::test_config()
	}

	#[tokio::test]
	async fn schedule_move_runs_and_archives() {
		let backend = FakeBackend::new().with_file("/share/in/r/a.xlsx", 10, None, None);
		let gateway = Arc::new(ShareGateway::new(Box::new(backend), &test_config()));
		let registry = ArchiveRegistry::new();

		registry
			.schedule_move(
				gateway.clone(),
				"/share/in/r/a.xlsx".to_string(),
				"/share/archive/r/a.xlsx".to_string(),
			)
			.await;

		registry.shutdown(Duration::from_secs(1)).await;
		assert_eq!(registry.pending_count().await, 0);
	}
}
