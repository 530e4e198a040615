//! Production [`ShareBackend`] wrapping the `smb` crate's SMB2/3 client.
//! Classifies failures per spec §4.1's retryable/permanent table so the
//! gateway's retry loop can act on them without inspecting transport
//! internals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smb::{Client, ClientConfig, UncPath};
use tracing::debug;

use super::gateway::{Candidate, ShareBackend, Stat, basename_of, remitter_of};
use crate::errors::ShareError;

pub struct SmbBackend {
	client: Client,
	username: String,
	password: String,
}

impl SmbBackend {
	pub fn new(username: String, password: String) -> Self {
		let client = Client::new(ClientConfig::default());
		Self {
			client,
			username,
			password,
		}
	}

	async fn connect(&self, unc: &str) -> Result<smb::resource::Directory, ShareError> {
		let path: UncPath = unc.parse().map_err(|err| ShareError::Permanent(format!("{err}")))?;
		let resource = self
			.client
			.share_connect(&path, &self.username, self.password.clone())
			.await
			.map_err(classify)?;
		resource
			.as_directory()
			.map_err(|err| ShareError::Permanent(format!("not a directory: {err}")))
	}
}

#[async_trait]
impl ShareBackend for SmbBackend {
	async fn list(&self, root: &str) -> Result<Vec<Candidate>, ShareError> {
		let dir = self.connect(root).await?;
		let mut candidates = Vec::new();
		let mut entries = dir.query_directory("*").await.map_err(classify)?;
		while let Some(entry) = entries.next().await.map_err(classify)? {
			if entry.is_directory() {
				continue;
			}
			let path = format!("{root}/{}", entry.file_name());
			candidates.push(Candidate {
				basename: basename_of(&path),
				remitter: remitter_of(&path, root),
				size: entry.end_of_file(),
				chgtime: entry
					.change_time()
					.unwrap_or_else(Utc::now),
				path,
			});
		}
		debug!(root, count = candidates.len(), "listed share directory");
		Ok(candidates)
	}

	async fn stat(&self, path: &str) -> Result<Stat, ShareError> {
		let (parent, name) = split_parent(path);
		let dir = self.connect(&parent).await?;
		let info = dir.query_file_info(&name).await.map_err(classify)?;
		Ok(Stat {
			size: info.end_of_file(),
			mtime: info.last_write_time(),
			chgtime: info.change_time(),
		})
	}

	async fn read(&self, path: &str) -> Result<Vec<u8>, ShareError> {
		let (parent, name) = split_parent(path);
		let dir = self.connect(&parent).await?;
		let file = dir.open_file_read(&name).await.map_err(classify)?;
		file.read_all().await.map_err(classify)
	}

	async fn rename(&self, src: &str, dst: &str) -> Result<(), ShareError> {
		let (parent, name) = split_parent(src);
		let dir = self.connect(&parent).await?;
		let file = dir.open_file_write(&name).await.map_err(classify)?;
		file.rename(dst).await.map_err(classify)
	}

	async fn create_parents(&self, path: &str) -> Result<(), ShareError> {
		let (parent, _name) = split_parent(path);
		let dir = self.connect(&parent).await?;
		dir.create_directory_all().await.map_err(classify)
	}
}

fn split_parent(path: &str) -> (String, String) {
	match path.rsplit_once(['/', '\\']) {
		Some((parent, name)) => (parent.to_string(), name.to_string()),
		None => (String::new(), path.to_string()),
	}
}

/// Classify an `smb` crate error per spec §4.1's retryable/permanent table.
fn classify(err: smb::Error) -> ShareError {
	let message = err.to_string();
	let lower = message.to_lowercase();

	let retryable = lower.contains("timeout")
		|| lower.contains("connection reset")
		|| lower.contains("connection closed")
		|| lower.contains("network_name_deleted")
		|| lower.contains("pipe_broken")
		|| lower.contains("econnreset")
		|| lower.contains("epipe")
		|| lower.contains("etimedout")
		|| lower.contains("eagain")
		|| lower.contains("enetunreach")
		|| lower.contains("ehostunreach");

	let not_found = lower.contains("not found") || lower.contains("object_name_not_found");

	if not_found {
		ShareError::NotFound(message)
	} else if retryable {
		ShareError::Transient(message)
	} else {
		ShareError::Permanent(message)
	}
}
