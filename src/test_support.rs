//! Shared fixtures for unit and integration tests.

#![cfg(any(test, feature = "test-support"))]

use crate::{config::Config, share::StabilityPolicy};

pub fn test_config() -> Config {
	Config {
		smb_source_root: "/share/in".to_string(),
		smb_archive_root: "/share/archive".to_string(),
		smb_username: "u".to_string(),
		smb_password: "p".to_string(),
		stability_policy: StabilityPolicy::MinAge { min_age_s: 60 },
		foi_api_url: "http://foi/{remitter}".to_string(),
		itm_api_url: "http://itm".to_string(),
		itm_consumer_type: "ct".to_string(),
		itm_source_system: "ss".to_string(),
		iqube_api_url: "http://iqube".to_string(),
		database_url: "postgresql://localhost/test".to_string(),
		is_local_env: true,
		failpoints_enabled: false,
		listen: vec![],
		concurrency: 4,
		ignore_suffixes: crate::config::DEFAULT_IGNORE_SUFFIXES
			.iter()
			.map(|s| s.to_string())
			.collect(),
	}
}
