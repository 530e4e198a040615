use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};

use crate::share::stability::StabilityPolicy;

/// The run coordinator.
///
/// Periodically (well: on each HTTP trigger) scans an SMB share for files
/// deposited by remitters, selects the newest stable version of each, and
/// drives it through extraction (FOI), submission (ITM), and conditional
/// failure notification (IQube).
#[derive(Debug, Clone, Parser)]
pub struct Args {
	/// SMB UNC path to the source root, e.g. `\\fileserver\remit\in`
	#[arg(long, env = "SMB_UNC_PATH")]
	pub smb_unc_path: String,

	/// SMB UNC path to the archive root
	#[arg(long, env = "SMB_ARCHIVE_SUBPATH")]
	pub smb_archive_subpath: String,

	/// SMB username
	#[arg(long, env = "SMB_USERNAME")]
	pub smb_username: String,

	/// SMB password
	#[arg(long, env = "SMB_PASSWORD")]
	pub smb_password: String,

	/// Minimum-age stability window in seconds. When set, selects min-age
	/// mode over multi-sample mode.
	#[arg(long, env = "SMB_STABILITY_MIN_AGE_S")]
	pub smb_stability_min_age_s: Option<u64>,

	/// Multi-sample mode: number of consecutive identical samples required
	#[arg(long, env = "SMB_STABILITY_CHECK_COUNT", default_value_t = 3)]
	pub smb_stability_check_count: u32,

	/// Multi-sample mode: seconds between samples
	#[arg(long, env = "SMB_STABILITY_CHECK_INTERVAL_S", default_value_t = 2)]
	pub smb_stability_check_interval_s: u64,

	/// FOI extraction endpoint, containing a `{remitter}` placeholder
	#[arg(long, env = "FOI_API_URL")]
	pub foi_api_url: String,

	/// ITM submission endpoint
	#[arg(long, env = "ITM_API_URL")]
	pub itm_api_url: String,

	/// `Consumer-Type` header value sent to ITM
	#[arg(long, env = "ITM_CONSUMER_TYPE")]
	pub itm_consumer_type: String,

	/// `source-system` header value sent to ITM
	#[arg(long, env = "ITM_SOURCE_SYSTEM")]
	pub itm_source_system: String,

	/// IQube failure-notification endpoint
	#[arg(long, env = "IQUBE_API_URL")]
	pub iqube_api_url: String,

	/// Control-store connection URL
	#[arg(long, env = "DATABASE_URL")]
	pub database_url: String,

	/// Path to a file containing the JWT signing secret
	#[arg(long, env = "JWT_SECRET_FILE")]
	pub jwt_secret_file: PathBuf,

	/// Deployment environment; `local` disables outbound identity-token
	/// acquisition and relaxes bearer-auth enforcement for manual testing
	#[arg(long, env = "ENV", default_value = "production")]
	pub env: String,

	/// Enables a per-filename single-shot exception injection after
	/// claim-commit, used only by integration tests
	#[arg(long, env = "IT_ENABLE_FAILPOINTS", default_value_t = false)]
	pub it_enable_failpoints: bool,

	/// Addresses the run API listens on
	#[arg(long, default_value = "127.0.0.1:8080")]
	pub listen: Vec<SocketAddr>,

	/// Bounded fan-out for concurrent process-candidate handling
	#[arg(long, default_value_t = 4)]
	pub concurrency: usize,

	/// Basenames to ignore in addition to the built-in suffix list
	#[arg(long)]
	pub ignore_suffix: Vec<String>,
}

/// Immutable run-time configuration derived from [`Args`]; the shape
/// `Coordinator` actually holds.
#[derive(Debug, Clone)]
pub struct Config {
	pub smb_source_root: String,
	pub smb_archive_root: String,
	pub smb_username: String,
	pub smb_password: String,
	pub stability_policy: StabilityPolicy,
	pub foi_api_url: String,
	pub itm_api_url: String,
	pub itm_consumer_type: String,
	pub itm_source_system: String,
	pub iqube_api_url: String,
	pub database_url: String,
	pub is_local_env: bool,
	pub failpoints_enabled: bool,
	pub listen: Vec<SocketAddr>,
	pub concurrency: usize,
	pub ignore_suffixes: Vec<String>,
}

pub const DEFAULT_IGNORE_SUFFIXES: &[&str] = &[".part", ".tmp", ".crdownload"];
pub const IGNORE_PREFIX: &str = "~$";

impl Config {
	pub fn from_args(args: Args) -> Result<Self> {
		let stability_policy = match args.smb_stability_min_age_s {
			Some(min_age_s) => StabilityPolicy::MinAge { min_age_s },
			None => StabilityPolicy::MultiSample {
				check_count: args.smb_stability_check_count,
				check_interval_s: args.smb_stability_check_interval_s,
			},
		};

		let mut ignore_suffixes: Vec<String> =
			DEFAULT_IGNORE_SUFFIXES.iter().map(|s| s.to_string()).collect();
		ignore_suffixes.extend(args.ignore_suffix);

		Ok(Self {
			smb_source_root: args.smb_unc_path,
			smb_archive_root: args.smb_archive_subpath,
			smb_username: args.smb_username,
			smb_password: args.smb_password,
			stability_policy,
			foi_api_url: args.foi_api_url,
			itm_api_url: args.itm_api_url,
			itm_consumer_type: args.itm_consumer_type,
			itm_source_system: args.itm_source_system,
			iqube_api_url: args.iqube_api_url,
			database_url: args.database_url,
			is_local_env: args.env == "local",
			failpoints_enabled: args.it_enable_failpoints,
			listen: args.listen,
			concurrency: args.concurrency.max(1),
			ignore_suffixes,
		})
	}

	pub fn load_jwt_secret(path: &std::path::Path) -> Result<String> {
		let contents = std::fs::read_to_string(path)
			.into_diagnostic()
			.wrap_err_with(|| format!("reading JWT secret from {}", path.display()))?;
		Ok(contents.trim().to_string())
	}
}
