use std::time::Duration;

use miette::{IntoDiagnostic, Result, WrapErr, miette};
use mobc::{Connection, Pool};
use mobc_postgres::{PgConnectionManager, tokio_postgres};
use tokio_postgres::{Client, NoTls};
use tracing::debug;

pub type PgConnection = Connection<PgConnectionManager<NoTls>>;

/// A pooled connection to the control-store database.
///
/// Wraps `mobc`'s generic pool with the single manager type the coordinator
/// needs. No TLS negotiation or Unix-socket autodetection: the control store
/// is expected to be reached over a plain `DATABASE_URL`, unlike the
/// operator-facing `psql`-style tools this pool is grounded on.
#[derive(Clone)]
pub struct PgPool {
	inner: Pool<PgConnectionManager<NoTls>>,
}

impl PgPool {
	/// Borrow a connection from the pool, waiting for the pool's configured
	/// timeout if none is immediately available.
	pub async fn get(&self) -> Result<PgConnection> {
		self.inner
			.get()
			.await
			.into_diagnostic()
			.wrap_err("getting a connection from the pool")
	}

	/// Borrow a connection, waiting at most `duration` instead of the pool's
	/// default timeout.
	pub async fn get_timeout(&self, duration: Duration) -> Result<PgConnection> {
		self.inner
			.get_timeout(duration)
			.await
			.into_diagnostic()
			.wrap_err("getting a connection from the pool")
	}
}

/// Create a connection pool from a `postgresql://` URL and run a smoke-test
/// query before returning, so that a misconfigured `DATABASE_URL` fails
/// fast at startup rather than on the first real claim attempt.
pub async fn create_pool(url: &str, application_name: &str) -> Result<PgPool> {
	let mut config: tokio_postgres::Config =
		url.parse().into_diagnostic().wrap_err("parsing DATABASE_URL")?;
	config.application_name(application_name);

	debug!(application_name, "creating postgres connection manager");
	let manager = PgConnectionManager::new(config, NoTls);

	let pool = Pool::builder()
		.max_lifetime(Some(Duration::from_secs(3600)))
		.build(manager);

	let pool = PgPool { inner: pool };
	check_pool(&pool).await?;
	Ok(pool)
}

/// Build a pool without the connectivity smoke test. `mobc` pools are lazy
/// — no connection is opened until the first `get` — so this is safe to use
/// in tests that never touch the database.
#[cfg(any(test, feature = "test-support"))]
pub fn lazy(url: &str, application_name: &str) -> Result<PgPool> {
	let mut config: tokio_postgres::Config =
		url.parse().into_diagnostic().wrap_err("parsing DATABASE_URL")?;
	config.application_name(application_name);
	let manager = PgConnectionManager::new(config, NoTls);
	let pool = Pool::builder()
		.max_lifetime(Some(Duration::from_secs(3600)))
		.build(manager);
	Ok(PgPool { inner: pool })
}

async fn check_pool(pool: &PgPool) -> Result<()> {
	let conn = pool.get().await.wrap_err("checking connection")?;
	conn.simple_query("SELECT 1")
		.await
		.into_diagnostic()
		.wrap_err("checking connection")?;
	Ok(())
}

/// Schema used by the coordinator's control store, applied idempotently at
/// startup rather than via a separate migration tool.
pub const CONTROL_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS coordinator_control (
	record_id TEXT PRIMARY KEY,
	file_name TEXT NOT NULL UNIQUE,
	status TEXT NOT NULL,
	message TEXT,
	attempt_no INT NOT NULL DEFAULT 1,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

pub async fn run_ddl(client: &Client) -> Result<()> {
	client
		.batch_execute(CONTROL_TABLE_DDL)
		.await
		.into_diagnostic()
		.wrap_err("applying control-store DDL")?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn rejects_unparseable_url() {
		let result = create_pool("not a url", "test").await;
		assert!(result.is_err());
	}
}
