use std::sync::Arc;

use clap::Parser;
use coordinatord::{
	config::{Args, Config},
	control_store::ControlStore,
	coordinator::Coordinator,
	http_server,
	metrics,
	share::{ShareGateway, SmbBackend},
};
use miette::{Result, WrapErr};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn setup_logging() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coordinatord=info")))
		.init();
}

#[tokio::main]
async fn main() -> Result<()> {
	setup_logging();

	let args = Args::parse();
	debug!(?args, "parsed arguments");
	let jwt_secret_file = args.jwt_secret_file.clone();
	let config = Config::from_args(args)?;
	let jwt_secret = Config::load_jwt_secret(&jwt_secret_file).wrap_err("loading JWT secret")?;

	metrics::init_metrics();

	let pool = coordinator_postgres::pool::create_pool(&config.database_url, "coordinatord")
		.await
		.wrap_err("connecting to control store")?;
	{
		let conn = pool.get().await.wrap_err("borrowing setup connection")?;
		coordinator_postgres::pool::run_ddl(&conn)
			.await
			.wrap_err("applying control-store schema")?;
	}
	let control = ControlStore::new(pool);

	let backend = SmbBackend::new(config.smb_username.clone(), config.smb_password.clone());
	let gateway = Arc::new(ShareGateway::new(Box::new(backend), &config));

	let listen = config.listen.clone();
	let coordinator = Arc::new(Coordinator::new(config.clone(), gateway, control, &jwt_secret));

	info!("starting run coordinator");
	http_server::start_server(Arc::new(config), coordinator, Arc::from(jwt_secret.as_str()), listen).await;

	Ok(())
}
