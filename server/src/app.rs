//! App state and lifecycle

use std::net::SocketAddr;
use std::sync::Arc;

use gatekeep_auth::{Auth, Secrets};
use gatekeep_auth_adapter_sqlite::AuthAdapterSqlite;
use gatekeep_limiter::{AdmissionRegistry, BotResolver, HickoryBotResolver, Limiter};
use gatekeep_types::auth_adapter::AuthAdapter;
use gatekeep_types::background::Background;
use gatekeep_types::prelude::*;
use gatekeep_types::worker::WorkerPool;

use crate::config::Config;
use crate::{VERSION, routes};

pub struct App {
	pub config: Config,
	pub registry: Arc<AdmissionRegistry>,
	pub api_limiter: Arc<Limiter>,
	pub auth: Arc<Auth>,
	pub worker: Arc<WorkerPool>,
	pub tasks: Background,
}

impl std::fmt::Debug for App {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("App").field("config", &self.config).finish_non_exhaustive()
	}
}

/// External collaborators of the app
pub struct Adapters {
	pub auth_adapter: Arc<dyn AuthAdapter>,
	pub resolver: Arc<dyn BotResolver>,
}

impl App {
	/// Wires limiters and auth. Background jobs are not started yet.
	pub fn new(config: Config, secrets: &Secrets, adapters: Adapters) -> GkResult<Arc<Self>> {
		let tasks = Background::new();
		let worker = Arc::new(WorkerPool::default());
		let registry = AdmissionRegistry::new(adapters.resolver, tasks.clone());

		for bot in &config.bad_bots {
			registry.add_bad_bot(bot.ip, &bot.name);
		}

		let api_limiter = Limiter::new("api", &config.api_limiter, &registry)?;
		let auth = Auth::new(
			config.auth.clone(),
			secrets,
			adapters.auth_adapter,
			worker.clone(),
			tasks.clone(),
			&registry,
		)?;

		Ok(Arc::new(Self { config, registry, api_limiter, auth, worker, tasks }))
	}

	/// Starts the limiter sweep and the session purge
	pub fn start_background(&self) {
		self.registry.start_sweeper(self.config.sweep_period(), self.config.sweep_stale());
		self.auth.start_purge();
	}

	pub fn router(self: &Arc<Self>) -> axum::Router {
		routes::init(self)
	}

	/// Serves until Ctrl-C or SIGTERM, then drains background work
	pub async fn serve(self: Arc<Self>) -> GkResult<()> {
		let listener = tokio::net::TcpListener::bind(&*self.config.listen).await?;
		info!("Listening on {} ({:?} mode)", self.config.listen, self.config.mode);

		self.start_background();
		axum::serve(listener, self.router().into_make_service_with_connect_info::<SocketAddr>())
			.with_graceful_shutdown(shutdown_signal())
			.await?;

		info!("Shutting down background tasks...");
		self.tasks.shutdown().await;
		info!("Bye");
		Ok(())
	}
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			error!("cannot listen for Ctrl-C: {}", err);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				error!("cannot listen for SIGTERM: {}", err);
				std::future::pending::<()>().await;
			}
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
	info!("Shutdown signal received");
}

/// Sets up logging from `RUST_LOG`, `info` by default
pub fn init_tracing() {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Loads configuration and secrets, opens storage and runs the server
pub async fn run(config: Config) -> GkResult<()> {
	info!("gatekeep V{} ({})", VERSION, config.environment);

	let secrets = Secrets::load(&config.auth.secret_path).await?;
	let auth_adapter = Arc::new(AuthAdapterSqlite::new(&config.db_dir).await?);
	let resolver = Arc::new(HickoryBotResolver::from_system_conf());

	let app = App::new(config, &secrets, Adapters { auth_adapter, resolver })?;
	drop(secrets);
	app.serve().await
}

// vim: ts=4
