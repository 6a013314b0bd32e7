//! Authentication
//!
//! Sign-in issues an access, a refresh and a session token (see [`token`]).
//! Guarded routes accept a valid access token or transparently rotate all
//! three from a valid refresh token, re-reading the scope from the database.
//! Passwords are stored bcrypt hashed, obfuscated and encrypted (see
//! [`password`]).

pub mod cleanup;
pub mod config;
pub mod guard;
pub mod handler;
pub mod password;
pub mod secrets;
pub mod session;
pub mod token;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use gatekeep_limiter::{AdmissionRegistry, Limiter};
use gatekeep_types::auth_adapter::AuthAdapter;
use gatekeep_types::background::Background;
use gatekeep_types::prelude::*;
use gatekeep_types::worker::WorkerPool;

pub use config::AuthConfig;
pub use guard::{Authenticated, RequireScope};
pub use handler::routes;
pub use secrets::Secrets;
pub use session::RegisterError;
pub use token::{Claims, TokenKind};

/// Period of the expired session purge
pub const PURGE_PERIOD: Duration = Duration::from_secs(3600);

pub struct Auth {
	config: AuthConfig,
	keys: token::TokenKeys,
	password: password::PasswordCodec,
	adapter: Arc<dyn AuthAdapter>,
	worker: Arc<WorkerPool>,
	tasks: Background,
	limiter: Arc<Limiter>,
}

impl std::fmt::Debug for Auth {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Auth").field("config", &self.config).finish_non_exhaustive()
	}
}

impl Auth {
	/// Creates the auth service and its dedicated "auth" limiter
	pub fn new(
		config: AuthConfig,
		secrets: &Secrets,
		adapter: Arc<dyn AuthAdapter>,
		worker: Arc<WorkerPool>,
		tasks: Background,
		registry: &Arc<AdmissionRegistry>,
	) -> GkResult<Arc<Self>> {
		config.validate()?;
		let limiter = Limiter::new("auth", &config.limiter, registry)?;

		Ok(Arc::new(Self {
			keys: token::TokenKeys::new(secrets.jwt_key.as_bytes(), &config.issuer),
			password: password::PasswordCodec::new(&secrets.enc_key, &secrets.pepper, config.hash_cost),
			config,
			adapter,
			worker,
			tasks,
			limiter,
		}))
	}

	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	pub fn limiter(&self) -> &Arc<Limiter> {
		&self.limiter
	}

	/// Guard layer admitting only callers with `scope`
	pub fn require(self: &Arc<Self>, scope: &'static str) -> RequireScope {
		RequireScope::new(Arc::clone(self), scope)
	}

	/// Starts the hourly purge of expired sessions
	pub fn start_purge(&self) {
		let task = cleanup::SessionPurgeTask::new(Arc::clone(&self.adapter));
		self.tasks.spawn_periodic(Arc::new(task), PURGE_PERIOD);
	}

	/// Encodes a password for storage
	pub async fn hash_password(&self, password: &str) -> GkResult<String> {
		password::generate(&self.worker, &self.password, password).await
	}
}

// vim: ts=4
