//! Auth configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use gatekeep_limiter::{LimiterConfig, Rate};
use gatekeep_types::prelude::*;

use crate::password::COST_RANGE;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
	/// Token issuer, checked on every decode
	pub issuer: Box<str>,
	/// JSON file holding the signing key, encryption key and pepper
	pub secret_path: PathBuf,
	/// Access token lifetime in seconds
	pub access_expire: i64,
	/// Refresh and session token lifetime in seconds
	pub refresh_expire: i64,
	/// Where unauthenticated visitors of guarded routes are sent
	pub signin_path: Box<str>,
	pub enable_registration: bool,
	/// bcrypt work factor
	pub hash_cost: u32,
	/// Limiter wrapping the auth endpoints
	pub limiter: LimiterConfig,
}

impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			issuer: "gatekeep".into(),
			secret_path: PathBuf::from("./secrets/auth.json"),
			access_expire: 5 * 60,
			refresh_expire: 30 * 24 * 3600,
			signin_path: "/signin/".into(),
			enable_registration: false,
			hash_cost: 10,
			limiter: LimiterConfig::new(Rate::new(Duration::from_secs(10), 4, 2))
				.with_global(Rate::new(Duration::from_millis(50), 4, 0)),
		}
	}
}

impl AuthConfig {
	pub fn validate(&self) -> GkResult<()> {
		if self.access_expire <= 0 || self.refresh_expire < self.access_expire {
			return Err(Error::ConfigError(
				"auth: refresh_expire must not be shorter than access_expire".into(),
			));
		}
		if !COST_RANGE.contains(&self.hash_cost) {
			return Err(Error::ConfigError(format!(
				"auth: hash_cost must be between {} and {}",
				COST_RANGE.start(),
				COST_RANGE.end()
			)));
		}
		self.limiter.validate()
	}
}


// vim: ts=4
