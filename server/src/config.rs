//! Server configuration

use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gatekeep_auth::AuthConfig;
use gatekeep_limiter::{LimiterConfig, Rate, ServerMode};
use gatekeep_types::prelude::*;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "GATEKEEP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./config/gatekeep.json";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Features {
	pub enable_registration: bool,
	pub enable_limiters: bool,
}

impl Default for Features {
	fn default() -> Self {
		Self { enable_registration: false, enable_limiters: true }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct BadBot {
	pub ip: IpAddr,
	pub name: Box<str>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
	pub environment: Box<str>,
	pub listen: Box<str>,
	pub mode: ServerMode,
	pub db_dir: PathBuf,
	pub features: Features,
	pub api_limiter: LimiterConfig,
	pub auth: AuthConfig,
	pub bad_bots: Vec<BadBot>,
	/// Seconds between limiter sweeps
	pub sweep_period: u64,
	/// Seconds of inactivity before a visitor is swept
	pub sweep_stale: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			environment: "development".into(),
			listen: "127.0.0.1:8080".into(),
			mode: ServerMode::Standalone,
			db_dir: PathBuf::from("./data"),
			features: Features::default(),
			api_limiter: LimiterConfig::new(Rate::new(Duration::from_millis(500), 3, 2))
				.with_good_bot(Rate::new(Duration::from_millis(50), 4, 0)),
			auth: AuthConfig::default(),
			bad_bots: Vec::new(),
			sweep_period: gatekeep_limiter::registry::SWEEP_PERIOD.as_secs(),
			sweep_stale: gatekeep_limiter::registry::SWEEP_STALE.as_secs(),
		}
	}
}

impl Config {
	/// Parses a JSON config, missing fields take their defaults
	pub fn parse(json: &str) -> GkResult<Self> {
		let mut config: Config =
			serde_json::from_str(json).map_err(|err| Error::ConfigError(format!("config: {}", err)))?;
		config.auth.enable_registration = config.features.enable_registration;
		config.validate()?;
		Ok(config)
	}

	pub async fn load(path: &Path) -> GkResult<Self> {
		let json = tokio::fs::read_to_string(path)
			.await
			.map_err(|err| Error::ConfigError(format!("cannot read {}: {}", path.display(), err)))?;
		Self::parse(&json)
	}

	/// Path from [`CONFIG_ENV`] or the default
	pub fn path_from_env() -> PathBuf {
		std::env::var_os(CONFIG_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
	}

	pub fn validate(&self) -> GkResult<()> {
		self.api_limiter.validate()?;
		self.auth.validate()?;
		if self.sweep_period == 0 || self.sweep_stale == 0 {
			return Err(Error::ConfigError("config: sweep intervals must be positive".into()));
		}
		Ok(())
	}

	pub fn sweep_period(&self) -> Duration {
		Duration::from_secs(self.sweep_period)
	}

	pub fn sweep_stale(&self) -> Duration {
		Duration::from_secs(self.sweep_stale)
	}

	pub fn is_production(&self) -> bool {
		&*self.environment == "production"
	}
}


// vim: ts=4
