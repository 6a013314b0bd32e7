//! Limiter configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use gatekeep_types::prelude::*;

/// Token bucket parameters for one visitor class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
	/// Time to refill one token. Zero means tokens refill instantly.
	pub interval_ms: u64,
	pub burst: u32,
	/// Maximum number of concurrently delayed requests, 0 is unlimited
	#[serde(default)]
	pub max_delayed: u32,
}

impl Rate {
	pub const fn new(interval: Duration, burst: u32, max_delayed: u32) -> Self {
		Self { interval_ms: interval.as_millis() as u64, burst, max_delayed }
	}

	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval_ms)
	}
}

/// Known bad bots get one request per hour
pub const BAD_BOT_RATE: Rate = Rate::new(Duration::from_secs(3600), 1, 1);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
	pub user: Rate,
	/// Defaults to the user rate
	#[serde(default)]
	pub good_bot: Option<Rate>,
	/// Process-wide bucket of the resource, only ever delays
	#[serde(default)]
	pub global: Option<Rate>,
}

impl LimiterConfig {
	pub fn new(user: Rate) -> Self {
		Self { user, good_bot: None, global: None }
	}

	pub fn with_good_bot(mut self, rate: Rate) -> Self {
		self.good_bot = Some(rate);
		self
	}

	pub fn with_global(mut self, rate: Rate) -> Self {
		self.global = Some(rate);
		self
	}

	pub fn good_bot_rate(&self) -> Rate {
		self.good_bot.unwrap_or(self.user)
	}

	pub fn validate(&self) -> GkResult<()> {
		if self.user.burst == 0 {
			return Err(Error::ConfigError("limiter: user burst must be greater than 0".into()));
		}
		if self.good_bot.is_some_and(|rate| rate.burst == 0) {
			return Err(Error::ConfigError("limiter: good bot burst must be greater than 0".into()));
		}
		Ok(())
	}
}


// vim: ts=4
