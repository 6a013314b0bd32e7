//! Token bucket with reservations
//!
//! A reservation always succeeds and returns how long the caller has to wait
//! before its token is available. The token count may go negative, which
//! queues later callers behind earlier ones. A cancelled reservation puts its
//! token back.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::Rate;

#[derive(Debug)]
pub struct TokenBucket {
	interval: Duration,
	burst: f64,
	tokens: f64,
	last: Instant,
}

impl TokenBucket {
	/// Full bucket
	pub fn new(rate: &Rate, now: Instant) -> Self {
		let burst = f64::from(rate.burst);
		Self { interval: rate.interval(), burst, tokens: burst, last: now }
	}

	fn refill(&mut self, now: Instant) {
		if now <= self.last {
			return;
		}
		if self.interval.is_zero() {
			self.tokens = self.burst;
		} else {
			let elapsed = now.duration_since(self.last).as_secs_f64();
			self.tokens = (self.tokens + elapsed / self.interval.as_secs_f64()).min(self.burst);
		}
		self.last = now;
	}

	/// Takes one token, returns the delay until it is available
	pub fn reserve(&mut self, now: Instant) -> Duration {
		self.refill(now);
		if self.interval.is_zero() && self.burst > 0.0 {
			return Duration::ZERO;
		}
		self.tokens -= 1.0;
		if self.tokens >= 0.0 {
			Duration::ZERO
		} else {
			self.interval.mul_f64(-self.tokens)
		}
	}

	/// Returns the token taken by a reservation that will not be used
	pub fn cancel(&mut self, now: Instant) {
		self.refill(now);
		self.tokens = (self.tokens + 1.0).min(self.burst);
	}

	pub fn tokens(&mut self, now: Instant) -> f64 {
		self.refill(now);
		self.tokens
	}
}


// vim: ts=4
