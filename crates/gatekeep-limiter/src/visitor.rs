//! Per-address admission state

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::bucket::TokenBucket;
use crate::config::Rate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VisitorKind {
	User,
	GoodBot,
	BadBot,
}

impl VisitorKind {
	pub fn as_str(self) -> &'static str {
		match self {
			VisitorKind::User => "user",
			VisitorKind::GoodBot => "goodBot",
			VisitorKind::BadBot => "badBot",
		}
	}
}

#[derive(Debug)]
struct VisitorState {
	bucket: TokenBucket,
	last_seen: Instant,
}

/// Admission state of one address in one limiter.
///
/// Classification and rate are fixed for the lifetime of the entry. A
/// reclassification replaces the entry.
#[derive(Debug)]
pub struct Visitor {
	pub kind: VisitorKind,
	/// Bot name for classified bots
	pub bot_name: Option<Box<str>>,
	pub max_delayed: u32,
	pub first_seen: Instant,
	/// Bucket and last seen time, always updated together
	state: Mutex<VisitorState>,
	/// Number of delayed requests over the lifetime of the entry
	delay_count: AtomicU64,
	/// Number of requests currently waiting out a delay
	curr_delays: AtomicU32,
}

impl Visitor {
	pub fn new(kind: VisitorKind, bot_name: Option<Box<str>>, rate: &Rate) -> Self {
		let now = Instant::now();
		Self {
			kind,
			bot_name,
			max_delayed: rate.max_delayed,
			first_seen: now,
			state: Mutex::new(VisitorState { bucket: TokenBucket::new(rate, now), last_seen: now }),
			delay_count: AtomicU64::new(0),
			curr_delays: AtomicU32::new(0),
		}
	}

	/// Reserves a token and marks the visitor as seen
	pub fn reserve(&self) -> Duration {
		let now = Instant::now();
		let mut state = self.state.lock();
		state.last_seen = now;
		state.bucket.reserve(now)
	}

	pub fn cancel(&self) {
		self.state.lock().bucket.cancel(Instant::now());
	}

	pub fn last_seen(&self) -> Instant {
		self.state.lock().last_seen
	}

	/// Registers a delayed request. Returns `None` (and registers nothing) if
	/// the visitor already has more than `max_delayed` requests waiting.
	pub fn enter_delay(&self) -> Option<DelayGuard<'_>> {
		let curr = self.curr_delays.fetch_add(1, Ordering::AcqRel) + 1;
		if self.max_delayed > 0 && curr > self.max_delayed {
			self.curr_delays.fetch_sub(1, Ordering::AcqRel);
			return None;
		}
		self.delay_count.fetch_add(1, Ordering::Relaxed);
		Some(DelayGuard { visitor: self })
	}

	pub fn delay_count(&self) -> u64 {
		self.delay_count.load(Ordering::Relaxed)
	}

	pub fn curr_delays(&self) -> u32 {
		self.curr_delays.load(Ordering::Acquire)
	}
}

/// Keeps a delayed request counted until dropped
#[derive(Debug)]
pub struct DelayGuard<'a> {
	visitor: &'a Visitor,
}

impl Drop for DelayGuard<'_> {
	fn drop(&mut self) {
		self.visitor.curr_delays.fetch_sub(1, Ordering::AcqRel);
	}
}


// vim: ts=4
