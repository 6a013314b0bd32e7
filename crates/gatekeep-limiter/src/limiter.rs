//! Per-resource admission control

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{BAD_BOT_RATE, LimiterConfig, Rate};
use crate::error::LimitError;
use crate::registry::AdmissionRegistry;
use crate::visitor::{Visitor, VisitorKind};
use gatekeep_tracker::TrackingInfo;
use gatekeep_types::prelude::*;

/// Outcome of an admitted request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admission {
	pub kind: VisitorKind,
	/// Display name for logging
	pub label: Box<str>,
	/// Time spent waiting for the visitor bucket
	pub delay: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterStats {
	pub name: Box<str>,
	pub visitors: usize,
	pub good_bots: usize,
	pub bad_bots: usize,
	pub delayed: u64,
	pub waiting: u32,
}

pub struct Limiter {
	name: Box<str>,
	user_rate: Rate,
	good_bot_rate: Rate,
	global: Option<DefaultDirectRateLimiter>,
	visitors: RwLock<HashMap<IpAddr, Arc<Visitor>>>,
	registry: Arc<AdmissionRegistry>,
}

impl std::fmt::Debug for Limiter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Limiter")
			.field("name", &self.name)
			.field("user_rate", &self.user_rate)
			.field("good_bot_rate", &self.good_bot_rate)
			.field("global", &self.global.is_some())
			.finish_non_exhaustive()
	}
}

fn global_limiter(rate: &Rate) -> Option<DefaultDirectRateLimiter> {
	let burst = NonZeroU32::new(rate.burst)?;
	// Zero interval means no limit at all
	let quota = Quota::with_period(rate.interval())?.allow_burst(burst);
	Some(RateLimiter::direct(quota))
}

impl Limiter {
	/// Creates a limiter and registers it with `registry`
	pub fn new(
		name: &str,
		config: &LimiterConfig,
		registry: &Arc<AdmissionRegistry>,
	) -> GkResult<Arc<Self>> {
		config.validate()?;

		let limiter = Arc::new(Self {
			name: name.into(),
			user_rate: config.user,
			good_bot_rate: config.good_bot_rate(),
			global: config.global.as_ref().and_then(global_limiter),
			visitors: RwLock::new(HashMap::new()),
			registry: Arc::clone(registry),
		});
		registry.register(&limiter);
		info!(
			"limiter: {}: user {:?}, good bot {:?}, global {:?}",
			name, limiter.user_rate, limiter.good_bot_rate, config.global
		);

		Ok(limiter)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn registry(&self) -> &Arc<AdmissionRegistry> {
		&self.registry
	}

	fn create_visitor(&self, kind: VisitorKind, bot_name: Option<Box<str>>) -> Visitor {
		let rate = match kind {
			VisitorKind::User => &self.user_rate,
			VisitorKind::GoodBot => &self.good_bot_rate,
			VisitorKind::BadBot => &BAD_BOT_RATE,
		};
		Visitor::new(kind, bot_name, rate)
	}

	fn visitor(&self, ip: IpAddr, user_agent: Option<&str>) -> Arc<Visitor> {
		if let Some(visitor) = self.visitors.read().get(&ip) {
			return Arc::clone(visitor);
		}

		let mut visitors = self.visitors.write();
		if let Some(visitor) = visitors.get(&ip) {
			return Arc::clone(visitor);
		}

		let visitor = match self.registry.classify(&ip) {
			Some((kind, name)) => self.create_visitor(kind, Some(name)),
			None => {
				if let Some(name) = user_agent.and_then(|ua| self.registry.match_user_agent(ua)) {
					debug!("{}: {} claims to be {}, verifying", self.name, ip, name);
					self.registry.launch_verification(ip, name);
				}
				self.create_visitor(VisitorKind::User, None)
			}
		};
		let visitor = Arc::new(visitor);
		visitors.insert(ip, Arc::clone(&visitor));
		visitor
	}

	/// Replaces the visitor entry of `ip` (if any) with one of class `kind`
	pub(crate) fn reclassify(&self, ip: IpAddr, kind: VisitorKind, name: &str) {
		let mut visitors = self.visitors.write();
		if visitors.contains_key(&ip) {
			visitors.insert(ip, Arc::new(self.create_visitor(kind, Some(name.into()))));
			debug!("{}: {} reclassified as {}", self.name, ip, kind.as_str());
		}
	}

	/// Admits a request from `ip`, waiting out its bucket delay if needed
	pub async fn limit(
		&self,
		ip: IpAddr,
		user_agent: Option<&str>,
		info: Option<&TrackingInfo>,
	) -> Result<Admission, LimitError> {
		let visitor = self.visitor(ip, user_agent);
		let label = visitor_label(&visitor, ip, info);

		let delay = visitor.reserve();
		if !delay.is_zero() {
			let Some(_guard) = visitor.enter_delay() else {
				visitor.cancel();
				info!(
					"{}: {} rejected, {} requests already delayed",
					self.name,
					label,
					visitor.curr_delays()
				);
				return Err(LimitError::TooManyRequests { limiter: self.name.clone(), retry_after: delay });
			};
			debug!("{}: {} delayed {:?}", self.name, label, delay);
			tokio::time::sleep(delay).await;
		}

		if let Some(global) = &self.global {
			global.until_ready().await;
		}

		Ok(Admission { kind: visitor.kind, label, delay })
	}

	/// Drops visitors not seen for `stale`. Returns (trimmed, total).
	pub fn trim(&self, stale: Duration) -> (usize, usize) {
		let now = Instant::now();
		let mut visitors = self.visitors.write();
		let total = visitors.len();
		visitors.retain(|_, visitor| now.saturating_duration_since(visitor.last_seen()) <= stale);
		(total - visitors.len(), total)
	}

	pub fn visitor_kind(&self, ip: &IpAddr) -> Option<VisitorKind> {
		self.visitors.read().get(ip).map(|visitor| visitor.kind)
	}

	pub fn visitor_count(&self) -> usize {
		self.visitors.read().len()
	}

	pub fn stats(&self) -> LimiterStats {
		let visitors = self.visitors.read();
		let count = |kind| visitors.values().filter(|v| v.kind == kind).count();
		LimiterStats {
			name: self.name.clone(),
			visitors: visitors.len(),
			good_bots: count(VisitorKind::GoodBot),
			bad_bots: count(VisitorKind::BadBot),
			delayed: visitors.values().map(|v| v.delay_count()).sum(),
			waiting: visitors.values().map(|v| v.curr_delays()).sum(),
		}
	}
}

/// Bot name, authenticated user name, or `ip|tracker name`
fn visitor_label(visitor: &Visitor, ip: IpAddr, info: Option<&TrackingInfo>) -> Box<str> {
	if let Some(name) = &visitor.bot_name {
		return name.clone();
	}
	match info {
		Some(info) if info.auth => info.name.clone(),
		Some(info) => format!("{}|{}", ip, info.name).into(),
		None => ip.to_string().into(),
	}
}


// vim: ts=4
