//! Process-wide bot registries and the list of limiters
//!
//! One registry is created at startup and handed to every [`Limiter`]. A bot
//! verified through one limiter is recognized by all of them.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::botcheck::{self, BotCheckConfig};
use crate::limiter::{Limiter, LimiterStats};
use crate::resolver::BotResolver;
use crate::visitor::VisitorKind;
use gatekeep_types::background::{Background, PeriodicTask};
use gatekeep_types::prelude::*;

/// Default period of the visitor cleanup sweep
pub const SWEEP_PERIOD: Duration = Duration::from_secs(10 * 60);
/// Visitors idle for longer than this are dropped by the sweep
pub const SWEEP_STALE: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BotEntry {
	pub name: Box<str>,
	pub host: Box<str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
	pub good_bots: usize,
	pub bad_bots: usize,
	pub limiters: Vec<LimiterStats>,
}

pub struct AdmissionRegistry {
	good_bots: RwLock<HashMap<IpAddr, BotEntry>>,
	bad_bots: RwLock<HashMap<IpAddr, BotEntry>>,
	limiters: RwLock<Vec<Weak<Limiter>>>,
	/// Addresses with a verification in progress
	pending: Mutex<HashSet<IpAddr>>,
	botcheck: BotCheckConfig,
	resolver: Arc<dyn BotResolver>,
	tasks: Background,
}

impl std::fmt::Debug for AdmissionRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AdmissionRegistry")
			.field("good_bots", &self.good_bots.read().len())
			.field("bad_bots", &self.bad_bots.read().len())
			.field("limiters", &self.limiters.read().len())
			.finish_non_exhaustive()
	}
}

impl AdmissionRegistry {
	pub fn new(resolver: Arc<dyn BotResolver>, tasks: Background) -> Arc<Self> {
		Self::with_botcheck(resolver, tasks, BotCheckConfig::default())
	}

	pub fn with_botcheck(
		resolver: Arc<dyn BotResolver>,
		tasks: Background,
		botcheck: BotCheckConfig,
	) -> Arc<Self> {
		Arc::new(Self {
			good_bots: RwLock::new(HashMap::new()),
			bad_bots: RwLock::new(HashMap::new()),
			limiters: RwLock::new(Vec::new()),
			pending: Mutex::new(HashSet::new()),
			botcheck,
			resolver,
			tasks,
		})
	}

	pub(crate) fn register(&self, limiter: &Arc<Limiter>) {
		let mut limiters = self.limiters.write();
		limiters.retain(|l| l.strong_count() > 0);
		limiters.push(Arc::downgrade(limiter));
	}

	fn limiters(&self) -> Vec<Arc<Limiter>> {
		self.limiters.read().iter().filter_map(Weak::upgrade).collect()
	}

	/// Pre-seeds a known bad bot
	pub fn add_bad_bot(&self, ip: IpAddr, name: &str) {
		self.bad_bots.write().insert(ip, BotEntry { name: name.into(), host: ip.to_string().into() });
		for limiter in self.limiters() {
			limiter.reclassify(ip, VisitorKind::BadBot, name);
		}
	}

	pub(crate) fn classify(&self, ip: &IpAddr) -> Option<(VisitorKind, Box<str>)> {
		if let Some(entry) = self.bad_bots.read().get(ip) {
			return Some((VisitorKind::BadBot, entry.name.clone()));
		}
		self.good_bots.read().get(ip).map(|entry| (VisitorKind::GoodBot, entry.name.clone()))
	}

	/// Name of a known bot at `ip`
	pub fn bot_name(&self, ip: &IpAddr) -> Option<Box<str>> {
		self.classify(ip).map(|(_, name)| name)
	}

	pub fn good_bot(&self, ip: &IpAddr) -> Option<BotEntry> {
		self.good_bots.read().get(ip).cloned()
	}

	pub(crate) fn match_user_agent(&self, user_agent: &str) -> Option<Box<str>> {
		self.botcheck.match_user_agent(user_agent).map(Into::into)
	}

	/// Launches a background verification of `ip` claiming to be `name`
	pub(crate) fn launch_verification(self: &Arc<Self>, ip: IpAddr, name: Box<str>) {
		if !self.pending.lock().insert(ip) {
			return;
		}
		let pending = PendingVerification { registry: Arc::clone(self), ip };
		self.tasks.spawn("botcheck", async move {
			pending.registry.verify_bot(ip, &name).await;
			drop(pending);
			Ok(())
		});
	}

	/// Runs the verification protocol and promotes `ip` to good bot on success
	pub async fn verify_bot(&self, ip: IpAddr, name: &str) -> bool {
		let Some(host) = botcheck::verify(&*self.resolver, &self.botcheck, ip, name).await else {
			return false;
		};

		info!("botcheck: {} verified as {} ({})", ip, name, host);
		self.good_bots.write().insert(ip, BotEntry { name: name.into(), host });
		for limiter in self.limiters() {
			limiter.reclassify(ip, VisitorKind::GoodBot, name);
		}
		true
	}

	/// Removes idle visitors from every registered limiter
	pub fn sweep(&self, stale: Duration) {
		for limiter in self.limiters() {
			let (trimmed, total) = limiter.trim(stale);
			info!("daemon: {}: {}/{} visitors trimmed", limiter.name(), trimmed, total);
		}
	}

	/// Starts the shared cleanup sweep
	pub fn start_sweeper(self: &Arc<Self>, period: Duration, stale: Duration) {
		let task = SweepTask { registry: Arc::downgrade(self), stale };
		self.tasks.spawn_periodic(Arc::new(task), period);
	}

	pub fn stats(&self) -> RegistryStats {
		RegistryStats {
			good_bots: self.good_bots.read().len(),
			bad_bots: self.bad_bots.read().len(),
			limiters: self.limiters().iter().map(|l| l.stats()).collect(),
		}
	}
}

/// Releases the pending mark of an IP, also when the job is dropped unrun
struct PendingVerification {
	registry: Arc<AdmissionRegistry>,
	ip: IpAddr,
}

impl Drop for PendingVerification {
	fn drop(&mut self) {
		self.registry.pending.lock().remove(&self.ip);
	}
}

struct SweepTask {
	registry: Weak<AdmissionRegistry>,
	stale: Duration,
}

#[async_trait]
impl PeriodicTask for SweepTask {
	fn kind(&self) -> &'static str {
		"limiter.sweep"
	}

	async fn run(&self) -> GkResult<()> {
		if let Some(registry) = self.registry.upgrade() {
			registry.sweep(self.stale);
		}
		Ok(())
	}
}


// vim: ts=4
