#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use gatekeep_limiter::{AdmissionRegistry, BotResolver, DnsError};
use gatekeep_types::background::Background;

/// In-memory DNS with optional transient failures
#[derive(Default)]
pub struct FakeDns {
	pub ptr: HashMap<IpAddr, Vec<Box<str>>>,
	pub addrs: HashMap<Box<str>, Vec<IpAddr>>,
	/// Number of reverse lookups that fail with a transient error first
	pub failures: Mutex<u32>,
	pub reverse_calls: Mutex<u32>,
}

impl FakeDns {
	pub fn with_bot(mut self, ip: &str, host: &str, forward: &[&str]) -> Self {
		self.ptr.insert(ip.parse().unwrap(), vec![host.into()]);
		self.addrs.insert(host.into(), forward.iter().map(|a| a.parse().unwrap()).collect());
		self
	}

	pub fn failing(self, n: u32) -> Self {
		*self.failures.lock() = n;
		self
	}
}

#[async_trait]
impl BotResolver for FakeDns {
	async fn reverse_lookup(&self, ip: IpAddr) -> Result<Vec<Box<str>>, DnsError> {
		*self.reverse_calls.lock() += 1;
		{
			let mut failures = self.failures.lock();
			if *failures > 0 {
				*failures -= 1;
				return Err(DnsError::Transient("timeout".into()));
			}
		}
		self.ptr.get(&ip).cloned().ok_or(DnsError::NotFound)
	}

	async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
		self.addrs.get(host).cloned().ok_or(DnsError::NotFound)
	}
}

pub fn registry(dns: FakeDns) -> (Arc<AdmissionRegistry>, Arc<FakeDns>, Background) {
	let dns = Arc::new(dns);
	let tasks = Background::new();
	let registry = AdmissionRegistry::new(dns.clone(), tasks.clone());
	(registry, dns, tasks)
}

pub fn ip(s: &str) -> IpAddr {
	s.parse().unwrap()
}

pub const GOOGLEBOT_UA: &str =
	"Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

// vim: ts=4
