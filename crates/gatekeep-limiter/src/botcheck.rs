//! Search engine bot verification
//!
//! A user agent claiming to be a known crawler is only trusted if the reverse
//! DNS name of the address belongs to the crawler's domain and that name
//! resolves back to the same address.

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use crate::resolver::{BotResolver, DnsError};
use gatekeep_types::prelude::*;

/// (bot name, lowercase user agent substring)
pub const DEFAULT_SIGNATURES: &[(&str, &str)] = &[
	("Baidu", "baiduspider"),
	("Bing", "bingbot"),
	("Google", "googlebot"),
	("MSN", "msnbot"),
	("Neeva", "neevabot"),
	("Qwantify", "qwantify"),
	("Yahoo", "yahoo!"),
	("Yandex", "yandexbot"),
	("Semrush", "semrushbot"),
];

pub const DEFAULT_TRUSTED_SUFFIXES: &[&str] = &[
	".crawl.baidu.com.",
	".crawl.baidu.jp.",
	".crawl.yahoo.net.",
	".google.com.",
	".googlebot.com.",
	".neevabot.com.",
	".qwant.com.",
	".search.msn.com.",
	".yandex.com.",
	".yandex.net.",
	".yandex.ru.",
	".bot.semrush.com.",
];

#[derive(Clone, Debug)]
pub struct BotCheckConfig {
	pub signatures: Vec<(Box<str>, Box<str>)>,
	pub trusted_suffixes: Vec<Box<str>>,
	/// Retries after a transient DNS failure
	pub retries: u32,
	pub retry_delay: Duration,
}

impl Default for BotCheckConfig {
	fn default() -> Self {
		Self {
			signatures: DEFAULT_SIGNATURES.iter().map(|(name, sig)| ((*name).into(), (*sig).into())).collect(),
			trusted_suffixes: DEFAULT_TRUSTED_SUFFIXES.iter().map(|s| (*s).into()).collect(),
			retries: 3,
			retry_delay: Duration::from_secs(2),
		}
	}
}

impl BotCheckConfig {
	/// Name of the crawler the user agent claims to be
	pub fn match_user_agent(&self, user_agent: &str) -> Option<&str> {
		let ua = user_agent.to_lowercase();
		self.signatures.iter().find(|(_, sig)| ua.contains(&**sig)).map(|(name, _)| &**name)
	}

	pub fn is_trusted_host(&self, host: &str) -> bool {
		let mut host = host.to_lowercase();
		if !host.ends_with('.') {
			host.push('.');
		}
		self.trusted_suffixes.iter().any(|suffix| host.ends_with(&**suffix))
	}
}

async fn with_retry<T, F, Fut>(config: &BotCheckConfig, what: &str, mut f: F) -> Option<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, DnsError>>,
{
	let mut attempt = 0;
	loop {
		match f().await {
			Ok(res) => return Some(res),
			Err(DnsError::NotFound) => {
				debug!("botcheck: {}: no records", what);
				return None;
			}
			Err(DnsError::Transient(err)) => {
				if attempt >= config.retries {
					info!("botcheck: {}: giving up after {} attempts: {}", what, attempt + 1, err);
					return None;
				}
				attempt += 1;
				debug!("botcheck: {}: {}, retry {}", what, err, attempt);
				tokio::time::sleep(config.retry_delay).await;
			}
		}
	}
}

/// Verifies that `ip` belongs to the crawler `name`. Returns the verified
/// host name.
pub async fn verify(
	resolver: &dyn BotResolver,
	config: &BotCheckConfig,
	ip: IpAddr,
	name: &str,
) -> Option<Box<str>> {
	let what = format!("{} {}", name, ip);
	let hosts = with_retry(config, &what, || resolver.reverse_lookup(ip)).await?;

	let Some(host) = hosts.iter().find(|host| config.is_trusted_host(host)) else {
		warn!("botcheck: possible bad bot: {} ({}) claims to be {}", ip, hosts.join(", "), name);
		return None;
	};

	let addrs = with_retry(config, &what, || resolver.lookup_ip(host)).await?;
	if !addrs.contains(&ip) {
		warn!("botcheck: {} host {} resolves to {:?}, not {}", name, host, addrs, ip);
		return None;
	}

	Some(host.clone())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_match_user_agent() {
		let config = BotCheckConfig::default();
		assert_eq!(
			config.match_user_agent(
				"Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
			),
			Some("Google")
		);
		assert_eq!(
			config.match_user_agent("Mozilla/5.0 (compatible; Yahoo! Slurp; http://help.yahoo.com)"),
			Some("Yahoo")
		);
		assert_eq!(config.match_user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0"), None);
	}

	#[test]
	fn test_trusted_host() {
		let config = BotCheckConfig::default();
		assert!(config.is_trusted_host("crawl-66-249-66-1.googlebot.com."));
		assert!(config.is_trusted_host("crawl-66-249-66-1.GoogleBot.com"));
		assert!(config.is_trusted_host("msnbot-157-55-39-1.search.msn.com."));
		assert!(!config.is_trusted_host("googlebot.com.evil.example."));
		assert!(!config.is_trusted_host("fakegooglebot.com."));
	}
}

// vim: ts=4
