//! DNS lookups used by bot verification

use async_trait::async_trait;
use hickory_resolver::{
	ResolveError, TokioResolver, config::ResolverConfig, name_server::TokioConnectionProvider,
};
use std::net::IpAddr;

use gatekeep_types::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
	/// The name or address has no records. Not worth retrying.
	NotFound,
	/// Timeouts, server failures and the like
	Transient(String),
}

impl std::fmt::Display for DnsError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			DnsError::NotFound => write!(f, "no records found"),
			DnsError::Transient(msg) => write!(f, "{}", msg),
		}
	}
}

impl std::error::Error for DnsError {}

#[async_trait]
pub trait BotResolver: Send + Sync {
	/// Host names of the PTR records of `ip`
	async fn reverse_lookup(&self, ip: IpAddr) -> Result<Vec<Box<str>>, DnsError>;

	/// Addresses `host` resolves to
	async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError>;
}

pub struct HickoryBotResolver {
	resolver: TokioResolver,
}

impl HickoryBotResolver {
	/// Resolver using the system configuration, or the default public
	/// name servers if it cannot be read
	pub fn from_system_conf() -> Self {
		let resolver = match TokioResolver::builder_tokio() {
			Ok(builder) => builder.build(),
			Err(err) => {
				warn!("dns: cannot read system config ({}), using defaults", err);
				TokioResolver::builder_with_config(
					ResolverConfig::default(),
					TokioConnectionProvider::default(),
				)
				.build()
			}
		};
		Self { resolver }
	}
}

fn map_err(err: &ResolveError) -> DnsError {
	if err.is_no_records_found() {
		DnsError::NotFound
	} else {
		DnsError::Transient(err.to_string())
	}
}

#[async_trait]
impl BotResolver for HickoryBotResolver {
	async fn reverse_lookup(&self, ip: IpAddr) -> Result<Vec<Box<str>>, DnsError> {
		let lookup = self.resolver.reverse_lookup(ip).await.map_err(|err| map_err(&err))?;
		Ok(lookup.iter().map(|ptr| ptr.to_string().into_boxed_str()).collect())
	}

	async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
		let lookup = self.resolver.lookup_ip(host).await.map_err(|err| map_err(&err))?;
		Ok(lookup.iter().collect())
	}
}

// vim: ts=4
