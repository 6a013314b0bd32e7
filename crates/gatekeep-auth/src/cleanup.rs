//! Expired session purge

use async_trait::async_trait;
use std::sync::Arc;

use gatekeep_types::auth_adapter::AuthAdapter;
use gatekeep_types::background::PeriodicTask;
use gatekeep_types::prelude::*;

#[derive(Debug)]
pub struct SessionPurgeTask {
	adapter: Arc<dyn AuthAdapter>,
}

impl SessionPurgeTask {
	pub fn new(adapter: Arc<dyn AuthAdapter>) -> Self {
		Self { adapter }
	}
}

#[async_trait]
impl PeriodicTask for SessionPurgeTask {
	fn kind(&self) -> &'static str {
		"auth.purge"
	}

	async fn run(&self) -> GkResult<()> {
		let purged = self.adapter.purge_expired_sessions().await?;
		if purged > 0 {
			info!("daemon: purged {} expired sessions", purged);
		} else {
			debug!("daemon: no expired sessions");
		}
		Ok(())
	}
}

// vim: ts=4
