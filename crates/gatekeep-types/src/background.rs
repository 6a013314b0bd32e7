//! Background work
//!
//! Detached jobs (session bookkeeping, bot verification) and long-lived
//! periodic tasks (cleanup sweeps, session purge). Request handlers never
//! await these. On shutdown periodic tasks are cancelled and in-flight jobs
//! are drained.

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::prelude::*;

/// A task run on a fixed period until shutdown
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
	fn kind(&self) -> &'static str;

	async fn run(&self) -> GkResult<()>;
}

#[derive(Clone, Debug, Default)]
pub struct Background {
	tracker: TaskTracker,
	cancel: CancellationToken,
}

impl Background {
	pub fn new() -> Self {
		Self::default()
	}

	/// Spawns a detached job. Errors are logged under `name`.
	pub fn spawn<F>(&self, name: &'static str, fut: F)
	where
		F: Future<Output = GkResult<()>> + Send + 'static,
	{
		if self.tracker.is_closed() {
			warn!("background: {} spawned after shutdown, dropped", name);
			return;
		}
		self.tracker.spawn(async move {
			if let Err(err) = fut.await {
				warn!("background: {}: {}", name, err);
			}
		});
	}

	/// Runs `task` every `period` (first run after one period) until shutdown
	pub fn spawn_periodic(&self, task: Arc<dyn PeriodicTask>, period: Duration) {
		let cancel = self.cancel.clone();
		self.tracker.spawn(async move {
			let mut interval = tokio::time::interval(period);
			interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			// The first tick completes immediately
			interval.tick().await;
			loop {
				tokio::select! {
					() = cancel.cancelled() => break,
					_ = interval.tick() => {
						if let Err(err) = task.run().await {
							warn!("daemon: {}: {}", task.kind(), err);
						}
					}
				}
			}
			debug!("daemon: {} stopped", task.kind());
		});
	}

	pub fn is_shutting_down(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Cancels periodic tasks and waits for all spawned work to finish
	pub async fn shutdown(&self) {
		self.cancel.cancel();
		self.tracker.close();
		self.tracker.wait().await;
		info!("background: all tasks finished");
	}
}


// vim: ts=4
