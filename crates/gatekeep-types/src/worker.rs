//! Worker pool. Runs blocking CPU-bound jobs (password hashing, encryption) on
//! dedicated threads with two priority lanes.

use flume::{Receiver, Sender};
use futures::channel::oneshot;
use std::{sync::Arc, thread};

use crate::prelude::*;

type Job = Box<dyn FnOnce() + Send>;
type JobQueue = Arc<Receiver<Job>>;

#[derive(Debug)]
pub struct WorkerPool {
	high: Sender<Job>,
	normal: Sender<Job>,
}

impl WorkerPool {
	/// `n_high` threads serve only the high lane, `n_normal` threads serve both
	pub fn new(n_high: usize, n_normal: usize) -> Self {
		let (high, rx_high) = flume::unbounded();
		let (normal, rx_normal) = flume::unbounded();

		let rx_high = Arc::new(rx_high);
		let rx_normal = Arc::new(rx_normal);

		for _ in 0..n_high {
			let rx_high = Arc::clone(&rx_high);
			thread::spawn(move || worker_loop(&[rx_high]));
		}

		for _ in 0..n_normal.max(1) {
			let rx_high = Arc::clone(&rx_high);
			let rx_normal = Arc::clone(&rx_normal);
			thread::spawn(move || worker_loop(&[rx_high, rx_normal]));
		}

		Self { high, normal }
	}

	fn submit<F, T>(queue: &Sender<Job>, f: F) -> impl Future<Output = GkResult<T>> + use<F, T>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		let (res_tx, res_rx) = oneshot::channel();

		let job = Box::new(move || {
			let result = f();
			let _ignore = res_tx.send(result);
		});

		if queue.send(job).is_err() {
			error!("Failed to send job to worker queue");
		}

		async move {
			res_rx.await.map_err(|_| {
				error!("Worker dropped result channel (task may have panicked)");
				Error::Internal("worker task failed".into())
			})
		}
	}

	pub fn run<F, T>(&self, f: F) -> impl Future<Output = GkResult<T>> + use<F, T>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		Self::submit(&self.normal, f)
	}

	/// Runs on the high priority lane (interactive requests)
	pub fn run_immed<F, T>(&self, f: F) -> impl Future<Output = GkResult<T>> + use<F, T>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		Self::submit(&self.high, f)
	}

	/// Like `run`, but flattens `GkResult<GkResult<T>>` into `GkResult<T>`.
	pub fn try_run<F, T>(&self, f: F) -> impl Future<Output = GkResult<T>> + use<F, T>
	where
		F: FnOnce() -> GkResult<T> + Send + 'static,
		T: Send + 'static,
	{
		let fut = self.run(f);
		async move { fut.await? }
	}

	/// Like `run_immed`, but flattens `GkResult<GkResult<T>>` into `GkResult<T>`.
	pub fn try_run_immed<F, T>(&self, f: F) -> impl Future<Output = GkResult<T>> + use<F, T>
	where
		F: FnOnce() -> GkResult<T> + Send + 'static,
		T: Send + 'static,
	{
		let fut = self.run_immed(f);
		async move { fut.await? }
	}
}

impl Default for WorkerPool {
	fn default() -> Self {
		Self::new(1, 2)
	}
}

fn worker_loop(queues: &[JobQueue]) {
	loop {
		// Try higher-priority queues first (non-blocking)
		let job = queues.iter().find_map(|rx| rx.try_recv().ok());
		if let Some(job) = job {
			if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
				error!("Worker thread caught panic: {:?}", e);
			}
			continue;
		}

		let mut selector = flume::Selector::new();
		for rx in queues {
			selector = selector.recv(rx, |res| res);
		}

		match selector.wait() {
			Ok(job) => {
				if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
					error!("Worker thread caught panic: {:?}", e);
				}
			}
			// All senders dropped, the pool is gone
			Err(flume::RecvError::Disconnected) => break,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_run_returns_result() {
		let pool = WorkerPool::new(1, 1);
		let res = pool.run(|| 6 * 7).await.unwrap();
		assert_eq!(res, 42);

		let res = pool.try_run_immed(|| Err::<(), _>(Error::Parse)).await;
		assert!(matches!(res, Err(Error::Parse)));
	}

	#[tokio::test]
	async fn test_panicking_job_reports_error() {
		let pool = WorkerPool::new(0, 1);
		let res = pool.run(|| -> u32 { panic!("boom") }).await;
		assert!(matches!(res, Err(Error::Internal(_))), "panic should surface as internal error");

		// Pool keeps working after a panic
		assert_eq!(pool.run(|| 1).await.unwrap(), 1);
	}
}

// vim: ts=4
