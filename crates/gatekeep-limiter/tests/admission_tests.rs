//! Admission and bot classification tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use gatekeep_limiter::{LimitError, Limiter, LimiterConfig, Rate, VisitorKind};
use tokio::time::Instant;

fn api_config() -> LimiterConfig {
	LimiterConfig::new(Rate::new(Duration::from_millis(500), 3, 2))
		.with_good_bot(Rate::new(Duration::from_millis(50), 20, 0))
}

#[tokio::test(start_paused = true)]
async fn test_rapid_requests_delayed_then_rejected() {
	let (registry, _dns, _tasks) = registry(FakeDns::default());
	let limiter = Limiter::new("api", &api_config(), &registry).unwrap();
	let addr = ip("198.51.100.10");

	let start = Instant::now();
	let handles: Vec<_> = (0..10)
		.map(|_| {
			let limiter = Arc::clone(&limiter);
			tokio::spawn(async move { limiter.limit(addr, None, None).await })
		})
		.collect();

	let mut immediate = 0;
	let mut delays = Vec::new();
	let mut rejected = 0;
	for handle in handles {
		match handle.await.unwrap() {
			Ok(res) if res.delay.is_zero() => immediate += 1,
			Ok(res) => delays.push(res.delay),
			Err(LimitError::TooManyRequests { .. }) => rejected += 1,
			Err(err) => panic!("unexpected error: {}", err),
		}
	}

	assert_eq!(immediate, 3, "burst passes unstopped");
	delays.sort();
	assert_eq!(delays, vec![Duration::from_millis(500), Duration::from_millis(1000)]);
	assert_eq!(rejected, 5, "requests beyond the delay ceiling are rejected");
	assert!(start.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_rejection_frees_after_delay_completes() {
	let config = LimiterConfig::new(Rate::new(Duration::from_secs(1), 1, 1));
	let (registry, _dns, _tasks) = registry(FakeDns::default());
	let limiter = Limiter::new("auth", &config, &registry).unwrap();
	let addr = ip("198.51.100.11");

	limiter.limit(addr, None, None).await.unwrap();

	let l2 = Arc::clone(&limiter);
	let delayed = tokio::spawn(async move { l2.limit(addr, None, None).await });
	tokio::task::yield_now().await;

	assert!(limiter.limit(addr, None, None).await.is_err(), "ceiling reached while one is waiting");
	assert!(delayed.await.unwrap().is_ok());

	// The rejected reservation was returned, so the next one waits one interval only
	let res = limiter.limit(addr, None, None).await.unwrap();
	assert_eq!(res.delay, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_bot_promotion() {
	let dns = FakeDns::default().with_bot("66.249.66.1", "crawl-66-249-66-1.googlebot.com.", &["66.249.66.1"]);
	let (registry, _dns, _tasks) = registry(dns);
	let api = Limiter::new("api", &api_config(), &registry).unwrap();
	let other = Limiter::new("auth", &api_config(), &registry).unwrap();
	let addr = ip("66.249.66.1");

	let res = api.limit(addr, Some(GOOGLEBOT_UA), None).await.unwrap();
	assert_eq!(res.kind, VisitorKind::User, "verification does not block the request");
	other.limit(addr, None, None).await.unwrap();

	for _ in 0..100 {
		if registry.bot_name(&addr).is_some() {
			break;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	assert_eq!(registry.bot_name(&addr).as_deref(), Some("Google"));
	assert_eq!(
		registry.good_bot(&addr).map(|e| e.host),
		Some("crawl-66-249-66-1.googlebot.com.".into())
	);
	assert_eq!(api.visitor_kind(&addr), Some(VisitorKind::GoodBot));
	assert_eq!(other.visitor_kind(&addr), Some(VisitorKind::GoodBot), "promotion applies to every limiter");

	for _ in 0..10 {
		let res = api.limit(addr, Some(GOOGLEBOT_UA), None).await.unwrap();
		assert_eq!(res.kind, VisitorKind::GoodBot);
		assert_eq!(&*res.label, "Google");
		assert!(res.delay.is_zero(), "good bot burst applies");
	}
}

#[tokio::test(start_paused = true)]
async fn test_forward_mismatch_is_not_promoted() {
	let dns = FakeDns::default().with_bot("203.0.113.66", "crawl-1.googlebot.com.", &["66.249.66.1"]);
	let (registry, _dns, _tasks) = registry(dns);

	assert!(!registry.verify_bot(ip("203.0.113.66"), "Google").await);
	assert_eq!(registry.bot_name(&ip("203.0.113.66")), None);
}

#[tokio::test(start_paused = true)]
async fn test_untrusted_host_is_not_promoted() {
	let dns = FakeDns::default().with_bot("203.0.113.67", "googlebot.evil.example.", &["203.0.113.67"]);
	let (registry, _dns, _tasks) = registry(dns);

	assert!(!registry.verify_bot(ip("203.0.113.67"), "Google").await);
	assert_eq!(registry.stats().good_bots, 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_dns_failures_are_retried() {
	let dns = FakeDns::default()
		.with_bot("66.249.66.2", "crawl-66-249-66-2.googlebot.com.", &["66.249.66.2"])
		.failing(3);
	let (registry, dns, _tasks) = registry(dns);

	let start = Instant::now();
	assert!(registry.verify_bot(ip("66.249.66.2"), "Google").await, "succeeds on the last retry");
	assert_eq!(*dns.reverse_calls.lock(), 4);
	assert!(start.elapsed() >= Duration::from_secs(6), "fixed backoff between attempts");
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
	let dns = FakeDns::default()
		.with_bot("66.249.66.3", "crawl-66-249-66-3.googlebot.com.", &["66.249.66.3"])
		.failing(4);
	let (registry, dns, _tasks) = registry(dns);

	assert!(!registry.verify_bot(ip("66.249.66.3"), "Google").await);
	assert_eq!(*dns.reverse_calls.lock(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_trims_every_limiter() {
	let (registry, _dns, tasks) = registry(FakeDns::default());
	let api = Limiter::new("api", &api_config(), &registry).unwrap();
	let auth = Limiter::new("auth", &api_config(), &registry).unwrap();

	api.limit(ip("10.1.0.1"), None, None).await.unwrap();
	auth.limit(ip("10.1.0.2"), None, None).await.unwrap();

	registry.start_sweeper(Duration::from_secs(600), Duration::from_secs(3600));
	tokio::time::sleep(Duration::from_secs(3600 + 1300)).await;

	assert_eq!(api.visitor_count(), 0);
	assert_eq!(auth.visitor_count(), 0);
	tasks.shutdown().await;
}

#[tokio::test]
async fn test_global_bucket_only_delays() {
	let config = LimiterConfig::new(Rate::new(Duration::ZERO, 1, 0))
		.with_global(Rate::new(Duration::from_millis(20), 1, 0));
	let (registry, _dns, _tasks) = registry(FakeDns::default());
	let limiter = Limiter::new("global", &config, &registry).unwrap();

	let start = std::time::Instant::now();
	for i in 0..3 {
		let res = limiter.limit(ip(&format!("10.2.0.{}", i)), None, None).await;
		assert!(res.is_ok(), "global bucket never rejects");
	}
	assert!(start.elapsed() >= Duration::from_millis(30), "shared bucket paces distinct visitors");
}

// vim: ts=4
