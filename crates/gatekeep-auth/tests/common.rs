#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response, header};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gatekeep_auth::{Auth, AuthConfig, Secrets};
use gatekeep_limiter::{AdmissionRegistry, BotResolver, DnsError, LimiterConfig, Rate, ServerMode};
use gatekeep_types::auth_adapter::{
	AuthAdapter, CreateUserData, SecurityInfo, SessionId, UserExists, UserId,
};
use gatekeep_types::background::Background;
use gatekeep_types::prelude::*;
use gatekeep_types::worker::WorkerPool;

#[derive(Clone, Debug)]
pub struct MockUser {
	pub id: i64,
	pub username: String,
	pub email: String,
	pub password: String,
	pub scope: Vec<Box<str>>,
}

#[derive(Debug, Default)]
pub struct MockAdapter {
	pub users: Mutex<Vec<MockUser>>,
	/// (user id, session id) => expires at
	pub sessions: Mutex<HashMap<(i64, i64), i64>>,
	pub touched: Mutex<u32>,
	/// Session reads fail with a database error while set
	pub db_down: AtomicBool,
}

impl MockAdapter {
	pub fn set_scope(&self, username: &str, scope: &[&str]) {
		for user in self.users.lock().iter_mut().filter(|u| u.username == username) {
			user.scope = scope.iter().map(|s| (*s).into()).collect();
		}
	}

	pub fn session_count(&self) -> usize {
		self.sessions.lock().len()
	}
}

#[async_trait]
impl AuthAdapter for MockAdapter {
	async fn read_security_info(&self, lname: &str) -> GkResult<SecurityInfo> {
		let users = self.users.lock();
		let user = users.iter().find(|u| u.username.to_lowercase() == lname).ok_or(Error::NotFound)?;
		Ok(SecurityInfo {
			user_id: UserId(user.id),
			username: user.username.as_str().into(),
			password: user.password.as_str().into(),
			scope: user.scope.clone().into_boxed_slice(),
		})
	}

	async fn read_session_scope(
		&self,
		user_id: UserId,
		username: &str,
		session_id: SessionId,
	) -> GkResult<Box<[Box<str>]>> {
		if self.db_down.load(Ordering::Relaxed) {
			return Err(Error::DbError);
		}
		let expires = self.sessions.lock().get(&(user_id.0, session_id.0)).copied().ok_or(Error::NotFound)?;
		if expires < Timestamp::now().0 {
			return Err(Error::NotFound);
		}
		let users = self.users.lock();
		let user =
			users.iter().find(|u| u.id == user_id.0 && u.username == username).ok_or(Error::NotFound)?;
		Ok(user.scope.clone().into_boxed_slice())
	}

	async fn create_session(
		&self,
		user_id: UserId,
		session_id: SessionId,
		expires_at: Timestamp,
	) -> GkResult<()> {
		self.sessions.lock().insert((user_id.0, session_id.0), expires_at.0);
		Ok(())
	}

	async fn update_session_last_used(&self, _user_id: UserId, _session_id: SessionId) -> GkResult<()> {
		*self.touched.lock() += 1;
		Ok(())
	}

	async fn delete_session(&self, user_id: UserId, session_id: SessionId) -> GkResult<()> {
		self.sessions.lock().remove(&(user_id.0, session_id.0));
		Ok(())
	}

	async fn purge_expired_sessions(&self) -> GkResult<u64> {
		let now = Timestamp::now().0;
		let mut sessions = self.sessions.lock();
		let before = sessions.len();
		sessions.retain(|_, expires| *expires >= now);
		Ok((before - sessions.len()) as u64)
	}

	async fn check_user_exists(&self, lname: &str, email: &str) -> GkResult<UserExists> {
		let users = self.users.lock();
		Ok(UserExists {
			name_taken: users.iter().any(|u| u.username.to_lowercase() == lname),
			email_taken: users.iter().any(|u| u.email == email),
		})
	}

	async fn create_user(&self, data: CreateUserData<'_>) -> GkResult<UserId> {
		let mut users = self.users.lock();
		let id = users.len() as i64 + 1;
		users.push(MockUser {
			id,
			username: data.username.to_owned(),
			email: data.email.to_owned(),
			password: data.password.to_owned(),
			scope: data.scope.iter().map(|s| (*s).into()).collect(),
		});
		Ok(UserId(id))
	}
}

struct NoDns;

#[async_trait]
impl BotResolver for NoDns {
	async fn reverse_lookup(&self, _ip: IpAddr) -> Result<Vec<Box<str>>, DnsError> {
		Err(DnsError::NotFound)
	}

	async fn lookup_ip(&self, _host: &str) -> Result<Vec<IpAddr>, DnsError> {
		Err(DnsError::NotFound)
	}
}

pub const PASSWORD: &str = "Str0ng!Pass";

pub struct TestEnv {
	pub auth: Arc<Auth>,
	pub adapter: Arc<MockAdapter>,
	pub tasks: Background,
	pub app: Router,
}

impl TestEnv {
	/// Adds a user with [`PASSWORD`]
	pub async fn add_user(&self, username: &str, scope: &[&str]) {
		let password = self.auth.hash_password(PASSWORD).await.unwrap();
		let mut users = self.adapter.users.lock();
		let id = users.len() as i64 + 1;
		users.push(MockUser {
			id,
			username: username.to_owned(),
			email: format!("{}@example.com", username.to_lowercase()),
			password,
			scope: scope.iter().map(|s| (*s).into()).collect(),
		});
	}

	pub async fn send(&self, req: Request<Body>) -> Response<Body> {
		use tower::ServiceExt;
		self.app.clone().oneshot(req).await.unwrap()
	}

	/// Waits for the detached session writes
	pub async fn settle(&self) {
		self.tasks.shutdown().await;
	}

	/// Polls `cond` while background work catches up
	pub async fn wait_until(&self, cond: impl Fn() -> bool) {
		for _ in 0..200 {
			if cond() {
				return;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		panic!("condition not reached");
	}
}

/// Fast hashing and a lenient auth limiter
pub fn config() -> AuthConfig {
	AuthConfig {
		hash_cost: 4,
		enable_registration: true,
		limiter: LimiterConfig::new(Rate::new(Duration::from_millis(1), 100, 0)),
		..AuthConfig::default()
	}
}

pub fn build_auth(config: AuthConfig, adapter: Arc<MockAdapter>, tasks: Background) -> GkResult<Arc<Auth>> {
	let registry = AdmissionRegistry::new(Arc::new(NoDns), tasks.clone());
	let secrets = Secrets::new("jwt secret", "encryption key", "pepper")?;
	Auth::new(config, &secrets, adapter, Arc::new(WorkerPool::new(1, 1)), tasks, &registry)
}

pub fn env_with(config: AuthConfig) -> TestEnv {
	let adapter = Arc::new(MockAdapter::default());
	let tasks = Background::new();
	let auth = build_auth(config, adapter.clone(), tasks.clone()).unwrap();
	let app = gatekeep_auth::routes(&auth, ServerMode::Standalone);
	TestEnv { auth, adapter, tasks, app }
}

pub fn env() -> TestEnv {
	env_with(config())
}

pub fn request(method: Method, uri: &str, cookies: &[(&str, &str)], body: &str) -> Request<Body> {
	let mut builder = Request::builder().method(method).uri(uri);
	if !cookies.is_empty() {
		let cookie = cookies.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("; ");
		builder = builder.header(header::COOKIE, cookie);
	}
	if !body.is_empty() {
		builder = builder.header(header::CONTENT_TYPE, "application/json");
	}
	let mut req = builder.body(Body::from(body.to_owned())).unwrap();
	req.extensions_mut().insert(ConnectInfo("198.51.100.7:4000".parse::<SocketAddr>().unwrap()));
	req
}

/// Set-Cookie headers of a response as (name, value, attributes)
pub fn set_cookies(res: &Response<Body>) -> Vec<(String, String, String)> {
	res.headers()
		.get_all(header::SET_COOKIE)
		.iter()
		.filter_map(|h| h.to_str().ok())
		.filter_map(|h| {
			let (pair, attrs) = h.split_once(';').unwrap_or((h, ""));
			let (name, value) = pair.split_once('=')?;
			Some((name.to_owned(), value.to_owned(), attrs.to_owned()))
		})
		.collect()
}

pub fn cookie<'a>(cookies: &'a [(String, String, String)], name: &str) -> Option<&'a str> {
	cookies.iter().find(|(n, _, _)| n == name).map(|(_, v, _)| v.as_str())
}

pub async fn body_json(res: Response<Body>) -> serde_json::Value {
	let body = res.into_body().collect().await.unwrap().to_bytes();
	serde_json::from_slice(&body).unwrap()
}

// vim: ts=4
