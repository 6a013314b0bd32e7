//! Adapter that manages user accounts and sessions

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;

use crate::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct UserId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(pub i64);

impl std::fmt::Display for UserId {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Credentials needed to verify a sign-in attempt
#[derive(Debug)]
pub struct SecurityInfo {
	pub user_id: UserId,
	pub username: Box<str>,
	/// Encoded password as produced by the password module
	pub password: Box<str>,
	pub scope: Box<[Box<str>]>,
}

#[derive(Debug)]
pub struct CreateUserData<'a> {
	pub username: &'a str,
	pub email: &'a str,
	pub password: &'a str,
	pub scope: &'a [&'a str],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UserExists {
	pub name_taken: bool,
	pub email_taken: bool,
}

#[async_trait]
pub trait AuthAdapter: Debug + Send + Sync {
	/// Reads credentials by the normalized (lowercase) username
	async fn read_security_info(&self, lname: &str) -> GkResult<SecurityInfo>;

	/// Reads the current scope of a user if the session is still alive
	async fn read_session_scope(
		&self,
		user_id: UserId,
		username: &str,
		session_id: SessionId,
	) -> GkResult<Box<[Box<str>]>>;

	/// Stores a new session and bumps the last login time of the user
	async fn create_session(
		&self,
		user_id: UserId,
		session_id: SessionId,
		expires_at: Timestamp,
	) -> GkResult<()>;
	async fn update_session_last_used(&self, user_id: UserId, session_id: SessionId)
	-> GkResult<()>;
	async fn delete_session(&self, user_id: UserId, session_id: SessionId) -> GkResult<()>;

	/// Deletes expired sessions, returns the number removed
	async fn purge_expired_sessions(&self) -> GkResult<u64>;

	async fn check_user_exists(&self, lname: &str, email: &str) -> GkResult<UserExists>;
	async fn create_user(&self, data: CreateUserData<'_>) -> GkResult<UserId>;
}

// vim: ts=4
