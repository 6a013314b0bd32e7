//! Session lifecycle: sign-in, revalidation and sign-out

use axum::http::HeaderMap;
use rand::RngExt;
use std::sync::Arc;

use crate::Auth;
use crate::password;
use crate::token::{Claims, TokenKind};
use crate::validate;
use gatekeep_tracker::{create_authenticated_identity, has_identity};
use gatekeep_types::auth_adapter::{CreateUserData, SessionId, UserId};
use gatekeep_types::cookie::{CookieJar, get_cookie};
use gatekeep_types::prelude::*;

/// Default scope of newly registered users
pub const DEFAULT_SCOPE: &[&str] = &["user"];

pub const USER_EXISTS: &str = "user name already exists";
pub const EMAIL_EXISTS: &str = "email address already exists";
pub const INTERNAL_ERROR: &str = "internal server error";

/// State of one authentication attempt
#[derive(Debug)]
pub(crate) struct SigninContext {
	user_id: UserId,
	username: Box<str>,
	scope: Vec<Box<str>>,
	session_id: SessionId,
	expires: Timestamp,
}

#[derive(Debug)]
pub enum RegisterError {
	/// Rejected input, reported to the client
	Invalid(&'static str),
	Internal(Error),
}

impl Auth {
	/// Validated claims of the `kind` token cookie of the request
	pub fn token_claims(&self, headers: &HeaderMap, kind: TokenKind) -> Option<Claims> {
		get_cookie(headers, kind.cookie_name()).and_then(|token| self.keys.decode(token))
	}

	/// Writes fresh access, refresh and session tokens, returns the access claims
	fn issue_tokens(&self, ctx: &SigninContext, jar: &mut CookieJar) -> GkResult<Claims> {
		let refresh = Claims {
			iss: self.config.issuer.clone(),
			sub: format!("{}|{}", ctx.user_id, ctx.username).into(),
			jti: Some(ctx.session_id.to_string().into()),
			exp: ctx.expires.0,
			scope: ctx.scope.clone(),
		};
		let access =
			Claims { exp: Timestamp::from_now(self.config.access_expire).0.min(ctx.expires.0), ..refresh.clone() };
		let session = Claims { sub: ctx.username.clone(), jti: None, ..refresh.clone() };

		// Encode everything before touching the jar
		let cookies = [
			self.keys.cookie(TokenKind::Access, &access)?,
			self.keys.cookie(TokenKind::Refresh, &refresh)?,
			self.keys.cookie(TokenKind::Session, &session)?,
		];
		for cookie in cookies {
			jar.add(cookie);
		}
		Ok(access)
	}

	/// Claims of a valid access token, or of freshly rotated tokens
	pub async fn authenticate(&self, headers: &HeaderMap, jar: &mut CookieJar) -> GkResult<Option<Claims>> {
		if let Some(claims) = self.token_claims(headers, TokenKind::Access) {
			if claims.user().is_some() {
				return Ok(Some(claims));
			}
		}
		self.revalidate(headers, jar).await
	}

	/// Rotates all three tokens from a valid refresh token. The scope is
	/// re-read from the database.
	pub async fn revalidate(&self, headers: &HeaderMap, jar: &mut CookieJar) -> GkResult<Option<Claims>> {
		let Some(refresh) = self.token_claims(headers, TokenKind::Refresh) else {
			return Ok(None);
		};
		let (Some((user_id, username)), Some(session_id)) = (refresh.user(), refresh.session_id()) else {
			warn!("revalidate: malformed refresh token of {}", refresh.sub);
			return Ok(None);
		};

		let scope = match self.adapter.read_session_scope(user_id, username, session_id).await {
			Ok(scope) => scope,
			Err(Error::NotFound) => {
				info!("{} session {} is gone", refresh.sub, session_id);
				return Ok(None);
			}
			Err(err) => {
				warn!("revalidate: cannot read session of {}: {}", refresh.sub, err);
				return Ok(None);
			}
		};

		let ctx = SigninContext {
			user_id,
			username: username.into(),
			scope: scope.into_vec(),
			session_id,
			expires: Timestamp(refresh.exp),
		};
		let access = self.issue_tokens(&ctx, jar)?;
		if !has_identity(headers) {
			create_authenticated_identity(jar, &ctx.username, &ctx.scope)?;
		}

		let adapter = Arc::clone(&self.adapter);
		self.tasks.spawn("session.touch", async move {
			adapter.update_session_last_used(user_id, session_id).await
		});

		info!("{} access token refreshed", refresh.sub);
		Ok(Some(access))
	}

	/// Clears the identity and token cookies and drops the session of a
	/// still valid refresh token. Returns the claims of that token.
	pub fn sign_out(&self, headers: &HeaderMap, jar: &mut CookieJar) -> Option<Claims> {
		for name in [
			gatekeep_tracker::COOKIE_NAME,
			TokenKind::Session.cookie_name(),
			TokenKind::Access.cookie_name(),
			TokenKind::Refresh.cookie_name(),
		] {
			jar.remove(name);
		}

		let refresh = self.token_claims(headers, TokenKind::Refresh)?;
		if let (Some((user_id, _)), Some(session_id)) = (refresh.user(), refresh.session_id()) {
			let adapter = Arc::clone(&self.adapter);
			self.tasks.spawn("session.delete", async move {
				adapter.delete_session(user_id, session_id).await
			});
			info!("{} signed out", refresh.sub);
		}
		Some(refresh)
	}

	/// Verifies credentials and opens a new session.
	///
	/// Unknown users, wrong passwords and unreadable stored hashes all fail
	/// with [`Error::Unauthorized`].
	pub async fn sign_in(&self, user: &str, pass: &str, jar: &mut CookieJar) -> GkResult<Claims> {
		if validate::check_username(user).is_err() || validate::check_password(pass).is_err() {
			warn!("signin: malformed credentials");
			return Err(Error::Unauthorized);
		}

		let lname = user.to_lowercase();
		let info = match self.adapter.read_security_info(&lname).await {
			Ok(info) => info,
			Err(Error::NotFound) => {
				warn!("signin: invalid username: {}", lname);
				password::slow_down().await;
				return Err(Error::Unauthorized);
			}
			Err(err) => return Err(err),
		};

		match password::verify(&self.worker, &self.password, &info.password, pass).await {
			Ok(true) => {}
			Ok(false) => {
				warn!("signin: invalid password for {}", lname);
				return Err(Error::Unauthorized);
			}
			Err(Error::CryptoError(msg)) => {
				error!("signin: unreadable password of {}: {}", lname, msg);
				return Err(Error::Unauthorized);
			}
			Err(err) => return Err(err),
		}

		let session_id = SessionId(i64::from(rand::rng().random_range(1..i32::MAX)));
		let ctx = SigninContext {
			user_id: info.user_id,
			username: info.username,
			scope: info.scope.into_vec(),
			session_id,
			expires: Timestamp::from_now(self.config.refresh_expire),
		};
		let access = self.issue_tokens(&ctx, jar)?;
		create_authenticated_identity(jar, &ctx.username, &ctx.scope)?;

		let (adapter, user_id, expires) = (Arc::clone(&self.adapter), ctx.user_id, ctx.expires);
		self.tasks.spawn("session.create", async move {
			adapter.create_session(user_id, session_id, expires).await
		});

		info!("{} signed in", access.sub);
		Ok(access)
	}

	/// Validates and stores a new account with the default scope
	pub async fn register(&self, user: &str, email: &str, pass: &str) -> Result<UserId, RegisterError> {
		let email = email.trim();
		validate::check_email(email).map_err(RegisterError::Invalid)?;
		validate::check_username(user).map_err(RegisterError::Invalid)?;
		validate::check_password(pass).map_err(RegisterError::Invalid)?;

		let lname = user.to_lowercase();
		let email = email.to_lowercase();
		match self.adapter.check_user_exists(&lname, &email).await {
			Ok(exists) if exists.name_taken => return Err(RegisterError::Invalid(USER_EXISTS)),
			Ok(exists) if exists.email_taken => return Err(RegisterError::Invalid(EMAIL_EXISTS)),
			Ok(_) => {}
			Err(err) => {
				error!("register: {}", err);
				return Err(RegisterError::Invalid(INTERNAL_ERROR));
			}
		}

		let password = self.hash_password(pass).await.map_err(RegisterError::Internal)?;
		let user_id = self
			.adapter
			.create_user(CreateUserData { username: user, email: &email, password: &password, scope: DEFAULT_SCOPE })
			.await
			.map_err(RegisterError::Internal)?;

		info!("{} registered as {}", user, user_id);
		Ok(user_id)
	}
}

// vim: ts=4
