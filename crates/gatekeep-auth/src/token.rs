//! Session tokens
//!
//! Three HS256 tokens per session, each in its own cookie:
//!
//! | cookie    | subject     | jti        | lifetime | http-only |
//! |-----------|-------------|------------|----------|-----------|
//! | `access`  | `id|user`   | session id | minutes  | yes       |
//! | `refresh` | `id|user`   | session id | weeks    | yes       |
//! | `session` | `user`      | -          | weeks    | no        |

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use gatekeep_types::auth_adapter::{SessionId, UserId};
use gatekeep_types::cookie::Cookie;
use gatekeep_types::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
	Access,
	Refresh,
	Session,
}

impl TokenKind {
	pub fn cookie_name(self) -> &'static str {
		match self {
			TokenKind::Access => "access",
			TokenKind::Refresh => "refresh",
			TokenKind::Session => "session",
		}
	}

	pub fn http_only(self) -> bool {
		!matches!(self, TokenKind::Session)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	pub iss: Box<str>,
	pub sub: Box<str>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jti: Option<Box<str>>,
	pub exp: i64,
	#[serde(default)]
	pub scope: Vec<Box<str>>,
}

impl Claims {
	pub fn has_scope(&self, scope: &str) -> bool {
		self.scope.iter().any(|s| &**s == scope)
	}

	/// User id and name from an `id|user` subject
	pub fn user(&self) -> Option<(UserId, &str)> {
		let (id, name) = self.sub.split_once('|')?;
		if name.is_empty() || name.contains('|') {
			return None;
		}
		Some((UserId(id.parse().ok()?), name))
	}

	pub fn session_id(&self) -> Option<SessionId> {
		self.jti.as_deref()?.parse().ok().map(SessionId)
	}

	/// Display name of the subject
	pub fn username(&self) -> &str {
		self.user().map_or(&*self.sub, |(_, name)| name)
	}
}

pub struct TokenKeys {
	encoding: EncodingKey,
	decoding: DecodingKey,
	validation: Validation,
}

impl std::fmt::Debug for TokenKeys {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenKeys").finish_non_exhaustive()
	}
}

impl TokenKeys {
	pub fn new(secret: &[u8], issuer: &str) -> Self {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.set_issuer(&[issuer]);
		validation.set_required_spec_claims(&["exp", "iss", "sub"]);
		validation.leeway = 0;

		Self {
			encoding: EncodingKey::from_secret(secret),
			decoding: DecodingKey::from_secret(secret),
			validation,
		}
	}

	pub fn encode(&self, claims: &Claims) -> GkResult<String> {
		jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
			.map_err(|err| Error::CryptoError(format!("token: {}", err)))
	}

	/// Validated claims, `None` if the token is malformed, forged or expired
	pub fn decode(&self, token: &str) -> Option<Claims> {
		match jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation) {
			Ok(data) => Some(data.claims),
			Err(err) => {
				debug!("token: rejected: {}", err);
				None
			}
		}
	}

	/// Signed token as a cookie expiring with the token
	pub fn cookie(&self, kind: TokenKind, claims: &Claims) -> GkResult<Cookie> {
		let token = self.encode(claims)?;
		Ok(Cookie::new(kind.cookie_name(), token)
			.expires_at(Timestamp(claims.exp))
			.http_only(kind.http_only()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn claims(exp: i64) -> Claims {
		Claims {
			iss: "gatekeep".into(),
			sub: "42|alice01".into(),
			jti: Some("1234".into()),
			exp,
			scope: vec!["user".into()],
		}
	}

	#[test]
	fn test_decode_valid() {
		let keys = TokenKeys::new(b"secret", "gatekeep");
		let c = claims(Timestamp::from_now(60).0);
		let token = keys.encode(&c).unwrap();

		assert_eq!(keys.decode(&token), Some(c.clone()));
		assert_eq!(c.user(), Some((UserId(42), "alice01")));
		assert_eq!(c.session_id(), Some(SessionId(1234)));
		assert!(c.has_scope("user"));
		assert!(!c.has_scope("admin"));
	}

	#[test]
	fn test_reject_expired_forged_or_foreign() {
		let keys = TokenKeys::new(b"secret", "gatekeep");

		let expired = keys.encode(&claims(Timestamp::from_now(-10).0)).unwrap();
		assert_eq!(keys.decode(&expired), None);

		let forged = TokenKeys::new(b"other", "gatekeep").encode(&claims(Timestamp::from_now(60).0)).unwrap();
		assert_eq!(keys.decode(&forged), None);

		let foreign = TokenKeys::new(b"secret", "elsewhere").encode(&claims(Timestamp::from_now(60).0)).unwrap();
		assert_eq!(keys.decode(&foreign), None, "issuer is checked");

		assert_eq!(keys.decode("garbage"), None);
	}

	#[test]
	fn test_session_subject() {
		let c = Claims { sub: "alice01".into(), jti: None, ..claims(0) };
		assert_eq!(c.user(), None);
		assert_eq!(c.session_id(), None);
		assert_eq!(c.username(), "alice01");

		let json = serde_json::to_string(&c).unwrap();
		assert!(!json.contains("jti"), "cleared jti is omitted");
	}

	#[test]
	fn test_cookie_flags() {
		let keys = TokenKeys::new(b"secret", "gatekeep");
		let c = claims(Timestamp::from_now(300).0);

		let access = keys.cookie(TokenKind::Access, &c).unwrap();
		assert_eq!(&*access.name, "access");
		assert!(access.http_only && access.secure);
		assert_eq!(access.expires, Some(Timestamp(c.exp)));

		let session = keys.cookie(TokenKind::Session, &c).unwrap();
		assert!(!session.http_only);
	}
}

// vim: ts=4
