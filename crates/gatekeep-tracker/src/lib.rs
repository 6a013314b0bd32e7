//! Visitor tracking cookie
//!
//! The `id` cookie carries a [`TrackingInfo`] together with a 64-bit hash of
//! its serialized form. The hash only detects accidental or casual
//! modification, the cookie is a display and rate limiting hint and never an
//! identity credential. A cookie that fails to decode or verify is treated as
//! absent and replaced.

use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::URL_SAFE};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use xxhash_rust::xxh64::xxh64;

use gatekeep_types::cookie::{Cookie, CookieJar, get_cookie};
use gatekeep_types::prelude::*;

pub const COOKIE_NAME: &str = "id";
/// Cookie lifetime in seconds (one year)
pub const COOKIE_EXPIRE: i64 = 365 * 24 * 3600;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
	pub id: i64,
	pub name: Box<str>,
	pub auth: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scope: Vec<Box<str>>,
}

impl TrackingInfo {
	/// New anonymous identity with a random id and display name
	pub fn anonymous() -> Self {
		let mut rng = rand::rng();
		let hex = format!("{:x}", rng.random_range(0..i64::MAX));
		let name = hex.get(8..).filter(|s| !s.is_empty()).unwrap_or(hex.as_str());

		Self { id: rng.random_range(0..i64::MAX), name: name.into(), auth: false, scope: Vec::new() }
	}

	pub fn authenticated(name: &str, scope: &[Box<str>]) -> Self {
		Self {
			id: rand::rng().random_range(0..i64::MAX),
			name: name.into(),
			auth: true,
			scope: scope.to_vec(),
		}
	}
}

#[derive(Serialize, Deserialize)]
struct SignedInfo {
	info: Box<RawValue>,
	sig: u64,
}

/// Encodes `info` into a cookie value
pub fn encode(info: &TrackingInfo) -> GkResult<String> {
	let raw = RawValue::from_string(serde_json::to_string(info)?)?;
	let sig = xxh64(raw.get().as_bytes(), 0);
	let doc = serde_json::to_vec(&SignedInfo { info: raw, sig })?;

	Ok(URL_SAFE.encode(doc))
}

/// Decodes a cookie value. `None` if it is malformed or the hash does not match.
pub fn decode(value: &str) -> Option<TrackingInfo> {
	let doc = URL_SAFE.decode(value).ok()?;
	let signed: SignedInfo = serde_json::from_slice(&doc).ok()?;
	if xxh64(signed.info.get().as_bytes(), 0) != signed.sig {
		debug!("tracker: signature mismatch");
		return None;
	}

	serde_json::from_str(signed.info.get()).ok()
}

/// Whether the request carries a tracking cookie at all (valid or not)
pub fn has_identity(headers: &HeaderMap) -> bool {
	get_cookie(headers, COOKIE_NAME).is_some()
}

fn write_cookie(jar: &mut CookieJar, info: &TrackingInfo) -> GkResult<()> {
	let value = encode(info)?;
	jar.add(Cookie::new(COOKIE_NAME, value).expires_at(Timestamp::from_now(COOKIE_EXPIRE)));
	Ok(())
}

/// Returns the identity carried by the request, or a new anonymous one which
/// is added to `jar`.
pub fn get_or_create_identity(headers: &HeaderMap, jar: &mut CookieJar) -> TrackingInfo {
	if let Some(info) = get_cookie(headers, COOKIE_NAME).and_then(decode) {
		return info;
	}

	let info = TrackingInfo::anonymous();
	if let Err(err) = write_cookie(jar, &info) {
		warn!("tracker: cannot encode identity: {}", err);
	}
	info
}

/// Writes an authenticated identity cookie for `name`
pub fn create_authenticated_identity(
	jar: &mut CookieJar,
	name: &str,
	scope: &[Box<str>],
) -> GkResult<TrackingInfo> {
	let info = TrackingInfo::authenticated(name, scope);
	write_cookie(jar, &info)?;
	Ok(info)
}


// vim: ts=4
