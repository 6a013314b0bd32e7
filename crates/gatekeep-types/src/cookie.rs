//! Cookie helpers
//!
//! Reading request cookies and building `Set-Cookie` headers. Components
//! collect outgoing cookies in a [`CookieJar`] which is applied to the
//! response at the end of the request.

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponseParts, ResponseParts};
use std::convert::Infallible;

use crate::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

impl SameSite {
	fn as_str(self) -> &'static str {
		match self {
			SameSite::Strict => "Strict",
			SameSite::Lax => "Lax",
			SameSite::None => "None",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
	pub name: Box<str>,
	pub value: Box<str>,
	pub path: Box<str>,
	pub expires: Option<Timestamp>,
	pub max_age: Option<i64>,
	pub secure: bool,
	pub http_only: bool,
	pub same_site: SameSite,
}

impl Cookie {
	/// Secure, `SameSite=Lax` session cookie on path `/`
	pub fn new(name: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			path: "/".into(),
			expires: None,
			max_age: None,
			secure: true,
			http_only: false,
			same_site: SameSite::Lax,
		}
	}

	/// Cookie that instructs the client to drop `name`
	pub fn removal(name: impl Into<Box<str>>) -> Self {
		Self { expires: Some(Timestamp(0)), max_age: Some(0), ..Self::new(name, "") }
	}

	pub fn expires_at(mut self, expires: Timestamp) -> Self {
		self.expires = Some(expires);
		self.max_age = Some((expires.0 - Timestamp::now().0).max(0));
		self
	}

	pub fn http_only(mut self, http_only: bool) -> Self {
		self.http_only = http_only;
		self
	}

	pub fn to_header_value(&self) -> String {
		let mut res = format!("{}={}; Path={}", self.name, self.value, self.path);
		if let Some(expires) = self.expires {
			res.push_str("; Expires=");
			res.push_str(&expires.to_http_date());
		}
		if let Some(max_age) = self.max_age {
			res.push_str(&format!("; Max-Age={}", max_age));
		}
		if self.http_only {
			res.push_str("; HttpOnly");
		}
		if self.secure {
			res.push_str("; Secure");
		}
		res.push_str("; SameSite=");
		res.push_str(self.same_site.as_str());
		res
	}
}

/// Look up a cookie value in the request headers
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|h| h.to_str().ok())
		.flat_map(|h| h.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(key, _)| *key == name)
		.map(|(_, value)| value.trim_matches('"'))
		.filter(|value| !value.is_empty())
}

/// Outgoing cookies for one response
#[derive(Clone, Debug, Default)]
pub struct CookieJar {
	cookies: Vec<Cookie>,
}

impl CookieJar {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a cookie, replacing an earlier one with the same name
	pub fn add(&mut self, cookie: Cookie) {
		self.cookies.retain(|c| c.name != cookie.name);
		self.cookies.push(cookie);
	}

	pub fn remove(&mut self, name: &str) {
		self.add(Cookie::removal(name));
	}

	pub fn get(&self, name: &str) -> Option<&Cookie> {
		self.cookies.iter().find(|c| &*c.name == name)
	}

	pub fn is_empty(&self) -> bool {
		self.cookies.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
		self.cookies.iter()
	}

	/// Appends a `Set-Cookie` header for every collected cookie
	pub fn apply(&self, headers: &mut HeaderMap) {
		for cookie in &self.cookies {
			match HeaderValue::from_str(&cookie.to_header_value()) {
				Ok(value) => {
					headers.append(header::SET_COOKIE, value);
				}
				Err(_) => warn!("invalid cookie value for {}", cookie.name),
			}
		}
	}
}

impl CookieJar {
	/// Like [`CookieJar::apply`], skipping cookies the response already sets
	pub fn apply_unset(&self, headers: &mut HeaderMap) {
		let set: Vec<String> = headers
			.get_all(header::SET_COOKIE)
			.iter()
			.filter_map(|h| h.to_str().ok())
			.filter_map(|h| h.split_once('=').map(|(name, _)| name.trim().to_owned()))
			.collect();
		for cookie in self.cookies.iter().filter(|c| !set.iter().any(|name| *name == *c.name)) {
			match HeaderValue::from_str(&cookie.to_header_value()) {
				Ok(value) => {
					headers.append(header::SET_COOKIE, value);
				}
				Err(_) => warn!("invalid cookie value for {}", cookie.name),
			}
		}
	}
}

impl IntoResponseParts for CookieJar {
	type Error = Infallible;

	fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
		self.apply(res.headers_mut());
		Ok(res)
	}
}


// vim: ts=4
