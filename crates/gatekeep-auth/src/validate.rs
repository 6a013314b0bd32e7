//! Credential syntax checks
//!
//! Run before any database access so malformed input is rejected cheaply.

use regex::Regex;
use std::sync::LazyLock;

pub const MIN_USERNAME_LEN: usize = 4;
pub const MAX_USERNAME_LEN: usize = 20;
pub const MIN_PASSWORD_LEN: usize = 10;
pub const MAX_PASSWORD_LEN: usize = 32;
pub const MAX_EMAIL_LEN: usize = 320;

pub const SPECIAL_CHARS: &str = "!#$%&()*+,-./:;<=>?@^_{|}~";

pub const INVALID_EMAIL: &str = "invalid email address";
pub const USERNAME_LENGTH: &str = "Invalid user name. Must have a length >= 4 and <= 20.";
pub const USERNAME_CHARS: &str = "Invalid user name. Must only contain characters: [a-z][A-Z][0-9].";
pub const USERNAME_FIRST: &str =
	"Invalid user name. First character has to be alphabetic: [a-z][A-Z].";
pub const PASSWORD_LENGTH: &str = "Invalid password. Must have a length >= 10 and <= 32.";
pub const PASSWORD_CHARS: &str =
	"Invalid password. Must only contain characters: [a-z][A-Z][0-9][ !#$%&()*+,-./:;<=>?@^_{|}~]";
pub const PASSWORD_CATEGORIES: &str = "Invalid password. Must contain at least one character from each category: [a-z][A-Z][0-9][!#$%&()*+,-./:;<=>?@^_{|}~]";

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
	)
	.ok()
});

pub fn check_email(email: &str) -> Result<(), &'static str> {
	let email = email.trim();
	if email.is_empty() || email.len() > MAX_EMAIL_LEN {
		return Err(INVALID_EMAIL);
	}
	match &*EMAIL_RE {
		Some(re) if re.is_match(email) => Ok(()),
		_ => Err(INVALID_EMAIL),
	}
}

pub fn check_username(user: &str) -> Result<(), &'static str> {
	if user.len() < MIN_USERNAME_LEN || user.len() > MAX_USERNAME_LEN {
		return Err(USERNAME_LENGTH);
	}
	if !user.chars().all(|c| c.is_ascii_alphanumeric()) {
		return Err(USERNAME_CHARS);
	}
	if !user.starts_with(|c: char| c.is_ascii_alphabetic()) {
		return Err(USERNAME_FIRST);
	}
	Ok(())
}

pub fn check_password(pass: &str) -> Result<(), &'static str> {
	if pass.len() < MIN_PASSWORD_LEN || pass.len() > MAX_PASSWORD_LEN {
		return Err(PASSWORD_LENGTH);
	}

	let (mut lower, mut upper, mut digit, mut special) = (false, false, false, false);
	for c in pass.chars() {
		match c {
			'a'..='z' => lower = true,
			'A'..='Z' => upper = true,
			'0'..='9' => digit = true,
			c if SPECIAL_CHARS.contains(c) => special = true,
			c if c.is_ascii_whitespace() => {}
			_ => return Err(PASSWORD_CHARS),
		}
	}

	if lower && upper && digit && special { Ok(()) } else { Err(PASSWORD_CATEGORIES) }
}


// vim: ts=4
