//! Process secrets

use serde::Deserialize;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use gatekeep_types::prelude::*;

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secrets {
	#[serde(rename = "jwtkey")]
	pub jwt_key: String,
	#[serde(rename = "enckey")]
	pub enc_key: String,
	pub pepper: String,
}

impl std::fmt::Debug for Secrets {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Secrets { .. }")
	}
}

impl Secrets {
	pub fn new(jwt_key: &str, enc_key: &str, pepper: &str) -> GkResult<Self> {
		let secrets = Self { jwt_key: jwt_key.into(), enc_key: enc_key.into(), pepper: pepper.into() };
		secrets.validate()?;
		Ok(secrets)
	}

	pub fn parse(json: &str) -> GkResult<Self> {
		let secrets: Self = serde_json::from_str(json)
			.map_err(|err| Error::ConfigError(format!("secrets: {}", err)))?;
		secrets.validate()?;
		Ok(secrets)
	}

	pub async fn load(path: &Path) -> GkResult<Self> {
		let json = tokio::fs::read_to_string(path)
			.await
			.map_err(|err| Error::ConfigError(format!("secrets: {}: {}", path.display(), err)))?;
		Self::parse(&json)
	}

	fn validate(&self) -> GkResult<()> {
		for (name, value) in [("jwtkey", &self.jwt_key), ("enckey", &self.enc_key), ("pepper", &self.pepper)] {
			if value.is_empty() {
				return Err(Error::ConfigError(format!("secrets: {} is empty", name)));
			}
		}
		Ok(())
	}
}


// vim: ts=4
