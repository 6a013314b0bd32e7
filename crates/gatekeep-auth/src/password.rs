//! Password storage
//!
//! Stored form: base64url(nonce || ChaCha20-Poly1305(obfuscated bcrypt hash)).
//!
//! The bcrypt hash is computed over `password + "." + pepper`. Before
//! encryption its cost field is replaced by a decoy, the real cost is moved in
//! front of the salt, both are rotated (rot13 over letters, rot5 over digits)
//! and a format version is prepended:
//!
//! ```text
//! $2b$10$<salt+digest>  ->  $1$2b$12$<rotated cost+salt+digest>
//! ```
//!
//! Verification reads the cost back from the stored value, so changing the
//! configured cost only affects new hashes.

use base64::{Engine, engine::general_purpose::URL_SAFE};
use chacha20poly1305::{
	ChaCha20Poly1305, Key, Nonce,
	aead::{Aead, KeyInit},
};
use rand::{Rng, RngExt};
use sha2::{Digest, Sha256};
use std::time::Duration;

use gatekeep_types::prelude::*;
use gatekeep_types::worker::WorkerPool;

const HASH_VERSION: &str = "1";
const DECOY_COST: &str = "12";
const NONCE_SIZE: usize = 12;

fn rot(c: char) -> char {
	match c {
		'a'..='m' | 'A'..='M' => (c as u8 + 13) as char,
		'n'..='z' | 'N'..='Z' => (c as u8 - 13) as char,
		'0'..='4' => (c as u8 + 5) as char,
		'5'..='9' => (c as u8 - 5) as char,
		_ => c,
	}
}

/// Valid bcrypt work factors
pub const COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// `$2b$10$xyz` -> `$1$2b$12$rot(10xyz)`
fn alter(hash: &str) -> GkResult<String> {
	let mut pieces = hash.split('$');
	let (Some(""), Some(alg), Some(cost), Some(rest), None) =
		(pieces.next(), pieces.next(), pieces.next(), pieces.next(), pieces.next())
	else {
		return Err(Error::CryptoError("unexpected bcrypt hash format".into()));
	};
	if cost.len() != 2 || !cost.bytes().all(|b| b.is_ascii_digit()) {
		return Err(Error::CryptoError("unexpected bcrypt cost".into()));
	}
	let rest: String = cost.chars().chain(rest.chars()).map(rot).collect();

	Ok(format!("${}${}${}${}", HASH_VERSION, alg, DECOY_COST, rest))
}

/// Inverse of [`alter`]
fn unalter(stored: &str) -> GkResult<String> {
	let mut pieces = stored.split('$');
	let (Some(""), Some(HASH_VERSION), Some(alg), Some(_decoy), Some(rest), None) = (
		pieces.next(),
		pieces.next(),
		pieces.next(),
		pieces.next(),
		pieces.next(),
		pieces.next(),
	) else {
		return Err(Error::CryptoError("unexpected stored hash format".into()));
	};
	let rest: String = rest.chars().map(rot).collect();
	let (Some(cost), Some(rest)) = (rest.get(..2), rest.get(2..)) else {
		return Err(Error::CryptoError("stored hash too short".into()));
	};
	if !cost.bytes().all(|b| b.is_ascii_digit()) {
		return Err(Error::CryptoError("unexpected stored cost".into()));
	}

	Ok(format!("${}${}${}", alg, cost, rest))
}

#[derive(Clone)]
pub struct PasswordCodec {
	cipher: ChaCha20Poly1305,
	pepper: Box<str>,
	cost: u32,
}

impl std::fmt::Debug for PasswordCodec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PasswordCodec").field("cost", &self.cost).finish_non_exhaustive()
	}
}

impl PasswordCodec {
	/// The cipher key is the SHA-256 digest of `enc_key`
	pub fn new(enc_key: &str, pepper: &str, cost: u32) -> Self {
		let digest = Sha256::digest(enc_key.as_bytes());
		let cipher = ChaCha20Poly1305::new(Key::from_slice(&digest));
		Self { cipher, pepper: pepper.into(), cost }
	}

	fn peppered(&self, password: &str) -> String {
		format!("{}.{}", password, self.pepper)
	}

	fn encrypt(&self, plain: &[u8]) -> GkResult<String> {
		let mut nonce = [0u8; NONCE_SIZE];
		rand::rng().fill_bytes(&mut nonce);

		let ciphertext = self
			.cipher
			.encrypt(Nonce::from_slice(&nonce), plain)
			.map_err(|_| Error::CryptoError("encryption failed".into()))?;

		let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
		out.extend_from_slice(&nonce);
		out.extend_from_slice(&ciphertext);
		Ok(URL_SAFE.encode(out))
	}

	fn decrypt(&self, stored: &str) -> GkResult<String> {
		let raw = URL_SAFE
			.decode(stored)
			.map_err(|_| Error::CryptoError("stored password is not base64".into()))?;
		if raw.len() <= NONCE_SIZE {
			return Err(Error::CryptoError("stored password too short".into()));
		}
		let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
		let plain = self
			.cipher
			.decrypt(Nonce::from_slice(nonce), ciphertext)
			.map_err(|_| Error::CryptoError("decryption failed".into()))?;

		String::from_utf8(plain).map_err(|_| Error::CryptoError("stored hash is not utf-8".into()))
	}

	/// Encodes a password for storage (blocking)
	pub fn generate_sync(&self, password: &str) -> GkResult<String> {
		let hash = bcrypt::hash(self.peppered(password), self.cost)
			.map_err(|err| Error::CryptoError(format!("bcrypt: {}", err)))?;
		self.encrypt(alter(&hash)?.as_bytes())
	}

	/// Checks a password against its stored form (blocking). A mismatch is
	/// `Ok(false)`, a stored value that cannot be decoded is an error.
	pub fn verify_sync(&self, stored: &str, password: &str) -> GkResult<bool> {
		let hash = unalter(&self.decrypt(stored)?)?;
		bcrypt::verify(self.peppered(password), &hash)
			.map_err(|err| Error::CryptoError(format!("bcrypt: {}", err)))
	}
}

/// Random 200-250ms pause after password work
pub(crate) async fn slow_down() {
	let ms = rand::rng().random_range(200..=250);
	tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Encodes a password on the worker pool
pub async fn generate(worker: &WorkerPool, codec: &PasswordCodec, password: &str) -> GkResult<String> {
	let codec = codec.clone();
	let password = password.to_owned();
	let res = worker.try_run(move || codec.generate_sync(&password)).await;
	slow_down().await;
	res
}

/// Verifies a password on the worker pool
pub async fn verify(
	worker: &WorkerPool,
	codec: &PasswordCodec,
	stored: &str,
	password: &str,
) -> GkResult<bool> {
	let codec = codec.clone();
	let stored = stored.to_owned();
	let password = password.to_owned();
	let res = worker.try_run_immed(move || codec.verify_sync(&stored, &password)).await;
	slow_down().await;
	res
}

#[cfg(test)]
mod tests {
	use super::*;

	fn codec() -> PasswordCodec {
		PasswordCodec::new("encryption key", "pepper", 4)
	}

	#[test]
	fn test_rot_is_involution() {
		let s = "g2tinxYv91PKj./q9ZyVdew2mKToygQrYb6gMReolejVgMaGcD2Ny";
		let once: String = s.chars().map(rot).collect();
		assert_ne!(once, s);
		assert_eq!(once.chars().map(rot).collect::<String>(), s);
		assert_eq!(rot('a'), 'n');
		assert_eq!(rot('Z'), 'M');
		assert_eq!(rot('7'), '2');
		assert_eq!(rot('.'), '.');
	}

	#[test]
	fn test_alter_hides_cost() {
		let hash = "$2b$04$g2tinxYv91PKj./q9ZyVdew2mKToygQrYb6gMReolejVgMaGcD2Ny";
		let altered = alter(hash).unwrap();
		assert!(altered.starts_with("$1$2b$12$"));
		assert!(!altered.contains("g2tinxYv91PKj"));
		assert!(!altered.contains("$04"));
		assert_eq!(unalter(&altered).unwrap(), hash);

		assert!(alter("plain").is_err());
		assert!(unalter("$2b$04$abc").is_err(), "version tag required");
		assert!(unalter("$1$2b$12$").is_err());
	}

	#[test]
	fn test_verify_after_cost_change() {
		let stored = PasswordCodec::new("encryption key", "pepper", 4).generate_sync("Str0ng!Pass").unwrap();

		let raised = PasswordCodec::new("encryption key", "pepper", 5);
		assert!(raised.verify_sync(&stored, "Str0ng!Pass").unwrap());
		assert!(!raised.verify_sync(&stored, "Wr0ng!Pass").unwrap());

		let restored = unalter(&raised.decrypt(&raised.generate_sync("Str0ng!Pass").unwrap()).unwrap()).unwrap();
		assert!(restored.starts_with("$2b$05$"));
	}

	#[test]
	fn test_generate_then_verify() {
		let codec = codec();
		let stored = codec.generate_sync("Str0ng!Pass").unwrap();

		assert!(URL_SAFE.decode(&stored).is_ok());
		assert!(codec.verify_sync(&stored, "Str0ng!Pass").unwrap());
		assert!(!codec.verify_sync(&stored, "Str0ng!Pasz").unwrap());
		assert!(!codec.verify_sync(&stored, "str0ng!Pass").unwrap());
	}

	#[test]
	fn test_fresh_nonce_per_call() {
		let codec = codec();
		let a = codec.generate_sync("Str0ng!Pass").unwrap();
		let b = codec.generate_sync("Str0ng!Pass").unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn test_wrong_key_or_pepper() {
		let stored = codec().generate_sync("Str0ng!Pass").unwrap();

		let other_key = PasswordCodec::new("another key", "pepper", 4);
		assert!(matches!(other_key.verify_sync(&stored, "Str0ng!Pass"), Err(Error::CryptoError(_))));

		let other_pepper = PasswordCodec::new("encryption key", "other", 4);
		assert!(!other_pepper.verify_sync(&stored, "Str0ng!Pass").unwrap());
	}

	#[test]
	fn test_tampered_storage() {
		let codec = codec();
		assert!(codec.verify_sync("not-base64!", "Str0ng!Pass").is_err());
		assert!(codec.verify_sync(&URL_SAFE.encode([0u8; 8]), "Str0ng!Pass").is_err());

		let stored = codec.generate_sync("Str0ng!Pass").unwrap();
		let mut raw = URL_SAFE.decode(&stored).unwrap();
		let last = raw.len() - 1;
		raw[last] ^= 0xff;
		assert!(codec.verify_sync(&URL_SAFE.encode(raw), "Str0ng!Pass").is_err());
	}

	#[tokio::test]
	async fn test_async_ops_slow_down() {
		let worker = WorkerPool::new(1, 1);
		let codec = codec();

		let start = std::time::Instant::now();
		let stored = generate(&worker, &codec, "Str0ng!Pass").await.unwrap();
		assert!(start.elapsed() >= Duration::from_millis(200));

		let start = std::time::Instant::now();
		assert!(!verify(&worker, &codec, &stored, "Wr0ng!Pass").await.unwrap());
		assert!(start.elapsed() >= Duration::from_millis(200), "failures are slowed down too");
	}
}

// vim: ts=4
