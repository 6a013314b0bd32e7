//! Error type shared by every gatekeep crate.

use axum::{Json, http::StatusCode, response::IntoResponse};

pub type GkResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	PermissionDenied,
	Unauthorized,
	DbError,
	Parse,
	ValidationError(String),
	ConfigError(String),
	CryptoError(String),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(_err: serde_json::Error) -> Self {
		Self::Parse
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::Unauthorized => write!(f, "unauthorized"),
			Error::DbError => write!(f, "database error"),
			Error::Parse => write!(f, "parse error"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "config error: {}", msg),
			Error::CryptoError(msg) => write!(f, "crypto error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, message) = match &self {
			Error::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
			Error::PermissionDenied => (StatusCode::FORBIDDEN, "permission denied".to_string()),
			Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
			Error::Parse => (StatusCode::BAD_REQUEST, "bad request".to_string()),
			Error::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
			// Internal details stay in the log
			_ => {
				tracing::error!("{}", self);
				(StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
			}
		};

		(status, Json(serde_json::json!({ "error": message }))).into_response()
	}
}


// vim: ts=4
