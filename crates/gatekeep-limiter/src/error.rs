//! Admission errors

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug)]
pub enum LimitError {
	/// The visitor already has too many delayed requests in flight
	TooManyRequests {
		limiter: Box<str>,
		/// Delay the rejected request would have had
		retry_after: Duration,
	},
	/// The client address could not be determined
	MissingAddress,
}

impl std::fmt::Display for LimitError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			LimitError::TooManyRequests { limiter, retry_after } => {
				write!(f, "{}: too many requests, retry after {:?}", limiter, retry_after)
			}
			LimitError::MissingAddress => write!(f, "missing client address"),
		}
	}
}

impl std::error::Error for LimitError {}

impl IntoResponse for LimitError {
	fn into_response(self) -> Response {
		match self {
			LimitError::TooManyRequests { retry_after, .. } => {
				let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
				let body = serde_json::json!({
					"error": {
						"code": "E-RATE-LIMITED",
						"message": "Too many requests. Please slow down.",
						"details": {
							"retryAfter": retry_secs
						}
					}
				});

				let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
				if let Ok(val) = retry_secs.to_string().parse() {
					response.headers_mut().insert("Retry-After", val);
				}
				response
			}
			LimitError::MissingAddress => {
				tracing::error!("limiter: request without client address");
				StatusCode::INTERNAL_SERVER_ERROR.into_response()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_too_many_requests_response() {
		let err = LimitError::TooManyRequests {
			limiter: "api".into(),
			retry_after: Duration::from_millis(1500),
		};
		let res = err.into_response();
		assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(res.headers().get("Retry-After").unwrap(), "2");
	}

	#[test]
	fn test_missing_address_is_internal() {
		assert_eq!(LimitError::MissingAddress.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
	}
}

// vim: ts=4
