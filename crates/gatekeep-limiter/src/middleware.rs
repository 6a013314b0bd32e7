//! Admission Middleware
//!
//! Tower middleware layer applying a [`Limiter`] to Axum routes.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Request, header};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use crate::error::LimitError;
use crate::extractors::{ServerMode, extract_client_ip};
use crate::limiter::Limiter;
use crate::VISITOR_NAME_HEADER;
use gatekeep_tracker::get_or_create_identity;
use gatekeep_types::cookie::CookieJar;

/// Visitor display name, attached to the response for the access log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisitorLabel(pub Box<str>);

#[derive(Clone)]
pub struct LimitLayer {
	limiter: Arc<Limiter>,
	mode: ServerMode,
}

impl LimitLayer {
	pub fn new(limiter: Arc<Limiter>, mode: ServerMode) -> Self {
		Self { limiter, mode }
	}
}

impl<S> Layer<S> for LimitLayer {
	type Service = LimitService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		LimitService { inner, limiter: self.limiter.clone(), mode: self.mode }
	}
}

#[derive(Clone)]
pub struct LimitService<S> {
	inner: S,
	limiter: Arc<Limiter>,
	mode: ServerMode,
}

impl<S> Service<Request<Body>> for LimitService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, mut req: Request<Body>) -> Self::Future {
		let limiter = self.limiter.clone();
		let mode = self.mode;
		let mut inner = self.inner.clone();

		Box::pin(async move {
			let Some(ip) = extract_client_ip(&req, mode) else {
				return Ok(LimitError::MissingAddress.into_response());
			};

			let mut jar = CookieJar::new();
			let info = get_or_create_identity(req.headers(), &mut jar);
			let user_agent =
				req.headers().get(header::USER_AGENT).and_then(|h| h.to_str().ok()).map(str::to_owned);

			let admission = match limiter.limit(ip, user_agent.as_deref(), Some(&info)).await {
				Ok(admission) => admission,
				Err(err) => return Ok(err.into_response()),
			};

			if let Ok(value) = HeaderValue::from_str(&admission.label) {
				req.headers_mut().insert(VISITOR_NAME_HEADER, value);
			}
			req.extensions_mut().insert(info);

			let mut res = inner.call(req).await?;
			jar.apply_unset(res.headers_mut());
			res.extensions_mut().insert(VisitorLabel(admission.label));
			Ok(res)
		})
	}
}

// vim: ts=4
