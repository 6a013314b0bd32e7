//! Route guard
//!
//! [`RequireScope`] admits requests carrying a valid (or rotatable) session
//! whose scope contains the required capability. The claims are handed to
//! handlers through the [`Authenticated`] extractor.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::{Request, StatusCode, request::Parts};
use axum::response::{IntoResponse, Redirect, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use crate::Auth;
use crate::token::Claims;
use gatekeep_types::cookie::CookieJar;
use gatekeep_types::prelude::*;

#[derive(Clone, Debug)]
pub struct RequireScope {
	auth: Arc<Auth>,
	scope: &'static str,
}

impl RequireScope {
	pub fn new(auth: Arc<Auth>, scope: &'static str) -> Self {
		Self { auth, scope }
	}
}

impl<S> Layer<S> for RequireScope {
	type Service = RequireScopeService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RequireScopeService { inner, auth: self.auth.clone(), scope: self.scope }
	}
}

#[derive(Clone, Debug)]
pub struct RequireScopeService<S> {
	inner: S,
	auth: Arc<Auth>,
	scope: &'static str,
}

impl<S> Service<Request<Body>> for RequireScopeService<S>
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
		let auth = self.auth.clone();
		let scope = self.scope;
		let mut inner = self.inner.clone();

		Box::pin(async move {
			let mut jar = CookieJar::new();
			let claims = match auth.authenticate(req.headers(), &mut jar).await {
				Ok(Some(claims)) => claims,
				Ok(None) => {
					debug!("guard: no session for {}", req.uri().path());
					return Ok(Redirect::to(&auth.config().signin_path).into_response());
				}
				Err(err) => return Ok(err.into_response()),
			};

			if !claims.has_scope(scope) {
				warn!("guard: {} lacks scope {} for {}", claims.sub, scope, req.uri().path());
				return Ok((jar, StatusCode::UNAUTHORIZED).into_response());
			}

			req.extensions_mut().insert(claims);
			let mut res = inner.call(req).await?;
			jar.apply(res.headers_mut());
			Ok(res)
		})
	}
}

/// Claims of the caller, available behind [`RequireScope`]
#[derive(Clone, Debug)]
pub struct Authenticated(pub Claims);

impl<S> FromRequestParts<S> for Authenticated
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts.extensions.get::<Claims>().cloned().map(Authenticated).ok_or(Error::Unauthorized)
	}
}

// vim: ts=4
