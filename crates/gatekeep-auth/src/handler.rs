//! Auth endpoints

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::Auth;
use crate::guard::Authenticated;
use crate::session::RegisterError;
use crate::token::TokenKind;
use gatekeep_limiter::{LimitLayer, ServerMode};
use gatekeep_tracker::TrackingInfo;
use gatekeep_types::cookie::CookieJar;
use gatekeep_types::prelude::*;

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
	pub user: String,
	pub pass: String,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse<'a> {
	pub user: &'a str,
	pub scope: &'a [Box<str>],
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
	pub user: String,
	pub email: String,
	pub pass: String,
}

/// # POST /auth/signin/
async fn post_signin(State(auth): State<Arc<Auth>>, headers: HeaderMap, body: Bytes) -> Response {
	let mut jar = CookieJar::new();
	auth.sign_out(&headers, &mut jar);

	let req: SigninRequest = match serde_json::from_slice(&body) {
		Ok(req) => req,
		Err(err) => {
			debug!("signin: bad request: {}", err);
			return (jar, Error::Parse).into_response();
		}
	};

	match auth.sign_in(&req.user, &req.pass, &mut jar).await {
		Ok(claims) => {
			let res = SigninResponse { user: claims.username(), scope: &claims.scope };
			(jar, Json(res)).into_response()
		}
		Err(err) => (jar, err).into_response(),
	}
}

/// # GET /auth/signout/
async fn get_signout(State(auth): State<Arc<Auth>>, headers: HeaderMap) -> Response {
	let mut jar = CookieJar::new();
	auth.sign_out(&headers, &mut jar);
	(jar, Redirect::to("/")).into_response()
}

/// # POST /auth/register/
async fn post_register(State(auth): State<Arc<Auth>>, body: Bytes) -> Response {
	let req: RegisterRequest = match serde_json::from_slice(&body) {
		Ok(req) => req,
		Err(err) => {
			debug!("register: bad request: {}", err);
			return Error::Parse.into_response();
		}
	};

	match auth.register(&req.user, &req.email, &req.pass).await {
		Ok(_) => Json(json!({ "user": req.user })).into_response(),
		Err(RegisterError::Invalid(msg)) => Json(json!({ "error": msg })).into_response(),
		Err(RegisterError::Internal(err)) => err.into_response(),
	}
}

/// # GET /auth/test/
async fn get_test(
	State(auth): State<Arc<Auth>>,
	headers: HeaderMap,
	Authenticated(access): Authenticated,
	info: Option<Extension<TrackingInfo>>,
) -> Json<serde_json::Value> {
	Json(json!({
		"welcome": format!("Welcome {}!", access.username()),
		"access": access,
		"refresh": auth.token_claims(&headers, TokenKind::Refresh),
		"session": auth.token_claims(&headers, TokenKind::Session),
		"id": info.map(|Extension(info)| info),
	}))
}

/// Auth routes, all behind the auth limiter
pub fn routes(auth: &Arc<Auth>, mode: ServerMode) -> Router {
	let mut router = Router::new()
		.route("/auth/signin/", post(post_signin))
		.route("/auth/signout/", get(get_signout))
		.route("/auth/test/", get(get_test).route_layer(auth.require("admin")));
	if auth.config().enable_registration {
		router = router.route("/auth/register/", post(post_register));
	}

	router.layer(LimitLayer::new(auth.limiter().clone(), mode)).with_state(auth.clone())
}

// vim: ts=4
