//! Request boundary middleware: access log and panic recovery

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use crate::app::App;
use gatekeep_limiter::VisitorLabel;
use gatekeep_limiter::extractors::extract_client_ip;
use gatekeep_types::prelude::*;

/// Logs every request under the `gatekeep::access` target
pub async fn access_log(State(app): State<Arc<App>>, req: Request, next: Next) -> Response {
	let start = Instant::now();
	let method = req.method().clone();
	let uri = req.uri().clone();
	let ip = extract_client_ip(&req, app.config.mode);

	let res = next.run(req).await;

	let label = match res.extensions().get::<VisitorLabel>() {
		Some(VisitorLabel(label)) => label.to_string(),
		None => match ip {
			Some(ip) => app.registry.bot_name(&ip).map_or_else(|| ip.to_string(), Into::into),
			None => "-".to_string(),
		},
	};
	info!(
		target: "gatekeep::access",
		"{} {} {} {} {:.3}ms",
		res.status().as_u16(),
		label,
		method,
		uri,
		start.elapsed().as_secs_f64() * 1000.0
	);
	res
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	payload
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| payload.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("unknown panic")
}

/// Turns a panic inside request handling into a 500 response
pub async fn catch_panic(req: Request, next: Next) -> Response {
	let path = req.uri().path().to_owned();

	match AssertUnwindSafe(next.run(req)).catch_unwind().await {
		Ok(res) => res,
		Err(payload) => {
			error!("PANIC in {}: {}", path, panic_message(&*payload));
			(StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": "internal server error" })))
				.into_response()
		}
	}
}


// vim: ts=4
