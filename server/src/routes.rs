use axum::Router;
use axum::middleware;
use axum::routing::get;
use std::sync::Arc;

use crate::app::App;
use crate::handler;
use crate::middleware::{access_log, catch_panic};
use gatekeep_limiter::LimitLayer;

fn init_api(app: &Arc<App>) -> Router {
	let router = Router::new()
		.route("/api/health", get(handler::get_health))
		.route("/api/admin/stats", get(handler::get_stats).route_layer(app.auth.require("admin")))
		.with_state(app.clone());

	if app.config.features.enable_limiters {
		router.layer(LimitLayer::new(app.api_limiter.clone(), app.config.mode))
	} else {
		router
	}
}

pub fn init(app: &Arc<App>) -> Router {
	Router::new()
		.merge(init_api(app))
		.merge(gatekeep_auth::routes(&app.auth, app.config.mode))
		.layer(middleware::from_fn(catch_panic))
		.layer(middleware::from_fn_with_state(app.clone(), access_log))
}

// vim: ts=4
