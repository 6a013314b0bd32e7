//! Service endpoints

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::VERSION;
use crate::app::App;
use gatekeep_auth::Authenticated;
use gatekeep_limiter::registry::RegistryStats;
use gatekeep_types::prelude::*;

#[derive(Debug, Serialize)]
pub struct Health {
	pub status: &'static str,
	pub version: &'static str,
}

/// # GET /api/health
pub async fn get_health() -> Json<Health> {
	Json(Health { status: "ok", version: VERSION })
}

/// # GET /api/admin/stats
pub async fn get_stats(
	State(app): State<Arc<App>>,
	Authenticated(claims): Authenticated,
) -> Json<RegistryStats> {
	debug!("stats requested by {}", claims.sub);
	Json(app.registry.stats())
}

// vim: ts=4
