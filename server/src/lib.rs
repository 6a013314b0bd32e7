//! gatekeep server
//!
//! Puts the visitor tracker, the admission limiters and session
//! authentication in front of a small API and serves it with axum.

pub mod app;
pub mod config;
pub mod handler;
pub mod middleware;
pub mod routes;

pub use app::{Adapters, App};
pub use config::Config;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// vim: ts=4
