//! Shared types for the gatekeep admission-and-identity layer.
//!
//! Holds the error type, the storage adapter trait, cookie helpers and the
//! runtime plumbing (worker pool, background tasks) used by every component.

pub mod auth_adapter;
pub mod background;
pub mod cookie;
pub mod error;
pub mod prelude;
pub mod types;
pub mod worker;

// vim: ts=4
