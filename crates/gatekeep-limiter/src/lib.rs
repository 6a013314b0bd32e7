//! Admission control
//!
//! Every named resource ("api", "auth", ...) gets its own [`Limiter`] holding
//! per-visitor token buckets. Bot classification is shared through one
//! [`AdmissionRegistry`] passed to every limiter: a visitor whose user agent
//! claims to be a search engine crawler is verified in the background with a
//! reverse and forward DNS lookup and, if it checks out, gets the looser good
//! bot rate in every limiter.

pub mod botcheck;
pub mod bucket;
pub mod config;
pub mod error;
pub mod extractors;
pub mod limiter;
pub mod middleware;
pub mod registry;
pub mod resolver;
pub mod visitor;

pub use config::{LimiterConfig, Rate};
pub use error::LimitError;
pub use extractors::ServerMode;
pub use limiter::{Admission, Limiter};
pub use middleware::{LimitLayer, VisitorLabel};
pub use registry::AdmissionRegistry;
pub use resolver::{BotResolver, DnsError, HickoryBotResolver};
pub use visitor::VisitorKind;

/// Request header carrying the visitor display name for downstream logging
pub const VISITOR_NAME_HEADER: &str = "visitor-name";

// vim: ts=4
