pub use crate::error::{Error, GkResult};
pub use crate::types::Timestamp;

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
