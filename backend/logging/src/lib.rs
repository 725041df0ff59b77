//! Structured logging for SnapSage.
//!
//! Console plus rolling NDJSON file output, secret redaction for upstream
//! error text, and the pipeline event logger.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
