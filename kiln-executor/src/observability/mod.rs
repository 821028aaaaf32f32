//! Tracing setup for processes embedding the build engine.
//!
//! The executor emits `tracing` events and spans (`compile`, `start`, one
//! `apply` span per operator) with `schedule_id`, `vertex` and `operator`
//! fields. This module installs a subscriber for them.
//!
//! Output format is controlled via `KILN_LOG_FORMAT`:
//! - `json` - Structured JSON output (default for non-TTY)
//! - `pretty` - Human-readable colored output (default for TTY)
//! - `compact` - Compact single-line format
//!
//! The filter comes from `KILN_LOG_LEVEL`, then `RUST_LOG`, then `info`.
//!
//! # Example
//!
//! ```ignore
//! use kiln_executor::observability::{LogFormat, TracingConfig, init_tracing};
//!
//! let config = TracingConfig::builder()
//!     .log_format(LogFormat::Json)
//!     .log_filter("info,kiln_executor=debug")
//!     .build();
//! let _guard = init_tracing(config)?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::{TracingGuard, init_tracing};
