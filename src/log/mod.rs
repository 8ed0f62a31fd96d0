//! Logging seam for long-lived components.
//!
//! The coordinator, workers, translator and network clients all receive an
//! `Arc<dyn Logger>` at construction instead of reaching for a process-wide
//! logger. The binary wires in [`TracingLogger`]; tests pass [`NoOpLogger`]
//! or a capturing logger and assert on what was emitted.
//!
//! ```
//! use aprs2influx::log::{Logger, NoOpLogger};
//! use aprs2influx::log_info;
//! use std::sync::Arc;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
//! log_info!(logger, "consume loop started");
//! ```

mod logger;
mod noop;
mod tracing_adapter;

pub use logger::{LogLevel, Logger};
pub use noop::NoOpLogger;
pub use tracing_adapter::TracingLogger;
