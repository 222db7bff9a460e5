/// Error types for fetching, notifying and configuration
pub mod error;

/// Snapshot data model and record parsing
pub mod snapshot;

/// Snapshot fetching with retries
pub mod collectors;

/// Alert thresholds, state engine, messages and notification sinks
pub mod alerts;

/// Configuration management
pub mod config;

/// Periodic poll loop
pub mod monitor;

// Re-export commonly used types
pub use error::{ConfigError, FetchError, NotifyError, RecordError};
pub use monitor::{CycleReport, Monitor};
pub use snapshot::{Category, Snapshot};
