/// Error types for every layer of the monitor
pub mod error;

/// Query descriptors, parameters and result rows
pub mod query;

/// Time windows for time-scoped queries
pub mod window;

/// Persistent key-value state for stateful monitors
pub mod store;

/// Alerting rules
pub mod monitor;

/// Alert values and notification clients
pub mod alerts;

/// Query-execution service clients
pub mod executor;

/// Single monitor invocation
pub mod runner;

/// Fixed-cadence scheduling of many monitors
pub mod scheduler;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{AlertError, ConfigError, DecisionError, QueryError, RunError, StoreError};
