use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors reported by the query-execution service
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Failed to submit query {query_id}: {reason}")]
    SubmitFailed { query_id: u64, reason: String },

    #[error("Execution {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Execution {job_id} not ready after {attempts} polls")]
    PollExhausted { job_id: String, attempts: u32 },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Errors raised while turning a result set into an alert decision
///
/// These indicate a mismatch between the configured rule and what the query
/// actually returns, so they are always propagated to the caller.
#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("Expected {expected} result row(s), got {actual}")]
    RowCount { expected: usize, actual: usize },

    #[error("Column '{0}' missing from result row")]
    MissingColumn(String),

    #[error("Column '{column}' is not numeric: {value}")]
    NonNumeric { column: String, value: String },

    #[error("Stored value for '{key}' is not numeric: {value}")]
    CorruptState { key: String, value: String },

    #[error("State store error: {0}")]
    State(#[from] StoreError),
}

/// Errors from the persistent state store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("State unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors that can occur when delivering notifications
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Failed to send notification: {0}")]
    NotificationFailed(String),

    #[error("Alert type not supported: {0}")]
    Unsupported(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Errors that fail a single monitor run
///
/// Delivery failures are deliberately absent: a computed decision stands even
/// when the notification cannot be sent.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Query execution failed: {0}")]
    Query(#[from] QueryError),

    #[error("Decision failed: {0}")]
    Decision(#[from] DecisionError),

    #[error("Window of '{0}' cannot advance past the supported time range")]
    WindowOutOfRange(String),

    #[error("Run cancelled by shutdown")]
    Cancelled,
}
