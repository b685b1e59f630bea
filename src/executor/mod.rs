//! Query-execution collaborator: submit a parameterized query, then poll the
//! resulting job until its rows are available

pub mod dune;
pub mod scripted;

pub use dune::DuneClient;
pub use scripted::{ScriptStep, ScriptedExecutor};

use crate::error::QueryError;
use crate::query::{Query, ResultSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`QueryExecutor`] operations
pub type QueryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueryError>> + Send + 'a>>;

/// Opaque identifier of a submitted execution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub job_id: String,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.job_id)
    }
}

/// State of a submitted execution as seen by one poll
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Finished; carries the rows in service order
    Ready(ResultSet),
    /// Still queued or executing
    Pending,
    /// Terminal failure with the service's reason
    Failed(String),
}

/// Trait for query-execution service clients
pub trait QueryExecutor: Send + Sync {
    /// Start an execution of `query` with its current parameters
    fn submit<'a>(&'a self, query: &'a Query) -> QueryFuture<'a, JobHandle>;

    /// Check on a previously submitted execution
    fn poll<'a>(&'a self, handle: &'a JobHandle) -> QueryFuture<'a, JobStatus>;
}
