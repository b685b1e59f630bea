use super::{JobHandle, JobStatus, QueryExecutor, QueryFuture};
use crate::error::QueryError;
use crate::query::{Query, ResultSet};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// One scripted answer to a poll
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Status(JobStatus),
    /// Simulated transport failure
    Error(String),
}

/// Executor that replays a fixed sequence of poll answers
///
/// Once the script runs out every further poll reports `Pending`. Clones share
/// state, so a test can keep a handle to inspect submitted queries.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    steps: Arc<Mutex<VecDeque<ScriptStep>>>,
    submitted: Arc<Mutex<Vec<Query>>>,
    polls: Arc<Mutex<u32>>,
    reject_submit: bool,
}

impl ScriptedExecutor {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Executor answering the first poll with `rows`
    pub fn ready(rows: ResultSet) -> Self {
        Self::new([ScriptStep::Status(JobStatus::Ready(rows))])
    }

    /// Executor whose submissions are all refused
    pub fn rejecting() -> Self {
        Self {
            reject_submit: true,
            ..Self::default()
        }
    }

    /// Queries submitted so far, with the parameters they were submitted with
    pub fn submitted(&self) -> Vec<Query> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn poll_count(&self) -> u32 {
        *self.polls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueryExecutor for ScriptedExecutor {
    fn submit<'a>(&'a self, query: &'a Query) -> QueryFuture<'a, JobHandle> {
        Box::pin(async move {
            if self.reject_submit {
                return Err(QueryError::SubmitFailed {
                    query_id: query.id,
                    reason: "scripted rejection".to_string(),
                });
            }
            let mut submitted = self.submitted.lock().unwrap_or_else(PoisonError::into_inner);
            submitted.push(query.clone());
            Ok(JobHandle::new(format!("scripted-{}", submitted.len())))
        })
    }

    fn poll<'a>(&'a self, _handle: &'a JobHandle) -> QueryFuture<'a, JobStatus> {
        Box::pin(async move {
            *self.polls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
            let step = self
                .steps
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match step {
                Some(ScriptStep::Status(status)) => Ok(status),
                Some(ScriptStep::Error(reason)) => Err(QueryError::InvalidResponse(reason)),
                None => Ok(JobStatus::Pending),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ResultRow;

    #[tokio::test]
    async fn test_replays_script_then_pends() {
        let executor = ScriptedExecutor::new([
            ScriptStep::Status(JobStatus::Pending),
            ScriptStep::Error("connection reset".to_string()),
            ScriptStep::Status(JobStatus::Ready(vec![ResultRow::new()])),
        ]);
        let query = Query::new(1, "q", vec![]);
        let handle = executor.submit(&query).await.unwrap();
        assert_eq!(handle.job_id, "scripted-1");

        assert_eq!(executor.poll(&handle).await.unwrap(), JobStatus::Pending);
        assert!(executor.poll(&handle).await.is_err());
        assert!(matches!(
            executor.poll(&handle).await.unwrap(),
            JobStatus::Ready(rows) if rows.len() == 1
        ));
        assert_eq!(executor.poll(&handle).await.unwrap(), JobStatus::Pending);
        assert_eq!(executor.poll_count(), 4);
        assert_eq!(executor.submitted(), vec![query]);
    }

    #[tokio::test]
    async fn test_rejecting_executor() {
        let executor = ScriptedExecutor::rejecting();
        let result = executor.submit(&Query::new(5, "q", vec![])).await;
        assert!(matches!(
            result,
            Err(QueryError::SubmitFailed { query_id: 5, .. })
        ));
    }
}
