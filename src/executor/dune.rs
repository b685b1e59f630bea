use super::{JobHandle, JobStatus, QueryExecutor, QueryFuture};
use crate::error::QueryError;
use crate::query::{Query, ResultSet};
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.dune.com";
const API_KEY_HEADER: &str = "X-Dune-API-Key";

/// HTTP client for the Dune execution API
pub struct DuneClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Request body for `POST /query/{id}/execute`
#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    query_parameters: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    execution_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    state: String,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    result: Option<ResultBody>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    #[serde(default)]
    rows: ResultSet,
}

/// Coarse classification of an execution state string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionState {
    Completed,
    Running,
    Terminal,
}

impl ExecutionState {
    fn classify(state: &str) -> Self {
        match state {
            "QUERY_STATE_COMPLETED" => Self::Completed,
            "QUERY_STATE_FAILED" | "QUERY_STATE_CANCELLED" | "QUERY_STATE_EXPIRED" => {
                Self::Terminal
            }
            _ => Self::Running,
        }
    }
}

impl DuneClient {
    /// Create a client for the public Dune API
    pub fn new(api_key: String) -> Result<Self, QueryError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client against a custom API root
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, QueryError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, &self.api_key)
    }

    fn execute_request(query: &Query) -> ExecuteRequest<'_> {
        ExecuteRequest {
            query_parameters: query
                .params
                .iter()
                .map(|p| (p.key.as_str(), p.value.as_str()))
                .collect(),
        }
    }

    async fn fetch_results(&self, handle: &JobHandle) -> Result<ResultSet, QueryError> {
        let url = self.api_url(&format!("execution/{}/results", handle.job_id));
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await?
            .error_for_status()?;

        let body: ResultsResponse = response.json().await?;
        body.result.map(|r| r.rows).ok_or_else(|| {
            QueryError::InvalidResponse(format!("execution {} has no result body", handle))
        })
    }
}

impl QueryExecutor for DuneClient {
    fn submit<'a>(&'a self, query: &'a Query) -> QueryFuture<'a, JobHandle> {
        Box::pin(async move {
            let url = self.api_url(&format!("query/{}/execute", query.id));
            let response = self
                .authorized(self.client.post(url))
                .json(&Self::execute_request(query))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(QueryError::SubmitFailed {
                    query_id: query.id,
                    reason: format!("{}: {}", status, error_text),
                });
            }

            let body: ExecuteResponse = response.json().await?;
            debug!("Query {} submitted as execution {}", query.id, body.execution_id);
            Ok(JobHandle::new(body.execution_id))
        })
    }

    fn poll<'a>(&'a self, handle: &'a JobHandle) -> QueryFuture<'a, JobStatus> {
        Box::pin(async move {
            let url = self.api_url(&format!("execution/{}/status", handle.job_id));
            let response = self
                .authorized(self.client.get(url))
                .send()
                .await?
                .error_for_status()?;

            let status: StatusResponse = response.json().await?;
            match ExecutionState::classify(&status.state) {
                ExecutionState::Completed => Ok(JobStatus::Ready(self.fetch_results(handle).await?)),
                ExecutionState::Running => Ok(JobStatus::Pending),
                ExecutionState::Terminal => {
                    let reason = match status.error {
                        Some(detail) => format!("{} ({})", status.state, detail),
                        None => status.state,
                    };
                    Ok(JobStatus::Failed(reason))
                }
            }
        })
    }
}
