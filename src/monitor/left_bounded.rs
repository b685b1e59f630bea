use super::QueryBase;
use crate::alerts::Alert;
use crate::query::{QueryParameter, ResultRow};
use crate::window::LeftBound;

/// Row-count rule over everything since a fixed start time
#[derive(Debug, Clone, PartialEq)]
pub struct LeftBoundedQueryMonitor {
    pub base: QueryBase,
    pub left_bound: LeftBound,
}

impl LeftBoundedQueryMonitor {
    pub fn new(base: QueryBase, left_bound: LeftBound) -> Self {
        Self { base, left_bound }
    }

    pub fn parameters(&self) -> Vec<QueryParameter> {
        let mut params = self.base.parameters();
        params.extend(self.left_bound.as_query_parameters());
        params
    }

    pub fn result_url(&self) -> String {
        self.base.result_url_with(&self.left_bound.as_query_parameters())
    }

    pub fn decide(&self, rows: &[ResultRow]) -> Alert {
        self.base.row_count_alert(rows, &self.result_url())
    }
}
