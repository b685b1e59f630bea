use super::QueryBase;
use crate::alerts::Alert;
use crate::error::DecisionError;
use crate::query::{single_row, ResultRow};

/// Alerts when a single numeric value reaches a fixed level (inclusive)
#[derive(Debug, Clone, PartialEq)]
pub struct CounterQueryMonitor {
    pub base: QueryBase,
    pub column: String,
    pub alert_value: f64,
}

impl CounterQueryMonitor {
    pub fn new(base: QueryBase, column: impl Into<String>, alert_value: f64) -> Self {
        Self {
            base,
            column: column.into(),
            alert_value,
        }
    }

    pub fn decide(&self, rows: &[ResultRow]) -> Result<Alert, DecisionError> {
        let value = single_row(rows)?.numeric(&self.column)?;

        if value >= self.alert_value {
            Ok(Alert::notify(format!(
                "{} reached {} with {} (cf. {})",
                self.base.name(),
                self.alert_value,
                value,
                self.base.result_url()
            )))
        } else {
            Ok(Alert::log_only(format!(
                "{} at {}, below alert value {}",
                self.base.name(),
                value,
                self.alert_value
            )))
        }
    }
}
