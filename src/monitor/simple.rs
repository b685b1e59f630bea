use super::{QueryBase, ValueFormatter};
use crate::alerts::Alert;
use crate::error::DecisionError;
use crate::query::{single_row, ResultRow};

/// Relays a single numeric value on every run
///
/// The query must return exactly one row containing `column`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleQueryMonitor {
    pub base: QueryBase,
    pub column: String,
    pub formatter: ValueFormatter,
}

impl SimpleQueryMonitor {
    pub fn new(base: QueryBase, column: impl Into<String>, formatter: ValueFormatter) -> Self {
        Self {
            base,
            column: column.into(),
            formatter,
        }
    }

    pub fn decide(&self, rows: &[ResultRow]) -> Result<Alert, DecisionError> {
        let value = single_row(rows)?.numeric(&self.column)?;
        Ok(Alert::notify(format!(
            "{}: {} (cf. {})",
            self.base.name(),
            self.formatter.format(value),
            self.base.result_url()
        )))
    }
}
