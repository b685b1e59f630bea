use super::{bucket, QueryBase, ValueFormatter};
use crate::alerts::Alert;
use crate::error::{DecisionError, StoreError};
use crate::query::{single_row, ResultRow};
use crate::store::StateStore;
use log::debug;
use std::cmp::Ordering;

/// Alerts when a value moves into a different bucket of width `width`
///
/// The last observed value is persisted under [`IntervalQueryMonitor::key`],
/// so crossings are detected across process restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalQueryMonitor {
    pub base: QueryBase,
    pub column: String,
    pub formatter: ValueFormatter,
    pub width: f64,
}

impl IntervalQueryMonitor {
    pub fn new(
        base: QueryBase,
        column: impl Into<String>,
        formatter: ValueFormatter,
        width: f64,
    ) -> Self {
        Self {
            base,
            column: column.into(),
            formatter,
            width,
        }
    }

    /// State key for this column and width
    ///
    /// Integral widths keep a trailing `.0` so keys written by earlier
    /// deployments (`total_interval_1000.0`) keep resolving.
    pub fn key(&self) -> String {
        if self.width.fract() == 0.0 {
            format!("{}_interval_{:.1}", self.column, self.width)
        } else {
            format!("{}_interval_{}", self.column, self.width)
        }
    }

    fn previous(&self, store: &StateStore, key: &str) -> Result<Option<f64>, DecisionError> {
        let raw = match store.get(key) {
            Ok(raw) => raw,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(DecisionError::CorruptState {
                key: key.to_string(),
                value: raw,
            }),
        }
    }

    pub async fn decide(
        &self,
        rows: &[ResultRow],
        store: &StateStore,
    ) -> Result<Alert, DecisionError> {
        let value = single_row(rows)?.numeric(&self.column)?;
        let key = self.key();

        let _guard = store.lock_key(&key).await;
        let previous = self.previous(store, &key)?;
        store.set(&key, &value.to_string()).await?;

        let Some(previous) = previous else {
            return Ok(Alert::log_only(format!(
                "First time setting key: {} in db",
                key
            )));
        };

        let current_bucket = bucket(value, self.width);
        let previous_bucket = bucket(previous, self.width);
        debug!(
            "{}: bucket {} -> {} (width {})",
            self.base.name(),
            previous_bucket,
            current_bucket,
            self.width
        );

        let alert = match current_bucket.cmp(&previous_bucket) {
            Ordering::Greater => Alert::notify(format!(
                "{} exceeded {} with {} (cf. {})",
                self.base.name(),
                self.formatter.format(self.width * current_bucket as f64),
                self.formatter.format(value),
                self.base.result_url()
            )),
            Ordering::Less => Alert::notify(format!(
                "{} dropped below {} with {} (cf. {})",
                self.base.name(),
                self.formatter.format(self.width * (current_bucket + 1) as f64),
                self.formatter.format(value),
                self.base.result_url()
            )),
            Ordering::Equal => Alert::log_only("Interval remained the same as before"),
        };
        Ok(alert)
    }
}
