//! Alerting rules that turn a query result into an alert decision
//!
//! Every rule embeds a [`QueryBase`] and is one variant of the closed
//! [`QueryMonitor`] enum, which exposes the shared contract: the parameters to
//! execute with, a link to the result, and `decide`.

pub mod counter;
pub mod formatter;
pub mod interval;
pub mod left_bounded;
pub mod simple;
pub mod threshold;
pub mod windowed;

pub use counter::CounterQueryMonitor;
pub use formatter::ValueFormatter;
pub use interval::IntervalQueryMonitor;
pub use left_bounded::LeftBoundedQueryMonitor;
pub use simple::SimpleQueryMonitor;
pub use threshold::ResultThresholdQuery;
pub use windowed::WindowedQueryMonitor;

use crate::alerts::Alert;
use crate::error::DecisionError;
use crate::query::{Query, QueryParameter, ResultRow, Timestamp};
use crate::store::StateStore;
use crate::window::TimeWindow;

/// Fields shared by every monitor variant
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBase {
    pub query: Query,
    /// Minimum number of result rows that raises an alert
    pub threshold: usize,
}

impl QueryBase {
    pub fn new(query: Query, threshold: usize) -> Self {
        Self { query, threshold }
    }

    pub fn name(&self) -> &str {
        &self.query.name
    }

    /// The configured parameters, in configuration order
    pub fn parameters(&self) -> Vec<QueryParameter> {
        self.query.params.clone()
    }

    pub fn result_url(&self) -> String {
        self.query.url()
    }

    /// Link to the query with `params` set, percent-encoded
    pub fn result_url_with(&self, params: &[QueryParameter]) -> String {
        let base = self.query.url();
        let pairs = params.iter().map(|p| (p.key.as_str(), p.value.as_str()));
        match reqwest::Url::parse_with_params(&base, pairs) {
            Ok(url) => url.to_string(),
            Err(_) => base,
        }
    }

    /// Row-count rule: alert when a non-empty result reaches the threshold
    pub fn row_count_alert(&self, rows: &[ResultRow], result_url: &str) -> Alert {
        let count = rows.len();
        if count > 0 && count >= self.threshold {
            Alert::notify(format!(
                "{} - detected {} cases (cf. {})",
                self.name(),
                count,
                result_url
            ))
        } else {
            Alert::log_only(format!(
                "{} returned {} rows, below alert threshold {}",
                self.name(),
                count,
                self.threshold
            ))
        }
    }
}

/// Interval bucket of `value`: the `k` with `k * width <= value < (k + 1) * width`
///
/// This is `floor(value / width)`, corrected for floating-point rounding so
/// that a value sitting exactly on an edge belongs to the bucket starting there.
pub fn bucket(value: f64, width: f64) -> i64 {
    let mut k = (value / width).floor();
    if (k + 1.0) * width <= value {
        k += 1.0;
    } else if k * width > value {
        k -= 1.0;
    }
    k as i64
}

/// The closed set of monitor variants
#[derive(Debug, Clone)]
pub enum QueryMonitor {
    ResultThreshold(ResultThresholdQuery),
    Simple(SimpleQueryMonitor),
    Counter(CounterQueryMonitor),
    Interval(IntervalQueryMonitor),
    LeftBounded(LeftBoundedQueryMonitor),
    Windowed(WindowedQueryMonitor),
}

impl QueryMonitor {
    fn base(&self) -> &QueryBase {
        match self {
            Self::ResultThreshold(m) => &m.base,
            Self::Simple(m) => &m.base,
            Self::Counter(m) => &m.base,
            Self::Interval(m) => &m.base,
            Self::LeftBounded(m) => &m.base,
            Self::Windowed(m) => &m.base,
        }
    }

    pub fn name(&self) -> &str {
        self.base().name()
    }

    /// Short variant label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResultThreshold(_) => "result-threshold",
            Self::Simple(_) => "simple",
            Self::Counter(_) => "counter",
            Self::Interval(_) => "interval",
            Self::LeftBounded(_) => "left-bounded",
            Self::Windowed(_) => "windowed",
        }
    }

    /// Parameters for the next execution: fixed ones, then computed ones
    pub fn parameters(&self) -> Vec<QueryParameter> {
        match self {
            Self::LeftBounded(m) => m.parameters(),
            Self::Windowed(m) => m.parameters(),
            _ => self.base().parameters(),
        }
    }

    /// The query re-parameterized for the next execution
    pub fn query(&self) -> Query {
        self.base().query.with_params(self.parameters())
    }

    pub fn result_url(&self) -> String {
        match self {
            Self::LeftBounded(m) => m.result_url(),
            Self::Windowed(m) => m.result_url(),
            _ => self.base().result_url(),
        }
    }

    /// Evaluate a result set
    ///
    /// Only the interval variant touches `store`; it does so inside the
    /// per-key critical section.
    pub async fn decide(
        &self,
        rows: &[ResultRow],
        store: &StateStore,
    ) -> Result<Alert, DecisionError> {
        match self {
            Self::ResultThreshold(m) => Ok(m.decide(rows)),
            Self::Simple(m) => m.decide(rows),
            Self::Counter(m) => m.decide(rows),
            Self::Interval(m) => m.decide(rows, store).await,
            Self::LeftBounded(m) => Ok(m.decide(rows)),
            Self::Windowed(m) => Ok(m.decide(rows)),
        }
    }

    /// State key written by `decide`, if the variant keeps state
    pub fn state_key(&self) -> Option<String> {
        match self {
            Self::Interval(m) => Some(m.key()),
            _ => None,
        }
    }

    pub fn window(&self) -> Option<TimeWindow> {
        match self {
            Self::Windowed(m) => Some(m.window()),
            _ => None,
        }
    }

    /// The window the next run should use after a successful run
    ///
    /// `None` for variants without a window and for windows that cannot
    /// advance any further.
    pub fn next_window(&self) -> Option<TimeWindow> {
        self.window().and_then(|w| w.next())
    }

    /// Install a new window; ignored by variants without one
    pub fn replace_window(&mut self, window: TimeWindow, now: Timestamp) {
        if let Self::Windowed(m) = self {
            m.replace_window(window, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;
    use crate::store::MemoryStateBackend;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn base(threshold: usize) -> QueryBase {
        QueryBase::new(
            Query::new(42, "Test Query", vec![QueryParameter::text("Token", "WETH")]),
            threshold,
        )
    }

    #[test]
    fn test_bucket_examples() {
        assert_eq!(bucket(0.0, 10.0), 0);
        assert_eq!(bucket(9.999, 10.0), 0);
        assert_eq!(bucket(10.0, 10.0), 1);
        assert_eq!(bucket(25.0, 10.0), 2);
        assert_eq!(bucket(-0.5, 10.0), -1);
        assert_eq!(bucket(-10.0, 10.0), -1);
        assert_eq!(bucket(-10.5, 10.0), -2);
        assert_eq!(bucket(3.0 * 0.1, 0.1), 3);
    }

    #[test]
    fn test_row_count_alert() {
        let rows = vec![ResultRow::new(), ResultRow::new()];

        let alert = base(2).row_count_alert(&rows, "url");
        assert_eq!(alert.kind, AlertKind::Notify);
        assert_eq!(alert.message, "Test Query - detected 2 cases (cf. url)");

        let alert = base(3).row_count_alert(&rows, "url");
        assert_eq!(alert.kind, AlertKind::LogOnly);

        let alert = base(0).row_count_alert(&[], "url");
        assert_eq!(alert.kind, AlertKind::LogOnly);
    }

    #[test]
    fn test_result_url_with_params_is_encoded() {
        let url = base(0).result_url_with(&[QueryParameter::text("Start Time", "a&b")]);
        assert_eq!(url, "https://dune.com/queries/42?Start+Time=a%26b");
    }

    #[tokio::test]
    async fn test_enum_dispatch() {
        let store = StateStore::open(Arc::new(MemoryStateBackend::new()))
            .await
            .unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::from_start(start, Duration::days(1)).unwrap();

        let mut monitor =
            QueryMonitor::Windowed(WindowedQueryMonitor::new(base(1), window, start));
        assert_eq!(monitor.name(), "Test Query");
        assert_eq!(monitor.kind(), "windowed");
        assert_eq!(monitor.parameters().len(), 3);
        assert_eq!(monitor.query().params.len(), 3);
        assert!(monitor.state_key().is_none());

        let alert = monitor.decide(&[ResultRow::new()], &store).await.unwrap();
        assert!(alert.is_notify());

        let next = monitor.next_window().unwrap();
        assert_eq!(Some(next), window.next());
        // Computing the next window does not move the held one.
        assert_eq!(monitor.window(), Some(window));

        monitor.replace_window(next, start);
        assert_eq!(monitor.window(), Some(next));

        let plain = QueryMonitor::ResultThreshold(ResultThresholdQuery::new(base(0)));
        assert!(plain.next_window().is_none());
        assert_eq!(plain.result_url(), "https://dune.com/queries/42");
        assert_eq!(plain.parameters(), base(0).parameters());
    }
}
