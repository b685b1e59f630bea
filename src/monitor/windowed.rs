use super::QueryBase;
use crate::alerts::Alert;
use crate::query::{QueryParameter, ResultRow, Timestamp};
use crate::window::TimeWindow;

/// Row-count rule over a time window that advances after each successful run
///
/// The monitor never advances itself: the runner computes the next window
/// and installs it with [`replace_window`](Self::replace_window) only once a
/// run has fully succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedQueryMonitor {
    pub base: QueryBase,
    window: TimeWindow,
}

impl WindowedQueryMonitor {
    pub fn new(base: QueryBase, window: TimeWindow, now: Timestamp) -> Self {
        window.warn_if_recent(now);
        Self { base, window }
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn replace_window(&mut self, window: TimeWindow, now: Timestamp) {
        window.warn_if_recent(now);
        self.window = window;
    }

    pub fn parameters(&self) -> Vec<QueryParameter> {
        let mut params = self.base.parameters();
        params.extend(self.window.as_query_parameters());
        params
    }

    pub fn result_url(&self) -> String {
        self.base.result_url_with(&self.window.as_query_parameters())
    }

    pub fn decide(&self, rows: &[ResultRow]) -> Alert {
        self.base.row_count_alert(rows, &self.result_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::window::{END_PARAM, START_PARAM};
    use chrono::{Duration, TimeZone, Utc};

    fn start() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn monitor() -> WindowedQueryMonitor {
        let window = TimeWindow::from_start(start(), Duration::hours(6)).unwrap();
        WindowedQueryMonitor::new(
            QueryBase::new(Query::new(21, "Reverted txs", vec![]), 2),
            window,
            start() + Duration::days(30),
        )
    }

    #[test]
    fn test_window_parameters() {
        let params = monitor().parameters();
        let keys: Vec<&str> = params.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec![START_PARAM, END_PARAM]);
        assert_eq!(params[0].value, "2024-01-01 00:00:00");
        assert_eq!(params[1].value, "2024-01-01 06:00:00");
    }

    #[test]
    fn test_result_url_has_resolved_bounds() {
        let url = monitor().result_url();
        assert_eq!(
            url,
            "https://dune.com/queries/21?StartTime=2024-01-01+00%3A00%3A00&EndTime=2024-01-01+06%3A00%3A00"
        );
        assert!(!url.contains('{'));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_replace_window_moves_parameters() {
        let mut m = monitor();
        let next = m.window().next().unwrap();
        m.replace_window(next, start());
        assert_eq!(m.window(), next);
        assert_eq!(m.parameters()[0].value, "2024-01-01 06:00:00");
    }

    #[test]
    fn test_decide_uses_threshold() {
        let m = monitor();
        assert!(!m.decide(&[ResultRow::new()]).is_notify());

        let alert = m.decide(&[ResultRow::new(), ResultRow::new()]);
        assert!(alert.is_notify());
        assert!(alert.message.starts_with("Reverted txs - detected 2 cases"));
    }
}
