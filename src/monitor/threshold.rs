use super::QueryBase;
use crate::alerts::Alert;
use crate::query::ResultRow;

/// Alerts when the number of returned rows reaches the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ResultThresholdQuery {
    pub base: QueryBase,
}

impl ResultThresholdQuery {
    pub fn new(base: QueryBase) -> Self {
        Self { base }
    }

    pub fn decide(&self, rows: &[ResultRow]) -> Alert {
        self.base.row_count_alert(rows, &self.base.result_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;
    use crate::query::Query;

    fn monitor(threshold: usize) -> ResultThresholdQuery {
        ResultThresholdQuery::new(QueryBase::new(Query::new(7, "Stuck orders", vec![]), threshold))
    }

    fn rows(n: usize) -> Vec<ResultRow> {
        (0..n).map(|i| ResultRow::new().with("id", i as u64)).collect()
    }

    #[test]
    fn test_alerts_at_threshold() {
        let alert = monitor(3).decide(&rows(3));
        assert_eq!(alert.kind, AlertKind::Notify);
        assert_eq!(
            alert.message,
            "Stuck orders - detected 3 cases (cf. https://dune.com/queries/7)"
        );
    }

    #[test]
    fn test_below_threshold_is_log_only() {
        let alert = monitor(3).decide(&rows(2));
        assert_eq!(alert.kind, AlertKind::LogOnly);
    }

    #[test]
    fn test_default_threshold_alerts_on_any_row() {
        assert_eq!(monitor(0).decide(&rows(1)).kind, AlertKind::Notify);
        assert_eq!(monitor(0).decide(&rows(0)).kind, AlertKind::LogOnly);
    }
}
