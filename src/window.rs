//! Time ranges for time-scoped queries
//!
//! [`TimeWindow`] describes a `[start, end)` range that moves forward by a
//! fixed length after every successful run. [`LeftBound`] is an open-ended
//! range from a fixed start up to "now".

use crate::error::ConfigError;
use crate::query::{QueryParameter, Timestamp};
use chrono::Duration;
use log::warn;

/// Parameter name for the lower time bound
pub const START_PARAM: &str = "StartTime";
/// Parameter name for the upper time bound
pub const END_PARAM: &str = "EndTime";

/// Data newer than this may not yet be committed upstream
const FRESHNESS_MARGIN_HOURS: i64 = 2;

/// A `[start, end)` time range with the length it advances by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: Timestamp,
    end: Timestamp,
    length: Duration,
}

impl TimeWindow {
    /// Create a window, enforcing `start < end` and a positive length
    pub fn new(start: Timestamp, end: Timestamp, length: Duration) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError::ValidationError(format!(
                "window start {} must be before end {}",
                start, end
            )));
        }
        if length <= Duration::zero() {
            return Err(ConfigError::ValidationError(
                "window length must be positive".to_string(),
            ));
        }
        Ok(Self { start, end, length })
    }

    /// Window of `length` starting at `start`
    pub fn from_start(start: Timestamp, length: Duration) -> Result<Self, ConfigError> {
        let end = start.checked_add_signed(length).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "window of {} hours from {} ends outside the supported time range",
                length.num_hours(),
                start
            ))
        })?;
        Self::new(start, end, length)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    /// The window for the following run, shifted forward by `length`
    ///
    /// `self` is left untouched; callers replace their held window with the
    /// returned value once a run has succeeded. `None` when the shifted range
    /// leaves the representable time range.
    pub fn next(&self) -> Option<Self> {
        Some(Self {
            start: self.start.checked_add_signed(self.length)?,
            end: self.end.checked_add_signed(self.length)?,
            length: self.length,
        })
    }

    /// Whether `end` falls inside the margin where upstream data may be incomplete
    pub fn is_recent(&self, now: Timestamp) -> bool {
        self.end > now - Duration::hours(FRESHNESS_MARGIN_HOURS)
    }

    /// Log a caution if the window reaches into possibly uncommitted data
    pub fn warn_if_recent(&self, now: Timestamp) {
        if self.is_recent(now) {
            warn!(
                "Window end {} is less than {} hours before now, some data may not yet be available",
                self.end, FRESHNESS_MARGIN_HOURS
            );
        }
    }

    /// `StartTime` and `EndTime` parameters, in that order
    pub fn as_query_parameters(&self) -> Vec<QueryParameter> {
        vec![
            QueryParameter::datetime(START_PARAM, self.start),
            QueryParameter::datetime(END_PARAM, self.end),
        ]
    }
}

/// Open-ended lower time bound, implicitly running up to now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeftBound {
    pub start: Timestamp,
}

impl LeftBound {
    pub fn new(start: Timestamp) -> Self {
        Self { start }
    }

    pub fn as_query_parameters(&self) -> Vec<QueryParameter> {
        vec![QueryParameter::datetime(START_PARAM, self.start)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(day: u32, hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_or_empty_range() {
        assert!(TimeWindow::new(ts(2, 0), ts(1, 0), Duration::hours(1)).is_err());
        assert!(TimeWindow::new(ts(1, 0), ts(1, 0), Duration::hours(1)).is_err());
        assert!(TimeWindow::new(ts(1, 0), ts(2, 0), Duration::zero()).is_err());
    }

    #[test]
    fn test_next_shifts_by_length_without_touching_original() {
        let window = TimeWindow::new(ts(1, 0), ts(2, 0), Duration::hours(6)).unwrap();
        let next = window.next().unwrap();

        assert_eq!(next.start(), ts(1, 6));
        assert_eq!(next.end(), ts(2, 6));
        assert_eq!(next.length(), Duration::hours(6));

        assert_eq!(window.start(), ts(1, 0));
        assert_eq!(window.end(), ts(2, 0));
    }

    #[test]
    fn test_from_start() {
        let window = TimeWindow::from_start(ts(1, 0), Duration::days(1)).unwrap();
        assert_eq!(window.end(), ts(2, 0));
    }

    #[test]
    fn test_out_of_range_arithmetic_is_an_error() {
        let huge = Duration::hours(i64::from(u32::MAX));
        assert!(matches!(
            TimeWindow::from_start(ts(1, 0), huge),
            Err(ConfigError::ValidationError(_))
        ));

        let window = TimeWindow::new(ts(1, 0), ts(2, 0), huge).unwrap();
        assert!(window.next().is_none());
    }

    #[test]
    fn test_is_recent() {
        let window = TimeWindow::new(ts(1, 0), ts(2, 0), Duration::days(1)).unwrap();
        assert!(!window.is_recent(ts(3, 0)));
        assert!(!window.is_recent(ts(2, 2)));
        assert!(window.is_recent(ts(2, 1)));
        assert!(window.is_recent(ts(1, 12)));
    }

    #[test]
    fn test_window_parameters_resolved() {
        let window = TimeWindow::new(ts(1, 0), ts(2, 0), Duration::days(1)).unwrap();
        let params = window.as_query_parameters();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].key, "StartTime");
        assert_eq!(params[0].value, "2024-01-01 00:00:00");
        assert_eq!(params[1].key, "EndTime");
        assert_eq!(params[1].value, "2024-01-02 00:00:00");
    }

    #[test]
    fn test_left_bound_parameters() {
        let bound = LeftBound::new(ts(5, 12));
        let params = bound.as_query_parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].key, "StartTime");
        assert_eq!(params[0].value, "2024-01-05 12:00:00");
    }
}
