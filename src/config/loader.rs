use super::schema::{AlertValue, MonitorFile, ParameterEntry, WindowSection};
use crate::alerts::AlertType;
use crate::error::ConfigError;
use crate::monitor::{
    CounterQueryMonitor, IntervalQueryMonitor, LeftBoundedQueryMonitor, QueryBase, QueryMonitor,
    ResultThresholdQuery, SimpleQueryMonitor, ValueFormatter, WindowedQueryMonitor,
};
use crate::query::{ParameterType, Query, QueryParameter, Timestamp, DATETIME_FORMAT};
use crate::window::{LeftBound, TimeWindow};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use log::debug;
use std::path::Path;

/// Window length used when neither `end` nor `length_hours` is given
const DEFAULT_WINDOW_HOURS: i64 = 6;

/// A fully constructed monitor plus how to run and report it
#[derive(Debug, Clone)]
pub struct Config {
    pub monitor: QueryMonitor,
    pub ping_frequency: std::time::Duration,
    pub max_poll_attempts: u32,
    /// Channel override; falls back to the process-wide default when absent
    pub alert_channel: Option<String>,
    pub alert_type: AlertType,
}

/// How a `column` + `alert_value` pair is interpreted
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnRule {
    Counter(f64),
    Interval(f64),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
    let config = load_config_str(&contents)?;
    debug!("Config {} loaded as {:?}", path.display(), config);
    Ok(config)
}

pub fn load_config_str(text: &str) -> Result<Config, ConfigError> {
    let file: MonitorFile = toml::from_str(text)?;
    build_config(file, Utc::now())
}

/// Validate a parsed file and construct its monitor
///
/// `now` only feeds the freshness caution logged for windowed monitors.
pub fn build_config(file: MonitorFile, now: Timestamp) -> Result<Config, ConfigError> {
    validate(&file)?;

    let params = file
        .parameters
        .iter()
        .map(parameter)
        .collect::<Result<Vec<_>, _>>()?;
    let base = QueryBase::new(Query::new(file.id, file.name.clone(), params), file.threshold);

    let monitor = if let Some(window) = &file.window {
        QueryMonitor::Windowed(WindowedQueryMonitor::new(base, time_window(window)?, now))
    } else if let Some(left_bound) = &file.left_bound {
        QueryMonitor::LeftBounded(LeftBoundedQueryMonitor::new(
            base,
            LeftBound::new(parse_timestamp(left_bound)?),
        ))
    } else if let Some(column) = &file.column {
        match &file.alert_value {
            Some(value) => match column_rule(value)? {
                ColumnRule::Counter(alert_value) => {
                    QueryMonitor::Counter(CounterQueryMonitor::new(base, column, alert_value))
                }
                ColumnRule::Interval(width) => QueryMonitor::Interval(IntervalQueryMonitor::new(
                    base,
                    column,
                    ValueFormatter::parse(&file.formatter)?,
                    width,
                )),
            },
            None => QueryMonitor::Simple(SimpleQueryMonitor::new(
                base,
                column,
                ValueFormatter::parse(&file.formatter)?,
            )),
        }
    } else {
        QueryMonitor::ResultThreshold(ResultThresholdQuery::new(base))
    };

    Ok(Config {
        monitor,
        ping_frequency: std::time::Duration::from_secs(file.ping_frequency),
        max_poll_attempts: file.max_poll_attempts,
        alert_channel: file.alert_channel.filter(|c| !c.trim().is_empty()),
        alert_type: AlertType::from_str_ci(&file.alert_type)?,
    })
}

fn validate(file: &MonitorFile) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if file.name.trim().is_empty() {
        return invalid("name must not be empty");
    }
    if file.ping_frequency == 0 {
        return invalid("ping_frequency must be > 0");
    }
    if file.max_poll_attempts == 0 {
        return invalid("max_poll_attempts must be > 0");
    }
    if file.window.is_some() && file.left_bound.is_some() {
        return invalid("window and left_bound are mutually exclusive");
    }
    if (file.window.is_some() || file.left_bound.is_some()) && file.column.is_some() {
        return invalid("column cannot be combined with window or left_bound");
    }
    if file.alert_value.is_some() && file.column.is_none() {
        return invalid("alert_value requires column");
    }
    Ok(())
}

fn parameter(entry: &ParameterEntry) -> Result<QueryParameter, ConfigError> {
    if entry.kind == ParameterType::Datetime {
        let raw = match &entry.value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Datetime(d) => d.to_string(),
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "datetime parameter '{}' has non-timestamp value {}",
                    entry.key, other
                )))
            }
        };
        return Ok(QueryParameter::datetime(entry.key.clone(), parse_timestamp(&raw)?));
    }

    let value = match &entry.value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        other => {
            return Err(ConfigError::ValidationError(format!(
                "parameter '{}' has unsupported value {}",
                entry.key, other
            )))
        }
    };
    Ok(QueryParameter {
        key: entry.key.clone(),
        value,
        kind: entry.kind,
    })
}

/// Offset-less layouts, taken as UTC
const NAIVE_FORMATS: [&str; 2] = [DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS` (taken as UTC) or RFC 3339
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, ConfigError> {
    let raw = raw.trim();
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ConfigError::ParseError(format!("invalid timestamp '{}': {}", raw, e)))
}

fn time_window(section: &WindowSection) -> Result<TimeWindow, ConfigError> {
    let start = parse_timestamp(&section.start)?;
    let end = section.end.as_deref().map(parse_timestamp).transpose()?;

    let length = match (section.length_hours, end) {
        (Some(0), _) => {
            return Err(ConfigError::ValidationError(
                "window length_hours must be > 0".to_string(),
            ))
        }
        (Some(hours), _) => Duration::hours(i64::from(hours)),
        (None, Some(end)) => end - start,
        (None, None) => Duration::hours(DEFAULT_WINDOW_HOURS),
    };

    match end {
        Some(end) => TimeWindow::new(start, end, length),
        None => TimeWindow::from_start(start, length),
    }
}

fn column_rule(value: &AlertValue) -> Result<ColumnRule, ConfigError> {
    let text = match value {
        AlertValue::Number(n) if n.is_finite() => return Ok(ColumnRule::Counter(*n)),
        AlertValue::Number(n) => {
            return Err(ConfigError::ValidationError(format!(
                "alert_value must be finite, got {}",
                n
            )))
        }
        AlertValue::Text(text) => text.trim(),
    };

    let (digits, interval) = match (text.strip_prefix('%'), text.strip_suffix('%')) {
        (Some(rest), _) | (None, Some(rest)) => (rest.trim(), true),
        (None, None) => (text, false),
    };
    if digits.contains('%') {
        return Err(ConfigError::ParseError(format!(
            "alert_value '{}' has more than one '%'",
            text
        )));
    }

    let number = digits
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ConfigError::ParseError(format!("alert_value '{}' is not numeric", text)))?;

    if interval {
        if number <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "interval width must be > 0, got {}",
                number
            )));
        }
        Ok(ColumnRule::Interval(number))
    } else {
        Ok(ColumnRule::Counter(number))
    }
}
