//! Query descriptors and result rows
//!
//! A [`Query`] identifies a saved analytical query on the execution service
//! together with the parameters it is executed with. Results come back as an
//! ordered sequence of [`ResultRow`]s.

use crate::error::DecisionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Format used for datetime query parameters
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Base URL for human-followable query links
const QUERY_URL_BASE: &str = "https://dune.com/queries";

/// Declared type of a query parameter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Free-form text
    Text,
    /// Numeric value
    Number,
    /// Timestamp formatted as `YYYY-MM-DD HH:MM:SS`
    Datetime,
    /// One of a fixed set of values
    Enum,
}

/// A single named query parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryParameter {
    /// Parameter name as declared by the query
    pub key: String,
    /// Value rendered as text
    pub value: String,
    /// Declared parameter type
    #[serde(rename = "type")]
    pub kind: ParameterType,
}

impl QueryParameter {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: ParameterType::Text,
        }
    }

    pub fn number(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
            kind: ParameterType::Number,
        }
    }

    pub fn datetime(key: impl Into<String>, value: Timestamp) -> Self {
        Self {
            key: key.into(),
            value: value.format(DATETIME_FORMAT).to_string(),
            kind: ParameterType::Datetime,
        }
    }
}

/// Immutable descriptor of a saved query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    /// Identifier on the query-execution service
    pub id: u64,
    /// Human-readable name used in alert messages
    pub name: String,
    /// Fixed parameters, in configuration order
    pub params: Vec<QueryParameter>,
}

impl Query {
    pub fn new(id: u64, name: impl Into<String>, params: Vec<QueryParameter>) -> Self {
        Self {
            id,
            name: name.into(),
            params,
        }
    }

    /// Copy of this query carrying the parameters resolved for one run
    pub fn with_params(&self, params: Vec<QueryParameter>) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            params,
        }
    }

    /// Link to the query on the execution service
    pub fn url(&self) -> String {
        format!("{}/{}", QUERY_URL_BASE, self.id)
    }
}

/// A single record returned by the query-execution service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ResultRow(BTreeMap<String, Value>);

/// Ordered result of one query execution
pub type ResultSet = Vec<ResultRow>;

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, mostly useful in tests
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Read a column as a finite number
    ///
    /// JSON numbers and numeric strings are accepted; anything else is a
    /// shape violation.
    pub fn numeric(&self, column: &str) -> Result<f64, DecisionError> {
        let value = self
            .0
            .get(column)
            .ok_or_else(|| DecisionError::MissingColumn(column.to_string()))?;

        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match parsed {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(DecisionError::NonNumeric {
                column: column.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl From<BTreeMap<String, Value>> for ResultRow {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Return the only row of a result set, failing on any other row count
pub fn single_row(rows: &[ResultRow]) -> Result<&ResultRow, DecisionError> {
    match rows {
        [row] => Ok(row),
        _ => Err(DecisionError::RowCount {
            expected: 1,
            actual: rows.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_numeric_accepts_numbers_and_numeric_strings() {
        let row = ResultRow::new()
            .with("int", 42)
            .with("float", 1.5)
            .with("text", " 7.25 ");

        assert_eq!(row.numeric("int").unwrap(), 42.0);
        assert_eq!(row.numeric("float").unwrap(), 1.5);
        assert_eq!(row.numeric("text").unwrap(), 7.25);
    }

    #[test]
    fn test_numeric_missing_column() {
        let row = ResultRow::new().with("a", 1);
        assert!(matches!(
            row.numeric("b"),
            Err(DecisionError::MissingColumn(c)) if c == "b"
        ));
    }

    #[test]
    fn test_numeric_rejects_non_numeric() {
        let row = ResultRow::new()
            .with("word", "abc")
            .with("null", Value::Null)
            .with("flag", true)
            .with("nan", "NaN");

        for column in ["word", "null", "flag", "nan"] {
            assert!(
                matches!(row.numeric(column), Err(DecisionError::NonNumeric { .. })),
                "column {} should be rejected",
                column
            );
        }
    }

    #[test]
    fn test_single_row_shape() {
        let one = vec![ResultRow::new().with("a", 1)];
        assert!(single_row(&one).is_ok());

        let none: ResultSet = vec![];
        assert!(matches!(
            single_row(&none),
            Err(DecisionError::RowCount {
                expected: 1,
                actual: 0
            })
        ));

        let two = vec![ResultRow::new(), ResultRow::new()];
        assert!(matches!(
            single_row(&two),
            Err(DecisionError::RowCount {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_result_row_deserializes_from_json_object() {
        let row: ResultRow = serde_json::from_value(json!({"balance": "12.5", "n": 3})).unwrap();
        assert_eq!(row.numeric("balance").unwrap(), 12.5);
        assert_eq!(row.numeric("n").unwrap(), 3.0);
    }

    #[test]
    fn test_datetime_parameter_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let param = QueryParameter::datetime("StartTime", ts);
        assert_eq!(param.value, "2024-03-01 06:00:00");
        assert_eq!(param.kind, ParameterType::Datetime);
    }

    #[test]
    fn test_parameter_type_serialization() {
        let param = QueryParameter::text("Token", "WETH");
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(json, json!({"key": "Token", "value": "WETH", "type": "text"}));
    }

    #[test]
    fn test_query_url_and_with_params() {
        let query = Query::new(1234, "Balances", vec![QueryParameter::text("a", "b")]);
        assert_eq!(query.url(), "https://dune.com/queries/1234");

        let rebound = query.with_params(vec![]);
        assert_eq!(rebound.id, 1234);
        assert!(rebound.params.is_empty());
        assert_eq!(query.params.len(), 1);
    }
}
