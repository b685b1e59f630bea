use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Where an alert should go
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Forward to the configured notification channel
    Notify,
    /// Nothing externally actionable; record locally only
    LogOnly,
}

/// Outcome of evaluating a monitor against a result set
///
/// A `LogOnly` alert is still a successful evaluation, which lets callers
/// tell "evaluated, nothing to report" apart from "evaluation failed".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn notify(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Notify,
            message: message.into(),
        }
    }

    pub fn log_only(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::LogOnly,
            message: message.into(),
        }
    }

    pub fn is_notify(&self) -> bool {
        self.kind == AlertKind::Notify
    }
}

/// Supported notification frameworks
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    #[default]
    Slack,
    Twitter,
}

impl AlertType {
    /// Case-insensitive parse of a configured alert type
    pub fn from_str_ci(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "slack" => Ok(Self::Slack),
            "twitter" => Ok(Self::Twitter),
            other => Err(ConfigError::ValidationError(format!(
                "unknown alert_type '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_constructors() {
        let alert = Alert::notify("fire");
        assert!(alert.is_notify());
        assert_eq!(alert.message, "fire");

        let alert = Alert::log_only("quiet");
        assert!(!alert.is_notify());
        assert_eq!(alert.kind, AlertKind::LogOnly);
    }

    #[test]
    fn test_alert_type_parsing() {
        assert_eq!(AlertType::from_str_ci("slack").unwrap(), AlertType::Slack);
        assert_eq!(AlertType::from_str_ci("SLACK").unwrap(), AlertType::Slack);
        assert_eq!(AlertType::from_str_ci(" Twitter ").unwrap(), AlertType::Twitter);
        assert!(AlertType::from_str_ci("pager").is_err());
        assert_eq!(AlertType::default(), AlertType::Slack);
    }

    #[test]
    fn test_alert_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&AlertKind::LogOnly).unwrap(),
            "\"log_only\""
        );
        assert_eq!(serde_json::to_string(&AlertKind::Notify).unwrap(), "\"notify\"");
    }
}
