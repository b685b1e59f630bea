use super::Config;
use crate::error::ConfigError;
use crate::store::DEFAULT_TABLE;

pub const DUNE_API_KEY: &str = "DUNE_API_KEY";
pub const SLACK_TOKEN: &str = "SLACK_TOKEN";
pub const SLACK_ALERT_CHANNEL: &str = "SLACK_ALERT_CHANNEL";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const STATE_TABLE: &str = "STATE_TABLE";

/// Process-wide credentials and defaults taken from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub dune_api_key: Option<String>,
    pub slack_token: Option<String>,
    /// Channel used by monitors that do not name their own
    pub default_channel: Option<String>,
    pub database_url: Option<String>,
    pub state_table: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            dune_api_key: get(DUNE_API_KEY),
            slack_token: get(SLACK_TOKEN),
            default_channel: get(SLACK_ALERT_CHANNEL),
            database_url: get(DATABASE_URL),
            state_table: get(STATE_TABLE).unwrap_or_else(|| DEFAULT_TABLE.to_string()),
        }
    }

    /// The channel `config` should alert on
    pub fn channel_for(&self, config: &Config) -> Result<String, ConfigError> {
        config
            .alert_channel
            .clone()
            .or_else(|| self.default_channel.clone())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "'{}' has no alert_channel and {} is not set",
                    config.monitor.name(),
                    SLACK_ALERT_CHANNEL
                ))
            })
    }

    /// Value of a required variable
    pub fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ConfigError> {
        value
            .as_deref()
            .ok_or_else(|| ConfigError::ValidationError(format!("{} must be set", name)))
    }
}
