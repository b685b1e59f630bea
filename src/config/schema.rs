use crate::query::ParameterType;
use serde::Deserialize;

/// Raw contents of one monitor configuration file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MonitorFile {
    pub name: String,
    pub id: u64,
    #[serde(default)]
    pub parameters: Vec<ParameterEntry>,
    #[serde(default)]
    pub threshold: usize,
    #[serde(default = "default_formatter")]
    pub formatter: String,
    /// Seconds between status polls
    #[serde(default = "default_ping_frequency")]
    pub ping_frequency: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    pub alert_channel: Option<String>,
    #[serde(default = "default_alert_type")]
    pub alert_type: String,
    pub window: Option<WindowSection>,
    pub left_bound: Option<String>,
    pub column: Option<String>,
    pub alert_value: Option<AlertValue>,
}

/// `[[parameters]]` entry; the value may be written as a string or a number
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParameterEntry {
    pub key: String,
    pub value: toml::Value,
    #[serde(rename = "type")]
    pub kind: ParameterType,
}

/// `[window]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub start: String,
    pub end: Option<String>,
    pub length_hours: Option<u32>,
}

/// `alert_value`, either a plain number or text such as `"1000%"`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AlertValue {
    Number(f64),
    Text(String),
}

fn default_formatter() -> String {
    "{}".to_string()
}

fn default_ping_frequency() -> u64 {
    20
}

fn default_max_poll_attempts() -> u32 {
    90
}

fn default_alert_type() -> String {
    "slack".to_string()
}
