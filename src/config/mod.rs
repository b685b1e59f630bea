//! Monitor configuration files and process settings
//!
//! Each monitor lives in its own TOML file. [`load_config`] parses one file,
//! checks that it describes exactly one monitor shape and builds the
//! corresponding [`QueryMonitor`](crate::monitor::QueryMonitor).

mod loader;
mod schema;
mod settings;

pub use loader::{build_config, load_config, load_config_str, parse_timestamp, Config};
pub use schema::{AlertValue, MonitorFile, ParameterEntry, WindowSection};
pub use settings::{
    Settings, DATABASE_URL, DUNE_API_KEY, SLACK_ALERT_CHANNEL, SLACK_TOKEN, STATE_TABLE,
};
