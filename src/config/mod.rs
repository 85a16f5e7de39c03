//! Configuration module.
//!
//! Handles connection configuration, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionError, MySqlConfig, SqliteConfig};
pub use settings::{expand_env_vars, ConnectionSettings, PoolSettings, Settings, SettingsError};
