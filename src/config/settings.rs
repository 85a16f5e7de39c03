//! TOML-based configuration.
//!
//! Supports a config file (tessera.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [connections.production]
//! driver = "mysql"
//! host = "${PROD_DB_HOST}"
//! user = "${PROD_DB_USER}"
//! password = "${PROD_DB_PASSWORD}"
//! database = "app"
//!
//! [connections.dev]
//! driver = "sqlite"
//! path = "./data/dev.sqlite3"
//!
//! [connections.dev.pool]
//! max_idle_conns = 5
//! max_open_conns = 10
//! conn_max_lifetime = "5m"
//! conn_max_idle_time = "1m"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::connection::{ConnectionError, MySqlConfig, SqliteConfig};
use crate::sql::dialect::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ConnectionError> for SettingsError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::MissingEnvVar(v) => SettingsError::MissingEnvVar(v),
            ConnectionError::UnsupportedDriver(d) => SettingsError::UnsupportedDriver(d),
            ConnectionError::InvalidConfig(m) => SettingsError::InvalidConfig(m),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionSettings>,
}

/// One connection's configuration, tagged by `driver`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum ConnectionSettings {
    Sqlite {
        /// File path, or `:memory:` (supports `${ENV_VAR}` expansion).
        path: String,
    },
    Mysql {
        /// Supports `${ENV_VAR}` expansion.
        host: String,
        #[serde(default = "default_mysql_port")]
        port: u16,
        user: String,
        #[serde(default)]
        password: Option<String>,
        database: String,
        #[serde(default = "default_charset")]
        charset: String,
        #[serde(default = "default_multiple_statements")]
        multiple_statements: bool,
        #[serde(default)]
        pool: PoolSettings,
    },
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_charset() -> String {
    "utf8mb4_general_ci".to_string()
}

fn default_multiple_statements() -> bool {
    true
}

impl ConnectionSettings {
    pub fn dialect(&self) -> Dialect {
        match self {
            ConnectionSettings::Sqlite { .. } => Dialect::Sqlite,
            ConnectionSettings::Mysql { .. } => Dialect::MySql,
        }
    }

    /// Resolve to a [`SqliteConfig`], expanding environment variables in the
    /// path. Errors if this connection is declared as `mysql`.
    pub fn resolved_sqlite(&self) -> Result<SqliteConfig, SettingsError> {
        match self {
            ConnectionSettings::Sqlite { path } => {
                Ok(SqliteConfig::file(expand_env_vars(path)?))
            }
            ConnectionSettings::Mysql { .. } => {
                Err(SettingsError::InvalidConfig("connection is declared as mysql, not sqlite".into()))
            }
        }
    }

    /// Resolve to a [`MySqlConfig`], expanding environment variables in the
    /// host/user/password fields. Errors if this connection is declared as
    /// `sqlite`.
    pub fn resolved_mysql(&self) -> Result<MySqlConfig, SettingsError> {
        match self {
            ConnectionSettings::Mysql { host, port, user, password, database, charset, multiple_statements, .. } => {
                Ok(MySqlConfig {
                    host: expand_env_vars(host)?,
                    port: *port,
                    user: expand_env_vars(user)?,
                    password: password.as_deref().map(expand_env_vars).transpose()?,
                    database: expand_env_vars(database)?,
                    charset: charset.clone(),
                    multiple_statements: *multiple_statements,
                })
            }
            ConnectionSettings::Sqlite { .. } => {
                Err(SettingsError::InvalidConfig("connection is declared as sqlite, not mysql".into()))
            }
        }
    }

    /// Connection pool settings. SQLite is single-connection (§5) and has no
    /// pool; only MySQL connections carry one.
    pub fn pool(&self) -> Option<&PoolSettings> {
        match self {
            ConnectionSettings::Mysql { pool, .. } => Some(pool),
            ConnectionSettings::Sqlite { .. } => None,
        }
    }
}

/// MySQL connection pool settings (§6). SQLite drivers are single-connection
/// and ignore this entirely.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of idle connections in the pool.
    pub max_idle_conns: u32,

    /// Maximum number of open connections in the pool.
    pub max_open_conns: u32,

    /// Maximum connection lifetime (e.g., "5m", "1h").
    pub conn_max_lifetime: String,

    /// Maximum connection idle time (e.g., "1m", "30s").
    pub conn_max_idle_time: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_conns: 5,
            max_open_conns: 10,
            conn_max_lifetime: "5m".to_string(),
            conn_max_idle_time: "1m".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TESSERA_CONFIG`
    /// 2. `./tessera.toml`
    /// 3. `~/.config/tessera/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("TESSERA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("tessera.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tessera").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections.get(name).ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Get the default connection (first one defined, or "default" if it exists).
    pub fn default_connection(&self) -> Option<(&str, &ConnectionSettings)> {
        if let Some(conn) = self.connections.get("default") {
            return Some(("default", conn));
        }
        self.connections.iter().next().map(|(k, v)| (k.as_str(), v))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: impl AsRef<str>) -> Result<String, SettingsError> {
    let s = s.as_ref();
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            // Check for ${VAR} or $VAR
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }
                let value =
                    env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(chars.next().unwrap());
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value =
                        env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${TEST_VAR}").unwrap(), "hello");
        assert_eq!(expand_env_vars("prefix_${TEST_VAR}_suffix").unwrap(), "prefix_hello_suffix");
        env::remove_var("TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$TEST_VAR2!").unwrap(), "world!");
        env::remove_var("TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[connections.production]
driver = "mysql"
host = "db.internal"
user = "app"
database = "app_prod"

[connections.production.pool]
max_idle_conns = 10
max_open_conns = 20

[connections.dev]
driver = "sqlite"
path = "./data/dev.sqlite3"
"#;

        let settings: Settings = toml::from_str(toml).unwrap();

        assert_eq!(settings.connections.len(), 2);
        assert!(settings.connections.contains_key("production"));
        assert!(settings.connections.contains_key("dev"));

        let prod = settings.get_connection("production").unwrap();
        assert_eq!(prod.dialect(), Dialect::MySql);
        assert_eq!(prod.pool().unwrap().max_idle_conns, 10);

        let dev = settings.get_connection("dev").unwrap();
        assert_eq!(dev.dialect(), Dialect::Sqlite);
        assert!(dev.resolved_sqlite().unwrap().path.ends_with("dev.sqlite3"));
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.connections.is_empty());
    }

    #[test]
    fn test_pool_defaults() {
        let pool = PoolSettings::default();
        assert_eq!(pool.max_idle_conns, 5);
        assert_eq!(pool.max_open_conns, 10);
    }

    #[test]
    fn resolved_mysql_expands_env_vars() {
        env::set_var("TESSERA_TEST_HOST", "mysql.internal");
        let settings = ConnectionSettings::Mysql {
            host: "${TESSERA_TEST_HOST}".to_string(),
            port: 3306,
            user: "app".to_string(),
            password: None,
            database: "app".to_string(),
            charset: default_charset(),
            multiple_statements: true,
            pool: PoolSettings::default(),
        };
        let resolved = settings.resolved_mysql().unwrap();
        assert_eq!(resolved.host, "mysql.internal");
        env::remove_var("TESSERA_TEST_HOST");
    }

    #[test]
    fn wrong_dialect_accessor_errors() {
        let sqlite = ConnectionSettings::Sqlite { path: ":memory:".to_string() };
        assert!(sqlite.resolved_mysql().is_err());
    }
}
