//! Connection settings and import options.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sqlx::mysql::MySqlConnectOptions;

use crate::error::{ImportError, Result};

/// Connection settings for a MySQL / MariaDB server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Server host name or address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// User name.
    pub user: String,
    /// Password; empty connects without one.
    pub password: String,
    /// Default schema; `None` connects without selecting one.
    pub database: Option<String>,
    /// Connection character set.
    pub charset: String,
    /// Extra log verbosity; anything above zero enables debug output.
    pub verbose: u8,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: None,
            charset: "utf8mb4".to_string(),
            verbose: 0,
        }
    }
}

impl fmt::Debug for SqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl SqlConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file. Missing keys take their
    /// default values.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Config`] if the file cannot be read or is not
    /// a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ImportError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ImportError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Sets the default schema.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Renders a `mysql://` URL. The password is left out so the URL can be
    /// logged.
    #[must_use]
    pub fn url(&self) -> String {
        let database = self.database.as_deref().unwrap_or_default();
        format!(
            "mysql://{}@{}:{}/{}?charset={}",
            self.user, self.host, self.port, database, self.charset
        )
    }

    /// Builds `sqlx` connection options, password included.
    #[must_use]
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .charset(&self.charset);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        if let Some(database) = &self.database {
            options = options.database(database);
        }
        options
    }
}

/// How INSERT statements of a dump are replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WithData {
    /// Execute INSERT statements as written.
    #[default]
    AsIs,
    /// Split multi-row INSERTs and execute one row at a time.
    Single,
    /// Skip data entirely.
    None,
}

impl WithData {
    /// Coerces a loosely typed setting: `true` and `1` keep the data as is,
    /// `"single"` and `2` split it per row, anything else skips it. Numbers
    /// compare by value, so `1.0` and `2.0` count as `1` and `2`.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => Self::AsIs,
            Value::String(s) if s == "single" => Self::Single,
            Value::Number(n) => match n.as_f64() {
                Some(f) if (f - 1.0).abs() < f64::EPSILON => Self::AsIs,
                Some(f) if (f - 2.0).abs() < f64::EPSILON => Self::Single,
                _ => Self::None,
            },
            _ => Self::None,
        }
    }
}

impl FromStr for WithData {
    type Err = std::convert::Infallible;

    /// Command-line form of [`WithData::from_value`].
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "true" | "1" => Self::AsIs,
            "single" | "2" => Self::Single,
            _ => Self::None,
        })
    }
}

impl Serialize for WithData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::AsIs => serializer.serialize_bool(true),
            Self::Single => serializer.serialize_str("single"),
            Self::None => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for WithData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

const fn default_true() -> bool {
    true
}

/// Options controlling an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// How INSERT statements are replayed.
    #[serde(default)]
    pub with_data: WithData,
    /// Drop every table of the dump before creating it.
    #[serde(default = "default_true")]
    pub drop_first: bool,
    /// Close the connection once the import finishes.
    #[serde(default)]
    pub close_connection: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            with_data: WithData::AsIs,
            drop_first: true,
            close_connection: false,
        }
    }
}

impl ImportOptions {
    /// Creates options with default settings: data as is, tables dropped
    /// first, connection left open.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how INSERT statements are replayed.
    #[must_use]
    pub const fn with_data(mut self, with_data: WithData) -> Self {
        self.with_data = with_data;
        self
    }

    /// Sets whether tables are dropped before they are created.
    #[must_use]
    pub const fn drop_first(mut self, enabled: bool) -> Self {
        self.drop_first = enabled;
        self
    }

    /// Sets whether the connection is closed once the import finishes.
    #[must_use]
    pub const fn close_connection(mut self, enabled: bool) -> Self {
        self.close_connection = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_with_data_coercion_table() {
        let cases = [
            (json!(true), WithData::AsIs),
            (json!(1), WithData::AsIs),
            (json!("single"), WithData::Single),
            (json!(2), WithData::Single),
            (json!(1.0), WithData::AsIs),
            (json!(2.0), WithData::Single),
            (json!(1.5), WithData::None),
            (json!(-1), WithData::None),
            (json!(false), WithData::None),
            (json!(0), WithData::None),
            (json!("yes"), WithData::None),
            (json!("SINGLE"), WithData::None),
            (json!(null), WithData::None),
            (json!(3), WithData::None),
        ];
        for (value, expected) in cases {
            assert_eq!(WithData::from_value(&value), expected, "{value}");
        }
    }

    #[test]
    fn test_with_data_from_str() {
        assert_eq!("1".parse::<WithData>().unwrap(), WithData::AsIs);
        assert_eq!("single".parse::<WithData>().unwrap(), WithData::Single);
        assert_eq!("false".parse::<WithData>().unwrap(), WithData::None);
    }

    #[test]
    fn test_import_options_defaults() {
        let options: ImportOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ImportOptions::default());
        assert_eq!(options.with_data, WithData::AsIs);
        assert!(options.drop_first);
        assert!(!options.close_connection);

        let options: ImportOptions =
            serde_json::from_str(r#"{"with_data": 2, "drop_first": false}"#).unwrap();
        assert_eq!(options.with_data, WithData::Single);
        assert!(!options.drop_first);
    }

    #[test]
    fn test_config_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"host": "db.internal", "password": "s3cret", "database": "shop"}}"#)
            .unwrap();

        let config = SqlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 3306);
        assert_eq!(config.user, "root");
        assert_eq!(config.charset, "utf8mb4");
        assert_eq!(config.database.as_deref(), Some("shop"));
        assert_eq!(config.url(), "mysql://root@db.internal:3306/shop?charset=utf8mb4");
    }

    #[test]
    fn test_config_from_missing_file() {
        let err = SqlConfig::from_file("/nonexistent/sqldump.json").unwrap_err();
        assert!(matches!(err, ImportError::Config { .. }));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SqlConfig {
            password: "hunter2".to_string(),
            ..SqlConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
