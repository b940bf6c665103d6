use crate::core::{DbQueryError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: ConnectionSettings,
}

/// Which backend a `QueryExecutor` talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Mysql,
    Sqlite,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Settings used to establish a connection.
///
/// For SQLite, `dbname` is the database file path (`:memory:` works) and
/// `host`, `user` and `password` are accepted but unused.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub driver: DriverKind,
    pub host: String,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub charset: String,
}

// Hand-written so the password never ends up in logs.
impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .field("charset", &self.charset)
            .finish()
    }
}

impl ConnectionSettings {
    /// Settings for a MySQL server.
    pub fn mysql(
        host: impl Into<String>,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        charset: impl Into<String>,
    ) -> Self {
        ConnectionSettings {
            driver: DriverKind::Mysql,
            host: host.into(),
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
            charset: charset.into(),
        }
    }

    /// Settings for a SQLite database file, UTF-8 encoded.
    pub fn sqlite(path: impl Into<String>) -> Self {
        ConnectionSettings {
            driver: DriverKind::Sqlite,
            host: "localhost".to_string(),
            dbname: path.into(),
            user: "sqlite".to_string(),
            password: String::new(),
            charset: "utf8".to_string(),
        }
    }

    /// Checks that every required field is usable.
    ///
    /// `password` may be empty. `charset` is spliced into the session
    /// init command, so only ASCII alphanumerics, `_` and `-` are accepted.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("host", &self.host),
            ("dbname", &self.dbname),
            ("user", &self.user),
            ("charset", &self.charset),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DbQueryError::config(format!("{} must not be empty", field)));
            }
        }

        if !self
            .charset
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DbQueryError::config(format!(
                "invalid charset name: {}",
                self.charset
            )));
        }

        Ok(())
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = dbquery::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config.database);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| DbQueryError::config(e.to_string()))?;
    config.database.validate()?;
    Ok(config)
}

/// `<config dir>/dbquery/config.toml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dbquery").join("config.toml"))
}
