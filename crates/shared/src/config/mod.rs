// Configuration module
// Reads an INI-style configuration file with environment variable overrides.
//
// Keys live in the [userdb] section (keys outside any section are accepted
// too). An environment variable named <prefix><Key> takes precedence over the
// file, e.g. Userdb_DatabasePath.

use std::path::Path;

use configparser::ini::Ini;

use crate::auth::{PasswordSchemeKind, DEFAULT_SALT_LENGTH};

/// Section holding the settings
pub const SECTION: &str = "userdb";

/// Default environment variable prefix
pub const ENV_PREFIX: &str = "Userdb_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read configuration file {path}: {message}")]
    Read { path: String, message: String },
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Configuration file reader
pub struct Config {
    ini: Ini,
    filename: String,
    env_prefix: String,
}

impl Config {
    pub fn new(env_prefix: &str) -> Self {
        Config {
            ini: Ini::new(),
            filename: String::new(),
            env_prefix: env_prefix.to_string(),
        }
    }

    /// Load configuration from a file
    pub fn set_source(&mut self, filename: &str) -> Result<(), ConfigError> {
        self.filename = filename.to_string();
        self.reload()
    }

    /// Load configuration from an in-memory string
    pub fn set_source_str(&mut self, contents: &str) -> Result<(), ConfigError> {
        self.filename = String::from("<string>");
        self.ini = Ini::new();
        self.ini
            .read(contents.to_string())
            .map(|_| ())
            .map_err(|message| ConfigError::Read { path: self.filename.clone(), message })
    }

    /// Reload the configuration file
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.ini = Ini::new();
        if !Path::new(&self.filename).exists() {
            return Err(ConfigError::Read {
                path: self.filename.clone(),
                message: "file not found".to_string(),
            });
        }

        self.ini
            .load(&self.filename)
            .map(|_| ())
            .map_err(|message| ConfigError::Read { path: self.filename.clone(), message })
    }

    /// Check if a key is set
    pub fn is_set(&self, key: &str) -> bool {
        self.get_env_or_config(key).is_some()
    }

    /// Get a string value with a default
    pub fn get_string_default(&self, key: &str, default: &str) -> String {
        self.get_env_or_config(key).unwrap_or_else(|| default.to_string())
    }

    /// Get a string value (empty string default)
    pub fn get_string(&self, key: &str) -> String {
        self.get_string_default(key, "")
    }

    /// Get a boolean value with a default
    pub fn get_bool_default(&self, key: &str, default: bool) -> bool {
        match self.get_env_or_config(key) {
            Some(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
            None => default,
        }
    }

    /// Get a parsed value with a default. Unparseable values are an error
    /// rather than silently falling back.
    pub fn get_parsed_default<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_or_config(key) {
            Some(val) => val.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: val.clone(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// Try environment variable first, then the [userdb] section, then
    /// keys outside any section
    fn get_env_or_config(&self, key: &str) -> Option<String> {
        if !self.env_prefix.is_empty() {
            let env_key = format!("{}{}", self.env_prefix, key.replace('.', "_"));
            if let Ok(val) = std::env::var(&env_key) {
                return Some(val);
            }
        }

        self.ini
            .get(SECTION, key)
            .or_else(|| self.ini.get("default", key))
            .map(|val| strip_quotes(val.trim()).to_string())
    }

    /// Resolve the typed settings, applying defaults for missing keys
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let defaults = Settings::default();
        let logs_dir = self.get_string("LogsDir");

        Ok(Settings {
            database_path: self.get_string_default("DatabasePath", &defaults.database_path),
            logs_dir: if logs_dir.is_empty() { None } else { Some(logs_dir) },
            log_level: self.get_string_default("LogLevel", &defaults.log_level),
            password_scheme: self.get_parsed_default("PasswordScheme", defaults.password_scheme)?,
            salt_length: self.get_parsed_default("SaltLength", defaults.salt_length)?,
            max_connections: self.get_parsed_default("MaxConnections", defaults.max_connections)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Resolved runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: String,
    pub logs_dir: Option<String>,
    pub log_level: String,
    pub password_scheme: PasswordSchemeKind,
    pub salt_length: usize,
    pub max_connections: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: "userdb.sqlite".to_string(),
            logs_dir: None,
            log_level: "info".to_string(),
            password_scheme: PasswordSchemeKind::Sha1,
            salt_length: DEFAULT_SALT_LENGTH,
            max_connections: 5,
        }
    }
}
