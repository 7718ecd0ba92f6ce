use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};
use watcard_repo::connection::ConnectOptions;

pub const DEFAULT_HOST: &str = "riku.shoshin.uwaterloo.ca";
pub const DEFAULT_DATABASE: &str = "SE101_Team_10";

#[derive(Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub database: String,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: DEFAULT_HOST.to_string(),
            port: None,
            user: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            password: None,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            database: self.database.clone(),
            password: self.password.clone().filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, anyhow::Error> {
        let config = fs::read_to_string(path).context("Unable to read config file")?;
        let config: Config =
            toml::from_str(config.as_str()).with_context(|| "Unable to parse config")?;
        Ok(config)
    }

    /// Reads `DB_*` and `LOG_*` variables. Each unset variable keeps its
    /// default, so a partial environment still yields a usable config.
    pub fn from_env() -> Result<Config, anyhow::Error> {
        Config::from_vars(|key| env::var(key).ok())
    }

    fn from_vars<F>(read_var: F) -> Result<Config, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DatabaseConfig::default();
        let port = match read_var("DB_PORT") {
            Some(port) => Some(port.parse().context("Unable to parse DB_PORT value")?),
            None => defaults.port,
        };

        let config = Config {
            database: DatabaseConfig {
                host: read_var("DB_HOST").unwrap_or(defaults.host),
                port,
                user: read_var("DB_USER").unwrap_or(defaults.user),
                database: read_var("DB_DATABASE").unwrap_or(defaults.database),
                password: read_var("DB_PASSWORD"),
            },
            log: LogConfig {
                level: read_var("LOG_LEVEL").unwrap_or_else(default_log_level),
                file: read_var("LOG_FILE").map(PathBuf::from),
            },
        };
        Ok(config)
    }
}
