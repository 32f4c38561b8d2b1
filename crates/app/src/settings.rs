//! Application settings, read from `settings.toml` and overridable through
//! `BESITOS__SECTION__KEY` environment variables.

use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

const DEFAULT_SQLITE_PATH: &str = "./besitos.db";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::Sqlite(DEFAULT_SQLITE_PATH.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub api_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Engine {
    pub timezone: Option<Tz>,
    pub daily_gift_besitos: Option<i64>,
    pub lock_timeout_ms: Option<u64>,
}

impl Engine {
    pub fn to_engine_settings(&self) -> engine::EngineSettings {
        let defaults = engine::EngineSettings::default();
        engine::EngineSettings {
            timezone: self.timezone.unwrap_or(defaults.timezone),
            daily_gift_besitos: self
                .daily_gift_besitos
                .unwrap_or(defaults.daily_gift_besitos),
            lock_timeout: self
                .lock_timeout_ms
                .map_or(defaults.lock_timeout, Duration::from_millis),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
    pub server: Server,
    #[serde(default)]
    pub engine: Engine,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load("settings")
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("BESITOS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
