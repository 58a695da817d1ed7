//! Settings for the application, read from `settings.toml` and from
//! environment variables prefixed with `CARDLEDGER` (for instance
//! `CARDLEDGER_CARDS__ENCRYPTION_KEY`).
//!
//! See `settings.toml` for the configuration.
use config::{Config, ConfigError, Environment, File, Source};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Cards {
    /// Base64 of the 32-byte AES-256 key protecting stored card numbers.
    pub encryption_key: String,
    #[serde(default = "default_validity_years")]
    pub validity_years: u32,
}

#[derive(Debug, Deserialize)]
pub struct Sweeper {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for Sweeper {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub cards: Cards,
    #[serde(default)]
    pub sweeper: Sweeper,
}

fn default_validity_years() -> u32 {
    engine::DEFAULT_VALIDITY_YEARS
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    engine::DEFAULT_SWEEP_PERIOD.as_secs()
}

/// `CARDLEDGER_<SECTION>__<KEY>`, e.g. `CARDLEDGER_SWEEPER__INTERVAL_SECS`.
fn environment() -> Environment {
    Environment::with_prefix("CARDLEDGER")
        .prefix_separator("_")
        .separator("__")
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_sources(File::with_name("settings").required(false), environment())
    }

    fn from_sources<S>(file: S, env: Environment) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        Config::builder()
            .set_default("app.level", "info")?
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}
