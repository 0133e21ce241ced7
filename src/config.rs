use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub anki_connect: AnkiConnectConfig,
    pub logging: LoggingConfig,
}

/// Connection and batching settings for the AnkiConnect add-on.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnkiConnectConfig {
    pub host: String,
    pub port: u16,
    pub version: u32,
    /// Total attempts per request, including the first one.
    pub retries: u32,
    pub initial_delay_ms: u64,
    pub chunk_size: usize,
}

impl Default for AnkiConnectConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            version: 6,
            retries: 3,
            initial_delay_ms: 1000,
            chunk_size: 5,
        }
    }
}

impl AnkiConnectConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when it is absent.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override the AnkiConnect endpoint with environment variables if set
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("ANKI_CONNECT_HOST") {
            self.anki_connect.host = host;
        }
        if let Ok(port) = std::env::var("ANKI_CONNECT_PORT") {
            self.anki_connect.port = port
                .parse()
                .with_context(|| format!("ANKI_CONNECT_PORT is not a valid port: {}", port))?;
        }
        Ok(())
    }
}
