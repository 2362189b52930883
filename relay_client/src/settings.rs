use std::{env, str::FromStr, time::Duration};

use crate::{Error, DEFAULT_PORT};

pub const HOST_VAR: &str = "RELAY_HOST";
pub const PORT_VAR: &str = "RELAY_PORT";
pub const PROBE_TIMEOUT_VAR: &str = "RELAY_PROBE_TIMEOUT_MS";

#[derive(serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClientSettings {
    /// Hub to connect to. When unset the local subnet is scanned.
    pub host: Option<String>,
    pub port: u16,
    pub probe_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            probe_timeout_ms: 2_000,
        }
    }
}

impl ClientSettings {
    /// Reads `RELAY_HOST`, `RELAY_PORT` and `RELAY_PROBE_TIMEOUT_MS`, after
    /// loading a `.env` file if there is one.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();
        let defaults = Self::default();
        Ok(Self {
            host: env::var(HOST_VAR).ok().filter(|h| !h.is_empty()),
            port: env_var(PORT_VAR)?.unwrap_or(defaults.port),
            probe_timeout_ms: env_var(PROBE_TIMEOUT_VAR)?.unwrap_or(defaults.probe_timeout_ms),
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Parses an optional environment variable.
pub fn env_var<T: FromStr>(name: &'static str) -> Result<Option<T>, Error> {
    match env::var(name) {
        Ok(value) => {
            let parsed = value.trim().parse().ok();
            match parsed {
                Some(parsed) => Ok(Some(parsed)),
                None => Err(Error::Setting { name, value }),
            }
        }
        Err(_) => Ok(None),
    }
}
