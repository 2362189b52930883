use relay_client::{
    settings::{env_var, HOST_VAR, PORT_VAR},
    DEFAULT_PORT,
};

use crate::Error;

#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub application: ApplicationSettings,
}

#[derive(serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApplicationSettings {
    pub port: u16,
    pub host: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `RELAY_HOST` and `RELAY_PORT`, `.env` included.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();
        let defaults = ApplicationSettings::default();
        Ok(Self {
            application: ApplicationSettings {
                port: env_var(PORT_VAR)?.unwrap_or(defaults.port),
                host: env_var(HOST_VAR)?.unwrap_or(defaults.host),
            },
        })
    }
}
