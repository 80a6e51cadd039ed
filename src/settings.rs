use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::CLIENT_NAME;

const CONFIG_NAME: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub keyring_service: String,
    pub poll_interval_secs: u64,
    pub max_backoff_secs: u64,
    pub refresh_margin_secs: i64,
    pub http_timeout_secs: u64,
    pub callback_port: u16,
    pub callback_timeout_secs: u64,
    pub bank: Bank,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bank {
    pub auth_url: Url,
    pub api_url: Url,
    pub page_size: u32,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut s = Config::builder()
            .set_default("keyring_service", "monzo_bridge")?
            .set_default("poll_interval_secs", 10)?
            .set_default("max_backoff_secs", 300)?
            .set_default("refresh_margin_secs", 60)?
            .set_default("http_timeout_secs", 30)?
            .set_default("callback_port", 8080)?
            .set_default("callback_timeout_secs", 300)?
            .set_default("bank.auth_url", "https://auth.monzo.com/")?
            .set_default("bank.api_url", "https://api.monzo.com/")?
            .set_default("bank.page_size", 100)?;

        // An explicitly named file must exist, the default location is optional.
        s = match config_path {
            Some(path) => s.add_source(File::with_name(path)),
            None => s.add_source(File::with_name(&default_config_path()).required(false)),
        };

        s.add_source(Environment::with_prefix("MONZO_BRIDGE").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_margin_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    /// Redirect URI registered with the bank; must match the OAuth client.
    pub fn redirect_uri(&self) -> String {
        format!(
            "http://localhost:{}{}",
            self.callback_port,
            oauth_callback::CALLBACK_PATH
        )
    }
}

pub(crate) fn default_config_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()))
        .join(CLIENT_NAME)
        .join(CONFIG_NAME)
        .display()
        .to_string()
}
