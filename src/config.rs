use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// token/account/group are fallbacks for values missing from the request
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub require_https: bool,
    #[serde(default = "default_client_ip_header")]
    pub client_ip_header: String,
}

fn default_client_ip_header() -> String {
    "cf-connecting-ip".to_string()
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            token: None,
            account: None,
            group: None,
            require_https: false,
            client_ip_header: default_client_ip_header(),
        }
    }
}

impl Config {
    // DDNS_* environment variables override the file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = non_empty("DDNS_TOKEN") {
            self.update.token = Some(token);
        }
        if let Some(account) = non_empty("DDNS_ACCOUNT") {
            self.update.account = Some(account);
        }
        if let Some(group) = non_empty("DDNS_GROUP") {
            self.update.group = Some(group);
        }
    }
}
