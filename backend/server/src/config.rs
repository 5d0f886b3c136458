use std::{env, fmt::Display, str::FromStr, time::Duration};

use imaging::{DEFAULT_CORS_PRONE_DOMAINS, OriginPolicy};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::guard::HostGuard;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct PlaceholderConfig {
    pub width: u32,
    pub height: u32,
    pub caption: String,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
            caption: "Image not available".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend_origin: Url,
    pub app_origin: Url,
    pub upload_root: String,
    pub cors_prone_domains: Vec<String>,
    pub upstream_timeout: Duration,
    pub max_image_bytes: usize,
    pub long_cache: Duration,
    pub short_cache: Duration,
    pub placeholder: PlaceholderConfig,
    pub user_agent: String,
    pub proxy_allow_loopback: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let loader = Loader { lookup };
        let defaults = PlaceholderConfig::default();

        Ok(Self {
            port: loader.try_load("RUST_PORT", "1111")?,
            backend_origin: loader.try_load("BACKEND_ORIGIN", "http://localhost:5000")?,
            app_origin: loader.try_load("APP_ORIGIN", "http://localhost:3000")?,
            upload_root: loader
                .try_load::<String>("UPLOAD_ROOT", "uploads")?
                .trim_matches('/')
                .to_string(),
            cors_prone_domains: loader.domains("CORS_PRONE_DOMAINS"),
            upstream_timeout: Duration::from_secs(loader.try_load("UPSTREAM_TIMEOUT_SECS", "10")?),
            max_image_bytes: loader.try_load("MAX_IMAGE_BYTES", "15728640")?,
            long_cache: Duration::from_secs(loader.try_load("LONG_CACHE_SECS", "31536000")?),
            short_cache: Duration::from_secs(loader.try_load("SHORT_CACHE_SECS", "3600")?),
            placeholder: PlaceholderConfig {
                width: loader.try_load("PLACEHOLDER_WIDTH", &defaults.width.to_string())?,
                height: loader.try_load("PLACEHOLDER_HEIGHT", &defaults.height.to_string())?,
                caption: loader.try_load("PLACEHOLDER_CAPTION", &defaults.caption)?,
            },
            user_agent: loader.try_load("USER_AGENT", DEFAULT_USER_AGENT)?,
            proxy_allow_loopback: loader.try_load("PROXY_ALLOW_LOOPBACK", "false")?,
        })
    }

    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy::new(&self.cors_prone_domains).with_own_origin(&self.app_origin)
    }

    pub fn host_guard(&self) -> HostGuard {
        if self.proxy_allow_loopback {
            HostGuard::allowing_loopback()
        } else {
            HostGuard::default()
        }
    }
}

struct Loader<F> {
    lookup: F,
}

impl<F> Loader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn try_load<T: FromStr>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        self.var(key)
            .unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_string()
            })
            .trim()
            .parse()
            .map_err(|e: T::Err| {
                warn!("Invalid {key} value: {e}");

                ConfigError::Invalid {
                    key,
                    message: e.to_string(),
                }
            })
    }

    fn domains(&self, key: &str) -> Vec<String> {
        match self.var(key) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|domain| !domain.is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                info!("{key} not set, using built-in list");
                DEFAULT_CORS_PRONE_DOMAINS.iter().map(|d| d.to_string()).collect()
            }
        }
    }
}
