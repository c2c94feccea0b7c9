//! Subscription target configuration and unified subscriber options.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 6970);
pub const DEFAULT_CALLBACK_PATH: &str = "/callback";

/// Contents of a subscriber config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(rename = "targetURL", default)]
    pub target_url: String,
}

impl Config {
    /// Reads `path` as JSON, or as TOML when the extension is `.toml`.
    ///
    /// The result depends only on the file; environment overrides are the
    /// caller's business.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::config_read(path, e))?;

        let cfg: Config = if is_toml(path) {
            toml::from_str(&contents).map_err(|e| Error::config_parse(path, e))?
        } else {
            serde_json::from_str(&contents).map_err(|e| Error::config_parse(path, e))?
        };

        cfg.validate()?;
        tracing::debug!(target_url = %cfg.target_url, "subscriber config loaded");
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.target_url.trim().is_empty() {
            return Err(Error::Config("targetURL is required".to_string()));
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Where the subscription target base URL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    Url(String),
    ConfigFile(PathBuf),
}

impl TargetSource {
    pub async fn resolve(&self) -> Result<String> {
        match self {
            Self::Url(url) => Ok(url.clone()),
            Self::ConfigFile(path) => Ok(Config::load(path).await?.target_url),
        }
    }
}

/// Everything needed to run one subscription end to end.
#[derive(Debug, Clone)]
pub struct SubscriberOptions {
    pub target: TargetSource,
    pub filter_pattern: String,
    pub listen_addr: SocketAddr,
    pub callback_path: String,
    /// Address advertised to the remote. Derived from the bound listener when unset.
    pub callback_url: Option<String>,
}

impl SubscriberOptions {
    pub fn new(target: TargetSource, filter_pattern: impl Into<String>) -> Self {
        Self {
            target,
            filter_pattern: filter_pattern.into(),
            listen_addr: DEFAULT_LISTEN_ADDR,
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            callback_url: None,
        }
    }

    pub fn with_listen_addr(mut self, listen_addr: SocketAddr) -> Self {
        self.listen_addr = listen_addr;
        self
    }

    pub fn with_callback_path(mut self, callback_path: impl Into<String>) -> Self {
        self.callback_path = normalize_callback_path(&callback_path.into());
        self
    }

    pub fn with_callback_url(mut self, callback_url: Option<String>) -> Self {
        self.callback_url = callback_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(ToOwned::to_owned);
        self
    }
}

pub(crate) fn normalize_callback_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_CALLBACK_PATH.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
