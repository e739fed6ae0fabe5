//! Process configuration and the store of operator-adjustable defaults.
//!
//! [`ProxySettings`] is read once from the environment. The subset an
//! operator may change at runtime lives in a [`SettingsStore`]; its only
//! write path is [`SettingsStore::update`]. Requests never see the store
//! directly: they take an immutable [`RewriteOptions`] from
//! [`SettingsStore::request_options`] at entry.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::error::{ProxyError, Result};
use crate::options::{ContentFilterLevel, RewriteOptions, parse_flag};
use crate::user_agent::UserAgentPolicy;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Configuration consumed by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub port: u16,
    pub download_dir: PathBuf,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    /// Fixed outbound agent. When set, rotation is off.
    pub user_agent: Option<String>,
    pub user_agent_rotation: bool,
    pub disable_scripts: bool,
    pub content_filter: ContentFilterLevel,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            cache_enabled: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            user_agent: None,
            user_agent_rotation: false,
            disable_scripts: false,
            content_filter: ContentFilterLevel::None,
        }
    }
}

impl ProxySettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Read settings from `(name, value)` pairs.
    ///
    /// Recognized names: `PORT`, `DOWNLOAD_DIR`, `CACHE_ENABLED`, `CACHE_TTL`
    /// (seconds), `USER_AGENT`, `USER_AGENT_ROTATION`, `DISABLE_SCRIPTS`,
    /// `CONTENT_FILTER`. Other names are ignored; malformed values are errors.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "PORT" => {
                    settings.port = value.trim().parse().map_err(|e| {
                        ProxyError::Config(format!("invalid value for PORT: {value}: {e}"))
                    })?;
                }
                "DOWNLOAD_DIR" if !value.trim().is_empty() => {
                    settings.download_dir = PathBuf::from(value.trim());
                }
                "CACHE_ENABLED" => settings.cache_enabled = parse_flag(key, value)?,
                "CACHE_TTL" => {
                    let secs: u64 = value.trim().parse().map_err(|e| {
                        ProxyError::Config(format!("invalid value for CACHE_TTL: {value}: {e}"))
                    })?;
                    settings.cache_ttl = Duration::from_secs(secs);
                }
                "USER_AGENT" => {
                    let agent = value.trim();
                    settings.user_agent = (!agent.is_empty()).then(|| agent.to_string());
                }
                "USER_AGENT_ROTATION" => settings.user_agent_rotation = parse_flag(key, value)?,
                "DISABLE_SCRIPTS" => settings.disable_scripts = parse_flag(key, value)?,
                "CONTENT_FILTER" => settings.content_filter = value.parse()?,
                _ => {}
            }
        }
        if settings.user_agent.is_some() {
            settings.user_agent_rotation = false;
        }
        Ok(settings)
    }

    pub fn user_agent_policy(&self) -> UserAgentPolicy {
        UserAgentPolicy::from_settings(self.user_agent.as_deref(), self.user_agent_rotation)
    }

    /// Rewrite options derived from the current defaults.
    pub fn rewrite_options(&self, is_search_result: bool) -> RewriteOptions {
        RewriteOptions {
            disable_scripts: self.disable_scripts,
            content_filter: self.content_filter,
            is_search_result,
        }
    }
}

/// New operator defaults submitted from the settings page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub disable_scripts: bool,
    pub content_filter: ContentFilterLevel,
    pub user_agent_rotation: bool,
}

impl SettingsUpdate {
    /// Build an update from submitted form pairs.
    ///
    /// Checkboxes follow HTML semantics: an absent key means off. Unknown
    /// keys are rejected.
    pub fn from_form<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut update = Self::default();
        for (key, value) in pairs {
            match key {
                "disable_scripts" => update.disable_scripts = parse_flag(key, value)?,
                "content_filter" => update.content_filter = value.parse()?,
                "user_agent_rotation" => update.user_agent_rotation = parse_flag(key, value)?,
                unknown => {
                    return Err(ProxyError::Config(format!("unknown setting: {unknown}")));
                }
            }
        }
        Ok(update)
    }
}

/// Process-wide defaults with a single write entry point.
#[derive(Debug)]
pub struct SettingsStore {
    inner: RwLock<ProxySettings>,
}

impl SettingsStore {
    pub fn new(settings: ProxySettings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> ProxySettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply an update and return the resulting settings.
    pub fn update(&self, update: SettingsUpdate) -> ProxySettings {
        let mut settings = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        settings.disable_scripts = update.disable_scripts;
        settings.content_filter = update.content_filter;
        settings.user_agent_rotation = update.user_agent_rotation;
        tracing::info!(
            "Settings updated: disable_scripts={}, content_filter={}, user_agent_rotation={}",
            settings.disable_scripts,
            settings.content_filter,
            settings.user_agent_rotation
        );
        settings.clone()
    }

    /// Immutable per-request options resolved from the current defaults.
    pub fn request_options(&self, is_search_result: bool) -> RewriteOptions {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rewrite_options(is_search_result)
    }

    pub fn user_agent_policy(&self) -> UserAgentPolicy {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user_agent_policy()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(ProxySettings::default())
    }
}
