//! # html_proxy
//!
//! The HTML rewriting core of a privacy-focused browsing proxy.
//!
//! ## Overview
//!
//! A page fetched on behalf of a client is parsed into an owned
//! [`Document`], run through a fixed sequence of [`Stage`]s and serialized
//! back to HTML. The stages strip the origin's security policy, optionally
//! remove scripts, filter trackers and ads at a configurable
//! [`ContentFilterLevel`], route every resolvable reference back through the
//! proxy and inject the operator chrome. Rewriting is deterministic and
//! idempotent: feeding the output back in changes nothing.
//!
//! Around the core the crate provides the pieces the HTTP layer needs: the
//! [routing table](rewrite::routes), URL [normalization](resolver),
//! [form replay](FormReplay), a TTL [`ResponseCache`], temporary
//! [downloads](DownloadStore), the [`UserAgentPolicy`] and the process
//! [settings](ProxySettings).
//!
//! ## Quick start
//!
//! ```rust
//! use html_proxy::{ContentFilterLevel, RewriteOptions, RewriterBuilder};
//!
//! let rewriter = RewriterBuilder::new().inject_chrome(false).build();
//! let options = RewriteOptions::new(false, ContentFilterLevel::Low);
//! let html = rewriter
//!     .rewrite(r#"<img src="/logo.png">"#, "https://example.com/", options)
//!     .into_html();
//! assert!(html.contains("/proxy-image?url=https%3A%2F%2Fexample.com%2Flogo.png"));
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod cache;
pub mod config;
pub mod dom;
pub mod download;
pub mod error;
pub mod filter;
pub mod form;
pub mod options;
pub mod pipeline;
pub mod resolver;
pub mod rewrite;
pub mod settings;
pub mod user_agent;

pub use cache::{CacheKey, CacheStats, ResponseCache, SweeperHandle};
pub use config::RewriterBuilder;
pub use dom::{Document, Edits, ElementRef, Markup};
pub use download::{DownloadStore, TempDownload};
pub use error::{FetchFailure, ProxyError, Result};
pub use filter::{FilterPatterns, apply_content_filter};
pub use form::{FormReplay, ReplayMethod};
pub use options::{ContentFilterLevel, RewriteOptions};
pub use pipeline::{RewriteContext, RewriteOutcome, Rewriter, Stage, rewrite};
pub use resolver::{ParsedUrl, normalize, resolve};
pub use rewrite::RoutingTarget;
pub use settings::{ProxySettings, SettingsStore, SettingsUpdate};
pub use user_agent::UserAgentPolicy;

use std::sync::OnceLock;

static SETTINGS: OnceLock<SettingsStore> = OnceLock::new();

/// Register the process-wide [`SettingsStore`].
///
/// Call once at startup. Afterwards every part of the application reads the
/// current defaults through [`settings()`].
///
/// Returns [`ProxyError::Config`] if settings were already registered.
pub fn init_settings(settings: ProxySettings) -> Result<&'static SettingsStore> {
    SETTINGS
        .set(SettingsStore::new(settings))
        .map_err(|_| ProxyError::Config("global settings already initialized".into()))?;
    SETTINGS
        .get()
        .ok_or_else(|| ProxyError::Config("global settings unavailable".into()))
}

/// The store registered with [`init_settings()`], if any.
pub fn settings() -> Option<&'static SettingsStore> {
    SETTINGS.get()
}
