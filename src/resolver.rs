//! Normalization of address-bar input and resolution of page references.
//!
//! [`normalize`] decides whether free-form input is a URL or a search query.
//! [`resolve`] and [`try_resolve`] turn relative references into absolute
//! URLs against the page they were found on.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use url::{Url, form_urlencoded};

use crate::error::{ProxyError, Result};
use crate::rewrite::routes;

/// A single word with at most leading or trailing dots, e.g. `"hello."`.
static PLAIN_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.*[\p{L}\p{N}_'-]+\.*$").expect("PLAIN_WORDS is a valid static regex pattern")
});

/// References that are never resolved or rewritten.
const PASSTHROUGH_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Result of interpreting address-bar style input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    pub valid: bool,
    pub is_search_query: bool,
    /// Absolute URL, or the `/search?q=` route for search queries.
    pub normalized_url: String,
    pub hostname: Option<String>,
    pub pathname: Option<String>,
    /// URL scheme without the trailing colon.
    pub protocol: Option<String>,
    pub title: String,
}

impl ParsedUrl {
    pub fn invalid() -> Self {
        Self::default()
    }

    fn search(query: &str) -> Self {
        Self {
            valid: true,
            is_search_query: true,
            normalized_url: routes::search_route(query),
            title: format!("Search: {query}"),
            ..Self::default()
        }
    }

    fn from_url(url: &Url) -> Self {
        let hostname = url.host_str().unwrap_or_default().to_string();
        Self {
            valid: true,
            is_search_query: false,
            normalized_url: url.as_str().to_string(),
            pathname: Some(url.path().to_string()),
            protocol: Some(url.scheme().to_string()),
            title: hostname.clone(),
            hostname: Some(hostname),
        }
    }

    /// Convert into a `Result`, for contexts that cannot proceed without a URL.
    pub fn into_result(self) -> Result<Self> {
        if self.valid && !self.is_search_query {
            Ok(self)
        } else {
            Err(ProxyError::InvalidInput(
                "Invalid URL for download. Please enter a valid URL.".into(),
            ))
        }
    }
}

/// Interpret address-bar input as either a URL or a search query.
///
/// Unparseable input fails open: it is treated as a search query.
pub fn normalize(input: &str) -> ParsedUrl {
    let input = input.trim();
    if input.is_empty() {
        return ParsedUrl::invalid();
    }
    if looks_like_search(input) {
        return ParsedUrl::search(input);
    }
    match parse_absolute(input) {
        Some(url) => ParsedUrl::from_url(&url),
        None => {
            tracing::debug!("Treating unparseable input as a search query: {input}");
            ParsedUrl::search(input)
        }
    }
}

/// Like [`normalize`], but never classifies input as a search query.
///
/// Used where a URL is mandatory (downloads); failure yields an invalid result.
pub fn normalize_strict(input: &str) -> ParsedUrl {
    let input = input.trim();
    if input.is_empty() {
        return ParsedUrl::invalid();
    }
    parse_absolute(input)
        .map(|url| ParsedUrl::from_url(&url))
        .unwrap_or_else(ParsedUrl::invalid)
}

fn looks_like_search(input: &str) -> bool {
    if input.contains("://") {
        return false;
    }
    if input.chars().any(char::is_whitespace) {
        return true;
    }
    if is_localhost(input) {
        return false;
    }
    !input.contains('.') || PLAIN_WORDS.is_match(input)
}

fn is_localhost(input: &str) -> bool {
    let host = input.split(['/', '?', '#', ':']).next().unwrap_or_default();
    host.eq_ignore_ascii_case("localhost")
}

fn parse_absolute(input: &str) -> Option<Url> {
    let candidate: Cow<'_, str> = if input.contains("://") {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("http://{input}"))
    };
    let url = match Url::parse(&candidate) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("URL parsing error for {candidate}: {e}");
            return None;
        }
    };
    url.host_str().filter(|host| !host.is_empty())?;
    Some(url)
}

/// Resolve `reference` against `base`, reporting failures to the caller.
///
/// `data:` URIs are returned unchanged and protocol-relative references take
/// the scheme of `base`.
pub fn try_resolve(reference: &str, base: &Url) -> Result<String> {
    if has_prefix_ignore_case(reference, "data:") {
        return Ok(reference.to_string());
    }
    let joined = match reference.strip_prefix("//") {
        Some(rest) => Url::parse(&format!("{}://{rest}", base.scheme())),
        None => base.join(reference),
    };
    joined.map(String::from).map_err(|reason| ProxyError::Resolution {
        reference: reference.to_string(),
        reason,
    })
}

/// Best-effort resolution: on failure the warning is logged and the original
/// reference is returned unchanged.
pub fn resolve(reference: &str, base: &str) -> String {
    let resolved = Url::parse(base)
        .map_err(|reason| ProxyError::Resolution {
            reference: base.to_string(),
            reason,
        })
        .and_then(|base| try_resolve(reference, &base));
    match resolved {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("URL resolution error: {e}");
            reference.to_string()
        }
    }
}

/// Fragment-only, `javascript:`, `mailto:`, `tel:` and `data:` references.
pub fn is_passthrough(reference: &str) -> bool {
    PASSTHROUGH_PREFIXES
        .iter()
        .any(|prefix| has_prefix_ignore_case(reference, prefix))
}

/// Whether an absolute URL uses a scheme the proxy can fetch.
pub fn is_fetchable(absolute: &str) -> bool {
    has_prefix_ignore_case(absolute, "http://") || has_prefix_ignore_case(absolute, "https://")
}

/// Percent-encode a value for use as a single query parameter.
pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub(crate) fn has_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
