//! Rewriting of stylesheet text: `url(...)` references and `@import` strings.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use super::reroute;
use crate::rewrite::routes::RoutingTarget;

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?([^'")]*?)['"]?\s*\)"#)
        .expect("URL_REGEX is a valid static regex pattern")
});

static IMPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+['"]([^'"]+)['"]"#)
        .expect("IMPORT_REGEX is a valid static regex pattern")
});

/// Route every `url(...)` and `@import "..."` reference in `css` through the
/// resource proxy.
///
/// `data:` URIs and references that are already proxied are kept verbatim.
/// Returns `None` when nothing changed.
pub fn rewrite_css(css: &str, base: &Url) -> Option<String> {
    let mut changed = false;

    let urls = URL_REGEX.replace_all(css, |caps: &Captures<'_>| {
        match reroute(&caps[1], RoutingTarget::ProxyResource, base) {
            Some(route) => {
                changed = true;
                format!("url(\"{route}\")")
            }
            None => caps[0].to_string(),
        }
    });

    let imports = IMPORT_REGEX.replace_all(&urls, |caps: &Captures<'_>| {
        match reroute(&caps[1], RoutingTarget::ProxyResource, base) {
            Some(route) => {
                changed = true;
                format!("@import \"{route}\"")
            }
            None => caps[0].to_string(),
        }
    });

    changed.then(|| imports.into_owned())
}
