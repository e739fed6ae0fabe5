//! Tracking scripts, pixels and query parameters.

use url::Url;

use crate::dom::{Document, Element, ElementRef};
use crate::filter::patterns::{FilterPatterns, contains_any};
use crate::resolver;
use crate::rewrite::routes;

/// Remove tracking parameters from every hyperlink target.
///
/// Other parameters keep their order and encoding. A target that cannot be
/// parsed is logged and left unchanged.
pub fn strip_tracking_params(doc: &mut Document, patterns: &FilterPatterns, base: &Url) -> usize {
    doc.walk(|el, edits| {
        if !matches!(el.name(), "a" | "area") || el.is_proxy_markup() {
            return;
        }
        let Some(href) = el.attr("href") else {
            return;
        };
        let href = href.trim();
        if !href.contains('?') || resolver::is_passthrough(href) || routes::is_proxied(href) {
            return;
        }
        if let Err(e) = resolver::try_resolve(href, base) {
            tracing::warn!("Error sanitizing URL: {e}");
            return;
        }
        if let Some(mut cleaned) = clean_query(href, patterns) {
            // A bare `?...` link loses its whole query: keep it on the base
            // path, since an empty href would still carry the base query.
            if cleaned.is_empty() || cleaned.starts_with('#') {
                cleaned.insert_str(0, base.path());
            }
            edits.set_attr(el.id(), "href", cleaned);
        }
    })
}

/// Drop tracking parameters from a (possibly relative) URL.
///
/// Returns `None` when nothing was removed.
pub fn clean_query(href: &str, patterns: &FilterPatterns) -> Option<String> {
    let (without_fragment, fragment) = match href.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (href, None),
    };
    let (path, query) = without_fragment.split_once('?')?;

    let mut removed = false;
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(key, _)| key);
            let tracking = !key.is_empty() && patterns.is_tracking_param(key);
            removed |= tracking;
            !tracking
        })
        .collect();
    if !removed {
        return None;
    }

    let mut cleaned = path.to_string();
    if kept.iter().any(|pair| !pair.is_empty()) {
        cleaned.push('?');
        cleaned.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        cleaned.push('#');
        cleaned.push_str(fragment);
    }
    Some(cleaned)
}

/// Whether a script loads or embeds a known tracking vendor.
pub fn is_tracking_script(el: ElementRef<'_>, patterns: &FilterPatterns) -> bool {
    let src = el.attr("src").unwrap_or_default();
    contains_any(src, &patterns.tracking_scripts)
        || contains_any(&el.text(), &patterns.tracking_scripts)
}

/// Whether an image is a tracking pixel, by URL or by its `1x1` / `0x0` size.
pub fn is_tracking_pixel(el: &Element, patterns: &FilterPatterns) -> bool {
    let src = el.attr("src").unwrap_or_default();
    if contains_any(src, &patterns.tracking_pixels) {
        return true;
    }
    let dimension = |name: &str| {
        el.attr(name)
            .map(|v| v.trim().trim_end_matches("px").trim().to_string())
    };
    matches!(
        (dimension("width").as_deref(), dimension("height").as_deref()),
        (Some("1"), Some("1")) | (Some("0"), Some("0"))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://x.com/").unwrap()
    }

    #[test]
    fn clean_query_keeps_other_params_in_order() {
        let patterns = FilterPatterns::default();
        assert_eq!(
            clean_query("https://x.com/?utm_source=foo&id=1", &patterns).as_deref(),
            Some("https://x.com/?id=1")
        );
        assert_eq!(
            clean_query("/p?b=2&fbclid=x&a=%20&utm_medium=m#frag", &patterns).as_deref(),
            Some("/p?b=2&a=%20#frag")
        );
    }

    #[test]
    fn clean_query_drops_empty_query() {
        let patterns = FilterPatterns::default();
        assert_eq!(
            clean_query("/p?gclid=1&utm_campaign=x", &patterns).as_deref(),
            Some("/p")
        );
    }

    #[test]
    fn clean_query_without_tracking_is_none() {
        let patterns = FilterPatterns::default();
        assert_eq!(clean_query("/p?id=1&page=2", &patterns), None);
        assert_eq!(clean_query("/p", &patterns), None);
    }

    #[test]
    fn strips_params_from_links_only() {
        let mut doc = Document::parse(concat!(
            r#"<a href="https://x.com/?utm_source=foo&amp;id=1">a</a>"#,
            r#"<img src="/i.png?utm_source=foo">"#,
        ));
        let changed = strip_tracking_params(&mut doc, &FilterPatterns::default(), &base());
        assert_eq!(changed, 1);
        let html = doc.to_html();
        assert!(html.contains(r#"<a href="https://x.com/?id=1">a</a>"#));
        assert!(html.contains("/i.png?utm_source=foo"));
    }

    #[test]
    fn query_only_link_keeps_base_path() {
        let base = Url::parse("https://x.com/p?a=1").unwrap();
        let mut doc = Document::parse(concat!(
            r#"<a href="?utm_source=x">a</a>"#,
            r#"<a href="?utm_source=x#top">b</a>"#,
            r#"<a href="?fbclid=1&amp;page=2">c</a>"#,
        ));
        let changed = strip_tracking_params(&mut doc, &FilterPatterns::default(), &base);
        assert_eq!(changed, 3);
        let html = doc.to_html();
        assert!(html.contains(r#"<a href="/p">a</a>"#));
        assert!(html.contains(r#"<a href="/p#top">b</a>"#));
        assert!(html.contains(r#"<a href="?page=2">c</a>"#));
    }

    #[test]
    fn malformed_link_is_left_alone() {
        let mut doc = Document::parse(r#"<a href="http://[bad?utm_source=x">a</a>"#);
        let changed = strip_tracking_params(&mut doc, &FilterPatterns::default(), &base());
        assert_eq!(changed, 0);
        assert!(doc.to_html().contains("http://[bad?utm_source=x"));
    }

    fn matches_in(html: &str, patterns: &FilterPatterns) -> Vec<String> {
        let mut doc = Document::parse(html);
        let mut found = Vec::new();
        doc.walk(|el, _| {
            let hit = match el.name() {
                "script" => is_tracking_script(el, patterns),
                "img" => is_tracking_pixel(el.element(), patterns),
                _ => false,
            };
            if hit {
                found.push(el.attr("src").unwrap_or("inline").to_string());
            }
        });
        found
    }

    #[test]
    fn detects_tracking_scripts_and_pixels() {
        let found = matches_in(
            concat!(
                r#"<script src="https://www.googletagmanager.com/gtm.js?id=1"></script>"#,
                r#"<script>window.hotjar = {};</script>"#,
                r#"<script src="/app.js"></script>"#,
                r#"<img width="1" height="1" src="https://t.co/p.gif">"#,
                r#"<img src="https://x.com/beacon.gif">"#,
                r#"<img width="0px" height="0" src="/z.gif">"#,
                r#"<img width="1" height="40" src="/thin.png">"#,
            ),
            &FilterPatterns::default(),
        );
        assert_eq!(
            found,
            vec![
                "https://www.googletagmanager.com/gtm.js?id=1",
                "inline",
                "https://t.co/p.gif",
                "https://x.com/beacon.gif",
                "/z.gif",
            ]
        );
    }

    #[test]
    fn synthetic_patterns_are_honored() {
        let patterns = FilterPatterns::empty().with_tracking_scripts(vec!["evil-metrics"]);
        let found = matches_in(
            concat!(
                r#"<script src="https://evil-metrics.test/m.js"></script>"#,
                r#"<script src="https://www.google-analytics.com/analytics.js"></script>"#,
            ),
            &patterns,
        );
        assert_eq!(found, vec!["https://evil-metrics.test/m.js"]);
    }
}
