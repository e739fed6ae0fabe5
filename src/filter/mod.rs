//! Tracking and ad filtering.
//!
//! Two pipeline stages live here:
//!
//! - [`PolicyMetaStrip`] -- drops the origin's CSP and referrer meta tags, and
//!   any rewrite marker attributes the origin markup carries.
//! - [`TrackingFilter`] -- asserts the proxy's own policy, strips tracking
//!   query parameters from links and runs the level-cumulative content filter.
//!
//! Detection is driven entirely by the [`FilterPatterns`] tables.

mod content;
pub mod patterns;
mod privacy;
mod tracking;

pub use content::{apply_content_filter, is_intrusive_style};
pub use patterns::FilterPatterns;
pub use privacy::{
    CONTENT_SECURITY_POLICY, has_proxy_policy, inject_policy_meta, strip_policy_meta,
    strip_proxy_markers,
};
pub use tracking::{clean_query, is_tracking_pixel, is_tracking_script, strip_tracking_params};

use crate::dom::Document;
use crate::pipeline::{RewriteContext, Stage};

/// Removes pre-existing Content-Security-Policy and referrer meta tags.
///
/// Marker attributes are removed first, while the proxy's own policy still
/// identifies a page that was already rewritten.
pub struct PolicyMetaStrip;

impl Stage for PolicyMetaStrip {
    fn name(&self) -> &'static str {
        "policy-meta-strip"
    }

    fn apply(&self, doc: &mut Document, _ctx: &RewriteContext<'_>) -> usize {
        let markers = strip_proxy_markers(doc);
        markers + strip_policy_meta(doc)
    }
}

/// Privacy meta injection, tracking parameter stripping and content filtering.
///
/// The first two always run; the content filter follows the requested level.
pub struct TrackingFilter;

impl Stage for TrackingFilter {
    fn name(&self) -> &'static str {
        "tracking-filter"
    }

    fn apply(&self, doc: &mut Document, ctx: &RewriteContext<'_>) -> usize {
        let mut changed = inject_policy_meta(doc);
        changed += strip_tracking_params(doc, ctx.patterns, ctx.base);
        changed += apply_content_filter(doc, ctx.options.content_filter, ctx.patterns, ctx.base);
        changed
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::options::{ContentFilterLevel, RewriteOptions};

    fn run(stage: &dyn Stage, html: &str, level: ContentFilterLevel) -> String {
        let base = Url::parse("https://x.com/").unwrap();
        let patterns = FilterPatterns::default();
        let ctx = RewriteContext {
            base: &base,
            options: RewriteOptions::new(false, level),
            patterns: &patterns,
        };
        let mut doc = Document::parse(html);
        stage.apply(&mut doc, &ctx);
        doc.to_html()
    }

    #[test]
    fn tracking_filter_runs_level_independent_steps() {
        let html = run(
            &TrackingFilter,
            r#"<a href="/p?utm_source=x&amp;id=2">p</a><div class="ad-slot">ad</div>"#,
            ContentFilterLevel::None,
        );
        assert!(html.contains("no-referrer"));
        assert!(html.contains(r#"href="/p?id=2""#));
        assert!(html.contains("ad-slot"));
    }

    #[test]
    fn tracking_filter_applies_level() {
        let html = run(
            &TrackingFilter,
            r#"<div class="ad-slot">ad</div><p>keep</p>"#,
            ContentFilterLevel::Low,
        );
        assert!(!html.contains("ad-slot"));
        assert!(html.contains("<p>keep</p>"));
    }

    #[test]
    fn policy_strip_leaves_other_meta() {
        let html = run(
            &PolicyMetaStrip,
            r#"<meta http-equiv="content-security-policy" content="x"><meta name="viewport" content="w">"#,
            ContentFilterLevel::High,
        );
        assert!(!html.contains(r#"content="x""#));
        assert!(html.contains("viewport"));
    }

    #[test]
    fn policy_strip_drops_origin_markers() {
        let html = run(
            &PolicyMetaStrip,
            r#"<nav data-proxy-chrome=""><a href="/x">x</a></nav>"#,
            ContentFilterLevel::None,
        );
        assert!(html.contains(r#"<nav><a href="/x">x</a></nav>"#));
    }
}
