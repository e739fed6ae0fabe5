//! Literal pattern tables driving the tracking and content filters.
//!
//! The tables are data: every list can be replaced through the builder
//! methods, which is how tests inject synthetic patterns.

use crate::dom::Element;

/// Substring and domain tables used by the filter stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPatterns {
    /// Substrings of a script `src` or inline body identifying tracking vendors.
    pub tracking_scripts: Vec<String>,
    /// Substrings of an image `src` identifying tracking pixels.
    pub tracking_pixels: Vec<String>,
    /// Query keys stripped from hyperlinks. Entries ending in `*` match by prefix.
    pub tracking_params: Vec<String>,
    /// Class/id substrings of ad containers.
    pub ad_markers: Vec<String>,
    /// Exact class tokens of ad containers.
    pub ad_classes: Vec<String>,
    /// Attributes whose presence marks an ad container.
    pub ad_attributes: Vec<String>,
    /// Substrings of an iframe `src` pointing at ad servers.
    pub ad_frame_sources: Vec<String>,
    /// Class/id substrings of popups, modals, newsletter and consent prompts.
    pub overlay_markers: Vec<String>,
    /// Exact class tokens of cookie and consent banners.
    pub overlay_classes: Vec<String>,
    /// `role` values of intrusive overlays.
    pub overlay_roles: Vec<String>,
    /// Class/id substrings of comment, related-content and sidebar blocks.
    pub clutter_markers: Vec<String>,
    /// Exact class tokens of secondary content blocks.
    pub clutter_classes: Vec<String>,
    /// Hosts whose embedded frames are replaced with a placeholder.
    pub embed_hosts: Vec<String>,
    /// Class/id substrings hidden by the last-resort style block.
    pub hidden_markers: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for FilterPatterns {
    fn default() -> Self {
        Self {
            tracking_scripts: owned(&[
                "google-analytics",
                "googletagmanager",
                "facebook.net",
                "fbevents.js",
                "twitter.com/widgets.js",
                "connect.facebook.net",
                "platform.twitter.com",
                "ads.js",
                "analytics.js",
                "tracking",
                "matomo",
                "piwik",
                "gtm.js",
                "hotjar",
                "clarity.ms",
            ]),
            tracking_pixels: owned(&[
                "facebook.com/tr",
                "google.com/pixel",
                "pixel.gif",
                "tracker.gif",
                "beacon.gif",
                "analytics.gif",
                "tracking.gif",
                "pixel.php",
                "beacon.php",
            ]),
            tracking_params: owned(&[
                "utm_*", "fbclid", "gclid", "dclid", "zanpid", "msclkid", "ref", "_hsenc", "_hsmi",
                "mc_cid", "mc_eid",
            ]),
            ad_markers: owned(&["ad-", "ads-", "advertisement"]),
            ad_classes: owned(&[
                "advert",
                "advertisement",
                "banner-ad",
                "sponsored-content",
                "adsbygoogle",
            ]),
            ad_attributes: owned(&["data-ad", "data-ads"]),
            ad_frame_sources: owned(&["doubleclick.net", "googleadservices", "ad.", "ads.", "banner"]),
            overlay_markers: owned(&[
                "popup",
                "modal",
                "newsletter",
                "subscribe",
                "social-share",
                "social-media",
                "follow-us",
            ]),
            overlay_classes: owned(&["cookie-notice", "cookie-banner", "gdpr", "consent"]),
            overlay_roles: owned(&["dialog", "alert"]),
            clutter_markers: owned(&[
                "comment",
                "related",
                "recommendation",
                "suggested",
                "sidebar",
                "widget",
            ]),
            clutter_classes: owned(&[
                "aside",
                "trending",
                "popular",
                "most-read",
                "most-shared",
            ]),
            embed_hosts: owned(&[
                "youtube.com",
                "vimeo.com",
                "facebook.com",
                "twitter.com",
                "instagram.com",
                "tiktok.com",
            ]),
            hidden_markers: owned(&["cookie", "consent", "notification", "sticky"]),
        }
    }
}

impl FilterPatterns {
    /// An empty table set; nothing matches.
    pub fn empty() -> Self {
        Self {
            tracking_scripts: Vec::new(),
            tracking_pixels: Vec::new(),
            tracking_params: Vec::new(),
            ad_markers: Vec::new(),
            ad_classes: Vec::new(),
            ad_attributes: Vec::new(),
            ad_frame_sources: Vec::new(),
            overlay_markers: Vec::new(),
            overlay_classes: Vec::new(),
            overlay_roles: Vec::new(),
            clutter_markers: Vec::new(),
            clutter_classes: Vec::new(),
            embed_hosts: Vec::new(),
            hidden_markers: Vec::new(),
        }
    }

    pub fn with_tracking_scripts(mut self, patterns: Vec<&str>) -> Self {
        self.tracking_scripts = owned(&patterns);
        self
    }

    pub fn with_tracking_pixels(mut self, patterns: Vec<&str>) -> Self {
        self.tracking_pixels = owned(&patterns);
        self
    }

    pub fn with_tracking_params(mut self, params: Vec<&str>) -> Self {
        self.tracking_params = owned(&params);
        self
    }

    pub fn with_ad_markers(mut self, markers: Vec<&str>) -> Self {
        self.ad_markers = owned(&markers);
        self
    }

    pub fn with_overlay_markers(mut self, markers: Vec<&str>) -> Self {
        self.overlay_markers = owned(&markers);
        self
    }

    pub fn with_clutter_markers(mut self, markers: Vec<&str>) -> Self {
        self.clutter_markers = owned(&markers);
        self
    }

    pub fn with_embed_hosts(mut self, hosts: Vec<&str>) -> Self {
        self.embed_hosts = owned(&hosts);
        self
    }

    /// Whether a query key is a tracking parameter.
    pub fn is_tracking_param(&self, key: &str) -> bool {
        self.tracking_params.iter().any(|param| match param.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == param,
        })
    }
}

/// Whether `haystack` contains any of `needles`.
pub(crate) fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

/// Whether the element's class or id contains any marker, or any class token
/// equals one of `classes`. Comparison is case-insensitive.
pub(crate) fn matches_markers(el: &Element, markers: &[String], classes: &[String]) -> bool {
    let class = el.attr("class").unwrap_or_default().to_ascii_lowercase();
    let id = el.attr("id").unwrap_or_default().to_ascii_lowercase();
    if markers
        .iter()
        .any(|marker| class.contains(marker.as_str()) || id.contains(marker.as_str()))
    {
        return true;
    }
    class
        .split_ascii_whitespace()
        .any(|token| classes.iter().any(|c| c == token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(attrs: &[(&str, &str)]) -> Element {
        let mut el = Element::new("div");
        for (k, v) in attrs {
            el.set_attr(*k, *v);
        }
        el
    }

    #[test]
    fn tracking_param_prefix_and_exact_match() {
        let patterns = FilterPatterns::default();
        assert!(patterns.is_tracking_param("utm_source"));
        assert!(patterns.is_tracking_param("utm_anything"));
        assert!(patterns.is_tracking_param("fbclid"));
        assert!(!patterns.is_tracking_param("id"));
        assert!(!patterns.is_tracking_param("fbclid2"));
    }

    #[test]
    fn markers_match_class_or_id_substrings() {
        let markers = owned(&["ad-"]);
        assert!(matches_markers(&element(&[("class", "top ad-slot")]), &markers, &[]));
        assert!(matches_markers(&element(&[("id", "AD-banner")]), &markers, &[]));
        assert!(!matches_markers(&element(&[("class", "header")]), &markers, &[]));
    }

    #[test]
    fn exact_class_tokens() {
        let classes = owned(&["advert"]);
        assert!(matches_markers(&element(&[("class", "box advert")]), &[], &classes));
        assert!(!matches_markers(&element(&[("class", "adverts")]), &[], &classes));
    }

    #[test]
    fn injected_patterns_replace_defaults() {
        let patterns = FilterPatterns::empty()
            .with_ad_markers(vec!["zz-promo"])
            .with_tracking_params(vec!["sid"]);
        assert_eq!(patterns.ad_markers, vec!["zz-promo".to_string()]);
        assert!(patterns.is_tracking_param("sid"));
        assert!(!patterns.is_tracking_param("utm_source"));
    }

    #[test]
    fn contains_any_substring() {
        let needles = owned(&["hotjar", "matomo"]);
        assert!(contains_any("https://static.hotjar.com/c.js", &needles));
        assert!(!contains_any("https://cdn.example.com/app.js", &needles));
    }
}
