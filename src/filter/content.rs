//! Level-cumulative removal of ads, overlays, clutter and embeds.

use url::Url;

use crate::dom::{Document, ElementRef, INJECTED_ATTR, Markup};
use crate::filter::patterns::{FilterPatterns, contains_any, matches_markers};
use crate::filter::tracking;
use crate::options::ContentFilterLevel;
use crate::resolver;
use crate::rewrite::routes::RoutingTarget;

/// Value of [`INJECTED_ATTR`] on the hiding style block.
const HIDE_STYLE_MARKER: &str = "filter";

/// Stacking order from which an inline `z-index` counts as an overlay.
const OVERLAY_Z_INDEX: i64 = 999;

/// Apply the content filter at `level`. Returns the number of edits.
///
/// `None` leaves the document untouched. Each level removes everything the
/// previous level removes.
pub fn apply_content_filter(
    doc: &mut Document,
    level: ContentFilterLevel,
    patterns: &FilterPatterns,
    base: &Url,
) -> usize {
    if level == ContentFilterLevel::None {
        return 0;
    }

    let mut changed = doc.walk(|el, edits| {
        if el.is_protected() || el.is_proxy_markup() {
            return;
        }
        if is_removed_at(el, level, patterns) {
            edits.remove(el.id());
        } else if level >= ContentFilterLevel::High && is_embed(el, patterns) {
            edits.replace(el.id(), embed_placeholder(el.attr("src").unwrap_or_default(), base));
        }
    });

    if level >= ContentFilterLevel::High {
        changed += inject_hide_style(doc, patterns);
    }
    changed
}

fn is_removed_at(el: ElementRef<'_>, level: ContentFilterLevel, patterns: &FilterPatterns) -> bool {
    let low = is_ad(el, patterns)
        || match el.name() {
            "script" => tracking::is_tracking_script(el, patterns),
            "img" => tracking::is_tracking_pixel(el.element(), patterns),
            _ => false,
        };
    if low || level < ContentFilterLevel::Medium {
        return low;
    }
    if is_overlay(el, patterns) {
        return true;
    }
    level >= ContentFilterLevel::High && is_clutter(el, patterns)
}

fn is_ad(el: ElementRef<'_>, patterns: &FilterPatterns) -> bool {
    if matches_markers(el.element(), &patterns.ad_markers, &patterns.ad_classes) {
        return true;
    }
    if patterns.ad_attributes.iter().any(|attr| el.element().has_attr(attr)) {
        return true;
    }
    el.name() == "iframe"
        && contains_any(
            &el.attr("src").unwrap_or_default().to_ascii_lowercase(),
            &patterns.ad_frame_sources,
        )
}

fn is_overlay(el: ElementRef<'_>, patterns: &FilterPatterns) -> bool {
    if matches_markers(el.element(), &patterns.overlay_markers, &patterns.overlay_classes) {
        return true;
    }
    let role = el.attr("role").unwrap_or_default().trim().to_ascii_lowercase();
    if patterns.overlay_roles.iter().any(|r| *r == role) {
        return true;
    }
    el.attr("style").is_some_and(is_intrusive_style)
}

fn is_clutter(el: ElementRef<'_>, patterns: &FilterPatterns) -> bool {
    el.name() == "aside"
        || matches_markers(el.element(), &patterns.clutter_markers, &patterns.clutter_classes)
}

fn is_embed(el: ElementRef<'_>, patterns: &FilterPatterns) -> bool {
    el.name() == "iframe"
        && el
            .attr("src")
            .is_some_and(|src| contains_any(&src.to_ascii_lowercase(), &patterns.embed_hosts))
}

/// Whether an inline style pins the element over the page: fixed positioning
/// or a `z-index` of at least 999.
pub fn is_intrusive_style(style: &str) -> bool {
    let compact: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if compact.contains("position:fixed") {
        return true;
    }
    compact.split(';').any(|declaration| {
        declaration
            .strip_prefix("z-index:")
            .map(|value| value.trim_end_matches("!important"))
            .and_then(|value| value.parse::<i64>().ok())
            .is_some_and(|z| z >= OVERLAY_Z_INDEX)
    })
}

/// Placeholder standing in for a blocked third-party embed.
fn embed_placeholder(src: &str, base: &Url) -> Markup {
    let notice = Markup::element("span")
        .attr("class", "proxy-embed-notice")
        .child(Markup::text("External content embed (blocked for privacy)"));
    let mut placeholder = Markup::element("span")
        .attr("class", "proxy-embed-placeholder")
        .attr(INJECTED_ATTR, "embed")
        .child(notice);

    match resolver::try_resolve(src.trim(), base) {
        Ok(absolute) if resolver::is_fetchable(&absolute) => {
            placeholder = placeholder.child(Markup::text(" ")).child(
                Markup::element("a")
                    .attr("href", RoutingTarget::Navigate.route(&absolute))
                    .attr("target", "_blank")
                    .attr("rel", "noopener noreferrer")
                    .child(Markup::text("View content directly")),
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Could not resolve embed source: {e}"),
    }
    placeholder
}

fn hide_style_rules(patterns: &FilterPatterns) -> String {
    let selectors: Vec<String> = patterns
        .hidden_markers
        .iter()
        .map(|marker| format!("[class*=\"{marker}\"],[id*=\"{marker}\"]"))
        .collect();
    format!("{}{{display:none !important}}", selectors.join(","))
}

/// Append the last-resort hiding style to `<head>` unless it is already there.
fn inject_hide_style(doc: &mut Document, patterns: &FilterPatterns) -> usize {
    if patterns.hidden_markers.is_empty() {
        return 0;
    }
    let present = doc.any_element(|el| {
        el.name() == "style" && el.attr(INJECTED_ATTR) == Some(HIDE_STYLE_MARKER)
    });
    if present {
        return 0;
    }
    let Some(head) = doc.first_element("head") else {
        return 0;
    };
    let mut edits = crate::dom::Edits::default();
    edits.append(
        head,
        Markup::element("style")
            .attr(INJECTED_ATTR, HIDE_STYLE_MARKER)
            .child(Markup::text(hide_style_rules(patterns))),
    );
    doc.apply(edits)
}
