//! Content-Security-Policy and referrer meta tags.
//!
//! The origin's own policy is dropped and replaced with one that confines the
//! page to the proxy's origin. The proxy's policy also tells a page that has
//! already been rewritten apart from fresh origin markup.

use crate::dom::{Document, Element, MARKER_ATTRS, Markup};

/// Policy asserted on every rewritten page.
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; connect-src 'self'; img-src 'self' data:; style-src 'self' 'unsafe-inline';";

fn is_policy_meta(el: &Element) -> bool {
    if el.name() != "meta" {
        return false;
    }
    let csp = el
        .attr("http-equiv")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("content-security-policy"));
    let referrer = el
        .attr("name")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("referrer"));
    csp || referrer
}

/// Whether the document carries the policy injected by an earlier rewrite.
pub fn has_proxy_policy(doc: &Document) -> bool {
    doc.any_element(|el| {
        is_policy_meta(el)
            && el.has_attr("http-equiv")
            && el.attr("content") == Some(CONTENT_SECURITY_POLICY)
    })
}

/// Drop the rewrite marker attributes from origin markup, so a page cannot
/// exempt its own elements from rewriting. Output of an earlier rewrite keeps
/// its markers. Returns the number of attributes removed.
pub fn strip_proxy_markers(doc: &mut Document) -> usize {
    if has_proxy_policy(doc) {
        return 0;
    }
    doc.walk(|el, edits| {
        for &marker in MARKER_ATTRS {
            if el.attr(marker).is_some() {
                edits.remove_attr(el.id(), marker);
            }
        }
    })
}

/// Remove pre-existing CSP and referrer meta tags. Returns the number removed.
pub fn strip_policy_meta(doc: &mut Document) -> usize {
    doc.walk(|el, edits| {
        if is_policy_meta(el.element()) {
            edits.remove(el.id());
        }
    })
}

/// Insert the proxy's CSP and a no-referrer policy at the start of `<head>`.
pub fn inject_policy_meta(doc: &mut Document) -> usize {
    let Some(head) = doc.first_element("head") else {
        tracing::debug!("Document has no head; skipping policy meta injection");
        return 0;
    };
    // Strip again so a document that already carries the proxy's tags keeps exactly one copy.
    let removed = strip_policy_meta(doc);
    let mut edits = crate::dom::Edits::default();
    edits.prepend(
        head,
        Markup::element("meta")
            .attr("name", "referrer")
            .attr("content", "no-referrer"),
    );
    edits.prepend(
        head,
        Markup::element("meta")
            .attr("http-equiv", "Content-Security-Policy")
            .attr("content", CONTENT_SECURITY_POLICY),
    );
    removed + doc.apply(edits)
}
