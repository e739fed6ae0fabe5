//! Script neutralization, landmark replacement and operator chrome.

use url::Url;

use crate::dom::{CHROME_ATTR, Document, Markup};
use crate::resolver::has_prefix_ignore_case;
use crate::rewrite::routes::{FORM_SUBMIT_PATH, RoutingTarget, SEARCH_PATH};

/// Remove every `<script>` and every inline `on*` event handler.
pub fn strip_scripts(doc: &mut Document) -> usize {
    doc.walk(|el, edits| {
        if el.name() == "script" {
            edits.remove(el.id());
            return;
        }
        for (name, _) in el.element().attrs() {
            if has_prefix_ignore_case(name, "on") {
                edits.remove_attr(el.id(), name);
            }
        }
    })
}

/// Replace `<header>` and `<nav>` with a `<div>` carrying a marker class in
/// front of the existing classes.
pub fn replace_landmarks(doc: &mut Document) -> usize {
    doc.walk(|el, edits| {
        let marker = match el.name() {
            "header" => "proxy-header",
            "nav" => "proxy-nav",
            _ => return,
        };
        if el.is_proxy_markup() {
            return;
        }
        let class = match el.attr("class").map(str::trim).filter(|c| !c.is_empty()) {
            Some(existing) => format!("{marker} {existing}"),
            None => marker.to_string(),
        };
        edits.rename(el.id(), "div");
        edits.set_attr(el.id(), "class", class);
    })
}

/// Insert the address bar and navigation links at the start of `<body>`,
/// unless the document already carries them.
pub fn inject_chrome(doc: &mut Document, base: &Url, is_search_result: bool) -> usize {
    if doc.any_element(|el| el.has_attr(CHROME_ATTR)) {
        return 0;
    }
    let Some(body) = doc.first_element("body") else {
        return 0;
    };
    let mut edits = crate::dom::Edits::default();
    edits.prepend(body, chrome(base, is_search_result));
    doc.apply(edits)
}

fn chrome(base: &Url, is_search_result: bool) -> Markup {
    let (action, field, value) = if is_search_result {
        let query = base
            .query_pairs()
            .find(|(key, _)| key == "q")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        (SEARCH_PATH, "q", query)
    } else {
        (FORM_SUBMIT_PATH, "url", base.to_string())
    };

    let address_bar = Markup::element("form")
        .attr("class", "proxy-address-bar")
        .attr("action", action)
        .attr("method", "get")
        .child(
            Markup::element("input")
                .attr("type", "text")
                .attr("name", field)
                .attr("value", value),
        )
        .child(
            Markup::element("button")
                .attr("type", "submit")
                .child(Markup::text("Go")),
        );

    let link = |href: String, label: &str| {
        Markup::element("a")
            .attr("href", href)
            .child(Markup::text(label))
    };

    Markup::element("div")
        .attr("id", "proxy-chrome")
        .attr(CHROME_ATTR, "")
        .child(address_bar)
        .child(
            Markup::element("span")
                .attr("class", "proxy-links")
                .child(link("/".to_string(), "Home"))
                .child(Markup::text(" "))
                .child(link(RoutingTarget::Download.route(base.as_str()), "Download page"))
                .child(Markup::text(" "))
                .child(link("/settings".to_string(), "Settings")),
        )
}
