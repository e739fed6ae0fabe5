//! Reference rewriting: every externally resolvable attribute is routed back
//! through the proxy.

use url::Url;

use super::{css, resolve_reference, reroute};
use crate::dom::{Document, ElementRef, Edits, FORM_ATTR, INJECTED_ATTR, Markup};
use crate::resolver::has_prefix_ignore_case;
use crate::rewrite::routes::{
    self, FORM_SUBMIT_FIELD, FORM_SUBMIT_PATH, ORIGINAL_METHOD_FIELD, ORIGINAL_URL_FIELD,
    RoutingTarget,
};

/// Parents in which the parser closes a `<form>` immediately.
const TABLE_CONTEXT: &[&str] = &["table", "tbody", "thead", "tfoot", "tr"];

/// Rewrite all references in `doc`. Returns the number of edits.
pub fn rewrite_references(doc: &mut Document, base: &Url) -> usize {
    doc.walk(|el, edits| {
        if el.is_proxy_markup() {
            return;
        }
        match el.name() {
            "a" | "area" => rewrite_hyperlink(el, edits, base),
            "form" => rewrite_form(el, edits, base),
            "script" => set_routed(el, edits, "src", RoutingTarget::ProxyResource, base),
            "link" => set_routed(el, edits, "href", RoutingTarget::ProxyResource, base),
            "img" => {
                set_routed(el, edits, "src", RoutingTarget::ProxyImage, base);
                rewrite_srcset(el, edits, base);
            }
            "iframe" => set_routed(el, edits, "src", RoutingTarget::Navigate, base),
            "video" | "audio" => {
                rewrite_media(el, el.id(), edits, base);
                if el.name() == "video" {
                    set_routed(el, edits, "poster", RoutingTarget::ProxyImage, base);
                }
            }
            "source" => match (el.parent_name(), el.parent_id()) {
                (Some("video" | "audio"), Some(media)) => rewrite_media(el, media, edits, base),
                (Some("picture"), _) => rewrite_srcset(el, edits, base),
                _ => {}
            },
            "style" => {
                if let Some(rewritten) = css::rewrite_css(&el.text(), base) {
                    edits.set_text(el.id(), rewritten);
                }
            }
            _ => {}
        }
        if let Some(rewritten) = el.attr("style").and_then(|style| css::rewrite_css(style, base)) {
            edits.set_attr(el.id(), "style", rewritten);
        }
    })
}

fn set_routed(el: ElementRef<'_>, edits: &mut Edits, attr: &str, target: RoutingTarget, base: &Url) {
    if let Some(route) = el.attr(attr).and_then(|value| reroute(value, target, base)) {
        edits.set_attr(el.id(), attr, route);
    }
}

/// Hyperlinks to files with a downloadable extension go to the download
/// route; everything else is browsed.
fn rewrite_hyperlink(el: ElementRef<'_>, edits: &mut Edits, base: &Url) {
    let Some(absolute) = el.attr("href").and_then(|href| resolve_reference(href, base)) else {
        return;
    };
    let target = if routes::is_downloadable(&absolute) {
        RoutingTarget::Download
    } else {
        RoutingTarget::Navigate
    };
    edits.set_attr(el.id(), "href", target.route(&absolute));
}

/// Route a media source through the media proxy and add a download link for
/// it after the owning media element.
fn rewrite_media(el: ElementRef<'_>, media: ego_tree::NodeId, edits: &mut Edits, base: &Url) {
    let Some(absolute) = el.attr("src").and_then(|src| resolve_reference(src, base)) else {
        return;
    };
    edits.set_attr(el.id(), "src", RoutingTarget::ProxyMedia.route(&absolute));
    edits.insert_after(media, media_download_link(&absolute));
}

fn media_download_link(absolute: &str) -> Markup {
    Markup::element("span")
        .attr("class", "proxy-media-download")
        .attr(INJECTED_ATTR, "media")
        .child(
            Markup::element("a")
                .attr("href", RoutingTarget::Download.route(absolute))
                .attr("target", "_blank")
                .child(Markup::text("Download media")),
        )
}

fn rewrite_srcset(el: ElementRef<'_>, edits: &mut Edits, base: &Url) {
    let Some(srcset) = el.attr("srcset") else {
        return;
    };
    if let Some(rewritten) = rewrite_srcset_value(srcset, base) {
        edits.set_attr(el.id(), "srcset", rewritten);
    }
}

/// Rewrite each candidate of a `srcset` list, keeping its descriptor.
///
/// Lists containing `data:` candidates are left alone since their commas are
/// ambiguous.
pub fn rewrite_srcset_value(srcset: &str, base: &Url) -> Option<String> {
    if srcset.to_ascii_lowercase().contains("data:") {
        return None;
    }
    let mut changed = false;
    let candidates: Vec<String> = srcset
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| {
            let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((url, descriptor)) => (url, Some(descriptor.trim())),
                None => (candidate, None),
            };
            let url = match reroute(url, RoutingTarget::ProxyImage, base) {
                Some(route) => {
                    changed = true;
                    route
                }
                None => url.to_string(),
            };
            match descriptor {
                Some(descriptor) => format!("{url} {descriptor}"),
                None => url,
            }
        })
        .collect();
    changed.then(|| candidates.join(", "))
}

/// Point the form at the internal submit endpoint and carry the original
/// action and method as hidden fields.
fn rewrite_form(el: ElementRef<'_>, edits: &mut Edits, base: &Url) {
    // The parser may move the hidden fields out of the form (e.g. inside a
    // table), so the form itself carries the marker.
    if el.element().has_attr(FORM_ATTR) {
        return;
    }
    let action = el.attr("action").map(str::trim).unwrap_or_default();
    if has_prefix_ignore_case(action, "javascript:") || routes::is_proxied(action) {
        return;
    }

    let absolute = if action.is_empty() {
        base.to_string()
    } else {
        match crate::resolver::try_resolve(action, base) {
            Ok(absolute) => absolute,
            Err(e) => {
                tracing::warn!("Failed to rewrite form action: {e}");
                return;
            }
        }
    };
    if !crate::resolver::is_fetchable(&absolute) {
        return;
    }
    let method = el
        .attr("method")
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "get".to_string());

    let id = el.id();
    edits.set_attr(id, "action", FORM_SUBMIT_PATH);
    edits.set_attr(id, "method", "post");
    edits.set_attr(id, FORM_ATTR, "");
    // Inside table structure the parser keeps a form empty; hidden inputs
    // placed right after it still belong to it and survive a reparse.
    let in_table = el
        .parent_name()
        .is_some_and(|parent| TABLE_CONTEXT.contains(&parent));
    for (name, value) in [
        (ORIGINAL_URL_FIELD, absolute.as_str()),
        (ORIGINAL_METHOD_FIELD, method.as_str()),
        (FORM_SUBMIT_FIELD, "1"),
    ] {
        let input = Markup::element("input")
            .attr("type", "hidden")
            .attr("name", name)
            .attr("value", value);
        if in_table {
            edits.insert_after(id, input);
        } else {
            edits.append(id, input);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(html: &str, base: &str) -> String {
        let base = Url::parse(base).unwrap();
        let mut doc = Document::parse(html);
        rewrite_references(&mut doc, &base);
        doc.to_html()
    }

    #[test]
    fn links_navigate_or_download() {
        let html = rewrite(
            r#"<a href="/report.pdf">r</a><a href="/page2">p</a><area href="maps/a.zip">"#,
            "https://x.com",
        );
        assert!(html.contains(r#"<a href="/download?url=https%3A%2F%2Fx.com%2Freport.pdf">r</a>"#));
        assert!(html.contains(r#"<a href="/browse?url=https%3A%2F%2Fx.com%2Fpage2">p</a>"#));
        assert!(html.contains(r#"<area href="/download?url=https%3A%2F%2Fx.com%2Fmaps%2Fa.zip">"#));
    }

    #[test]
    fn passthrough_links_are_untouched() {
        let html = rewrite(
            concat!(
                r##"<a href="#top">t</a><a href="javascript:void(0)">j</a>"##,
                r#"<a href="mailto:a@b.c">m</a><a href="tel:+1">p</a><a href="ftp://x.com/f">f</a>"#,
            ),
            "https://x.com",
        );
        assert!(html.contains(r##"href="#top""##));
        assert!(html.contains(r#"href="javascript:void(0)""#));
        assert!(html.contains(r#"href="mailto:a@b.c""#));
        assert!(html.contains(r#"href="tel:+1""#));
        assert!(html.contains(r#"href="ftp://x.com/f""#));
    }

    #[test]
    fn sub_resources_are_proxied() {
        let html = rewrite(
            concat!(
                r#"<link rel="stylesheet" href="/s.css"><script src="//cdn.x.com/a.js"></script>"#,
                r#"<img src="i.png" srcset="i-2x.png 2x, /i-3x.png 3x"><iframe src="/frame"></iframe>"#,
            ),
            "https://x.com/dir/",
        );
        assert!(html.contains(r#"href="/proxy-resource?url=https%3A%2F%2Fx.com%2Fs.css""#));
        assert!(html.contains(r#"src="/proxy-resource?url=https%3A%2F%2Fcdn.x.com%2Fa.js""#));
        assert!(html.contains(r#"src="/proxy-image?url=https%3A%2F%2Fx.com%2Fdir%2Fi.png""#));
        assert!(html.contains(concat!(
            r#"srcset="/proxy-image?url=https%3A%2F%2Fx.com%2Fdir%2Fi-2x.png 2x, "#,
            r#"/proxy-image?url=https%3A%2F%2Fx.com%2Fi-3x.png 3x""#,
        )));
        assert!(html.contains(r#"<iframe src="/browse?url=https%3A%2F%2Fx.com%2Fframe">"#));
    }

    #[test]
    fn data_uri_images_are_untouched() {
        let html = rewrite(r#"<img src="data:image/png;base64,AAAA">"#, "https://x.com");
        assert!(html.contains(r#"<img src="data:image/png;base64,AAAA">"#));
    }

    #[test]
    fn media_sources_get_download_links() {
        let html = rewrite(
            r#"<video poster="p.jpg"><source src="a.mp4"><source src="b.webm"></video>"#,
            "https://x.com/",
        );
        assert!(html.contains(r#"poster="/proxy-image?url=https%3A%2F%2Fx.com%2Fp.jpg""#));
        assert!(html.contains(r#"<source src="/proxy-media?url=https%3A%2F%2Fx.com%2Fa.mp4">"#));
        let first = html
            .find(r#"<a href="/download?url=https%3A%2F%2Fx.com%2Fa.mp4" target="_blank">Download media</a>"#)
            .unwrap();
        let second = html
            .find(r#"<a href="/download?url=https%3A%2F%2Fx.com%2Fb.webm" target="_blank">Download media</a>"#)
            .unwrap();
        assert!(html.find("</video>").unwrap() < first);
        assert!(first < second);
    }

    #[test]
    fn audio_src_is_proxied() {
        let html = rewrite(r#"<audio src="/s.mp3"></audio>"#, "https://x.com/");
        assert!(html.contains(r#"<audio src="/proxy-media?url=https%3A%2F%2Fx.com%2Fs.mp3"></audio><span class="proxy-media-download""#));
    }

    #[test]
    fn forms_submit_through_proxy() {
        let html = rewrite(
            r#"<form action="/search" method="GET"><input name="q"></form>"#,
            "https://x.com/page",
        );
        assert!(html.contains(concat!(
            r#"<form action="/browse" method="post" data-proxy-form=""><input name="q">"#,
            r#"<input type="hidden" name="_original_url" value="https://x.com/search">"#,
            r#"<input type="hidden" name="_original_method" value="get">"#,
            r#"<input type="hidden" name="_form_submit" value="1"></form>"#,
        )));
    }

    #[test]
    fn form_without_action_posts_to_base() {
        let html = rewrite(r#"<form method="post"></form>"#, "https://x.com/login");
        assert!(html.contains(r#"name="_original_url" value="https://x.com/login""#));
        assert!(html.contains(r#"name="_original_method" value="post""#));
    }

    #[test]
    fn form_inside_table_is_rewritten_once() {
        let input = concat!(
            r#"<table><form action="/vote" method="post"><tr><td><input name="id" value="7">"#,
            r#"<button>Vote</button></td></tr></form></table>"#,
        );
        let once = rewrite(input, "https://news.test/item");
        let twice = rewrite(&once, "https://news.test/item");
        assert_eq!(once, twice);
        assert_eq!(once.matches(r#"name="_original_url""#).count(), 1);
        assert!(once.contains(concat!(
            r#"<form action="/browse" method="post" data-proxy-form=""></form>"#,
            r#"<input type="hidden" name="_original_url" value="https://news.test/vote">"#,
        )));
        assert!(once.contains(r#"value="https://news.test/vote""#));
        assert!(!once.contains("https://news.test/browse"));
    }

    #[test]
    fn javascript_form_is_untouched() {
        let html = rewrite(r#"<form action="javascript:go()"></form>"#, "https://x.com/");
        assert!(html.contains(r#"<form action="javascript:go()"></form>"#));
    }

    #[test]
    fn inline_styles_are_proxied() {
        let html = rewrite(
            r#"<style>p { background: url(/bg.png) }</style><div style="background-image: url('a.gif')"></div>"#,
            "https://x.com/",
        );
        assert!(html.contains(r#"<style>p { background: url("/proxy-resource?url=https%3A%2F%2Fx.com%2Fbg.png") }</style>"#));
        assert!(html.contains(r#"style="background-image: url(&quot;/proxy-resource?url=https%3A%2F%2Fx.com%2Fa.gif&quot;)""#));
    }

    #[test]
    fn rewriting_is_idempotent() {
        let input = concat!(
            r#"<form action="/s"></form><a href="/a">a</a><img src="/i.png" srcset="/i.png 2x">"#,
            r#"<video src="/v.mp4"></video><div style="background: url(/b.png)"></div>"#,
        );
        let once = rewrite(input, "https://x.com/");
        let twice = rewrite(&once, "https://x.com/");
        assert_eq!(once, twice);
    }

    #[test]
    fn srcset_with_data_uri_is_kept() {
        let base = Url::parse("https://x.com/").unwrap();
        assert_eq!(rewrite_srcset_value("data:image/png;base64,AA 1x, /b.png 2x", &base), None);
        assert_eq!(
            rewrite_srcset_value("/a.png", &base).as_deref(),
            Some("/proxy-image?url=https%3A%2F%2Fx.com%2Fa.png")
        );
    }
}
