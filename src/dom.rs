//! Owned, arena-backed document tree mutated in place by the rewrite stages.
//!
//! The input is parsed with `scraper` (html5ever) and copied into an
//! `ego_tree::Tree` whose element attributes are plain owned strings. Stages
//! walk the tree with [`Document::walk`], recording [`Edits`] that are applied
//! once the walk completes so that no traversal ever observes a half-edited
//! tree.

use std::collections::HashMap;

use ego_tree::iter::Edge;
use ego_tree::{NodeId, NodeMut, NodeRef, Tree};
use scraper::Html;

/// HTML5 void elements that must not have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "xmp", "noembed", "noframes", "plaintext",
];

/// Elements whose leading newline is dropped by the parser.
const LEADING_NEWLINE_ELEMENTS: &[&str] = &["pre", "textarea", "listing"];

/// Elements that filtering never removes.
const PROTECTED_ELEMENTS: &[&str] = &["html", "head", "body"];

/// Attribute marking the operator chrome injected into rendered pages.
pub const CHROME_ATTR: &str = "data-proxy-chrome";
/// Attribute marking any other markup injected by the rewrite stages.
pub const INJECTED_ATTR: &str = "data-proxy-injected";
/// Attribute marking a form already pointed at the internal submit endpoint.
pub const FORM_ATTR: &str = "data-proxy-form";
/// Every attribute the rewrite stages use to recognize their own output.
pub const MARKER_ATTRS: &[&str] = &[CHROME_ATTR, INJECTED_ATTR, FORM_ATTR];

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
}

/// An element with its attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(key, _)| key == name)?;
        Some(self.attrs.remove(index).1)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }
}

/// Markup injected by a stage, built directly as nodes rather than parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<Markup>,
    },
    Text(String),
}

impl Markup {
    pub fn element(name: impl Into<String>) -> Self {
        Markup::Element {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Markup::Text(text.into())
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Markup::Element { attrs, .. } = &mut self {
            attrs.push((name.into(), value.into()));
        }
        self
    }

    pub fn child(mut self, child: Markup) -> Self {
        if let Markup::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    fn into_parts(self) -> (Node, Vec<Markup>) {
        match self {
            Markup::Element {
                name,
                attrs,
                children,
            } => (Node::Element(Element { name, attrs }), children),
            Markup::Text(text) => (Node::Text(text), Vec::new()),
        }
    }
}

fn append_markup(parent: &mut NodeMut<'_, Node>, markup: Markup) -> NodeId {
    let (value, children) = markup.into_parts();
    let mut node = parent.append(value);
    for child in children {
        append_markup(&mut node, child);
    }
    node.id()
}

fn prepend_markup(parent: &mut NodeMut<'_, Node>, markup: Markup) -> NodeId {
    let (value, children) = markup.into_parts();
    let mut node = parent.prepend(value);
    for child in children {
        append_markup(&mut node, child);
    }
    node.id()
}

fn insert_markup_after(sibling: &mut NodeMut<'_, Node>, markup: Markup) -> NodeId {
    let (value, children) = markup.into_parts();
    let mut node = sibling.insert_after(value);
    for child in children {
        append_markup(&mut node, child);
    }
    node.id()
}

/// Read-only view of an element during a walk.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    node: NodeRef<'a, Node>,
    element: &'a Element,
}

impl<'a> ElementRef<'a> {
    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn name(&self) -> &'a str {
        self.element.name()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.attr(name)
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.node.parent().map(|parent| parent.id())
    }

    pub fn parent_name(&self) -> Option<&'a str> {
        match self.node.parent()?.value() {
            Node::Element(parent) => Some(parent.name()),
            _ => None,
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        self.node
            .descendants()
            .filter_map(|node| match node.value() {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether this element or one of its ancestors satisfies `pred`.
    pub fn is_within(&self, pred: impl Fn(&Element) -> bool) -> bool {
        pred(self.element)
            || self.node.ancestors().any(|node| match node.value() {
                Node::Element(el) => pred(el),
                _ => false,
            })
    }

    /// Whether this element belongs to markup injected by the proxy itself.
    pub fn is_proxy_markup(&self) -> bool {
        self.is_within(|el| el.has_attr(CHROME_ATTR) || el.has_attr(INJECTED_ATTR))
    }

    /// `html`, `head` and `body` are structural and never filtered away.
    pub fn is_protected(&self) -> bool {
        PROTECTED_ELEMENTS.contains(&self.name())
    }

    /// Whether a descendant element (excluding this one) satisfies `pred`.
    pub fn has_descendant(&self, pred: impl Fn(&Element) -> bool) -> bool {
        self.node.descendants().skip(1).any(|node| match node.value() {
            Node::Element(el) => pred(el),
            _ => false,
        })
    }
}

#[derive(Debug)]
enum Edit {
    Remove,
    Replace(Markup),
    Rename(String),
    SetAttr(String, String),
    RemoveAttr(String),
    SetText(String),
    Append(Markup),
    Prepend(Markup),
    InsertAfter(Markup),
}

/// Edits recorded during a walk, applied in recording order.
#[derive(Debug, Default)]
pub struct Edits {
    ops: Vec<(NodeId, Edit)>,
}

impl Edits {
    pub fn remove(&mut self, id: NodeId) {
        self.ops.push((id, Edit::Remove));
    }

    pub fn replace(&mut self, id: NodeId, markup: Markup) {
        self.ops.push((id, Edit::Replace(markup)));
    }

    /// Change an element's tag name, keeping attributes and children.
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) {
        self.ops.push((id, Edit::Rename(name.into())));
    }

    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        self.ops.push((id, Edit::SetAttr(name.into(), value.into())));
    }

    pub fn remove_attr(&mut self, id: NodeId, name: impl Into<String>) {
        self.ops.push((id, Edit::RemoveAttr(name.into())));
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.ops.push((id, Edit::SetText(text.into())));
    }

    pub fn append(&mut self, id: NodeId, markup: Markup) {
        self.ops.push((id, Edit::Append(markup)));
    }

    pub fn prepend(&mut self, id: NodeId, markup: Markup) {
        self.ops.push((id, Edit::Prepend(markup)));
    }

    /// Insert markup after `id`. Repeated insertions after the same node keep
    /// their recording order.
    pub fn insert_after(&mut self, id: NodeId, markup: Markup) {
        self.ops.push((id, Edit::InsertAfter(markup)));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A parsed document exclusively owned by one rewrite.
#[derive(Debug, Clone)]
pub struct Document {
    tree: Tree<Node>,
}

impl Document {
    /// Parse an HTML document. The parser is error-tolerant and always yields a tree.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut tree = Tree::new(Node::Document);
        let mut stack = vec![tree.root().id()];

        for edge in parsed.tree.root().traverse() {
            match edge {
                Edge::Open(node) => {
                    let parent = stack.last().copied().unwrap_or_else(|| tree.root().id());
                    let converted = match node.value() {
                        scraper::Node::Doctype(doctype) => {
                            Some(Node::Doctype(doctype.name().to_string()))
                        }
                        scraper::Node::Comment(comment) => Some(Node::Comment(String::from(&**comment))),
                        scraper::Node::Text(text) => Some(Node::Text(String::from(&**text))),
                        scraper::Node::Element(el) => Some(Node::Element(Element {
                            name: el.name().to_string(),
                            attrs: el
                                .attrs
                                .iter()
                                .map(|(name, value)| {
                                    // Keep prefixes such as `xlink:href` on foreign elements.
                                    let key = match &name.prefix {
                                        Some(prefix) => format!("{}:{}", &**prefix, &*name.local),
                                        None => name.local.to_string(),
                                    };
                                    (key, value.to_string())
                                })
                                .collect(),
                        })),
                        _ => None,
                    };
                    let id = match (converted, tree.get_mut(parent)) {
                        (Some(value), Some(mut parent_node)) => parent_node.append(value).id(),
                        _ => parent,
                    };
                    stack.push(id);
                }
                Edge::Close(_) => {
                    stack.pop();
                }
            }
        }

        Self { tree }
    }

    pub fn root(&self) -> NodeRef<'_, Node> {
        self.tree.root()
    }

    /// First element with the given tag name, in document order.
    pub fn first_element(&self, name: &str) -> Option<NodeId> {
        self.tree
            .root()
            .descendants()
            .find(|node| matches!(node.value(), Node::Element(el) if el.name() == name))
            .map(|node| node.id())
    }

    /// Whether any element in the document satisfies `pred`.
    pub fn any_element(&self, pred: impl Fn(&Element) -> bool) -> bool {
        self.tree.root().descendants().any(|node| match node.value() {
            Node::Element(el) => pred(el),
            _ => false,
        })
    }

    /// Number of elements currently attached to the document.
    pub fn element_count(&self) -> usize {
        self.tree
            .root()
            .descendants()
            .filter(|node| matches!(node.value(), Node::Element(_)))
            .count()
    }

    /// Visit every element in document order and apply the recorded edits
    /// afterwards. Returns the number of edits applied.
    pub fn walk<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(ElementRef<'_>, &mut Edits),
    {
        let mut edits = Edits::default();
        for node in self.tree.root().descendants() {
            if let Node::Element(element) = node.value() {
                visit(ElementRef { node, element }, &mut edits);
            }
        }
        self.apply(edits)
    }

    /// Apply edits recorded outside of a walk.
    pub fn apply(&mut self, edits: Edits) -> usize {
        let count = edits.len();
        let mut last_inserted: HashMap<NodeId, NodeId> = HashMap::new();

        for (id, edit) in edits.ops {
            let target = match edit {
                Edit::InsertAfter(_) => last_inserted.get(&id).copied().unwrap_or(id),
                _ => id,
            };
            let Some(mut node) = self.tree.get_mut(target) else {
                continue;
            };
            match edit {
                Edit::Remove => node.detach(),
                Edit::Replace(markup) => {
                    if node.parent().is_some() {
                        insert_markup_after(&mut node, markup);
                        node.detach();
                    }
                }
                Edit::Rename(name) => {
                    if let Node::Element(el) = node.value() {
                        el.name = name;
                    }
                }
                Edit::SetAttr(name, value) => {
                    if let Node::Element(el) = node.value() {
                        el.set_attr(name, value);
                    }
                }
                Edit::RemoveAttr(name) => {
                    if let Node::Element(el) = node.value() {
                        el.remove_attr(&name);
                    }
                }
                Edit::SetText(text) => {
                    while let Some(mut child) = node.first_child() {
                        child.detach();
                    }
                    node.append(Node::Text(text));
                }
                Edit::Append(markup) => {
                    append_markup(&mut node, markup);
                }
                Edit::Prepend(markup) => {
                    prepend_markup(&mut node, markup);
                }
                Edit::InsertAfter(markup) => {
                    if node.parent().is_some() {
                        let inserted = insert_markup_after(&mut node, markup);
                        last_inserted.insert(id, inserted);
                    }
                }
            }
        }

        count
    }

    /// Serialize the document back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();

        for edge in self.tree.root().traverse() {
            match edge {
                Edge::Open(node) => match node.value() {
                    Node::Document => {}
                    Node::Doctype(name) => {
                        out.push_str("<!DOCTYPE ");
                        out.push_str(name);
                        out.push('>');
                    }
                    Node::Element(el) => {
                        out.push('<');
                        out.push_str(&el.name);
                        for (k, v) in &el.attrs {
                            out.push(' ');
                            out.push_str(k);
                            out.push_str("=\"");
                            escape_into(&mut out, v, true);
                            out.push('"');
                        }
                        out.push('>');

                        if LEADING_NEWLINE_ELEMENTS.contains(&el.name.as_str()) {
                            let leading_newline = node.first_child().is_some_and(|child| {
                                matches!(child.value(), Node::Text(text) if text.starts_with('\n'))
                            });
                            if leading_newline {
                                out.push('\n');
                            }
                        }
                    }
                    Node::Text(text) => {
                        if is_raw_text_parent(node) {
                            out.push_str(text);
                        } else {
                            escape_into(&mut out, text, false);
                        }
                    }
                    Node::Comment(comment) => {
                        out.push_str("<!--");
                        out.push_str(comment);
                        out.push_str("-->");
                    }
                },
                Edge::Close(node) => {
                    if let Node::Element(el) = node.value() {
                        if !VOID_ELEMENTS.contains(&el.name.as_str()) {
                            out.push_str("</");
                            out.push_str(&el.name);
                            out.push('>');
                        }
                    }
                }
            }
        }

        out
    }
}

fn is_raw_text_parent(node: NodeRef<'_, Node>) -> bool {
    node.parent().is_some_and(|parent| match parent.value() {
        Node::Element(el) => RAW_TEXT_ELEMENTS.contains(&el.name.as_str()),
        _ => false,
    })
}

fn escape_into(out: &mut String, value: &str, attribute: bool) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// Escape text for inclusion in generated HTML.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_into(&mut out, value, false);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_html(doc: &Document) -> String {
        let html = doc.to_html();
        let start = html.find("<body>").map(|i| i + "<body>".len()).unwrap();
        let end = html.rfind("</body>").unwrap();
        html[start..end].to_string()
    }

    #[test]
    fn parse_and_serialize_document() {
        let doc = Document::parse(
            "<!DOCTYPE html><html><head><title>T</title></head><body><p class=\"a\">Hi</p></body></html>",
        );
        assert_eq!(
            doc.to_html(),
            "<!DOCTYPE html><html><head><title>T</title></head><body><p class=\"a\">Hi</p></body></html>"
        );
    }

    #[test]
    fn fragments_are_wrapped_in_a_document() {
        let doc = Document::parse("<p>Hello</p>");
        assert_eq!(doc.to_html(), "<html><head></head><body><p>Hello</p></body></html>");
    }

    #[test]
    fn serialization_escapes_text_and_attributes() {
        let doc = Document::parse(r#"<p title="a &quot;b&quot; &amp; c">1 &lt; 2 &amp;&amp; 3 &gt; 2</p>"#);
        assert_eq!(
            body_html(&doc),
            r#"<p title="a &quot;b&quot; &amp; c">1 &lt; 2 &amp;&amp; 3 &gt; 2</p>"#
        );
    }

    #[test]
    fn raw_text_elements_are_not_escaped() {
        let doc = Document::parse("<script>if (a < b && c) {}</script><style>a > b {}</style>");
        let html = doc.to_html();
        assert!(html.contains("<script>if (a < b && c) {}</script>"));
        assert!(html.contains("<style>a > b {}</style>"));
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let doc = Document::parse(r#"<img src="a.png"><br><input type="text">"#);
        assert_eq!(
            body_html(&doc),
            r#"<img src="a.png"><br><input type="text">"#
        );
    }

    #[test]
    fn serialization_is_stable_under_reparse() {
        let doc = Document::parse("<pre>\n\nindented</pre><!-- note --><p>a&nbsp;b</p>");
        let once = doc.to_html();
        let twice = Document::parse(&once).to_html();
        assert_eq!(once, twice);
    }

    #[test]
    fn walk_collects_then_applies_edits() {
        let mut doc = Document::parse(
            r#"<div id="keep"><span>a</span></div><div id="drop"><span>b</span></div>"#,
        );
        let mut visited = Vec::new();
        let applied = doc.walk(|el, edits| {
            visited.push(el.name().to_string());
            if el.attr("id") == Some("drop") {
                edits.remove(el.id());
            }
        });
        assert_eq!(applied, 1);
        // Removal happens after the walk, so the dropped subtree was still visited.
        assert_eq!(
            visited,
            vec!["html", "head", "body", "div", "span", "div", "span"]
        );
        assert_eq!(body_html(&doc), r#"<div id="keep"><span>a</span></div>"#);
    }

    #[test]
    fn rename_and_attribute_edits() {
        let mut doc = Document::parse(r#"<header id="h" onclick="x()">Top</header>"#);
        doc.walk(|el, edits| {
            if el.name() == "header" {
                edits.rename(el.id(), "div");
                edits.set_attr(el.id(), "class", "proxy-header");
                edits.remove_attr(el.id(), "onclick");
                edits.set_attr(el.id(), "id", "h2");
            }
        });
        assert_eq!(
            body_html(&doc),
            r#"<div id="h2" class="proxy-header">Top</div>"#
        );
    }

    #[test]
    fn insert_after_keeps_recording_order() {
        let mut doc = Document::parse("<video></video><p>after</p>");
        doc.walk(|el, edits| {
            if el.name() == "video" {
                edits.insert_after(el.id(), Markup::element("span").child(Markup::text("1")));
                edits.insert_after(el.id(), Markup::element("span").child(Markup::text("2")));
            }
        });
        assert_eq!(
            body_html(&doc),
            "<video></video><span>1</span><span>2</span><p>after</p>"
        );
    }

    #[test]
    fn replace_set_text_append_prepend() {
        let mut doc = Document::parse("<iframe src=\"x\"></iframe><style>a{}</style><form></form>");
        doc.walk(|el, edits| match el.name() {
            "iframe" => edits.replace(el.id(), Markup::element("span").attr("class", "p")),
            "style" => edits.set_text(el.id(), "b{}"),
            "form" => {
                edits.append(el.id(), Markup::element("input").attr("name", "last"));
                edits.prepend(el.id(), Markup::element("input").attr("name", "first"));
            }
            _ => {}
        });
        assert_eq!(
            body_html(&doc),
            r#"<span class="p"></span><style>b{}</style><form><input name="first"><input name="last"></form>"#
        );
    }

    #[test]
    fn edits_on_removed_nodes_are_harmless() {
        let mut doc = Document::parse("<div><img src=a></div>");
        doc.walk(|el, edits| {
            if el.name() == "div" {
                edits.remove(el.id());
            }
            if el.name() == "img" {
                edits.set_attr(el.id(), "src", "b");
                edits.insert_after(el.id(), Markup::text("x"));
            }
        });
        assert_eq!(body_html(&doc), "");
    }

    #[test]
    fn element_ref_helpers() {
        let mut doc = Document::parse(
            r#"<div data-chrome=""><a href="/">Home</a></div><video><source src="a.mp4"></video><script>var t = 1;</script>"#,
        );
        let mut seen = Vec::new();
        doc.walk(|el, _| match el.name() {
            "a" => seen.push(format!("a:{}", el.is_within(|e| e.has_attr("data-chrome")))),
            "source" => seen.push(format!("source:{}", el.parent_name().unwrap_or_default())),
            "script" => seen.push(format!("script:{}", el.text())),
            "video" => seen.push(format!("video:{}", el.has_descendant(|e| e.name() == "source"))),
            _ => {}
        });
        assert_eq!(
            seen,
            vec!["a:true", "video:true", "source:video", "script:var t = 1;"]
        );
    }

    #[test]
    fn attributes_keep_source_order() {
        let html = r#"<div title="t" id="i" class="c" data-x="1"><input value="v" name="n" type="hidden"></div>"#;
        let once = body_html(&Document::parse(html));
        assert_eq!(once, html);
        assert_eq!(body_html(&Document::parse(&once)), html);
    }

    #[test]
    fn foreign_attributes_keep_their_prefix() {
        let doc = Document::parse(r##"<svg><use xlink:href="#icon"></use></svg>"##);
        let html = body_html(&doc);
        assert_eq!(html, r##"<svg><use xlink:href="#icon"></use></svg>"##);
        assert_eq!(body_html(&Document::parse(&html)), html);
    }

    #[test]
    fn element_attribute_api() {
        let mut el = Element::new("div");
        el.set_attr("class", "a  b");
        el.set_attr("id", "x");
        el.set_attr("class", "c d");
        assert_eq!(el.attrs().collect::<Vec<_>>(), vec![("class", "c d"), ("id", "x")]);
        assert_eq!(el.classes().collect::<Vec<_>>(), vec!["c", "d"]);
        assert_eq!(el.remove_attr("class").as_deref(), Some("c d"));
        assert!(!el.has_attr("class"));
    }

    #[test]
    fn document_queries() {
        let doc = Document::parse("<p>a</p><p>b</p>");
        assert!(doc.first_element("head").is_some());
        assert!(doc.first_element("table").is_none());
        assert!(doc.any_element(|el| el.name() == "p"));
        assert_eq!(doc.element_count(), 5);
        assert_eq!(escape_text("<b>&"), "&lt;b&gt;&amp;");
    }
}
