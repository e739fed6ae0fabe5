//! Reference rewriting and structural transforms.
//!
//! Pipeline stages defined here:
//!
//! - [`ScriptStripper`] -- removes scripts and inline event handlers when the
//!   request disables scripting.
//! - [`ReferenceRewriter`] -- routes every resolvable reference through the
//!   proxy according to the [`routes`] table.
//! - [`StructuralTransformer`] -- replaces landmarks and injects the operator
//!   chrome.

mod css;
mod references;
pub mod routes;
mod structure;

pub use css::rewrite_css;
pub use references::{rewrite_references, rewrite_srcset_value};
pub use routes::RoutingTarget;
pub use structure::{inject_chrome, replace_landmarks, strip_scripts};

use url::Url;

use crate::dom::Document;
use crate::pipeline::{RewriteContext, Stage};
use crate::resolver;

/// Resolve a raw reference to an absolute `http(s)` URL, or `None` when it
/// must be left as is (empty, passthrough, already proxied, unresolvable or
/// another scheme).
pub(crate) fn resolve_reference(raw: &str, base: &Url) -> Option<String> {
    let reference = raw.trim();
    if reference.is_empty() || resolver::is_passthrough(reference) || routes::is_proxied(reference)
    {
        return None;
    }
    match resolver::try_resolve(reference, base) {
        Ok(absolute) if resolver::is_fetchable(&absolute) => Some(absolute),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to rewrite reference: {e}");
            None
        }
    }
}

/// Proxy route for a raw reference, if it should be rewritten.
pub(crate) fn reroute(raw: &str, target: RoutingTarget, base: &Url) -> Option<String> {
    resolve_reference(raw, base).map(|absolute| target.route(&absolute))
}

/// Removes every `<script>` and `on*` attribute if the request disables scripts.
pub struct ScriptStripper;

impl Stage for ScriptStripper {
    fn name(&self) -> &'static str {
        "script-strip"
    }

    fn apply(&self, doc: &mut Document, ctx: &RewriteContext<'_>) -> usize {
        if !ctx.options.disable_scripts {
            return 0;
        }
        strip_scripts(doc)
    }
}

pub struct ReferenceRewriter;

impl Stage for ReferenceRewriter {
    fn name(&self) -> &'static str {
        "reference-rewrite"
    }

    fn apply(&self, doc: &mut Document, ctx: &RewriteContext<'_>) -> usize {
        rewrite_references(doc, ctx.base)
    }
}

/// Landmark replacement, plus the operator chrome when `inject_chrome` is set.
pub struct StructuralTransformer {
    pub inject_chrome: bool,
}

impl Stage for StructuralTransformer {
    fn name(&self) -> &'static str {
        "structural-transform"
    }

    fn apply(&self, doc: &mut Document, ctx: &RewriteContext<'_>) -> usize {
        let mut changed = replace_landmarks(doc);
        if self.inject_chrome {
            changed += inject_chrome(doc, ctx.base, ctx.options.is_search_result);
        }
        changed
    }
}
