//! The rewrite pipeline: parse, run the stages in order, serialize.
//!
//! Stages implement the [`Stage`] trait and are sequenced by a [`Rewriter`].
//! The built-in order is fixed:
//!
//! 1. [`PolicyMetaStrip`](crate::filter::PolicyMetaStrip)
//! 2. [`ScriptStripper`](crate::rewrite::ScriptStripper)
//! 3. [`TrackingFilter`](crate::filter::TrackingFilter)
//! 4. [`ReferenceRewriter`](crate::rewrite::ReferenceRewriter)
//! 5. [`StructuralTransformer`](crate::rewrite::StructuralTransformer)
//!
//! Stages added through [`RewriterBuilder::add_stage`] run after these.

use std::sync::LazyLock;

use url::Url;

use crate::config::RewriterBuilder;
use crate::dom::{Document, escape_text};
use crate::error::{ProxyError, Result};
use crate::filter::FilterPatterns;
use crate::options::RewriteOptions;

/// Read-only inputs shared by every stage of one rewrite.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    pub base: &'a Url,
    pub options: RewriteOptions,
    pub patterns: &'a FilterPatterns,
}

/// One step of the rewrite pipeline.
///
/// Implementations must be `Send + Sync`: a single [`Rewriter`] serves
/// concurrent requests, each with its own [`Document`].
pub trait Stage: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    /// Mutate the document in place, returning the number of edits made.
    fn apply(&self, doc: &mut Document, ctx: &RewriteContext<'_>) -> usize;
}

/// Result of [`Rewriter::rewrite`]: the rewritten page or an inert error
/// fragment to render in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Rewritten(String),
    ErrorFragment(String),
}

impl RewriteOutcome {
    pub fn into_html(self) -> String {
        match self {
            RewriteOutcome::Rewritten(html) | RewriteOutcome::ErrorFragment(html) => html,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RewriteOutcome::ErrorFragment(_))
    }
}

/// Inert markup describing a content-processing failure.
pub fn error_fragment(message: &str) -> String {
    format!(
        "<div class=\"proxy-error\">Error processing content: {}</div>",
        escape_text(message)
    )
}

/// An immutable, shareable rewrite pipeline. Build one with [`RewriterBuilder`].
pub struct Rewriter {
    stages: Vec<Box<dyn Stage>>,
    patterns: FilterPatterns,
    max_document_bytes: usize,
}

impl Rewriter {
    pub(crate) fn new(
        stages: Vec<Box<dyn Stage>>,
        patterns: FilterPatterns,
        max_document_bytes: usize,
    ) -> Self {
        Self {
            stages,
            patterns,
            max_document_bytes,
        }
    }

    pub fn builder() -> RewriterBuilder {
        RewriterBuilder::new()
    }

    /// Names of the stages in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn patterns(&self) -> &FilterPatterns {
        &self.patterns
    }

    /// Rewrite `html` fetched from `base`.
    ///
    /// Fails with [`ProxyError::Parse`] when the document exceeds the size
    /// limit or `base` is not an absolute URL. Individual references that
    /// cannot be rewritten are logged and left unchanged.
    pub fn try_rewrite(&self, html: &str, base: &str, options: RewriteOptions) -> Result<String> {
        if html.len() > self.max_document_bytes {
            return Err(ProxyError::Parse(format!(
                "document of {} bytes exceeds the {} byte limit",
                html.len(),
                self.max_document_bytes
            )));
        }
        let base = Url::parse(base.trim())
            .map_err(|e| ProxyError::Parse(format!("invalid base URL {base}: {e}")))?;

        let mut doc = Document::parse(html);
        let ctx = RewriteContext {
            base: &base,
            options,
            patterns: &self.patterns,
        };
        for stage in &self.stages {
            let changed = stage.apply(&mut doc, &ctx);
            tracing::debug!("Stage {} made {changed} edits", stage.name());
        }
        Ok(doc.to_html())
    }

    /// Rewrite `html`, degrading any failure to an error fragment.
    pub fn rewrite(&self, html: &str, base: &str, options: RewriteOptions) -> RewriteOutcome {
        match self.try_rewrite(html, base, options) {
            Ok(html) => RewriteOutcome::Rewritten(html),
            Err(e) => {
                tracing::warn!("Error processing content from {base}: {e}");
                RewriteOutcome::ErrorFragment(error_fragment(&e.to_string()))
            }
        }
    }
}

impl Default for Rewriter {
    fn default() -> Self {
        RewriterBuilder::new().build()
    }
}

static DEFAULT_REWRITER: LazyLock<Rewriter> = LazyLock::new(Rewriter::default);

/// Rewrite `html` with the default pipeline. Never fails: errors become an
/// error fragment.
pub fn rewrite(html: &str, base: &str, options: RewriteOptions) -> String {
    DEFAULT_REWRITER.rewrite(html, base, options).into_html()
}
