//! Builder for configuring a [`Rewriter`].

use crate::filter::{FilterPatterns, PolicyMetaStrip, TrackingFilter};
use crate::pipeline::{Rewriter, Stage};
use crate::rewrite::{ReferenceRewriter, ScriptStripper, StructuralTransformer};

/// Default upper bound on the size of a document accepted for rewriting.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

/// Builder for a [`Rewriter`].
///
/// Provides a fluent API for the filter pattern tables, the document size
/// limit, the operator chrome toggle and extra stages.
///
/// # Example
///
/// ```
/// use html_proxy::{FilterPatterns, RewriteOptions, RewriterBuilder};
///
/// let rewriter = RewriterBuilder::new()
///     .patterns(FilterPatterns::default().with_embed_hosts(vec!["video.example"]))
///     .inject_chrome(false)
///     .build();
/// let html = rewriter
///     .try_rewrite(r#"<a href="/next">next</a>"#, "https://example.com/", RewriteOptions::default())
///     .unwrap();
/// assert!(html.contains("/browse?url=https%3A%2F%2Fexample.com%2Fnext"));
/// ```
pub struct RewriterBuilder {
    patterns: FilterPatterns,
    max_document_bytes: usize,
    inject_chrome: bool,
    extra_stages: Vec<Box<dyn Stage>>,
}

impl RewriterBuilder {
    /// Create a builder with the default pattern tables, a 16 MiB document
    /// limit and chrome injection enabled.
    pub fn new() -> Self {
        Self {
            patterns: FilterPatterns::default(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            inject_chrome: true,
            extra_stages: Vec::new(),
        }
    }

    /// Replace the tracking and content filter tables.
    pub fn patterns(mut self, patterns: FilterPatterns) -> Self {
        self.patterns = patterns;
        self
    }

    /// Documents larger than this are answered with an error fragment.
    pub fn max_document_bytes(mut self, bytes: usize) -> Self {
        self.max_document_bytes = bytes;
        self
    }

    /// Whether to insert the address bar and navigation links into rewritten pages.
    pub fn inject_chrome(mut self, inject: bool) -> Self {
        self.inject_chrome = inject;
        self
    }

    /// Append a [`Stage`] that runs after the built-in stages, in the order added.
    pub fn add_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.extra_stages.push(Box::new(stage));
        self
    }

    /// Consume the builder and assemble the pipeline.
    pub fn build(self) -> Rewriter {
        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(PolicyMetaStrip),
            Box::new(ScriptStripper),
            Box::new(TrackingFilter),
            Box::new(ReferenceRewriter),
            Box::new(StructuralTransformer {
                inject_chrome: self.inject_chrome,
            }),
        ];
        stages.extend(self.extra_stages);
        Rewriter::new(stages, self.patterns, self.max_document_bytes)
    }
}

impl Default for RewriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
