//! Previewable URL pass: rewrite chain plus co-located asset relocation
//!
//! One [`PreviewableUrls::transform`] call is one pass over one document.
//! Reference nodes are visited in document order; rewriting and scheduling
//! happen synchronously during the walk, then the scheduled copies run on the
//! rayon pool and are all joined before the pass returns.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use mdpub_mdast::{Node, Root};
use rayon::prelude::*;

use crate::colocate::{Colocate, ContentColocator, RelocationConfig, RelocationPaths};
use crate::context::DocumentContext;
use crate::fs::{CopyIfNewer, CopyOutcome, Materializer, TracingObserver};
use crate::rewrite::{MarkdownPrettyUrl, PublicPrefixStrip, RewriteChain};

/// Kind of node a reference URL was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Link,
    Image,
    /// `<a href>` flow element
    Anchor,
    /// `<object data>` flow element
    Object,
}

/// Borrowed URL slot of a reference node
#[derive(Debug)]
pub struct Reference<'a> {
    pub kind: ReferenceKind,
    url: &'a mut String,
}

impl<'a> Reference<'a> {
    /// Resolve the URL slot of `node`, or `None` for nodes that carry no
    /// rewritable reference
    pub fn from_node(node: &'a mut Node) -> Option<Self> {
        let (kind, url) = match node {
            Node::Link(link) => (ReferenceKind::Link, &mut link.url),
            Node::Image(image) => (ReferenceKind::Image, &mut image.url),
            Node::MdxJsxFlowElement(el) => {
                let (kind, attr) = match el.name.as_deref() {
                    Some("a") => (ReferenceKind::Anchor, "href"),
                    Some("object") => (ReferenceKind::Object, "data"),
                    _ => return None,
                };
                (kind, el.attribute_mut(attr)?.as_mut()?)
            }
            _ => return None,
        };
        Some(Self { kind, url })
    }

    /// Current URL; empty URLs count as absent
    pub fn inspect_url(&self) -> Option<&str> {
        if self.url.is_empty() {
            None
        } else {
            Some(self.url.as_str())
        }
    }

    pub fn rewrite_url(&mut self, url: String) {
        *self.url = url;
    }
}

/// A copy that did not leave a current file at its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationFailure {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub error: String,
}

/// Counts for one or more passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationSummary {
    /// Reference URLs changed in the document
    pub rewritten: usize,
    /// Copies scheduled (one per distinct URL per pass)
    pub scheduled: usize,
    pub copied: usize,
    pub not_required: usize,
    pub failed: Vec<RelocationFailure>,
}

impl RelocationSummary {
    /// Fold another summary into this one
    pub fn merge(&mut self, other: RelocationSummary) {
        self.rewritten += other.rewritten;
        self.scheduled += other.scheduled;
        self.copied += other.copied;
        self.not_required += other.not_required;
        self.failed.extend(other.failed);
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

struct Relocation {
    colocator: Box<dyn Colocate>,
    materializer: Box<dyn Materializer>,
}

/// Rewrites reference URLs and relocates co-located assets
pub struct PreviewableUrls {
    chain: RewriteChain,
    rewrite_enabled: bool,
    relocation: Option<Relocation>,
}

impl PreviewableUrls {
    /// A pass that only runs `chain`
    pub fn new(chain: RewriteChain) -> Self {
        Self {
            chain,
            rewrite_enabled: true,
            relocation: None,
        }
    }

    /// Enable relocation of co-located assets
    pub fn with_relocation(
        mut self,
        colocator: impl Colocate + 'static,
        materializer: impl Materializer + 'static,
    ) -> Self {
        self.relocation = Some(Relocation {
            colocator: Box::new(colocator),
            materializer: Box::new(materializer),
        });
        self
    }

    /// Toggle the rewrite chain without touching relocation
    pub fn rewrite_enabled(mut self, enabled: bool) -> Self {
        self.rewrite_enabled = enabled;
        self
    }

    /// The common setup: pretty markdown links, `../public` stripping, and
    /// relocation of co-located assets with copy-if-newer
    pub fn typical(config: &RelocationConfig) -> Self {
        let chain = RewriteChain::default()
            .with_rule(MarkdownPrettyUrl::default())
            .with_rule(PublicPrefixStrip::new(config.base_url.clone()));
        Self::new(chain).with_relocation(
            ContentColocator::new(config.clone()),
            CopyIfNewer::new(Arc::new(TracingObserver)),
        )
    }

    /// Run one pass over `root`
    ///
    /// Documents without a path are left untouched.
    pub fn transform(&self, root: &mut Root, ctx: &DocumentContext) -> RelocationSummary {
        let mut summary = RelocationSummary::default();
        let Some(document) = ctx.path() else {
            tracing::debug!("Skipping previewable URL pass for a document without a path");
            return summary;
        };

        let mut scheduled: HashSet<String> = HashSet::new();
        let mut jobs: Vec<RelocationPaths> = Vec::new();

        root.visit_mut(|node| {
            let Some(mut reference) = Reference::from_node(node) else {
                return;
            };
            let Some(url) = reference.inspect_url().map(str::to_string) else {
                return;
            };

            let mut current = url.clone();
            if self.rewrite_enabled {
                let result = self.chain.apply(&url, ctx);
                if let Some(rewritten) = result.url {
                    current = rewritten;
                }
                if result.terminated {
                    reference.rewrite_url(current);
                    summary.rewritten += 1;
                    return;
                }
            }

            if let Some(relocation) = &self.relocation
                && relocation.colocator.is_colocated(&current, document)
                && let Some(paths) = relocation.colocator.relocation_paths(&current, document)
            {
                tracing::debug!(
                    url = %current,
                    published = %paths.published_url,
                    "Relocating co-located asset"
                );
                current = paths.published_url.clone();
                if scheduled.insert(url.clone()) {
                    jobs.push(paths);
                }
            }

            if current != url {
                reference.rewrite_url(current);
                summary.rewritten += 1;
            }
        });

        summary.scheduled = jobs.len();
        if let Some(relocation) = &self.relocation {
            let outcomes: Vec<(RelocationPaths, CopyOutcome)> = jobs
                .into_par_iter()
                .map(|paths| {
                    let outcome = relocation.materializer.materialize(&paths);
                    (paths, outcome)
                })
                .collect();

            for (paths, outcome) in outcomes {
                match outcome {
                    CopyOutcome::Copied => summary.copied += 1,
                    CopyOutcome::NotRequired => summary.not_required += 1,
                    failed => summary.failed.push(RelocationFailure {
                        source: paths.colocated_source,
                        dest: paths.publish_dest,
                        error: failed.to_string(),
                    }),
                }
            }
        }

        summary
    }
}

impl std::fmt::Debug for PreviewableUrls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewableUrls")
            .field("chain", &self.chain)
            .field("rewrite_enabled", &self.rewrite_enabled)
            .field("relocation", &self.relocation.is_some())
            .finish()
    }
}
