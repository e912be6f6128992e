//! mdpub-core: Publishing transforms over markdown documents
//!
//! This crate provides:
//! - An ordered URL rewrite chain with first-terminate-wins semantics
//! - Co-located asset detection and relocation into the public directory
//! - Copy-if-newer materialization of relocated assets
//! - Chart.js / Apache ECharts embedding from fenced YAML blocks
//! - Hyperlink prefix rewriting in markdown and raw HTML
//!
//! Every transform works on a [`mdpub_mdast::Root`] together with a
//! [`DocumentContext`] created for that one document.
//!
//! ## Example
//!
//! ```rust
//! use mdpub_core::{DocumentContext, Pipeline, PreviewableUrls, RelocationConfig};
//!
//! let pipeline = Pipeline::new()
//!     .with_previewable_urls(PreviewableUrls::typical(&RelocationConfig::default()));
//! let mut ctx = DocumentContext::new("/src/content/guide/index.md");
//! let (markdown, report) = pipeline.process_str("[Next](./setup.md)\n", &mut ctx);
//!
//! assert_eq!(markdown, "[Next](../setup)\n");
//! assert_eq!(report.relocation.rewritten, 1);
//! ```

pub mod charts;
pub mod colocate;
pub mod context;
pub mod fs;
pub mod links;
pub mod pipeline;
pub mod relocate;
pub mod rewrite;

use std::path::PathBuf;

pub use charts::{ChartKind, ChartSummary, embed_charts, render_chart};
pub use colocate::{Colocate, ContentColocator, RelocationConfig, RelocationPaths};
pub use context::{ChartCounters, DocumentContext};
pub use fs::{
    CopyIfNewer, CopyObserver, CopyOutcome, Materializer, MemoizingObserver, NoopObserver,
    TracingObserver, copy_if_newer,
};
pub use links::{PrefixReplacer, rewrite_links};
pub use pipeline::{DocumentReport, Pipeline};
pub use relocate::{PreviewableUrls, Reference, RelocationFailure, RelocationSummary};
pub use rewrite::{
    ChainMode, ChainResult, FnRule, MarkdownPrettyUrl, PublicPrefixStrip, Rewrite, RewriteChain,
    RewriteRule,
};

/// Errors that can occur while transforming documents
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    ChartYaml(String),

    #[error("{0}")]
    ChartSchema(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
