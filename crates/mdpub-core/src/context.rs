//! Per-document state threaded through one transformation pass

use std::path::{Path, PathBuf};

/// State for a single document pass
///
/// Created by the caller for one document, handed by reference to every
/// transform and rewrite rule, and dropped with the pass. Nothing in here is
/// shared between documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentContext {
    path: Option<PathBuf>,
    /// Chart element counters, used for generated element ids
    pub charts: ChartCounters,
}

/// Running counts of emitted chart widgets in one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChartCounters {
    pub chart_js: usize,
    pub echarts: usize,
}

impl DocumentContext {
    /// Context for a document read from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            charts: ChartCounters::default(),
        }
    }

    /// Context for an in-memory document with no file behind it
    pub fn virtual_document() -> Self {
        Self::default()
    }

    /// Path of the document, if it has one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the document is MDX, judged by its `.mdx` extension
    pub fn is_mdx(&self) -> bool {
        self.path
            .as_deref()
            .and_then(Path::extension)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mdx"))
    }
}
