//! Per-document composition of the transforms

use std::fs;
use std::path::Path;

use mdpub_mdast::{Root, mdast_to_markdown, parse_markdown, parse_mdx};

use crate::charts::{ChartSummary, embed_charts};
use crate::context::DocumentContext;
use crate::links::{PrefixReplacer, rewrite_links};
use crate::relocate::{PreviewableUrls, RelocationSummary};
use crate::{PipelineError, Result};

/// What happened to one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentReport {
    pub charts: ChartSummary,
    /// Hyperlinks changed by the link replacer
    pub links: usize,
    pub relocation: RelocationSummary,
}

/// Runs chart embedding, link rewriting, then the previewable URL pass
///
/// Each stage is optional. The order matters: link replacement sees the
/// authored URLs, and the previewable pass sees its output.
#[derive(Debug, Default)]
pub struct Pipeline {
    charts: bool,
    links: Option<PrefixReplacer>,
    previewable: Option<PreviewableUrls>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_charts(mut self, enabled: bool) -> Self {
        self.charts = enabled;
        self
    }

    /// Rewrite hyperlinks with `replacer`; an empty replacer is skipped
    pub fn with_links(mut self, replacer: PrefixReplacer) -> Self {
        self.links = (!replacer.is_empty()).then_some(replacer);
        self
    }

    pub fn with_previewable_urls(mut self, pass: PreviewableUrls) -> Self {
        self.previewable = Some(pass);
        self
    }

    /// Transform a parsed document in place
    pub fn run(&self, root: &mut Root, ctx: &mut DocumentContext) -> DocumentReport {
        let mut report = DocumentReport::default();

        if self.charts {
            report.charts = embed_charts(root, ctx);
        }
        if let Some(replacer) = &self.links {
            report.links = rewrite_links(root, |url| replacer.replace(url));
        }
        if let Some(pass) = &self.previewable {
            report.relocation = pass.transform(root, ctx);
        }

        report
    }

    /// Transform markdown source; `.mdx` documents get MDX flow elements
    pub fn process_str(&self, source: &str, ctx: &mut DocumentContext) -> (String, DocumentReport) {
        let mut root = if ctx.is_mdx() {
            parse_mdx(source)
        } else {
            parse_markdown(source)
        };
        let report = self.run(&mut root, ctx);
        (mdast_to_markdown(&root), report)
    }

    /// Read and transform the markdown file at `path`
    pub fn process_file(&self, path: &Path) -> Result<(String, DocumentReport)> {
        let source = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut ctx = DocumentContext::new(path);
        Ok(self.process_str(&source, &mut ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colocate::RelocationConfig;
    use tempfile::tempdir;

    #[test]
    fn test_stages_run_in_order() {
        let dir = tempdir().unwrap();
        let guide = dir.path().join("src/content/guide");
        fs::create_dir_all(&guide).unwrap();
        fs::write(guide.join("photo.png"), b"png").unwrap();
        let doc = guide.join("index.md");
        fs::write(
            &doc,
            "# Guide\n\n[old](https://old.example.com/intro.md)\n\n![photo](photo.png)\n\n```chartjs\ntype: pie\ndata: {}\n```\n",
        )
        .unwrap();

        let config = RelocationConfig {
            publish_dir: dir.path().join("public/relocated-assets-from-content"),
            ..Default::default()
        };
        let pipeline = Pipeline::new()
            .with_charts(true)
            .with_links(PrefixReplacer::new().with("https://old.example.com/", "./"))
            .with_previewable_urls(PreviewableUrls::typical(&config));

        let (output, report) = pipeline.process_file(&doc).unwrap();

        assert_eq!(report.charts.rendered, 1);
        assert_eq!(report.links, 1);
        assert_eq!(report.relocation.rewritten, 2);
        assert_eq!(report.relocation.copied, 1);
        assert!(output.contains("[old](../intro)"));
        assert!(output.contains("![photo](/relocated-assets-from-content/guide/photo.png)"));
        assert!(output.contains(r#"<canvas id="chart-js-1" class="chart-js"></canvas>"#));
    }

    #[test]
    fn test_mdx_elements_are_relocated() {
        let dir = tempdir().unwrap();
        let guide = dir.path().join("src/content/guide");
        fs::create_dir_all(&guide).unwrap();
        fs::write(guide.join("diagram.svg"), b"<svg/>").unwrap();

        let config = RelocationConfig {
            publish_dir: dir.path().join("public/relocated-assets-from-content"),
            ..Default::default()
        };
        let pipeline = Pipeline::new().with_previewable_urls(PreviewableUrls::typical(&config));
        let source = "<object data=\"diagram.svg\" type=\"image/svg+xml\"></object>\n\n<a href=\"./setup.md\">Setup</a>\n";

        let mut ctx = DocumentContext::new(guide.join("index.mdx"));
        let (output, report) = pipeline.process_str(source, &mut ctx);

        assert_eq!(report.relocation.rewritten, 2);
        assert_eq!(report.relocation.scheduled, 1);
        assert_eq!(report.relocation.copied, 1);
        insta::assert_snapshot!(output, @r#"
        <object data="/relocated-assets-from-content/guide/diagram.svg" type="image/svg+xml" />

        <a href="../setup">
        Setup
        </a>
        "#);
        assert!(
            dir.path()
                .join("public/relocated-assets-from-content/guide/diagram.svg")
                .is_file()
        );

        // The same source in a `.md` document keeps its raw HTML
        let mut ctx = DocumentContext::new(guide.join("index.md"));
        let (output, report) = pipeline.process_str(source, &mut ctx);
        assert_eq!(report.relocation.rewritten, 0);
        assert_eq!(output, source);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.md");

        let err = Pipeline::new().process_file(&missing).unwrap_err();

        assert!(matches!(err, PipelineError::Io { ref path, .. } if path == &missing));
    }

    #[test]
    fn test_empty_pipeline_round_trips() {
        let source = "# Title\n\nSome *text* with [a link](page.md).\n";
        let mut ctx = DocumentContext::new("/src/content/index.md");

        let (output, report) = Pipeline::new().process_str(source, &mut ctx);

        assert_eq!(output, source);
        assert_eq!(report, DocumentReport::default());
    }
}
