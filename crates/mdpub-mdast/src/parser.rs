//! Markdown to mdast parser
//!
//! Builds an mdast tree from the `pulldown-cmark` event stream. Only the
//! constructs the publishing transforms care about get dedicated nodes;
//! everything else is flattened into its parent.
//!
//! [`parse_mdx`] additionally turns top-level blocks that consist of exactly
//! one JSX element (`<object data="x.svg" />`, `<a href="y.md">Y</a>`) into
//! `mdxJsxFlowElement` nodes.

use std::sync::LazyLock;

use crate::mdast::{
    Align, Code, Heading, Image, Link, List, ListItem, MdxJsxAttribute, MdxJsxFlowElement, Node,
    Root, Table,
};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, Options, Parser, Tag};
use regex::Regex;

static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<([A-Za-z][\w.:-]*)((?:\s+[^\s=/>"'{}]+(?:\s*=\s*(?:"[^"]*"|'[^']*'))?)*)\s*(/?)>"#)
        .unwrap()
});
static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"'{}]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'))?"#).unwrap()
});

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
}

/// Parse CommonMark (with tables, strikethrough, task lists and YAML front
/// matter) into an mdast tree
pub fn parse_markdown(source: &str) -> Root {
    let mut builder = TreeBuilder::default();
    for event in Parser::new_ext(source, options()) {
        builder.event(event);
    }
    builder.finish()
}

/// Parse an MDX document into an mdast tree
///
/// Like [`parse_markdown`], except that a top-level paragraph or HTML block
/// holding a single element with literal attribute values becomes an
/// [`MdxJsxFlowElement`]. Elements with expression attributes (`{...}`) stay
/// raw HTML.
pub fn parse_mdx(source: &str) -> Root {
    let mut builder = TreeBuilder::default();
    let mut depth = 0usize;
    let mut skipping = false;

    for (event, range) in Parser::new_ext(source, options()).into_offset_iter() {
        if skipping {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    skipping = depth > 0;
                }
                _ => {}
            }
            continue;
        }

        if depth == 0
            && matches!(event, Event::Start(Tag::Paragraph | Tag::HtmlBlock))
            && let Some(element) = flow_element(&source[range])
        {
            builder.push(element);
            skipping = true;
            depth = 1;
            continue;
        }

        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
        builder.event(event);
    }
    builder.finish()
}

/// A single JSX element spanning all of `block`, if it is one
fn flow_element(block: &str) -> Option<Node> {
    let block = block.trim();
    let open = OPEN_TAG_RE.captures(block)?;
    let name = open[1].to_string();
    let rest = &block[open[0].len()..];

    let children = if &open[3] == "/" {
        if !rest.trim().is_empty() {
            return None;
        }
        Vec::new()
    } else {
        let close = format!("</{}>", name);
        let inner = rest.strip_suffix(close.as_str())?;
        // `<a>x</a> and <a>y</a>` is two elements
        if inner.contains(close.as_str()) {
            return None;
        }
        parse_mdx(inner.trim()).children
    };

    let attributes = ATTRIBUTE_RE
        .captures_iter(&open[2])
        .map(|attr| MdxJsxAttribute {
            name: attr[1].to_string(),
            value: attr
                .get(2)
                .or_else(|| attr.get(3))
                .map(|v| v.as_str().replace("&quot;", "\"")),
        })
        .collect();

    Some(Node::MdxJsxFlowElement(MdxJsxFlowElement {
        name: Some(name),
        attributes,
        children,
    }))
}

/// An open container while walking the event stream
enum Frame {
    Paragraph,
    Heading(u8),
    Blockquote,
    List(Option<u64>),
    Item,
    Code { lang: Option<String>, meta: Option<String> },
    HtmlBlock,
    Table(Vec<Option<Align>>),
    TableHead,
    TableRow,
    TableCell,
    Emphasis,
    Strong,
    Delete,
    Link { url: String, title: Option<String> },
    Image { url: String, title: Option<String> },
    Metadata,
    /// Containers without an mdast counterpart; children move to the parent
    Transparent,
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<(Frame, Vec<Node>)>,
    root: Vec<Node>,
}

impl TreeBuilder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(_) => self.close(),
            Event::Text(text) => self.push(Node::text(text.to_string())),
            Event::Code(code) => self.push(Node::inline_code(code.to_string())),
            Event::Html(html) | Event::InlineHtml(html) => self.push(Node::html(html.to_string())),
            Event::SoftBreak => self.push(Node::text("\n")),
            Event::HardBreak => self.push(Node::line_break()),
            Event::Rule => self.push(Node::thematic_break()),
            Event::TaskListMarker(checked) => {
                self.push(Node::text(if checked { "[x] " } else { "[ ] " }))
            }
            Event::FootnoteReference(label) => self.push(Node::text(format!("[^{}]", label))),
            _ => {}
        }
    }

    fn open(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => Frame::Paragraph,
            Tag::Heading { level, .. } => Frame::Heading(level as u8),
            Tag::BlockQuote(_) => Frame::Blockquote,
            Tag::List(start) => Frame::List(start),
            Tag::Item => Frame::Item,
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                let info = info.trim();
                let (lang, meta) = match info.split_once(char::is_whitespace) {
                    Some((lang, meta)) => (lang, Some(meta.trim().to_string())),
                    None => (info, None),
                };
                Frame::Code {
                    lang: (!lang.is_empty()).then(|| lang.to_string()),
                    meta,
                }
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => Frame::Code {
                lang: None,
                meta: None,
            },
            Tag::HtmlBlock => Frame::HtmlBlock,
            Tag::Table(alignments) => Frame::Table(alignments.iter().map(convert_align).collect()),
            Tag::TableHead => Frame::TableHead,
            Tag::TableRow => Frame::TableRow,
            Tag::TableCell => Frame::TableCell,
            Tag::Emphasis => Frame::Emphasis,
            Tag::Strong => Frame::Strong,
            Tag::Strikethrough => Frame::Delete,
            Tag::Link {
                dest_url, title, ..
            } => Frame::Link {
                url: dest_url.to_string(),
                title: non_empty(&title),
            },
            Tag::Image {
                dest_url, title, ..
            } => Frame::Image {
                url: dest_url.to_string(),
                title: non_empty(&title),
            },
            Tag::MetadataBlock(_) => Frame::Metadata,
            _ => Frame::Transparent,
        };
        self.stack.push((frame, Vec::new()));
    }

    fn close(&mut self) {
        let Some((frame, children)) = self.stack.pop() else {
            return;
        };

        let node = match frame {
            Frame::Paragraph => Node::paragraph(children),
            Frame::Heading(depth) => Node::Heading(Heading { depth, children }),
            Frame::Blockquote => Node::blockquote(children),
            Frame::List(start) => {
                let spread = children
                    .iter()
                    .any(|c| matches!(c, Node::ListItem(li) if li.spread));
                Node::List(List {
                    ordered: start.is_some(),
                    start: start.map(|s| s as u32),
                    spread,
                    children,
                })
            }
            Frame::Item => {
                // Loose items carry explicit paragraphs; tight ones carry bare inlines
                let spread = children.iter().any(|c| matches!(c, Node::Paragraph(_)));
                Node::ListItem(ListItem {
                    spread,
                    children: wrap_inline_runs(children),
                })
            }
            Frame::Code { lang, meta } => {
                let mut value = plain_text(&children);
                if value.ends_with('\n') {
                    value.pop();
                }
                Node::Code(Code { lang, meta, value })
            }
            Frame::HtmlBlock => Node::html(plain_text(&children).trim_end_matches('\n')),
            Frame::Table(align) => Node::Table(Table { align, children }),
            Frame::TableHead | Frame::TableRow => Node::table_row(children),
            Frame::TableCell => Node::table_cell(children),
            Frame::Emphasis => Node::emphasis(children),
            Frame::Strong => Node::strong(children),
            Frame::Delete => Node::delete(children),
            Frame::Link { url, title } => Node::Link(Link {
                url,
                title,
                children,
            }),
            Frame::Image { url, title } => Node::Image(Image {
                url,
                title,
                alt: children.iter().map(Node::to_plain_text).collect(),
            }),
            Frame::Metadata => Node::yaml(plain_text(&children).trim_end_matches('\n')),
            Frame::Transparent => {
                for child in children {
                    self.push(child);
                }
                return;
            }
        };
        self.push(node);
    }

    /// Append to the innermost open container, merging adjacent text
    fn push(&mut self, node: Node) {
        let siblings = match self.stack.last_mut() {
            Some((_, children)) => children,
            None => &mut self.root,
        };

        if let Node::Text(next) = &node
            && let Some(Node::Text(prev)) = siblings.last_mut()
        {
            prev.value.push_str(&next.value);
            return;
        }
        siblings.push(node);
    }

    fn finish(mut self) -> Root {
        // Unbalanced input cannot come out of pulldown-cmark, but close anything left
        while !self.stack.is_empty() {
            self.close();
        }
        Root::new(self.root)
    }
}

fn convert_align(alignment: &Alignment) -> Option<Align> {
    match alignment {
        Alignment::None => None,
        Alignment::Left => Some(Align::Left),
        Alignment::Center => Some(Align::Center),
        Alignment::Right => Some(Align::Right),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Concatenated raw content of leaf children (code, HTML, front matter)
fn plain_text(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|node| match node {
            Node::Html(h) => h.value.clone(),
            other => other.to_plain_text(),
        })
        .collect()
}

fn is_phrasing(node: &Node) -> bool {
    matches!(
        node,
        Node::Text(_)
            | Node::Emphasis(_)
            | Node::Strong(_)
            | Node::Delete(_)
            | Node::InlineCode(_)
            | Node::Break
            | Node::Link(_)
            | Node::Image(_)
            | Node::Html(_)
    )
}

/// Wrap consecutive phrasing nodes of a list item in paragraphs
fn wrap_inline_runs(children: Vec<Node>) -> Vec<Node> {
    let mut result = Vec::with_capacity(children.len());
    let mut run = Vec::new();

    for child in children {
        if is_phrasing(&child) {
            run.push(child);
        } else {
            if !run.is_empty() {
                result.push(Node::paragraph(std::mem::take(&mut run)));
            }
            result.push(child);
        }
    }
    if !run.is_empty() {
        result.push(Node::paragraph(run));
    }

    result
}
