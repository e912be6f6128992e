//! mdast to Markdown writer
//!
//! Converts an mdast tree back into CommonMark text. Blocks are rendered to
//! strings first so container blocks (blockquotes, list items, JSX elements)
//! can prefix or indent every line of their content.

use crate::mdast::{Align, MdxJsxFlowElement, Node, Root};

/// Convert mdast to Markdown
pub fn mdast_to_markdown(root: &Root) -> String {
    let writer = Writer::new();
    writer.write_root(root)
}

/// Markdown writer
struct Writer;

impl Writer {
    fn new() -> Self {
        Self
    }

    fn write_root(&self, root: &Root) -> String {
        let mut output = self.write_blocks(&root.children);
        if !output.is_empty() {
            output.push('\n');
        }
        output
    }

    /// Render sibling blocks separated by a blank line
    fn write_blocks(&self, nodes: &[Node]) -> String {
        let mut output = String::new();
        let mut inline_run: Vec<&Node> = Vec::new();

        let flush = |output: &mut String, run: &mut Vec<&Node>| {
            if run.is_empty() {
                return;
            }
            let text: String = run.iter().map(|n| self.write_inline(n)).collect();
            push_block(output, &text);
            run.clear();
        };

        for node in nodes {
            if is_inline(node) {
                inline_run.push(node);
                continue;
            }
            flush(&mut output, &mut inline_run);
            let block = self.write_block(node);
            push_block(&mut output, &block);
        }
        flush(&mut output, &mut inline_run);

        output
    }

    fn write_block(&self, node: &Node) -> String {
        match node {
            Node::Heading(h) => {
                format!("{} {}", "#".repeat(h.depth as usize), self.write_inlines(&h.children))
            }
            Node::Paragraph(p) => self.write_inlines(&p.children),
            Node::ThematicBreak => "---".to_string(),
            Node::Blockquote(b) => prefix_lines(&self.write_blocks(&b.children), ">"),
            Node::List(l) => self.write_list(l),
            Node::ListItem(li) => self.write_list_item(&li.children, "- ", false),
            Node::Code(c) => self.write_code(c),
            Node::Table(t) => self.write_table(t),
            Node::TableRow(_) | Node::TableCell(_) => String::new(), // Handled by write_table
            Node::Yaml(y) => format!("---\n{}\n---", y.value.trim_end_matches('\n')),
            Node::Html(h) => h.value.trim_end_matches('\n').to_string(),
            Node::MdxJsxFlowElement(e) => self.write_mdx_flow_element(e),
            inline => self.write_inline(inline),
        }
    }

    fn write_list(&self, l: &crate::mdast::List) -> String {
        let mut num = l.start.unwrap_or(1);
        let separator = if l.spread { "\n\n" } else { "\n" };

        let items: Vec<String> = l
            .children
            .iter()
            .filter_map(|child| match child {
                Node::ListItem(li) => {
                    let marker = if l.ordered {
                        let marker = format!("{}. ", num);
                        num += 1;
                        marker
                    } else {
                        "- ".to_string()
                    };
                    Some(self.write_list_item(&li.children, &marker, l.spread || li.spread))
                }
                _ => None,
            })
            .collect();

        items.join(separator)
    }

    fn write_list_item(&self, children: &[Node], marker: &str, spread: bool) -> String {
        // Tight items keep their paragraphs on consecutive lines
        let content = if spread {
            self.write_blocks(children)
        } else {
            children
                .iter()
                .map(|child| self.write_block(child))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let indent = " ".repeat(marker.len());
        let mut output = String::new();
        for (i, line) in content.lines().enumerate() {
            if i == 0 {
                output.push_str(marker);
            } else {
                output.push('\n');
                if !line.is_empty() {
                    output.push_str(&indent);
                }
            }
            output.push_str(line);
        }
        if output.is_empty() {
            output.push_str(marker.trim_end());
        }
        output
    }

    fn write_code(&self, c: &crate::mdast::Code) -> String {
        // Determine fence length: must be longer than any backtick sequence in content
        let fence = "`".repeat(calculate_fence_length(&c.value));

        let mut output = fence.clone();
        if let Some(lang) = &c.lang {
            output.push_str(lang);
            if let Some(meta) = &c.meta {
                output.push(' ');
                output.push_str(meta);
            }
        }
        output.push('\n');
        output.push_str(&c.value);
        if !c.value.is_empty() && !c.value.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&fence);
        output
    }

    fn write_table(&self, t: &crate::mdast::Table) -> String {
        let rows: Vec<&crate::mdast::TableRow> = t
            .children
            .iter()
            .filter_map(|n| {
                if let Node::TableRow(r) = n {
                    Some(r)
                } else {
                    None
                }
            })
            .collect();

        if rows.is_empty() {
            return String::new();
        }

        let num_cols = rows
            .iter()
            .map(|r| r.children.len())
            .max()
            .unwrap_or(0)
            .max(t.align.len());

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(self.write_table_row(rows[0], num_cols));

        let mut separator = String::from("|");
        for i in 0..num_cols {
            match t.align.get(i).copied().flatten() {
                Some(Align::Left) => separator.push_str(":---|"),
                Some(Align::Center) => separator.push_str(":--:|"),
                Some(Align::Right) => separator.push_str("---:|"),
                None => separator.push_str("----|"),
            }
        }
        lines.push(separator);

        for row in rows.iter().skip(1) {
            lines.push(self.write_table_row(row, num_cols));
        }

        lines.join("\n")
    }

    fn write_table_row(&self, row: &crate::mdast::TableRow, num_cols: usize) -> String {
        let mut output = String::from("|");
        for cell in row.children.iter().take(num_cols) {
            if let Node::TableCell(c) = cell {
                output.push(' ');
                output.push_str(&self.write_inlines(&c.children).replace('|', "\\|"));
                output.push_str(" |");
            }
        }
        // Fill missing cells
        for _ in row.children.len()..num_cols {
            output.push_str(" |");
        }
        output
    }

    fn write_mdx_flow_element(&self, e: &MdxJsxFlowElement) -> String {
        let name = e.name.as_deref().unwrap_or("");
        let mut open = format!("<{}", name);
        for attr in &e.attributes {
            open.push(' ');
            open.push_str(&attr.name);
            if let Some(value) = &attr.value {
                open.push_str(&format!("=\"{}\"", value.replace('"', "&quot;")));
            }
        }

        if e.children.is_empty() {
            if name.is_empty() {
                return "<></>".to_string();
            }
            open.push_str(" />");
            return open;
        }

        open.push('>');
        let body = self.write_blocks(&e.children);
        format!("{}\n{}\n</{}>", open, body, name)
    }

    fn write_inlines(&self, nodes: &[Node]) -> String {
        nodes.iter().map(|n| self.write_inline(n)).collect()
    }

    fn write_inline(&self, node: &Node) -> String {
        match node {
            Node::Text(t) => escape_text(&t.value),
            Node::Emphasis(e) => format!("*{}*", self.write_inlines(&e.children)),
            Node::Strong(s) => format!("**{}**", self.write_inlines(&s.children)),
            Node::Delete(d) => format!("~~{}~~", self.write_inlines(&d.children)),
            Node::InlineCode(c) => write_inline_code(&c.value),
            Node::Break => "\\\n".to_string(),
            Node::Link(l) => format!(
                "[{}]({}{})",
                self.write_inlines(&l.children),
                destination(&l.url),
                title_suffix(l.title.as_deref())
            ),
            Node::Image(img) => format!(
                "![{}]({}{})",
                escape_text(&img.alt),
                destination(&img.url),
                title_suffix(img.title.as_deref())
            ),
            Node::Html(h) => h.value.clone(),
            block => self.write_block(block),
        }
    }
}

fn is_inline(node: &Node) -> bool {
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
    )
}

fn push_block(output: &mut String, block: &str) {
    if block.is_empty() {
        return;
    }
    if !output.is_empty() {
        output.push_str("\n\n");
    }
    output.push_str(block);
}

fn prefix_lines(content: &str, prefix: &str) -> String {
    content
        .lines()
        .map(|line| {
            if line.is_empty() {
                prefix.to_string()
            } else {
                format!("{} {}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Backslash-escape characters that would otherwise start markup
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '<') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn destination(url: &str) -> String {
    if url.is_empty() || url.contains(' ') || url.contains(['(', ')']) {
        format!("<{}>", url)
    } else {
        url.to_string()
    }
}

fn title_suffix(title: Option<&str>) -> String {
    match title {
        Some(t) => format!(" \"{}\"", t.replace('"', "\\\"")),
        None => String::new(),
    }
}

fn write_inline_code(value: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(value) + 1);
    if value.starts_with('`') || value.ends_with('`') {
        format!("{} {} {}", fence, value, fence)
    } else {
        format!("{}{}{}", fence, value, fence)
    }
}

/// Calculate the minimum fence length needed for a code block.
///
/// The fence must be longer than any sequence of consecutive backticks in the content.
/// Returns at least 3 (the minimum for a valid fenced code block).
fn calculate_fence_length(content: &str) -> usize {
    3.max(longest_backtick_run(content) + 1)
}

fn longest_backtick_run(content: &str) -> usize {
    let mut max_backticks = 0;
    let mut current_run = 0;

    for c in content.chars() {
        if c == '`' {
            current_run += 1;
            max_backticks = max_backticks.max(current_run);
        } else {
            current_run = 0;
        }
    }

    max_backticks
}
