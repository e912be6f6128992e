//! mdast (Markdown Abstract Syntax Tree) types
//!
//! A subset of mdast nodes needed to round-trip authored markdown through the
//! publishing transforms.
//! Reference: https://github.com/syntax-tree/mdast

use serde::{Deserialize, Serialize};

/// Root node of an mdast document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Root {
    pub children: Vec<Node>,
}

/// An mdast node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    // Block nodes
    Heading(Heading),
    Paragraph(Paragraph),
    ThematicBreak,
    Blockquote(Blockquote),
    List(List),
    ListItem(ListItem),
    Code(Code),
    Table(Table),
    TableRow(TableRow),
    TableCell(TableCell),

    // Front matter
    Yaml(Yaml),

    // Inline nodes
    Text(Text),
    Emphasis(Emphasis),
    Strong(Strong),
    Delete(Delete),
    InlineCode(InlineCode),
    Break,
    Link(Link),
    Image(Image),

    // Raw HTML, block or inline
    Html(Html),

    // MDX JSX element in flow position (`<a href="..."/>`, `<object data="..."/>`)
    MdxJsxFlowElement(MdxJsxFlowElement),
}

/// Heading node (# to ######)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub depth: u8,
    pub children: Vec<Node>,
}

/// Paragraph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub children: Vec<Node>,
}

/// Blockquote node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blockquote {
    pub children: Vec<Node>,
}

/// List node (ordered or unordered)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub ordered: bool,
    pub start: Option<u32>,
    pub spread: bool,
    pub children: Vec<Node>,
}

/// List item node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub spread: bool,
    pub children: Vec<Node>,
}

/// Code block node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub lang: Option<String>,
    pub meta: Option<String>,
    pub value: String,
}

/// Table node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub align: Vec<Option<Align>>,
    pub children: Vec<Node>,
}

/// Table row node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub children: Vec<Node>,
}

/// Table cell node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub children: Vec<Node>,
}

/// Table alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// YAML front matter, without the `---` fences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Yaml {
    pub value: String,
}

/// Text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
}

/// Emphasis node (*text* or _text_)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emphasis {
    pub children: Vec<Node>,
}

/// Strong node (**text** or __text__)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strong {
    pub children: Vec<Node>,
}

/// Strikethrough node (~~text~~)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub children: Vec<Node>,
}

/// Inline code node (`code`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineCode {
    pub value: String,
}

/// Link node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub title: Option<String>,
    pub children: Vec<Node>,
}

/// Image node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub title: Option<String>,
    pub alt: String,
}

/// Raw HTML node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Html {
    pub value: String,
}

/// MDX JSX element in flow (block) position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdxJsxFlowElement {
    /// Element name; `None` for fragments (`<>...</>`)
    pub name: Option<String>,
    pub attributes: Vec<MdxJsxAttribute>,
    pub children: Vec<Node>,
}

/// A `name="value"` attribute of an MDX JSX element
///
/// A `None` value is a boolean attribute (`<video controls />`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdxJsxAttribute {
    pub name: String,
    pub value: Option<String>,
}

impl MdxJsxFlowElement {
    /// Mutable access to the value of the attribute called `name`
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        self.attributes
            .iter_mut()
            .find(|a| a.name == name)
            .map(|a| &mut a.value)
    }

    /// The value of the attribute called `name`, if present and non-boolean
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }
}

// Convenience constructors
impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(Text { value: s.into() })
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Paragraph(Paragraph { children })
    }

    pub fn heading(depth: u8, children: Vec<Node>) -> Self {
        Node::Heading(Heading { depth, children })
    }

    pub fn code(lang: Option<String>, value: impl Into<String>) -> Self {
        Node::Code(Code {
            lang,
            meta: None,
            value: value.into(),
        })
    }

    pub fn inline_code(value: impl Into<String>) -> Self {
        Node::InlineCode(InlineCode {
            value: value.into(),
        })
    }

    pub fn emphasis(children: Vec<Node>) -> Self {
        Node::Emphasis(Emphasis { children })
    }

    pub fn strong(children: Vec<Node>) -> Self {
        Node::Strong(Strong { children })
    }

    pub fn delete(children: Vec<Node>) -> Self {
        Node::Delete(Delete { children })
    }

    pub fn link(url: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Link(Link {
            url: url.into(),
            title: None,
            children,
        })
    }

    pub fn image(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Node::Image(Image {
            url: url.into(),
            title: None,
            alt: alt.into(),
        })
    }

    pub fn list(ordered: bool, children: Vec<Node>) -> Self {
        Node::List(List {
            ordered,
            start: if ordered { Some(1) } else { None },
            spread: false,
            children,
        })
    }

    pub fn list_item(children: Vec<Node>) -> Self {
        Node::ListItem(ListItem {
            spread: false,
            children,
        })
    }

    pub fn table(align: Vec<Option<Align>>, children: Vec<Node>) -> Self {
        Node::Table(Table { align, children })
    }

    pub fn table_row(children: Vec<Node>) -> Self {
        Node::TableRow(TableRow { children })
    }

    pub fn table_cell(children: Vec<Node>) -> Self {
        Node::TableCell(TableCell { children })
    }

    pub fn html(value: impl Into<String>) -> Self {
        Node::Html(Html {
            value: value.into(),
        })
    }

    pub fn yaml(value: impl Into<String>) -> Self {
        Node::Yaml(Yaml {
            value: value.into(),
        })
    }

    pub fn blockquote(children: Vec<Node>) -> Self {
        Node::Blockquote(Blockquote { children })
    }

    pub fn mdx_flow_element(
        name: impl Into<String>,
        attributes: Vec<(&str, &str)>,
        children: Vec<Node>,
    ) -> Self {
        Node::MdxJsxFlowElement(MdxJsxFlowElement {
            name: Some(name.into()),
            attributes: attributes
                .into_iter()
                .map(|(name, value)| MdxJsxAttribute {
                    name: name.to_string(),
                    value: Some(value.to_string()),
                })
                .collect(),
            children,
        })
    }

    pub fn thematic_break() -> Self {
        Node::ThematicBreak
    }

    pub fn line_break() -> Self {
        Node::Break
    }

    /// Child nodes, for parents; leaves return `None`
    pub fn children(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Heading(n) => Some(&n.children),
            Node::Paragraph(n) => Some(&n.children),
            Node::Blockquote(n) => Some(&n.children),
            Node::List(n) => Some(&n.children),
            Node::ListItem(n) => Some(&n.children),
            Node::Table(n) => Some(&n.children),
            Node::TableRow(n) => Some(&n.children),
            Node::TableCell(n) => Some(&n.children),
            Node::Emphasis(n) => Some(&n.children),
            Node::Strong(n) => Some(&n.children),
            Node::Delete(n) => Some(&n.children),
            Node::Link(n) => Some(&n.children),
            Node::MdxJsxFlowElement(n) => Some(&n.children),
            Node::ThematicBreak
            | Node::Code(_)
            | Node::Yaml(_)
            | Node::Text(_)
            | Node::InlineCode(_)
            | Node::Break
            | Node::Image(_)
            | Node::Html(_) => None,
        }
    }

    /// Mutable child nodes, for parents; leaves return `None`
    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Heading(n) => Some(&mut n.children),
            Node::Paragraph(n) => Some(&mut n.children),
            Node::Blockquote(n) => Some(&mut n.children),
            Node::List(n) => Some(&mut n.children),
            Node::ListItem(n) => Some(&mut n.children),
            Node::Table(n) => Some(&mut n.children),
            Node::TableRow(n) => Some(&mut n.children),
            Node::TableCell(n) => Some(&mut n.children),
            Node::Emphasis(n) => Some(&mut n.children),
            Node::Strong(n) => Some(&mut n.children),
            Node::Delete(n) => Some(&mut n.children),
            Node::Link(n) => Some(&mut n.children),
            Node::MdxJsxFlowElement(n) => Some(&mut n.children),
            Node::ThematicBreak
            | Node::Code(_)
            | Node::Yaml(_)
            | Node::Text(_)
            | Node::InlineCode(_)
            | Node::Break
            | Node::Image(_)
            | Node::Html(_) => None,
        }
    }

    /// Plain text content of this node and its descendants
    pub fn to_plain_text(&self) -> String {
        match self {
            Node::Text(t) => t.value.clone(),
            Node::InlineCode(c) => c.value.clone(),
            Node::Image(i) => i.alt.clone(),
            _ => self
                .children()
                .map(|children| children.iter().map(Node::to_plain_text).collect())
                .unwrap_or_default(),
        }
    }
}

impl Root {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Depth-first, pre-order traversal with in-place mutation
    ///
    /// The callback sees each node before its children. It may replace the
    /// node entirely; the children of the replacement are visited next.
    pub fn visit_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Node),
    {
        for node in &mut self.children {
            visit_node_mut(node, &mut f);
        }
    }

    /// Depth-first, pre-order traversal
    pub fn visit<F>(&self, mut f: F)
    where
        F: FnMut(&Node),
    {
        for node in &self.children {
            visit_node(node, &mut f);
        }
    }
}

fn visit_node_mut<F>(node: &mut Node, f: &mut F)
where
    F: FnMut(&mut Node),
{
    f(node);
    if let Some(children) = node.children_mut() {
        for child in children {
            visit_node_mut(child, f);
        }
    }
}

fn visit_node<F>(node: &Node, f: &mut F)
where
    F: FnMut(&Node),
{
    f(node);
    if let Some(children) = node.children() {
        for child in children {
            visit_node(child, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_constructors() {
        let text = Node::text("hello");
        assert!(matches!(text, Node::Text(Text { value }) if value == "hello"));

        let heading = Node::heading(2, vec![Node::text("Title")]);
        assert!(matches!(heading, Node::Heading(Heading { depth: 2, .. })));

        let para = Node::paragraph(vec![Node::text("content")]);
        assert!(matches!(para, Node::Paragraph(_)));
    }

    #[test]
    fn test_mdx_attribute_access() {
        let mut elem = match Node::mdx_flow_element("object", vec![("data", "diagram.svg")], vec![]) {
            Node::MdxJsxFlowElement(e) => e,
            _ => panic!("Expected MdxJsxFlowElement node"),
        };
        assert_eq!(elem.attribute("data"), Some("diagram.svg"));
        assert_eq!(elem.attribute("href"), None);

        if let Some(value) = elem.attribute_mut("data") {
            *value = Some("/assets/diagram.svg".to_string());
        }
        assert_eq!(elem.attribute("data"), Some("/assets/diagram.svg"));
    }

    #[test]
    fn test_visit_order_is_depth_first() {
        let root = Root::new(vec![
            Node::paragraph(vec![
                Node::link("a.md", vec![Node::image("inner.png", "inner")]),
                Node::text("between"),
            ]),
            Node::image("last.png", "last"),
        ]);

        let mut seen = Vec::new();
        root.visit(|node| match node {
            Node::Link(l) => seen.push(l.url.clone()),
            Node::Image(i) => seen.push(i.url.clone()),
            _ => {}
        });

        assert_eq!(seen, vec!["a.md", "inner.png", "last.png"]);
    }

    #[test]
    fn test_visit_mut_replaces_in_place() {
        let mut root = Root::new(vec![Node::blockquote(vec![Node::code(
            Some("chartjs".to_string()),
            "type: bar",
        )])]);

        root.visit_mut(|node| {
            if matches!(node, Node::Code(_)) {
                *node = Node::html("<canvas></canvas>");
            }
        });

        assert_eq!(
            root.children[0],
            Node::blockquote(vec![Node::html("<canvas></canvas>")])
        );
    }

    #[test]
    fn test_plain_text() {
        let node = Node::paragraph(vec![
            Node::text("See "),
            Node::strong(vec![Node::text("the ")]),
            Node::inline_code("docs"),
        ]);
        assert_eq!(node.to_plain_text(), "See the docs");
    }

    #[test]
    fn test_serde_tagging() {
        let root = Root::new(vec![Node::mdx_flow_element(
            "a",
            vec![("href", "guide.pdf")],
            vec![Node::text("Guide")],
        )]);

        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["children"][0]["type"], "mdxJsxFlowElement");
        assert_eq!(json["children"][0]["attributes"][0]["name"], "href");

        let parsed: Root = serde_json::from_value(json).unwrap();
        assert_eq!(root, parsed);
    }
}
