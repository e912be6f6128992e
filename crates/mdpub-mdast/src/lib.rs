//! mdpub-mdast: mdast types, markdown parser and markdown writer for mdpub
//!
//! This crate provides:
//! - mdast (Markdown Abstract Syntax Tree) types (subset, plus MDX flow elements)
//! - Depth-first visiting with in-place mutation
//! - Parsing CommonMark into mdast (via `pulldown-cmark`), with MDX flow
//!   elements for `.mdx` sources
//! - Serialization back to Markdown
//!
//! ## Example
//!
//! ```rust
//! use mdpub_mdast::{Node, mdast_to_markdown, parse_markdown};
//!
//! let mut doc = parse_markdown("![Logo](logo.png)\n");
//! doc.visit_mut(|node| {
//!     if let Node::Image(img) = node {
//!         img.url = format!("/assets/{}", img.url);
//!     }
//! });
//!
//! assert_eq!(mdast_to_markdown(&doc), "![Logo](/assets/logo.png)\n");
//! ```

pub mod mdast;
pub mod parser;
pub mod writer;

pub use mdast::{
    Align, Blockquote, Code, Delete, Emphasis, Heading, Html, Image, InlineCode, Link, List,
    ListItem, MdxJsxAttribute, MdxJsxFlowElement, Node, Paragraph, Root, Strong, Table, TableCell,
    TableRow, Text, Yaml,
};
pub use parser::{parse_markdown, parse_mdx};
pub use writer::mdast_to_markdown;
