//! Hyperlink rewriting
//!
//! Applies a replacer to every markdown link URL, every `<a href>` flow
//! element, and every `href="..."` inside raw HTML that contains an anchor.

use std::sync::LazyLock;

use mdpub_mdast::{Node, Root};
use regex::{Captures, Regex};

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<a(\s[^>]*)?>").unwrap());
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href="(.*?)""#).unwrap());

/// Rewrite hyperlink URLs in `root`; returns the number of URLs changed
pub fn rewrite_links<F>(root: &mut Root, replacer: F) -> usize
where
    F: Fn(&str) -> String,
{
    let mut changed = 0;
    let apply = |url: &mut String| -> bool {
        let next = replacer(url);
        if next == *url {
            return false;
        }
        tracing::debug!(from = %url, to = %next, "Rewrote link");
        *url = next;
        true
    };

    root.visit_mut(|node| match node {
        Node::Link(link) => {
            if apply(&mut link.url) {
                changed += 1;
            }
        }
        Node::MdxJsxFlowElement(el) if el.name.as_deref() == Some("a") => {
            if let Some(Some(href)) = el.attribute_mut("href")
                && apply(href)
            {
                changed += 1;
            }
        }
        Node::Html(html) if ANCHOR_RE.is_match(&html.value) => {
            let mut local = 0;
            let rewritten = HREF_RE.replace_all(&html.value, |caps: &Captures<'_>| {
                let url = &caps[1];
                let next = replacer(url);
                if next != url {
                    local += 1;
                }
                format!(r#"href="{}""#, next)
            });
            if local > 0 {
                html.value = rewritten.into_owned();
                changed += local;
            }
        }
        _ => {}
    });

    changed
}

/// Replaces URL prefixes; the first matching prefix wins
#[derive(Debug, Clone, Default)]
pub struct PrefixReplacer {
    rules: Vec<(String, String)>,
}

impl PrefixReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.rules.push((prefix.into(), replacement.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn replace(&self, url: &str) -> String {
        self.rules
            .iter()
            .find_map(|(prefix, replacement)| {
                url.strip_prefix(prefix.as_str())
                    .map(|rest| format!("{}{}", replacement, rest))
            })
            .unwrap_or_else(|| url.to_string())
    }
}
