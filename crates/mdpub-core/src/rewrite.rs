//! Ordered URL rewrite rules
//!
//! A [`RewriteChain`] runs its rules in declaration order. A rule either
//! passes (`None`) or produces a [`Rewrite`]; the first rewrite that asks to
//! terminate ends the chain for that reference.

use crate::context::DocumentContext;

/// Replacement produced by a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub url: String,
    /// Stop evaluating later rules for this reference
    pub terminate: bool,
}

impl Rewrite {
    /// A final replacement; no later rule runs
    pub fn terminal(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            terminate: true,
        }
    }

    /// A replacement later rules may refine
    pub fn partial(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            terminate: false,
        }
    }
}

/// A single URL transform
pub trait RewriteRule: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Disabled rules are skipped by the chain
    fn is_enabled(&self) -> bool {
        true
    }

    /// Produce a replacement for `url`, or `None` to leave it alone
    fn rewrite(&self, url: &str, ctx: &DocumentContext) -> Option<Rewrite>;
}

/// What URL each rule sees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainMode {
    /// Every rule sees the URL left by the previous firing rule
    #[default]
    Progressive,
    /// Every rule sees the URL as it was before the chain ran; the last
    /// firing rule's replacement wins
    Original,
}

/// Outcome of running a chain over one URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainResult {
    /// Replacement URL, if any rule fired
    pub url: Option<String>,
    /// A terminating rule fired
    pub terminated: bool,
}

/// Ordered list of rewrite rules
#[derive(Default)]
pub struct RewriteChain {
    rules: Vec<Box<dyn RewriteRule>>,
    mode: ChainMode,
}

impl RewriteChain {
    pub fn new(mode: ChainMode) -> Self {
        Self {
            rules: Vec::new(),
            mode,
        }
    }

    /// Append a rule (builder style)
    pub fn with_rule(mut self, rule: impl RewriteRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Append a rule
    pub fn push(&mut self, rule: Box<dyn RewriteRule>) {
        self.rules.push(rule);
    }

    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run enabled rules in order over `url`
    pub fn apply(&self, url: &str, ctx: &DocumentContext) -> ChainResult {
        let mut result = ChainResult::default();

        for rule in self.rules.iter().filter(|r| r.is_enabled()) {
            let input = match (self.mode, &result.url) {
                (ChainMode::Progressive, Some(current)) => current.as_str(),
                _ => url,
            };

            let Some(rewrite) = rule.rewrite(input, ctx) else {
                continue;
            };
            tracing::debug!(rule = rule.name(), from = input, to = %rewrite.url, "Rewrote URL");

            result.url = Some(rewrite.url);
            if rewrite.terminate {
                result.terminated = true;
                break;
            }
        }

        result
    }
}

impl std::fmt::Debug for RewriteChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteChain")
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Rule backed by a closure
pub struct FnRule<F> {
    name: String,
    enabled: bool,
    f: F,
}

impl<F> FnRule<F>
where
    F: Fn(&str, &DocumentContext) -> Option<Rewrite> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            f,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl<F> RewriteRule for FnRule<F>
where
    F: Fn(&str, &DocumentContext) -> Option<Rewrite> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn rewrite(&self, url: &str, ctx: &DocumentContext) -> Option<Rewrite> {
        (self.f)(url, ctx)
    }
}

/// Turns links to sibling `.md` / `.mdx` sources into pretty URLs
///
/// `guide.md` and `./guide.md` both become `../guide`: a published page
/// lives at `<slug>/index.html`, one level below where its source sat.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownPrettyUrl {
    pub enabled: bool,
}

impl Default for MarkdownPrettyUrl {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl RewriteRule for MarkdownPrettyUrl {
    fn name(&self) -> &str {
        "markdown-pretty-url"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn rewrite(&self, url: &str, _ctx: &DocumentContext) -> Option<Rewrite> {
        if has_scheme(url) || url.contains('#') {
            return None;
        }
        let stem = url
            .strip_suffix(".md")
            .or_else(|| url.strip_suffix(".mdx"))?;
        let stem = stem.strip_prefix("./").unwrap_or(stem);
        Some(Rewrite::terminal(format!("../{}", stem)))
    }
}

/// Turns `../../public/x/y.png` into a site-absolute `/x/y.png`
///
/// Authors reference files under `public/` relatively so that editors can
/// preview them; the published site serves `public/` at its root.
#[derive(Debug, Clone)]
pub struct PublicPrefixStrip {
    pub enabled: bool,
    pub base_url: String,
}

impl PublicPrefixStrip {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            base_url: base_url.into(),
        }
    }
}

impl RewriteRule for PublicPrefixStrip {
    fn name(&self) -> &str {
        "public-prefix-strip"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn rewrite(&self, url: &str, _ctx: &DocumentContext) -> Option<Rewrite> {
        let rest = strip_relative_public(url)?;
        Some(Rewrite::terminal(join_url(&self.base_url, rest)))
    }
}

const RELATIVE_PUBLIC: &str = "../public";

/// The part of a `../`-relative URL after its `../public` segment
///
/// ```
/// use mdpub_core::rewrite::strip_relative_public;
///
/// assert_eq!(strip_relative_public("../../public/img/a.png"), Some("/img/a.png"));
/// assert_eq!(strip_relative_public("public/img/a.png"), None);
/// ```
pub fn strip_relative_public(url: &str) -> Option<&str> {
    if !url.starts_with("../") {
        return None;
    }
    let idx = url.find(RELATIVE_PUBLIC)?;
    let rest = &url[idx + RELATIVE_PUBLIC.len()..];
    // `../publications/x` is not under public/
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }
    Some(rest)
}

/// Join a base URL and a path with exactly one `/` between them
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

/// Whether `url` starts with a URL scheme such as `https:` or `tel:`
pub(crate) fn has_scheme(url: &str) -> bool {
    match url.find(':') {
        Some(idx) => {
            let scheme = &url[..idx];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
