//! Configuration file support for mdpub CLI
//!
//! Loads settings from `_mdpub.toml` configuration file.

use anyhow::{Context, Result};
use mdpub_core::{
    ChainMode, ContentColocator, CopyIfNewer, MarkdownPrettyUrl, Pipeline, PrefixReplacer,
    PreviewableUrls, PublicPrefixStrip, RelocationConfig, RewriteChain, TracingObserver,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "_mdpub.toml";

/// Schema reference written at the top of generated configuration files
///
/// Generate the schema next to the configuration with
/// `mdpub init --schema -o mdpub.schema.json`.
pub const SCHEMA_REF: &str = "./mdpub.schema.json";

/// Root configuration structure
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Content tree configuration
    #[serde(skip_serializing_if = "ContentConfig::is_empty")]
    pub content: ContentConfig,
    /// Co-located asset relocation configuration
    #[serde(skip_serializing_if = "RelocationSection::is_empty")]
    pub relocation: RelocationSection,
    /// URL rewrite rules configuration
    #[serde(skip_serializing_if = "RewriteConfig::is_empty")]
    pub rewrite: RewriteConfig,
    /// Chart embedding configuration
    #[serde(skip_serializing_if = "ChartsConfig::is_empty")]
    pub charts: ChartsConfig,
    /// Hyperlink prefix replacement configuration
    #[serde(skip_serializing_if = "LinksConfig::is_empty")]
    pub links: LinksConfig,
}

/// Content tree configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct ContentConfig {
    /// Path segment marking the content tree inside document paths (default: "/src/content")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl ContentConfig {
    fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

/// Co-located asset relocation configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct RelocationSection {
    /// Copy co-located assets and rewrite their URLs (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// URL segment for relocated assets (default: "relocated-assets-from-content")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_item: Option<String>,
    /// Directory relocated assets are copied into (default: "public/<path_item>")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_dir: Option<PathBuf>,
    /// Public base URL of the site (default: "/")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl RelocationSection {
    fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.path_item.is_none()
            && self.publish_dir.is_none()
            && self.base_url.is_none()
    }
}

/// Which URL each rewrite rule sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChainModeSetting {
    /// Each rule sees the URL left by the previous rule
    Progressive,
    /// Each rule sees the authored URL
    Original,
}

impl From<ChainModeSetting> for ChainMode {
    fn from(setting: ChainModeSetting) -> Self {
        match setting {
            ChainModeSetting::Progressive => ChainMode::Progressive,
            ChainModeSetting::Original => ChainMode::Original,
        }
    }
}

/// URL rewrite rules configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct RewriteConfig {
    /// Run the rewrite chain (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Turn links to `.md`/`.mdx` files into pretty URLs (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_links: Option<bool>,
    /// Turn `../public/...` references into site-absolute URLs (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_prefix: Option<bool>,
    /// "progressive" or "original" (default: "progressive")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_mode: Option<ChainModeSetting>,
}

impl RewriteConfig {
    fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.markdown_links.is_none()
            && self.public_prefix.is_none()
            && self.chain_mode.is_none()
    }
}

/// Chart embedding configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct ChartsConfig {
    /// Render `chartjs` / `echarts` code blocks (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl ChartsConfig {
    fn is_empty(&self) -> bool {
        self.enabled.is_none()
    }
}

/// Hyperlink prefix replacement configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct LinksConfig {
    /// Prefix replacements, tried in order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<Vec<LinkReplacement>>,
}

impl LinksConfig {
    fn is_empty(&self) -> bool {
        self.replace.is_none()
    }
}

/// A single hyperlink prefix replacement
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct LinkReplacement {
    /// URL prefix to match
    pub prefix: String,
    /// Replacement for the matched prefix
    pub with: String,
}

impl Config {
    /// Load configuration from a specific file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Try to load configuration from a directory (looks for `_mdpub.toml`)
    ///
    /// Returns `Ok(None)` if the config file doesn't exist.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Generate JSON schema for the configuration
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }

    /// Generate JSON schema as a string
    pub fn json_schema_string() -> Result<String> {
        let schema = Self::json_schema();
        serde_json::to_string_pretty(&schema).context("Failed to serialize JSON schema")
    }

    /// Serialize configuration to TOML string with schema directive
    pub fn to_toml_with_schema(&self) -> Result<String> {
        let toml_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        Ok(format!("#:schema {}\n\n{}", SCHEMA_REF, toml_content))
    }

    /// Create a sample configuration with the defaults spelled out, for init
    pub fn sample() -> Self {
        let defaults = RelocationConfig::default();
        Config {
            content: ContentConfig {
                root: Some(defaults.content_root),
            },
            relocation: RelocationSection {
                enabled: Some(true),
                path_item: Some(defaults.relocated_path_item),
                publish_dir: Some(defaults.publish_dir),
                base_url: Some(defaults.base_url),
            },
            rewrite: RewriteConfig {
                enabled: Some(true),
                markdown_links: Some(true),
                public_prefix: Some(true),
                chain_mode: Some(ChainModeSetting::Progressive),
            },
            charts: ChartsConfig {
                enabled: Some(true),
            },
            links: LinksConfig { replace: None }, // user should specify
        }
    }

    /// Relocation settings with defaults filled in
    pub fn relocation_config(&self) -> RelocationConfig {
        let defaults = RelocationConfig::default();
        let relocated_path_item = self
            .relocation
            .path_item
            .clone()
            .unwrap_or(defaults.relocated_path_item);
        let publish_dir = match &self.relocation.publish_dir {
            Some(dir) => dir.clone(),
            None => Path::new("public").join(&relocated_path_item),
        };

        RelocationConfig {
            content_root: self.content.root.clone().unwrap_or(defaults.content_root),
            relocated_path_item,
            publish_dir,
            base_url: self
                .relocation
                .base_url
                .clone()
                .unwrap_or(defaults.base_url),
        }
    }

    /// Hyperlink replacer from `[[links.replace]]` entries
    pub fn link_replacer(&self) -> PrefixReplacer {
        self.links
            .replace
            .iter()
            .flatten()
            .fold(PrefixReplacer::new(), |r, rule| {
                r.with(rule.prefix.clone(), rule.with.clone())
            })
    }

    /// Build the document pipeline
    ///
    /// Creates the relocation publish directory when relocation is enabled.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let relocation = self.relocation_config();

        let chain = RewriteChain::new(self.rewrite.chain_mode.map(Into::into).unwrap_or_default())
            .with_rule(MarkdownPrettyUrl {
                enabled: self.rewrite.markdown_links.unwrap_or(true),
            })
            .with_rule(PublicPrefixStrip {
                enabled: self.rewrite.public_prefix.unwrap_or(true),
                base_url: relocation.base_url.clone(),
            });
        let mut pass =
            PreviewableUrls::new(chain).rewrite_enabled(self.rewrite.enabled.unwrap_or(true));

        if self.relocation.enabled.unwrap_or(true) {
            let colocator = ContentColocator::new(relocation);
            colocator.prepare().with_context(|| {
                format!(
                    "Failed to create publish directory: {}",
                    colocator.config().publish_dir.display()
                )
            })?;
            pass = pass.with_relocation(colocator, CopyIfNewer::new(Arc::new(TracingObserver)));
        }

        Ok(Pipeline::new()
            .with_charts(self.charts.enabled.unwrap_or(true))
            .with_links(self.link_replacer())
            .with_previewable_urls(pass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.content.root.is_none());
        assert!(config.relocation.enabled.is_none());
        assert_eq!(config.relocation_config(), RelocationConfig::default());
    }

    #[test]
    fn test_parse_relocation_section() {
        let config: Config = toml::from_str(
            r#"
            [content]
            root = "/docs"

            [relocation]
            enabled = true
            path_item = "assets"
            base_url = "https://example.com/"
            "#,
        )
        .unwrap();

        let relocation = config.relocation_config();
        assert_eq!(relocation.content_root, PathBuf::from("/docs"));
        assert_eq!(relocation.relocated_path_item, "assets");
        // publish_dir follows path_item when not set
        assert_eq!(relocation.publish_dir, PathBuf::from("public/assets"));
        assert_eq!(relocation.base_url, "https://example.com/");
    }

    #[test]
    fn test_parse_rewrite_section() {
        let config: Config = toml::from_str(
            r#"
            [rewrite]
            enabled = true
            markdown_links = false
            public_prefix = true
            chain_mode = "original"
            "#,
        )
        .unwrap();

        assert_eq!(config.rewrite.markdown_links, Some(false));
        assert_eq!(config.rewrite.chain_mode, Some(ChainModeSetting::Original));
        assert_eq!(
            ChainMode::from(ChainModeSetting::Original),
            ChainMode::Original
        );
    }

    #[test]
    fn test_invalid_chain_mode_is_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [rewrite]
            chain_mode = "sideways"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_links_section() {
        let config: Config = toml::from_str(
            r#"
            [[links.replace]]
            prefix = "https://old.example.com/"
            with = "/"

            [[links.replace]]
            prefix = "http://old.example.com/"
            with = "/"
            "#,
        )
        .unwrap();

        assert_eq!(config.links.replace.as_ref().map(Vec::len), Some(2));
        let replacer = config.link_replacer();
        assert_eq!(replacer.replace("http://old.example.com/a"), "/a");
        assert_eq!(replacer.replace("https://new.example.com/a"), "https://new.example.com/a");
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [charts]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.charts.enabled, Some(false));
        assert!(config.rewrite.enabled.is_none());
        assert!(config.link_replacer().is_empty());
    }

    #[test]
    fn test_serialize_empty_config() {
        let config = Config::default();
        let toml = config.to_toml_with_schema().unwrap();
        assert!(toml.starts_with("#:schema"));
        assert!(!toml.contains("[relocation]"));
    }

    #[test]
    fn test_serialize_sample_config() {
        let config = Config::sample();
        let toml = config.to_toml_with_schema().unwrap();
        assert!(toml.starts_with("#:schema ./mdpub.schema.json"));
        assert!(toml.contains("[relocation]"));
        assert!(toml.contains("chain_mode = \"progressive\""));
        assert!(toml.contains("path_item = \"relocated-assets-from-content\""));
    }

    #[test]
    fn test_json_schema_generation() {
        let schema = Config::json_schema_string().unwrap();
        assert!(schema.contains("\"title\""));
        assert!(schema.contains("RelocationSection"));
        assert!(schema.contains("progressive"));
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::sample();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.relocation_config(), config.relocation_config());
        assert_eq!(parsed.rewrite.chain_mode, Some(ChainModeSetting::Progressive));
    }

    #[test]
    fn test_pipeline_creates_publish_dir() {
        let dir = tempfile::tempdir().unwrap();
        let publish_dir = dir.path().join("public/assets");
        let config = Config {
            relocation: RelocationSection {
                publish_dir: Some(publish_dir.clone()),
                ..Default::default()
            },
            ..Default::default()
        };

        config.pipeline().unwrap();
        assert!(publish_dir.is_dir());
    }

    #[test]
    fn test_pipeline_without_relocation_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let publish_dir = dir.path().join("public/assets");
        let config = Config {
            relocation: RelocationSection {
                enabled: Some(false),
                publish_dir: Some(publish_dir.clone()),
                ..Default::default()
            },
            ..Default::default()
        };

        config.pipeline().unwrap();
        assert!(!publish_dir.exists());
    }
}
