//! Co-located asset detection and relocation path computation
//!
//! Authors keep images next to the markdown that uses them, referenced by
//! bare file name, so editors can preview them. At publish time such assets
//! move into a mirror of the content tree under the public assets directory.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::rewrite::{has_scheme, join_url};

/// Where a co-located asset lives and where it is published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationPaths {
    /// The asset next to its referencing document
    pub colocated_source: PathBuf,
    /// Directory the asset is copied into
    pub publish_dest_dir: PathBuf,
    /// Full destination path of the copy
    pub publish_dest: PathBuf,
    /// Source location relative to the authoring root, for diagnostics
    pub publish_dest_rel: String,
    /// URL substituted into the document
    pub published_url: String,
}

/// Decides which URLs are co-located and where they go
pub trait Colocate: Send + Sync {
    /// Whether `url`, referenced from `document`, names a co-located asset
    fn is_colocated(&self, url: &str, document: &Path) -> bool;

    /// Paths for relocating a co-located `url`
    ///
    /// Only meaningful when [`Colocate::is_colocated`] returned true.
    fn relocation_paths(&self, url: &str, document: &Path) -> Option<RelocationPaths>;
}

/// Relocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationConfig {
    /// Marker path locating the content tree inside document paths
    pub content_root: PathBuf,
    /// URL segment (and directory name) for relocated assets
    pub relocated_path_item: String,
    /// Directory relocated assets are copied into
    pub publish_dir: PathBuf,
    /// Public base URL of the site
    pub base_url: String,
}

impl Default for RelocationConfig {
    fn default() -> Self {
        let relocated_path_item = "relocated-assets-from-content".to_string();
        Self {
            content_root: PathBuf::from("/src/content"),
            publish_dir: Path::new("public").join(&relocated_path_item),
            relocated_path_item,
            base_url: "/".to_string(),
        }
    }
}

/// Co-location policy for documents under a content root
///
/// Only bare file names (no `/`, no `#`, no URL scheme) referenced from a
/// document inside the content root qualify. Nested or parent-relative asset
/// paths are never relocated.
#[derive(Debug, Clone, Default)]
pub struct ContentColocator {
    config: RelocationConfig,
}

impl ContentColocator {
    pub fn new(config: RelocationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelocationConfig {
        &self.config
    }

    /// Create the publish directory if it does not exist yet
    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config.publish_dir)
    }

    /// Directory of `document` relative to the content root
    fn relative_dir(&self, document: &Path) -> Option<PathBuf> {
        let dir = document.parent()?;
        relative_to_marker(dir, &self.config.content_root)
    }
}

impl Colocate for ContentColocator {
    fn is_colocated(&self, url: &str, document: &Path) -> bool {
        !url.is_empty()
            && !url.contains('#')
            && !has_scheme(url)
            && !url.contains('/')
            && self.relative_dir(document).is_some()
    }

    fn relocation_paths(&self, url: &str, document: &Path) -> Option<RelocationPaths> {
        let rel_dir = self.relative_dir(document)?;
        let rel_url: String = rel_dir
            .components()
            .map(|c| format!("/{}", c.as_os_str().to_string_lossy()))
            .collect();

        let publish_dest_dir = self.config.publish_dir.join(&rel_dir);
        let publish_dest = publish_dest_dir.join(url);

        Some(RelocationPaths {
            colocated_source: document.parent()?.join(url),
            publish_dest_rel: format!(
                "{}{}/{}",
                self.config.content_root.to_string_lossy().trim_end_matches('/'),
                rel_url,
                url
            ),
            published_url: join_url(
                &self.config.base_url,
                &format!("{}{}/{}", self.config.relocated_path_item, rel_url, url),
            ),
            publish_dest_dir,
            publish_dest,
        })
    }
}

/// The part of `path` after the first contiguous run of components equal to
/// `marker`'s normal components
///
/// `/home/me/site/src/content/guide` with marker `/src/content` yields
/// `guide`; a path without the marker yields `None`.
fn relative_to_marker(path: &Path, marker: &Path) -> Option<PathBuf> {
    let needle: Vec<Component<'_>> = marker
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    let hay: Vec<Component<'_>> = path.components().collect();

    if needle.is_empty() || needle.len() > hay.len() {
        return None;
    }

    let start = (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()] == needle[..])?;
    Some(hay[start + needle.len()..].iter().collect())
}
