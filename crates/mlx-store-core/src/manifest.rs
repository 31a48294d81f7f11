//! The fixed list of files that make up one bundle.

use std::path::Path;

/// Weight files recognised as making a bundle usable, in either format.
pub const WEIGHT_FILES: &[&str] = &["model.safetensors", "weights.npz"];

/// One file in a [`DownloadManifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub filename: String,
    /// A failed required file aborts the fetch; an optional one is skipped.
    pub required: bool,
}

/// Ordered file list: every required entry precedes every optional one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadManifest {
    entries: Vec<ManifestEntry>,
}

impl DownloadManifest {
    /// Build a manifest; required files are ordered before optional files.
    pub fn new<R, O>(required: R, optional: O) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let required = required.into_iter().map(|f| ManifestEntry {
            filename: f.into(),
            required: true,
        });
        let optional = optional.into_iter().map(|f| ManifestEntry {
            filename: f.into(),
            required: false,
        });
        Self {
            entries: required.chain(optional).collect(),
        }
    }

    /// Layout of a converted MLX bundle on the hub.
    pub fn standard() -> Self {
        Self::new(
            ["config.json", "tokenizer.json", "tokenizer_config.json"],
            [
                "model.safetensors",
                "weights.npz",
                "special_tokens_map.json",
                "generation_config.json",
            ],
        )
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DownloadManifest {
    fn default() -> Self {
        Self::standard()
    }
}

/// Whether `dir` holds at least one recognised weights file.
pub fn has_weights(dir: &Path) -> bool {
    WEIGHT_FILES.iter().any(|name| dir.join(name).is_file())
}
