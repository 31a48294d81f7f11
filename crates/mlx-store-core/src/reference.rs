//! Mapping from hub references to local cache directories.
//!
//! A reference such as `mlx-community/Llama-3.2-1B-Instruct-4bit` becomes the
//! directory `mlx-community_Llama-3.2-1B-Instruct-4bit` under the cache root.
//! The transform is lossy: `a_b/c` and `a/b_c` share a directory. The
//! [`crate::index::ReferenceIndex`] side-table records which reference owns
//! each directory so the collision is detected instead of silently merged.

use std::path::{Path, PathBuf};

/// Character substituted for path separators in local directory names.
pub const SEPARATOR_SUBSTITUTE: char = '_';

/// Organisation publishing converted MLX bundles on the hub.
const MLX_COMMUNITY_PREFIX: &str = "mlx-community/";

/// Legacy spelling of [`MLX_COMMUNITY_PREFIX`] from before slash-separated names.
const LEGACY_MLX_COMMUNITY_PREFIX: &str = "mlx-community_";

/// Directory name for a reference: every `/` and `\` becomes `_`.
///
/// A name that is empty or made only of dots would resolve to the cache root
/// or its parent, so it is substituted as well: `""` becomes `_` and `..`
/// becomes `__`.
///
/// # Examples
///
/// ```
/// use mlx_store::reference::local_dir_name;
///
/// assert_eq!(local_dir_name("org/Model-4bit"), "org_Model-4bit");
/// assert_eq!(local_dir_name("plain-name"), "plain-name");
/// assert_eq!(local_dir_name(".."), "__");
/// ```
pub fn local_dir_name(reference: &str) -> String {
    let name: String = reference
        .chars()
        .map(|c| match c {
            '/' | '\\' => SEPARATOR_SUBSTITUTE,
            other => other,
        })
        .collect();

    if name.is_empty() {
        return SEPARATOR_SUBSTITUTE.to_string();
    }
    if name.chars().all(|c| c == '.') {
        return name.replace('.', &SEPARATOR_SUBSTITUTE.to_string());
    }
    name
}

/// Resolves references to absolute bundle directories under one cache root.
///
/// Pure: no filesystem access, no environment reads.
#[derive(Debug, Clone)]
pub struct ReferenceMapper {
    root: PathBuf,
}

impl ReferenceMapper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local directory for `reference`. The directory may not exist.
    pub fn local_path(&self, reference: &str) -> PathBuf {
        self.root.join(local_dir_name(reference))
    }
}

/// Rewrite legacy `mlx-community_<name>` references to `mlx-community/<name>`.
///
/// Returns the (possibly unchanged) reference and whether a rewrite happened,
/// so callers can warn about the deprecated spelling.
pub fn normalize_legacy_reference(reference: &str) -> (String, bool) {
    match reference.strip_prefix(LEGACY_MLX_COMMUNITY_PREFIX) {
        Some(rest) if !rest.is_empty() => (format!("{}{}", MLX_COMMUNITY_PREFIX, rest), true),
        _ => (reference.to_string(), false),
    }
}

/// Heuristic: does this name refer to an MLX bundle on the hub?
pub fn looks_like_bundle_reference(reference: &str) -> bool {
    reference.starts_with(MLX_COMMUNITY_PREFIX) || reference.to_lowercase().contains("-mlx")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_is_deterministic() {
        let mapper = ReferenceMapper::new("/cache");
        let first = mapper.local_path("org/tiny-model");
        let second = ReferenceMapper::new("/cache").local_path("org/tiny-model");
        assert_eq!(first, second);
        assert_eq!(first, PathBuf::from("/cache/org_tiny-model"));
    }

    #[test]
    fn test_backslash_is_substituted() {
        assert_eq!(local_dir_name("org\\model"), "org_model");
    }

    #[test]
    fn test_degenerate_references_stay_inside_root() {
        let mapper = ReferenceMapper::new("/cache");
        for reference in ["", ".", "..", "...", "/", "./..", "../.."] {
            let path = mapper.local_path(reference);
            assert_eq!(path.parent(), Some(Path::new("/cache")), "{:?}", reference);
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(!name.chars().all(|c| c == '.'), "{:?} -> {:?}", reference, name);
        }
        assert_eq!(local_dir_name(""), "_");
        assert_eq!(local_dir_name("."), "_");
        assert_eq!(local_dir_name(".."), "__");
        assert_eq!(local_dir_name(".hidden"), ".hidden");
    }

    #[test]
    fn test_separator_placement_collides() {
        // Documented limitation: resolved via the reference index.
        assert_eq!(local_dir_name("a_b/c"), local_dir_name("a/b_c"));
    }

    #[test]
    fn test_normalize_legacy_reference() {
        assert_eq!(
            normalize_legacy_reference("mlx-community_Qwen2.5-7B-4bit"),
            ("mlx-community/Qwen2.5-7B-4bit".to_string(), true)
        );
        assert_eq!(
            normalize_legacy_reference("mlx-community/Qwen2.5-7B-4bit"),
            ("mlx-community/Qwen2.5-7B-4bit".to_string(), false)
        );
        assert_eq!(
            normalize_legacy_reference("mlx-community_"),
            ("mlx-community_".to_string(), false)
        );
    }

    #[test]
    fn test_looks_like_bundle_reference() {
        assert!(looks_like_bundle_reference("mlx-community/gemma-2-2b-it-4bit"));
        assert!(looks_like_bundle_reference("someone/Phi-3-MLX"));
        assert!(!looks_like_bundle_reference("llama3:8b"));
    }
}
