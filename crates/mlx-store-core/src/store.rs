//! The cache manager facade consumed by the inference dispatcher and the CLI.

use crate::cancel::CancellationToken;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::fetch::{FetchProgress, Fetcher, ProgressCallback};
use crate::hub::{popular_models, HubClient, RemoteSummary};
use crate::index::{Ownership, ReferenceIndex};
use crate::manifest::DownloadManifest;
use crate::metadata::{is_present, read_bundle_metadata, BundleMetadata};
use crate::reference::{normalize_legacy_reference, ReferenceMapper};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Local cache of MLX model bundles.
///
/// Fetches of different references may run concurrently. Fetches of the
/// same reference are not coordinated and race on the same directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    config: StoreConfig,
    mapper: ReferenceMapper,
    index: ReferenceIndex,
    hub: HubClient,
    fetcher: Fetcher,
}

impl ModelStore {
    /// Create a store rooted at `config.cache_root`, creating the root if needed.
    pub fn new(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.cache_root)
            .map_err(|e| StoreError::io_with_path(e, &config.cache_root))?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StoreError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        let download_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StoreError::Network {
                message: format!("Failed to create download HTTP client: {}", e),
                cause: None,
            })?;

        debug!("Model store rooted at {}", config.cache_root.display());

        Ok(Self {
            mapper: ReferenceMapper::new(&config.cache_root),
            index: ReferenceIndex::new(&config.cache_root),
            hub: HubClient::new(client, config.api_base_url.clone()),
            fetcher: Fetcher::new(download_client, config.hub_base_url.clone()),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn cache_root(&self) -> &Path {
        self.mapper.root()
    }

    /// Local directory for `reference`; it may not exist.
    pub fn resolve_path(&self, reference: &str) -> PathBuf {
        self.mapper.local_path(reference)
    }

    /// True when a complete bundle for `reference` is cached.
    ///
    /// A directory owned by a colliding reference does not count.
    pub fn exists(&self, reference: &str) -> bool {
        if !is_present(&self.resolve_path(reference)) {
            return false;
        }
        !matches!(self.index.ownership(reference), Ok(Ownership::Foreign(_)))
    }

    /// Metadata for the cached bundle of `reference`.
    pub fn metadata(&self, reference: &str) -> Result<BundleMetadata> {
        self.ensure_not_foreign(reference)?;
        read_bundle_metadata(
            reference,
            &self.resolve_path(reference),
            Some(&self.config.hub_base_url),
        )
    }

    /// Every complete bundle under the cache root, sorted by name.
    ///
    /// Incomplete or foreign directories are skipped. A missing root is an
    /// empty cache; any other failure to read the root is returned.
    pub fn list(&self) -> Result<Vec<BundleMetadata>> {
        let root = self.cache_root();
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io_with_path(e, root)),
        };

        let names = self.index.load().unwrap_or_default();
        let mut bundles = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io_with_path(e, root))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            // Unindexed directories are listed under their directory name,
            // which is not a hub reference, so they get no hub URL.
            let dir_name = entry.file_name().to_string_lossy().to_string();
            let (reference, hub_base_url) = match names.get(&dir_name) {
                Some(reference) => (reference.clone(), Some(self.config.hub_base_url.as_str())),
                None => (dir_name, None),
            };

            match read_bundle_metadata(&reference, &entry.path(), hub_base_url) {
                Ok(meta) => bundles.push(meta),
                Err(e) => debug!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        bundles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(bundles)
    }

    /// Fetch the standard MLX bundle layout for `reference`.
    pub async fn fetch(
        &self,
        reference: &str,
        progress: ProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.fetch_with_manifest(reference, &DownloadManifest::standard(), progress, cancel)
            .await
    }

    /// Fetch `manifest` for `reference` into its cache directory.
    ///
    /// Re-fetching an existing bundle overwrites it in place; if that fetch
    /// fails, the previously good bundle is gone too.
    pub async fn fetch_with_manifest(
        &self,
        reference: &str,
        manifest: &DownloadManifest,
        progress: ProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.ensure_not_foreign(reference)?;

        let dest = self.bundle_dir(reference)?;
        if let Err(e) = self
            .fetcher
            .fetch(reference, &dest, manifest, progress, cancel)
            .await
        {
            // Rolled back, so the directory has no owner any more.
            if let Err(forget_err) = self.index.forget(reference) {
                warn!("Could not drop index entry for {}: {}", reference, forget_err);
            }
            return Err(e);
        }

        if let Err(e) = self.index.record(reference) {
            warn!("Fetched {} but could not record it in the index: {}", reference, e);
        }
        Ok(())
    }

    /// Ensure `reference` is cached, fetching it if necessary.
    ///
    /// Legacy `mlx-community_` names are accepted and normalized. Returns the
    /// normalized reference the bundle is cached under.
    pub async fn pull(
        &self,
        reference: &str,
        progress: ProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let (reference, rewritten) = normalize_legacy_reference(reference);
        if rewritten {
            warn!("Legacy underscore reference rewritten to {}", reference);
        }

        let report = |status: String, percent: u8| {
            progress(&FetchProgress {
                reference: reference.clone(),
                status,
                percent,
                filename: None,
            });
        };

        if self.exists(&reference) {
            report(format!("model {} already exists", reference), 100);
            return Ok(reference);
        }

        report(format!("pulling MLX model {}", reference), 0);
        self.fetch(&reference, progress, cancel).await?;
        report("success".to_string(), 100);
        Ok(reference)
    }

    /// Remove the bundle for `reference`. Removing a missing bundle succeeds.
    pub async fn delete(&self, reference: &str) -> Result<()> {
        self.ensure_not_foreign(reference)?;

        let dir = self.bundle_dir(reference)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => info!("Deleted {}", reference),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Nothing to delete for {}", reference)
            }
            Err(e) => return Err(StoreError::io_with_path(e, dir)),
        }

        self.index.forget(reference)
    }

    /// Search the hub for MLX bundles.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<RemoteSummary>> {
        self.hub.search(query, limit).await
    }

    /// Curated references offered when the cache is empty.
    pub fn popular_models(&self) -> &'static [&'static str] {
        popular_models()
    }

    /// Directory `reference` may write to or remove: a direct child of the
    /// cache root that is not one of the index files.
    fn bundle_dir(&self, reference: &str) -> Result<PathBuf> {
        let dir = self.resolve_path(reference);
        if dir.parent() != Some(self.cache_root()) || self.index.is_index_file(&dir) {
            return Err(StoreError::InvalidReference {
                reference: reference.to_string(),
            });
        }
        Ok(dir)
    }

    fn ensure_not_foreign(&self, reference: &str) -> Result<()> {
        match self.index.ownership(reference)? {
            Ownership::Foreign(existing) => Err(StoreError::ReferenceCollision {
                reference: reference.to_string(),
                existing,
            }),
            Ownership::Owned | Ownership::Unknown => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> ModelStore {
        ModelStore::new(StoreConfig::new(temp_dir.path().join("mlx"))).unwrap()
    }

    fn write_bundle(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("config.json"), r#"{"architectures": ["Gemma2"]}"#).unwrap();
        std::fs::write(dir.join("weights.npz"), vec![1u8; 64]).unwrap();
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        assert!(store.cache_root().is_dir());
    }

    #[test]
    fn test_exists_requires_complete_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let dir = store.resolve_path("org/model");

        assert!(!store.exists("org/model"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), "{}").unwrap();
        assert!(!store.exists("org/model"));

        std::fs::write(dir.join("model.safetensors"), b"w").unwrap();
        assert!(store.exists("org/model"));
    }

    #[test]
    fn test_list_skips_incomplete_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        write_bundle(&store.resolve_path("org/good"));
        std::fs::create_dir_all(store.resolve_path("org/partial")).unwrap();
        std::fs::write(store.resolve_path("org/partial").join("tokenizer.json"), "{}").unwrap();
        std::fs::write(store.cache_root().join("stray.txt"), "x").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        // Unindexed directories are reported under their directory name.
        assert_eq!(listed[0].name, "org_good");
        assert_eq!(listed[0].family.as_deref(), Some("Gemma2"));
        assert_eq!(listed[0].hub_url, None);
    }

    #[test]
    fn test_list_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        std::fs::remove_dir_all(store.cache_root()).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_collision_is_detected() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        write_bundle(&store.resolve_path("a/b_c"));
        store.index.record("a/b_c").unwrap();

        assert!(store.exists("a/b_c"));
        assert!(!store.exists("a_b/c"));
        assert!(matches!(
            store.metadata("a_b/c"),
            Err(StoreError::ReferenceCollision { .. })
        ));
        let listed = store.list().unwrap();
        assert_eq!(listed[0].name, "a/b_c");
        assert_eq!(listed[0].hub_url.as_deref(), Some("https://huggingface.co/a/b_c"));
    }

    #[cfg(unix)]
    #[test]
    fn test_list_unreadable_root_is_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        write_bundle(&store.resolve_path("org/model"));

        let root = store.cache_root().to_path_buf();
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o000)).unwrap();
        // Permission bits are not enforced for privileged users.
        let enforced = std::fs::read_dir(&root).is_err();
        let result = store.list();
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o755)).unwrap();

        if enforced {
            assert!(matches!(result, Err(StoreError::Io { .. })));
        }
    }

    #[tokio::test]
    async fn test_delete_degenerate_reference_keeps_cache() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        write_bundle(&store.resolve_path("org/keep"));
        store.index.record("org/keep").unwrap();
        let outside = temp_dir.path().join("outside.txt");
        std::fs::write(&outside, "not part of the cache").unwrap();

        for reference in ["", ".", "..", "/", "\\"] {
            store.delete(reference).await.unwrap();
        }

        assert!(store.exists("org/keep"));
        assert!(store.cache_root().is_dir());
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn test_index_files_are_not_bundles() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.index.record("org/model").unwrap();

        let err = store.delete("references.json").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference { .. }));
        assert_eq!(store.index.ownership("org/model").unwrap(), Ownership::Owned);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        write_bundle(&store.resolve_path("org/model"));
        store.index.record("org/model").unwrap();
        assert!(store.exists("org/model"));

        store.delete("org/model").await.unwrap();
        assert!(!store.exists("org/model"));
        assert!(!store.resolve_path("org/model").exists());
        assert_eq!(store.index.ownership("org/model").unwrap(), Ownership::Unknown);

        store.delete("org/model").await.unwrap();
        store.delete("never/fetched").await.unwrap();
    }

    #[tokio::test]
    async fn test_pull_existing_bundle_skips_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        write_bundle(&store.resolve_path("mlx-community/tiny"));

        let seen = std::sync::Mutex::new(Vec::new());
        let progress = |p: &FetchProgress| seen.lock().unwrap().push(p.status.clone());
        let reference = store
            .pull("mlx-community_tiny", &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reference, "mlx-community/tiny");
        assert_eq!(
            seen.into_inner().unwrap(),
            vec!["model mlx-community/tiny already exists".to_string()]
        );
    }
}
