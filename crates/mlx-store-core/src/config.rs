//! Configuration for the MLX model store.
//!
//! [`StoreConfig`] is resolved once by the embedding process and handed to
//! [`crate::ModelStore::new`]. Nothing inside the store reads the environment.

use crate::error::{Result, StoreError};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Network-related constants.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const HF_HUB_BASE: &'static str = "https://huggingface.co";
    pub const HF_API_BASE: &'static str = "https://huggingface.co/api";
    pub const USER_AGENT: &'static str = concat!("mlx-store/", env!("CARGO_PKG_VERSION"));
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    /// Hub tag restricting search results to MLX bundles.
    pub const SEARCH_FILTER_TAG: &'static str = "mlx";
    pub const DEFAULT_SEARCH_LIMIT: usize = 20;
}

/// Environment variables consulted by [`StoreConfig::from_env`].
pub struct EnvVars;

impl EnvVars {
    pub const STORE_DIR: &'static str = "MLX_STORE_DIR";
    pub const OLLAMA_MODELS: &'static str = "OLLAMA_MODELS";
    pub const HF_ENDPOINT: &'static str = "HF_ENDPOINT";
}

/// Settings injected into a [`crate::ModelStore`] at construction.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per cached bundle.
    pub cache_root: PathBuf,
    /// Base for file downloads: `<hub>/<reference>/resolve/main/<file>`.
    pub hub_base_url: String,
    /// Base for API calls such as search: `<api>/models`.
    pub api_base_url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Total timeout for API requests. Downloads only use the connect timeout.
    pub request_timeout: Duration,
}

impl StoreConfig {
    /// Configuration for `cache_root` against the public hub.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            hub_base_url: NetworkConfig::HF_HUB_BASE.to_string(),
            api_base_url: NetworkConfig::HF_API_BASE.to_string(),
            user_agent: NetworkConfig::USER_AGENT.to_string(),
            connect_timeout: NetworkConfig::CONNECT_TIMEOUT,
            request_timeout: NetworkConfig::REQUEST_TIMEOUT,
        }
    }

    /// Point downloads and API calls at another hub, e.g. a mirror.
    ///
    /// Trailing slashes are trimmed so URLs can be joined with `/`.
    pub fn with_hub(mut self, hub_base_url: &str, api_base_url: &str) -> Result<Self> {
        self.hub_base_url = validate_base_url(hub_base_url)?;
        self.api_base_url = validate_base_url(api_base_url)?;
        Ok(self)
    }

    /// Resolve the configuration from the process environment.
    ///
    /// Cache root precedence: `MLX_STORE_DIR`, then `OLLAMA_MODELS/mlx`, then
    /// `~/.ollama/models/mlx`. `HF_ENDPOINT` replaces the hub base.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), dirs::home_dir())
    }

    pub(crate) fn from_lookup<F>(lookup: F, home: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cache_root = if let Some(dir) = non_empty(EnvVars::STORE_DIR) {
            PathBuf::from(dir)
        } else if let Some(models) = non_empty(EnvVars::OLLAMA_MODELS) {
            PathBuf::from(models).join("mlx")
        } else {
            let home = home.ok_or_else(|| StoreError::Config {
                message: format!(
                    "cannot determine home directory; set {}",
                    EnvVars::STORE_DIR
                ),
            })?;
            home.join(".ollama").join("models").join("mlx")
        };

        let config = Self::new(cache_root);
        match non_empty(EnvVars::HF_ENDPOINT) {
            Some(endpoint) => {
                let hub = validate_base_url(&endpoint)?;
                let api = format!("{}/api", hub);
                config.with_hub(&hub, &api)
            }
            None => Ok(config),
        }
    }
}

fn validate_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| StoreError::Config {
        message: format!("invalid base URL {:?}: {}", raw, e),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StoreError::Config {
            message: format!("unsupported URL scheme in {:?}", raw),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_store_dir_wins() {
        let config = StoreConfig::from_lookup(
            lookup(&[("MLX_STORE_DIR", "/data/mlx"), ("OLLAMA_MODELS", "/models")]),
            Some(PathBuf::from("/home/u")),
        )
        .unwrap();
        assert_eq!(config.cache_root, PathBuf::from("/data/mlx"));
    }

    #[test]
    fn test_ollama_models_gets_mlx_subdir() {
        let config =
            StoreConfig::from_lookup(lookup(&[("OLLAMA_MODELS", "/models")]), None).unwrap();
        assert_eq!(config.cache_root, PathBuf::from("/models/mlx"));
    }

    #[test]
    fn test_home_default() {
        let config = StoreConfig::from_lookup(lookup(&[]), Some(PathBuf::from("/home/u"))).unwrap();
        assert_eq!(config.cache_root, PathBuf::from("/home/u/.ollama/models/mlx"));
        assert_eq!(config.hub_base_url, NetworkConfig::HF_HUB_BASE);
    }

    #[test]
    fn test_missing_home_is_config_error() {
        let err = StoreConfig::from_lookup(lookup(&[]), None).unwrap_err();
        assert!(matches!(err, StoreError::Config { .. }));
    }

    #[test]
    fn test_hf_endpoint_override() {
        let config = StoreConfig::from_lookup(
            lookup(&[("MLX_STORE_DIR", "/c"), ("HF_ENDPOINT", "https://mirror.example/")]),
            None,
        )
        .unwrap();
        assert_eq!(config.hub_base_url, "https://mirror.example");
        assert_eq!(config.api_base_url, "https://mirror.example/api");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = StoreConfig::from_lookup(
            lookup(&[("MLX_STORE_DIR", "/c"), ("HF_ENDPOINT", "not a url")]),
            None,
        );
        assert!(matches!(result, Err(StoreError::Config { .. })));

        let result = StoreConfig::new("/c").with_hub("ftp://hub", "ftp://hub/api");
        assert!(result.is_err());
    }
}
