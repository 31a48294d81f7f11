//! MLX Store - local cache and multi-file fetcher for MLX model bundles.
//!
//! An MLX bundle is a directory of files (descriptor, tokenizer files,
//! weights) published on a Hugging Face style hub under an `owner/name`
//! reference. This crate keeps one directory per reference under a cache
//! root, fetches bundles file by file with progress reporting and
//! cancellation, and derives display metadata from what is on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use mlx_store::{CancellationToken, FetchProgress, ModelStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> mlx_store::Result<()> {
//!     let store = ModelStore::new(StoreConfig::from_env()?)?;
//!
//!     let progress = |p: &FetchProgress| println!("[{:>3}%] {}", p.percent, p.status);
//!     store
//!         .pull("mlx-community/SmolLM2-1.7B-Instruct-4bit", &progress, &CancellationToken::new())
//!         .await?;
//!
//!     for bundle in store.list()? {
//!         println!("{} {} bytes", bundle.name, bundle.size);
//!     }
//!     Ok(())
//! }
//! ```

pub mod atomic;
pub mod cancel;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod format;
pub mod hub;
pub mod index;
pub mod manifest;
pub mod metadata;
pub mod reference;

mod store;

// Re-export commonly used types
pub use cancel::{CancellationToken, CancelledError};
pub use config::{EnvVars, NetworkConfig, StoreConfig};
pub use descriptor::Descriptor;
pub use error::{Result, StoreError};
pub use fetch::{FetchProgress, ProgressCallback};
pub use format::{detect_format, ModelFormat};
pub use hub::RemoteSummary;
pub use manifest::{DownloadManifest, ManifestEntry};
pub use metadata::BundleMetadata;
pub use store::ModelStore;
