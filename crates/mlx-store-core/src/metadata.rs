//! Read-only metadata for cached bundles.

use crate::descriptor::{Descriptor, DESCRIPTOR_FILE};
use crate::error::{Result, StoreError};
use crate::format::ModelFormat;
use crate::manifest::has_weights;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Derived view over one cached bundle directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleMetadata {
    /// Reference the bundle was fetched under.
    pub name: String,
    /// Sum of all regular file sizes under the bundle directory, in bytes.
    pub size: u64,
    /// Identifier derived from the reference string, not from file contents.
    pub digest: String,
    /// Modification time of the bundle directory.
    pub modified_at: DateTime<Utc>,
    pub format: String,
    pub family: Option<String>,
    /// Approximate, for display only.
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
    #[serde(skip)]
    pub local_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_url: Option<String>,
}

/// A bundle is present when it has its descriptor and at least one weights file.
///
/// A directory holding only part of a download is never present.
pub fn is_present(dir: &Path) -> bool {
    dir.is_dir() && dir.join(DESCRIPTOR_FILE).is_file() && has_weights(dir)
}

/// Stable identifier for a reference: `sha256:<hex>` of the reference string.
///
/// Two references naming byte-identical weights still get different digests.
pub fn reference_digest(reference: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(reference.as_bytes())))
}

/// Total size of every regular file under `dir`, recursively.
///
/// Any error during the walk aborts rather than under-reporting.
pub fn directory_size(dir: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            match e.into_io_error() {
                Some(io) => StoreError::io_with_path(io, path),
                None => StoreError::Io {
                    message: "filesystem loop while walking bundle".to_string(),
                    path: Some(path),
                    source: None,
                },
            }
        })?;
        if entry.file_type().is_file() {
            let meta = entry
                .metadata()
                .map_err(|e| StoreError::Io {
                    message: e.to_string(),
                    path: Some(entry.path().to_path_buf()),
                    source: e.into_io_error(),
                })?;
            total += meta.len();
        }
    }
    Ok(total)
}

/// Build metadata for the bundle of `reference` stored at `dir`.
///
/// Fails with [`StoreError::NotFound`] unless the bundle is present. An
/// unreadable descriptor leaves the descriptor-derived fields empty.
pub fn read_bundle_metadata(
    reference: &str,
    dir: &Path,
    hub_base_url: Option<&str>,
) -> Result<BundleMetadata> {
    if !is_present(dir) {
        return Err(StoreError::NotFound {
            reference: reference.to_string(),
        });
    }

    let modified_at = std::fs::metadata(dir)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .map_err(|e| StoreError::io_with_path(e, dir))?;

    let descriptor = Descriptor::read(dir).unwrap_or_default();
    let size = directory_size(dir)?;

    Ok(BundleMetadata {
        name: reference.to_string(),
        size,
        digest: reference_digest(reference),
        modified_at,
        format: ModelFormat::Mlx.to_string(),
        family: descriptor.family(),
        parameter_size: descriptor.parameter_size_label(),
        quantization_level: descriptor.quantization_label(),
        local_path: dir.to_path_buf(),
        hub_url: hub_base_url.map(|base| format!("{}/{}", base, reference)),
    })
}
