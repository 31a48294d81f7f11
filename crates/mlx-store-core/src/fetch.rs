//! Sequential multi-file fetch of a bundle into its cache directory.
//!
//! Files are downloaded strictly in manifest order, one at a time, straight
//! into the final bundle directory. Each file streams into a sibling `.part`
//! file that is renamed over the final name only once complete. A failed
//! required file, a cancellation, or a dropped fetch future removes the whole
//! directory, including anything that was there before the fetch started.

use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use crate::error::{Result, StoreError};
use crate::manifest::{DownloadManifest, ManifestEntry};
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Progress notification emitted during a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProgress {
    pub reference: String,
    /// Human-readable status, e.g. `downloaded config.json`.
    pub status: String,
    /// Whole percent of manifest files attempted so far; never decreases.
    pub percent: u8,
    /// File the notification concerns, if any.
    pub filename: Option<String>,
}

/// Progress callback. Invoked synchronously on the fetching task, so it must
/// return quickly; callers wanting async delivery should buffer internally.
pub type ProgressCallback<'a> = &'a (dyn Fn(&FetchProgress) + Send + Sync);

/// `100 * attempted / total`, rounded to the nearest whole percent.
pub fn percent_complete(attempted: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let attempted = attempted.min(total);
    ((attempted as f64 * 100.0) / total as f64).round() as u8
}

/// Removes the bundle directory on drop unless disarmed.
///
/// Covers a fetch future dropped mid-download; failures returned from
/// [`Fetcher::fetch`] are rolled back asynchronously instead.
struct RollbackGuard {
    dir: PathBuf,
    armed: bool,
}

impl RollbackGuard {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("Rolled back {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to roll back {}: {}", self.dir.display(), e),
        }
    }
}

/// Downloads manifest files for one reference at a time.
#[derive(Debug, Clone)]
pub struct Fetcher {
    /// Connect timeout only: a total timeout would kill multi-gigabyte files.
    client: Client,
    hub_base_url: String,
}

impl Fetcher {
    pub fn new(client: Client, hub_base_url: impl Into<String>) -> Self {
        Self {
            client,
            hub_base_url: hub_base_url.into(),
        }
    }

    /// Remote URL of one bundle file.
    pub fn file_url(&self, reference: &str, filename: &str) -> String {
        format!("{}/{}/resolve/main/{}", self.hub_base_url, reference, filename)
    }

    /// Fetch every manifest file for `reference` into `dest_dir`.
    ///
    /// Required files must all succeed; optional failures are reported through
    /// `progress` and skipped. On error the directory is removed.
    pub async fn fetch(
        &self,
        reference: &str,
        dest_dir: &Path,
        manifest: &DownloadManifest,
        progress: ProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| StoreError::io_with_path(e, dest_dir))?;
        // Only fires if this future is dropped mid-fetch.
        let mut guard = RollbackGuard::new(dest_dir);

        let total = manifest.len();
        info!(
            "Fetching {} ({} file{}) into {}",
            reference,
            total,
            if total == 1 { "" } else { "s" },
            dest_dir.display()
        );

        let notify = |status: String, attempted: usize, filename: Option<&str>| {
            progress(&FetchProgress {
                reference: reference.to_string(),
                status,
                percent: percent_complete(attempted, total),
                filename: filename.map(str::to_string),
            });
        };

        let result = self
            .fetch_files(reference, dest_dir, manifest, &notify, cancel)
            .await;
        if let Err(e) = result {
            rollback(dest_dir).await;
            guard.disarm();
            return Err(e);
        }

        guard.disarm();
        info!("Fetched {} into {}", reference, dest_dir.display());
        notify("download complete".to_string(), total, None);
        Ok(())
    }

    async fn fetch_files(
        &self,
        reference: &str,
        dest_dir: &Path,
        manifest: &DownloadManifest,
        notify: &(dyn Fn(String, usize, Option<&str>) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<()> {
        for (attempted, entry) in manifest.entries().iter().enumerate() {
            cancel.check()?;

            let ManifestEntry { filename, required } = entry;
            notify(format!("downloading {}", filename), attempted, Some(filename.as_str()));

            let url = self.file_url(reference, filename);
            match self.download_file(&url, &dest_dir.join(filename)).await {
                Ok(bytes) => {
                    debug!("Downloaded {}/{} ({} bytes)", reference, filename, bytes);
                    notify(format!("downloaded {}", filename), attempted + 1, Some(filename.as_str()));
                }
                Err(e) if *required => {
                    return Err(StoreError::RequiredFile {
                        filename: filename.clone(),
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!("Skipping optional file {}/{}: {}", reference, filename, e);
                    notify(
                        format!("skipped {}: {}", filename, e),
                        attempted + 1,
                        Some(filename.as_str()),
                    );
                }
            }
        }
        Ok(())
    }

    /// Stream `url` into `dest_path` via a `.part` sibling, returning the byte count.
    ///
    /// The temp file is removed on any failure.
    async fn download_file(&self, url: &str, dest_path: &Path) -> Result<u64> {
        let part_path = part_path_for(dest_path);
        let result = self.stream_to(url, &part_path).await;

        match result {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::rename(&part_path, dest_path).await {
                    let _ = tokio::fs::remove_file(&part_path).await;
                    return Err(StoreError::io_with_path(e, dest_path));
                }
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, part_path: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let expected = response.content_length();
        let mut file = tokio::fs::File::create(part_path)
            .await
            .map_err(|e| StoreError::io_with_path(e, part_path))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| StoreError::io_with_path(e, part_path))?;
            downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| StoreError::io_with_path(e, part_path))?;
        drop(file);

        if let Some(total) = expected {
            if downloaded != total {
                return Err(StoreError::Network {
                    message: format!("Incomplete download: got {} of {} bytes", downloaded, total),
                    cause: None,
                });
            }
        }

        Ok(downloaded)
    }
}

/// Remove a failed fetch's directory without blocking the runtime.
async fn rollback(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Rolled back {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to roll back {}: {}", dir.display(), e),
    }
}

fn part_path_for(dest_path: &Path) -> PathBuf {
    let mut name = dest_path.as_os_str().to_os_string();
    name.push(NetworkConfig::DOWNLOAD_TEMP_SUFFIX);
    PathBuf::from(name)
}
