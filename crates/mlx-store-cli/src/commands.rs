//! Subcommand implementations.

use anyhow::{Context, Result};
use mlx_store::{BundleMetadata, CancellationToken, FetchProgress, ModelStore};
use tracing::info;

pub fn list(store: &ModelStore, json: bool) -> Result<()> {
    let bundles = store.list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&bundles)?);
        return Ok(());
    }

    if bundles.is_empty() {
        println!("No MLX models in {}", store.cache_root().display());
        println!("Try `mlx-store popular` for suggestions.");
        return Ok(());
    }

    println!("{:<56} {:>10}  {}", "NAME", "SIZE", "MODIFIED");
    for bundle in &bundles {
        println!(
            "{:<56} {:>10}  {}",
            bundle.name,
            format_size(bundle.size),
            bundle.modified_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub fn show(store: &ModelStore, reference: &str, json: bool) -> Result<()> {
    let meta = store
        .metadata(reference)
        .with_context(|| format!("cannot show {}", reference))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
    } else {
        print!("{}", describe(&meta));
    }
    Ok(())
}

pub async fn pull(store: &ModelStore, reference: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current file...");
            on_interrupt.cancel();
        }
    });

    let progress = |p: &FetchProgress| eprintln!("[{:>3}%] {}", p.percent, p.status);
    let pulled = store
        .pull(reference, &progress, &cancel)
        .await
        .with_context(|| format!("failed to pull {}", reference))?;

    info!("{} ready at {}", pulled, store.resolve_path(&pulled).display());
    println!("{}", store.resolve_path(&pulled).display());
    Ok(())
}

pub async fn remove(store: &ModelStore, reference: &str) -> Result<()> {
    let existed = store.exists(reference);
    store
        .delete(reference)
        .await
        .with_context(|| format!("failed to remove {}", reference))?;
    if existed {
        println!("deleted {}", reference);
    } else {
        println!("{} was not cached", reference);
    }
    Ok(())
}

pub async fn search(store: &ModelStore, query: &str, limit: usize, json: bool) -> Result<()> {
    let hits = store.search(query, limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No MLX models match {:?}", query);
        return Ok(());
    }
    println!("{:<64} {:>10} {:>6}", "NAME", "DOWNLOADS", "LIKES");
    for hit in &hits {
        println!("{:<64} {:>10} {:>6}", hit.id, hit.downloads, hit.likes);
    }
    Ok(())
}

fn describe(meta: &BundleMetadata) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: &str| out.push_str(&format!("{:<14}{}\n", label, value));

    line("name", &meta.name);
    line("format", &meta.format);
    line("size", &format_size(meta.size));
    line("modified", &meta.modified_at.to_rfc3339());
    line("id", &meta.digest);
    if let Some(family) = &meta.family {
        line("family", family);
    }
    if let Some(size) = &meta.parameter_size {
        line("parameters", size);
    }
    if let Some(quant) = &meta.quantization_level {
        line("quantization", quant);
    }
    line("path", &meta.local_path.display().to_string());
    if let Some(url) = &meta.hub_url {
        line("hub", url);
    }
    out
}

/// Human-readable byte count using decimal units.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlx_store::StoreConfig;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(999), "999 B");
        assert_eq!(format_size(1_500), "1.5 KB");
        assert_eq!(format_size(4_200_000_000), "4.2 GB");
    }

    #[test]
    fn test_describe_cached_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::new(StoreConfig::new(temp_dir.path())).unwrap();
        let dir = store.resolve_path("org/model");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), r#"{"architectures": ["MistralForCausalLM"]}"#)
            .unwrap();
        std::fs::write(dir.join("weights.npz"), vec![0u8; 10]).unwrap();

        let text = describe(&store.metadata("org/model").unwrap());
        assert!(text.contains("MistralForCausalLM"));
        assert!(text.contains("MLX"));
        assert!(text.contains("https://huggingface.co/org/model"));
        assert!(!text.contains("quantization"));
    }

    #[test]
    fn test_show_missing_bundle_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::new(StoreConfig::new(temp_dir.path())).unwrap();
        assert!(show(&store, "org/none", false).is_err());
    }
}
