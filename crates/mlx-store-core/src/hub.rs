//! Remote hub search.
//!
//! Queries the hub's model listing endpoint for MLX bundles. No retries and
//! no local state: failures go straight back to the caller.

use crate::config::NetworkConfig;
use crate::error::{Result, StoreError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One search hit from the hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteSummary {
    pub id: String,
    pub author: Option<String>,
    /// Popularity signal reported by the hub.
    pub downloads: u64,
    pub likes: u64,
    pub tags: Vec<String>,
    pub last_modified: Option<String>,
}

/// Raw listing entry. The hub sends both `id` and the older `modelId`.
#[derive(Debug, Deserialize)]
struct HubModelEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "modelId")]
    model_id: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    likes: u64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, rename = "lastModified")]
    last_modified: Option<String>,
}

impl HubModelEntry {
    fn into_summary(self) -> Option<RemoteSummary> {
        let id = self.id.or(self.model_id).filter(|id| !id.is_empty())?;
        let author = self
            .author
            .or_else(|| id.split_once('/').map(|(owner, _)| owner.to_string()));
        Some(RemoteSummary {
            id,
            author,
            downloads: self.downloads,
            likes: self.likes,
            tags: self.tags,
            last_modified: self.last_modified,
        })
    }
}

/// Parse a listing payload, dropping entries without an id.
fn parse_listing(body: &str) -> Result<Vec<RemoteSummary>> {
    let entries: Vec<HubModelEntry> = serde_json::from_str(body).map_err(|e| StoreError::Network {
        message: format!("Failed to parse hub search response: {}", e),
        cause: None,
    })?;
    Ok(entries
        .into_iter()
        .filter_map(HubModelEntry::into_summary)
        .collect())
}

/// Client for the hub's search API.
#[derive(Debug, Clone)]
pub struct HubClient {
    client: Client,
    api_base_url: String,
}

impl HubClient {
    pub fn new(client: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into(),
        }
    }

    /// Search for MLX bundles matching `query`, returning at most `limit` hits
    /// in the order the hub ranks them.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<RemoteSummary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/models?search={}&filter={}&limit={}",
            self.api_base_url,
            urlencoding::encode(query),
            NetworkConfig::SEARCH_FILTER_TAG,
            limit
        );
        debug!("Searching hub: {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let mut results = parse_listing(&body)?;

        results.truncate(limit);
        Ok(results)
    }
}

/// Curated bundles known to work well, for first-run suggestions.
pub fn popular_models() -> &'static [&'static str] {
    &[
        "mlx-community/Llama-3.2-3B-Instruct-4bit",
        "mlx-community/Llama-3.2-1B-Instruct-4bit",
        "mlx-community/Mistral-7B-Instruct-v0.3-4bit",
        "mlx-community/Qwen2.5-7B-Instruct-4bit",
        "mlx-community/SmolLM2-1.7B-Instruct-4bit",
        "mlx-community/Phi-3.5-mini-instruct-4bit",
        "mlx-community/gemma-2-2b-it-4bit",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_accepts_hub_payload() {
        let payload = r#"[
            {"_id": "x", "id": "mlx-community/tiny", "modelId": "mlx-community/tiny",
             "downloads": 42, "likes": 3, "tags": ["mlx", "safetensors"],
             "lastModified": "2024-10-01T00:00:00.000Z"},
            {"modelId": "someone/other-mlx", "author": "someone-else"},
            {"downloads": 7}
        ]"#;
        let parsed = parse_listing(payload).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "mlx-community/tiny");
        assert_eq!(parsed[0].downloads, 42);
        assert_eq!(parsed[0].author.as_deref(), Some("mlx-community"));
        assert_eq!(parsed[1].id, "someone/other-mlx");
        assert_eq!(parsed[1].author.as_deref(), Some("someone-else"));
        assert!(parsed[1].tags.is_empty());
        assert_eq!(parsed[1].last_modified, None);
    }

    #[test]
    fn test_parse_listing_rejects_non_list() {
        assert!(parse_listing(r#"{"error": "bad"}"#).is_err());
    }

    #[test]
    fn test_popular_models_are_bundle_references() {
        assert!(popular_models()
            .iter()
            .all(|r| crate::reference::looks_like_bundle_reference(r)));
    }
}
