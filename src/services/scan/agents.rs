//! Agent fan-out (§4.4 Scan Pipeline, agent-fanout stage).
//!
//! Each item runs its configured agent order (local/sidecar first, then embedded, then remote)
//! with a global cap of 3 concurrent remote calls — a `tokio::sync::Semaphore` rather than a
//! bounded channel, since "at most N in flight" across arbitrarily many items is exactly what a
//! semaphore models. Per-agent rate limiting reuses the reference stack's governor+backoff
//! `RateLimitedClient`; identical rate limiters are shared across calls to the same agent so two
//! items in flight at once never double its effective quota.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::credits::{GroupCredit, PersonCredit};
use crate::services::rate_limiter::{retry_async, RateLimitConfig, RateLimitedClient, RetryConfig};

pub const MAX_CONCURRENT_REMOTE_CALLS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentCategory {
    Local,
    Sidecar,
    Embedded,
    Remote,
}

/// Whatever fields one agent could fill in for an item, plus any image candidates and credits it
/// surfaced. Fields are `Option`/empty-`Vec` so the refresh orchestrator applies only what this
/// particular agent actually supplied.
#[derive(Debug, Clone, Default)]
pub struct AgentPayload {
    pub summary: Option<String>,
    pub tagline: Option<String>,
    pub content_rating: Option<String>,
    pub external_ids: HashMap<String, String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub people: Vec<PersonCredit>,
    pub groups: Vec<GroupCredit>,
}

/// A metadata source. Implementations are expected to surface a retryable condition (429/5xx) as
/// `Err` and a definitive "no such item" (4xx) as `Ok(None)` — fan-out's retry wrapper treats
/// every `Err` as retryable, so that distinction has to be made at this layer.
#[async_trait]
pub trait MetadataAgent: Send + Sync {
    fn name(&self) -> &str;
    fn category(&self) -> AgentCategory;
    async fn fetch(&self, client: &RateLimitedClient, title: &str, year: Option<i64>) -> Result<Option<AgentPayload>>;
}

/// Shares one `RateLimitedClient` per agent name across every call site, so rate limiting is
/// scoped per agent rather than per request or per item.
#[derive(Clone, Default)]
pub struct AgentClientFactory {
    clients: Arc<DashMap<String, Arc<RateLimitedClient>>>,
}

impl AgentClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_for(&self, agent_name: &str, config: RateLimitConfig) -> Arc<RateLimitedClient> {
        self.clients
            .entry(agent_name.to_string())
            .or_insert_with(|| Arc::new(RateLimitedClient::new(agent_name, config)))
            .clone()
    }
}

/// Runs `agents` in configured order for one item. Remote agents acquire a permit from the
/// shared `remote_semaphore` (sized [`MAX_CONCURRENT_REMOTE_CALLS`]) before calling out; a
/// failing agent is logged and skipped so one bad agent never aborts the item.
pub async fn fan_out(
    agents: &[Arc<dyn MetadataAgent>],
    client_factory: &AgentClientFactory,
    remote_semaphore: &Semaphore,
    title: &str,
    year: Option<i64>,
) -> Vec<(String, AgentPayload)> {
    let mut results = Vec::new();

    for agent in agents {
        let client = client_factory.client_for(agent.name(), RateLimitConfig::default());

        let _permit = if agent.category() == AgentCategory::Remote {
            match remote_semaphore.acquire().await {
                Ok(permit) => Some(permit),
                Err(_) => continue,
            }
        } else {
            None
        };

        let outcome = retry_async(
            || agent.fetch(&client, title, year),
            &RetryConfig::default(),
            agent.name(),
        )
        .await;

        match outcome {
            Ok(Some(payload)) => results.push((agent.name().to_string(), payload)),
            Ok(None) => debug!(agent = agent.name(), "agent returned no match"),
            Err(e) => warn!(agent = agent.name(), error = %e, "agent fetch failed after retries, skipping"),
        }
    }

    results
}

/// Reads a JSON sidecar (`<part-stem>.nexa.json`) next to the media file, if present. Grounded
/// in §4.4's "local/sidecar first" precedence — a sidecar is authoritative and never rate
/// limited, so it always runs before embedded or remote agents regardless of configured order.
pub struct SidecarAgent {
    part_path: String,
}

impl SidecarAgent {
    pub fn new(part_path: impl Into<String>) -> Self {
        Self { part_path: part_path.into() }
    }

    fn sidecar_path(&self) -> std::path::PathBuf {
        let path = std::path::Path::new(&self.part_path);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        path.with_file_name(format!("{stem}.nexa.json"))
    }
}

#[derive(Debug, Deserialize, Default)]
struct SidecarDocument {
    summary: Option<String>,
    tagline: Option<String>,
    content_rating: Option<String>,
    #[serde(default)]
    external_ids: HashMap<String, String>,
    poster_url: Option<String>,
    backdrop_url: Option<String>,
}

#[async_trait]
impl MetadataAgent for SidecarAgent {
    fn name(&self) -> &str {
        "sidecar"
    }

    fn category(&self) -> AgentCategory {
        AgentCategory::Sidecar
    }

    async fn fetch(&self, _client: &RateLimitedClient, _title: &str, _year: Option<i64>) -> Result<Option<AgentPayload>> {
        let sidecar = self.sidecar_path();
        let raw = match tokio::fs::read_to_string(&sidecar).await {
            Ok(raw) => raw,
            Err(_) => return Ok(None),
        };

        let doc: SidecarDocument = serde_json::from_str(&raw)?;
        Ok(Some(AgentPayload {
            summary: doc.summary,
            tagline: doc.tagline,
            content_rating: doc.content_rating,
            external_ids: doc.external_ids,
            poster_url: doc.poster_url,
            backdrop_url: doc.backdrop_url,
            people: Vec::new(),
            groups: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sidecar_agent_returns_none_when_no_sidecar_present() {
        let tmp = tempfile::tempdir().unwrap();
        let part_path = tmp.path().join("Movie.mkv");
        tokio::fs::write(&part_path, b"data").await.unwrap();

        let agent = SidecarAgent::new(part_path.to_string_lossy().to_string());
        let client = RateLimitedClient::new("sidecar", RateLimitConfig::default());
        let result = agent.fetch(&client, "Movie", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn sidecar_agent_reads_fields_from_json_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let part_path = tmp.path().join("Movie.mkv");
        tokio::fs::write(&part_path, b"data").await.unwrap();
        tokio::fs::write(
            tmp.path().join("Movie.nexa.json"),
            r#"{"summary": "A dream within a dream.", "external_ids": {"tmdb": "27205"}}"#,
        )
        .await
        .unwrap();

        let agent = SidecarAgent::new(part_path.to_string_lossy().to_string());
        let client = RateLimitedClient::new("sidecar", RateLimitConfig::default());
        let payload = agent.fetch(&client, "Movie", None).await.unwrap().unwrap();
        assert_eq!(payload.summary.as_deref(), Some("A dream within a dream."));
        assert_eq!(payload.external_ids.get("tmdb").map(String::as_str), Some("27205"));
    }

    #[test]
    fn client_factory_reuses_client_for_same_agent_name() {
        let factory = AgentClientFactory::new();
        let a = factory.client_for("tmdb", RateLimitConfig::default());
        let b = factory.client_for("tmdb", RateLimitConfig::default());
        assert!(Arc::ptr_eq(&a, &b));
    }
}
