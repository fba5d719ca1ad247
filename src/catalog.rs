//! Catalog query adapter.
//!
//! Two lookup strategies against the external catalog service:
//! *issue-first* (volume search, then a concurrent per-volume issue fan-out)
//! when the query names an issue number, *volume-first* otherwise.
//!
//! This is a degrading boundary: an individual catalog failure becomes an
//! empty result for that call, logged at `warn`, never an error to the
//! caller. Only a total volume-search failure is reported (as a flag, not an
//! error) so the classifier can distinguish "search failed" from "no match".
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry with backoff (1s, 2s, ...)
//! - other 4xx → fail the call immediately
//! - network errors → retry

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::warn;

use crate::config::CatalogConfig;
use crate::models::{Candidate, ResourceKind, ScanQuery, ScoreBreakdown};

/// A series-level hit from the catalog's volume search.
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeHit {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub start_year: Option<i32>,
}

/// An issue-level hit from the catalog's issue search.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueHit {
    pub id: i64,
    pub issue_number: String,
    #[serde(default)]
    pub cover_date: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Read-only interface to the external catalog. The HTTP implementation
/// talks to the real service; tests substitute their own.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn search_volumes(&self, query: &str, limit: i64) -> Result<Vec<VolumeHit>>;
    async fn search_issues(
        &self,
        volume_id: i64,
        issue_number: &str,
        limit: i64,
    ) -> Result<Vec<IssueHit>>;
}

// ============ HTTP client ============

/// Catalog client over HTTP. The API credential comes from the environment
/// variable named in config and is resolved at construction — a missing
/// credential fails startup, not individual requests.
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!(
                "{} environment variable not set (catalog API credential)",
                config.api_key_env
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    async fn get_results<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        #[derive(Deserialize)]
        struct Envelope<T> {
            results: Vec<T>,
        }

        let url = format!("{}/{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .get(&url)
                .header("X-Api-Key", &self.api_key)
                .query(params)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let envelope: Envelope<T> = response.json().await?;
                        return Ok(envelope.results);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("catalog error {}: {}", status, body));
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    bail!("catalog error {}: {}", status, body);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("catalog request failed after retries")))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn search_volumes(&self, query: &str, limit: i64) -> Result<Vec<VolumeHit>> {
        self.get_results(
            "search_volumes",
            &[("query", query.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn search_issues(
        &self,
        volume_id: i64,
        issue_number: &str,
        limit: i64,
    ) -> Result<Vec<IssueHit>> {
        self.get_results(
            "search_issues",
            &[
                ("volume_id", volume_id.to_string()),
                ("issue_number", issue_number.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }
}

// ============ Candidate gathering ============

/// Which lookup strategy a resolution attempt used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    IssueFirst,
    VolumeFirst,
}

/// Unscored candidates plus degradation flags from one gathering pass.
#[derive(Debug)]
pub struct GatherOutcome {
    pub candidates: Vec<Candidate>,
    /// False when the volume search itself failed — the caller reports
    /// "search failed" instead of "no match found".
    pub catalog_ok: bool,
    pub strategy: SearchStrategy,
}

/// Run the strategy appropriate for the query and accumulate unscored
/// candidates. Never returns an error: every upstream failure degrades to
/// fewer (possibly zero) candidates.
pub async fn gather_candidates(
    catalog: Arc<dyn CatalogClient>,
    config: &CatalogConfig,
    query: &ScanQuery,
) -> GatherOutcome {
    let strategy = if query.issue_number.is_some() {
        SearchStrategy::IssueFirst
    } else {
        SearchStrategy::VolumeFirst
    };

    let volumes = match catalog
        .search_volumes(&query.title, config.volume_limit)
        .await
    {
        Ok(volumes) => volumes,
        Err(e) => {
            warn!(title = %query.title, error = %e, "volume search failed");
            return GatherOutcome {
                candidates: Vec::new(),
                catalog_ok: false,
                strategy,
            };
        }
    };

    let candidates = match &query.issue_number {
        Some(issue_number) => {
            issue_fan_out(catalog, config, volumes, issue_number.clone()).await
        }
        None => volumes.into_iter().map(volume_candidate).collect(),
    };

    GatherOutcome {
        candidates,
        catalog_ok: true,
        strategy,
    }
}

/// Query each volume for the requested issue number concurrently. The calls
/// are independent, idempotent GETs; completion order is irrelevant because
/// candidates are re-ranked by score (with a deterministic tie-break) after
/// collection. A failed per-volume query yields zero candidates for that
/// volume only.
async fn issue_fan_out(
    catalog: Arc<dyn CatalogClient>,
    config: &CatalogConfig,
    volumes: Vec<VolumeHit>,
    issue_number: String,
) -> Vec<Candidate> {
    let issue_limit = config.issue_limit;
    let mut tasks = JoinSet::new();

    for volume in volumes {
        let catalog = Arc::clone(&catalog);
        let issue_number = issue_number.clone();
        tasks.spawn(async move {
            match catalog
                .search_issues(volume.id, &issue_number, issue_limit)
                .await
            {
                Ok(issues) => (volume, issues),
                Err(e) => {
                    warn!(volume_id = volume.id, error = %e, "issue search failed");
                    (volume, Vec::new())
                }
            }
        });
    }

    let mut candidates = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((volume, issues)) => {
                for issue in issues {
                    candidates.push(issue_candidate(&volume, issue));
                }
            }
            Err(e) => warn!(error = %e, "issue search task panicked"),
        }
    }

    candidates
}

fn volume_candidate(volume: VolumeHit) -> Candidate {
    Candidate {
        source_id: format!("volume:{}", volume.id),
        resource_kind: ResourceKind::Volume,
        series_name: volume.name,
        issue_number: None,
        year: volume.start_year,
        publisher: volume.publisher,
        cover_image_ref: None,
        score: 0.0,
        breakdown: ScoreBreakdown::default(),
        rejected: false,
        reject_reason: None,
    }
}

fn issue_candidate(volume: &VolumeHit, issue: IssueHit) -> Candidate {
    // Issue payloads carry no publisher; it comes from the parent volume.
    let year = issue
        .cover_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<i32>().ok())
        .or(volume.start_year);

    Candidate {
        source_id: format!("issue:{}", issue.id),
        resource_kind: ResourceKind::Issue,
        series_name: volume.name.clone(),
        issue_number: Some(issue.issue_number),
        year,
        publisher: volume.publisher.clone(),
        cover_image_ref: issue.image,
        score: 0.0,
        breakdown: ScoreBreakdown::default(),
        rejected: false,
        reject_reason: None,
    }
}
