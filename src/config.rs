use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Environment variable holding the catalog API credential. Resolved
    /// when the HTTP client is constructed — a missing credential is a
    /// startup error, not a per-request one.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_volume_limit")]
    pub volume_limit: i64,
    #[serde(default = "default_issue_limit")]
    pub issue_limit: i64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_key_env() -> String {
    "CATALOG_API_KEY".to_string()
}
fn default_volume_limit() -> i64 {
    15
}
fn default_issue_limit() -> i64 {
    10
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolutionConfig {
    #[serde(default = "default_auto_resolve_threshold")]
    pub auto_resolve_threshold: f64,
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: f64,
    #[serde(default = "default_max_confirm_candidates")]
    pub max_confirm_candidates: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            auto_resolve_threshold: default_auto_resolve_threshold(),
            confirm_threshold: default_confirm_threshold(),
            max_confirm_candidates: default_max_confirm_candidates(),
        }
    }
}

fn default_auto_resolve_threshold() -> f64 {
    0.80
}
fn default_confirm_threshold() -> f64 {
    0.60
}
fn default_max_confirm_candidates() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.catalog.base_url.trim().is_empty() {
        anyhow::bail!("catalog.base_url must not be empty");
    }

    // Upstream caps: volume search accepts at most 20 results, issue search 10.
    if !(1..=20).contains(&config.catalog.volume_limit) {
        anyhow::bail!("catalog.volume_limit must be in [1, 20]");
    }
    if !(1..=10).contains(&config.catalog.issue_limit) {
        anyhow::bail!("catalog.issue_limit must be in [1, 10]");
    }

    let res = &config.resolution;
    if !(0.0..=1.0).contains(&res.auto_resolve_threshold) {
        anyhow::bail!("resolution.auto_resolve_threshold must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&res.confirm_threshold) {
        anyhow::bail!("resolution.confirm_threshold must be in [0.0, 1.0]");
    }
    if res.confirm_threshold > res.auto_resolve_threshold {
        anyhow::bail!(
            "resolution.confirm_threshold must not exceed auto_resolve_threshold"
        );
    }
    if res.max_confirm_candidates < 1 {
        anyhow::bail!("resolution.max_confirm_candidates must be >= 1");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}
