//! End-to-end resolution tests against a mock catalog and a scratch SQLite
//! database. The catalog sits behind the `CatalogClient` trait, so no
//! network is involved.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use scan_resolver::catalog::{CatalogClient, IssueHit, VolumeHit};
use scan_resolver::config::{
    CatalogConfig, Config, DbConfig, ResolutionConfig, ServerConfig,
};
use scan_resolver::models::{
    CorrectionRecord, NoMatchReason, PublisherFilter, Resolution, ResourceKind, ScanContext,
    SelectedItem,
};
use scan_resolver::resolve::{self, ResolveOptions};
use scan_resolver::{corrections, db, migrate, normalize};

// ============ Fixtures ============

/// In-memory catalog: volumes plus issues keyed by (volume_id, issue_number).
/// `fail_all` simulates a catalog outage; `calls` counts network traffic.
#[derive(Default)]
struct MockCatalog {
    volumes: Vec<VolumeHit>,
    issues: HashMap<(i64, String), Vec<IssueHit>>,
    fail_all: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn search_volumes(&self, _query: &str, limit: i64) -> Result<Vec<VolumeHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all {
            bail!("connection timed out");
        }
        Ok(self.volumes.iter().take(limit as usize).cloned().collect())
    }

    async fn search_issues(
        &self,
        volume_id: i64,
        issue_number: &str,
        _limit: i64,
    ) -> Result<Vec<IssueHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all {
            bail!("connection timed out");
        }
        Ok(self
            .issues
            .get(&(volume_id, issue_number.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

fn volume(id: i64, name: &str, publisher: &str, start_year: i32) -> VolumeHit {
    VolumeHit {
        id,
        name: name.to_string(),
        publisher: Some(publisher.to_string()),
        start_year: Some(start_year),
    }
}

fn issue(id: i64, number: &str, cover_date: &str) -> IssueHit {
    IssueHit {
        id,
        issue_number: number.to_string(),
        cover_date: Some(cover_date.to_string()),
        image: None,
    }
}

/// A catalog holding "The Amazing Spider-Man" (Marvel) with issue 300 and
/// the "Spawn" volume (Image).
fn marvel_catalog() -> MockCatalog {
    let mut issues = HashMap::new();
    issues.insert(
        (1, "300".to_string()),
        vec![issue(901, "300", "1988-05-01")],
    );
    MockCatalog {
        volumes: vec![
            volume(1, "The Amazing Spider-Man", "Marvel", 1963),
            volume(2, "Spawn", "Image", 1992),
        ],
        issues,
        ..Default::default()
    }
}

fn test_config(db_path: PathBuf) -> Config {
    Config {
        db: DbConfig { path: db_path },
        catalog: CatalogConfig {
            base_url: "http://catalog.invalid".to_string(),
            api_key_env: "CATALOG_API_KEY".to_string(),
            volume_limit: 15,
            issue_limit: 10,
            timeout_secs: 5,
            max_retries: 0,
        },
        resolution: ResolutionConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}

async fn setup() -> (TempDir, SqlitePool, Config) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path().join("scanr.sqlite"));
    let pool = db::connect(&config.db.path).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (tmp, pool, config)
}

// ============ Scenarios ============

// Scenario A: issue-first, full title + exact issue, no publisher hint.
// 0.40 (title) + 0 + 0.30 (issue) = 0.70, no bonus -> confirmation band.
#[tokio::test]
async fn scenario_a_issue_match_without_hint_needs_confirmation() {
    let (_tmp, pool, config) = setup().await;
    let catalog = Arc::new(marvel_catalog());

    let outcome = resolve::resolve_scan(
        &pool,
        catalog,
        &config,
        "Amazing Spider-Man #300",
        &ResolveOptions::default(),
    )
    .await;

    match outcome.resolution {
        Resolution::NeedsConfirmation { candidates } => {
            assert_eq!(candidates.len(), 1);
            let top = &candidates[0];
            assert!((top.candidate.score - 0.70).abs() < 1e-9);
            assert_eq!(top.candidate.series_name, "The Amazing Spider-Man");
            assert!(top
                .signals
                .iter()
                .any(|s| s.label() == "exact-issue"));
        }
        other => panic!("expected NeedsConfirmation, got {:?}", other),
    }
}

// Scenario B: same input with a matching publisher hint. All three factors
// agree: +0.10 bonus, capped at 0.98 -> auto-resolved.
#[tokio::test]
async fn scenario_b_publisher_hint_auto_resolves() {
    let (_tmp, pool, config) = setup().await;
    let catalog = Arc::new(marvel_catalog());

    let options = ResolveOptions {
        publisher_hint: Some("Marvel".to_string()),
        ..Default::default()
    };
    let outcome =
        resolve::resolve_scan(&pool, catalog, &config, "Amazing Spider-Man #300", &options)
            .await;

    match outcome.resolution {
        Resolution::AutoResolved {
            candidate,
            confidence,
        } => {
            assert!((candidate.score - 0.98).abs() < 1e-9);
            assert!((confidence - 98.0).abs() < 1e-9);
        }
        other => panic!("expected AutoResolved, got {:?}", other),
    }
}

// Scenario C: no issue number -> volume-first; exact title = 0.70 which is
// below the 0.80 auto threshold.
#[tokio::test]
async fn scenario_c_volume_first_needs_confirmation() {
    let (_tmp, pool, config) = setup().await;
    let catalog = Arc::new(marvel_catalog());

    let outcome = resolve::resolve_scan(
        &pool,
        catalog,
        &config,
        "Spawn",
        &ResolveOptions::default(),
    )
    .await;

    match outcome.resolution {
        Resolution::NeedsConfirmation { candidates } => {
            let top = &candidates[0];
            assert_eq!(top.candidate.resource_kind, ResourceKind::Volume);
            assert_eq!(top.candidate.issue_number, None);
            assert!((top.candidate.score - 0.70).abs() < 1e-9);
        }
        other => panic!("expected NeedsConfirmation, got {:?}", other),
    }
}

// Scenario D: a confirmed pick for "batman 423" replays at confidence 100
// for "Batman #423" — same normalized key, no catalog call at all.
#[tokio::test]
async fn scenario_d_correction_replay_skips_catalog() {
    let (_tmp, pool, config) = setup().await;

    let selected = SelectedItem {
        source_id: "issue:777".to_string(),
        resource_kind: ResourceKind::Issue,
        series_name: "Batman".to_string(),
        issue_number: Some("423".to_string()),
        year: Some(1988),
        publisher: Some("DC Comics".to_string()),
        cover_image_ref: None,
    };
    let confirmed = resolve::confirm_selection(&pool, "batman 423", selected, 0.70).await;
    assert!(matches!(
        confirmed,
        Resolution::AutoResolved { confidence, .. } if confidence == 100.0
    ));

    // A broken catalog proves the replay path never touches it.
    let catalog = Arc::new(MockCatalog {
        fail_all: true,
        ..Default::default()
    });
    let calls_before = catalog.calls.load(Ordering::SeqCst);

    let outcome = resolve::resolve_scan(
        &pool,
        Arc::clone(&catalog) as Arc<dyn CatalogClient>,
        &config,
        "Batman #423",
        &ResolveOptions::default(),
    )
    .await;

    match outcome.resolution {
        Resolution::AutoResolved {
            candidate,
            confidence,
        } => {
            assert_eq!(confidence, 100.0);
            assert_eq!(candidate.series_name, "Batman");
            assert_eq!(candidate.source_id, "issue:777");
        }
        other => panic!("expected AutoResolved replay, got {:?}", other),
    }
    assert_eq!(
        catalog.calls.load(Ordering::SeqCst),
        calls_before,
        "correction replay must not hit the catalog"
    );
}

// Scenario E: total catalog outage degrades to NoMatch(search_failed),
// never an error.
#[tokio::test]
async fn scenario_e_catalog_outage_degrades_to_no_match() {
    let (_tmp, pool, config) = setup().await;
    let catalog = Arc::new(MockCatalog {
        fail_all: true,
        ..Default::default()
    });

    let outcome = resolve::resolve_scan(
        &pool,
        catalog,
        &config,
        "Amazing Spider-Man #300",
        &ResolveOptions::default(),
    )
    .await;

    assert!(matches!(
        outcome.resolution,
        Resolution::NoMatch {
            reason: NoMatchReason::SearchFailed
        }
    ));
}

// ============ Further pipeline behavior ============

#[tokio::test]
async fn most_recent_correction_wins() {
    let (_tmp, pool, config) = setup().await;

    let first = SelectedItem {
        source_id: "issue:1".to_string(),
        resource_kind: ResourceKind::Issue,
        series_name: "Batman".to_string(),
        issue_number: Some("423".to_string()),
        year: None,
        publisher: None,
        cover_image_ref: None,
    };
    let mut second = first.clone();
    second.source_id = "issue:2".to_string();

    resolve::confirm_selection(&pool, "batman 423", first, 0.6).await;
    // Timestamps carry millisecond precision; a short gap is enough for the
    // second record to be strictly newer.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    resolve::confirm_selection(&pool, "Batman #423", second, 0.6).await;

    let catalog = Arc::new(MockCatalog::default());
    let outcome = resolve::resolve_scan(
        &pool,
        catalog,
        &config,
        "BATMAN  423",
        &ResolveOptions::default(),
    )
    .await;

    match outcome.resolution {
        Resolution::AutoResolved { candidate, .. } => {
            assert_eq!(candidate.source_id, "issue:2");
        }
        other => panic!("expected AutoResolved, got {:?}", other),
    }
}

#[tokio::test]
async fn corrections_within_the_same_second_order_by_millisecond() {
    use chrono::{Duration, TimeZone, Utc};

    let (_tmp, pool, _config) = setup().await;

    // Both records land inside one wall-clock second, and the older one gets
    // an id that sorts after the newer one. Only millisecond-precision
    // timestamps keep the newer record winning.
    let base = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
    let older = CorrectionRecord {
        id: "ffffffff-ffff-4fff-8fff-ffffffffffff".parse().unwrap(),
        normalized_key: "batman 423".to_string(),
        source_raw_input: "batman 423".to_string(),
        selected: SelectedItem {
            source_id: "issue:old".to_string(),
            resource_kind: ResourceKind::Issue,
            series_name: "Batman".to_string(),
            issue_number: Some("423".to_string()),
            year: None,
            publisher: None,
            cover_image_ref: None,
        },
        original_confidence: 0.6,
        created_at: base,
    };
    let mut newer = older.clone();
    newer.id = "00000000-0000-4000-8000-000000000000".parse().unwrap();
    newer.selected.source_id = "issue:new".to_string();
    newer.created_at = base + Duration::milliseconds(800);

    corrections::record(&pool, &older).await.unwrap();
    corrections::record(&pool, &newer).await.unwrap();

    let hit = corrections::lookup(&pool, "batman 423")
        .await
        .unwrap()
        .expect("expected a stored correction");
    assert_eq!(hit.selected.source_id, "issue:new");
}

#[tokio::test]
async fn reported_wrong_candidate_is_never_reoffered() {
    let (_tmp, pool, config) = setup().await;
    let catalog = Arc::new(marvel_catalog());

    let options = ResolveOptions {
        reported_wrong_source_id: Some("issue:901".to_string()),
        diagnostics: true,
        ..Default::default()
    };
    let outcome =
        resolve::resolve_scan(&pool, catalog, &config, "Amazing Spider-Man #300", &options)
            .await;

    // The only candidate was the reported one, so nothing is offerable.
    assert!(matches!(
        outcome.resolution,
        Resolution::NoMatch {
            reason: NoMatchReason::NoCandidates
        }
    ));

    let report = outcome.diagnostics.expect("diagnostics requested");
    let rejected = report
        .candidates
        .iter()
        .find(|c| c.source_id == "issue:901")
        .expect("reported candidate still visible in diagnostics");
    assert!(rejected.rejected);
    assert_eq!(rejected.reject_reason.as_deref(), Some("reported wrong match"));
}

#[tokio::test]
async fn bias_filter_reorders_without_dropping() {
    let (_tmp, pool, config) = setup().await;
    // Two volumes both matching the title; the DC one scores no better but
    // the filter moves it to the front.
    let catalog = Arc::new(MockCatalog {
        volumes: vec![
            volume(10, "Legends", "Marvel", 2001),
            volume(11, "Legends", "DC Comics", 1986),
        ],
        ..Default::default()
    });

    let options = ResolveOptions {
        context: ScanContext {
            publisher_filter: Some(PublisherFilter::Dc),
            format: Default::default(),
        },
        ..Default::default()
    };
    let outcome = resolve::resolve_scan(&pool, catalog, &config, "Legends", &options).await;

    match outcome.resolution {
        Resolution::NeedsConfirmation { candidates } => {
            assert_eq!(candidates.len(), 2, "bias never drops candidates");
            assert_eq!(candidates[0].candidate.publisher.as_deref(), Some("DC Comics"));
        }
        other => panic!("expected NeedsConfirmation, got {:?}", other),
    }
}

#[tokio::test]
async fn publisher_filter_front_candidate_gates_classification() {
    let (_tmp, pool, config) = setup().await;
    // Without the filter the Marvel issue scores 0.98 and auto-resolves.
    // A DC filter moves the 0.70 DC issue to the front, and the outcome
    // follows the presented ranking into the confirmation band.
    let mut issues = HashMap::new();
    issues.insert((1, "300".to_string()), vec![issue(901, "300", "1988-05-01")]);
    issues.insert((3, "300".to_string()), vec![issue(903, "300", "1990-07-01")]);
    let catalog = Arc::new(MockCatalog {
        volumes: vec![
            volume(1, "The Amazing Spider-Man", "Marvel", 1963),
            volume(3, "Amazing Spider-Man Annual", "DC Comics", 1964),
        ],
        issues,
        ..Default::default()
    });

    let options = ResolveOptions {
        publisher_hint: Some("Marvel".to_string()),
        context: ScanContext {
            publisher_filter: Some(PublisherFilter::Dc),
            format: Default::default(),
        },
        ..Default::default()
    };
    let outcome = resolve::resolve_scan(
        &pool,
        catalog,
        &config,
        "Amazing Spider-Man #300",
        &options,
    )
    .await;

    match outcome.resolution {
        Resolution::NeedsConfirmation { candidates } => {
            assert_eq!(candidates.len(), 2);
            let front = &candidates[0].candidate;
            assert_eq!(front.publisher.as_deref(), Some("DC Comics"));
            assert!((front.score - 0.70).abs() < 1e-9);
            // The higher-scored Marvel match stays on offer, just not first.
            let second = &candidates[1].candidate;
            assert_eq!(second.source_id, "issue:901");
            assert!((second.score - 0.98).abs() < 1e-9);
        }
        other => panic!("expected NeedsConfirmation, got {:?}", other),
    }
}

#[tokio::test]
async fn diagnostics_absent_unless_requested() {
    let (_tmp, pool, config) = setup().await;
    let catalog = Arc::new(marvel_catalog());

    let outcome = resolve::resolve_scan(
        &pool,
        Arc::clone(&catalog) as Arc<dyn CatalogClient>,
        &config,
        "Spawn",
        &ResolveOptions::default(),
    )
    .await;
    assert!(outcome.diagnostics.is_none());

    let options = ResolveOptions {
        diagnostics: true,
        ..Default::default()
    };
    let with_report =
        resolve::resolve_scan(&pool, catalog, &config, "Spawn", &options).await;
    let report = with_report.diagnostics.expect("diagnostics requested");
    assert_eq!(report.normalized_key, normalize::normalize_key("Spawn"));
    assert!(!report.correction_hit);
    assert!(report.catalog_ok);
}

#[tokio::test]
async fn unrelated_candidates_are_rejected_with_reason() {
    let (_tmp, pool, config) = setup().await;
    let catalog = Arc::new(MockCatalog {
        volumes: vec![volume(20, "Completely Unrelated", "Nobody", 2000)],
        ..Default::default()
    });

    let options = ResolveOptions {
        diagnostics: true,
        ..Default::default()
    };
    let outcome = resolve::resolve_scan(&pool, catalog, &config, "Saga", &options).await;

    assert!(matches!(
        outcome.resolution,
        Resolution::NoMatch {
            reason: NoMatchReason::NoCandidates
        }
    ));
    let report = outcome.diagnostics.unwrap();
    assert_eq!(report.candidates.len(), 1);
    assert_eq!(
        report.candidates[0].reject_reason.as_deref(),
        Some("no title token overlap")
    );
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (_tmp, pool, _config) = setup().await;
    migrate::run_migrations(&pool).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
}
