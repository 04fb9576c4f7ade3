use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::buildup::{BuildupCombiner, BuildupInputs};
use crate::config::ScoringConfig;
use crate::error::ConfigError;
use crate::history::{push_bounded, update_total_history};
use crate::models::{SignalEntry, TotalRisk};
use crate::signals::{derive_readings, CollectedInputs};
use crate::snapshot::{FallbackCache, RunLock, Snapshot};
use crate::sources;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub snapshot: PathBuf,
    pub inputs: Option<PathBuf>,
    pub bulletin: Option<PathBuf>,
}

/// One scoring pass over already collected inputs. Pure apart from logging:
/// the previous snapshot supplies histories and the naval fallback.
pub fn compute<Tz: TimeZone>(
    previous: &Snapshot,
    inputs: &CollectedInputs,
    config: &ScoringConfig,
    now: &DateTime<Tz>,
) -> Result<Snapshot, ConfigError> {
    let cache = FallbackCache::from_snapshot(previous);
    let fallback = cache.buildup();

    let combiner = BuildupCombiner::new(config)?;
    let buildup = combiner.combine(BuildupInputs {
        bulletin: inputs.bulletin.as_deref(),
        air_headlines: inputs.air_headlines.as_deref(),
        deployment_headlines: inputs.deployment_headlines.as_deref(),
        previous: fallback.as_ref(),
    });

    let readings = derive_readings(inputs, &buildup);
    let outcome = aggregate(&readings, &config.aggregate);
    debug!(weighted = ?outcome.weighted, escalated = outcome.escalated, "signal contributions");

    let mut signals = BTreeMap::new();
    for reading in readings {
        let mut history = previous
            .signals
            .get(&reading.signal)
            .map(|entry| entry.history.clone())
            .unwrap_or_default();
        push_bounded(&mut history, reading.risk, config.history.signal_capacity);
        signals.insert(
            reading.signal,
            SignalEntry {
                risk: reading.risk,
                detail: reading.detail,
                history,
                raw_data: reading.raw_data,
            },
        );
    }

    let mut total_history = previous.total_risk.history.clone();
    let transition = update_total_history(
        &mut total_history,
        outcome.total_risk,
        now,
        config.history.total_capacity,
    );
    info!(?transition, points = total_history.len(), "updated total risk history");

    Ok(Snapshot {
        signals,
        total_risk: TotalRisk {
            risk: outcome.total_risk,
            history: total_history,
            elevated_count: outcome.elevated_count(),
        },
        last_updated: Some(
            now.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    })
}

/// Lock, load, collect, score and save. At most one run per snapshot path
/// proceeds at a time.
pub async fn run_once(options: &RunOptions, config: &ScoringConfig) -> anyhow::Result<Snapshot> {
    let lock = RunLock::acquire(&options.snapshot)
        .with_context(|| format!("cannot start run on {}", options.snapshot.display()))?;
    debug!(lock = %lock.path().display(), "run lock acquired");

    let previous = Snapshot::load(&options.snapshot);
    let inputs = sources::collect(options.inputs.as_deref(), options.bulletin.as_deref()).await;
    let snapshot = compute(&previous, &inputs, config, &Local::now())?;

    snapshot
        .save(&options.snapshot)
        .with_context(|| format!("failed to write {}", options.snapshot.display()))?;
    info!(
        path = %options.snapshot.display(),
        total_risk = snapshot.total_risk.risk,
        elevated = snapshot.total_risk.elevated_count,
        "snapshot written"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SnapshotError;
    use crate::models::{BuildupResult, Signal};
    use crate::snapshot::lock_path;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    const FEB_17: &str = include_str!("../fixtures/fleet_tracker_2026-02-17.html");

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, day, hour, minute, 0).single().unwrap()
    }

    fn inputs(document: Value, bulletin: Option<&str>) -> CollectedInputs {
        let mut collected = match document {
            Value::Object(map) => CollectedInputs::from_document(map),
            _ => CollectedInputs::default(),
        };
        collected.bulletin = bulletin.map(str::to_string);
        collected
    }

    fn buildup_payload(snapshot: &Snapshot) -> BuildupResult {
        serde_json::from_value(snapshot.signals[&Signal::Buildup].raw_data.clone()).unwrap()
    }

    #[test]
    fn first_run_writes_every_signal() {
        let config = ScoringConfig::default();
        let snapshot = compute(
            &Snapshot::default(),
            &CollectedInputs::default(),
            &config,
            &at(17, 9, 0),
        )
        .unwrap();

        assert_eq!(snapshot.signals.len(), Signal::ALL.len());
        for entry in snapshot.signals.values() {
            assert_eq!(entry.history, vec![entry.risk]);
        }
        assert_eq!(snapshot.total_risk.history.len(), 1);
        assert_eq!(snapshot.total_risk.history[0].risk, snapshot.total_risk.risk);
        assert_eq!(snapshot.total_risk.elevated_count, 0);
        assert_eq!(snapshot.last_updated.as_deref(), Some("2026-02-17T09:00:00.000Z"));
    }

    #[test]
    fn neutral_run_scores_quiet_baseline() {
        let config = ScoringConfig::default();
        let snapshot = compute(
            &Snapshot::default(),
            &CollectedInputs::default(),
            &config,
            &at(17, 9, 0),
        )
        .unwrap();
        // buildup 4, news 3, flight 3, tanker 0, polymarket 0, oil 10,
        // gdelt 10, trends 5, pentagon 1 x 10, weather 0, tfr 5:
        // 0.48 + 0.51 + 0.51 + 0.9 + 0.5 + 0.2 + 0.4 + 0.25 = 3.75
        assert_eq!(snapshot.total_risk.risk, 4);
    }

    #[test]
    fn later_runs_extend_histories() {
        let config = ScoringConfig::default();
        let quiet = CollectedInputs::default();
        let first = compute(&Snapshot::default(), &quiet, &config, &at(17, 9, 0)).unwrap();
        let same_window = compute(&first, &quiet, &config, &at(17, 11, 30)).unwrap();
        assert_eq!(same_window.total_risk.history.len(), 1);
        assert_eq!(same_window.signals[&Signal::Oil].history, vec![10, 10]);

        let busy = inputs(json!({"oil": {"risk": 70}}), None);
        let crossed = compute(&same_window, &busy, &config, &at(17, 12, 10)).unwrap();
        let history = &crossed.total_risk.history;
        assert_eq!(history.len(), 2);
        assert!(history[0].pinned);
        assert_eq!(history[0].risk, same_window.total_risk.risk);
        assert_eq!(history[1].risk, crossed.total_risk.risk);
        assert_eq!(crossed.signals[&Signal::Oil].history, vec![10, 10, 70]);
    }

    #[test]
    fn missing_bulletin_reuses_previous_posture() {
        let config = ScoringConfig::default();
        let fresh = compute(
            &Snapshot::default(),
            &inputs(json!({}), Some(FEB_17)),
            &config,
            &at(17, 9, 0),
        )
        .unwrap();
        let fresh_buildup = buildup_payload(&fresh);
        assert_eq!(fresh_buildup.carrier_air_risk, 97);

        let degraded = compute(&fresh, &CollectedInputs::default(), &config, &at(17, 9, 30)).unwrap();
        let degraded_buildup = buildup_payload(&degraded);
        assert!(degraded_buildup.naval_from_cache);
        assert_eq!(degraded_buildup.force_posture, fresh_buildup.force_posture);
        assert_eq!(degraded_buildup.carrier_air_risk, 97);
    }

    #[test]
    fn correlated_signals_escalate_total() {
        let config = ScoringConfig::default();
        let document = json!({
            "news": {"total_count": 10, "alert_count": 8},
            "oil": {"risk": 60},
            "gdelt": {"risk": 55},
            "tfr": {"risk": 35}
        });
        let snapshot = compute(
            &Snapshot::default(),
            &inputs(document, None),
            &config,
            &at(17, 9, 0),
        )
        .unwrap();
        assert_eq!(snapshot.total_risk.elevated_count, 4);
        assert!(snapshot.total_risk.risk <= 100);
    }

    #[tokio::test]
    async fn run_once_persists_and_releases_lock() {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("frontend").join("data.json");
        let bulletin = dir.path().join("bulletin.html");
        std::fs::write(&bulletin, FEB_17).unwrap();

        let options = RunOptions {
            snapshot: snapshot_path.clone(),
            inputs: None,
            bulletin: Some(bulletin),
        };
        let config = ScoringConfig::default();
        let written = run_once(&options, &config).await.unwrap();

        drop(RunLock::acquire(&snapshot_path).unwrap());
        let reloaded = Snapshot::load(&snapshot_path);
        assert_eq!(reloaded, written);
        assert_eq!(buildup_payload(&reloaded).carrier_air_risk, 97);

        run_once(&options, &config).await.unwrap();
        assert_eq!(Snapshot::load(&snapshot_path).signals[&Signal::Oil].history.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_run_is_refused() {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("data.json");
        let _held = RunLock::acquire(&snapshot_path).unwrap();

        let options = RunOptions {
            snapshot: snapshot_path.clone(),
            inputs: None,
            bulletin: None,
        };
        let err = run_once(&options, &ScoringConfig::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::RunInProgress(_))
        ));
        assert!(!snapshot_path.exists());
    }

    #[tokio::test]
    async fn lock_file_from_killed_run_does_not_stall_runs() {
        let dir = TempDir::new().unwrap();
        let snapshot_path = dir.path().join("data.json");
        std::fs::write(lock_path(&snapshot_path), "4242\n").unwrap();

        let options = RunOptions {
            snapshot: snapshot_path.clone(),
            inputs: None,
            bulletin: None,
        };
        let config = ScoringConfig::default();
        for _ in 0..3 {
            run_once(&options, &config).await.unwrap();
        }
        let snapshot = Snapshot::load(&snapshot_path);
        assert_eq!(snapshot.signals[&Signal::Oil].history, vec![10, 10, 10]);
    }
}
