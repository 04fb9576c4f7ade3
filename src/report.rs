use std::fmt::Write;

use chrono::DateTime;

use crate::models::{NavalForceResult, Signal, SignalEntry};
use crate::snapshot::Snapshot;

const HISTORY_ROWS: usize = 8;

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn sorted_signals(snapshot: &Snapshot) -> Vec<(Signal, &SignalEntry)> {
    let mut signals: Vec<(Signal, &SignalEntry)> = snapshot
        .signals
        .iter()
        .map(|(signal, entry)| (*signal, entry))
        .collect();
    signals.sort_by(|a, b| b.1.risk.cmp(&a.1.risk).then(a.0.cmp(&b.0)));
    signals
}

fn naval_posture(snapshot: &Snapshot) -> Option<NavalForceResult> {
    let raw = snapshot.signals.get(&Signal::Buildup)?.raw_data.get("force_posture")?;
    serde_json::from_value(raw.clone()).ok()
}

pub fn build_report(snapshot: &Snapshot) -> String {
    let mut output = String::new();
    let total = &snapshot.total_risk;

    let _ = writeln!(output, "# Strike Risk Report");
    let _ = writeln!(
        output,
        "Total risk {} / 100 with {} elevated signals (updated {})",
        total.risk,
        total.elevated_count,
        snapshot.last_updated.as_deref().unwrap_or("never")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Signals");

    let signals = sorted_signals(snapshot);
    if signals.is_empty() {
        let _ = writeln!(output, "No signals recorded yet.");
    } else {
        let _ = writeln!(output, "| Signal | Risk | Detail |");
        let _ = writeln!(output, "| --- | ---: | --- |");
        for (signal, entry) in signals {
            let _ = writeln!(output, "| {} | {} | {} |", signal, entry.risk, entry.detail);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Naval Posture");

    match naval_posture(snapshot) {
        Some(posture) => {
            let _ = writeln!(
                output,
                "- {:.1} weighted points, force risk {}",
                posture.total_weighted_points, posture.force_risk
            );
            let _ = writeln!(
                output,
                "- {} carriers and {} destroyers near CENTCOM ({} of {} ships counted)",
                posture.carriers_in_centcom,
                posture.destroyers_in_centcom,
                posture.counted_ships,
                posture.total_ships_parsed
            );
            for (ship_type, count) in &posture.type_counts {
                let _ = writeln!(output, "  - {ship_type}: {count}");
            }
        }
        None => {
            let _ = writeln!(output, "No fleet bulletin scored yet.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent History");

    if total.history.is_empty() {
        let _ = writeln!(output, "No history recorded yet.");
    } else {
        let skip = total.history.len().saturating_sub(HISTORY_ROWS);
        for point in total.history.iter().skip(skip) {
            let marker = if point.pinned { " (pinned)" } else { "" };
            let _ = writeln!(
                output,
                "- {}: {}{}",
                format_timestamp(point.timestamp),
                point.risk,
                marker
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskHistoryPoint, TotalRisk};
    use serde_json::json;

    #[test]
    fn empty_snapshot_renders_placeholders() {
        let report = build_report(&Snapshot::default());
        assert!(report.starts_with("# Strike Risk Report\n"));
        assert!(report.contains("Total risk 0 / 100 with 0 elevated signals (updated never)"));
        assert!(report.contains("No signals recorded yet."));
        assert!(report.contains("No fleet bulletin scored yet."));
        assert!(report.contains("No history recorded yet."));
    }

    #[test]
    fn signals_sorted_by_risk_and_pins_marked() {
        let mut snapshot = Snapshot {
            total_risk: TotalRisk {
                risk: 27,
                elevated_count: 3,
                history: vec![
                    RiskHistoryPoint {
                        timestamp: 1_771_329_600_000,
                        risk: 20,
                        pinned: true,
                    },
                    RiskHistoryPoint {
                        timestamp: 1_771_330_200_000,
                        risk: 27,
                        pinned: false,
                    },
                ],
            },
            last_updated: Some("2026-02-17T12:10:00.000Z".into()),
            ..Snapshot::default()
        };
        for (signal, risk) in [(Signal::Oil, 40), (Signal::News, 55), (Signal::Tfr, 5)] {
            snapshot.signals.insert(
                signal,
                SignalEntry {
                    risk,
                    detail: format!("{signal} detail"),
                    ..SignalEntry::default()
                },
            );
        }
        snapshot.signals.insert(
            Signal::Buildup,
            SignalEntry {
                risk: 30,
                raw_data: json!({"force_posture": {
                    "total_weighted_points": 77.7,
                    "force_risk": 50,
                    "total_ships_parsed": 24,
                    "counted_ships": 21,
                    "carriers_in_centcom": 2,
                    "destroyers_in_centcom": 11,
                    "type_counts": {"CVN": 2, "DDG": 11}
                }}),
                ..SignalEntry::default()
            },
        );

        let report = build_report(&snapshot);
        let news = report.find("| news | 55 |").unwrap();
        let oil = report.find("| oil | 40 |").unwrap();
        let buildup = report.find("| buildup | 30 |").unwrap();
        let tfr = report.find("| tfr | 5 |").unwrap();
        assert!(news < oil && oil < buildup && buildup < tfr);

        assert!(report.contains("- 77.7 weighted points, force risk 50"));
        assert!(report.contains("- 2 carriers and 11 destroyers near CENTCOM (21 of 24 ships counted)"));
        assert!(report.contains("  - DDG: 11"));
        assert!(report.contains("- 2026-02-17 12:00 UTC: 20 (pinned)"));
        assert!(report.contains("- 2026-02-17 12:10 UTC: 27\n"));
    }
}
