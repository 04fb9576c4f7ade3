use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::bulletin::ParsedSection;
use crate::config::NavalConfig;
use crate::models::NavalForceResult;

/// Python-compatible rounding: ties go to the even neighbour.
pub fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Linear map of weighted points onto 0-100: `baseline` and below is 0,
/// `max` and above is 100.
pub fn force_risk(points: f64, baseline: f64, max: f64) -> i64 {
    let span = max - baseline;
    if span <= 0.0 {
        return if points > baseline { 100 } else { 0 };
    }
    let scaled = round_half_even((points - baseline) / span * 100.0);
    (scaled as i64).clamp(0, 100)
}

#[derive(Debug, Clone)]
struct CountedHull {
    ship_type: String,
    weighted: f64,
}

/// Reduces parsed sections to a naval posture. Each hull counts once, at the
/// highest weight any section gives it; on a tie the first section wins.
pub fn score_sections(sections: &[ParsedSection], config: &NavalConfig) -> NavalForceResult {
    let points: HashMap<&str, f64> = config
        .ship_types
        .iter()
        .map(|s| (s.code.as_str(), s.points))
        .collect();

    let mut best: HashMap<String, CountedHull> = HashMap::new();
    let mut total = 0.0;

    for section in sections {
        for hull in &section.hulls {
            let ship_type = hull.ship_type();
            let base = points.get(ship_type).copied().unwrap_or(config.default_points);
            let weighted = round_one_decimal(base * section.region.multiplier);

            if let Some(existing) = best.get(&hull.hull_code) {
                if weighted <= existing.weighted {
                    continue;
                }
                debug!(
                    hull = %hull.hull_code,
                    from = existing.weighted,
                    to = weighted,
                    region = %section.region.name,
                    "hull upgraded to higher relevance"
                );
                total -= existing.weighted;
            }

            best.insert(
                hull.hull_code.clone(),
                CountedHull {
                    ship_type: ship_type.to_string(),
                    weighted,
                },
            );
            total += weighted;
        }
    }

    let total = round_one_decimal(total);
    let mut type_counts: BTreeMap<String, usize> = BTreeMap::new();
    for hull in best.values().filter(|h| h.weighted > 0.0) {
        *type_counts.entry(hull.ship_type.clone()).or_insert(0) += 1;
    }
    let counted_ships = type_counts.values().sum();

    NavalForceResult {
        total_weighted_points: total,
        force_risk: force_risk(total, config.baseline_points, config.max_points),
        total_ships_parsed: best.len(),
        counted_ships,
        carriers_in_centcom: type_counts.get("CVN").copied().unwrap_or(0),
        destroyers_in_centcom: type_counts.get("DDG").copied().unwrap_or(0),
        type_counts,
    }
}
