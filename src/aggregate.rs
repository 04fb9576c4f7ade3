use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::{AggregateConfig, Basis, Measure};
use crate::models::{Signal, SignalReading};
use crate::naval::round_half_even;

/// Contributions are reported on a 0-10 scale.
const CONTRIBUTION_SCALE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutcome {
    pub total_risk: i64,
    /// Weighted share of each signal before the escalation boost.
    pub weighted: BTreeMap<Signal, f64>,
    pub elevated: Vec<Signal>,
    pub escalated: bool,
}

impl AggregateOutcome {
    pub fn elevated_count(&self) -> usize {
        self.elevated.len()
    }
}

fn weighted_value(reading: &SignalReading, weight: f64, basis: Basis) -> f64 {
    match basis {
        Basis::Risk => reading.risk as f64 * weight,
        Basis::Contribution => reading.contribution * CONTRIBUTION_SCALE * weight,
    }
}

/// Weighted sum of all readings, boosted when enough signals are elevated at
/// once. The result is always within 0-100.
pub fn aggregate(readings: &[SignalReading], config: &AggregateConfig) -> AggregateOutcome {
    let by_signal: BTreeMap<Signal, &SignalReading> =
        readings.iter().map(|r| (r.signal, r)).collect();

    let mut weighted = BTreeMap::new();
    for entry in &config.weights {
        let value = match by_signal.get(&entry.signal) {
            Some(reading) => weighted_value(reading, entry.weight, entry.basis),
            None => {
                debug!(signal = %entry.signal, "no reading for weighted signal");
                0.0
            }
        };
        *weighted.entry(entry.signal).or_insert(0.0) += value;
    }

    let sum: f64 = weighted.values().sum();
    let mut total = sum.clamp(0.0, 100.0);

    let elevated: Vec<Signal> = config
        .escalation_rules
        .iter()
        .filter(|rule| {
            let Some(reading) = by_signal.get(&rule.signal) else {
                return false;
            };
            let measured = match rule.measure {
                Measure::Risk => reading.risk as f64,
                Measure::Contribution => reading.contribution,
                Measure::Weighted => weighted.get(&rule.signal).copied().unwrap_or(0.0),
            };
            measured > rule.threshold
        })
        .map(|rule| rule.signal)
        .collect();

    let escalated = elevated.len() >= config.escalation_min_elevated;
    if escalated {
        total = (total * config.escalation_factor).min(100.0);
    }
    let total_risk = (round_half_even(total) as i64).clamp(0, 100);

    info!(
        weighted_sum = sum,
        elevated = elevated.len(),
        escalated,
        total_risk,
        "aggregated signals"
    );

    AggregateOutcome {
        total_risk,
        weighted,
        elevated,
        escalated,
    }
}
