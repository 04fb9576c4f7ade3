use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::air::CarrierAirScorer;
use crate::bulletin::BulletinScanner;
use crate::error::ConfigError;
use crate::models::Signal;

/// Every scoring table in one immutable value. `Default` carries the
/// production constants; a JSON file can override any section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub naval: NavalConfig,
    pub air: AirConfig,
    pub deployment_news: DeploymentNewsConfig,
    pub buildup: BuildupWeights,
    pub aggregate: AggregateConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavalConfig {
    /// Sections are split on headings of this level (`<h2>` by default).
    pub heading_level: u8,
    pub excluded_heading_markers: Vec<String>,
    pub high_relevance_regions: Vec<String>,
    pub conditional_regions: Vec<String>,
    /// Regexes run against the lowercased section body.
    pub transit_patterns: Vec<String>,
    pub station_keywords: Vec<String>,
    pub ship_types: Vec<ShipPoints>,
    pub default_points: f64,
    pub baseline_points: f64,
    pub max_points: f64,
    pub multipliers: TierMultipliers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipPoints {
    pub code: String,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TierMultipliers {
    pub high: f64,
    pub medium_transit: f64,
    pub medium_station: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AirConfig {
    pub squadrons: Vec<SquadronCategory>,
    pub air_points_ceiling: f64,
    pub platforms: Vec<AirPlatform>,
    pub bases: Vec<String>,
    pub categories: Vec<CapabilityCategory>,
    /// Land air risk indexed by the number of categories present; the last
    /// entry applies to every count beyond it.
    pub category_steps: Vec<i64>,
    pub per_base_cap: u32,
    pub base_bonus_cap: u32,
    pub max_headlines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadronCategory {
    pub prefix: String,
    pub points: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirPlatform {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCategory {
    pub label: String,
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentNewsConfig {
    pub escalation_keywords: Vec<String>,
    pub deployment_keywords: Vec<String>,
    pub max_headlines: usize,
    pub sample_size: usize,
    pub per_article: i64,
    pub article_cap: i64,
    pub per_escalation: i64,
    pub escalation_cap: i64,
    pub per_deployment: i64,
    pub deployment_cap: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildupWeights {
    pub naval: f64,
    pub air_presence: f64,
    pub deployment_news: f64,
    pub carrier_air_share: f64,
    pub land_air_share: f64,
    pub fallback_naval_risk: i64,
    pub fallback_land_air_risk: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub weights: Vec<SignalWeight>,
    pub escalation_rules: Vec<EscalationRule>,
    pub escalation_factor: f64,
    pub escalation_min_elevated: usize,
}

/// What value of a reading a weight is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// The 0-100 risk.
    Risk,
    /// The pre-weighted 0-10 contribution, scaled to 0-100 before weighting.
    Contribution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalWeight {
    pub signal: Signal,
    pub weight: f64,
    pub basis: Basis,
}

/// Which number an escalation threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Risk,
    Contribution,
    Weighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub signal: Signal,
    pub measure: Measure,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub signal_capacity: usize,
    pub total_capacity: usize,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl Default for NavalConfig {
    fn default() -> Self {
        let ship_types = [
            ("CVN", 25.0),
            ("LHA", 12.0),
            ("LHD", 12.0),
            ("CG", 6.0),
            ("DDG", 4.0),
            ("LPD", 3.0),
            ("LCS", 2.0),
            ("SSN", 8.0),
            ("SSGN", 8.0),
            ("T-AOE", 1.0),
            ("T-AO", 1.0),
            ("T-AKE", 1.0),
            ("WAGB", 0.0),
        ]
        .into_iter()
        .map(|(code, points)| ShipPoints {
            code: code.to_string(),
            points,
        })
        .collect();

        Self {
            heading_level: 2,
            excluded_heading_markers: strings(&["ships underway", "search", "related"]),
            high_relevance_regions: strings(&[
                "arabian sea",
                "north arabian sea",
                "persian gulf",
                "gulf of oman",
                "red sea",
                "gulf of aden",
                "strait of hormuz",
            ]),
            conditional_regions: strings(&["mediterranean", "atlantic", "caribbean", "adriatic"]),
            transit_patterns: strings(&[
                r"ordered to.*(?:middle east|central command|centcom|5th fleet)",
                r"heading to.*(?:middle east|central command|centcom)",
                r"en route to.*(?:middle east|central command)",
                r"deployed to.*(?:central command|5th fleet|centcom)",
                r"now been ordered to the middle east",
                r"sailing to.*(?:middle east|central command)",
            ]),
            station_keywords: strings(&["rota", "fdnf", "forward deployed"]),
            ship_types,
            default_points: 1.0,
            baseline_points: 35.0,
            max_points: 120.0,
            multipliers: TierMultipliers::default(),
        }
    }
}

impl Default for TierMultipliers {
    fn default() -> Self {
        Self {
            high: 1.0,
            medium_transit: 0.5,
            medium_station: 0.4,
        }
    }
}

impl Default for AirConfig {
    fn default() -> Self {
        let squadrons = [
            ("VFA", 6.0),
            ("VMFA", 8.0),
            ("VAQ", 4.0),
            ("VAW", 3.0),
        ]
        .into_iter()
        .map(|(prefix, points)| SquadronCategory {
            prefix: prefix.to_string(),
            points,
        })
        .collect();

        let platforms = [
            ("b-2", "Stealth Bomber"),
            ("b-52", "Strategic Bomber"),
            ("b-1", "Bomber"),
            ("f-22", "Air Superiority Fighter"),
            ("f-35", "5th Gen Fighter"),
            ("f-15e", "Strike Eagle"),
            ("awacs", "Early Warning"),
            ("e-3", "Early Warning"),
            ("a-10", "Ground Attack"),
            ("rc-135", "Reconnaissance"),
            ("global hawk", "ISR UAV"),
            ("rq-4", "ISR UAV"),
            ("p-8", "Maritime Patrol"),
            ("typhoon", "Allied Fighter"),
            ("rafale", "Allied Fighter"),
        ]
        .into_iter()
        .map(|(key, name)| AirPlatform {
            key: key.to_string(),
            name: name.to_string(),
        })
        .collect();

        let categories = [
            ("bombers", &["b-2", "b-52", "b-1"][..]),
            ("air superiority", &["f-22"][..]),
            ("strike fighters", &["f-35", "f-15e"][..]),
            ("ground attack", &["a-10"][..]),
            (
                "C2/ISR",
                &["awacs", "e-3", "rc-135", "global hawk", "rq-4", "p-8"][..],
            ),
            ("allied", &["typhoon", "rafale"][..]),
        ]
        .into_iter()
        .map(|(label, platforms)| CapabilityCategory {
            label: label.to_string(),
            platforms: strings(platforms),
        })
        .collect();

        Self {
            squadrons,
            air_points_ceiling: 50.0,
            platforms,
            bases: strings(&[
                "diego garcia",
                "al udeid",
                "qatar",
                "al dhafra",
                "uae",
                "lakenheath",
                "fairford",
                "akrotiri",
                "cyprus",
                "souda bay",
                "crete",
            ]),
            categories,
            category_steps: vec![5, 15, 25, 50, 70, 90],
            per_base_cap: 3,
            base_bonus_cap: 15,
            max_headlines: 50,
        }
    }
}

impl Default for DeploymentNewsConfig {
    fn default() -> Self {
        Self {
            escalation_keywords: strings(&[
                "buildup",
                "build-up",
                "strike option",
                "deadline",
                "warns",
                "critical level",
                "armada",
                "tensions",
            ]),
            deployment_keywords: strings(&[
                "deploy",
                "carrier",
                "arrives",
                "heading",
                "sailing",
                "ordered to",
                "strike group",
            ]),
            max_headlines: 50,
            sample_size: 5,
            per_article: 3,
            article_cap: 40,
            per_escalation: 6,
            escalation_cap: 36,
            per_deployment: 3,
            deployment_cap: 24,
        }
    }
}

impl Default for BuildupWeights {
    fn default() -> Self {
        Self {
            naval: 0.55,
            air_presence: 0.30,
            deployment_news: 0.15,
            carrier_air_share: 0.4,
            land_air_share: 0.6,
            fallback_naval_risk: 5,
            fallback_land_air_risk: 5,
        }
    }
}

impl Default for AggregateConfig {
    fn default() -> Self {
        let weights = [
            (Signal::Buildup, 0.12, Basis::Risk),
            (Signal::News, 0.17, Basis::Risk),
            (Signal::Flight, 0.17, Basis::Risk),
            (Signal::Tanker, 0.11, Basis::Risk),
            (Signal::Polymarket, 0.12, Basis::Contribution),
            (Signal::Oil, 0.09, Basis::Risk),
            (Signal::Gdelt, 0.05, Basis::Risk),
            (Signal::Trends, 0.04, Basis::Risk),
            (Signal::Pentagon, 0.04, Basis::Contribution),
            (Signal::Weather, 0.04, Basis::Risk),
            (Signal::Tfr, 0.05, Basis::Risk),
        ]
        .into_iter()
        .map(|(signal, weight, basis)| SignalWeight {
            signal,
            weight,
            basis,
        })
        .collect();

        // Thresholds compare different measures depending on the signal.
        let escalation_rules = [
            (Signal::Buildup, Measure::Risk, 40.0),
            (Signal::News, Measure::Risk, 30.0),
            (Signal::Flight, Measure::Weighted, 15.0),
            (Signal::Tanker, Measure::Weighted, 10.0),
            (Signal::Polymarket, Measure::Contribution, 5.0),
            (Signal::Oil, Measure::Risk, 40.0),
            (Signal::Gdelt, Measure::Risk, 40.0),
            (Signal::Trends, Measure::Risk, 30.0),
            (Signal::Pentagon, Measure::Contribution, 5.0),
            (Signal::Weather, Measure::Weighted, 4.0),
            (Signal::Tfr, Measure::Risk, 30.0),
        ]
        .into_iter()
        .map(|(signal, measure, threshold)| EscalationRule {
            signal,
            measure,
            threshold,
        })
        .collect();

        Self {
            weights,
            escalation_rules,
            escalation_factor: 1.15,
            escalation_min_elevated: 3,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            signal_capacity: 20,
            total_capacity: 14,
        }
    }
}

impl ScoringConfig {
    /// Load from a JSON file, or fall back to the built-in tables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum: f64 = self.aggregate.weights.iter().map(|w| w.weight).sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::WeightSum(sum));
        }
        BulletinScanner::new(&self.naval)?;
        CarrierAirScorer::new(&self.air)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_validate() {
        ScoringConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_weights_off_unity() {
        let mut config = ScoringConfig::default();
        config.aggregate.weights[0].weight = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::WeightSum(_))));
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: ScoringConfig =
            serde_json::from_str(r#"{"naval": {"baseline_points": 10.0}}"#).unwrap();
        assert_eq!(config.naval.baseline_points, 10.0);
        assert_eq!(config.naval.max_points, 120.0);
        assert_eq!(config.aggregate.weights.len(), 11);
        assert_eq!(config.history.signal_capacity, 20);
    }

    #[test]
    fn rejects_broken_transit_pattern() {
        let mut config = ScoringConfig::default();
        config.naval.transit_patterns.push("ordered to (".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Pattern { .. })));
    }
}
