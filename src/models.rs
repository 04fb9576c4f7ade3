use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every independently sourced signal that feeds the total risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    News,
    Flight,
    Tanker,
    Pentagon,
    Polymarket,
    Weather,
    Oil,
    Gdelt,
    Trends,
    Tfr,
    Buildup,
}

impl Signal {
    pub const ALL: [Signal; 11] = [
        Signal::News,
        Signal::Flight,
        Signal::Tanker,
        Signal::Pentagon,
        Signal::Polymarket,
        Signal::Weather,
        Signal::Oil,
        Signal::Gdelt,
        Signal::Trends,
        Signal::Tfr,
        Signal::Buildup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::News => "news",
            Signal::Flight => "flight",
            Signal::Tanker => "tanker",
            Signal::Pentagon => "pentagon",
            Signal::Polymarket => "polymarket",
            Signal::Weather => "weather",
            Signal::Oil => "oil",
            Signal::Gdelt => "gdelt",
            Signal::Trends => "trends",
            Signal::Tfr => "tfr",
            Signal::Buildup => "buildup",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Signal::ALL.into_iter().find(|signal| signal.as_str() == key)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ship named in bulletin text, e.g. `USS Mason (DDG-87)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HullMention {
    pub ships_name: String,
    pub hull_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    High,
    MediumTransit,
    MediumStation,
    Low,
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Relevance::High => "high",
            Relevance::MediumTransit => "medium-transit",
            Relevance::MediumStation => "medium-station",
            Relevance::Low => "low",
        };
        f.write_str(label)
    }
}

/// One bulletin heading and the flattened text up to the next heading of the
/// same level. Rebuilt on every pass, never persisted.
#[derive(Debug, Clone)]
pub struct RegionSection {
    pub name: String,
    pub body: String,
    pub relevance: Relevance,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavalForceResult {
    pub total_weighted_points: f64,
    pub force_risk: i64,
    pub total_ships_parsed: usize,
    pub counted_ships: usize,
    pub carriers_in_centcom: usize,
    pub destroyers_in_centcom: usize,
    pub type_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirPresence {
    /// Platform keyword to display name.
    pub platforms: BTreeMap<String, String>,
    /// Base keyword to headline mention count.
    pub bases: BTreeMap<String, u32>,
    pub categories_present: usize,
    #[serde(default)]
    pub categories_active: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentNews {
    pub article_count: usize,
    pub escalation_matches: usize,
    pub deployment_matches: usize,
    pub sample_headlines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildupResult {
    pub risk: i64,
    pub detail: String,
    pub force_posture: Option<NavalForceResult>,
    pub carrier_air_risk: i64,
    pub land_air_risk: i64,
    pub air_presence_risk: i64,
    pub deployment_news_risk: i64,
    pub air_presence: AirPresence,
    pub deployment_news: DeploymentNews,
    /// True when the naval numbers came from the previous run.
    pub naval_from_cache: bool,
    pub timestamp: String,
}

/// The slice of a previous buildup payload that may stand in for a bulletin
/// that could not be fetched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildupFallback {
    #[serde(default)]
    pub force_posture: Option<NavalForceResult>,
    #[serde(default)]
    pub carrier_air_risk: i64,
}

/// A per-signal value ready for aggregation and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReading {
    pub signal: Signal,
    pub risk: i64,
    /// Pre-weighted 0-10 value for signals that report one, otherwise 0.
    pub contribution: f64,
    pub detail: String,
    pub raw_data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskHistoryPoint {
    pub timestamp: i64,
    pub risk: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pinned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    #[serde(default)]
    pub risk: i64,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub history: Vec<i64>,
    #[serde(default)]
    pub raw_data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalRisk {
    #[serde(default)]
    pub risk: i64,
    #[serde(default)]
    pub history: Vec<RiskHistoryPoint>,
    #[serde(default)]
    pub elevated_count: usize,
}
