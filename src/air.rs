use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use tracing::debug;

use crate::bulletin::ParsedSection;
use crate::config::AirConfig;
use crate::error::ConfigError;
use crate::models::AirPresence;
use crate::naval::round_half_even;

struct SquadronPattern {
    prefix: String,
    points: f64,
    pattern: Regex,
}

/// Counts embarked squadrons inside the sections the region classifier gave
/// a non-zero multiplier.
pub struct CarrierAirScorer {
    squadrons: Vec<SquadronPattern>,
    ceiling: f64,
}

impl CarrierAirScorer {
    pub fn new(config: &AirConfig) -> Result<Self, ConfigError> {
        let squadrons = config
            .squadrons
            .iter()
            .map(|category| {
                let pattern = format!(r"\b{}[-\s]*(\d+)", regex::escape(&category.prefix));
                let compiled = Regex::new(&pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                Ok(SquadronPattern {
                    prefix: category.prefix.clone(),
                    points: category.points,
                    pattern: compiled,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            squadrons,
            ceiling: config.air_points_ceiling,
        })
    }

    /// Distinct squadron designators in a block of text, normalized to
    /// `PREFIX-NUMBER`.
    pub fn squadrons_in(&self, text: &str) -> Vec<(String, f64)> {
        let mut found = Vec::new();
        for squadron in &self.squadrons {
            let distinct: BTreeSet<String> = squadron
                .pattern
                .captures_iter(text)
                .map(|caps| format!("{}-{}", squadron.prefix, &caps[1]))
                .collect();
            found.extend(distinct.into_iter().map(|id| (id, squadron.points)));
        }
        found
    }

    /// Weighted air-wing points summed over relevant sections.
    pub fn air_points(&self, sections: &[ParsedSection]) -> f64 {
        sections
            .iter()
            .filter(|s| s.region.multiplier > 0.0)
            .map(|section| {
                let squadrons = self.squadrons_in(&section.region.body);
                let points: f64 = squadrons.iter().map(|(_, pts)| pts).sum();
                if !squadrons.is_empty() {
                    debug!(
                        region = %section.region.name,
                        squadrons = squadrons.len(),
                        points,
                        "carrier air wing detected"
                    );
                }
                points * section.region.multiplier
            })
            .sum()
    }

    pub fn score(&self, sections: &[ParsedSection]) -> i64 {
        if self.ceiling <= 0.0 {
            return 0;
        }
        let risk = round_half_even(self.air_points(sections) / self.ceiling * 100.0);
        (risk as i64).clamp(0, 100)
    }
}

/// Land-based air risk from recent headlines: a categorical step per
/// capability category present, plus a capped bonus for base mentions.
pub fn land_air_risk(headlines: &[String], config: &AirConfig) -> (i64, AirPresence) {
    let mut platforms: BTreeMap<String, String> = BTreeMap::new();
    let mut bases: BTreeMap<String, u32> = BTreeMap::new();

    for headline in headlines.iter().take(config.max_headlines) {
        let lowered = headline.to_lowercase();
        for platform in &config.platforms {
            if lowered.contains(&platform.key) && !platforms.contains_key(&platform.key) {
                platforms.insert(platform.key.clone(), platform.name.clone());
            }
        }
        for base in &config.bases {
            if lowered.contains(base.as_str()) {
                *bases.entry(base.clone()).or_insert(0) += 1;
            }
        }
    }

    let categories_active: Vec<String> = config
        .categories
        .iter()
        .filter(|category| category.platforms.iter().any(|p| platforms.contains_key(p)))
        .map(|category| category.label.clone())
        .collect();
    let categories_present = categories_active.len();

    let step = config
        .category_steps
        .get(categories_present)
        .or(config.category_steps.last())
        .copied()
        .unwrap_or(0);
    let bonus = bases
        .values()
        .map(|count| (*count).min(config.per_base_cap))
        .sum::<u32>()
        .min(config.base_bonus_cap);
    let risk = (step + i64::from(bonus)).clamp(0, 100);

    let presence = AirPresence {
        platforms,
        bases,
        categories_present,
        categories_active,
    };
    (risk, presence)
}
