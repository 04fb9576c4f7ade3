use regex::Regex;

use crate::config::{NavalConfig, TierMultipliers};
use crate::error::ConfigError;
use crate::models::Relevance;

/// Maps a bulletin heading and its body to a relevance tier. Geography alone
/// only counts for the theater itself; nearby waters need transit or
/// forward-basing language in the body.
#[derive(Debug, Clone)]
pub struct RegionClassifier {
    excluded_markers: Vec<String>,
    high_regions: Vec<String>,
    conditional_regions: Vec<String>,
    transit_patterns: Vec<Regex>,
    station_keywords: Vec<String>,
    multipliers: TierMultipliers,
}

fn lowered(items: &[String]) -> Vec<String> {
    items.iter().map(|item| item.to_lowercase()).collect()
}

impl RegionClassifier {
    pub fn new(config: &NavalConfig) -> Result<Self, ConfigError> {
        let transit_patterns = config
            .transit_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            excluded_markers: lowered(&config.excluded_heading_markers),
            high_regions: lowered(&config.high_relevance_regions),
            conditional_regions: lowered(&config.conditional_regions),
            transit_patterns,
            station_keywords: lowered(&config.station_keywords),
            multipliers: config.multipliers,
        })
    }

    /// Whether the heading names an administrative section that is never scored.
    pub fn is_excluded(&self, heading: &str) -> bool {
        let heading = heading.to_lowercase();
        self.excluded_markers.iter().any(|m| heading.contains(m))
    }

    /// First match wins. Returns `None` for excluded headings.
    pub fn classify(&self, heading: &str, body: &str) -> Option<(Relevance, f64)> {
        if self.is_excluded(heading) {
            return None;
        }

        let heading = heading.to_lowercase();
        if self.high_regions.iter().any(|r| heading.contains(r)) {
            return Some((Relevance::High, self.multipliers.high));
        }

        if self.conditional_regions.iter().any(|r| heading.contains(r)) {
            let body = body.to_lowercase();
            if self.transit_patterns.iter().any(|p| p.is_match(&body)) {
                return Some((Relevance::MediumTransit, self.multipliers.medium_transit));
            }
            if self.station_keywords.iter().any(|k| body.contains(k)) {
                return Some((Relevance::MediumStation, self.multipliers.medium_station));
            }
        }

        Some((Relevance::Low, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RegionClassifier {
        RegionClassifier::new(&NavalConfig::default()).unwrap()
    }

    #[test]
    fn administrative_headings_are_excluded() {
        let c = classifier();
        assert_eq!(c.classify("Ships Underway", "USS Mason (DDG-87)"), None);
        assert_eq!(c.classify("Related Stories", ""), None);
        assert_eq!(c.classify("Search", ""), None);
    }

    #[test]
    fn theater_waters_are_high() {
        let c = classifier();
        assert_eq!(c.classify("North Arabian Sea", ""), Some((Relevance::High, 1.0)));
        assert_eq!(c.classify("In the Persian Gulf", ""), Some((Relevance::High, 1.0)));
        assert_eq!(c.classify("Red Sea", ""), Some((Relevance::High, 1.0)));
    }

    #[test]
    fn conditional_region_with_transit_language() {
        let c = classifier();
        let body = "The carrier has now been ordered to the Middle East, officials said.";
        assert_eq!(
            c.classify("Mediterranean Sea", body),
            Some((Relevance::MediumTransit, 0.5))
        );
        let body = "The group is en route to U.S. Central Command.";
        assert_eq!(
            c.classify("Atlantic Ocean", body),
            Some((Relevance::MediumTransit, 0.5))
        );
    }

    #[test]
    fn transit_beats_station_keywords() {
        let c = classifier();
        let body = "Rota-based destroyers were deployed to the 5th Fleet.";
        assert_eq!(
            c.classify("Mediterranean", body),
            Some((Relevance::MediumTransit, 0.5))
        );
    }

    #[test]
    fn conditional_region_with_forward_station() {
        let c = classifier();
        let body = "The FDNF destroyer is operating out of Rota, Spain.";
        assert_eq!(
            c.classify("Eastern Atlantic", body),
            Some((Relevance::MediumStation, 0.4))
        );
    }

    #[test]
    fn conditional_region_without_language_is_low() {
        let c = classifier();
        assert_eq!(
            c.classify("Caribbean", "Counter-drug patrols continue."),
            Some((Relevance::Low, 0.0))
        );
    }

    #[test]
    fn destination_without_theater_reference_is_not_transit() {
        let c = classifier();
        assert_eq!(
            c.classify("Atlantic", "The ship was ordered to Norfolk for repairs."),
            Some((Relevance::Low, 0.0))
        );
    }

    #[test]
    fn unrelated_region_is_low_even_with_keywords() {
        let c = classifier();
        assert_eq!(
            c.classify("Western Pacific", "ordered to the Middle East"),
            Some((Relevance::Low, 0.0))
        );
    }
}
