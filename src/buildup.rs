use chrono::Utc;
use tracing::{info, warn};

use crate::air::{land_air_risk, CarrierAirScorer};
use crate::bulletin::BulletinScanner;
use crate::config::{DeploymentNewsConfig, ScoringConfig};
use crate::error::ConfigError;
use crate::models::{AirPresence, BuildupFallback, BuildupResult, DeploymentNews, NavalForceResult};
use crate::naval::{round_half_even, score_sections};

/// Collaborator outputs the combiner consumes. `None` means the fetch failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildupInputs<'a> {
    pub bulletin: Option<&'a str>,
    pub air_headlines: Option<&'a [String]>,
    pub deployment_headlines: Option<&'a [String]>,
    pub previous: Option<&'a BuildupFallback>,
}

/// Headline-volume risk: capped terms for article count, escalation hits and
/// deployment hits. Each headline counts at most once per keyword family.
pub fn deployment_news_risk(headlines: &[String], config: &DeploymentNewsConfig) -> (i64, DeploymentNews) {
    let mut news = DeploymentNews::default();

    for headline in headlines.iter().take(config.max_headlines) {
        let lowered = headline.to_lowercase();
        news.article_count += 1;
        if news.sample_headlines.len() < config.sample_size {
            news.sample_headlines.push(headline.clone());
        }
        if config.escalation_keywords.iter().any(|k| lowered.contains(k.as_str())) {
            news.escalation_matches += 1;
        }
        if config.deployment_keywords.iter().any(|k| lowered.contains(k.as_str())) {
            news.deployment_matches += 1;
        }
    }

    let term = |count: usize, per: i64, cap: i64| (count as i64 * per).min(cap);
    let risk = term(news.article_count, config.per_article, config.article_cap)
        + term(news.escalation_matches, config.per_escalation, config.escalation_cap)
        + term(news.deployment_matches, config.per_deployment, config.deployment_cap);

    (risk.clamp(0, 100), news)
}

fn plural(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", if count > 1 { "s" } else { "" })
}

fn describe(naval: Option<&NavalForceResult>, air: &AirPresence) -> String {
    let (carriers, destroyers, points) = naval
        .map(|n| (n.carriers_in_centcom, n.destroyers_in_centcom, n.total_weighted_points))
        .unwrap_or((0, 0, 0.0));

    let mut ships = Vec::new();
    if carriers > 0 {
        ships.push(plural(carriers, "carrier"));
    }
    if destroyers > 0 {
        ships.push(plural(destroyers, "destroyer"));
    }
    let ships = if ships.is_empty() {
        "No major combatants".to_string()
    } else {
        ships.join(", ")
    };

    let air_text = if air.categories_active.is_empty() {
        "No air assets detected".to_string()
    } else {
        format!("Air: {}", air.categories_active.join(", "))
    };

    format!("{ships} near CENTCOM ({points:.0} pts) | {air_text}")
}

/// Blends naval posture, air presence and deployment news into one buildup
/// risk. The blend weights stay fixed when a part runs on a fallback value.
pub struct BuildupCombiner<'c> {
    config: &'c ScoringConfig,
    scanner: BulletinScanner,
    carrier_air: CarrierAirScorer,
}

impl<'c> BuildupCombiner<'c> {
    pub fn new(config: &'c ScoringConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            config,
            scanner: BulletinScanner::new(&config.naval)?,
            carrier_air: CarrierAirScorer::new(&config.air)?,
        })
    }

    pub fn combine(&self, inputs: BuildupInputs<'_>) -> BuildupResult {
        let weights = &self.config.buildup;

        let (naval, carrier_air_risk, naval_from_cache) = match inputs.bulletin {
            Some(html) => {
                let sections = self.scanner.parse(html);
                let naval = score_sections(&sections, &self.config.naval);
                info!(
                    parsed = naval.total_ships_parsed,
                    counted = naval.counted_ships,
                    points = naval.total_weighted_points,
                    force_risk = naval.force_risk,
                    "scored fleet bulletin"
                );
                (Some(naval), self.carrier_air.score(&sections), false)
            }
            None => match inputs.previous {
                Some(previous) => {
                    warn!("bulletin unavailable, reusing naval posture from previous run");
                    (previous.force_posture.clone(), previous.carrier_air_risk, true)
                }
                None => {
                    warn!("bulletin unavailable and no previous posture cached");
                    (None, 0, false)
                }
            },
        };
        let naval_force_risk = naval
            .as_ref()
            .map(|n| n.force_risk)
            .unwrap_or(weights.fallback_naval_risk);

        let (land_air, air_presence) = match inputs.air_headlines {
            Some(headlines) => land_air_risk(headlines, &self.config.air),
            None => {
                warn!("air asset headlines unavailable");
                (weights.fallback_land_air_risk, AirPresence::default())
            }
        };
        let air_presence_risk = round_half_even(
            carrier_air_risk as f64 * weights.carrier_air_share
                + land_air as f64 * weights.land_air_share,
        ) as i64;

        let (news_risk, deployment_news) = match inputs.deployment_headlines {
            Some(headlines) => deployment_news_risk(headlines, &self.config.deployment_news),
            None => {
                warn!("deployment headlines unavailable");
                (0, DeploymentNews::default())
            }
        };

        let risk = round_half_even(
            naval_force_risk as f64 * weights.naval
                + air_presence_risk as f64 * weights.air_presence
                + news_risk as f64 * weights.deployment_news,
        ) as i64;
        let risk = risk.clamp(0, 100);

        info!(
            naval = naval_force_risk,
            air = air_presence_risk,
            news = news_risk,
            risk,
            "combined buildup risk"
        );

        BuildupResult {
            risk,
            detail: describe(naval.as_ref(), &air_presence),
            force_posture: naval,
            carrier_air_risk,
            land_air_risk: land_air,
            air_presence_risk,
            deployment_news_risk: news_risk,
            air_presence,
            deployment_news,
            naval_from_cache,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
