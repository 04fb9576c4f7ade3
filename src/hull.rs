use std::collections::HashSet;

use regex::Regex;

use crate::config::NavalConfig;
use crate::error::ConfigError;
use crate::models::HullMention;

const PREFIXES: [&str; 3] = ["USS", "USNS", "USCGC"];

/// Recognizes `USS|USNS|USCGC <name> (<TYPE>-<number>)` mentions for a closed
/// set of ship type codes.
#[derive(Debug, Clone)]
pub struct HullExtractor {
    pattern: Regex,
}

impl HullExtractor {
    pub fn new(config: &NavalConfig) -> Result<Self, ConfigError> {
        if config.ship_types.is_empty() {
            return Err(ConfigError::NoShipTypes);
        }

        // Longest codes first so T-AOE is not swallowed by T-AO.
        let mut codes: Vec<&str> = config.ship_types.iter().map(|s| s.code.as_str()).collect();
        codes.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = codes
            .iter()
            .map(|code| regex::escape(code))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = format!(
            r"(?:USS|USNS|USCGC)\s+([\w\s.'’]+?)\s*\(({alternation})-?(\d+)\)"
        );
        let pattern = Regex::new(&pattern).map_err(|source| ConfigError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;

        Ok(Self { pattern })
    }

    /// Mentions in order of first appearance; repeats of a hull collapse.
    pub fn extract(&self, text: &str) -> Vec<HullMention> {
        let mut seen = HashSet::new();
        let mut mentions = Vec::new();

        for caps in self.pattern.captures_iter(text) {
            let hull_code = format!("{}-{}", &caps[2], &caps[3]);
            if !seen.insert(hull_code.clone()) {
                continue;
            }
            mentions.push(HullMention {
                ships_name: last_name(&caps[1]),
                hull_code,
            });
        }

        mentions
    }
}

/// The name match can run across an earlier mention that had no hull code,
/// as in `USS Gerald R. Ford and USS Mahan (DDG-72)`. Keep only the words
/// after the last prefix.
fn last_name(captured: &str) -> String {
    let words: Vec<&str> = captured.split_whitespace().collect();
    let start = words
        .iter()
        .rposition(|word| PREFIXES.contains(word))
        .map_or(0, |idx| idx + 1);
    words[start..].join(" ")
}

impl HullMention {
    /// Type prefix of the hull code: `DDG-119` is `DDG`, `T-AKE-7` is `T-AKE`.
    pub fn ship_type(&self) -> &str {
        match self.hull_code.rsplit_once('-') {
            Some((prefix, number)) if number.chars().all(|c| c.is_ascii_digit()) => prefix,
            _ => &self.hull_code,
        }
    }
}
