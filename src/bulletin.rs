use regex::{Captures, Regex};
use tracing::debug;

use crate::config::NavalConfig;
use crate::error::ConfigError;
use crate::hull::HullExtractor;
use crate::models::{HullMention, RegionSection};
use crate::region::RegionClassifier;

/// A scored-region section together with the hulls mentioned in it.
#[derive(Debug, Clone)]
pub struct ParsedSection {
    pub region: RegionSection,
    pub hulls: Vec<HullMention>,
}

/// Compiled form of the naval tables. Splits bulletin HTML into heading
/// sections, classifies each, and extracts hull mentions. Holds no state
/// between calls.
#[derive(Debug, Clone)]
pub struct BulletinScanner {
    heading: Regex,
    noise: Regex,
    tag: Regex,
    entity: Regex,
    hulls: HullExtractor,
    classifier: RegionClassifier,
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl BulletinScanner {
    pub fn new(config: &NavalConfig) -> Result<Self, ConfigError> {
        let level = config.heading_level;
        if !(1..=6).contains(&level) {
            return Err(ConfigError::HeadingLevel(level));
        }

        Ok(Self {
            heading: compile(&format!(r"(?is)<h{level}\b[^>]*>(.*?)</h{level}\s*>"))?,
            noise: compile(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>|<!--.*?-->")?,
            tag: compile(r"(?s)<[^>]*>")?,
            entity: compile(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")?,
            hulls: HullExtractor::new(config)?,
            classifier: RegionClassifier::new(config)?,
        })
    }

    /// Raw `(heading, body)` text pairs in document order. Content before the
    /// first heading is ignored. Malformed markup yields fewer sections, never
    /// an error.
    pub fn split_sections(&self, html: &str) -> Vec<(String, String)> {
        let html = self.noise.replace_all(html, " ");
        let headings: Vec<_> = self.heading.captures_iter(&html).collect();

        headings
            .iter()
            .enumerate()
            .map(|(idx, caps)| {
                let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
                let next = headings
                    .get(idx + 1)
                    .and_then(|c| c.get(0))
                    .map(|m| m.start())
                    .unwrap_or(html.len());
                let heading = self.text(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
                let body = self.text(&html[whole..next]);
                (heading, body)
            })
            .collect()
    }

    /// Sections that survive the exclusion list, classified and with their
    /// hull mentions extracted. Deterministic in its input.
    pub fn parse(&self, html: &str) -> Vec<ParsedSection> {
        self.split_sections(html)
            .into_iter()
            .filter_map(|(name, body)| {
                let Some((relevance, multiplier)) = self.classifier.classify(&name, &body) else {
                    debug!(heading = %name, "skipping administrative section");
                    return None;
                };
                let hulls = self.hulls.extract(&body);
                Some(ParsedSection {
                    region: RegionSection {
                        name,
                        body,
                        relevance,
                        multiplier,
                    },
                    hulls,
                })
            })
            .collect()
    }

    /// Visible text of an HTML fragment with whitespace collapsed.
    fn text(&self, fragment: &str) -> String {
        let stripped = self.tag.replace_all(fragment, " ");
        let decoded = self.entity.replace_all(&stripped, |caps: &Captures| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        });
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32).map(String::from);
    }
    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "rsquo" | "lsquo" => "'",
        "ldquo" | "rdquo" => "\"",
        "ndash" | "mdash" => "-",
        _ => return None,
    };
    Some(decoded.to_string())
}
