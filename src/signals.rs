use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{BuildupResult, Signal, SignalReading};
use crate::naval::round_half_even;

const AWAITING: &str = "Awaiting data...";

/// Raw collaborator payloads keyed by collaborator name, plus the text inputs
/// the buildup combiner needs. Everything is optional.
#[derive(Debug, Clone, Default)]
pub struct CollectedInputs {
    pub payloads: Map<String, Value>,
    pub air_headlines: Option<Vec<String>>,
    pub deployment_headlines: Option<Vec<String>>,
    pub bulletin: Option<String>,
}

impl CollectedInputs {
    /// Split an inputs document into payloads and headline lists.
    pub fn from_document(mut document: Map<String, Value>) -> Self {
        let air_headlines = take_headlines(&mut document, "air_headlines");
        let deployment_headlines = take_headlines(&mut document, "deployment_headlines");
        Self {
            payloads: document,
            air_headlines,
            deployment_headlines,
            bulletin: None,
        }
    }
}

fn take_headlines(document: &mut Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let value = document.remove(key)?;
    match serde_json::from_value(value) {
        Ok(headlines) => Some(headlines),
        Err(err) => {
            warn!(key, error = %err, "ignoring malformed headline list");
            None
        }
    }
}

/// Collaborator key each signal's payload is published under.
fn payload_key(signal: Signal) -> &'static str {
    match signal {
        Signal::News => "news",
        Signal::Flight => "aviation",
        other => other.as_str(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NewsIntel {
    total_count: u64,
    alert_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Aviation {
    aircraft_count: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TankerActivity {
    tanker_count: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Weather {
    clouds: f64,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Polymarket {
    odds: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlaceReading {
    name: String,
    score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PentagonActivity {
    risk_contribution: Option<f64>,
    status: Option<String>,
    is_late_night: bool,
    is_weekend: bool,
    places: Vec<PlaceReading>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OilPrices {
    risk: Option<i64>,
    current_price: Option<f64>,
    change_24h: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Gdelt {
    risk: Option<i64>,
    article_count: u64,
    avg_tone: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchTrends {
    risk: Option<i64>,
    current_interest: Option<f64>,
    avg_24h: Option<f64>,
    peak_keyword: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlightRestrictions {
    risk: Option<i64>,
    total_tfrs: u64,
    vip_tfrs: u64,
    security_tfrs: u64,
}

fn payload<T: DeserializeOwned>(inputs: &CollectedInputs, signal: Signal) -> (Option<T>, Value) {
    let key = payload_key(signal);
    let Some(raw) = inputs.payloads.get(key) else {
        warn!(%signal, "collaborator output missing, using neutral default");
        return (None, Value::Object(Map::new()));
    };
    match serde_json::from_value(raw.clone()) {
        Ok(parsed) => (Some(parsed), raw.clone()),
        Err(err) => {
            warn!(%signal, error = %err, "collaborator output unparseable, using neutral default");
            (None, raw.clone())
        }
    }
}

fn reading(signal: Signal, risk: i64, detail: String, raw_data: Value) -> SignalReading {
    SignalReading {
        signal,
        risk: risk.clamp(0, 100),
        contribution: 0.0,
        detail,
        raw_data,
    }
}

fn news(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<NewsIntel>(inputs, Signal::News);
    let intel = parsed.unwrap_or_default();
    let ratio = if intel.total_count > 0 {
        intel.alert_count as f64 / intel.total_count as f64
    } else {
        0.0
    };
    let risk = (round_half_even(ratio.powi(2) * 85.0) as i64).max(3);
    let detail = format!("{} articles, {} critical", intel.total_count, intel.alert_count);
    reading(Signal::News, risk, detail, raw)
}

fn flight(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<Aviation>(inputs, Signal::Flight);
    let Some(aviation) = parsed else {
        return reading(Signal::Flight, 3, AWAITING.to_string(), raw);
    };
    let risk = (95 - round_half_even(aviation.aircraft_count * 0.8) as i64).max(3);
    let detail = format!("{} aircraft over Iran", round_half_even(aviation.aircraft_count));
    reading(Signal::Flight, risk, detail, raw)
}

fn tanker(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<TankerActivity>(inputs, Signal::Tanker);
    let count = parsed.map(|t| t.tanker_count).unwrap_or(0.0);
    let risk = round_half_even(count / 10.0 * 100.0) as i64;
    let detail = format!("{} detected in region", round_half_even(count / 4.0));
    reading(Signal::Tanker, risk, detail, raw)
}

fn weather(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<Weather>(inputs, Signal::Weather);
    let Some(weather) = parsed else {
        return reading(Signal::Weather, 0, AWAITING.to_string(), raw);
    };
    let risk = (100.0 - (weather.clouds - 6.0).max(0.0)).clamp(0.0, 100.0);
    let detail = weather.description.unwrap_or_else(|| "clear".to_string());
    reading(Signal::Weather, round_half_even(risk) as i64, detail, raw)
}

fn polymarket(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<Polymarket>(inputs, Signal::Polymarket);
    let mut odds = parsed.map(|p| p.odds).unwrap_or(0.0).clamp(0.0, 100.0);
    if odds > 95.0 {
        warn!(odds, "polymarket odds above 95 treated as bad data");
        odds = 0.0;
    }
    let odds = round_half_even(odds) as i64;
    let (risk, detail) = if odds > 0 {
        (odds, format!("{odds}% odds"))
    } else {
        (10, AWAITING.to_string())
    };
    let mut reading = reading(Signal::Polymarket, risk, detail, raw);
    reading.contribution = (odds as f64 * 0.1).min(10.0);
    reading
}

/// Venue busyness averaged into a 0-100 activity score. Busy venues late at
/// night or on weekends weigh more; no readings means a quiet 30.
pub fn pentagon_activity_score(scores: &[f64], late_night: bool, weekend: bool) -> i64 {
    if scores.is_empty() {
        return 30;
    }
    let total: f64 = scores
        .iter()
        .map(|&score| {
            if late_night && score > 60.0 {
                score * 1.5
            } else if weekend && score > 70.0 {
                score * 1.3
            } else {
                score
            }
        })
        .sum();
    round_half_even((total / scores.len() as f64).clamp(0.0, 100.0)) as i64
}

/// Activity score to a 0-10 contribution and a status label.
pub fn pentagon_contribution(activity: i64) -> (f64, &'static str) {
    match activity {
        a if a >= 80 => (10.0, "High Activity"),
        a if a >= 60 => (7.0, "Elevated"),
        a if a >= 40 => (3.0, "Normal"),
        _ => (1.0, "Low Activity"),
    }
}

fn pentagon(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<PentagonActivity>(inputs, Signal::Pentagon);
    let activity = parsed.unwrap_or_default();

    let (contribution, status) = match activity.risk_contribution {
        Some(contribution) => (
            contribution.clamp(0.0, 10.0),
            activity.status.clone().unwrap_or_else(|| "Normal".to_string()),
        ),
        None if !activity.places.is_empty() => {
            let scores: Vec<f64> = activity.places.iter().filter_map(|p| p.score).collect();
            let score = pentagon_activity_score(&scores, activity.is_late_night, activity.is_weekend);
            let (contribution, status) = pentagon_contribution(score);
            debug!(
                places = activity.places.len(),
                readings = scores.len(),
                first = activity.places.first().map(|p| p.name.as_str()).unwrap_or(""),
                score,
                "derived pentagon activity"
            );
            (contribution, status.to_string())
        }
        None => (1.0, activity.status.clone().unwrap_or_else(|| "Normal".to_string())),
    };

    let mut detail = status;
    if activity.is_late_night {
        detail.push_str(" (late night)");
    }
    if activity.is_weekend {
        detail.push_str(" (weekend)");
    }
    let risk = round_half_even(contribution / 10.0 * 100.0) as i64;
    let mut reading = reading(Signal::Pentagon, risk, detail, raw);
    reading.contribution = contribution;
    reading
}

/// Oil risk from Brent price level and its 24h move.
pub fn oil_risk(price: f64, change_24h: f64) -> i64 {
    let mut risk = 10;
    risk += match change_24h {
        c if c >= 5.0 => 50,
        c if c >= 3.0 => 35,
        c if c >= 1.5 => 20,
        c if c >= 0.5 => 10,
        c if c <= -2.0 => -5,
        _ => 0,
    };
    risk += match price {
        p if p >= 80.0 => 40,
        p if p >= 75.0 => 30,
        p if p >= 70.0 => 20,
        p if p >= 65.0 => 10,
        _ => 0,
    };
    risk.clamp(0, 100)
}

fn oil(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<OilPrices>(inputs, Signal::Oil);
    let oil = parsed.unwrap_or_default();
    let price = oil.current_price.unwrap_or(0.0);
    let change = oil.change_24h.unwrap_or(0.0);
    let risk = match (oil.risk, oil.current_price) {
        (Some(risk), _) => risk,
        (None, Some(price)) if price > 0.0 => oil_risk(price, change),
        _ => 10,
    };
    let detail = if price > 0.0 {
        format!("${price:.2} ({change:+.1}%)")
    } else {
        AWAITING.to_string()
    };
    reading(Signal::Oil, risk, detail, raw)
}

fn gdelt(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<Gdelt>(inputs, Signal::Gdelt);
    let gdelt = parsed.unwrap_or_default();
    let detail = if gdelt.article_count > 0 {
        format!("{} articles, tone {:.1}", gdelt.article_count, gdelt.avg_tone)
    } else {
        AWAITING.to_string()
    };
    reading(Signal::Gdelt, gdelt.risk.unwrap_or(10), detail, raw)
}

/// Search-interest risk from the current level and its spike over the 24h mean.
pub fn trends_risk(current: f64, avg_24h: f64) -> i64 {
    let mut risk = 5;
    risk += match current {
        c if c >= 80.0 => 60,
        c if c >= 60.0 => 45,
        c if c >= 40.0 => 30,
        c if c >= 25.0 => 15,
        c if c >= 10.0 => 5,
        _ => 0,
    };
    if avg_24h > 0.0 {
        risk += match current / avg_24h {
            r if r >= 3.0 => 30,
            r if r >= 2.0 => 20,
            r if r >= 1.5 => 10,
            _ => 0,
        };
    }
    risk.clamp(0, 100)
}

fn trends(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<SearchTrends>(inputs, Signal::Trends);
    let trends = parsed.unwrap_or_default();
    let interest = trends.current_interest.unwrap_or(0.0);
    let risk = match (trends.risk, trends.current_interest) {
        (Some(risk), _) => risk,
        (None, Some(current)) => trends_risk(current, trends.avg_24h.unwrap_or(0.0)),
        _ => 5,
    };
    let detail = if interest > 0.0 {
        format!(
            "Interest: {interest:.0}, '{}'",
            trends.peak_keyword.as_deref().unwrap_or("")
        )
    } else {
        AWAITING.to_string()
    };
    reading(Signal::Trends, risk, detail, raw)
}

fn tfr(inputs: &CollectedInputs) -> SignalReading {
    let (parsed, raw) = payload::<FlightRestrictions>(inputs, Signal::Tfr);
    let tfr = parsed.unwrap_or_default();
    let detail = if tfr.total_tfrs > 0 {
        format!(
            "{} TFRs ({} VIP, {} Security)",
            tfr.total_tfrs, tfr.vip_tfrs, tfr.security_tfrs
        )
    } else {
        AWAITING.to_string()
    };
    reading(Signal::Tfr, tfr.risk.unwrap_or(5), detail, raw)
}

fn buildup(result: &BuildupResult) -> SignalReading {
    let raw = serde_json::to_value(result).unwrap_or_else(|err| {
        warn!(error = %err, "failed to serialize buildup payload");
        Value::Object(Map::new())
    });
    reading(Signal::Buildup, result.risk, result.detail.clone(), raw)
}

/// One reading per signal, in `Signal::ALL` order. Never fails: missing or
/// malformed payloads fall back to each signal's neutral default.
pub fn derive_readings(inputs: &CollectedInputs, buildup_result: &BuildupResult) -> Vec<SignalReading> {
    Signal::ALL
        .into_iter()
        .map(|signal| match signal {
            Signal::News => news(inputs),
            Signal::Flight => flight(inputs),
            Signal::Tanker => tanker(inputs),
            Signal::Pentagon => pentagon(inputs),
            Signal::Polymarket => polymarket(inputs),
            Signal::Weather => weather(inputs),
            Signal::Oil => oil(inputs),
            Signal::Gdelt => gdelt(inputs),
            Signal::Trends => trends(inputs),
            Signal::Tfr => tfr(inputs),
            Signal::Buildup => buildup(buildup_result),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(document: Value) -> CollectedInputs {
        match document {
            Value::Object(map) => CollectedInputs::from_document(map),
            _ => CollectedInputs::default(),
        }
    }

    fn buildup_result(risk: i64) -> BuildupResult {
        BuildupResult {
            risk,
            detail: "No major combatants near CENTCOM (0 pts) | No air assets detected".into(),
            force_posture: None,
            carrier_air_risk: 0,
            land_air_risk: 5,
            air_presence_risk: 3,
            deployment_news_risk: 0,
            air_presence: Default::default(),
            deployment_news: Default::default(),
            naval_from_cache: false,
            timestamp: "2026-02-17T00:00:00Z".into(),
        }
    }

    fn find(readings: &[SignalReading], signal: Signal) -> &SignalReading {
        readings.iter().find(|r| r.signal == signal).unwrap()
    }

    #[test]
    fn empty_inputs_use_neutral_defaults() {
        let readings = derive_readings(&CollectedInputs::default(), &buildup_result(4));
        let risks: Vec<(Signal, i64)> = readings.iter().map(|r| (r.signal, r.risk)).collect();
        assert_eq!(
            risks,
            vec![
                (Signal::News, 3),
                (Signal::Flight, 3),
                (Signal::Tanker, 0),
                (Signal::Pentagon, 10),
                (Signal::Polymarket, 10),
                (Signal::Weather, 0),
                (Signal::Oil, 10),
                (Signal::Gdelt, 10),
                (Signal::Trends, 5),
                (Signal::Tfr, 5),
                (Signal::Buildup, 4),
            ]
        );
        assert_eq!(find(&readings, Signal::Pentagon).contribution, 1.0);
        assert_eq!(find(&readings, Signal::Polymarket).contribution, 0.0);
        assert_eq!(find(&readings, Signal::Oil).detail, AWAITING);
        assert_eq!(find(&readings, Signal::Oil).raw_data, json!({}));
    }

    #[test]
    fn news_risk_grows_with_alert_ratio() {
        let readings = derive_readings(
            &inputs(json!({"news": {"total_count": 20, "alert_count": 10}})),
            &buildup_result(0),
        );
        let news = find(&readings, Signal::News);
        // 0.5^2 * 85 = 21.25
        assert_eq!(news.risk, 21);
        assert_eq!(news.detail, "20 articles, 10 critical");
    }

    #[test]
    fn flight_tanker_and_weather_formulas() {
        let readings = derive_readings(
            &inputs(json!({
                "aviation": {"aircraft_count": 40},
                "tanker": {"tanker_count": 14},
                "weather": {"clouds": 26, "description": "scattered clouds"}
            })),
            &buildup_result(0),
        );
        assert_eq!(find(&readings, Signal::Flight).risk, 63);
        assert_eq!(find(&readings, Signal::Flight).detail, "40 aircraft over Iran");
        assert_eq!(find(&readings, Signal::Tanker).risk, 100);
        assert_eq!(find(&readings, Signal::Tanker).detail, "4 detected in region");
        assert_eq!(find(&readings, Signal::Weather).risk, 80);
        assert_eq!(find(&readings, Signal::Weather).detail, "scattered clouds");
    }

    #[test]
    fn polymarket_rejects_implausible_odds() {
        let readings = derive_readings(
            &inputs(json!({"polymarket": {"odds": 97}})),
            &buildup_result(0),
        );
        let market = find(&readings, Signal::Polymarket);
        assert_eq!(market.risk, 10);
        assert_eq!(market.contribution, 0.0);

        let readings = derive_readings(
            &inputs(json!({"polymarket": {"odds": 42}})),
            &buildup_result(0),
        );
        let market = find(&readings, Signal::Polymarket);
        assert_eq!(market.risk, 42);
        assert!((market.contribution - 4.2).abs() < 1e-9);
        assert_eq!(market.detail, "42% odds");
    }

    #[test]
    fn pentagon_activity_from_places() {
        assert_eq!(pentagon_activity_score(&[], false, false), 30);
        // (105 + 20 + 20) / 3 = 48.3
        assert_eq!(pentagon_activity_score(&[70.0, 20.0, 20.0], true, false), 48);
        assert_eq!(pentagon_activity_score(&[80.0, 80.0], false, true), 100);
        assert_eq!(pentagon_contribution(85), (10.0, "High Activity"));
        assert_eq!(pentagon_contribution(39), (1.0, "Low Activity"));

        let readings = derive_readings(
            &inputs(json!({"pentagon": {
                "is_late_night": true,
                "places": [
                    {"name": "Domino's", "score": 70},
                    {"name": "Papa John's", "score": 70},
                    {"name": "Pizza Hut", "score": 20}
                ]
            }})),
            &buildup_result(0),
        );
        // (105 + 105 + 20) / 3 = 76.7 -> 77 -> Elevated
        let pentagon = find(&readings, Signal::Pentagon);
        assert_eq!(pentagon.contribution, 7.0);
        assert_eq!(pentagon.risk, 70);
        assert_eq!(pentagon.detail, "Elevated (late night)");
    }

    #[test]
    fn oil_and_trends_derive_when_risk_absent() {
        assert_eq!(oil_risk(81.0, 5.5), 100);
        assert_eq!(oil_risk(60.0, -3.0), 5);
        assert_eq!(oil_risk(72.0, 1.0), 40);
        assert_eq!(trends_risk(45.0, 15.0), 65);
        assert_eq!(trends_risk(5.0, 0.0), 5);

        let readings = derive_readings(
            &inputs(json!({
                "oil": {"current_price": 72.4, "change_24h": 1.04},
                "trends": {"risk": 22, "current_interest": 31.0, "peak_keyword": "Iran strike"}
            })),
            &buildup_result(0),
        );
        assert_eq!(find(&readings, Signal::Oil).risk, 40);
        assert_eq!(find(&readings, Signal::Oil).detail, "$72.40 (+1.0%)");
        assert_eq!(find(&readings, Signal::Trends).risk, 22);
        assert_eq!(find(&readings, Signal::Trends).detail, "Interest: 31, 'Iran strike'");
    }

    #[test]
    fn malformed_payload_falls_back_but_keeps_raw() {
        let readings = derive_readings(
            &inputs(json!({"gdelt": {"article_count": "many"}})),
            &buildup_result(0),
        );
        let gdelt = find(&readings, Signal::Gdelt);
        assert_eq!(gdelt.risk, 10);
        assert_eq!(gdelt.raw_data, json!({"article_count": "many"}));
    }

    #[test]
    fn headline_lists_are_split_from_payloads() {
        let collected = inputs(json!({
            "air_headlines": ["F-35 arrives"],
            "deployment_headlines": "not a list",
            "tfr": {"risk": 40, "total_tfrs": 3, "vip_tfrs": 1, "security_tfrs": 2}
        }));
        assert_eq!(collected.air_headlines, Some(vec!["F-35 arrives".to_string()]));
        assert_eq!(collected.deployment_headlines, None);
        assert!(!collected.payloads.contains_key("air_headlines"));

        let readings = derive_readings(&collected, &buildup_result(0));
        assert_eq!(find(&readings, Signal::Tfr).detail, "3 TFRs (1 VIP, 2 Security)");
        assert_eq!(find(&readings, Signal::Tfr).risk, 40);
    }

    #[test]
    fn buildup_reading_carries_full_payload() {
        let readings = derive_readings(&CollectedInputs::default(), &buildup_result(37));
        let buildup = find(&readings, Signal::Buildup);
        assert_eq!(buildup.risk, 37);
        assert_eq!(buildup.raw_data["carrier_air_risk"], json!(0));
        assert_eq!(buildup.raw_data["force_posture"], Value::Null);
    }
}
