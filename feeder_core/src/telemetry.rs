//! Classification of inbound board lines.
//!
//! First match wins over an ordered rule list; specific markers come before
//! the generic keyword buckets. Classification never fails: a numeric line
//! that does not parse becomes a `ParseError` event.

use crate::error::ParseError;
use crate::log_sink::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoodLevel {
    Available,
    Low,
}

/// Anything farther than this from the ultrasonic sensor means the hopper
/// is running low.
pub const LOW_FOOD_DISTANCE_CM: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryKind {
    FoodLevel(FoodLevel),
    Distance { cm: f64, level: FoodLevel },
    SensorError,
    WeightReading(f64),
    ParseError(ParseError),
    Error,
    Warning,
    Success,
    Feed,
    Sensor,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub kind: TelemetryKind,
    pub severity: Severity,
    pub line: String,
}

impl Telemetry {
    /// Throttle category for high-frequency readings; `None` for everything
    /// that must always reach the log.
    pub fn throttle_key(&self) -> Option<&'static str> {
        match self.kind {
            TelemetryKind::Distance { .. } => Some("distance_reading"),
            TelemetryKind::WeightReading(_) => Some("weight_reading"),
            TelemetryKind::Sensor => Some("sensor_reading"),
            _ => None,
        }
    }
}

impl TelemetryKind {
    pub fn severity(&self) -> Severity {
        match self {
            TelemetryKind::FoodLevel(FoodLevel::Available) => Severity::Success,
            TelemetryKind::FoodLevel(FoodLevel::Low) => Severity::Warning,
            TelemetryKind::Distance { .. } | TelemetryKind::Sensor => Severity::Sensor,
            TelemetryKind::WeightReading(_) => Severity::Weight,
            TelemetryKind::SensorError | TelemetryKind::ParseError(_) | TelemetryKind::Error => {
                Severity::Error
            }
            TelemetryKind::Warning => Severity::Warning,
            TelemetryKind::Success => Severity::Success,
            TelemetryKind::Feed => Severity::Feed,
            TelemetryKind::Info => Severity::Info,
        }
    }
}

pub fn classify(line: &str) -> Telemetry {
    let kind = classify_kind(line.trim());
    Telemetry {
        severity: kind.severity(),
        kind,
        line: line.trim().to_string(),
    }
}

fn classify_kind(line: &str) -> TelemetryKind {
    let lower = line.to_lowercase();

    if lower.contains("food available") || line.contains('\u{2705}') {
        return TelemetryKind::FoodLevel(FoodLevel::Available);
    }
    if lower.contains("storage low") || lower.contains("storage empty") {
        return TelemetryKind::FoodLevel(FoodLevel::Low);
    }
    if let Some(rest) = lower.strip_prefix("distance:") {
        return match parse_reading(rest, &["centimeters", "cm"]) {
            Some(cm) if cm <= 0.0 => TelemetryKind::SensorError,
            Some(cm) => {
                let level = if cm > LOW_FOOD_DISTANCE_CM {
                    FoodLevel::Low
                } else {
                    FoodLevel::Available
                };
                TelemetryKind::Distance { cm, level }
            }
            None => parse_error("distance", line),
        };
    }
    if lower.contains("ultrasonic timeout") || lower.contains("no echo") {
        return TelemetryKind::SensorError;
    }
    if let Some(rest) = lower
        .strip_prefix("weight:")
        .or_else(|| lower.strip_prefix("w:"))
    {
        return match parse_reading(rest, &["grams", "g"]) {
            Some(g) => TelemetryKind::WeightReading(g),
            None => parse_error("weight", line),
        };
    }

    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(&["error", "fail"]) {
        TelemetryKind::Error
    } else if has(&["warning", "warn"]) {
        TelemetryKind::Warning
    } else if has(&["success", "ok", "complete"]) {
        TelemetryKind::Success
    } else if has(&["feed", "dispense"]) {
        TelemetryKind::Feed
    } else if has(&["sensor", "level"]) {
        TelemetryKind::Sensor
    } else {
        TelemetryKind::Info
    }
}

// Units are tried longest first so "grams" is not cut down to "gram".
fn parse_reading(raw: &str, units: &[&str]) -> Option<f64> {
    let mut s = raw.trim();
    for unit in units {
        if let Some(stripped) = s.strip_suffix(unit) {
            s = stripped.trim_end();
            break;
        }
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_error(field: &'static str, line: &str) -> TelemetryKind {
    TelemetryKind::ParseError(ParseError {
        field,
        line: line.to_string(),
    })
}

/// Remembers the last reported food level and only reports changes.
#[derive(Debug, Default)]
pub struct FoodLevelState {
    last: Option<FoodLevel>,
}

impl FoodLevelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(level)` when it differs from the previous observation.
    pub fn observe(&mut self, level: FoodLevel) -> Option<FoodLevel> {
        if self.last == Some(level) {
            return None;
        }
        self.last = Some(level);
        Some(level)
    }

    pub fn current(&self) -> Option<FoodLevel> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Food available", TelemetryKind::FoodLevel(FoodLevel::Available))]
    #[case("\u{2705} hopper ok", TelemetryKind::FoodLevel(FoodLevel::Available))]
    #[case("Storage low!", TelemetryKind::FoodLevel(FoodLevel::Low))]
    #[case("STORAGE EMPTY", TelemetryKind::FoodLevel(FoodLevel::Low))]
    #[case("Distance: 0 cm", TelemetryKind::SensorError)]
    #[case("Distance: 4.5 cm", TelemetryKind::Distance { cm: 4.5, level: FoodLevel::Available })]
    #[case("distance: 10centimeters", TelemetryKind::Distance { cm: 10.0, level: FoodLevel::Available })]
    #[case("Distance: 12.0", TelemetryKind::Distance { cm: 12.0, level: FoodLevel::Low })]
    #[case("Ultrasonic timeout", TelemetryKind::SensorError)]
    #[case("no echo received", TelemetryKind::SensorError)]
    #[case("Weight: 120.5g", TelemetryKind::WeightReading(120.5))]
    #[case("W: 3 grams", TelemetryKind::WeightReading(3.0))]
    #[case("Motor failure", TelemetryKind::Error)]
    #[case("Warn: battery", TelemetryKind::Warning)]
    #[case("Feed complete", TelemetryKind::Success)]
    #[case("Feeding for 5 seconds", TelemetryKind::Feed)]
    #[case("Dispense started", TelemetryKind::Feed)]
    #[case("Dispensing for 5 seconds", TelemetryKind::Info)]
    #[case("Sensor ready", TelemetryKind::Sensor)]
    #[case("PONG", TelemetryKind::Info)]
    fn rules_in_order(#[case] line: &str, #[case] expected: TelemetryKind) {
        assert_eq!(classify(line).kind, expected);
    }

    #[test]
    fn bad_numbers_become_parse_errors() {
        let t = classify("Weight: heavy");
        assert_eq!(t.severity, Severity::Error);
        assert!(matches!(t.kind, TelemetryKind::ParseError(ParseError { field: "weight", .. })));
        assert!(matches!(
            classify("Distance: NaN cm").kind,
            TelemetryKind::ParseError(ParseError { field: "distance", .. })
        ));
    }

    #[test]
    fn only_readings_are_throttled() {
        assert_eq!(classify("Weight: 1g").throttle_key(), Some("weight_reading"));
        assert_eq!(classify("Distance: 3 cm").throttle_key(), Some("distance_reading"));
        assert_eq!(classify("sensor level 2").throttle_key(), Some("sensor_reading"));
        assert_eq!(classify("Storage low").throttle_key(), None);
        assert_eq!(classify("Error: jam").throttle_key(), None);
    }

    #[test]
    fn food_level_reports_changes_only() {
        let mut s = FoodLevelState::new();
        assert_eq!(s.observe(FoodLevel::Available), Some(FoodLevel::Available));
        assert_eq!(s.observe(FoodLevel::Available), None);
        assert_eq!(s.observe(FoodLevel::Low), Some(FoodLevel::Low));
        assert_eq!(s.current(), Some(FoodLevel::Low));
    }
}
