//! Outbound command grammar understood by the feeder firmware.

use std::fmt;
use std::str::FromStr;

/// Bounds for the seconds argument of FEED/DISPENSE.
pub const MIN_SECONDS: u8 = 1;
pub const MAX_SECONDS: u8 = 30;

/// Clamp a requested duration into the range the firmware accepts.
pub fn clamp_seconds(n: i64) -> u8 {
    // Bounded by the clamp, the cast cannot truncate.
    n.clamp(i64::from(MIN_SECONDS), i64::from(MAX_SECONDS)) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Feed(u8),
    Dispense(u8),
    LedOn,
    LedOff,
    Status,
    Weight,
    Tare,
    Cal,
    Distance,
    UltraTest,
    UltraStats,
    UltraReset,
}

impl Command {
    pub fn feed(seconds: i64) -> Self {
        Command::Feed(clamp_seconds(seconds))
    }

    pub fn dispense(seconds: i64) -> Self {
        Command::Dispense(clamp_seconds(seconds))
    }

    /// Commands cycled by the stress test.
    pub const STRESS_SET: [Command; 4] = [
        Command::Ping,
        Command::LedOn,
        Command::LedOff,
        Command::Status,
    ];
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Clamp again at the wire: the variants are constructible directly.
            Command::Feed(n) => write!(f, "FEED_{}", (*n).clamp(MIN_SECONDS, MAX_SECONDS)),
            Command::Dispense(n) => {
                write!(f, "DISPENSE_{}", (*n).clamp(MIN_SECONDS, MAX_SECONDS))
            }
            Command::Ping => f.write_str("PING"),
            Command::LedOn => f.write_str("LED_ON"),
            Command::LedOff => f.write_str("LED_OFF"),
            Command::Status => f.write_str("STATUS"),
            Command::Weight => f.write_str("WEIGHT"),
            Command::Tare => f.write_str("TARE"),
            Command::Cal => f.write_str("CAL"),
            Command::Distance => f.write_str("DISTANCE"),
            Command::UltraTest => f.write_str("ULTRA_TEST"),
            Command::UltraStats => f.write_str("ULTRA_STATS"),
            Command::UltraReset => f.write_str("ULTRA_RESET"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Case-insensitive. Out-of-range durations are clamped, not rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let unknown = || UnknownCommand(s.trim().to_string());

        let with_seconds = |arg: &str| arg.parse::<i64>().map(clamp_seconds).map_err(|_| unknown());
        if let Some(arg) = upper.strip_prefix("FEED_") {
            return with_seconds(arg).map(Command::Feed);
        }
        if let Some(arg) = upper.strip_prefix("DISPENSE_") {
            return with_seconds(arg).map(Command::Dispense);
        }

        Ok(match upper.as_str() {
            "PING" => Command::Ping,
            "LED_ON" => Command::LedOn,
            "LED_OFF" => Command::LedOff,
            "STATUS" => Command::Status,
            "WEIGHT" => Command::Weight,
            "TARE" => Command::Tare,
            "CAL" => Command::Cal,
            "DISTANCE" => Command::Distance,
            "ULTRA_TEST" => Command::UltraTest,
            "ULTRA_STATS" => Command::UltraStats,
            "ULTRA_RESET" => Command::UltraReset,
            _ => return Err(unknown()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Command::feed(0), "FEED_1")]
    #[case(Command::feed(-4), "FEED_1")]
    #[case(Command::feed(12), "FEED_12")]
    #[case(Command::feed(99), "FEED_30")]
    #[case(Command::dispense(31), "DISPENSE_30")]
    #[case(Command::Feed(200), "FEED_30")]
    #[case(Command::UltraReset, "ULTRA_RESET")]
    fn renders_wire_text(#[case] cmd: Command, #[case] wire: &str) {
        assert_eq!(cmd.to_string(), wire);
    }

    #[rstest]
    #[case("ping", Command::Ping)]
    #[case(" led_on ", Command::LedOn)]
    #[case("Feed_7", Command::Feed(7))]
    #[case("DISPENSE_45", Command::Dispense(30))]
    #[case("ultra_stats", Command::UltraStats)]
    fn parses_case_insensitively(#[case] text: &str, #[case] expected: Command) {
        assert_eq!(text.parse::<Command>(), Ok(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert!("FEED_x".parse::<Command>().is_err());
        assert!("REBOOT".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }
}
