//! Human-readable duration parsing and formatting

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid duration format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Duration too large: {0}")]
    Overflow(String),
}

/// Duration wrapper with human-readable parsing (`"30s"`, `"5m"`, `"24h"`, `"1d"`)
///
/// A bare integer is read as seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub const fn from_secs(secs: u64) -> Self {
        HumanDuration(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }

    /// Same span as a signed calendar duration
    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.0).unwrap_or(chrono::Duration::MAX)
    }

    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, u64)] = &[("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)];

        let millis = self.0.as_millis();
        if millis % 1000 != 0 {
            return format!("{}ms", millis);
        }

        let secs = self.0.as_secs();
        for &(unit, divisor) in UNITS {
            if secs >= divisor && secs % divisor == 0 {
                return format!("{}{}", secs / divisor, unit);
            }
        }

        format!("{}s", secs)
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct HumanDurationVisitor;

        impl<'de> serde::de::Visitor<'de> for HumanDurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a duration as string (e.g., \"5m\", \"24h\") or seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(HumanDuration::from_secs(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(HumanDuration::from_secs)
                    .map_err(|_| E::custom(format!("negative duration: {v}")))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<HumanDuration>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(HumanDurationVisitor)
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        if let Ok(secs) = s.parse::<u64>() {
            return Ok(HumanDuration::from_secs(secs));
        }

        let (num_str, unit) = if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
            (&s[..pos], s[pos..].trim())
        } else {
            return Err(ParseError::InvalidFormat(s.to_string()));
        };

        if num_str.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }
        let num: u64 = num_str.parse()?;

        if unit == "ms" {
            return Ok(HumanDuration(Duration::from_millis(num)));
        }

        let multiplier: u64 = match unit {
            "s" | "sec" | "secs" => 1,
            "m" | "min" | "mins" => 60,
            "h" | "hr" | "hrs" => 3_600,
            "d" | "day" | "days" => 86_400,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        num.checked_mul(multiplier)
            .map(HumanDuration::from_secs)
            .ok_or_else(|| ParseError::Overflow(s.to_string()))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

impl From<HumanDuration> for Duration {
    fn from(value: HumanDuration) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!("300".parse::<HumanDuration>().unwrap().as_secs(), 300);
        assert_eq!("30s".parse::<HumanDuration>().unwrap().as_secs(), 30);
    }

    #[test]
    fn test_parse_minutes_hours_days() {
        assert_eq!("5m".parse::<HumanDuration>().unwrap().as_secs(), 300);
        assert_eq!("24h".parse::<HumanDuration>().unwrap().as_secs(), 86_400);
        assert_eq!("1d".parse::<HumanDuration>().unwrap().as_secs(), 86_400);
        assert_eq!("2 min".parse::<HumanDuration>().unwrap().as_secs(), 120);
    }

    #[test]
    fn test_parse_millis() {
        let parsed = "250ms".parse::<HumanDuration>().unwrap();
        assert_eq!(parsed.as_duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "5w".parse::<HumanDuration>(),
            Err(ParseError::InvalidUnit(_))
        ));
        assert!(matches!(
            "h".parse::<HumanDuration>(),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(HumanDuration::from_secs(300).to_human_readable(), "5m");
        assert_eq!(HumanDuration::from_secs(86_400).to_human_readable(), "1d");
        assert_eq!(HumanDuration::from_secs(90).to_human_readable(), "90s");
        assert_eq!(HumanDuration(Duration::from_millis(1500)).to_human_readable(), "1500ms");
    }

    #[test]
    fn test_as_chrono() {
        assert_eq!(
            HumanDuration::from_secs(3_600).as_chrono(),
            chrono::Duration::hours(1)
        );
    }

    #[test]
    fn test_deserialize_string() {
        let json = r#"{"interval": "5m"}"#;
        #[derive(Deserialize)]
        struct TestStruct {
            interval: HumanDuration,
        }
        let parsed: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.interval.as_secs(), 300);
    }

    #[test]
    fn test_deserialize_number() {
        let json = r#"{"interval": 45}"#;
        #[derive(Deserialize)]
        struct TestStruct {
            interval: HumanDuration,
        }
        let parsed: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.interval.as_secs(), 45);
    }
}
