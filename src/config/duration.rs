//! Durations like `"1d12h"` in composition documents.

use std::sync::LazyLock;

use chrono::TimeDelta;
use derive_more::{Display, Error};
use regex::Regex;

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").unwrap()
});

const UNITS: [(usize, i64); 4] = [(1, 86_400), (2, 3_600), (3, 60), (4, 1)];

/// A duration is neither a number of seconds nor `[Nd][Nh][Nm][Ns]`.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Duration is malformed: {_0:?}")]
pub struct DurationParseError(#[error(ignore)] pub String);

/// Parses a bare number of seconds or a `[Nd][Nh][Nm][Ns]` string.
pub fn parse_duration(text: &str) -> Result<TimeDelta, DurationParseError> {
    let malformed = || DurationParseError(text.to_string());

    if text.is_empty() {
        return Err(malformed());
    }

    let seconds = if text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse::<i64>().map_err(|_| malformed())?
    } else {
        let captures = DURATION.captures(text).ok_or_else(malformed)?;

        let mut seconds: i64 = 0;
        for (group, factor) in UNITS {
            let Some(value) = captures.get(group) else {
                continue;
            };
            let value: i64 = value.as_str().parse().map_err(|_| malformed())?;
            seconds = value
                .checked_mul(factor)
                .and_then(|value| seconds.checked_add(value))
                .ok_or_else(malformed)?;
        }
        seconds
    };

    TimeDelta::try_seconds(seconds).ok_or_else(malformed)
}

/// Deserializes a duration given as integer seconds or as string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<TimeDelta, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(i64),
        Text(String),
    }

    match serde::Deserialize::deserialize(deserializer)? {
        Raw::Seconds(seconds) if seconds >= 0 => TimeDelta::try_seconds(seconds)
            .ok_or_else(|| serde::de::Error::custom(DurationParseError(seconds.to_string()))),
        Raw::Seconds(seconds) => Err(serde::de::Error::custom(DurationParseError(
            seconds.to_string(),
        ))),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units() {
        for (text, seconds) in [
            ("0", 0),
            ("60", 60),
            ("10s", 10),
            ("5m", 300),
            ("2h", 7_200),
            ("1d", 86_400),
            ("1d1h", 90_000),
            ("1h30m", 5_400),
            ("1d1h30m10s", 91_810),
            ("90m", 5_400),
        ] {
            assert_eq!(
                parse_duration(text),
                Ok(TimeDelta::seconds(seconds)),
                "{text}"
            );
        }
    }

    #[test]
    fn malformed() {
        for text in ["", "-5", "1w", "h", "1h1d", "1.5h", " 1h", "1d 1h", "99999999999999999999"] {
            assert_eq!(
                parse_duration(text),
                Err(DurationParseError(text.to_string())),
                "{text}"
            );
        }
    }

    #[test]
    fn deserialize_integer_and_string() {
        #[derive(Debug, serde::Deserialize)]
        struct Interval {
            #[serde(deserialize_with = "deserialize")]
            interval: TimeDelta,
        }

        let seconds: Interval = toml::from_str("interval = 3600").unwrap();
        assert_eq!(seconds.interval, TimeDelta::hours(1));

        let text: Interval = toml::from_str(r#"interval = "1h""#).unwrap();
        assert_eq!(text.interval, TimeDelta::hours(1));

        assert!(toml::from_str::<Interval>("interval = -1").is_err());
        assert!(toml::from_str::<Interval>(r#"interval = "soon""#).is_err());
    }
}
