//! Retention durations and their tiered string form.
//!
//! The appliance stores retention as integer seconds where an absent value
//! means the snapshot never expires. Declarations use a coarse string such as
//! `"3 Hour(s)"`. The two directions are intentionally lossy:
//!
//! - every tier below years truncates, the year tier rounds up;
//! - the week/year switch happens at 29030400 seconds, which is what the
//!   appliance itself reports for one year, while decoding a year multiplies by
//!   31536000.
//!
//! Values near those edges do not round-trip.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ErrorKind;

/// Encoded form of [`RetentionDuration::Unbounded`].
pub const NEVER_EXPIRES: &str = "Never Expires";

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;
const WEEK: i64 = 604_800;
/// Seconds at which encoding switches from weeks to years.
pub const YEAR_THRESHOLD: i64 = 29_030_400;
/// Seconds per year when decoding and when rounding the year tier.
pub const YEAR: i64 = 31_536_000;

/// Duration codec failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    /// Input does not split into exactly `{number} {unit}`
    #[error("invalid time format: {input:?}")]
    InvalidFormat { input: String },

    /// The number token is not an integer
    #[error("invalid time value: {token:?}")]
    InvalidValue { token: String },

    /// The unit token is not a recognised unit
    #[error("unknown time unit: {unit:?}")]
    UnknownUnit { unit: String },

    /// Seconds would fall below zero
    #[error("negative duration: {value} {unit}")]
    Negative { value: i64, unit: String },

    /// Seconds would exceed the signed 32-bit range
    #[error("integer overflow converting {value} {unit} to seconds")]
    Overflow { value: i64, unit: String },
}

impl DurationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DurationError::Negative { .. } | DurationError::Overflow { .. } => ErrorKind::Overflow,
            _ => ErrorKind::Format,
        }
    }

    pub fn is_unknown_unit(&self) -> bool {
        matches!(self, DurationError::UnknownUnit { .. })
    }
}

/// Retention time as the appliance models it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RetentionDuration {
    /// Never expires
    Unbounded,
    /// A non-negative number of seconds
    Seconds(Seconds),
}

/// Non-negative seconds that fit a signed 32-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Seconds(i32);

impl Seconds {
    pub fn new(value: i32) -> Result<Self, DurationError> {
        if value < 0 {
            return Err(DurationError::Negative {
                value: i64::from(value),
                unit: "second(s)".to_string(),
            });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for Seconds {
    type Error = DurationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Seconds::new(value)
    }
}

impl From<Seconds> for i32 {
    fn from(value: Seconds) -> Self {
        value.0
    }
}

impl RetentionDuration {
    /// Build from a seconds count, rejecting negatives.
    pub fn seconds(value: i32) -> Result<Self, DurationError> {
        Seconds::new(value).map(RetentionDuration::Seconds)
    }

    /// Interpret the appliance field, where `None` means never expires.
    pub fn from_wire(value: Option<i32>) -> Result<Self, DurationError> {
        match value {
            None => Ok(RetentionDuration::Unbounded),
            Some(seconds) => RetentionDuration::seconds(seconds),
        }
    }

    /// The appliance field for this duration.
    pub fn to_wire(self) -> Option<i32> {
        match self {
            RetentionDuration::Unbounded => None,
            RetentionDuration::Seconds(seconds) => Some(seconds.get()),
        }
    }

    pub fn is_unbounded(self) -> bool {
        matches!(self, RetentionDuration::Unbounded)
    }
}

/// Render a duration in its tiered human-readable form.
pub fn encode(duration: RetentionDuration) -> String {
    let s = match duration {
        RetentionDuration::Unbounded => return NEVER_EXPIRES.to_string(),
        RetentionDuration::Seconds(seconds) => i64::from(seconds.get()),
    };

    if s < MINUTE {
        format!("{s} Second(s)")
    } else if s < HOUR {
        format!("{} Minute(s)", s / MINUTE)
    } else if s < DAY {
        format!("{} Hour(s)", s / HOUR)
    } else if s < WEEK {
        format!("{} Day(s)", s / DAY)
    } else if s < YEAR_THRESHOLD {
        format!("{} Week(s)", s / WEEK)
    } else {
        // years always round up
        format!("{} Year(s)", (s + YEAR - 1) / YEAR)
    }
}

/// Parse the tiered string form back into a duration.
pub fn decode(input: &str) -> Result<RetentionDuration, DurationError> {
    if input == NEVER_EXPIRES {
        return Ok(RetentionDuration::Unbounded);
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    let [number, unit] = parts.as_slice() else {
        return Err(DurationError::InvalidFormat {
            input: input.to_string(),
        });
    };

    let value: i64 = number.parse().map_err(|_| DurationError::InvalidValue {
        token: (*number).to_string(),
    })?;

    let unit = unit.to_lowercase();
    let multiplier = match unit.as_str() {
        "second(s)" => 1,
        "minute(s)" => MINUTE,
        "hour(s)" => HOUR,
        "day(s)" => DAY,
        "week(s)" => WEEK,
        "year(s)" => YEAR,
        _ => return Err(DurationError::UnknownUnit { unit }),
    };

    if value < 0 {
        return Err(DurationError::Negative { value, unit });
    }

    let seconds = value
        .checked_mul(multiplier)
        .and_then(|total| i32::try_from(total).ok())
        .ok_or_else(|| DurationError::Overflow {
            value,
            unit: unit.clone(),
        })?;

    RetentionDuration::seconds(seconds)
}

impl fmt::Display for RetentionDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(*self))
    }
}

impl FromStr for RetentionDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(value: i32) -> RetentionDuration {
        RetentionDuration::seconds(value).unwrap()
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(encode(secs(0)), "0 Second(s)");
        assert_eq!(encode(secs(59)), "59 Second(s)");
        assert_eq!(encode(secs(60)), "1 Minute(s)");
        assert_eq!(encode(secs(3599)), "59 Minute(s)");
        assert_eq!(encode(secs(3600)), "1 Hour(s)");
        assert_eq!(encode(secs(86_399)), "23 Hour(s)");
        assert_eq!(encode(secs(86_400)), "1 Day(s)");
        assert_eq!(encode(secs(604_799)), "6 Day(s)");
        assert_eq!(encode(secs(604_800)), "1 Week(s)");
        assert_eq!(encode(secs(29_030_399)), "47 Week(s)");
    }

    #[test]
    fn years_round_up() {
        assert_eq!(encode(secs(29_030_400)), "1 Year(s)");
        assert_eq!(encode(secs(31_536_000)), "1 Year(s)");
        assert_eq!(encode(secs(31_536_001)), "2 Year(s)");
        assert_eq!(encode(secs(63_072_000)), "2 Year(s)");
        assert_eq!(encode(secs(i32::MAX)), "69 Year(s)");
    }

    #[test]
    fn unbounded_round_trips() {
        assert_eq!(encode(RetentionDuration::Unbounded), NEVER_EXPIRES);
        assert_eq!(decode("Never Expires"), Ok(RetentionDuration::Unbounded));
    }

    #[test]
    fn decode_units() {
        assert_eq!(decode("3 Hour(s)"), Ok(secs(10_800)));
        assert_eq!(decode("10800 Second(s)"), Ok(secs(10_800)));
        assert_eq!(decode("2 week(s)"), Ok(secs(1_209_600)));
        assert_eq!(decode("1 YEAR(S)"), Ok(secs(31_536_000)));
        assert_eq!(decode("  4   Day(s) "), Ok(secs(345_600)));
    }

    #[test]
    fn decode_format_errors() {
        let err = decode("garbage").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(matches!(err, DurationError::InvalidFormat { .. }));

        let err = decode("three Hour(s)").unwrap_err();
        assert!(matches!(err, DurationError::InvalidValue { .. }));

        let err = decode("1 2 Hour(s)").unwrap_err();
        assert!(matches!(err, DurationError::InvalidFormat { .. }));

        // "never expires" is only recognised verbatim
        let err = decode("never expires").unwrap_err();
        assert!(matches!(err, DurationError::InvalidValue { .. }));
    }

    #[test]
    fn decode_unknown_unit() {
        let err = decode("5 lightyears").unwrap_err();
        assert!(err.is_unknown_unit());
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn decode_overflow() {
        let err = decode("69 Year(s)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overflow);
        assert_eq!(decode("2147483647 Second(s)"), Ok(secs(i32::MAX)));
        assert!(matches!(
            decode("2147483648 Second(s)"),
            Err(DurationError::Overflow { .. })
        ));
        assert!(matches!(
            decode("9223372036854775807 Year(s)"),
            Err(DurationError::Overflow { .. })
        ));
    }

    #[test]
    fn decode_rejects_negative() {
        let err = decode("-1 Day(s)").unwrap_err();
        assert!(matches!(err, DurationError::Negative { value: -1, .. }));
        assert!(RetentionDuration::seconds(-5).is_err());
    }

    #[test]
    fn lossy_round_trip_is_preserved() {
        // 1.5 hours truncates to one hour
        assert_eq!(decode(&encode(secs(5_400))), Ok(secs(3_600)));
        // the year threshold is below one decoded year
        assert_eq!(decode(&encode(secs(29_030_400))), Ok(secs(31_536_000)));
    }

    #[test]
    fn wire_mapping() {
        assert_eq!(RetentionDuration::from_wire(None), Ok(RetentionDuration::Unbounded));
        assert_eq!(RetentionDuration::from_wire(Some(60)), Ok(secs(60)));
        assert!(RetentionDuration::from_wire(Some(-1)).is_err());
        assert_eq!(secs(60).to_wire(), Some(60));
        assert_eq!(RetentionDuration::Unbounded.to_wire(), None);
    }

    proptest! {
        #[test]
        fn sub_minute_values_render_as_seconds(s in 0i32..60) {
            prop_assert_eq!(encode(secs(s)), format!("{s} Second(s)"));
        }

        #[test]
        fn encoded_values_always_decode(s in 0i32..=i32::MAX) {
            let rendered = encode(secs(s));
            // only the year tier can round past the representable range
            if s < YEAR_THRESHOLD as i32 {
                let decoded = decode(&rendered).unwrap();
                let RetentionDuration::Seconds(back) = decoded else {
                    panic!("bounded value decoded as unbounded");
                };
                prop_assert!(back.get() <= s);
            }
        }
    }
}
