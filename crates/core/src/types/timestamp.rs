//! Millisecond timestamps.
//!
//! Order timestamps are epoch milliseconds on the wire. Older records stored
//! them as ISO-8601 strings instead, so deserialization accepts a number, a
//! numeric string, or an RFC 3339 date and always normalizes to milliseconds.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EpochMillis(i64);

impl EpochMillis {
    /// Wrap a raw millisecond count.
    #[must_use]
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Convert a UTC instant.
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis())
    }

    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// The raw millisecond count.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Convert back into a UTC instant, if in range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    /// Whole minutes elapsed from `self` until `now`, rounded down.
    ///
    /// Negative when `now` precedes `self`.
    #[must_use]
    pub const fn whole_minutes_until(self, now: Self) -> i64 {
        (now.0 - self.0).div_euclid(60_000)
    }

    /// Parse any of the accepted textual forms.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(millis) = raw.parse::<i64>() {
            return Some(Self(millis));
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| Self(at.timestamp_millis()))
    }
}

impl From<DateTime<Utc>> for EpochMillis {
    fn from(at: DateTime<Utc>) -> Self {
        Self::from_datetime(at)
    }
}

impl Serialize for EpochMillis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for EpochMillis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EpochMillisVisitor)
    }
}

struct EpochMillisVisitor;

impl Visitor<'_> for EpochMillisVisitor {
    type Value = EpochMillis;

    fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("epoch milliseconds or an RFC 3339 date string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(EpochMillis(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(EpochMillis)
            .map_err(|_| E::custom("timestamp out of range"))
    }

    #[allow(clippy::cast_possible_truncation)] // sub-millisecond precision is discarded
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.is_finite() {
            Ok(EpochMillis(v.trunc() as i64))
        } else {
            Err(E::custom("timestamp must be finite"))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        EpochMillis::parse(v).ok_or_else(|| E::custom(format!("invalid timestamp: {v}")))
    }
}
