use std::borrow::Cow;
use std::cmp::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::firestore::error::{invalid_argument, FirestoreResult};

const NANOS_PER_MILLI: i32 = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        let mut timestamp = Self { seconds, nanos };
        timestamp.normalize();
        timestamp
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_millis(millis: i64) -> Self {
        Self::new(
            millis.div_euclid(1000),
            (millis.rem_euclid(1000) as i32) * NANOS_PER_MILLI,
        )
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => Self {
                seconds: duration.as_secs() as i64,
                nanos: duration.subsec_nanos() as i32,
            },
            Err(err) => {
                let duration = err.duration();
                Self::new(
                    -(duration.as_secs() as i64),
                    -(duration.subsec_nanos() as i32),
                )
            }
        }
    }

    pub fn to_system_time(&self) -> SystemTime {
        if self.seconds >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.seconds as u64) + Duration::from_nanos(self.nanos as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs((-self.seconds) as u64) + Duration::from_nanos(self.nanos as u64)
        }
    }

    pub fn to_millis(&self) -> i64 {
        self.seconds * 1000 + i64::from(self.nanos / NANOS_PER_MILLI)
    }

    /// Drops everything below millisecond precision, rounding toward the past.
    pub fn truncated_to_millis(&self) -> Self {
        Self {
            seconds: self.seconds,
            nanos: self.nanos - self.nanos % NANOS_PER_MILLI,
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanos as u32).single()
    }

    /// ISO-8601 in UTC with exactly three fractional digits, e.g. `2024-01-02T03:04:05.678Z`.
    ///
    /// Returns `None` when the instant cannot be represented as a calendar date.
    pub fn to_rfc3339_millis(&self) -> Option<String> {
        self.truncated_to_millis()
            .to_datetime()
            .map(|datetime| datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Parses an RFC 3339 timestamp, truncating any fractional digits past the third.
    pub fn parse_rfc3339(value: &str) -> FirestoreResult<Self> {
        let trimmed = trim_sub_millis(value);
        let datetime = DateTime::parse_from_rfc3339(&trimmed)
            .map_err(|err| invalid_argument(format!("Invalid timestamp '{value}': {err}")))?;
        Ok(Self::from(datetime.with_timezone(&Utc)))
    }

    fn normalize(&mut self) {
        let extra_seconds = self.nanos.div_euclid(1_000_000_000);
        self.seconds += extra_seconds as i64;
        self.nanos = self.nanos.rem_euclid(1_000_000_000);
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(value.timestamp(), value.timestamp_subsec_nanos() as i32)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(value: SystemTime) -> Self {
        Self::from_system_time(value)
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.seconds.cmp(&other.seconds) {
            Ordering::Equal => self.nanos.cmp(&other.nanos),
            ordering => ordering,
        }
    }
}

/// Keeps at most three digits after the first decimal point.
fn trim_sub_millis(value: &str) -> Cow<'_, str> {
    let Some(dot) = value.find('.') else {
        return Cow::Borrowed(value);
    };
    let fraction = &value[dot + 1..];
    let digits = fraction.bytes().take_while(u8::is_ascii_digit).count();
    if digits <= 3 {
        return Cow::Borrowed(value);
    }
    let keep = dot + 1 + 3;
    let resume = dot + 1 + digits;
    Cow::Owned(format!("{}{}", &value[..keep], &value[resume..]))
}
