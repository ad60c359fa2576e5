use std::borrow::Cow;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::MAX_MS_PLAYED;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses the `ts` strings found in streaming-history exports.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Replace a trailing `Z` zone marker with an explicit `+00:00` offset.
    ///
    /// ```
    /// use history_core::data_processors::TimestampProcessor;
    ///
    /// assert_eq!(
    ///     TimestampProcessor::normalize_zulu("2023-01-01T10:00:00Z"),
    ///     "2023-01-01T10:00:00+00:00"
    /// );
    /// assert_eq!(
    ///     TimestampProcessor::normalize_zulu("2023-01-01T10:00:00+02:00"),
    ///     "2023-01-01T10:00:00+02:00"
    /// );
    /// ```
    pub fn normalize_zulu(s: &str) -> Cow<'_, str> {
        match s.strip_suffix('Z') {
            Some(stripped) => Cow::Owned(format!("{}+00:00", stripped)),
            None => Cow::Borrowed(s),
        }
    }

    /// Parse a JSON value into a UTC instant. Only non-empty strings qualify.
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => Self::parse_str(s),
            _ => None,
        }
    }

    /// Parse an ISO 8601 timestamp string into a UTC instant.
    ///
    /// Offset-carrying strings are converted to UTC. Strings without any
    /// offset are read as UTC wall-clock time. Failures are silent; callers
    /// count them.
    pub fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let normalised = Self::normalize_zulu(s);
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];
        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        None
    }
}

// ── DurationExtractor ─────────────────────────────────────────────────────────

/// How an event's `ms_played` field reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayDuration {
    /// Missing or `null`.
    Absent,
    /// A whole number of milliseconds within the one-hour cap.
    Valid(u64),
    /// Longer than [`MAX_MS_PLAYED`].
    Overlong(u64),
    /// Negative, fractional or non-numeric.
    Invalid,
}

/// Classifies the `ms_played` value of a raw event.
pub struct DurationExtractor;

impl DurationExtractor {
    pub fn classify(value: Option<&Value>) -> PlayDuration {
        let Some(value) = value else {
            return PlayDuration::Absent;
        };
        match value {
            Value::Null => PlayDuration::Absent,
            Value::Number(n) => match n.as_u64() {
                Some(ms) if ms > MAX_MS_PLAYED => PlayDuration::Overlong(ms),
                Some(ms) => PlayDuration::Valid(ms),
                None => Self::classify_float(n.as_f64()),
            },
            _ => PlayDuration::Invalid,
        }
    }

    /// Whole-valued floats such as `1200.0` are accepted as integers.
    fn classify_float(f: Option<f64>) -> PlayDuration {
        match f {
            Some(f) if f >= 0.0 && f.fract() == 0.0 && f.is_finite() => {
                if f > MAX_MS_PLAYED as f64 {
                    PlayDuration::Overlong(f as u64)
                } else {
                    PlayDuration::Valid(f as u64)
                }
            }
            _ => PlayDuration::Invalid,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
