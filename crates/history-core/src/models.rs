use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest play (one hour) a canonical record may carry.
pub const MAX_MS_PLAYED: u64 = 3_600_000;

/// Threshold used for the most-skipped ranking and track forensics.
pub const DEFAULT_SKIP_THRESHOLD_MS: u64 = 15_000;

/// Looser threshold some report layouts use for "likely skipped".
pub const LENIENT_SKIP_THRESHOLD_MS: u64 = 30_000;

/// Minimum number of skips before a track enters the most-skipped ranking.
pub const DEFAULT_MIN_SKIP_COUNT: u64 = 3;

/// Default length of every top-N ranking.
pub const DEFAULT_TOP_N: usize = 10;

const MS_PER_HOUR: f64 = 3_600_000.0;

// ── RawEvent ──────────────────────────────────────────────────────────────────

/// One untyped play event as it appears in a streaming-history JSON array.
///
/// A key holding JSON `null` reads exactly like a missing key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(pub Map<String, Value>);

impl RawEvent {
    pub const TS: &'static str = "ts";
    pub const MS_PLAYED: &'static str = "ms_played";
    pub const PLATFORM: &'static str = "platform";
    pub const TRACK_NAME: &'static str = "master_metadata_track_name";
    pub const ARTIST: &'static str = "master_metadata_album_artist_name";
    pub const ALBUM: &'static str = "master_metadata_album_album_name";
    pub const TRACK_URI: &'static str = "spotify_track_uri";
    pub const SKIPPED: &'static str = "skipped";
    pub const SHUFFLE: &'static str = "shuffle";
    pub const OFFLINE: &'static str = "offline";
    pub const INCOGNITO_MODE: &'static str = "incognito_mode";

    /// The value under `key`, with `null` folded into `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.0.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }

    /// String value under `key`; non-string values read as absent.
    pub fn str_field(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    /// Boolean value under `key`; non-boolean values read as absent.
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }
}

impl From<Value> for RawEvent {
    /// Non-object values become an empty event.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => RawEvent(map),
            _ => RawEvent::default(),
        }
    }
}

// ── CanonicalRecord ───────────────────────────────────────────────────────────

/// A validated play event. Every downstream computation reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// When the play ended, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    pub platform: Option<String>,
    /// `None` means the duration is unknown, which is not the same as zero.
    pub ms_played: Option<u64>,
    pub track_name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub uri: Option<String>,
    pub skipped: Option<bool>,
    pub shuffle: Option<bool>,
    pub offline: Option<bool>,
    pub incognito_mode: Option<bool>,
    /// Name of the file or archive member the event came from.
    pub source_file: String,
}

impl CanonicalRecord {
    /// Hours played; an unknown duration contributes nothing.
    pub fn hours_played(&self) -> f64 {
        self.ms_played.map(|ms| ms as f64 / MS_PER_HOUR).unwrap_or(0.0)
    }

    /// Calendar date of the play in UTC.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// `true` when the duration is known and shorter than `threshold_ms`.
    pub fn is_likely_skipped(&self, threshold_ms: u64) -> bool {
        matches!(self.ms_played, Some(ms) if ms < threshold_ms)
    }

    /// `(track_name, artist)` when both are known.
    pub fn track_key(&self) -> Option<TrackKey> {
        match (&self.track_name, &self.artist) {
            (Some(track), Some(artist)) => Some(TrackKey::new(track, artist)),
            _ => None,
        }
    }

    /// `true` when this play is of exactly `key`.
    pub fn matches_track(&self, key: &TrackKey) -> bool {
        self.track_name.as_deref() == Some(key.track_name.as_str())
            && self.artist.as_deref() == Some(key.artist.as_str())
    }
}

// ── TrackKey ──────────────────────────────────────────────────────────────────

/// Identity of a track for grouping: the name alone is not unique.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    pub track_name: String,
    pub artist: String,
}

impl TrackKey {
    pub fn new(track_name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            artist: artist.into(),
        }
    }
}

impl std::fmt::Display for TrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.track_name, self.artist)
    }
}

// ── MetricParams ──────────────────────────────────────────────────────────────

/// Knobs for one aggregation run.
///
/// The skip threshold is never implied: every skip-related figure is computed
/// against `skip_threshold_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricParams {
    /// Length of the artist and track rankings.
    pub top_n: usize,
    /// Plays shorter than this (in ms) count as likely skipped.
    pub skip_threshold_ms: u64,
    /// Minimum skips for a track to enter the most-skipped ranking.
    pub min_skip_count: u64,
    /// How many plays the recent-activity list keeps.
    pub recent_limit: usize,
    /// Compute the per-platform hour breakdown.
    pub include_platforms: bool,
    /// Compute the most-skipped ranking and skip overview.
    pub include_skip_analysis: bool,
    /// Compute hour-of-day and daily-streak patterns.
    pub include_patterns: bool,
}

impl Default for MetricParams {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            skip_threshold_ms: DEFAULT_SKIP_THRESHOLD_MS,
            min_skip_count: DEFAULT_MIN_SKIP_COUNT,
            recent_limit: 100,
            include_platforms: true,
            include_skip_analysis: true,
            include_patterns: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(ms: Option<u64>) -> CanonicalRecord {
        CanonicalRecord {
            timestamp: Utc.with_ymd_and_hms(2023, 5, 1, 23, 30, 0).unwrap(),
            platform: Some("android".to_string()),
            ms_played: ms,
            track_name: Some("Hyperballad".to_string()),
            artist: Some("Björk".to_string()),
            album: Some("Post".to_string()),
            uri: Some("spotify:track:abc".to_string()),
            skipped: Some(false),
            shuffle: None,
            offline: None,
            incognito_mode: None,
            source_file: "Streaming_History_Audio_2023.json".to_string(),
        }
    }

    #[test]
    fn test_raw_event_null_reads_as_absent() {
        let event = RawEvent::from(json!({
            "platform": null,
            "master_metadata_track_name": "Song",
            "shuffle": true,
        }));
        assert!(event.get(RawEvent::PLATFORM).is_none());
        assert!(event.str_field(RawEvent::PLATFORM).is_none());
        assert_eq!(
            event.str_field(RawEvent::TRACK_NAME),
            Some("Song".to_string())
        );
        assert_eq!(event.bool_field(RawEvent::SHUFFLE), Some(true));
        assert!(event.bool_field(RawEvent::OFFLINE).is_none());
    }

    #[test]
    fn test_raw_event_wrong_type_reads_as_absent() {
        let event = RawEvent::from(json!({"shuffle": "yes", "platform": 12}));
        assert!(event.bool_field(RawEvent::SHUFFLE).is_none());
        assert!(event.str_field(RawEvent::PLATFORM).is_none());
    }

    #[test]
    fn test_hours_played_absent_is_zero_contribution() {
        assert_eq!(record(None).hours_played(), 0.0);
        assert!((record(Some(1_800_000)).hours_played() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_is_likely_skipped() {
        assert!(record(Some(14_999)).is_likely_skipped(15_000));
        assert!(!record(Some(15_000)).is_likely_skipped(15_000));
        assert!(record(Some(0)).is_likely_skipped(15_000));
        assert!(!record(None).is_likely_skipped(15_000));
        assert!(record(Some(20_000)).is_likely_skipped(LENIENT_SKIP_THRESHOLD_MS));
    }

    #[test]
    fn test_date_is_utc_calendar_date() {
        assert_eq!(
            record(None).date(),
            NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()
        );
    }

    #[test]
    fn test_track_key_requires_both_fields() {
        let mut r = record(Some(1));
        assert_eq!(r.track_key(), Some(TrackKey::new("Hyperballad", "Björk")));
        r.artist = None;
        assert!(r.track_key().is_none());
    }

    #[test]
    fn test_matches_track() {
        let r = record(Some(1));
        assert!(r.matches_track(&TrackKey::new("Hyperballad", "Björk")));
        assert!(!r.matches_track(&TrackKey::new("Hyperballad", "Someone Else")));
    }

    #[test]
    fn test_track_key_display() {
        assert_eq!(
            TrackKey::new("Hyperballad", "Björk").to_string(),
            "Hyperballad - Björk"
        );
    }

    #[test]
    fn test_metric_params_defaults() {
        let params = MetricParams::default();
        assert_eq!(params.top_n, 10);
        assert_eq!(params.skip_threshold_ms, 15_000);
        assert_eq!(params.min_skip_count, 3);
        assert_eq!(params.recent_limit, 100);
        assert!(params.include_platforms);
    }
}
