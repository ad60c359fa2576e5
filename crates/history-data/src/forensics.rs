//! Per-artist and per-track drill-downs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use history_core::formatting::{percentage, round_to};
use history_core::models::{CanonicalRecord, TrackKey};
use serde::Serialize;

use crate::aggregator::{MetricAggregator, MonthlyHours, TrackHours};

/// Bins in the listen-duration histogram.
pub const DURATION_BINS: usize = 20;

/// Plays of one artist, exact match on the artist name.
pub fn filter_artist<'a>(records: &[&'a CanonicalRecord], artist: &str) -> Vec<&'a CanonicalRecord> {
    records
        .iter()
        .copied()
        .filter(|r| r.artist.as_deref() == Some(artist))
        .collect()
}

/// Plays of exactly one `(track, artist)` pair.
pub fn filter_track<'a>(records: &[&'a CanonicalRecord], key: &TrackKey) -> Vec<&'a CanonicalRecord> {
    records
        .iter()
        .copied()
        .filter(|r| r.matches_track(key))
        .collect()
}

// ── Artist drill-down ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistDrillDown {
    pub artist: String,
    pub total_hours: f64,
    pub plays: u64,
    pub distinct_tracks: usize,
    pub top_tracks: Vec<TrackHours>,
    pub monthly_trend: Vec<MonthlyHours>,
}

/// Summarize one artist within `records`.
pub fn artist_drill_down(records: &[&CanonicalRecord], artist: &str, top_n: usize) -> ArtistDrillDown {
    let plays = filter_artist(records, artist);
    let tracks: BTreeSet<&str> = plays.iter().filter_map(|r| r.track_name.as_deref()).collect();

    ArtistDrillDown {
        artist: artist.to_string(),
        total_hours: plays.iter().map(|r| r.hours_played()).sum(),
        plays: plays.len() as u64,
        distinct_tracks: tracks.len(),
        top_tracks: MetricAggregator::top_tracks(&plays, top_n),
        monthly_trend: MetricAggregator::monthly_trend(&plays),
    }
}

// ── Track forensics ───────────────────────────────────────────────────────────

/// One equal-width bucket of listen seconds. The last bin includes its upper
/// edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// One play in a track's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub platform: Option<String>,
    pub skipped: Option<bool>,
    pub shuffle: Option<bool>,
    pub offline: Option<bool>,
    /// Seconds played, one decimal.
    pub seconds_played: Option<f64>,
    pub likely_skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackForensics {
    pub track: TrackKey,
    /// Every play of the track in the selection.
    pub plays: u64,
    pub skip_count: u64,
    /// `skip_count / plays × 100`.
    pub skip_rate: f64,
    /// Plays that were not likely skipped.
    pub total_plays: u64,
    pub total_hours: f64,
    pub avg_seconds: Option<f64>,
    pub daily_counts: BTreeMap<NaiveDate, u64>,
    pub hourly: [u64; 24],
    pub duration_histogram: Vec<HistogramBin>,
    /// Most recent first.
    pub history: Vec<PlayHistoryEntry>,
}

/// Listening forensics for `key`. Plays of other tracks in `records` are
/// ignored.
pub fn track_forensics(key: &TrackKey, records: &[&CanonicalRecord], threshold_ms: u64) -> TrackForensics {
    let plays = filter_track(records, key);
    let total = plays.len() as u64;
    let skip_count = plays
        .iter()
        .filter(|r| r.is_likely_skipped(threshold_ms))
        .count() as u64;

    let seconds: Vec<f64> = plays
        .iter()
        .filter_map(|r| r.ms_played)
        .map(|ms| ms as f64 / 1000.0)
        .collect();
    let avg_seconds = if seconds.is_empty() {
        None
    } else {
        Some(seconds.iter().sum::<f64>() / seconds.len() as f64)
    };

    let mut chronological = plays.clone();
    chronological.sort_by_key(|r| r.timestamp);
    let history = chronological
        .iter()
        .rev()
        .map(|r| PlayHistoryEntry {
            timestamp: r.timestamp,
            platform: r.platform.clone(),
            skipped: r.skipped,
            shuffle: r.shuffle,
            offline: r.offline,
            seconds_played: r.ms_played.map(|ms| round_to(ms as f64 / 1000.0, 1)),
            likely_skipped: r.is_likely_skipped(threshold_ms),
        })
        .collect();

    TrackForensics {
        track: key.clone(),
        plays: total,
        skip_count,
        skip_rate: percentage(skip_count as f64, total as f64, 2),
        total_plays: total - skip_count,
        total_hours: plays.iter().map(|r| r.hours_played()).sum(),
        avg_seconds,
        daily_counts: MetricAggregator::daily_counts(&plays),
        hourly: MetricAggregator::hourly_distribution(&plays),
        duration_histogram: duration_histogram(&seconds, DURATION_BINS),
        history,
    }
}

/// Split `values` into `bins` equal-width buckets between their minimum and
/// maximum. When every value is equal the range is widened by half a unit on
/// each side.
pub fn duration_histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;

    let mut counts = vec![0u64; bins];
    for &v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
