//! Load and aggregate pipeline.
//!
//! [`load_history`] turns an input path into an [`OrderedRecordSet`];
//! [`aggregate`] computes a fresh [`DerivedMetrics`] bundle for any selection
//! of it.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use history_core::error::{HistoryError, Result};
use history_core::models::{CanonicalRecord, MetricParams};
use serde::Serialize;
use tracing::info;

use crate::aggregator::{
    ArtistHours, MetricAggregator, MonthlyHours, PlatformHours, RecentPlay, SkipOverview,
    SkippedTrack, StreakSummary, Totals, TrackHours,
};
use crate::normalizer::{normalize_sources, NormalizationStats};
use crate::reader::{collect_sources, parse_sources, NamedSource};
use crate::record_set::OrderedRecordSet;

// ── Public types ──────────────────────────────────────────────────────────────

/// What happened during a load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadMetadata {
    /// RFC 3339 timestamp when the load finished.
    pub loaded_at: String,
    /// Source names in discovery order.
    pub sources: Vec<String>,
    pub stats: NormalizationStats,
    pub load_time_seconds: f64,
}

/// An ordered record set together with its load metadata.
#[derive(Debug, Clone)]
pub struct LoadedHistory {
    pub records: OrderedRecordSet,
    pub metadata: LoadMetadata,
}

/// Every metric for one selection. Optional families are `None` when
/// disabled in [`MetricParams`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub totals: Totals,
    pub top_artists: Vec<ArtistHours>,
    pub top_tracks: Vec<TrackHours>,
    pub monthly_trend: Vec<MonthlyHours>,
    pub recent_activity: Vec<RecentPlay>,
    pub platforms: Option<Vec<PlatformHours>>,
    pub most_skipped: Option<Vec<SkippedTrack>>,
    pub skip_overview: Option<SkipOverview>,
    pub hourly: Option<[u64; 24]>,
    pub streaks: Option<StreakSummary>,
}

impl DerivedMetrics {
    pub fn is_empty(&self) -> bool {
        self.totals.plays == 0
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Discover, parse and normalize every source under `input`.
///
/// `input` may be an export directory, a single history file or a `.zip`
/// archive.
pub fn load_history(input: &Path) -> Result<LoadedHistory> {
    let sources = collect_sources(input)?;
    load_sources(&sources)
}

/// Parse and normalize already-read sources.
///
/// Fails when any source is malformed, or when the sources hold no valid
/// record at all.
pub fn load_sources(sources: &[NamedSource]) -> Result<LoadedHistory> {
    let start = Instant::now();

    let parsed = parse_sources(sources)?;
    let (records, stats) = normalize_sources(&parsed);

    if records.is_empty() {
        return Err(HistoryError::EmptyResult {
            sources: sources.len(),
        });
    }

    let records = OrderedRecordSet::from_records(records);
    info!(
        "Loaded {} records from {} source(s); dropped {} (missing ts {}, invalid ts {}, overlong {}); {} with unreadable duration",
        records.len(),
        sources.len(),
        stats.dropped(),
        stats.missing_timestamp,
        stats.invalid_timestamp,
        stats.overlong_play,
        stats.invalid_duration
    );

    Ok(LoadedHistory {
        records,
        metadata: LoadMetadata {
            loaded_at: Utc::now().to_rfc3339(),
            sources: sources.iter().map(|s| s.name.clone()).collect(),
            stats,
            load_time_seconds: start.elapsed().as_secs_f64(),
        },
    })
}

/// Compute every enabled metric for `records`.
pub fn aggregate(records: &[&CanonicalRecord], params: &MetricParams) -> DerivedMetrics {
    let threshold = params.skip_threshold_ms;

    DerivedMetrics {
        totals: MetricAggregator::totals(records),
        top_artists: MetricAggregator::top_artists(records, params.top_n),
        top_tracks: MetricAggregator::top_tracks(records, params.top_n),
        monthly_trend: MetricAggregator::monthly_trend(records),
        recent_activity: MetricAggregator::recent_activity(records, params.recent_limit),
        platforms: params
            .include_platforms
            .then(|| MetricAggregator::platform_breakdown(records)),
        most_skipped: params.include_skip_analysis.then(|| {
            MetricAggregator::most_skipped(records, threshold, params.min_skip_count, params.top_n)
        }),
        skip_overview: params
            .include_skip_analysis
            .then(|| MetricAggregator::skip_overview(records, threshold)),
        hourly: params
            .include_patterns
            .then(|| MetricAggregator::hourly_distribution(records)),
        streaks: params
            .include_patterns
            .then(|| MetricAggregator::listening_streaks(records)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
