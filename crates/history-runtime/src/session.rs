//! Session over one loaded listening history.
//!
//! Loads once, then answers selections against the same record set. The
//! metrics of the most recently requested date range are kept so repeated
//! requests for it skip recomputation. Every other query is recomputed from
//! scratch.

use std::path::Path;

use chrono::NaiveDate;
use history_core::error::Result;
use history_core::models::{CanonicalRecord, MetricParams, TrackKey};
use history_data::aggregator::{MetricAggregator, TrackOption};
use history_data::analysis::{aggregate, load_history, DerivedMetrics, LoadMetadata, LoadedHistory};
use history_data::forensics::{artist_drill_down, track_forensics, ArtistDrillDown, TrackForensics};
use history_data::record_set::{DateRange, OrderedRecordSet};
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedMetrics {
    range: DateRange,
    metrics: DerivedMetrics,
}

/// One loaded history plus the knobs used to aggregate it.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use history_runtime::core::models::MetricParams;
/// use history_runtime::session::HistorySession;
///
/// let mut session = HistorySession::open(Path::new("my_spotify_data.zip"), MetricParams::default())?;
/// if let Some(range) = session.full_range() {
///     println!("{} plays", session.metrics(range).totals.plays);
/// }
/// # Ok::<(), history_runtime::core::error::HistoryError>(())
/// ```
#[derive(Debug)]
pub struct HistorySession {
    history: LoadedHistory,
    params: MetricParams,
    cache: Option<CachedMetrics>,
}

impl HistorySession {
    pub fn new(history: LoadedHistory, params: MetricParams) -> Self {
        Self {
            history,
            params,
            cache: None,
        }
    }

    /// Load `input` (directory, history file or `.zip` archive).
    pub fn open(input: &Path, params: MetricParams) -> Result<Self> {
        Ok(Self::new(load_history(input)?, params))
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn records(&self) -> &OrderedRecordSet {
        &self.history.records
    }

    pub fn metadata(&self) -> &LoadMetadata {
        &self.history.metadata
    }

    pub fn params(&self) -> &MetricParams {
        &self.params
    }

    /// Replace the aggregation knobs. Cached metrics are dropped when they
    /// change.
    pub fn set_params(&mut self, params: MetricParams) {
        if params != self.params {
            self.params = params;
            self.invalidate_cache();
        }
    }

    /// Range of the cached metrics, if any.
    pub fn cached_range(&self) -> Option<DateRange> {
        self.cache.as_ref().map(|c| c.range)
    }

    // ── Selections ────────────────────────────────────────────────────────

    /// First to last day with data.
    pub fn full_range(&self) -> Option<DateRange> {
        self.history.records.date_span()
    }

    /// Fill a missing bound from the full span.
    pub fn resolve_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<DateRange> {
        let span = self.full_range()?;
        Some(DateRange::new(
            start.unwrap_or(span.start),
            end.unwrap_or(span.end),
        ))
    }

    /// Records whose UTC date lies within `range`.
    pub fn select(&self, range: DateRange) -> Vec<&CanonicalRecord> {
        self.history.records.in_date_range(range).iter().collect()
    }

    /// Derived metrics for `range`, reusing the cached bundle when the range
    /// is the one last requested.
    pub fn metrics(&mut self, range: DateRange) -> &DerivedMetrics {
        let records = &self.history.records;
        let params = &self.params;

        let cached = match self.cache.take() {
            Some(hit) if hit.range == range => {
                debug!("Metrics cache hit for {}", range);
                hit
            }
            _ => {
                let selection: Vec<&CanonicalRecord> = records.in_date_range(range).iter().collect();
                debug!("Aggregating {} records for {}", selection.len(), range);
                CachedMetrics {
                    range,
                    metrics: aggregate(&selection, params),
                }
            }
        };

        &self.cache.insert(cached).metrics
    }

    /// Drop the cached metrics; the next [`metrics`](Self::metrics) call
    /// recomputes.
    pub fn invalidate_cache(&mut self) {
        self.cache = None;
        debug!("Metrics cache invalidated");
    }

    // ── Drill-downs ───────────────────────────────────────────────────────

    /// Artists offered for drill-down within `range`.
    pub fn artist_options(&self, range: DateRange) -> Vec<String> {
        MetricAggregator::artist_options(&self.select(range))
    }

    /// Tracks offered for forensics within `range`.
    pub fn track_options(&self, range: DateRange) -> Vec<TrackOption> {
        MetricAggregator::track_options(&self.select(range))
    }

    pub fn artist_drill_down(&self, range: DateRange, artist: &str) -> ArtistDrillDown {
        artist_drill_down(&self.select(range), artist, self.params.top_n)
    }

    pub fn track_forensics(&self, range: DateRange, track: &TrackKey) -> TrackForensics {
        track_forensics(track, &self.select(range), self.params.skip_threshold_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
