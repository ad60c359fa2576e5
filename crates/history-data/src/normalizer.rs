//! Raw event → canonical record mapping.
//!
//! Each `(RawEvent, source name)` pair yields zero or one
//! [`CanonicalRecord`]. Rejected events are counted by reason in
//! [`NormalizationStats`] and never reported one by one.

use history_core::data_processors::{DurationExtractor, PlayDuration, TimestampProcessor};
use history_core::models::{CanonicalRecord, RawEvent};
use serde::Serialize;
use tracing::debug;

use crate::reader::ParsedSource;

/// Why an event did not become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `ts` missing, null, not a string, or empty.
    MissingTimestamp,
    /// `ts` present but not a parseable instant.
    InvalidTimestamp,
    /// `ms_played` above the one-hour cap.
    OverlongPlay,
}

/// Per-reason counts for one normalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub events_seen: u64,
    pub records_built: u64,
    pub missing_timestamp: u64,
    pub invalid_timestamp: u64,
    pub overlong_play: u64,
    /// Records kept with a negative, fractional or non-numeric `ms_played`
    /// read as absent. Not a drop.
    pub invalid_duration: u64,
}

impl NormalizationStats {
    /// Total events dropped for any reason.
    pub fn dropped(&self) -> u64 {
        self.missing_timestamp + self.invalid_timestamp + self.overlong_play
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingTimestamp => self.missing_timestamp += 1,
            DropReason::InvalidTimestamp => self.invalid_timestamp += 1,
            DropReason::OverlongPlay => self.overlong_play += 1,
        }
    }
}

/// Map one event to a record, or say why it was rejected.
///
/// Checks run in order: timestamp presence, duration, timestamp validity.
/// A malformed `ms_played` does not reject the event; it is kept as absent.
pub fn normalize_event(
    event: &RawEvent,
    source_name: &str,
) -> std::result::Result<CanonicalRecord, DropReason> {
    let ts = match event.str_field(RawEvent::TS) {
        Some(ts) if !ts.trim().is_empty() => ts,
        _ => return Err(DropReason::MissingTimestamp),
    };

    let ms_played = match DurationExtractor::classify(event.get(RawEvent::MS_PLAYED)) {
        PlayDuration::Absent | PlayDuration::Invalid => None,
        PlayDuration::Valid(ms) => Some(ms),
        PlayDuration::Overlong(_) => return Err(DropReason::OverlongPlay),
    };

    let timestamp = TimestampProcessor::parse_str(&ts).ok_or(DropReason::InvalidTimestamp)?;

    Ok(CanonicalRecord {
        timestamp,
        platform: event.str_field(RawEvent::PLATFORM),
        ms_played,
        track_name: event.str_field(RawEvent::TRACK_NAME),
        artist: event.str_field(RawEvent::ARTIST),
        album: event.str_field(RawEvent::ALBUM),
        uri: event.str_field(RawEvent::TRACK_URI),
        skipped: event.bool_field(RawEvent::SKIPPED),
        shuffle: event.bool_field(RawEvent::SHUFFLE),
        offline: event.bool_field(RawEvent::OFFLINE),
        incognito_mode: event.bool_field(RawEvent::INCOGNITO_MODE),
        source_file: source_name.to_string(),
    })
}

/// Normalize every event of every source, in discovery order.
pub fn normalize_sources(sources: &[ParsedSource]) -> (Vec<CanonicalRecord>, NormalizationStats) {
    let mut stats = NormalizationStats::default();
    let mut records = Vec::new();

    for source in sources {
        let built_before = records.len();
        let dropped_before = stats.dropped();
        for event in &source.events {
            stats.events_seen += 1;
            match normalize_event(event, &source.name) {
                Ok(record) => {
                    if has_malformed_duration(event) {
                        stats.invalid_duration += 1;
                    }
                    stats.records_built += 1;
                    records.push(record);
                }
                Err(reason) => stats.record_drop(reason),
            }
        }
        debug!(
            "Source {}: {} events, {} records, {} dropped",
            source.name,
            source.events.len(),
            records.len() - built_before,
            stats.dropped() - dropped_before
        );
    }

    (records, stats)
}

fn has_malformed_duration(event: &RawEvent) -> bool {
    DurationExtractor::classify(event.get(RawEvent::MS_PLAYED)) == PlayDuration::Invalid
}
