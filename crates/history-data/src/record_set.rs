//! Chronological ordering and partitioning of canonical records.
//!
//! The set is sorted once; every year partition and every date range is then
//! a contiguous borrowed slice of the same storage.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use history_core::models::CanonicalRecord;
use serde::{Deserialize, Serialize};

// ── DateRange ─────────────────────────────────────────────────────────────────

/// Inclusive range of UTC calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `true` when `date` lies within `[start, end]`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// `true` when the range selects nothing (`start > end`).
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} – {}", self.start, self.end)
    }
}

// ── YearPartition ─────────────────────────────────────────────────────────────

/// All records of one calendar year (UTC), in global order.
#[derive(Debug, Clone, Copy)]
pub struct YearPartition<'a> {
    pub year: i32,
    pub records: &'a [CanonicalRecord],
}

// ── OrderedRecordSet ──────────────────────────────────────────────────────────

/// Every canonical record, ascending by timestamp.
///
/// Ties keep the order in which the records were discovered.
#[derive(Debug, Clone, Default)]
pub struct OrderedRecordSet {
    records: Vec<CanonicalRecord>,
}

impl OrderedRecordSet {
    /// Sort `records` by timestamp. The sort is stable.
    pub fn from_records(mut records: Vec<CanonicalRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        Self { records }
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    /// Borrowed view of every record, for the aggregation functions.
    pub fn selection(&self) -> Vec<&CanonicalRecord> {
        self.records.iter().collect()
    }

    /// First and last UTC calendar date present, or `None` when empty.
    pub fn date_span(&self) -> Option<DateRange> {
        let first = self.records.first()?;
        let last = self.records.last()?;
        Some(DateRange::new(first.date(), last.date()))
    }

    /// One partition per calendar year present, ascending by year.
    ///
    /// The partitions are disjoint and together cover the whole set.
    pub fn by_year(&self) -> Vec<YearPartition<'_>> {
        let mut partitions = Vec::new();
        let mut start = 0;

        while start < self.records.len() {
            let year = self.records[start].timestamp.year();
            let len = self.records[start..]
                .iter()
                .take_while(|r| r.timestamp.year() == year)
                .count();
            partitions.push(YearPartition {
                year,
                records: &self.records[start..start + len],
            });
            start += len;
        }

        partitions
    }

    /// Records whose UTC date falls within `range`, inclusive at both ends.
    pub fn in_date_range(&self, range: DateRange) -> &[CanonicalRecord] {
        if range.is_inverted() {
            return &[];
        }

        let lower_bound = start_of_day(range.start);
        let lower = self.records.partition_point(|r| r.timestamp < lower_bound);
        let upper = match range.end.succ_opt() {
            Some(next_day) => {
                let upper_bound = start_of_day(next_day);
                self.records.partition_point(|r| r.timestamp < upper_bound)
            }
            None => self.records.len(),
        };

        &self.records[lower..upper.max(lower)]
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
