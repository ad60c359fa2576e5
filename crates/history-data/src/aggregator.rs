//! Listening metrics over a selection of canonical records.
//!
//! Every function is pure and accepts an empty selection. Selections are
//! `&[&CanonicalRecord]` so year partitions, date ranges and artist or track
//! filters all feed the same code.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use history_core::formatting::{percentage, round_to};
use history_core::models::{CanonicalRecord, TrackKey};
use serde::Serialize;

use crate::grouping::{group_count, group_hours, ranked, top_n, top_n_listened};

/// How many artists the artist selector offers.
pub const ARTIST_OPTION_LIMIT: usize = 10;
/// How many tracks the track selector offers.
pub const TRACK_OPTION_LIMIT: usize = 100;
/// Plays a track needs before the track selector offers it.
pub const TRACK_OPTION_MIN_PLAYS: u64 = 2;

// ── Result types ──────────────────────────────────────────────────────────────

/// Headline figures for a selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub hours: f64,
    pub plays: u64,
    pub distinct_artists: usize,
    pub distinct_tracks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistHours {
    pub artist: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackHours {
    pub track: TrackKey,
    pub hours: f64,
}

/// Hours listened in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyHours {
    pub year: i32,
    pub month: u32,
    pub hours: f64,
}

impl MonthlyHours {
    /// `"YYYY-MM"`.
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformHours {
    pub platform: String,
    pub hours: f64,
}

/// A track that is often abandoned early.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTrack {
    pub track: TrackKey,
    pub skip_count: u64,
    /// Mean `ms_played` over the skipped plays only.
    pub avg_listen_ms: f64,
}

/// Skip estimate for a whole selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkipOverview {
    pub plays: u64,
    pub likely_skipped: u64,
    /// Percentage of all plays that were likely skipped, in `[0, 100]`.
    pub skip_rate: f64,
    /// Mean seconds over plays with a known duration.
    pub avg_listen_seconds: Option<f64>,
}

/// A run of consecutive calendar days with at least one play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakRun {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub active_days: usize,
    pub longest: Option<StreakRun>,
    pub latest: Option<StreakRun>,
}

/// One line of the recent-activity list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPlay {
    pub timestamp: DateTime<Utc>,
    pub track_name: Option<String>,
    pub artist: Option<String>,
    /// Rounded to two decimals; `None` when the duration is unknown.
    pub minutes_played: Option<f64>,
}

/// A track offered by the track selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackOption {
    pub track: TrackKey,
    pub plays: u64,
}

// ── MetricAggregator ──────────────────────────────────────────────────────────

/// Stateless helper computing listening metrics.
pub struct MetricAggregator;

impl MetricAggregator {
    pub fn totals(records: &[&CanonicalRecord]) -> Totals {
        let artists: BTreeSet<&str> = records.iter().filter_map(|r| r.artist.as_deref()).collect();
        let tracks: BTreeSet<&str> = records
            .iter()
            .filter_map(|r| r.track_name.as_deref())
            .collect();

        Totals {
            hours: records.iter().map(|r| r.hours_played()).sum(),
            plays: records.len() as u64,
            distinct_artists: artists.len(),
            distinct_tracks: tracks.len(),
        }
    }

    /// The `n` artists with the most hours. Artists with no listened time
    /// only appear when nobody has any.
    pub fn top_artists(records: &[&CanonicalRecord], n: usize) -> Vec<ArtistHours> {
        top_n_listened(group_hours(records, |r| r.artist.clone()), n)
            .into_iter()
            .map(|(artist, hours)| ArtistHours { artist, hours })
            .collect()
    }

    /// The `n` `(track, artist)` pairs with the most hours.
    pub fn top_tracks(records: &[&CanonicalRecord], n: usize) -> Vec<TrackHours> {
        top_n_listened(group_hours(records, CanonicalRecord::track_key), n)
            .into_iter()
            .map(|(track, hours)| TrackHours { track, hours })
            .collect()
    }

    /// Hours per calendar month, oldest first.
    pub fn monthly_trend(records: &[&CanonicalRecord]) -> Vec<MonthlyHours> {
        group_hours(records, |r| Some((r.timestamp.year(), r.timestamp.month())))
            .into_iter()
            .map(|((year, month), hours)| MonthlyHours { year, month, hours })
            .collect()
    }

    /// Hours per platform, largest first.
    pub fn platform_breakdown(records: &[&CanonicalRecord]) -> Vec<PlatformHours> {
        ranked(group_hours(records, |r| r.platform.clone()))
            .into_iter()
            .map(|(platform, hours)| PlatformHours { platform, hours })
            .collect()
    }

    /// Tracks with at least `min_skip_count` likely-skipped plays, most
    /// skipped first, at most `n` of them.
    pub fn most_skipped(
        records: &[&CanonicalRecord],
        threshold_ms: u64,
        min_skip_count: u64,
        n: usize,
    ) -> Vec<SkippedTrack> {
        let mut groups: BTreeMap<TrackKey, (u64, u64)> = BTreeMap::new();
        for record in records {
            let (Some(ms), Some(key)) = (record.ms_played, record.track_key()) else {
                continue;
            };
            if ms < threshold_ms {
                let entry = groups.entry(key).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += ms;
            }
        }

        let eligible: BTreeMap<TrackKey, (u64, u64)> = groups
            .into_iter()
            .filter(|(_, (count, _))| *count >= min_skip_count)
            .collect();

        let mut entries: Vec<(TrackKey, (u64, u64))> = eligible.into_iter().collect();
        entries.sort_by(|a, b| b.1 .0.cmp(&a.1 .0));
        entries.truncate(n);

        entries
            .into_iter()
            .map(|(track, (skip_count, total_ms))| SkippedTrack {
                track,
                skip_count,
                avg_listen_ms: total_ms as f64 / skip_count as f64,
            })
            .collect()
    }

    pub fn skip_overview(records: &[&CanonicalRecord], threshold_ms: u64) -> SkipOverview {
        let plays = records.len() as u64;
        let likely_skipped = records
            .iter()
            .filter(|r| r.is_likely_skipped(threshold_ms))
            .count() as u64;
        let known: Vec<u64> = records.iter().filter_map(|r| r.ms_played).collect();
        let avg_listen_seconds = if known.is_empty() {
            None
        } else {
            Some(known.iter().sum::<u64>() as f64 / known.len() as f64 / 1000.0)
        };

        SkipOverview {
            plays,
            likely_skipped,
            skip_rate: percentage(likely_skipped as f64, plays as f64, 2),
            avg_listen_seconds,
        }
    }

    /// Play counts per UTC hour of day.
    pub fn hourly_distribution(records: &[&CanonicalRecord]) -> [u64; 24] {
        let mut hours = [0u64; 24];
        for record in records {
            hours[record.timestamp.hour() as usize] += 1;
        }
        hours
    }

    /// Play counts per UTC calendar date; days without plays are absent.
    pub fn daily_counts(records: &[&CanonicalRecord]) -> BTreeMap<NaiveDate, u64> {
        group_count(records, |r| Some(r.date()))
    }

    /// Consecutive-day listening runs. On equal length the earliest run is
    /// reported as the longest.
    pub fn listening_streaks(records: &[&CanonicalRecord]) -> StreakSummary {
        let days: BTreeSet<NaiveDate> = records.iter().map(|r| r.date()).collect();

        let mut runs: Vec<StreakRun> = Vec::new();
        for day in &days {
            match runs.last_mut() {
                Some(run) if run.end.succ_opt() == Some(*day) => {
                    run.end = *day;
                    run.days += 1;
                }
                _ => runs.push(StreakRun {
                    start: *day,
                    end: *day,
                    days: 1,
                }),
            }
        }

        let mut longest: Option<StreakRun> = None;
        for run in &runs {
            if longest.map_or(true, |best| run.days > best.days) {
                longest = Some(*run);
            }
        }

        StreakSummary {
            active_days: days.len(),
            longest,
            latest: runs.last().copied(),
        }
    }

    /// The `limit` most recent plays, newest first.
    pub fn recent_activity(records: &[&CanonicalRecord], limit: usize) -> Vec<RecentPlay> {
        let mut sorted: Vec<&CanonicalRecord> = records.to_vec();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        sorted
            .into_iter()
            .take(limit)
            .map(|r| RecentPlay {
                timestamp: r.timestamp,
                track_name: r.track_name.clone(),
                artist: r.artist.clone(),
                minutes_played: r.ms_played.map(|ms| round_to(ms as f64 / 60_000.0, 2)),
            })
            .collect()
    }

    /// Artists offered for drill-down: the top ten by hours.
    pub fn artist_options(records: &[&CanonicalRecord]) -> Vec<String> {
        Self::top_artists(records, ARTIST_OPTION_LIMIT)
            .into_iter()
            .map(|a| a.artist)
            .collect()
    }

    /// Tracks offered for forensics: played at least twice, most played
    /// first, ties in key order.
    pub fn track_options(records: &[&CanonicalRecord]) -> Vec<TrackOption> {
        let counts: BTreeMap<TrackKey, u64> = group_count(records, CanonicalRecord::track_key)
            .into_iter()
            .filter(|(_, plays)| *plays >= TRACK_OPTION_MIN_PLAYS)
            .collect();

        top_n(counts, TRACK_OPTION_LIMIT)
            .into_iter()
            .map(|(track, plays)| TrackOption { track, plays })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn play(ts: &str, track: Option<&str>, artist: Option<&str>, ms: Option<u64>) -> CanonicalRecord {
        CanonicalRecord {
            timestamp: DateTime::parse_from_rfc3339(ts)
                .unwrap()
                .with_timezone(&Utc),
            platform: Some("ios".to_string()),
            ms_played: ms,
            track_name: track.map(str::to_string),
            artist: artist.map(str::to_string),
            album: None,
            uri: None,
            skipped: None,
            shuffle: None,
            offline: None,
            incognito_mode: None,
            source_file: "Streaming_History_Audio_2021.json".to_string(),
        }
    }

    fn refs(records: &[CanonicalRecord]) -> Vec<&CanonicalRecord> {
        records.iter().collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_selection_everywhere() {
        let empty: Vec<&CanonicalRecord> = Vec::new();
        assert_eq!(MetricAggregator::totals(&empty), Totals::default());
        assert!(MetricAggregator::top_artists(&empty, 10).is_empty());
        assert!(MetricAggregator::monthly_trend(&empty).is_empty());
        assert!(MetricAggregator::most_skipped(&empty, 15_000, 3, 10).is_empty());
        assert_eq!(MetricAggregator::hourly_distribution(&empty), [0; 24]);
        assert_eq!(
            MetricAggregator::listening_streaks(&empty),
            StreakSummary::default()
        );
        let overview = MetricAggregator::skip_overview(&empty, 15_000);
        assert_eq!(overview.skip_rate, 0.0);
        assert!(overview.avg_listen_seconds.is_none());
    }

    #[test]
    fn test_totals_ignores_absent_fields() {
        let records = vec![
            play("2021-01-01T10:00:00Z", Some("a"), Some("X"), Some(1_800_000)),
            play("2021-01-01T11:00:00Z", Some("a"), Some("X"), None),
            play("2021-01-01T12:00:00Z", None, None, Some(1_800_000)),
            play("2021-01-01T13:00:00Z", Some("b"), Some("Y"), Some(0)),
        ];
        let totals = MetricAggregator::totals(&refs(&records));
        assert!((totals.hours - 1.0).abs() < 1e-9);
        assert_eq!(totals.plays, 4);
        assert_eq!(totals.distinct_artists, 2);
        assert_eq!(totals.distinct_tracks, 2);
    }

    #[test]
    fn test_top_artists_bounded_and_ordered() {
        let records = vec![
            play("2021-01-01T10:00:00Z", None, Some("B"), Some(600_000)),
            play("2021-01-01T11:00:00Z", None, Some("A"), Some(600_000)),
            play("2021-01-01T12:00:00Z", None, Some("C"), Some(3_600_000)),
            play("2021-01-01T13:00:00Z", None, Some("D"), Some(0)),
        ];
        let top = MetricAggregator::top_artists(&refs(&records), 3);
        let names: Vec<&str> = top.iter().map(|a| a.artist.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert!(top.iter().all(|a| a.hours > 0.0));
    }

    #[test]
    fn test_top_lists_leave_out_zero_hour_groups() {
        let records = vec![
            play("2021-01-01T10:00:00Z", Some("Ageispolis"), Some("A"), Some(60_000)),
            play("2021-01-01T11:00:00Z", Some("Xtal"), Some("B"), Some(0)),
            play("2021-01-01T12:00:00Z", Some("Tha"), Some("C"), None),
        ];
        let artists = MetricAggregator::top_artists(&refs(&records), 2);
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].artist, "A");

        let tracks = MetricAggregator::top_tracks(&refs(&records), 3);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track, TrackKey::new("Ageispolis", "A"));
    }

    #[test]
    fn test_top_artists_all_zero_hours_still_listed() {
        let records = vec![
            play("2021-01-01T10:00:00Z", None, Some("B"), Some(0)),
            play("2021-01-01T11:00:00Z", None, Some("A"), None),
        ];
        let names: Vec<String> = MetricAggregator::top_artists(&refs(&records), 2)
            .into_iter()
            .map(|a| a.artist)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_top_tracks_separates_same_name_by_artist() {
        let records = vec![
            play("2021-01-01T10:00:00Z", Some("Intro"), Some("The xx"), Some(120_000)),
            play("2021-01-01T11:00:00Z", Some("Intro"), Some("M83"), Some(300_000)),
            play("2021-01-01T12:00:00Z", Some("Intro"), None, Some(900_000)),
        ];
        let top = MetricAggregator::top_tracks(&refs(&records), 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].track, TrackKey::new("Intro", "M83"));
        assert_eq!(top[1].track, TrackKey::new("Intro", "The xx"));
    }

    #[test]
    fn test_monthly_trend_is_chronological() {
        let records = vec![
            play("2021-02-03T10:00:00Z", None, None, Some(3_600_000)),
            play("2020-12-31T23:59:59Z", None, None, Some(1_800_000)),
            play("2021-02-20T10:00:00Z", None, None, Some(1_800_000)),
        ];
        let trend = MetricAggregator::monthly_trend(&refs(&records));
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].label(), "2020-12");
        assert_eq!(trend[1].label(), "2021-02");
        assert!((trend[1].hours - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_platform_breakdown_descending() {
        let mut records = vec![
            play("2021-01-01T10:00:00Z", None, None, Some(600_000)),
            play("2021-01-01T11:00:00Z", None, None, Some(3_600_000)),
        ];
        records[1].platform = Some("windows".to_string());
        let platforms = MetricAggregator::platform_breakdown(&refs(&records));
        assert_eq!(platforms[0].platform, "windows");
        assert_eq!(platforms[1].platform, "ios");
    }

    #[test]
    fn test_most_skipped_requires_minimum() {
        let mut records = Vec::new();
        for (i, ms) in [5_000, 7_000, 9_000, 200_000].iter().enumerate() {
            records.push(play(
                &format!("2021-01-0{}T10:00:00Z", i + 1),
                Some("Often"),
                Some("Skipped"),
                Some(*ms),
            ));
        }
        for i in 0..2 {
            records.push(play(
                &format!("2021-02-0{}T10:00:00Z", i + 1),
                Some("Rarely"),
                Some("Skipped"),
                Some(1_000),
            ));
        }

        let skipped = MetricAggregator::most_skipped(&refs(&records), 15_000, 3, 10);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].track, TrackKey::new("Often", "Skipped"));
        assert_eq!(skipped[0].skip_count, 3);
        assert!((skipped[0].avg_listen_ms - 7_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_most_skipped_threshold_is_exclusive() {
        let records: Vec<CanonicalRecord> = (1..=3)
            .map(|d| {
                play(
                    &format!("2021-01-0{}T10:00:00Z", d),
                    Some("Edge"),
                    Some("Case"),
                    Some(15_000),
                )
            })
            .collect();
        assert!(MetricAggregator::most_skipped(&refs(&records), 15_000, 3, 10).is_empty());
        assert_eq!(
            MetricAggregator::most_skipped(&refs(&records), 30_000, 3, 10).len(),
            1
        );
    }

    #[test]
    fn test_skip_overview_rate_bounds() {
        let records = vec![
            play("2021-01-01T10:00:00Z", None, None, Some(1_000)),
            play("2021-01-01T11:00:00Z", None, None, Some(100_000)),
            play("2021-01-01T12:00:00Z", None, None, None),
            play("2021-01-01T13:00:00Z", None, None, Some(4_000)),
        ];
        let overview = MetricAggregator::skip_overview(&refs(&records), 15_000);
        assert_eq!(overview.plays, 4);
        assert_eq!(overview.likely_skipped, 2);
        assert!((overview.skip_rate - 50.0).abs() < 1e-9);
        assert!((overview.avg_listen_seconds.unwrap() - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_hourly_distribution_uses_utc_hour() {
        let records = vec![
            play("2021-01-01T23:30:00Z", None, None, None),
            play("2021-01-02T01:30:00+02:00", None, None, None),
            play("2021-01-02T00:10:00Z", None, None, None),
        ];
        let hours = MetricAggregator::hourly_distribution(&refs(&records));
        assert_eq!(hours[23], 2);
        assert_eq!(hours[0], 1);
        assert_eq!(hours.iter().sum::<u64>(), 3);
    }

    #[test]
    fn test_daily_counts_sparse() {
        let records = vec![
            play("2021-01-01T10:00:00Z", None, None, None),
            play("2021-01-01T11:00:00Z", None, None, None),
            play("2021-01-05T11:00:00Z", None, None, None),
        ];
        let days = MetricAggregator::daily_counts(&refs(&records));
        assert_eq!(days.len(), 2);
        assert_eq!(days[&date(2021, 1, 1)], 2);
        assert_eq!(days[&date(2021, 1, 5)], 1);
    }

    #[test]
    fn test_listening_streaks_earliest_longest_wins() {
        let records = vec![
            play("2021-01-01T10:00:00Z", None, None, None),
            play("2021-01-02T10:00:00Z", None, None, None),
            play("2021-01-02T18:00:00Z", None, None, None),
            play("2021-01-10T10:00:00Z", None, None, None),
            play("2021-01-11T10:00:00Z", None, None, None),
            play("2021-01-20T10:00:00Z", None, None, None),
        ];
        let streaks = MetricAggregator::listening_streaks(&refs(&records));
        assert_eq!(streaks.active_days, 5);
        assert_eq!(
            streaks.longest,
            Some(StreakRun {
                start: date(2021, 1, 1),
                end: date(2021, 1, 2),
                days: 2
            })
        );
        assert_eq!(
            streaks.latest,
            Some(StreakRun {
                start: date(2021, 1, 20),
                end: date(2021, 1, 20),
                days: 1
            })
        );
    }

    #[test]
    fn test_listening_streaks_cross_month_boundary() {
        let records = vec![
            play("2021-01-31T10:00:00Z", None, None, None),
            play("2021-02-01T10:00:00Z", None, None, None),
            play("2021-02-02T10:00:00Z", None, None, None),
        ];
        let streaks = MetricAggregator::listening_streaks(&refs(&records));
        assert_eq!(streaks.longest.map(|r| r.days), Some(3));
    }

    #[test]
    fn test_recent_activity_newest_first_and_limited() {
        let records = vec![
            play("2021-01-01T10:00:00Z", Some("old"), None, Some(90_000)),
            play("2021-01-03T10:00:00Z", Some("new"), None, Some(10_000)),
            play("2021-01-02T10:00:00Z", Some("mid"), None, None),
        ];
        let recent = MetricAggregator::recent_activity(&refs(&records), 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].track_name.as_deref(), Some("new"));
        assert_eq!(recent[0].minutes_played, Some(0.17));
        assert_eq!(recent[1].track_name.as_deref(), Some("mid"));
        assert_eq!(recent[1].minutes_played, None);
        assert_eq!(
            recent[0].timestamp,
            Utc.with_ymd_and_hms(2021, 1, 3, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_track_options_need_two_plays() {
        let records = vec![
            play("2021-01-01T10:00:00Z", Some("once"), Some("A"), None),
            play("2021-01-01T11:00:00Z", Some("twice"), Some("A"), None),
            play("2021-01-01T12:00:00Z", Some("twice"), Some("A"), None),
            play("2021-01-01T13:00:00Z", Some("thrice"), Some("B"), None),
            play("2021-01-01T14:00:00Z", Some("thrice"), Some("B"), None),
            play("2021-01-01T15:00:00Z", Some("thrice"), Some("B"), None),
        ];
        let options = MetricAggregator::track_options(&refs(&records));
        assert_eq!(
            options,
            vec![
                TrackOption {
                    track: TrackKey::new("thrice", "B"),
                    plays: 3
                },
                TrackOption {
                    track: TrackKey::new("twice", "A"),
                    plays: 2
                },
            ]
        );
    }

    #[test]
    fn test_artist_options_capped_at_ten() {
        let records: Vec<CanonicalRecord> = (0..15)
            .map(|i| {
                play(
                    "2021-01-01T10:00:00Z",
                    None,
                    Some(&format!("artist-{:02}", i)),
                    Some(60_000 * (i + 1)),
                )
            })
            .collect();
        let options = MetricAggregator::artist_options(&refs(&records));
        assert_eq!(options.len(), ARTIST_OPTION_LIMIT);
        assert_eq!(options[0], "artist-14");
    }
}
