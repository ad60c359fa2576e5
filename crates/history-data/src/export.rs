//! Flat-file CSV export of canonical records.
//!
//! One combined file plus one file per calendar year, all sharing the same
//! column layout.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use history_core::error::{HistoryError, Result};
use history_core::models::CanonicalRecord;
use serde::Serialize;
use tracing::{debug, info};

use crate::record_set::OrderedRecordSet;

/// Column order of every exported file.
pub const EXPORT_COLUMNS: [&str; 12] = [
    "timestamp",
    "platform",
    "ms_played",
    "track_name",
    "artist",
    "album",
    "spotify_uri",
    "skipped",
    "shuffle",
    "offline",
    "incognito_mode",
    "source_file",
];

pub const COMBINED_FILE_NAME: &str = "spotify_history_all_years.csv";

/// `spotify_history_{year}.csv`
pub fn yearly_file_name(year: i32) -> String {
    format!("spotify_history_{}.csv", year)
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    timestamp: String,
    platform: Option<&'a str>,
    ms_played: Option<u64>,
    track_name: Option<&'a str>,
    artist: Option<&'a str>,
    album: Option<&'a str>,
    spotify_uri: Option<&'a str>,
    skipped: Option<bool>,
    shuffle: Option<bool>,
    offline: Option<bool>,
    incognito_mode: Option<bool>,
    source_file: &'a str,
}

impl<'a> From<&'a CanonicalRecord> for ExportRow<'a> {
    fn from(r: &'a CanonicalRecord) -> Self {
        ExportRow {
            timestamp: r.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            platform: r.platform.as_deref(),
            ms_played: r.ms_played,
            track_name: r.track_name.as_deref(),
            artist: r.artist.as_deref(),
            album: r.album.as_deref(),
            spotify_uri: r.uri.as_deref(),
            skipped: r.skipped,
            shuffle: r.shuffle,
            offline: r.offline,
            incognito_mode: r.incognito_mode,
            source_file: &r.source_file,
        }
    }
}

/// What [`export_all`] wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub combined_path: PathBuf,
    pub combined_rows: usize,
    /// `(year, path, rows)` ascending by year.
    pub yearly: Vec<(i32, PathBuf, usize)>,
}

/// Write `records` to `path` as CSV with a header row.
pub fn write_records_csv(path: &Path, records: &[CanonicalRecord]) -> Result<usize> {
    let export_err = |reason: String| HistoryError::Export {
        path: path.to_path_buf(),
        reason,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| export_err(e.to_string()))?;

    writer
        .write_record(EXPORT_COLUMNS)
        .map_err(|e| export_err(e.to_string()))?;
    for record in records {
        writer
            .serialize(ExportRow::from(record))
            .map_err(|e| export_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| export_err(e.to_string()))?;

    debug!("Wrote {} rows to {}", records.len(), path.display());
    Ok(records.len())
}

/// Write the combined file to `combined_path` and one file per year into
/// `output_dir`, creating the directory when missing.
pub fn export_all(
    records: &OrderedRecordSet,
    combined_path: &Path,
    output_dir: &Path,
) -> Result<ExportSummary> {
    if let Some(parent) = combined_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::create_dir_all(output_dir)?;

    let combined_rows = write_records_csv(combined_path, records.records())?;

    let mut yearly = Vec::new();
    for partition in records.by_year() {
        let path = output_dir.join(yearly_file_name(partition.year));
        let rows = write_records_csv(&path, partition.records)?;
        yearly.push((partition.year, path, rows));
    }

    info!(
        "Exported {} records to {} and {} yearly file(s) in {}",
        combined_rows,
        combined_path.display(),
        yearly.len(),
        output_dir.display()
    );

    Ok(ExportSummary {
        combined_path: combined_path.to_path_buf(),
        combined_rows,
        yearly,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn record(year: i32, track: Option<&str>, skipped: Option<bool>) -> CanonicalRecord {
        CanonicalRecord {
            timestamp: Utc.with_ymd_and_hms(year, 6, 1, 12, 30, 5).unwrap(),
            platform: Some("Android, phone".to_string()),
            ms_played: Some(12_000),
            track_name: track.map(str::to_string),
            artist: Some("Stereolab".to_string()),
            album: None,
            uri: Some("spotify:track:abc".to_string()),
            skipped,
            shuffle: Some(true),
            offline: None,
            incognito_mode: Some(false),
            source_file: format!("Streaming_History_Audio_{}.json", year),
        }
    }

    #[test]
    fn test_write_records_csv_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let rows = write_records_csv(&path, &[record(2021, Some("Cybele's Reverie"), None)]).unwrap();
        assert_eq!(rows, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), EXPORT_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "2021-06-01T12:30:05+00:00,\"Android, phone\",12000,Cybele's Reverie,Stereolab,,spotify:track:abc,,true,,false,Streaming_History_Audio_2021.json"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_records_csv_empty_has_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        write_records_csv(&path, &[]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim_end(), EXPORT_COLUMNS.join(","));
    }

    #[test]
    fn test_export_all_writes_per_year_files() {
        let dir = TempDir::new().unwrap();
        let set = OrderedRecordSet::from_records(vec![
            record(2022, Some("b"), Some(true)),
            record(2020, Some("a"), Some(false)),
            record(2022, None, None),
        ]);
        let combined = dir.path().join("spotify_history_all_years.csv");
        let out_dir = dir.path().join("outputByYear");

        let summary = export_all(&set, &combined, &out_dir).unwrap();
        assert_eq!(summary.combined_rows, 3);
        assert_eq!(summary.yearly.len(), 2);
        assert_eq!(summary.yearly[0].0, 2020);
        assert_eq!(summary.yearly[1].2, 2);
        assert!(out_dir.join("spotify_history_2020.csv").exists());
        assert!(out_dir.join("spotify_history_2022.csv").exists());

        let yearly = std::fs::read_to_string(out_dir.join("spotify_history_2022.csv")).unwrap();
        assert_eq!(yearly.lines().count(), 3);
        assert!(yearly.contains(",true,"));
    }

    #[test]
    fn test_write_records_csv_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = write_records_csv(&path, &[]).unwrap_err();
        assert!(matches!(err, HistoryError::Export { .. }));
    }

    #[test]
    fn test_yearly_file_name() {
        assert_eq!(yearly_file_name(2019), "spotify_history_2019.csv");
    }
}
