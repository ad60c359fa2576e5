use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{HistoryError, Result};
use crate::models::MetricParams;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Explore and export a Spotify extended streaming history
#[derive(Parser, Debug, Clone)]
#[command(
    name = "spotify-history",
    about = "Explore and export a Spotify extended streaming history",
    version
)]
pub struct Settings {
    /// Export directory, single Streaming_History_Audio_*.json file, or .zip archive
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// View mode
    #[arg(long, default_value = "summary", value_parser = ["export", "summary", "artist", "track"])]
    pub view: String,

    /// Directory receiving the per-year CSV files
    #[arg(long, default_value = "outputByYear")]
    pub output_dir: PathBuf,

    /// Path of the combined all-years CSV file
    #[arg(long, default_value = "spotify_history_all_years.csv")]
    pub combined_csv: PathBuf,

    /// First day of the analysed range (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the analysed range (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Artist for the artist view (defaults to the top artist)
    #[arg(long)]
    pub artist: Option<String>,

    /// Track name for the track view (defaults to the most played track)
    #[arg(long)]
    pub track: Option<String>,

    /// Artist of the track given with --track
    #[arg(long)]
    pub track_artist: Option<String>,

    /// Length of the rankings (1-1000)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub top: u32,

    /// Plays shorter than this many milliseconds count as likely skipped
    #[arg(long, default_value = "15000")]
    pub skip_threshold_ms: u64,

    /// Minimum skips for a track to appear in the most-skipped ranking
    #[arg(long, default_value = "3")]
    pub min_skip_count: u64,

    /// Number of plays in the recent-activity list
    #[arg(long, default_value = "100")]
    pub recent: u32,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.spotify-history/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_threshold_ms: Option<u64>,
}

impl LastUsedParams {
    /// `~/.spotify-history/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".spotify-history").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and merge with last-used params where no explicit
    /// CLI value was provided, then persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit args and
    /// config path, so tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::finalize(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins over the persisted value.
        if settings.input.is_none() {
            settings.input = last.input;
        }
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "output_dir") {
            if let Some(v) = last.output_dir {
                settings.output_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "top") {
            if let Some(v) = last.top {
                settings.top = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "skip_threshold_ms") {
            if let Some(v) = last.skip_threshold_ms {
                settings.skip_threshold_ms = v;
            }
        }

        settings = Self::finalize(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Check combinations clap cannot express on its own.
    pub fn validate(&self) -> Result<()> {
        if self.input.is_none() {
            return Err(HistoryError::Config(
                "no --input given and none remembered from a previous run".to_string(),
            ));
        }
        if self.track.is_some() != self.track_artist.is_some() {
            return Err(HistoryError::Config(
                "--track and --track-artist must be given together".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(HistoryError::Config(format!(
                    "--start {} is after --end {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    /// Aggregation knobs derived from the CLI.
    pub fn metric_params(&self) -> MetricParams {
        MetricParams {
            top_n: self.top as usize,
            skip_threshold_ms: self.skip_threshold_ms,
            min_skip_count: self.min_skip_count,
            recent_limit: self.recent as usize,
            ..MetricParams::default()
        }
    }

    /// `--debug` overrides the log level.
    fn finalize(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            input: s.input.clone(),
            view: Some(s.view.clone()),
            output_dir: Some(s.output_dir.clone()),
            top: Some(s.top),
            skip_threshold_ms: Some(s.skip_threshold_ms),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
