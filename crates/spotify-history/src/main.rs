mod bootstrap;
mod report;

use anyhow::{Context, Result};
use history_core::models::TrackKey;
use history_core::settings::Settings;
use history_data::export::export_all;
use history_data::record_set::DateRange;
use history_runtime::session::HistorySession;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Spotify History v{} starting", env!("CARGO_PKG_VERSION"));

    if settings.clear && settings.input.is_none() {
        println!("Saved configuration cleared.");
        return Ok(());
    }

    settings.validate()?;
    let input = settings
        .input
        .clone()
        .context("No input path given")?;

    tracing::info!("Input: {}, View: {}", input.display(), settings.view);

    let mut session = HistorySession::open(&input, settings.metric_params())
        .map_err(|e| {
            if e.is_load_failure() {
                tracing::warn!("Pass --input with an export directory, history file or .zip archive");
            }
            e
        })
        .with_context(|| format!("Failed to load listening history from {}", input.display()))?;

    if settings.view == "export" {
        let summary = export_all(session.records(), &settings.combined_csv, &settings.output_dir)
            .context("CSV export failed")?;
        println!("{}", report::render_export(&summary));
        return Ok(());
    }

    let Some(range) = session.resolve_range(settings.start, settings.end) else {
        println!("No plays loaded.");
        return Ok(());
    };

    match settings.view.as_str() {
        "summary" => run_summary(&mut session, range, &settings),
        "artist" => run_artist(&session, range, &settings),
        "track" => run_track(&mut session, range, &settings),
        unknown => eprintln!("Unknown view mode: {}", unknown),
    }

    Ok(())
}

fn no_data(range: DateRange) {
    println!("No plays between {} and {}.", range.start, range.end);
}

fn run_summary(session: &mut HistorySession, range: DateRange, settings: &Settings) {
    let metadata = session.metadata().clone();
    let metrics = session.metrics(range);
    if metrics.is_empty() {
        no_data(range);
        return;
    }
    println!(
        "{}",
        report::render_summary(range, &metadata, metrics, settings.skip_threshold_ms)
    );
}

fn run_artist(session: &HistorySession, range: DateRange, settings: &Settings) {
    let artist = match &settings.artist {
        Some(artist) => artist.clone(),
        None => match session.artist_options(range).into_iter().next() {
            Some(top) => top,
            None => return no_data(range),
        },
    };

    let drill = session.artist_drill_down(range, &artist);
    if drill.plays == 0 {
        println!("No plays by {} between {} and {}.", artist, range.start, range.end);
        return;
    }
    println!("{}", report::render_artist(range, &drill));
}

fn run_track(session: &mut HistorySession, range: DateRange, settings: &Settings) {
    let key = match (&settings.track, &settings.track_artist) {
        (Some(track), Some(artist)) => TrackKey::new(track, artist),
        _ => match most_played_track(session, range) {
            Some(key) => key,
            None => return no_data(range),
        },
    };

    let forensics = session.track_forensics(range, &key);
    if forensics.plays == 0 {
        println!("No plays of {} between {} and {}.", key, range.start, range.end);
        return;
    }
    println!(
        "{}",
        report::render_track(range, &forensics, settings.skip_threshold_ms)
    );
}

/// Most played track by play count, falling back to the top track by hours
/// when nothing was played twice.
fn most_played_track(session: &mut HistorySession, range: DateRange) -> Option<TrackKey> {
    if let Some(option) = session.track_options(range).into_iter().next() {
        return Some(option.track);
    }
    session
        .metrics(range)
        .top_tracks
        .first()
        .map(|t| t.track.clone())
}
