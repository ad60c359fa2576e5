//! Plain-text rendering of the report views.

use history_core::formatting::{fit_width, format_count, format_hours, format_number, format_seconds};
use history_data::aggregator::MonthlyHours;
use history_data::analysis::{DerivedMetrics, LoadMetadata};
use history_data::export::ExportSummary;
use history_data::forensics::{ArtistDrillDown, TrackForensics};
use history_data::record_set::DateRange;

const NAME_WIDTH: usize = 48;

fn heading(lines: &mut Vec<String>, title: &str) {
    lines.push(String::new());
    lines.push(title.to_string());
    lines.push("─".repeat(title.chars().count()));
}

fn ranked_line(rank: usize, name: &str, value: String) -> String {
    format!("{:>3}. {} {}", rank, fit_width(name, NAME_WIDTH), value)
}

/// Month row shared by the summary and artist views.
fn monthly_line(month: &MonthlyHours) -> String {
    format!("  {}  {:>14}", month.label(), format_hours(month.hours))
}

/// One-line summary of what the load kept and dropped.
fn load_line(metadata: &LoadMetadata) -> String {
    format!(
        "Loaded {} records from {} source(s), {} dropped",
        format_count(metadata.stats.records_built),
        metadata.sources.len(),
        format_count(metadata.stats.dropped())
    )
}

pub fn render_summary(
    range: DateRange,
    metadata: &LoadMetadata,
    metrics: &DerivedMetrics,
    skip_threshold_ms: u64,
) -> String {
    let mut lines = vec![format!("Listening history {}", range), load_line(metadata)];

    let totals = &metrics.totals;
    lines.push(format!(
        "{} plays, {}, {} artists, {} tracks",
        format_count(totals.plays),
        format_hours(totals.hours),
        format_count(totals.distinct_artists as u64),
        format_count(totals.distinct_tracks as u64)
    ));

    heading(&mut lines, "Top artists");
    for (i, a) in metrics.top_artists.iter().enumerate() {
        lines.push(ranked_line(i + 1, &a.artist, format_hours(a.hours)));
    }

    heading(&mut lines, "Top tracks");
    for (i, t) in metrics.top_tracks.iter().enumerate() {
        lines.push(ranked_line(i + 1, &t.track.to_string(), format_hours(t.hours)));
    }

    heading(&mut lines, "Monthly listening");
    for m in &metrics.monthly_trend {
        lines.push(monthly_line(m));
    }

    if let Some(platforms) = &metrics.platforms {
        heading(&mut lines, "Platforms");
        for p in platforms {
            lines.push(format!(
                "  {} {}",
                fit_width(&p.platform, NAME_WIDTH),
                format_hours(p.hours)
            ));
        }
    }

    if let Some(overview) = &metrics.skip_overview {
        heading(
            &mut lines,
            &format!("Skips (under {} ms)", format_count(skip_threshold_ms)),
        );
        lines.push(format!(
            "  Estimated skip rate {}% ({} of {} plays), average listen {}",
            format_number(overview.skip_rate, 1),
            format_count(overview.likely_skipped),
            format_count(overview.plays),
            format_seconds(overview.avg_listen_seconds, 1)
        ));
    }
    if let Some(skipped) = &metrics.most_skipped {
        for (i, s) in skipped.iter().enumerate() {
            lines.push(ranked_line(
                i + 1,
                &s.track.to_string(),
                format!(
                    "{} skips, avg {}",
                    s.skip_count,
                    format_seconds(Some(s.avg_listen_ms / 1000.0), 1)
                ),
            ));
        }
    }

    if metrics.hourly.is_some() || metrics.streaks.is_some() {
        heading(&mut lines, "Listening patterns");
    }
    if let Some(hourly) = &metrics.hourly {
        if let Some((hour, count)) = busiest_hour(hourly) {
            lines.push(format!(
                "  Busiest hour {:02}:00 UTC ({} plays)",
                hour,
                format_count(count)
            ));
        }
    }
    if let Some(streaks) = &metrics.streaks {
        lines.push(format!("  Active days {}", format_count(streaks.active_days as u64)));
        if let Some(run) = streaks.longest {
            lines.push(format!(
                "  Longest streak {} days ({} to {})",
                run.days, run.start, run.end
            ));
        }
        if let Some(run) = streaks.latest {
            lines.push(format!(
                "  Latest streak {} days ({} to {})",
                run.days, run.start, run.end
            ));
        }
    }

    heading(
        &mut lines,
        &format!("Recent activity ({})", metrics.recent_activity.len()),
    );
    for play in &metrics.recent_activity {
        let name = format!(
            "{} - {}",
            play.track_name.as_deref().unwrap_or("unknown track"),
            play.artist.as_deref().unwrap_or("unknown artist")
        );
        let minutes = play
            .minutes_played
            .map(|m| format!("{} min", format_number(m, 2)))
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!(
            "  {}  {} {}",
            play.timestamp.format("%Y-%m-%d %H:%M"),
            fit_width(&name, NAME_WIDTH),
            minutes
        ));
    }

    lines.join("\n")
}

pub fn render_artist(range: DateRange, drill: &ArtistDrillDown) -> String {
    let mut lines = vec![
        format!("{} in {}", drill.artist, range),
        format!(
            "{}, {} plays, {} distinct tracks",
            format_hours(drill.total_hours),
            format_count(drill.plays),
            format_count(drill.distinct_tracks as u64)
        ),
    ];

    heading(&mut lines, "Top tracks");
    for (i, t) in drill.top_tracks.iter().enumerate() {
        lines.push(ranked_line(i + 1, &t.track.track_name, format_hours(t.hours)));
    }

    heading(&mut lines, "Monthly listening");
    for m in &drill.monthly_trend {
        lines.push(monthly_line(m));
    }

    lines.join("\n")
}

pub fn render_track(range: DateRange, f: &TrackForensics, skip_threshold_ms: u64) -> String {
    let mut lines = vec![
        format!("{} in {}", f.track, range),
        format!(
            "{} plays, {} likely skipped (under {} ms), skip rate {}%, {} full plays",
            format_count(f.plays),
            format_count(f.skip_count),
            format_count(skip_threshold_ms),
            format_number(f.skip_rate, 1),
            format_count(f.total_plays)
        ),
        format!(
            "{}, average listen {}",
            format_hours(f.total_hours),
            format_seconds(f.avg_seconds, 1)
        ),
    ];

    heading(&mut lines, "Plays by hour (UTC)");
    for (hour, count) in f.hourly.iter().enumerate().filter(|(_, c)| **c > 0) {
        lines.push(format!("  {:02}:00  {}", hour, count));
    }

    heading(&mut lines, "Plays by day");
    for (day, count) in &f.daily_counts {
        lines.push(format!("  {}  {}", day, count));
    }

    heading(&mut lines, "Listen duration (seconds)");
    for bin in f.duration_histogram.iter().filter(|b| b.count > 0) {
        lines.push(format!(
            "  {:>8} - {:<8} {}",
            format_number(bin.lower, 1),
            format_number(bin.upper, 1),
            bin.count
        ));
    }

    heading(&mut lines, "History (most recent first)");
    for h in &f.history {
        lines.push(format!(
            "  {}  {:<20} {:>8}  skipped={} shuffle={} offline={}{}",
            h.timestamp.format("%Y-%m-%d %H:%M:%S"),
            fit_width(h.platform.as_deref().unwrap_or("unknown"), 20),
            format_seconds(h.seconds_played, 1),
            flag(h.skipped),
            flag(h.shuffle),
            flag(h.offline),
            if h.likely_skipped { "  likely skip" } else { "" }
        ));
    }

    lines.join("\n")
}

pub fn render_export(summary: &ExportSummary) -> String {
    let mut lines = vec![format!(
        "Wrote {} records to {}",
        format_count(summary.combined_rows as u64),
        summary.combined_path.display()
    )];
    for (year, path, rows) in &summary.yearly {
        lines.push(format!(
            "  {}  {:>8} records  {}",
            year,
            format_count(*rows as u64),
            path.display()
        ));
    }
    lines.join("\n")
}

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}

/// Hour with the most plays; the earliest wins a tie. `None` when all zero.
fn busiest_hour(hourly: &[u64; 24]) -> Option<(usize, u64)> {
    let mut best: Option<(usize, u64)> = None;
    for (hour, &count) in hourly.iter().enumerate() {
        if count > 0 && best.map_or(true, |(_, c)| count > c) {
            best = Some((hour, count));
        }
    }
    best
}
