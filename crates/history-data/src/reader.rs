//! Source discovery and loading.
//!
//! Finds `Streaming_History_Audio_*.json` sources in a directory tree, a
//! single file, or a `.zip` export archive, and parses each one as a JSON
//! array of [`RawEvent`]s. A malformed source fails the whole load.

use std::io::Read;
use std::path::{Path, PathBuf};

use history_core::error::{HistoryError, Result};
use history_core::models::RawEvent;
use serde_json::Value;
use tracing::{debug, warn};

/// Substring every streaming-history source name contains.
pub const SOURCE_MARKER: &str = "Streaming_History_Audio_";

/// Extension every streaming-history source name ends with.
pub const SOURCE_EXTENSION: &str = ".json";

/// Archive members under this prefix are macOS resource forks, not data.
const APPLE_DOUBLE_PREFIX: &str = "__MACOSX/";

// ── Types ─────────────────────────────────────────────────────────────────────

/// The unparsed bytes of one source, with the name records will carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSource {
    pub name: String,
    pub content: Vec<u8>,
}

impl NamedSource {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The events of one successfully parsed source, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSource {
    pub name: String,
    pub events: Vec<RawEvent>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// `true` when `name` follows the streaming-history naming convention.
pub fn is_history_source(name: &str) -> bool {
    name.contains(SOURCE_MARKER) && name.ends_with(SOURCE_EXTENSION)
}

/// Find all matching history files recursively under `dir`, sorted by path.
pub fn find_history_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Data path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .map(is_history_source)
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Gather every matching source under `input`.
///
/// `input` may be a directory, a `.zip` archive, or one JSON file. Fails with
/// [`HistoryError::SourceDiscovery`] when nothing matches.
pub fn collect_sources(input: &Path) -> Result<Vec<NamedSource>> {
    if !input.exists() {
        return Err(HistoryError::InvalidInput(format!(
            "{} does not exist",
            input.display()
        )));
    }

    let sources = if input.is_dir() {
        read_directory_sources(input)?
    } else if is_zip_path(input) {
        read_archive_sources(input)?
    } else if input
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        read_file_source(input)?
    } else {
        return Err(HistoryError::InvalidInput(format!(
            "{} is not a directory, a .json file or a .zip archive",
            input.display()
        )));
    };

    if sources.is_empty() {
        return Err(HistoryError::SourceDiscovery(input.to_path_buf()));
    }

    debug!("Collected {} source(s) from {}", sources.len(), input.display());
    Ok(sources)
}

/// Read every matching file under `dir`; source names are file names.
pub fn read_directory_sources(dir: &Path) -> Result<Vec<NamedSource>> {
    find_history_files(dir)
        .into_iter()
        .map(|path| read_named_file(&path))
        .collect()
}

/// Read one file as a source if its name matches the convention.
pub fn read_file_source(path: &Path) -> Result<Vec<NamedSource>> {
    let matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(is_history_source)
        .unwrap_or(false);
    if !matches {
        debug!("Ignoring non-history file {}", path.display());
        return Ok(Vec::new());
    }
    Ok(vec![read_named_file(path)?])
}

/// Read every matching member of a zip archive, in archive order.
///
/// Source names are the full member paths inside the archive.
pub fn read_archive_sources(path: &Path) -> Result<Vec<NamedSource>> {
    let file = std::fs::File::open(path).map_err(|e| HistoryError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(std::io::BufReader::new(file))
        .map_err(|e| HistoryError::Archive(format!("{}: {}", path.display(), e)))?;

    let mut sources = Vec::new();
    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|e| HistoryError::Archive(e.to_string()))?;

        if member.is_dir() {
            continue;
        }
        let name = member.name().to_string();
        if !is_history_source(&name) {
            continue;
        }
        if name.starts_with(APPLE_DOUBLE_PREFIX) {
            debug!("Skipping resource fork {}", name);
            continue;
        }

        let mut content = Vec::new();
        member
            .read_to_end(&mut content)
            .map_err(|e| HistoryError::Archive(format!("{}: {}", name, e)))?;
        sources.push(NamedSource::new(name, content));
    }

    Ok(sources)
}

/// Parse one source as a JSON array of event objects.
///
/// An empty array yields no events. Invalid JSON, a non-array top level, or
/// any non-object element is a [`HistoryError::Parse`].
pub fn parse_source(source: &NamedSource) -> Result<ParsedSource> {
    let bytes = source
        .content
        .strip_prefix(b"\xEF\xBB\xBF")
        .unwrap_or(source.content.as_slice());

    let value: Value = serde_json::from_slice(bytes).map_err(|e| HistoryError::Parse {
        source_name: source.name.clone(),
        reason: e.to_string(),
    })?;

    let Value::Array(items) = value else {
        return Err(HistoryError::Parse {
            source_name: source.name.clone(),
            reason: "expected a JSON array at the top level".to_string(),
        });
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => events.push(RawEvent(map)),
            other => {
                return Err(HistoryError::Parse {
                    source_name: source.name.clone(),
                    reason: format!(
                        "element {} is {} rather than an object",
                        index,
                        json_kind(&other)
                    ),
                })
            }
        }
    }

    debug!("Parsed {} event(s) from {}", events.len(), source.name);
    Ok(ParsedSource {
        name: source.name.clone(),
        events,
    })
}

/// Parse every source, stopping at the first failure.
pub fn parse_sources(sources: &[NamedSource]) -> Result<Vec<ParsedSource>> {
    sources.iter().map(parse_source).collect()
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn is_zip_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

fn read_named_file(path: &Path) -> Result<NamedSource> {
    let content = std::fs::read(path).map_err(|e| HistoryError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(NamedSource::new(name, content))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
