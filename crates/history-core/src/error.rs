use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the listening-history engine.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// No `Streaming_History_Audio_*.json` source matched under the input.
    #[error("No Streaming_History_Audio_*.json files found in {0}")]
    SourceDiscovery(PathBuf),

    /// A source was not valid JSON, or not a JSON array of objects.
    #[error("Failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    /// Sources were read but none of their events survived normalization.
    #[error("No valid streaming records found in {sources} source file(s)")]
    EmptyResult { sources: usize },

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input archive could not be opened or one of its members read.
    #[error("Archive error: {0}")]
    Archive(String),

    /// A CSV export file could not be written.
    #[error("Failed to write {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    /// The input path is neither a directory, a JSON file nor a zip archive.
    #[error("Unsupported input: {0}")]
    InvalidInput(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HistoryError {
    /// `true` for failures that happen before any record exists: discovery
    /// and parse errors. The caller may prompt for a different input.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            HistoryError::SourceDiscovery(_)
                | HistoryError::Parse { .. }
                | HistoryError::FileRead { .. }
                | HistoryError::Archive(_)
                | HistoryError::InvalidInput(_)
        )
    }
}

/// Convenience alias used throughout the history crates.
pub type Result<T> = std::result::Result<T, HistoryError>;
