//! Data layer for the listening-history engine.
//!
//! Discovers and parses streaming-history sources, normalizes raw play
//! events into canonical records, orders and partitions them, computes the
//! derived metrics and writes the flat-file export.

pub mod aggregator;
pub mod analysis;
pub mod export;
pub mod forensics;
pub mod grouping;
pub mod normalizer;
pub mod reader;
pub mod record_set;

pub use history_core as core;
