//! Shared types for the listening-history engine.
//!
//! Holds the canonical record model, the error taxonomy, timestamp and raw
//! field processing, CLI settings and the small formatting helpers used by
//! the report views.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
