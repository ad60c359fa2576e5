//! Runtime layer for the listening-history engine.
//!
//! Holds one loaded history for the lifetime of a user session and answers
//! range, artist and track selections against it.

pub mod session;

pub use history_core as core;
pub use history_data as data;
