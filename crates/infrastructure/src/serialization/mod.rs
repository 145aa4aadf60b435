//! Deterministic JSON serialization for the Shipyard dataset file.
//!
//! Ensures clean diffs of the dataset by:
//! - Keeping records in id order (via the store's sorted collections)
//! - Using 2-space indentation
//! - Adding trailing newline

mod json;

pub use json::*;
