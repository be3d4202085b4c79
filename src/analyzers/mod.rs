//! Route and stop frequency analysis of a built feed.
//!
//! This module reads the GTFS archive, counts trips per route direction and
//! per stop, merges nearby stops, and writes the results as GeoJSON feature
//! collections with CSV mirrors.

pub mod aggregate;
pub mod analyzer;
pub mod routes;
pub mod stops;
pub mod types;
pub mod utility;

pub use analyzer::{Analysis, FeedIndex, analyze, run};
