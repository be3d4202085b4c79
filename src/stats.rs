//! Per-run summaries of the scrape and build stages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of one scraped category.
#[derive(Debug, Default, Serialize)]
pub struct CategoryStats {
    pub requested: usize,
    pub fetched: usize,
    pub reused: usize,
    /// Keys that could not be fetched or parsed.
    pub missing: Vec<String>,
}

impl CategoryStats {
    pub fn record_missing(&mut self, key: impl Into<String>) {
        self.missing.push(key.into());
    }

    fn log(&self, category: &str) {
        info!(
            category,
            requested = self.requested,
            fetched = self.fetched,
            reused = self.reused,
            missing = self.missing.len(),
            "Scrape category summary"
        );
    }
}

#[derive(Debug, Serialize)]
pub struct ScrapeStats {
    pub timestamp: DateTime<Utc>,
    pub routes: usize,
    pub route_ids: CategoryStats,
    pub routelines: CategoryStats,
    pub timetables: CategoryStats,
    pub stops: CategoryStats,
}

impl ScrapeStats {
    pub fn new(routes: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            routes,
            route_ids: CategoryStats::default(),
            routelines: CategoryStats::default(),
            timetables: CategoryStats::default(),
            stops: CategoryStats::default(),
        }
    }

    pub fn log(&self) {
        info!(routes = self.routes, "Scrape finished");
        self.route_ids.log("routeids");
        self.routelines.log("routelines");
        self.timetables.log("timetables");
        self.stops.log("stops");
    }
}

/// Counts of what the builder wrote and what it left out.
#[derive(Debug, Default, Serialize)]
pub struct BuildStats {
    pub timestamp: Option<DateTime<Utc>>,
    pub routes_listed: usize,
    pub routes_included: usize,
    pub routes_excluded: usize,
    pub stops: usize,
    pub shapes: usize,
    pub trips: usize,
    pub stop_times: usize,
    pub translations: usize,
    /// Timetable rows dropped because their times were missing or unparseable.
    pub skipped_trips: usize,

    pub missing_stops: Vec<String>,
    pub missing_shapes: Vec<String>,
    pub missing_timetables: Vec<String>,
    pub malformed: Vec<String>,
    pub failed_stop_files: Vec<String>,
    pub failed_shape_files: Vec<String>,
    pub failed_translation_files: Vec<String>,
}

impl BuildStats {
    pub fn log(&self) {
        info!(
            routes_included = self.routes_included,
            routes_excluded = self.routes_excluded,
            stops = self.stops,
            shapes = self.shapes,
            trips = self.trips,
            stop_times = self.stop_times,
            translations = self.translations,
            "GTFS feed built"
        );
        if self.skipped_trips > 0 {
            warn!(skipped_trips = self.skipped_trips, "Timetable rows without usable times");
        }
        info!(
            missing_stops = self.missing_stops.len(),
            missing_shapes = self.missing_shapes.len(),
            missing_timetables = self.missing_timetables.len(),
            malformed = self.malformed.len(),
            "Route directions left out"
        );
        let failed_files = self.failed_stop_files.len()
            + self.failed_shape_files.len()
            + self.failed_translation_files.len();
        if failed_files > 0 {
            warn!(
                stop_files = self.failed_stop_files.len(),
                shape_files = self.failed_shape_files.len(),
                translation_files = self.failed_translation_files.len(),
                "Raw entries could not be parsed"
            );
        }
    }
}
