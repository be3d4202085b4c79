//! GTFS tables, their zip reader and writer, and the builder that derives
//! them from raw scrape output.

pub mod builder;
pub mod error;
mod reader;
pub mod records;
pub mod time;
mod writer;

pub use error::Error;
pub use records::*;
pub use time::GtfsTime;

/// A whole GTFS feed held in memory, one `Vec` per table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GtfsFeed {
    pub agencies: Vec<Agency>,
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
    pub calendar: Vec<Calendar>,
    pub shapes: Vec<ShapePoint>,
    pub translations: Vec<Translation>,
}

impl GtfsFeed {
    pub fn print_stats(&self) {
        tracing::info!(
            agencies = self.agencies.len(),
            routes = self.routes.len(),
            stops = self.stops.len(),
            trips = self.trips.len(),
            stop_times = self.stop_times.len(),
            calendar = self.calendar.len(),
            shape_points = self.shapes.len(),
            translations = self.translations.len(),
            "GTFS tables"
        );
    }
}
