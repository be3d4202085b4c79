//! Data types produced by the analysis pipeline.
//!
//! Each feature kind has a properties struct (serialized into the GeoJSON
//! feature) and a flat CSV row mirroring it.

use serde::Serialize;

use crate::analyzers::utility::join_list;

/// Properties of one route direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteProperties {
    pub id: String,
    pub name: String,
    /// `"{first stop} → {last stop}"`
    pub full_name: String,
    pub direction_id: u8,
    /// Trips of this direction.
    pub trip_count: usize,
    /// Trips of the route, both directions.
    pub route_trip_count: usize,
    /// First departure of each trip, sorted.
    pub trip_list: Vec<String>,
    pub stop_count: usize,
    pub stop_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopProperties {
    pub id: String,
    pub name: String,
    pub trip_count: usize,
    /// Arrival times at this stop, sorted.
    pub trip_list: Vec<String>,
    pub route_count: usize,
    pub route_list: Vec<String>,
}

/// Properties of a cluster of nearby stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedProperties {
    /// Name of the member with the most trips.
    pub name: String,
    pub stop_ids: Vec<String>,
    pub stop_count: usize,
    /// Sum of the members' trip counts.
    pub trip_count: usize,
    pub trip_list: Vec<String>,
    pub route_count: usize,
    pub route_list: Vec<String>,
}

/// A route direction drawn as a line.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFeature {
    /// `[lon, lat]` pairs.
    pub coordinates: Vec<[f64; 2]>,
    pub properties: RouteProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopFeature {
    pub lon: f64,
    pub lat: f64,
    pub properties: StopProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedFeature {
    /// Centroid of the members.
    pub lon: f64,
    pub lat: f64,
    pub properties: AggregatedProperties,
}

#[derive(Debug, Serialize)]
pub struct RouteRow {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub direction_id: u8,
    pub trip_count: usize,
    pub route_trip_count: usize,
    pub trip_list: String,
    pub stop_count: usize,
    pub stop_list: String,
}

impl From<&RouteProperties> for RouteRow {
    fn from(p: &RouteProperties) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            full_name: p.full_name.clone(),
            direction_id: p.direction_id,
            trip_count: p.trip_count,
            route_trip_count: p.route_trip_count,
            trip_list: join_list(&p.trip_list),
            stop_count: p.stop_count,
            stop_list: join_list(&p.stop_list),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StopRow {
    pub id: String,
    pub name: String,
    pub trip_count: usize,
    pub trip_list: String,
    pub route_count: usize,
    pub route_list: String,
}

impl From<&StopProperties> for StopRow {
    fn from(p: &StopProperties) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            trip_count: p.trip_count,
            trip_list: join_list(&p.trip_list),
            route_count: p.route_count,
            route_list: join_list(&p.route_list),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AggregatedRow {
    pub name: String,
    pub stop_ids: String,
    pub stop_count: usize,
    pub trip_count: usize,
    pub trip_list: String,
    pub route_count: usize,
    pub route_list: String,
}

impl From<&AggregatedProperties> for AggregatedRow {
    fn from(p: &AggregatedProperties) -> Self {
        Self {
            name: p.name.clone(),
            stop_ids: join_list(&p.stop_ids),
            stop_count: p.stop_count,
            trip_count: p.trip_count,
            trip_list: join_list(&p.trip_list),
            route_count: p.route_count,
            route_list: join_list(&p.route_list),
        }
    }
}

/// Counts of what the analysis wrote.
#[derive(Debug, Default, Serialize)]
pub struct AnalysisSummary {
    pub route_features: usize,
    pub stop_features: usize,
    pub aggregated_features: usize,
    /// Route directions without enough coordinates for a line.
    pub skipped_routes: Vec<String>,
}
