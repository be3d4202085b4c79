use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::analyzers::aggregate::{AGGREGATION_RADIUS_METERS, aggregate_stops};
use crate::analyzers::routes::route_features;
use crate::analyzers::stops::stop_features;
use crate::analyzers::types::{
    AggregatedFeature, AggregatedRow, AnalysisSummary, RouteFeature, RouteRow, StopFeature,
    StopRow,
};
use crate::gtfs::{GtfsFeed, GtfsTime, Route, ShapePoint, Stop, StopTime, Trip};
use crate::output::{write_csv, write_geojson, write_json};

pub const SUMMARY_FILE: &str = "analysis_summary.json";

/// Id lookups over a feed, with stop times and shape points in sequence
/// order.
pub struct FeedIndex<'a> {
    pub feed: &'a GtfsFeed,
    pub routes: BTreeMap<&'a str, &'a Route>,
    pub stops: BTreeMap<&'a str, &'a Stop>,
    pub trips: BTreeMap<&'a str, &'a Trip>,
    stop_times: BTreeMap<&'a str, Vec<&'a StopTime>>,
    shapes: BTreeMap<&'a str, Vec<&'a ShapePoint>>,
}

impl<'a> FeedIndex<'a> {
    pub fn new(feed: &'a GtfsFeed) -> Self {
        let mut stop_times: BTreeMap<&str, Vec<&StopTime>> = BTreeMap::new();
        for st in &feed.stop_times {
            stop_times.entry(st.trip_id.as_str()).or_default().push(st);
        }
        for times in stop_times.values_mut() {
            times.sort_by_key(|st| st.stop_sequence);
        }

        let mut shapes: BTreeMap<&str, Vec<&ShapePoint>> = BTreeMap::new();
        for point in &feed.shapes {
            shapes.entry(point.shape_id.as_str()).or_default().push(point);
        }
        for points in shapes.values_mut() {
            points.sort_by_key(|p| p.shape_pt_sequence);
        }

        Self {
            feed,
            routes: feed.routes.iter().map(|r| (r.route_id.as_str(), r)).collect(),
            stops: feed.stops.iter().map(|s| (s.stop_id.as_str(), s)).collect(),
            trips: feed.trips.iter().map(|t| (t.trip_id.as_str(), t)).collect(),
            stop_times,
            shapes,
        }
    }

    pub fn stop_times(&self, trip_id: &str) -> &[&'a StopTime] {
        self.stop_times
            .get(trip_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Time the trip leaves its first stop.
    pub fn first_departure(&self, trip_id: &str) -> Option<GtfsTime> {
        self.stop_times(trip_id)
            .iter()
            .find_map(|st| st.departure_time.or(st.arrival_time))
    }

    pub fn shape_coordinates(&self, shape_id: Option<&str>) -> Option<Vec<[f64; 2]>> {
        let points = self.shapes.get(shape_id?)?;
        Some(points.iter().map(|p| [p.shape_pt_lon, p.shape_pt_lat]).collect())
    }

    /// The trip's stops as a line, for trips without a shape.
    pub fn stop_coordinates(&self, trip_id: &str) -> Vec<[f64; 2]> {
        self.stop_times(trip_id)
            .iter()
            .filter_map(|st| self.stops.get(st.stop_id.as_str()))
            .map(|stop| [stop.stop_lon, stop.stop_lat])
            .collect()
    }
}

/// Everything the analysis derives from one feed.
#[derive(Debug, Default)]
pub struct Analysis {
    pub routes: Vec<RouteFeature>,
    pub stops: Vec<StopFeature>,
    pub aggregated: Vec<AggregatedFeature>,
    pub skipped_routes: Vec<String>,
}

impl Analysis {
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            route_features: self.routes.len(),
            stop_features: self.stops.len(),
            aggregated_features: self.aggregated.len(),
            skipped_routes: self.skipped_routes.clone(),
        }
    }
}

pub fn analyze(feed: &GtfsFeed) -> Analysis {
    let index = FeedIndex::new(feed);
    let (routes, skipped_routes) = route_features(&index);
    let stops = stop_features(&index);
    let aggregated = aggregate_stops(&stops, AGGREGATION_RADIUS_METERS);
    Analysis {
        routes,
        stops,
        aggregated,
        skipped_routes,
    }
}

fn properties<T: Serialize>(value: &T) -> Result<JsonObject> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("properties must serialize to an object, got {other}"),
    }
}

fn feature<T: Serialize>(geometry: Value, props: &T) -> Result<Feature> {
    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties(props)?),
        foreign_members: None,
    })
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub fn route_collection(routes: &[RouteFeature]) -> Result<FeatureCollection> {
    let features = routes
        .iter()
        .map(|r| {
            let line = r.coordinates.iter().map(|c| c.to_vec()).collect();
            feature(Value::LineString(line), &r.properties)
        })
        .collect::<Result<_>>()?;
    Ok(collection(features))
}

pub fn stop_collection(stops: &[StopFeature]) -> Result<FeatureCollection> {
    let features = stops
        .iter()
        .map(|s| feature(Value::Point(vec![s.lon, s.lat]), &s.properties))
        .collect::<Result<_>>()?;
    Ok(collection(features))
}

pub fn aggregated_collection(stops: &[AggregatedFeature]) -> Result<FeatureCollection> {
    let features = stops
        .iter()
        .map(|s| feature(Value::Point(vec![s.lon, s.lat]), &s.properties))
        .collect::<Result<_>>()?;
    Ok(collection(features))
}

/// Analyze stage: reads the feed and writes `routes`, `stops` and
/// `aggregated` as GeoJSON and CSV.
#[tracing::instrument]
pub fn run(feed_path: &Path, geojson_dir: &Path, csv_dir: &Path) -> Result<AnalysisSummary> {
    let feed = GtfsFeed::from_zip(feed_path)
        .with_context(|| format!("cannot read feed {}", feed_path.display()))?;
    feed.print_stats();

    let analysis = analyze(&feed);

    write_geojson(&geojson_dir.join("routes.geojson"), route_collection(&analysis.routes)?)?;
    write_geojson(&geojson_dir.join("stops.geojson"), stop_collection(&analysis.stops)?)?;
    write_geojson(
        &geojson_dir.join("aggregated.geojson"),
        aggregated_collection(&analysis.aggregated)?,
    )?;

    let route_rows: Vec<RouteRow> = analysis.routes.iter().map(|r| (&r.properties).into()).collect();
    let stop_rows: Vec<StopRow> = analysis.stops.iter().map(|s| (&s.properties).into()).collect();
    let aggregated_rows: Vec<AggregatedRow> =
        analysis.aggregated.iter().map(|a| (&a.properties).into()).collect();
    write_csv(&csv_dir.join("routes.csv"), &route_rows)?;
    write_csv(&csv_dir.join("stops.csv"), &stop_rows)?;
    write_csv(&csv_dir.join("aggregated.csv"), &aggregated_rows)?;

    let summary = analysis.summary();
    info!(
        routes = summary.route_features,
        stops = summary.stop_features,
        aggregated = summary.aggregated_features,
        skipped_routes = summary.skipped_routes.len(),
        "Analysis finished"
    );
    write_json(&geojson_dir.join(SUMMARY_FILE), &summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::RouteType;

    fn feed() -> GtfsFeed {
        let stop = |id: &str, lat: f64| Stop {
            stop_id: id.to_string(),
            stop_name: Some(format!("Stop {id}")),
            stop_lat: lat,
            stop_lon: 77.5,
        };
        let trip = |id: &str, direction: u8| Trip {
            route_id: "K-1".to_string(),
            service_id: "1".to_string(),
            trip_id: id.to_string(),
            trip_headsign: None,
            direction_id: Some(direction),
            shape_id: None,
        };
        let st = |trip: &str, stop: &str, seq: u32, hour: u32| StopTime {
            trip_id: trip.to_string(),
            arrival_time: Some(GtfsTime::from_hms(hour, 0, 0)),
            departure_time: Some(GtfsTime::from_hms(hour, 0, 0)),
            stop_id: stop.to_string(),
            stop_sequence: seq,
        };
        GtfsFeed {
            routes: vec![Route {
                route_id: "K-1".to_string(),
                agency_id: None,
                route_short_name: Some("K-1".to_string()),
                route_long_name: None,
                route_type: RouteType::Bus,
            }],
            stops: vec![stop("x", 12.90), stop("y", 12.95), stop("z", 13.00)],
            trips: vec![trip("2", 0), trip("1", 0), trip("3", 1)],
            stop_times: vec![
                st("1", "y", 2, 7),
                st("1", "x", 1, 6),
                st("2", "x", 1, 9),
                st("2", "y", 2, 10),
                st("3", "z", 1, 8),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_route_directions() {
        let analysis = analyze(&feed());

        assert_eq!(analysis.routes.len(), 1);
        let up = &analysis.routes[0].properties;
        assert_eq!(up.direction_id, 0);
        assert_eq!(up.trip_count, 2);
        assert_eq!(up.route_trip_count, 3);
        assert_eq!(up.trip_list, vec!["06:00:00", "09:00:00"]);
        assert_eq!(up.stop_list, vec!["Stop x", "Stop y"]);
        assert_eq!(up.full_name, "Stop x → Stop y");
        assert_eq!(analysis.routes[0].coordinates, vec![[77.5, 12.90], [77.5, 12.95]]);

        // The DOWN trip only has one stop, so there is no line to draw.
        assert_eq!(analysis.skipped_routes, vec!["K-1 1".to_string()]);
    }

    #[test]
    fn test_stop_properties() {
        let analysis = analyze(&feed());

        let x = &analysis.stops[0].properties;
        assert_eq!(x.trip_count, 2);
        assert_eq!(x.trip_list, vec!["06:00:00", "09:00:00"]);
        assert_eq!(x.route_list, vec!["K-1"]);
        assert_eq!(analysis.aggregated.len(), 3);
    }

    #[test]
    fn test_features_carry_properties() {
        let analysis = analyze(&feed());
        let collection = stop_collection(&analysis.stops).unwrap();

        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props["id"], "x");
        assert_eq!(props["trip_count"], 2);
        assert_eq!(
            collection.features[0].geometry.as_ref().unwrap().value,
            Value::Point(vec![77.5, 12.90])
        );
    }
}
