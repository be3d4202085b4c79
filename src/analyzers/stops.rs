use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::analyzer::FeedIndex;
use crate::analyzers::types::{StopFeature, StopProperties};
use crate::gtfs::GtfsTime;

#[derive(Default)]
struct StopUsage<'a> {
    trips: BTreeSet<&'a str>,
    arrivals: Vec<GtfsTime>,
    routes: BTreeSet<&'a str>,
}

/// One feature per stop, in `stops.txt` order, with the trips and routes
/// passing through it.
pub fn stop_features(index: &FeedIndex) -> Vec<StopFeature> {
    let mut usage: BTreeMap<&str, StopUsage> = BTreeMap::new();
    for stop_time in &index.feed.stop_times {
        let entry = usage.entry(stop_time.stop_id.as_str()).or_default();
        entry.trips.insert(stop_time.trip_id.as_str());
        if let Some(time) = stop_time.arrival_time.or(stop_time.departure_time) {
            entry.arrivals.push(time);
        }
        if let Some(route) = index
            .trips
            .get(stop_time.trip_id.as_str())
            .and_then(|trip| index.routes.get(trip.route_id.as_str()))
        {
            entry.routes.insert(route.display_name());
        }
    }

    index
        .feed
        .stops
        .iter()
        .map(|stop| {
            let used = usage.remove(stop.stop_id.as_str()).unwrap_or_default();
            let mut arrivals = used.arrivals;
            arrivals.sort();
            StopFeature {
                lon: stop.stop_lon,
                lat: stop.stop_lat,
                properties: StopProperties {
                    id: stop.stop_id.clone(),
                    name: stop.name().to_string(),
                    trip_count: used.trips.len(),
                    trip_list: arrivals.iter().map(GtfsTime::to_string).collect(),
                    route_count: used.routes.len(),
                    route_list: used.routes.into_iter().map(String::from).collect(),
                },
            }
        })
        .collect()
}
