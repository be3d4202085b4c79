use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::analyzers::analyzer::FeedIndex;
use crate::analyzers::types::{RouteFeature, RouteProperties};
use crate::gtfs::Trip;

/// One feature per route and direction, in route id order. Directions whose
/// geometry has fewer than two points are returned in the second list.
pub fn route_features(index: &FeedIndex) -> (Vec<RouteFeature>, Vec<String>) {
    let mut groups: BTreeMap<(&str, u8), Vec<&Trip>> = BTreeMap::new();
    for trip in &index.feed.trips {
        groups
            .entry((trip.route_id.as_str(), trip.direction_id.unwrap_or(0)))
            .or_default()
            .push(trip);
    }

    let mut route_trips: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for trip in &index.feed.trips {
        route_trips
            .entry(trip.route_id.as_str())
            .or_default()
            .insert(trip.trip_id.as_str());
    }

    let mut features = Vec::new();
    let mut skipped = Vec::new();
    for ((route_id, direction_id), trips) in groups {
        let Some(first) = trips.first() else {
            continue;
        };
        let trip_ids: BTreeSet<&str> = trips.iter().map(|t| t.trip_id.as_str()).collect();

        let mut trip_list: Vec<String> = trip_ids
            .iter()
            .filter_map(|id| index.first_departure(id))
            .map(|t| t.to_string())
            .collect();
        trip_list.sort();

        let stop_list: Vec<String> = index
            .stop_times(&first.trip_id)
            .iter()
            .filter_map(|st| index.stops.get(st.stop_id.as_str()))
            .map(|stop| stop.name().to_string())
            .collect();
        let full_name = match (stop_list.first(), stop_list.last()) {
            (Some(from), Some(to)) => format!("{from} → {to}"),
            _ => "Unknown route".to_string(),
        };

        let coordinates = index
            .shape_coordinates(first.shape_id.as_deref())
            .filter(|coords| coords.len() >= 2)
            .unwrap_or_else(|| index.stop_coordinates(&first.trip_id));
        let label = format!("{route_id} {direction_id}");
        if coordinates.len() < 2 {
            warn!(route = %label, "Not enough coordinates for a route line");
            skipped.push(label);
            continue;
        }

        let name = index
            .routes
            .get(route_id)
            .map(|r| r.display_name().to_string())
            .unwrap_or_else(|| route_id.to_string());

        features.push(RouteFeature {
            coordinates,
            properties: RouteProperties {
                id: route_id.to_string(),
                name,
                full_name,
                direction_id,
                trip_count: trip_ids.len(),
                route_trip_count: route_trips.get(route_id).map_or(0, BTreeSet::len),
                trip_list,
                stop_count: stop_list.len(),
                stop_list,
            },
        });
    }
    (features, skipped)
}
