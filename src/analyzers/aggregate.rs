use rstar::RTree;
use rstar::primitives::GeomWithData;
use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::types::{AggregatedFeature, AggregatedProperties, StopFeature};
use crate::analyzers::utility::{centroid, compute_envelope, haversine};

/// Stops closer than this are shown as one aggregated stop.
pub const AGGREGATION_RADIUS_METERS: f64 = 50.0;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Disjoint sets over `0..n` with path halving.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// The smaller root wins, so each set is rooted at its lowest index.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Single-linkage clusters of `[lon, lat]` points: two points within
/// `radius` meters always share a cluster. Clusters are ordered by their
/// lowest member index and members are ascending.
pub fn cluster(points: &[[f64; 2]], radius: f64) -> Vec<Vec<usize>> {
    let tree: RTree<IndexedPoint> = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new(*p, i))
            .collect(),
    );

    let mut sets = UnionFind::new(points.len());
    for (i, p) in points.iter().enumerate() {
        let envelope = compute_envelope(p[1], p[0], radius);
        for neighbour in tree.locate_in_envelope(&envelope) {
            let j = neighbour.data;
            if j > i && haversine(*p, points[j]) <= radius {
                sets.union(i, j);
            }
        }
    }

    let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..points.len() {
        let root = sets.find(i);
        clusters.entry(root).or_default().push(i);
    }
    clusters.into_values().collect()
}

/// Merges stops within `radius` meters of each other into one feature at
/// the members' centroid.
pub fn aggregate_stops(stops: &[StopFeature], radius: f64) -> Vec<AggregatedFeature> {
    let points: Vec<[f64; 2]> = stops.iter().map(|s| [s.lon, s.lat]).collect();

    cluster(&points, radius)
        .into_iter()
        .filter_map(|members| {
            let member_points: Vec<[f64; 2]> = members.iter().map(|&i| points[i]).collect();
            let [lon, lat] = centroid(&member_points)?;

            let mut busiest = &stops[members[0]];
            let mut trip_count = 0;
            let mut trip_list = Vec::new();
            let mut routes = BTreeSet::new();
            let mut stop_ids = Vec::new();
            for &i in &members {
                let props = &stops[i].properties;
                if props.trip_count > busiest.properties.trip_count {
                    busiest = &stops[i];
                }
                trip_count += props.trip_count;
                trip_list.extend(props.trip_list.iter().cloned());
                routes.extend(props.route_list.iter().cloned());
                stop_ids.push(props.id.clone());
            }
            trip_list.sort();

            Some(AggregatedFeature {
                lon,
                lat,
                properties: AggregatedProperties {
                    name: busiest.properties.name.clone(),
                    stop_count: stop_ids.len(),
                    stop_ids,
                    trip_count,
                    trip_list,
                    route_count: routes.len(),
                    route_list: routes.into_iter().collect(),
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::StopProperties;

    fn stop(id: &str, lat: f64, lon: f64, trips: &[&str], routes: &[&str]) -> StopFeature {
        StopFeature {
            lon,
            lat,
            properties: StopProperties {
                id: id.to_string(),
                name: format!("Stop {id}"),
                trip_count: trips.len(),
                trip_list: trips.iter().map(|t| t.to_string()).collect(),
                route_count: routes.len(),
                route_list: routes.iter().map(|r| r.to_string()).collect(),
            },
        }
    }

    // About 11 m per 0.0001 degree of latitude.
    const STEP: f64 = 0.0001;

    #[test]
    fn test_nearby_stops_merge() {
        let stops = vec![
            stop("a", 12.9700, 77.59, &["06:00:00"], &["335-E"]),
            stop("b", 12.9700 + 3.0 * STEP, 77.59, &["06:05:00", "07:00:00"], &["335-E", "500-D"]),
            stop("c", 12.9800, 77.59, &["08:00:00"], &["KIA-9"]),
        ];

        let aggregated = aggregate_stops(&stops, AGGREGATION_RADIUS_METERS);

        assert_eq!(aggregated.len(), 2);
        let merged = &aggregated[0].properties;
        assert_eq!(merged.stop_ids, vec!["a", "b"]);
        assert_eq!(merged.name, "Stop b");
        assert_eq!(merged.trip_count, 3);
        assert_eq!(merged.trip_list, vec!["06:00:00", "06:05:00", "07:00:00"]);
        assert_eq!(merged.route_list, vec!["335-E", "500-D"]);
        assert_eq!(merged.route_count, 2);
        assert!((aggregated[0].lat - (12.9700 + 1.5 * STEP)).abs() < 1e-9);

        assert_eq!(aggregated[1].properties.stop_ids, vec!["c"]);
    }

    #[test]
    fn test_chains_are_transitive() {
        // 40 m apart pairwise along a line: a-b and b-c are within the
        // radius, a-c is not.
        let points = vec![
            [77.59, 12.97],
            [77.59, 12.97 + 3.6 * STEP],
            [77.59, 12.97 + 7.2 * STEP],
            [77.60, 12.97],
        ];
        assert!(haversine(points[0], points[2]) > AGGREGATION_RADIUS_METERS);

        let clusters = cluster(&points, AGGREGATION_RADIUS_METERS);

        assert_eq!(clusters, vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_stops(&[], AGGREGATION_RADIUS_METERS).is_empty());
    }
}
