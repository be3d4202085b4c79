//! Structural checks run against the built feed without any external tool.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::gtfs::{GtfsFeed, StopTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

impl Finding {
    fn error(code: &'static str, message: String) -> Self {
        Self { severity: Severity::Error, code, message }
    }

    fn warning(code: &'static str, message: String) -> Self {
        Self { severity: Severity::Warning, code, message }
    }
}

fn duplicates<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    let mut dups = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            dups.insert(id);
        }
    }
    dups.into_iter().collect()
}

/// Referential closure, duplicate ids, and per-trip sequence and time order.
pub fn check(feed: &GtfsFeed) -> Vec<Finding> {
    let mut findings = Vec::new();

    for id in duplicates(feed.stops.iter().map(|s| s.stop_id.as_str())) {
        findings.push(Finding::error("duplicate_stop", format!("stop_id {id} appears more than once")));
    }
    for id in duplicates(feed.routes.iter().map(|r| r.route_id.as_str())) {
        findings.push(Finding::error("duplicate_route", format!("route_id {id} appears more than once")));
    }
    for id in duplicates(feed.trips.iter().map(|t| t.trip_id.as_str())) {
        findings.push(Finding::error("duplicate_trip", format!("trip_id {id} appears more than once")));
    }

    let routes: BTreeSet<&str> = feed.routes.iter().map(|r| r.route_id.as_str()).collect();
    let stops: BTreeSet<&str> = feed.stops.iter().map(|s| s.stop_id.as_str()).collect();
    let shapes: BTreeSet<&str> = feed.shapes.iter().map(|s| s.shape_id.as_str()).collect();
    let services: BTreeSet<&str> = feed.calendar.iter().map(|c| c.service_id.as_str()).collect();
    let trips: BTreeSet<&str> = feed.trips.iter().map(|t| t.trip_id.as_str()).collect();

    for trip in &feed.trips {
        if !routes.contains(trip.route_id.as_str()) {
            findings.push(Finding::error(
                "unknown_route",
                format!("trip {} references route {}", trip.trip_id, trip.route_id),
            ));
        }
        if let Some(shape_id) = trip.shape_id.as_deref().filter(|id| !shapes.contains(id)) {
            findings.push(Finding::error(
                "unknown_shape",
                format!("trip {} references shape {shape_id}", trip.trip_id),
            ));
        }
        if !services.is_empty() && !services.contains(trip.service_id.as_str()) {
            findings.push(Finding::error(
                "unknown_service",
                format!("trip {} references service {}", trip.trip_id, trip.service_id),
            ));
        }
    }

    let mut by_trip: BTreeMap<&str, Vec<&StopTime>> = BTreeMap::new();
    for stop_time in &feed.stop_times {
        if !trips.contains(stop_time.trip_id.as_str()) {
            findings.push(Finding::error(
                "unknown_trip",
                format!("stop_time references trip {}", stop_time.trip_id),
            ));
        }
        if !stops.contains(stop_time.stop_id.as_str()) {
            findings.push(Finding::error(
                "unknown_stop",
                format!("trip {} references stop {}", stop_time.trip_id, stop_time.stop_id),
            ));
        }
        by_trip.entry(stop_time.trip_id.as_str()).or_default().push(stop_time);
    }

    for (trip_id, mut stop_times) in by_trip {
        stop_times.sort_by_key(|st| st.stop_sequence);
        for pair in stop_times.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if prev.stop_sequence == next.stop_sequence {
                findings.push(Finding::error(
                    "duplicate_stop_sequence",
                    format!("trip {trip_id} repeats stop_sequence {}", next.stop_sequence),
                ));
            }
            if let (Some(a), Some(b)) = (prev.departure_time, next.arrival_time) {
                if b < a {
                    findings.push(Finding::error(
                        "decreasing_stop_time",
                        format!(
                            "trip {trip_id} goes back in time at stop_sequence {} ({b} < {a})",
                            next.stop_sequence
                        ),
                    ));
                }
            }
        }
    }

    let timed: BTreeSet<&str> = feed.stop_times.iter().map(|st| st.trip_id.as_str()).collect();
    for trip in feed.trips.iter().filter(|t| !timed.contains(t.trip_id.as_str())) {
        findings.push(Finding::warning(
            "trip_without_stop_times",
            format!("trip {} has no stop_times", trip.trip_id),
        ));
    }

    let served: BTreeSet<&str> = feed.trips.iter().map(|t| t.route_id.as_str()).collect();
    for route in feed.routes.iter().filter(|r| !served.contains(r.route_id.as_str())) {
        findings.push(Finding::warning(
            "route_without_trips",
            format!("route {} has no trips", route.route_id),
        ));
    }

    findings
}
