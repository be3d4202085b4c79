//! Raw scrape output to GTFS tables.
//!
//! Inclusion is best effort: a route direction lacking a stop list, a shape
//! or a timetable for the service day is left out and counted, never fatal.

use anyhow::Result;
use chrono::{Months, NaiveDate, Utc, Weekday};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::time::{GtfsTime, SECONDS_PER_DAY};
use super::{Agency, Calendar, GtfsFeed, Route, RouteType, ShapePoint, Stop, StopTime, Translation, Trip};
use crate::config::FeedConfig;
use crate::output::write_json;
use crate::parser::parse_payload;
use crate::raw::archive::{RawStore, route_key, timetable_key};
use crate::raw::types::{
    Direction, RoutePointsResponse, StopListResponse, TimetableResponse, TranslationResponse,
    TripDetail,
};
use crate::raw::RawDataset;
use crate::stats::BuildStats;

pub const SERVICE_ID: &str = "1";
pub const SUMMARY_FILE: &str = "build_summary.json";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Weekday whose timetables become the schedule.
    pub service_day: Weekday,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub feed: FeedConfig,
}

impl BuildOptions {
    /// Service valid for one year from `start_date`, using Monday timetables.
    pub fn new(start_date: NaiveDate, feed: FeedConfig) -> Self {
        Self {
            service_day: Weekday::Mon,
            start_date,
            end_date: start_date
                .checked_add_months(Months::new(12))
                .unwrap_or(start_date),
            feed,
        }
    }
}

/// Why a route direction produced no trips.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Exclusion {
    #[error("no stop list")]
    MissingStops,
    #[error("no shape")]
    MissingShape,
    #[error("no timetable for the service day")]
    MissingTimetable,
    #[error("malformed {0}")]
    Malformed(&'static str),
    #[error("no trip with usable times")]
    NoUsableTrips,
}

/// Archive folder name of a weekday, as the scraper writes it.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Spreads `n` stops evenly over a trip: stop `i` is at
/// `start + floor(i * duration / n)`. An end before the start means the trip
/// runs past midnight. Returns `None` when the window is not a duration of
/// at most one day.
pub fn interpolate(start: GtfsTime, end: GtfsTime, n: usize) -> Option<Vec<GtfsTime>> {
    let (start_s, end_s) = (u64::from(start.seconds()), u64::from(end.seconds()));
    let day = u64::from(SECONDS_PER_DAY);
    let duration = if end_s >= start_s {
        end_s - start_s
    } else {
        end_s.checked_add(day)?.checked_sub(start_s)?
    };
    if duration > day {
        return None;
    }
    let n_stops = n as u64;
    (0..n_stops)
        .map(|i| {
            let offset = u32::try_from(i.checked_mul(duration)? / n_stops).ok()?;
            start.seconds().checked_add(offset).map(GtfsTime)
        })
        .collect()
}

fn trip_window(detail: &TripDetail) -> Option<(GtfsTime, GtfsTime)> {
    let start = detail.starttime.as_deref()?.parse().ok()?;
    let end = detail.endtime.as_deref()?.parse().ok()?;
    Some((start, end))
}

struct FeedBuilder<'a> {
    raw: &'a RawDataset,
    options: &'a BuildOptions,
    stats: BuildStats,
    stops: BTreeMap<String, Stop>,
    /// Parsed stop-list entries by archive key.
    stop_lists: BTreeMap<String, StopListResponse>,
    routes: BTreeMap<String, Route>,
    shapes: BTreeMap<String, Vec<ShapePoint>>,
    trips: Vec<Trip>,
    stop_times: Vec<StopTime>,
}

impl<'a> FeedBuilder<'a> {
    fn new(raw: &'a RawDataset, options: &'a BuildOptions) -> Self {
        Self {
            raw,
            options,
            stats: BuildStats::default(),
            stops: BTreeMap::new(),
            stop_lists: BTreeMap::new(),
            routes: BTreeMap::new(),
            shapes: BTreeMap::new(),
            trips: Vec::new(),
            stop_times: Vec::new(),
        }
    }

    /// Every station of every stop list, first occurrence wins.
    fn load_stops(&mut self) {
        let raw = self.raw;
        for (key, body) in &raw.stops {
            let list: StopListResponse = match parse_payload(body) {
                Ok(list) => list,
                Err(e) => {
                    warn!(key, error = %e, "Unreadable stop list");
                    self.stats.failed_stop_files.push(key.clone());
                    continue;
                }
            };
            for station in list.up.data.iter().chain(&list.down.data) {
                self.stops
                    .entry(station.stationid.clone())
                    .or_insert_with(|| Stop {
                        stop_id: station.stationid.clone(),
                        stop_name: Some(station.stationname.trim().to_string()),
                        stop_lat: station.centerlat,
                        stop_lon: station.centerlong,
                    });
            }
            self.stop_lists.insert(key.clone(), list);
        }
        info!(stops = self.stops.len(), failed = self.stats.failed_stop_files.len(), "Stops loaded");
    }

    fn load_routes(&mut self) {
        let raw = self.raw;
        for entry in &raw.routes.data {
            let route_id = entry.parent_name();
            if route_id.is_empty() {
                continue;
            }
            let from = entry.fromstation.as_deref().unwrap_or_default().trim();
            let to = entry.tostation.as_deref().unwrap_or_default().trim();
            self.routes
                .entry(route_id.to_string())
                .or_insert_with(|| Route {
                    route_id: route_id.to_string(),
                    agency_id: Some(self.options.feed.agency_id.clone()),
                    route_short_name: Some(route_id.to_string()),
                    route_long_name: Some(format!("{from} ⇔ {to}")),
                    route_type: RouteType::Bus,
                });
        }
        self.stats.routes_listed = self.routes.len();
        info!(routes = self.routes.len(), "Routes loaded");
    }

    fn load_shapes(&mut self) {
        let raw = self.raw;
        for (key, body) in &raw.routelines {
            let shape_id = key.strip_suffix(".json").unwrap_or(key).trim();
            let points: RoutePointsResponse = match parse_payload(body) {
                Ok(points) => points,
                Err(e) => {
                    warn!(key, error = %e, "Unreadable routeline");
                    self.stats.failed_shape_files.push(key.clone());
                    continue;
                }
            };
            if points.data.is_empty() {
                continue;
            }
            let shape = points
                .data
                .iter()
                .enumerate()
                .map(|(i, point)| ShapePoint {
                    shape_id: shape_id.to_string(),
                    shape_pt_lat: point.latitude,
                    shape_pt_lon: point.longitude,
                    shape_pt_sequence: i as u32 + 1,
                })
                .collect();
            self.shapes.insert(shape_id.to_string(), shape);
        }
        info!(shapes = self.shapes.len(), failed = self.stats.failed_shape_files.len(), "Shapes loaded");
    }

    /// Walks routes in id order, UP before DOWN, numbering trips as they
    /// are written. Returns the ids of routes that got at least one trip.
    fn add_trips(&mut self) -> BTreeSet<String> {
        let weekday = weekday_name(self.options.service_day);
        let route_ids: Vec<String> = self.routes.keys().cloned().collect();
        let mut next_trip = 1u64;
        let mut served = BTreeSet::new();

        for route_id in route_ids {
            for direction in Direction::ALL {
                let label = format!("{} {}", route_id, direction.label());
                match self.direction_trips(&route_id, direction, &label, weekday, &mut next_trip) {
                    Ok(count) => {
                        debug!(route = %label, trips = count, "Route direction added");
                        served.insert(route_id.clone());
                    }
                    Err(exclusion) => {
                        debug!(route = %label, reason = %exclusion, "Route direction left out");
                        self.record(exclusion, label);
                    }
                }
            }
        }
        served
    }

    fn direction_trips(
        &mut self,
        route_id: &str,
        direction: Direction,
        label: &str,
        weekday: &str,
        next_trip: &mut u64,
    ) -> Result<usize, Exclusion> {
        let raw = self.raw;
        let key = route_key(label);

        let stations: Vec<String> = match self.stop_lists.get(&key) {
            Some(list) => list
                .direction(direction)
                .iter()
                .map(|s| s.stationid.clone())
                .collect(),
            None if self.stats.failed_stop_files.contains(&key) => {
                return Err(Exclusion::Malformed("stop list"));
            }
            None => return Err(Exclusion::MissingStops),
        };
        if stations.is_empty() {
            return Err(Exclusion::MissingStops);
        }
        if !self.shapes.contains_key(label) {
            return Err(Exclusion::MissingShape);
        }

        let body = raw
            .timetables
            .get(&timetable_key(weekday, label))
            .ok_or(Exclusion::MissingTimetable)?;
        let timetable: TimetableResponse =
            parse_payload(body).map_err(|_| Exclusion::Malformed("timetable"))?;
        if timetable.has_no_records() {
            return Err(Exclusion::MissingTimetable);
        }
        let Some(entry) = timetable.data.first() else {
            return Err(Exclusion::MissingTimetable);
        };
        let headsign = entry
            .tostationname
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from);

        let mut written = 0;
        for detail in &entry.tripdetails {
            let Some(times) = trip_window(detail)
                .and_then(|(start, end)| interpolate(start, end, stations.len()))
            else {
                self.stats.skipped_trips += 1;
                continue;
            };
            let trip_id = next_trip.to_string();
            *next_trip += 1;

            self.trips.push(Trip {
                route_id: route_id.to_string(),
                service_id: SERVICE_ID.to_string(),
                trip_id: trip_id.clone(),
                trip_headsign: headsign.clone(),
                direction_id: Some(direction.gtfs_id()),
                shape_id: Some(label.to_string()),
            });
            for (i, (stop_id, time)) in stations.iter().zip(times).enumerate() {
                self.stop_times.push(StopTime {
                    trip_id: trip_id.clone(),
                    arrival_time: Some(time),
                    departure_time: Some(time),
                    stop_id: stop_id.clone(),
                    stop_sequence: i as u32 + 1,
                });
            }
            written += 1;
        }

        if written == 0 {
            Err(Exclusion::NoUsableTrips)
        } else {
            Ok(written)
        }
    }

    fn record(&mut self, exclusion: Exclusion, label: String) {
        match exclusion {
            Exclusion::MissingStops => self.stats.missing_stops.push(label),
            Exclusion::MissingShape => self.stats.missing_shapes.push(label),
            Exclusion::MissingTimetable => self.stats.missing_timetables.push(label),
            Exclusion::Malformed(_) | Exclusion::NoUsableTrips => self.stats.malformed.push(label),
        }
    }

    /// Kannada (or whichever language is configured) stop names for the
    /// stops that made it into the feed.
    fn translations(&mut self, stops: &[Stop]) -> Vec<Translation> {
        let raw = self.raw;
        let language = &self.options.feed.translation_language;
        let suffix = format!("_{language}.json");

        let mut names = BTreeMap::new();
        for (key, body) in &raw.translations {
            if !key.ends_with(&suffix) {
                continue;
            }
            match parse_payload::<TranslationResponse>(body) {
                Ok(doc) => {
                    for entry in doc.data {
                        if let (Some(stop_id), Some(name)) = (entry.stopid, entry.geofencename) {
                            if !name.trim().is_empty() {
                                names.insert(stop_id, name.trim().to_string());
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(key, error = %e, "Unreadable translation file");
                    self.stats.failed_translation_files.push(key.clone());
                }
            }
        }

        stops
            .iter()
            .filter_map(|stop| {
                names.get(&stop.stop_id).map(|name| Translation {
                    table_name: "stops".to_string(),
                    field_name: "stop_name".to_string(),
                    language: language.clone(),
                    translation: name.clone(),
                    record_id: Some(stop.stop_id.clone()),
                })
            })
            .collect()
    }

    /// Keeps only routes with trips and the stops and shapes they use.
    fn finish(mut self, served: BTreeSet<String>) -> (GtfsFeed, BuildStats) {
        let routes: Vec<Route> = std::mem::take(&mut self.routes)
            .into_values()
            .filter(|route| served.contains(&route.route_id))
            .collect();

        let used_stops: BTreeSet<&str> = self.stop_times.iter().map(|st| st.stop_id.as_str()).collect();
        let stops: Vec<Stop> = self
            .stops
            .values()
            .filter(|stop| used_stops.contains(stop.stop_id.as_str()))
            .cloned()
            .collect();

        let used_shapes: BTreeSet<&str> = self.trips.iter().filter_map(|t| t.shape_id.as_deref()).collect();
        let shapes: Vec<ShapePoint> = self
            .shapes
            .iter()
            .filter(|(id, _)| used_shapes.contains(id.as_str()))
            .flat_map(|(_, points)| points.iter().cloned())
            .collect();
        let shape_count = used_shapes.len();

        let translations = self.translations(&stops);

        let feed_config = &self.options.feed;
        let agencies = vec![Agency {
            agency_id: Some(feed_config.agency_id.clone()),
            agency_name: feed_config.agency_name.clone(),
            agency_url: feed_config.agency_url.clone(),
            agency_timezone: feed_config.agency_timezone.clone(),
        }];
        let calendar = vec![Calendar {
            service_id: SERVICE_ID.to_string(),
            monday: 1,
            tuesday: 1,
            wednesday: 1,
            thursday: 1,
            friday: 1,
            saturday: 1,
            sunday: 1,
            start_date: self.options.start_date.format("%Y%m%d").to_string(),
            end_date: self.options.end_date.format("%Y%m%d").to_string(),
        }];

        let mut stats = self.stats;
        stats.routes_included = routes.len();
        stats.routes_excluded = stats.routes_listed - routes.len();
        stats.stops = stops.len();
        stats.shapes = shape_count;
        stats.trips = self.trips.len();
        stats.stop_times = self.stop_times.len();
        stats.translations = translations.len();

        let feed = GtfsFeed {
            agencies,
            routes,
            stops,
            trips: self.trips,
            stop_times: self.stop_times,
            calendar,
            shapes,
            translations,
        };
        (feed, stats)
    }
}

/// Builds the feed from an in-memory raw dataset. Deterministic: the same
/// input and options always give the same tables.
#[tracing::instrument(skip_all, fields(service_day = %options.service_day))]
pub fn build(raw: &RawDataset, options: &BuildOptions) -> (GtfsFeed, BuildStats) {
    let mut builder = FeedBuilder::new(raw, options);
    builder.load_stops();
    builder.load_routes();
    builder.load_shapes();
    let served = builder.add_trips();
    builder.finish(served)
}

pub fn summary_path(feed_path: &Path) -> PathBuf {
    feed_path.with_file_name(SUMMARY_FILE)
}

/// Build stage: raw directory in, zipped feed and `build_summary.json` out.
#[tracing::instrument(skip(options))]
pub fn run(raw_dir: &Path, feed_path: &Path, options: &BuildOptions) -> Result<BuildStats> {
    let raw = RawDataset::load(&RawStore::new(raw_dir))?;
    let (feed, mut stats) = build(&raw, options);

    feed.write_zip(feed_path)?;
    stats.timestamp = Some(Utc::now());
    stats.log();
    write_json(&summary_path(feed_path), &stats)?;
    Ok(stats)
}
