//! One struct per GTFS table row, in the column order they are written.

use serde::{Deserialize, Serialize};

use super::time::GtfsTime;

/// Agency representing a public transit operator.
/// https://gtfs.org/documentation/schedule/reference/#agencytxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub agency_id: Option<String>,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
}

/// A transportation route.
/// https://gtfs.org/documentation/schedule/reference/#routestxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub agency_id: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_type: RouteType,
}

impl Route {
    /// Short name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.route_short_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.route_id)
    }
}

/// Type of transportation used on a route.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum RouteType {
    #[serde(rename = "0")]
    Tram,
    #[serde(rename = "1")]
    Subway,
    #[serde(rename = "2")]
    Rail,
    #[serde(rename = "3")]
    Bus,
    #[serde(rename = "4")]
    Ferry,
    #[serde(rename = "11")]
    Trolleybus,
}

/// https://gtfs.org/documentation/schedule/reference/#stopstxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

impl Stop {
    pub fn name(&self) -> &str {
        self.stop_name.as_deref().unwrap_or_default()
    }
}

/// https://gtfs.org/documentation/schedule/reference/#tripstxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    pub trip_headsign: Option<String>,
    pub direction_id: Option<u8>,
    pub shape_id: Option<String>,
}

/// https://gtfs.org/documentation/schedule/reference/#stop_timestxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub arrival_time: Option<GtfsTime>,
    pub departure_time: Option<GtfsTime>,
    pub stop_id: String,
    pub stop_sequence: u32,
}

/// https://gtfs.org/documentation/schedule/reference/#calendartxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    /// `YYYYMMDD`
    pub start_date: String,
    pub end_date: String,
}

/// https://gtfs.org/documentation/schedule/reference/#shapestxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePoint {
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
}

/// https://gtfs.org/documentation/schedule/reference/#translationstxt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub table_name: String,
    pub field_name: String,
    pub language: String,
    pub translation: String,
    pub record_id: Option<String>,
}
