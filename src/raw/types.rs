//! Shapes of the JSON documents returned by the BMTC API.
//!
//! Only the fields the pipeline reads are modelled. The backend is loose about
//! types (ids come back as numbers or strings, coordinates occasionally as
//! strings), so ids and coordinates go through lenient deserializers.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// `GetAllRouteList`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteListResponse {
    #[serde(default)]
    pub data: Vec<RouteListEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteListEntry {
    #[serde(deserialize_with = "de_id")]
    pub routeid: String,
    pub routeno: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub fromstationid: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub tostationid: Option<String>,
    #[serde(default)]
    pub fromstation: Option<String>,
    #[serde(default)]
    pub tostation: Option<String>,
}

impl RouteListEntry {
    /// Route number as used for archive keys, e.g. `"335-E UP"`.
    pub fn route_no(&self) -> &str {
        self.routeno.trim()
    }

    /// Route number with its direction suffix removed, e.g. `"335-E"`.
    pub fn parent_name(&self) -> &str {
        strip_direction(self.route_no())
    }
}

/// Drops a trailing ` UP` / ` DOWN` from a route number.
pub fn strip_direction(route_no: &str) -> &str {
    let trimmed = route_no.trim();
    trimmed
        .strip_suffix(" UP")
        .or_else(|| trimmed.strip_suffix(" DOWN"))
        .unwrap_or(trimmed)
        .trim_end()
}

/// `SearchRoute_v2`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteSearchResponse {
    #[serde(default)]
    pub data: Vec<RouteSearchEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteSearchEntry {
    pub routeno: String,
    #[serde(deserialize_with = "de_id")]
    pub routeparentid: String,
}

/// `RoutePoints`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutePointsResponse {
    #[serde(default)]
    pub data: Vec<RoutePoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutePoint {
    #[serde(deserialize_with = "de_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "de_f64")]
    pub longitude: f64,
}

/// `SearchByRouteDetails_v4`: both directions of a route parent in one body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopListResponse {
    #[serde(default)]
    pub up: StopListDirection,
    #[serde(default)]
    pub down: StopListDirection,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopListDirection {
    #[serde(default)]
    pub data: Vec<Station>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Station {
    #[serde(deserialize_with = "de_id")]
    pub stationid: String,
    pub stationname: String,
    #[serde(deserialize_with = "de_f64")]
    pub centerlat: f64,
    #[serde(deserialize_with = "de_f64")]
    pub centerlong: f64,
}

impl StopListResponse {
    pub fn is_not_found(&self) -> bool {
        self.message.as_deref() == Some("Data not found")
    }

    pub fn direction(&self, direction: Direction) -> &[Station] {
        match direction {
            Direction::Up => &self.up.data,
            Direction::Down => &self.down.data,
        }
    }
}

/// `GetTimetableByRouteid_v2`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimetableResponse {
    #[serde(default)]
    pub data: Vec<TimetableEntry>,
    #[serde(default, rename = "Message")]
    pub message: Option<String>,
}

impl TimetableResponse {
    pub fn has_no_records(&self) -> bool {
        self.data.is_empty() || self.message.as_deref() == Some("No Records Found.")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimetableEntry {
    #[serde(default)]
    pub tostationname: Option<String>,
    #[serde(default)]
    pub tripdetails: Vec<TripDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripDetail {
    #[serde(default)]
    pub starttime: Option<String>,
    #[serde(default)]
    pub endtime: Option<String>,
}

/// Stop-name transliterations, one document per language.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationResponse {
    #[serde(default)]
    pub data: Vec<TranslationEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationEntry {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub stopid: Option<String>,
    #[serde(default)]
    pub geofencename: Option<String>,
}

/// Travel direction as the API names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Up, Direction::Down];

    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }

    /// GTFS `direction_id`.
    pub fn gtfs_id(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Float(f64),
    Str(String),
}

impl IdRepr {
    fn into_string(self) -> String {
        match self {
            IdRepr::Int(i) => i.to_string(),
            IdRepr::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
            IdRepr::Float(f) => f.to_string(),
            IdRepr::Str(s) => s.trim().to_string(),
        }
    }
}

fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(IdRepr::deserialize(deserializer)?.into_string())
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdRepr>::deserialize(deserializer)?
        .map(IdRepr::into_string)
        .filter(|s| !s.is_empty()))
}

fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match IdRepr::deserialize(deserializer)? {
        IdRepr::Int(i) => Ok(i as f64),
        IdRepr::Float(f) => Ok(f),
        IdRepr::Str(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_direction() {
        assert_eq!(strip_direction("335-E UP"), "335-E");
        assert_eq!(strip_direction(" 500-D DOWN "), "500-D");
        assert_eq!(strip_direction("KIA-9"), "KIA-9");
    }

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let json = r#"{"data":[
            {"routeid": 1234, "routeno": "335-E UP", "fromstationid": "20", "tostationid": 21},
            {"routeid": "99", "routeno": "G-4 DOWN"}
        ]}"#;
        let list: RouteListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.data[0].routeid, "1234");
        assert_eq!(list.data[0].fromstationid.as_deref(), Some("20"));
        assert_eq!(list.data[0].tostationid.as_deref(), Some("21"));
        assert_eq!(list.data[1].routeid, "99");
        assert_eq!(list.data[1].fromstationid, None);
        assert_eq!(list.data[1].parent_name(), "G-4");
    }

    #[test]
    fn test_coordinates_accept_strings() {
        let json = r#"{"data":[{"latitude":"12.97","longitude":77.59}]}"#;
        let points: RoutePointsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(points.data[0].latitude, 12.97);
        assert_eq!(points.data[0].longitude, 77.59);
    }

    #[test]
    fn test_timetable_no_records() {
        let json = r#"{"data":[], "Message":"No Records Found."}"#;
        let timetable: TimetableResponse = serde_json::from_str(json).unwrap();
        assert!(timetable.has_no_records());
    }

    #[test]
    fn test_stop_list_not_found() {
        let json = r#"{"message":"Data not found"}"#;
        let stops: StopListResponse = serde_json::from_str(json).unwrap();
        assert!(stops.is_not_found());
        assert!(stops.direction(Direction::Up).is_empty());
    }
}
