//! Trait and request types for the transit authority's backend.

use anyhow::Result;
use bytes::Bytes;
use chrono::NaiveDate;

/// Parameters of a timetable lookup for one route on one service date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableQuery {
    pub route_id: String,
    pub from_station_id: String,
    pub to_station_id: String,
    pub date: NaiveDate,
}

/// Abstraction over the mobile-app backend.
///
/// Every method returns the raw response body: the scraper persists bodies
/// verbatim and only parses them to decide whether they are usable.
#[async_trait::async_trait]
pub trait TransitApi: Send + Sync {
    /// Every route the backend knows, one entry per direction.
    async fn route_list(&self) -> Result<Bytes>;

    /// Routes whose number starts with `prefix`, with their parent ids.
    async fn search_routes(&self, prefix: &str) -> Result<Bytes>;

    /// Ordered geometry of one directional route.
    async fn route_points(&self, route_id: &str) -> Result<Bytes>;

    /// Trip start/end times of one directional route on a given date.
    async fn timetable(&self, query: &TimetableQuery) -> Result<Bytes>;

    /// Ordered stop lists for both directions of a route parent.
    async fn route_details(&self, parent_id: &str) -> Result<Bytes>;
}
