use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};

use crate::config::ApiConfig;
use crate::fetch::{self, ApiClient, HttpClient};
use crate::services::transit_api::{TimetableQuery, TransitApi};

/// [`TransitApi`] backed by the BMTC web portal endpoints.
pub struct BmtcClient<C> {
    base_url: String,
    http: C,
}

impl BmtcClient<ApiClient> {
    /// Client with portal headers, timeouts and retries from `config`.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Ok(Self::new(&config.base_url, fetch::api_client(config)?))
    }
}

impl<C: HttpClient> BmtcClient<C> {
    pub fn new(base_url: &str, http: C) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn post(&self, endpoint: &str, body: Option<Value>) -> Result<Bytes> {
        fetch::post_json(&self.http, &self.url(endpoint), body.as_ref()).await
    }
}

/// The backend expects numeric ids as JSON numbers.
fn id_value(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

#[async_trait]
impl<C: HttpClient> TransitApi for BmtcClient<C> {
    async fn route_list(&self) -> Result<Bytes> {
        self.post("GetAllRouteList", None).await
    }

    async fn search_routes(&self, prefix: &str) -> Result<Bytes> {
        self.post("SearchRoute_v2", Some(json!({ "routetext": prefix })))
            .await
    }

    async fn route_points(&self, route_id: &str) -> Result<Bytes> {
        self.post("RoutePoints", Some(json!({ "routeid": id_value(route_id) })))
            .await
    }

    async fn timetable(&self, query: &TimetableQuery) -> Result<Bytes> {
        let body = json!({
            "routeid": id_value(&query.route_id),
            "fromStationId": id_value(&query.from_station_id),
            "toStationId": id_value(&query.to_station_id),
            "current_date": query.date.format("%Y-%m-%d").to_string(),
        });
        self.post("GetTimetableByRouteid_v2", Some(body)).await
    }

    async fn route_details(&self, parent_id: &str) -> Result<Bytes> {
        let body = json!({ "routeid": id_value(parent_id), "servicetypeid": 0 });
        self.post("SearchByRouteDetails_v4", Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::Canned;
    use chrono::NaiveDate;

    fn body_json(body: &Option<Vec<u8>>) -> Value {
        serde_json::from_slice(body.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_route_points_request() {
        let canned = Canned::new(vec![(200, "{\"data\":[]}")]);
        let client = BmtcClient::new("https://example.test/WebAPI/", &canned);

        client.route_points("2145").await.unwrap();

        let seen = canned.requests();
        assert_eq!(seen[0].url, "https://example.test/WebAPI/RoutePoints");
        assert_eq!(body_json(&seen[0].body), json!({ "routeid": 2145 }));
    }

    #[tokio::test]
    async fn test_timetable_request_body() {
        let canned = Canned::new(vec![(200, "{\"data\":[]}")]);
        let client = BmtcClient::new("https://example.test/WebAPI", &canned);

        let query = TimetableQuery {
            route_id: "2145".to_string(),
            from_station_id: "20".to_string(),
            to_station_id: "35".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        };
        client.timetable(&query).await.unwrap();

        let seen = canned.requests();
        assert_eq!(seen[0].url, "https://example.test/WebAPI/GetTimetableByRouteid_v2");
        assert_eq!(
            body_json(&seen[0].body),
            json!({
                "routeid": 2145,
                "fromStationId": 20,
                "toStationId": 35,
                "current_date": "2026-10-19",
            })
        );
    }

    #[tokio::test]
    async fn test_route_list_has_no_body() {
        let canned = Canned::new(vec![(200, "{\"data\":[]}")]);
        let client = BmtcClient::new("https://example.test/WebAPI", &canned);

        let body = client.route_list().await.unwrap();

        assert_eq!(&body[..], b"{\"data\":[]}");
        assert!(canned.requests()[0].body.is_none());
    }

    #[test]
    fn test_non_numeric_ids_stay_strings() {
        assert_eq!(id_value("17"), json!(17));
        assert_eq!(id_value("KIA-9"), json!("KIA-9"));
    }
}
