mod basic;
mod client;
mod headers;
mod retry;
#[cfg(test)]
pub(crate) mod testing;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use headers::StaticHeaders;
pub use retry::Retry;

use crate::config::ApiConfig;
use anyhow::Result;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderValue};

/// The client stack used against the live API: portal headers on top of a
/// fixed-count retry on top of a plain reqwest client.
pub type ApiClient = StaticHeaders<Retry<BasicClient>>;

pub fn api_client(config: &ApiConfig) -> Result<ApiClient> {
    let basic = BasicClient::from_config(config)?;
    let retry = Retry::new(basic, config.attempts, config.retry_pause);
    StaticHeaders::portal(retry, config)
}

/// POSTs an optional JSON body and returns the raw response body.
///
/// Non-success statuses are turned into errors so callers can treat every
/// `Ok` as a body worth parsing.
pub async fn post_json<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    body: Option<&serde_json::Value>,
) -> Result<Bytes> {
    let mut req = reqwest::Request::new(reqwest::Method::POST, url.parse()?);
    req.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(body) = body {
        *req.body_mut() = Some(serde_json::to_vec(body)?.into());
    }

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use testing::Canned;

    #[tokio::test]
    async fn test_post_json_sends_body_and_returns_bytes() {
        let canned = Canned::new(vec![(200, "{\"data\":[]}")]);
        let body = serde_json::json!({ "routeid": 42 });

        let bytes = post_json(&canned, "https://example.test/WebAPI/RoutePoints", Some(&body))
            .await
            .unwrap();

        assert_eq!(&bytes[..], b"{\"data\":[]}");
        let seen = canned.requests();
        assert_eq!(seen[0].method, reqwest::Method::POST);
        assert_eq!(seen[0].headers[CONTENT_TYPE], "application/json");
        assert_eq!(seen[0].body.as_deref(), Some(&b"{\"routeid\":42}"[..]));
    }

    #[test]
    fn test_api_client_from_default_config() {
        assert!(api_client(&ApiConfig::default()).is_ok());

        let mut config = ApiConfig::default();
        config.origin = "bad\norigin".to_string();
        assert!(api_client(&config).is_err());
    }

    #[tokio::test]
    async fn test_post_json_rejects_error_status() {
        let canned = Canned::new(vec![(500, "oops")]);
        let result = post_json(&canned, "https://example.test/WebAPI/GetAllRouteList", None).await;
        assert!(result.is_err());
    }
}
