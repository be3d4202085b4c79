use crate::config::ApiConfig;
use crate::fetch::client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};

/// An [`HttpClient`] wrapper that stamps a fixed set of headers on every
/// request.
///
/// The BMTC backend only answers requests that look like they come from its
/// web portal, so the portal's `Origin`, `Referer` and device headers are
/// injected here rather than at every call site.
pub struct StaticHeaders<C> {
    pub inner: C,
    pub headers: HeaderMap,
}

impl<C> StaticHeaders<C> {
    pub fn new(inner: C, headers: HeaderMap) -> Self {
        Self { inner, headers }
    }

    /// Headers the web portal sends with each API call.
    pub fn portal(inner: C, config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(ORIGIN, HeaderValue::from_str(&config.origin)?);
        headers.insert(REFERER, HeaderValue::from_str(&config.referer)?);
        headers.insert(
            HeaderName::from_static("lan"),
            HeaderValue::from_str(&config.language)?,
        );
        headers.insert(
            HeaderName::from_static("devicetype"),
            HeaderValue::from_str(&config.device_type)?,
        );
        Ok(Self::new(inner, headers))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for StaticHeaders<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        for (name, value) in &self.headers {
            req.headers_mut().insert(name.clone(), value.clone());
        }
        self.inner.execute(req).await
    }
}
