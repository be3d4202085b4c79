use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

/// An [`HttpClient`] wrapper that re-sends a request a fixed number of times
/// when the transport fails or the server answers 5xx / 429.
///
/// There is no backoff curve: every retry waits the same `pause`. Requests
/// whose body cannot be cloned are sent exactly once.
pub struct Retry<C> {
    pub inner: C,
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub pause: Duration,
}

impl<C> Retry<C> {
    pub fn new(inner: C, attempts: u32, pause: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            pause,
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl<C: HttpClient> HttpClient for Retry<C> {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let mut attempt = 1;
        loop {
            // The final attempt consumes the original request.
            let Some(next) = (attempt < self.attempts)
                .then(|| req.try_clone())
                .flatten()
            else {
                return self.inner.execute(req).await;
            };

            match self.inner.execute(next).await {
                Ok(resp) if !is_retryable(resp.status()) => return Ok(resp),
                Ok(resp) => {
                    warn!(url = %req.url(), status = %resp.status(), attempt, "Retryable HTTP status");
                }
                Err(e) => {
                    warn!(url = %req.url(), error = %e, attempt, "HTTP request failed");
                }
            }

            attempt += 1;
            tokio::time::sleep(self.pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::Canned;

    fn request() -> reqwest::Request {
        reqwest::Request::new(
            reqwest::Method::POST,
            "https://example.test/WebAPI/RoutePoints".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_retries_server_errors_until_success() {
        let canned = Canned::new(vec![(503, ""), (502, ""), (200, "{\"data\":[]}")]);
        let client = Retry::new(&canned, 3, Duration::ZERO);

        let resp = client.execute(request()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(canned.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_fixed_attempts() {
        let canned = Canned::new(vec![(500, ""), (500, ""), (500, ""), (200, "")]);
        let client = Retry::new(&canned, 2, Duration::ZERO);

        let resp = client.execute(request()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(canned.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let canned = Canned::new(vec![(404, ""), (200, "")]);
        let client = Retry::new(&canned, 3, Duration::ZERO);

        let resp = client.execute(request()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(canned.requests().len(), 1);
    }
}
