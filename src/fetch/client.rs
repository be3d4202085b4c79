use async_trait::async_trait;
use reqwest::{Request, Response};

/// Anything that can execute a prepared request. Decorators in this module
/// wrap an inner client to add headers or retries.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for &C {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        (**self).execute(req).await
    }
}
