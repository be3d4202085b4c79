//! In-memory [`HttpClient`] used by unit tests.

use super::client::HttpClient;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// What a [`Canned`] client saw.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: reqwest::header::HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Replays queued `(status, body)` responses in order and records every
/// request it is handed. Once the queue is empty it answers 404.
pub struct Canned {
    responses: Mutex<VecDeque<(u16, String)>>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl Canned {
    pub fn new(responses: Vec<(u16, &str)>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|(status, body)| (status, body.to_string()))
                    .collect(),
            ),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for Canned {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.seen.lock().unwrap().push(SeenRequest {
            method: req.method().clone(),
            url: req.url().to_string(),
            headers: req.headers().clone(),
            body: req.body().and_then(|b| b.as_bytes()).map(|b| b.to_vec()),
        });

        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((404, String::new()));

        let resp = http::Response::builder()
            .status(status)
            .body(body)
            .unwrap();
        Ok(reqwest::Response::from(resp))
    }
}
