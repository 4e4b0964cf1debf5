//! reqwest-backed transport

use super::{FrameSink, OutboundCall, Transport, TransportError, TransportOutcome};
use crate::constants::SESSION_HEADER;
use crate::domain::catalog::HttpMethod;
use crate::infrastructure::session::SessionStore;
use crate::infrastructure::sse;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    headers: Vec<(String, String)>,
    session: Arc<SessionStore>,
    http: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Vec::new(),
            session,
            http: Client::new(),
        }
    }

    /// Rebuilds the client with a request timeout. Streaming endpoints are
    /// bounded by the same limit, so keep it generous.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, reqwest::Error> {
        self.http = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Headers added to every request, before endpoint-specific ones.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Build URL from base URL and resolved path
    pub fn build_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn observe_session(&self, response: &Response) {
        let header = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok());
        self.session.observe(header);
    }
}

fn method_of(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Scalar parameters of a GET call, rendered as query pairs.
fn query_pairs(body: &Value) -> Vec<(String, String)> {
    let Some(object) = body.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .filter_map(|(key, value)| match value {
            Value::String(text) => Some((key.clone(), text.clone())),
            Value::Number(number) => Some((key.clone(), number.to_string())),
            Value::Bool(flag) => Some((key.clone(), flag.to_string())),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        call: OutboundCall<'_>,
        on_frame: FrameSink<'_>,
    ) -> Result<TransportOutcome, TransportError> {
        let endpoint = call.endpoint;
        let url = self.build_url(call.path);
        let body = call.body();

        let mut request = self
            .http
            .request(method_of(endpoint.method), &url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.session.current() {
            request = request.header(SESSION_HEADER, token);
        }
        for (name, value) in self.headers.iter().chain(endpoint.headers.iter()) {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match endpoint.method {
            HttpMethod::Get => request.query(&query_pairs(&body)),
            _ => request.json(&body),
        };

        info!(
            method = endpoint.method.as_str(),
            url = url.as_str(),
            streaming = endpoint.streaming,
            "Sending request to backend"
        );

        let response = request.send().await.map_err(|source| {
            error!(url = url.as_str(), error = %source, "Request failed before a response");
            TransportError::network(&url, source)
        })?;
        self.observe_session(&response);

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(url = url.as_str(), status = status.as_u16(), "Backend returned an error status");
            return Err(TransportError::status(&url, status.as_u16(), text));
        }

        if endpoint.streaming {
            let outcome = sse::consume(
                response.bytes_stream(),
                endpoint.chunk_transform.clone(),
                on_frame,
            )
            .await
            .map_err(|source| {
                error!(url = url.as_str(), error = %source, "Stream read failed");
                TransportError::stream(&url, source)
            })?;
            debug!(
                url = url.as_str(),
                completed = outcome.completed,
                delivered = outcome.delivered,
                dropped = outcome.dropped,
                "Stream consumed"
            );
            return Ok(TransportOutcome::Stream(outcome));
        }

        let text = response
            .text()
            .await
            .map_err(|source| TransportError::network(&url, source))?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|source| {
                error!(url = url.as_str(), error = %source, "Backend reply is not JSON");
                TransportError::invalid_json(&url, source)
            })?
        };
        debug!(url = url.as_str(), "Received reply from backend");
        Ok(TransportOutcome::Reply(endpoint.transform_response(value)))
    }
}
