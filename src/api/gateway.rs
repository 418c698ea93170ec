//! Authenticated API gateway
//!
//! Thin blocking wrapper over the remote service. Successful responses
//! unwrap to their `Response` envelope field when present, otherwise the
//! raw payload is returned. No automatic retry: a failed call surfaces to
//! the caller, which decides whether re-invoking makes sense.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::config::{Session, Settings};

use super::{GameApi, RemoteFetch};

/// Gateway request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the remote service boundary
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("service returned status {0}")]
    Status(u16),
    #[error("expected JSON from API, received status {status}")]
    NotJson { status: u16 },
}

/// Request methods the service actually uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Blocking gateway to the remote game-data service
pub struct ApiGateway {
    client: reqwest::blocking::Client,
    service_root: String,
    api_key: String,
    session: Arc<Session>,
}

impl ApiGateway {
    pub fn new(settings: &Settings, session: Arc<Session>) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Request(format!("http client init failed: {}", e)))?;

        Ok(Self {
            client,
            service_root: settings.service_root.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            session,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.service_root, route)
    }

    /// Issue a request and unwrap the response envelope
    pub fn call(
        &self,
        route: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = self.url(route);
        let mut request = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };

        request = request.header("X-API-Key", &self.api_key);
        if let Some(token) = self.session.token() {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token.access_token),
            );
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let json: Value =
            serde_json::from_str(&text).map_err(|_| ApiError::NotJson { status })?;
        Ok(unwrap_envelope(json))
    }

    /// GET a route
    pub fn get(&self, route: &str) -> Result<Value, ApiError> {
        self.call(route, HttpMethod::Get, None)
    }

    /// POST a route with a JSON body
    pub fn post(&self, route: &str, body: &Value) -> Result<Value, ApiError> {
        self.call(route, HttpMethod::Post, Some(body))
    }
}

impl GameApi for ApiGateway {
    fn call(
        &self,
        route: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        ApiGateway::call(self, route, method, body)
    }

    fn fetch_bytes(&self, route: &str) -> Result<Vec<u8>, ApiError> {
        RemoteFetch::fetch_bytes(self, route)
    }
}

impl RemoteFetch for ApiGateway {
    /// Raw byte download for images and archives. These routes return
    /// binary payloads, not the JSON envelope.
    fn fetch_bytes(&self, route: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(self.url(route))
            .header("X-API-Key", &self.api_key)
            .send()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ApiError::Request(e.to_string()))
    }
}

/// Unwrap a service payload to its `Response` field when present
fn unwrap_envelope(json: Value) -> Value {
    match json.get("Response") {
        Some(inner) => inner.clone(),
        None => json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_unwrapped() {
        let payload = json!({"Response": {"version": "v2"}, "ErrorCode": 1});
        assert_eq!(unwrap_envelope(payload), json!({"version": "v2"}));
    }

    #[test]
    fn test_bare_payload_passes_through() {
        let payload = json!({"version": "v2"});
        assert_eq!(unwrap_envelope(payload.clone()), payload);
    }
}
