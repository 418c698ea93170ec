//! Remote service boundary
//!
//! The gateway owns every authenticated request/response against the game
//! service; the auth module handles the broker-driven token flow.

pub mod auth;
pub mod gateway;

use serde_json::Value;

pub use auth::{AuthBroker, AuthError};
pub use gateway::{ApiError, ApiGateway, HttpMethod};

/// Anything that can fetch raw bytes from a service route.
///
/// The caches take this instead of the concrete gateway so their disk
/// behavior is testable without a network.
pub trait RemoteFetch: Send + Sync {
    fn fetch_bytes(&self, route: &str) -> Result<Vec<u8>, ApiError>;
}

/// The full request surface frames use against the remote service.
///
/// `ApiGateway` is the production implementation; tests swap in canned
/// responses.
pub trait GameApi: Send + Sync {
    fn call(
        &self,
        route: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<Value, ApiError>;

    fn fetch_bytes(&self, route: &str) -> Result<Vec<u8>, ApiError>;

    fn get(&self, route: &str) -> Result<Value, ApiError> {
        self.call(route, HttpMethod::Get, None)
    }

    fn post(&self, route: &str, body: &Value) -> Result<Value, ApiError> {
        self.call(route, HttpMethod::Post, Some(body))
    }
}

/// Adapter presenting a `GameApi` as the byte fetcher the caches expect
pub struct ApiFetch<'a>(pub &'a dyn GameApi);

impl RemoteFetch for ApiFetch<'_> {
    fn fetch_bytes(&self, route: &str) -> Result<Vec<u8>, ApiError> {
        self.0.fetch_bytes(route)
    }
}
