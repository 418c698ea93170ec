//! Broker-driven auth flow
//!
//! Token acquisition goes through a third-party auth broker: the app opens
//! the player's browser at the broker's start URL with a random state nonce
//! and polls the broker until the token data shows up. Refreshes skip the
//! browser entirely. The calling operation blocks until auth resolves.

use std::thread;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use crate::config::{Session, SessionError, Settings, TokenBundle};
use crate::config::session::unix_now;

/// Delay between broker polls while waiting for the browser handoff
const POLL_DELAY: Duration = Duration::from_millis(250);

/// Auth flow errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("broker request failed: {0}")]
    Broker(String),
    #[error("could not open browser: {0}")]
    Browser(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What the stored token state requires before the next API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenAction {
    /// Token present and fresh
    UseCurrent,
    /// Access token expired, refresh token still valid
    Refresh,
    /// No token, or the refresh token itself is expired
    Acquire,
}

fn token_action(token: Option<&TokenBundle>, now: u64) -> TokenAction {
    match token {
        None => TokenAction::Acquire,
        Some(t) if t.refresh_expired(now) => TokenAction::Acquire,
        Some(t) if t.access_expired(now) => TokenAction::Refresh,
        Some(_) => TokenAction::UseCurrent,
    }
}

/// Client for the external auth broker
pub struct AuthBroker {
    client: reqwest::blocking::Client,
    broker_root: String,
}

impl AuthBroker {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            broker_root: settings.auth_broker.trim_end_matches('/').to_string(),
        }
    }

    /// Make sure the session holds a usable access token, running the
    /// acquisition or refresh flow if needed. Blocks until resolved.
    pub fn ensure_valid(&self, session: &Session) -> Result<(), AuthError> {
        let now = unix_now();
        match token_action(session.token().as_ref(), now) {
            TokenAction::UseCurrent => Ok(()),
            TokenAction::Refresh => self.refresh(session),
            TokenAction::Acquire => self.acquire(session),
        }
    }

    /// Full browser handoff: open the start URL, poll until the broker
    /// has token data for our state nonce
    fn acquire(&self, session: &Session) -> Result<(), AuthError> {
        log::info!("Fetching new token...");

        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        let start_url = format!("{}/start/{}", self.broker_root, state);
        webbrowser::open(&start_url).map_err(|e| AuthError::Browser(e.to_string()))?;

        let poll_url = format!("{}/poll/{}", self.broker_root, state);
        loop {
            let response = self
                .client
                .get(&poll_url)
                .send()
                .map_err(|e| AuthError::Broker(e.to_string()))?;

            // 404 means the player has not finished the browser flow yet
            if response.status().as_u16() != 404 {
                let token_data: Value = response
                    .json()
                    .map_err(|e| AuthError::Broker(e.to_string()))?;
                session.store_token_response(&token_data, unix_now())?;
                log::info!("Token acquired");
                return Ok(());
            }
            thread::sleep(POLL_DELAY);
        }
    }

    /// Exchange the refresh token for a new access token
    fn refresh(&self, session: &Session) -> Result<(), AuthError> {
        log::info!("Refreshing token...");

        let refresh_token = session
            .token()
            .map(|t| t.refresh_token)
            .unwrap_or_default();

        let response = self
            .client
            .get(format!("{}/refresh", self.broker_root))
            .form(&[("refresh_token", refresh_token)])
            .send()
            .map_err(|e| AuthError::Broker(e.to_string()))?;

        let token_data: Value = response
            .json()
            .map_err(|e| AuthError::Broker(e.to_string()))?;
        session.store_token_response(&token_data, unix_now())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(token_exp: u64, refresh_exp: u64) -> TokenBundle {
        TokenBundle {
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_expiration: token_exp,
            refresh_token_expiration: refresh_exp,
        }
    }

    #[test]
    fn test_no_token_acquires() {
        assert_eq!(token_action(None, 100), TokenAction::Acquire);
    }

    #[test]
    fn test_expired_refresh_token_acquires() {
        let token = bundle(50, 90);
        assert_eq!(token_action(Some(&token), 100), TokenAction::Acquire);
    }

    #[test]
    fn test_expired_access_token_refreshes() {
        let token = bundle(50, 5000);
        assert_eq!(token_action(Some(&token), 100), TokenAction::Refresh);
    }

    #[test]
    fn test_fresh_token_used_as_is() {
        let token = bundle(5000, 9000);
        assert_eq!(token_action(Some(&token), 100), TokenAction::UseCurrent);
    }
}
