//! Persistent session context
//!
//! Holds the auth token bundle and membership identity for the signed-in
//! player. Every mutation is written through to the state file immediately,
//! so a restart resumes with the same session instead of re-running the
//! full browser auth flow.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use std::fs;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Session state errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session io error: {0}")]
    Io(String),
    #[error("session parse error: {0}")]
    Parse(String),
    #[error("token response missing field `{0}`")]
    MissingField(&'static str),
}

/// Current time as unix seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Access/refresh token pair with absolute expirations (unix seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub token_expiration: u64,
    pub refresh_token_expiration: u64,
}

impl TokenBundle {
    pub fn access_expired(&self, now: u64) -> bool {
        self.token_expiration <= now
    }

    pub fn refresh_expired(&self, now: u64) -> bool {
        self.refresh_token_expiration <= now
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionData {
    token: Option<TokenBundle>,
    /// Service account id returned with the token response
    account_id: Option<String>,
    /// Game membership the account resolved to
    membership_id: Option<String>,
    membership_type: Option<i64>,
}

/// Write-through session store
pub struct Session {
    path: PathBuf,
    data: Mutex<SessionData>,
}

impl Session {
    /// Default state file location under the project data directory
    pub fn default_path() -> PathBuf {
        use directories::ProjectDirs;

        if let Some(proj_dirs) = ProjectDirs::from("net", "gridhost", "Griddeck") {
            proj_dirs.data_local_dir().join("session.json")
        } else {
            PathBuf::from("./session.json")
        }
    }

    /// Load the session from disk; a missing or unreadable file starts
    /// a fresh session
    pub fn load(path: PathBuf) -> Self {
        let data = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Corrupt session file {}: {}. Starting fresh.", path.display(), e);
                    SessionData::default()
                }
            },
            Err(_) => SessionData::default(),
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    /// Current token bundle, if any
    pub fn token(&self) -> Option<TokenBundle> {
        self.data.lock().token.clone()
    }

    /// Service account id stored with the last token response
    pub fn account_id(&self) -> Option<String> {
        self.data.lock().account_id.clone()
    }

    /// Resolved game membership `(id, type)`
    pub fn membership(&self) -> Option<(String, i64)> {
        let data = self.data.lock();
        match (&data.membership_id, data.membership_type) {
            (Some(id), Some(mtype)) => Some((id.clone(), mtype)),
            _ => None,
        }
    }

    /// Store a broker token response, converting relative expirations to
    /// absolute timestamps. Written through before returning.
    pub fn store_token_response(&self, response: &Value, now: u64) -> Result<(), SessionError> {
        let access_token = response
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(SessionError::MissingField("access_token"))?;
        let refresh_token = response
            .get("refresh_token")
            .and_then(Value::as_str)
            .ok_or(SessionError::MissingField("refresh_token"))?;
        let expires_in = response
            .get("expires_in")
            .and_then(Value::as_u64)
            .ok_or(SessionError::MissingField("expires_in"))?;
        let refresh_expires_in = response
            .get("refresh_expires_in")
            .and_then(Value::as_u64)
            .ok_or(SessionError::MissingField("refresh_expires_in"))?;
        let account_id = response
            .get("membership_id")
            .and_then(Value::as_str)
            .ok_or(SessionError::MissingField("membership_id"))?;

        {
            let mut data = self.data.lock();
            data.token = Some(TokenBundle {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                token_expiration: now + expires_in,
                refresh_token_expiration: now + refresh_expires_in,
            });
            data.account_id = Some(account_id.to_string());
        }
        self.persist()
    }

    /// Record the resolved game membership. Written through.
    pub fn set_membership(&self, id: &str, mtype: i64) -> Result<(), SessionError> {
        {
            let mut data = self.data.lock();
            data.membership_id = Some(id.to_string());
            data.membership_type = Some(mtype);
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SessionError::Io(e.to_string()))?;
        }
        let json = {
            let data = self.data.lock();
            serde_json::to_string_pretty(&*data).map_err(|e| SessionError::Parse(e.to_string()))?
        };
        fs::write(&self.path, json).map_err(|e| SessionError::Io(e.to_string()))
    }
}
