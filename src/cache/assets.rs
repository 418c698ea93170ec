//! Content-addressed asset store
//!
//! Maps a remote image reference to locally persisted bytes, keyed by the
//! SHA-256 of the reference string. Entries are write-once: an existing
//! entry is never re-fetched or overwritten. Concurrent fetches of the
//! same reference are serialized per key, so each reference hits the
//! network at most once.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::fs;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::api::{ApiError, RemoteFetch};

/// Asset store errors
#[derive(Debug, Error)]
pub enum AssetError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("asset io error: {0}")]
    Io(#[from] io::Error),
}

/// Write-once store of fetched image bytes
pub struct AssetCache {
    dir: PathBuf,
    /// One flight lock per digest; entries live for the cache lifetime
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AssetCache {
    /// Open (and create) the asset subdirectory
    pub fn open(dir: PathBuf) -> Result<Self, AssetError> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            flights: Mutex::new(HashMap::new()),
        })
    }

    /// Content digest of a remote reference, used as the entry file name
    pub fn digest(remote_ref: &str) -> String {
        hex::encode(Sha256::digest(remote_ref.as_bytes()))
    }

    /// Path of the entry for a reference, whether or not it exists yet
    pub fn entry_path(&self, remote_ref: &str) -> PathBuf {
        self.dir.join(Self::digest(remote_ref))
    }

    /// Return the bytes for a reference, fetching and persisting them on
    /// first use
    pub fn fetch(
        &self,
        remote_ref: &str,
        fetcher: &dyn RemoteFetch,
    ) -> Result<Vec<u8>, AssetError> {
        let digest = Self::digest(remote_ref);
        let flight = self
            .flights
            .lock()
            .entry(digest.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _in_flight = flight.lock();

        let path = self.dir.join(&digest);
        if path.is_file() {
            return Ok(fs::read(&path)?);
        }

        let bytes = fetcher.fetch_bytes(remote_ref)?;

        // Write to a temp path and rename into place; a duplicate write
        // from another process lands the same content under the same key
        let tmp = self.dir.join(format!("{}.tmp", digest));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;

        log::debug!("Cached asset {} ({} bytes)", remote_ref, bytes.len());
        Ok(bytes)
    }
}
