//! Versioned manifest snapshot cache
//!
//! The remote service publishes immutable definition tables as a versioned,
//! zipped relational snapshot. This cache keeps one snapshot on disk,
//! rebuilds it wholesale when the remote version changes, and serves point
//! lookups and full-table scans against it. The version pointer is only
//! committed after extraction succeeds, so a crash mid-rebuild leaves the
//! previous pointer active.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::api::{ApiError, RemoteFetch};
use crate::model::hash_to_id;

/// Version pointer file inside the cache root
const VERSION_FILE: &str = "version.json";

/// Manifest cache errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no record {hash} in table {table}")]
    NotFound { table: String, hash: u32 },
    #[error("corrupt record {id} in table {table}")]
    Corrupt { table: String, id: i32 },
    #[error("manifest snapshot not ready; run ensure_current first")]
    NotReady,
    #[error("invalid table name `{0}`")]
    BadTable(String),
    #[error("snapshot query failed: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("manifest rebuild failed: {0}")]
    Rebuild(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("manifest io error: {0}")]
    Io(#[from] io::Error),
}

/// Identifies which immutable snapshot is valid locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestVersion {
    pub version: String,
    /// File name of the extracted content table, as named in the archive
    pub content_table_id: String,
}

/// One immutable definition record
#[derive(Debug, Clone)]
pub struct DefinitionRecord {
    pub id: i32,
    pub json: Value,
}

struct ManifestState {
    version: Option<ManifestVersion>,
    conn: Option<Connection>,
}

/// Local snapshot of the remote definition tables
pub struct ManifestCache {
    root: PathBuf,
    state: Mutex<ManifestState>,
}

impl ManifestCache {
    /// Open the cache root, picking up a previously committed snapshot
    /// when its pointer and content file are both present
    pub fn open(root: PathBuf) -> Result<Self, ManifestError> {
        fs::create_dir_all(&root)?;

        let mut version = read_version(&root);
        let mut conn = None;
        if let Some(v) = &version {
            let content_path = root.join(&v.content_table_id);
            match open_snapshot(&content_path) {
                Ok(c) => conn = Some(c),
                Err(e) => {
                    log::warn!("Cached snapshot unusable ({}); will rebuild", e);
                    version = None;
                }
            }
        }

        Ok(Self {
            root,
            state: Mutex::new(ManifestState { version, conn }),
        })
    }

    /// Currently committed snapshot version, if any
    pub fn version(&self) -> Option<ManifestVersion> {
        self.state.lock().version.clone()
    }

    /// Make the local snapshot match the remote version, rebuilding it
    /// wholesale on mismatch. No-op when already current.
    pub fn ensure_current(
        &self,
        remote_version: &str,
        content_route: &str,
        fetcher: &dyn RemoteFetch,
    ) -> Result<(), ManifestError> {
        let mut state = self.state.lock();
        let current = state.version.as_ref().map(|v| v.version.as_str());
        if current == Some(remote_version) && state.conn.is_some() {
            return Ok(());
        }

        log::info!("Cached manifest data is out-of-date or missing");
        log::info!("Reconstructing manifest cache...");

        // Fetch the archive to a temp path next to the snapshot
        let archive_path = self.root.join(format!("content.{}.zip", remote_version));
        let bytes = fetcher.fetch_bytes(content_route)?;
        fs::write(&archive_path, &bytes)?;

        let extraction = extract_first_entry(&archive_path, &self.root);
        // The archive is only a transfer vehicle; drop it either way
        let _ = fs::remove_file(&archive_path);
        let content_table_id = extraction?;

        let content_path = self.root.join(&content_table_id);
        let conn = open_snapshot(&content_path)?;

        // Extraction succeeded; now the pointer may move
        let new_version = ManifestVersion {
            version: remote_version.to_string(),
            content_table_id,
        };
        commit_version(&self.root, &new_version)?;

        state.conn = Some(conn);
        state.version = Some(new_version);
        log::info!("Manifest cache rebuilt at version {}", remote_version);
        Ok(())
    }

    /// Look up one record by its unsigned definition hash
    pub fn get(&self, table: &str, hash: u32) -> Result<Value, ManifestError> {
        validate_table(table)?;
        let id = hash_to_id(hash);

        let state = self.state.lock();
        let conn = state.conn.as_ref().ok_or(ManifestError::NotReady)?;

        let sql = format!("SELECT json FROM {} WHERE id = ?1", table);
        let raw: rusqlite::types::Value = match conn.query_row(&sql, [id], |row| row.get(0)) {
            Ok(raw) => raw,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(ManifestError::NotFound {
                    table: table.to_string(),
                    hash,
                })
            }
            Err(e) => return Err(e.into()),
        };

        parse_record(table, id, raw)
    }

    /// Scan every record of a table in storage order. Each call re-scans
    /// from the start.
    pub fn scan_all(&self, table: &str) -> Result<Vec<DefinitionRecord>, ManifestError> {
        validate_table(table)?;

        let state = self.state.lock();
        let conn = state.conn.as_ref().ok_or(ManifestError::NotReady)?;

        let sql = format!("SELECT id, json FROM {}", table);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i32>(0)?, row.get::<_, rusqlite::types::Value>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, raw) = row?;
            let json = parse_record(table, id, raw)?;
            records.push(DefinitionRecord { id, json });
        }
        Ok(records)
    }
}

/// Table names come from call sites, but they still end up interpolated
/// into SQL; restrict them to identifier characters.
fn validate_table(table: &str) -> Result<(), ManifestError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ManifestError::BadTable(table.to_string()))
    }
}

fn parse_record(table: &str, id: i32, raw: rusqlite::types::Value) -> Result<Value, ManifestError> {
    use rusqlite::types::Value as SqlValue;

    let bytes = match raw {
        SqlValue::Text(text) => text.into_bytes(),
        SqlValue::Blob(blob) => blob,
        _ => {
            return Err(ManifestError::Corrupt {
                table: table.to_string(),
                id,
            })
        }
    };
    serde_json::from_slice(&bytes).map_err(|_| ManifestError::Corrupt {
        table: table.to_string(),
        id,
    })
}

fn read_version(root: &Path) -> Option<ManifestVersion> {
    let content = fs::read_to_string(root.join(VERSION_FILE)).ok()?;
    match serde_json::from_str(&content) {
        Ok(version) => Some(version),
        Err(e) => {
            log::warn!("Corrupt manifest version pointer: {}", e);
            None
        }
    }
}

/// Write the pointer to a temp file and rename it into place, so the
/// active pointer is never half-written
fn commit_version(root: &Path, version: &ManifestVersion) -> Result<(), ManifestError> {
    let json = serde_json::to_string_pretty(version)
        .map_err(|e| ManifestError::Rebuild(e.to_string()))?;
    let tmp = root.join(format!("{}.tmp", VERSION_FILE));
    fs::write(&tmp, json)?;
    fs::rename(&tmp, root.join(VERSION_FILE))?;
    Ok(())
}

/// Extract exactly the first archive entry into `root`, returning its
/// name. Entries past the first are not supported and are ignored.
fn extract_first_entry(archive_path: &Path, root: &Path) -> Result<String, ManifestError> {
    let file = File::open(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ManifestError::Rebuild(e.to_string()))?;
    if archive.is_empty() {
        return Err(ManifestError::Rebuild("archive has no entries".to_string()));
    }

    let mut entry = archive
        .by_index(0)
        .map_err(|e| ManifestError::Rebuild(e.to_string()))?;

    // Keep only the file name; archive entries must not escape the root
    let name = Path::new(entry.name())
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ManifestError::Rebuild("unusable entry name".to_string()))?;

    let mut out = File::create(root.join(&name))?;
    io::copy(&mut entry, &mut out)?;
    Ok(name)
}

fn open_snapshot(path: &Path) -> Result<Connection, ManifestError> {
    if !path.is_file() {
        return Err(ManifestError::Rebuild(format!(
            "snapshot file missing: {}",
            path.display()
        )));
    }
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY,
    )?)
}
