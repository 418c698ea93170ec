//! Local caches
//!
//! Two tiers: a versioned snapshot of the remote service's immutable
//! definition tables, and a content-addressed store of fetched image
//! assets. Both live under one cache root that is safe to delete
//! externally; everything is rebuilt or refetched lazily.

pub mod assets;
pub mod manifest;

use std::path::PathBuf;

pub use assets::{AssetCache, AssetError};
pub use manifest::{DefinitionRecord, ManifestCache, ManifestError, ManifestVersion};

/// Default cache root under the project data directory
pub fn default_cache_root() -> PathBuf {
    use directories::ProjectDirs;

    if let Some(proj_dirs) = ProjectDirs::from("net", "gridhost", "Griddeck") {
        proj_dirs.data_local_dir().join("cache")
    } else {
        PathBuf::from("./cache")
    }
}
