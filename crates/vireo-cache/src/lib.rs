//! # vireo-cache
//!
//! Durable storage for player transform programs.
//!
//! Each program is one raw file keyed by player id under the per-application
//! cache location: `<cache-root>/vireo/yt-sig/<playerId>`. Entries survive
//! process restarts so a player version seen before never triggers a fresh
//! script download and extraction.

use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::{debug, warn};
use vireo_core::{Error, PlayerId, Result, TransformProgram};

/// Subdirectory holding one serialized program per player id.
const SIG_DIR: &str = "yt-sig";

/// Durable key-value store mapping a player id to its transform program.
#[derive(Debug, Clone)]
pub struct ActionCache {
    dir: PathBuf,
}

impl ActionCache {
    /// Create a cache rooted at the per-application cache directory.
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("", "", "vireo")
            .ok_or_else(|| Error::Cache("failed to determine cache directory".to_string()))?;

        Ok(Self::with_path(project_dirs.cache_dir().join(SIG_DIR)))
    }

    /// Create a cache rooted at a custom directory. The directory itself is
    /// created lazily on first write.
    pub fn with_path(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the cache directory path.
    pub const fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Look up the program for a player id. Any read failure, including a
    /// corrupt or empty entry, is reported as a miss.
    pub fn get(&self, player_id: &PlayerId) -> Option<TransformProgram> {
        let path = self.dir.join(player_id.as_str());

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!("no cached actions for player {player_id}: {err}");
                return None;
            }
        };

        if bytes.is_empty() {
            warn!("actions cache file is empty: {}", path.display());
            return None;
        }

        match String::from_utf8(bytes) {
            Ok(serialized) => {
                debug!("loaded cached actions for player {player_id}");
                Some(TransformProgram::new(serialized))
            }
            Err(err) => {
                warn!("actions cache file is corrupt: {}: {err}", path.display());
                None
            }
        }
    }

    /// Store the program for a player id, creating the directory structure
    /// on first write. Callers treat failure as non-fatal.
    pub fn put(&self, player_id: &PlayerId, program: &TransformProgram) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|err| {
            Error::Cache(format!(
                "failed to create cache dir {}: {err}",
                self.dir.display()
            ))
        })?;

        let path = self.dir.join(player_id.as_str());
        std::fs::write(&path, program.as_bytes())
            .map_err(|err| Error::Cache(format!("failed to write {}: {err}", path.display())))?;

        debug!("saved decipher actions for player {player_id}");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_cache() -> (tempfile::TempDir, ActionCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ActionCache::with_path(dir.path().join(SIG_DIR));
        (dir, cache)
    }

    #[test]
    fn test_round_trip() {
        let (_dir, cache) = temp_cache();
        let id = PlayerId::new("23dbe12b");
        let program = TransformProgram::new("r,s3,w12,r");

        cache.put(&id, &program).unwrap();
        assert_eq!(cache.get(&id), Some(program));
    }

    #[test]
    fn test_missing_entry_is_a_miss() {
        let (_dir, cache) = temp_cache();
        assert_eq!(cache.get(&PlayerId::new("deadbeef")), None);
    }

    #[test]
    fn test_empty_entry_is_a_miss() {
        let (_dir, cache) = temp_cache();
        let id = PlayerId::new("deadbeef");

        std::fs::create_dir_all(cache.dir()).unwrap();
        std::fs::write(cache.dir().join(id.as_str()), b"").unwrap();

        assert_eq!(cache.get(&id), None);
    }

    #[test]
    fn test_put_overwrites_previous_program() {
        let (_dir, cache) = temp_cache();
        let id = PlayerId::new("23dbe12b");

        cache.put(&id, &TransformProgram::new("old")).unwrap();
        cache.put(&id, &TransformProgram::new("new")).unwrap();

        assert_eq!(cache.get(&id), Some(TransformProgram::new("new")));
    }
}
