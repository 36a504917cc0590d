//! Timer store persisted as one JSON document per timer

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use super::{sort_by_creation, TimerFilter, TimerStore};
use crate::{
    error::StoreError,
    state::{Timer, TimerId},
};

/// Durable store that keeps `<id>.json` files in a data directory.
///
/// Records are written to a temporary file, flushed to disk and renamed over
/// the previous version, so a reader never observes a half-written record.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        debug!("Opened timer store at {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: TimerId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn read_record(path: &Path) -> Result<Option<Timer>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Flush directory entries so a rename or unlink survives power loss
    #[cfg(unix)]
    fn sync_dir(&self) -> Result<(), StoreError> {
        fs::File::open(&self.dir)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| StoreError::io(&self.dir, e))
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn lock_writes(&self) -> Result<std::sync::MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Failed to lock store writer: {}", e)))
    }
}

impl TimerStore for JsonFileStore {
    fn save(&self, timer: &Timer) -> Result<(), StoreError> {
        let path = self.record_path(timer.id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(timer).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        let _guard = self.lock_writes()?;
        let mut file = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(&body).map_err(|e| StoreError::io(&tmp, e))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        self.sync_dir()?;
        Ok(())
    }

    fn get(&self, id: TimerId) -> Result<Option<Timer>, StoreError> {
        Self::read_record(&self.record_path(id))
    }

    fn list(&self, filter: &TimerFilter) -> Result<Vec<Timer>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let mut timers = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match Self::read_record(&path) {
                Ok(Some(timer)) if filter.matches(&timer) => timers.push(timer),
                Ok(_) => {}
                // One bad record must not hide the rest
                Err(e @ StoreError::Corrupt { .. }) => warn!("Skipping timer record: {}", e),
                Err(e) => return Err(e),
            }
        }

        sort_by_creation(&mut timers);
        Ok(timers)
    }

    fn delete(&self, id: TimerId) -> Result<bool, StoreError> {
        let path = self.record_path(id);
        let _guard = self.lock_writes()?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.sync_dir()?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}
