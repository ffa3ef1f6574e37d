use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    error::CacheError,
    model::{ForecastResponse, Horizon},
};

/// The last successful response for a horizon, stamped with its fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub data: ForecastResponse,
}

impl CacheEntry {
    pub fn new(fetched_at: DateTime<Utc>, data: ForecastResponse) -> Self {
        Self {
            timestamp: fetched_at.timestamp_millis(),
            data,
        }
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.fetched_at().map(|t| now - t)
    }

    /// Fresh means within `max_age` of `now` in either direction. A small
    /// future skew is tolerated, a stamp further ahead than `max_age` is not.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now).is_some_and(|age| -max_age < age && age < max_age)
    }
}

/// Single-slot-per-horizon store. Writes are last-writer-wins.
pub trait ForecastCache: Send + Sync + std::fmt::Debug {
    fn load(&self, horizon: Horizon) -> Result<Option<CacheEntry>, CacheError>;

    fn store(&self, horizon: Horizon, entry: &CacheEntry) -> Result<(), CacheError>;

    fn clear(&self, horizon: Horizon) -> Result<(), CacheError>;
}

/// One JSON file per horizon inside a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, horizon: Horizon) -> PathBuf {
        self.dir.join(format!("{}.json", horizon.as_str()))
    }
}

impl ForecastCache for FileCache {
    fn load(&self, horizon: Horizon) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(horizon);
        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = serde_json::from_str(&contents)?;
        if entry.data.is_empty() || !entry.data.is_well_formed() {
            return Err(CacheError::Invalid(format!(
                "{} does not hold an ordered, finite forecast",
                path.display()
            )));
        }

        Ok(Some(entry))
    }

    fn store(&self, horizon: Horizon, entry: &CacheEntry) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;

        // write-then-rename so a crash never leaves half a file behind
        let path = self.path_for(horizon);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(entry)?)?;
        fs::rename(&tmp, &path)?;

        Ok(())
    }

    fn clear(&self, horizon: Horizon) -> Result<(), CacheError> {
        match fs::remove_file(self.path_for(horizon)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Process-local cache, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<Horizon, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(horizon: Horizon, entry: CacheEntry) -> Self {
        let cache = Self::default();
        cache.lock().insert(horizon, entry);
        cache
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Horizon, CacheEntry>> {
        // a panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ForecastCache for MemoryCache {
    fn load(&self, horizon: Horizon) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.lock().get(&horizon).cloned())
    }

    fn store(&self, horizon: Horizon, entry: &CacheEntry) -> Result<(), CacheError> {
        self.lock().insert(horizon, entry.clone());
        Ok(())
    }

    fn clear(&self, horizon: Horizon) -> Result<(), CacheError> {
        self.lock().remove(&horizon);
        Ok(())
    }
}
