//! Dataset Cache Module
//! Memoizes loaded tables by row limit, invalidated when the source changes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::debug;

use super::loader::{CollisionLoader, CollisionTable, LoaderError};

/// Tables kept at once; the least recently used row limit goes first.
pub const MAX_CACHED_TABLES: usize = 4;

struct CacheEntry {
    rows: usize,
    table: Arc<CollisionTable>,
    modified: Option<SystemTime>,
}

/// Row limit -> loaded table, for a single source.
///
/// At most [`MAX_CACHED_TABLES`] tables are held. Entries are ordered from
/// least to most recently used.
///
/// Tables are handed out as read-only `Arc`s so one cache can back several
/// dashboard sessions. Each session derives its own filtered views.
pub struct DatasetCache {
    loader: CollisionLoader,
    entries: Mutex<Vec<CacheEntry>>,
}

impl DatasetCache {
    pub fn new(loader: CollisionLoader) -> Self {
        Self {
            loader,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn loader(&self) -> &CollisionLoader {
        &self.loader
    }

    /// Return the table for `rows`, loading it on a miss or when the source
    /// file's modification time differs from the cached one.
    pub fn get_or_load(&self, rows: usize) -> Result<Arc<CollisionTable>, LoaderError> {
        CollisionLoader::check_row_limit(rows)?;
        let modified = self.loader.source_modified()?;

        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.modified == modified);
        if entries.len() != before {
            debug!(
                "Source {} changed, evicted {} cached tables",
                self.loader.path().display(),
                before - entries.len()
            );
        }

        if let Some(pos) = entries.iter().position(|entry| entry.rows == rows) {
            debug!("Cache hit for {} rows", rows);
            let entry = entries.remove(pos);
            let table = Arc::clone(&entry.table);
            entries.push(entry);
            return Ok(table);
        }

        debug!("Cache miss for {} rows", rows);
        let table = Arc::new(self.loader.load(rows)?);
        if entries.len() >= MAX_CACHED_TABLES {
            let evicted = entries.remove(0);
            debug!("Evicted cached table for {} rows", evicted.rows);
        }
        entries.push(CacheEntry {
            rows,
            table: Arc::clone(&table),
            modified,
        });
        Ok(table)
    }

    /// Drop every cached table.
    pub fn invalidate(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
