// FILE: crates/library/src/cache.rs

//! Counter cache
//!
//! Tag and theme counters are kept either in process memory or in the
//! `cache_entries` table, which survives restarts.

use crate::error::Result;
use dashmap::DashMap;
use folio_config::CacheBackend;
use folio_core::{AppError, BookId, TagId};
use folio_database::queries::cache;
use folio_database::DbPool;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Tag id to usage count
pub type TagCounter = BTreeMap<TagId, i64>;

pub fn tag_counter_key(book: BookId) -> String {
    format!("Book.tag_counter/{}", book)
}

pub fn theme_counter_key(book: BookId) -> String {
    format!("Book.theme_counter/{}", book)
}

#[derive(Clone)]
pub enum CounterCache {
    Memory(Arc<DashMap<String, String>>),
    Database(DbPool),
}

impl CounterCache {
    pub fn new(backend: CacheBackend, pool: &DbPool) -> Self {
        match backend {
            CacheBackend::Memory => Self::Memory(Arc::new(DashMap::new())),
            CacheBackend::Database => Self::Database(pool.clone()),
        }
    }

    pub fn backend(&self) -> CacheBackend {
        match self {
            Self::Memory(_) => CacheBackend::Memory,
            Self::Database(_) => CacheBackend::Database,
        }
    }

    /// Cached counter under `key`; undecodable entries count as a miss
    pub async fn get(&self, key: &str) -> Result<Option<TagCounter>> {
        let raw = match self {
            Self::Memory(map) => map.get(key).map(|v| v.value().clone()),
            Self::Database(pool) => cache::cache_get(pool, key).await?,
        };
        let Some(raw) = raw else {
            debug!("Cache miss: {}", key);
            return Ok(None);
        };

        match decode(&raw) {
            Ok(counter) => Ok(Some(counter)),
            Err(reason) => {
                let err = AppError::CacheCorrupted {
                    key: key.to_string(),
                    reason,
                };
                warn!("{}", err);
                self.delete(key).await?;
                Ok(None)
            }
        }
    }

    pub async fn set(&self, key: &str, counter: &TagCounter) -> Result<()> {
        let raw = encode(counter)?;
        match self {
            Self::Memory(map) => {
                map.insert(key.to_string(), raw);
            }
            Self::Database(pool) => cache::cache_set(pool, key, &raw).await?,
        }
        debug!("Cached {} ({} entries)", key, counter.len());
        Ok(())
    }

    /// Removes `key`, returning whether it was present
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let removed = match self {
            Self::Memory(map) => map.remove(key).is_some(),
            Self::Database(pool) => cache::cache_delete(pool, key).await?,
        };
        if removed {
            debug!("Invalidated {}", key);
        }
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<u64> {
        match self {
            Self::Memory(map) => {
                let count = map.len() as u64;
                map.clear();
                Ok(count)
            }
            Self::Database(pool) => Ok(cache::cache_clear(pool).await?),
        }
    }
}

impl fmt::Debug for CounterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(map) => write!(f, "CounterCache::Memory({} entries)", map.len()),
            Self::Database(_) => write!(f, "CounterCache::Database"),
        }
    }
}

// stored as a list of pairs, JSON object keys would have to be strings
fn encode(counter: &TagCounter) -> Result<String> {
    let pairs: Vec<(i64, i64)> = counter.iter().map(|(tag, n)| (tag.0, *n)).collect();
    Ok(serde_json::to_string(&pairs).map_err(AppError::from)?)
}

fn decode(raw: &str) -> std::result::Result<TagCounter, String> {
    let pairs: Vec<(i64, i64)> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    Ok(pairs.into_iter().map(|(tag, n)| (TagId(tag), n)).collect())
}
