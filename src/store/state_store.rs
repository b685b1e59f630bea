use super::backend::StateBackend;
use crate::error::StoreError;
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Cache-fronted, write-through view of the monitor state table
///
/// The whole table is loaded once by [`StateStore::open`]; afterwards reads are
/// served from memory. Writes are committed to the backend first and only then
/// applied to the cache, so the cache never claims a value the table does not
/// hold. When a commit fails its outcome is unknown, and the key reads as
/// [`StoreError::Unavailable`] until it is written again or the cache is
/// reloaded.
pub struct StateStore {
    backend: Arc<dyn StateBackend>,
    cache: Mutex<CacheState>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

#[derive(Debug, Default)]
struct CacheState {
    values: HashMap<String, String>,
    unknown: HashSet<String>,
}

impl StateStore {
    /// Ensure the backing table exists and load it into the cache
    ///
    /// # Errors
    ///
    /// Any backend failure here is fatal for the caller: monitors cannot run
    /// without their memory.
    pub async fn open(backend: Arc<dyn StateBackend>) -> Result<Self, StoreError> {
        backend.ensure_table().await?;
        let values = backend.load_all().await?;
        info!("State store loaded with {} entries", values.len());

        Ok(Self {
            backend,
            cache: Mutex::new(CacheState {
                values,
                unknown: HashSet::new(),
            }),
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    fn cache(&self) -> MutexGuard<'_, CacheState> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last value written for `key`
    ///
    /// # Errors
    ///
    /// `NotFound` if the key was never written, `Unavailable` if its last
    /// write failed and the stored value is therefore uncertain.
    pub fn get(&self, key: &str) -> Result<String, StoreError> {
        let cache = self.cache();
        if cache.unknown.contains(key) {
            return Err(StoreError::Unavailable(format!(
                "last write of '{}' did not commit",
                key
            )));
        }
        cache
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Durably write `value` for `key`, then update the cache
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self.backend.upsert(key, value).await {
            Ok(()) => {
                let mut cache = self.cache();
                cache.values.insert(key.to_string(), value.to_string());
                cache.unknown.remove(key);
                debug!("State '{}' set to {}", key, value);
                Ok(())
            }
            Err(e) => {
                error!("Failed to persist state '{}': {}", key, e);
                self.cache().unknown.insert(key.to_string());
                Err(e)
            }
        }
    }

    /// Replace the cache with the current table contents
    pub async fn reload(&self) -> Result<(), StoreError> {
        let values = self.backend.load_all().await?;
        let mut cache = self.cache();
        cache.values = values;
        cache.unknown.clear();
        Ok(())
    }

    /// All known keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.cache().values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Acquire the critical section for read-modify-write on `key`
    ///
    /// Holders of the same key are serialized; different keys never block
    /// each other.
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .key_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
