use crate::error::StoreError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Boxed future returned by [`StateBackend`] operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable key-value table behind a [`StateStore`](super::StateStore)
///
/// Implementations must offer read-after-write consistency per key and must
/// only return `Ok` from `upsert` once the write is durably committed.
pub trait StateBackend: Send + Sync {
    /// Create the backing table if it does not exist yet
    fn ensure_table<'a>(&'a self) -> StoreFuture<'a, ()>;

    /// Read every stored entry
    fn load_all<'a>(&'a self) -> StoreFuture<'a, HashMap<String, String>>;

    /// Insert or overwrite one entry and commit it
    fn upsert<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;
}

/// In-process backend for tests and dry runs
///
/// Clones share the same rows, so a test can keep a handle to inspect what a
/// store has written. Write failures can be injected with
/// [`set_fail_writes`](Self::set_fail_writes).
#[derive(Debug, Clone, Default)]
pub struct MemoryStateBackend {
    rows: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with existing rows
    pub fn with_rows<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let backend = Self::new();
        {
            let mut guard = backend.rows.lock().unwrap_or_else(PoisonError::into_inner);
            for (k, v) in rows {
                guard.insert(k.into(), v.into());
            }
        }
        backend
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the committed rows
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateBackend for MemoryStateBackend {
    fn ensure_table<'a>(&'a self) -> StoreFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn load_all<'a>(&'a self) -> StoreFuture<'a, HashMap<String, String>> {
        Box::pin(async move { Ok(self.snapshot()) })
    }

    fn upsert<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable(format!(
                    "injected write failure for '{}'",
                    key
                )));
            }
            self.rows
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.to_string(), value.to_string());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_upsert_and_load() {
        let backend = MemoryStateBackend::with_rows([("a", "1")]);
        backend.upsert("b", "2").await.unwrap();
        backend.upsert("a", "3").await.unwrap();

        let rows = backend.load_all().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows["a"], "3");
        assert_eq!(rows["b"], "2");
    }

    #[tokio::test]
    async fn test_memory_backend_injected_failure() {
        let backend = MemoryStateBackend::new();
        let handle = backend.clone();
        handle.set_fail_writes(true);

        assert!(backend.upsert("k", "v").await.is_err());
        assert!(backend.snapshot().is_empty());

        handle.set_fail_writes(false);
        assert!(backend.upsert("k", "v").await.is_ok());
        assert_eq!(handle.snapshot()["k"], "v");
    }
}
