use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Per-key async mutexes, serializing work on one offer session or order.
#[derive(Clone, Default)]
pub struct KeyedLock {
    lock_map: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLock {
    pub fn new() -> KeyedLock {
        KeyedLock::default()
    }

    pub async fn get_lock(&self, key: &str) -> Arc<Mutex<()>> {
        // Read guard must be dropped before taking the write lock below.
        let existing = { self.lock_map.read().await.get(key).cloned() };
        match existing {
            Some(mutex) => mutex,
            None => self
                .lock_map
                .write()
                .await
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone(),
        }
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.get_lock(key).await.lock_owned().await
    }

    /// Locks every key in sorted order, so two overlapping callers can't deadlock.
    pub async fn lock_all(&self, keys: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(&key).await);
        }
        guards
    }

    pub async fn clear_locks(&self, key: &str) {
        self.lock_map.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[actix_rt::test]
    async fn test_same_key_is_serialized() {
        let locks = KeyedLock::new();
        let guard = locks.lock("session").await;

        let contender = locks.clone();
        let blocked = tokio::time::timeout(Duration::from_millis(50), contender.lock("session"));
        assert!(blocked.await.is_err());

        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock("other"));
        assert!(other.await.is_ok());

        drop(guard);
        let released = tokio::time::timeout(Duration::from_millis(50), locks.lock("session"));
        assert!(released.await.is_ok());
    }

    #[actix_rt::test]
    async fn test_lock_all_ignores_duplicates() {
        let locks = KeyedLock::new();
        let guards = locks
            .lock_all(&["b".to_string(), "a".to_string(), "b".to_string()])
            .await;
        assert_eq!(guards.len(), 2);
    }
}
