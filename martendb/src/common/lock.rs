use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::Arc;

/// A handle to a read-write lock that can be stored and reused.
pub struct LockHandle {
    lock: Arc<RwLock<()>>,
}

impl LockHandle {
    /// Acquires a read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    /// Acquires a write lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }
}

/// Registry for managing named read-write locks.
///
/// Namespace lifecycle operations (collection create/drop, index create/drop)
/// must serialize per name so that racing callers observe exactly one logical
/// creation. The registry hands out one shared lock per name; holders of the
/// same name contend, different names proceed fully in parallel.
///
/// Uses `parking_lot`'s poison-free locks.
///
/// # Examples
///
/// ```
/// use martendb::common::LockRegistry;
/// let registry = LockRegistry::new();
/// let lock = registry.get_lock("db.users");
/// {
///     let _guard = lock.write();
///     // exclusive section for the "db.users" namespace
/// }
/// ```
#[derive(Clone, Default)]
pub struct LockRegistry {
    locks: Arc<RwLock<HashMap<String, Arc<RwLock<()>>>>>,
}

impl LockRegistry {
    /// Creates a new empty lock registry.
    pub fn new() -> Self {
        LockRegistry {
            locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Gets the lock for the given name, creating it on first use.
    ///
    /// All callers passing the same name receive handles to the same
    /// underlying lock.
    pub fn get_lock(&self, name: &str) -> LockHandle {
        let lock = {
            let mut locks = self.locks.write();
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(())))
                .clone()
        };
        LockHandle { lock }
    }

    /// Removes a lock from the registry if it is no longer needed.
    ///
    /// Outstanding handles keep their lock alive; only the registry entry is
    /// dropped.
    pub fn remove_lock(&self, name: &str) {
        self.locks.write().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_name_shares_lock() {
        let registry = LockRegistry::new();
        let a = registry.get_lock("resource");
        let b = registry.get_lock("resource");
        let _write = a.write();
        assert!(b.lock.try_write().is_none());
    }

    #[test]
    fn test_different_names_do_not_contend() {
        let registry = LockRegistry::new();
        let a = registry.get_lock("one");
        let b = registry.get_lock("two");
        let _write = a.write();
        assert!(b.lock.try_write().is_some());
    }

    #[test]
    fn test_concurrent_access_from_threads() {
        let registry = LockRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                let lock = registry.get_lock("shared");
                let _guard = lock.write();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_remove_lock_keeps_outstanding_handles_valid() {
        let registry = LockRegistry::new();
        let handle = registry.get_lock("gone");
        registry.remove_lock("gone");
        let _guard = handle.write();
    }
}
