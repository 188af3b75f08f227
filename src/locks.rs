// CLASSIFICATION: COMMUNITY
// Filename: locks.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Per-key mutual exclusion.
//!
//! Entries are created on first use and removed once no caller holds or
//! waits on them, so the table only ever contains keys with work in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ProvisionError;

/// Table of mutexes keyed by string.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> Result<T, ProvisionError> {
        let entry = {
            let mut table = self.table.lock().map_err(|_| ProvisionError::LockPoisoned)?;
            Arc::clone(table.entry(key.to_owned()).or_default())
        };

        let result = {
            // The guarded value is `()`; a panic in another holder leaves nothing to repair.
            let _held = entry.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut table = self.table.lock().map_err(|_| ProvisionError::LockPoisoned)?;
        // Only the table and this caller still reference the entry.
        if Arc::strong_count(&entry) == 2 {
            table.remove(key);
        }
        Ok(result)
    }

    /// Number of keys currently in use.
    pub fn active(&self) -> usize {
        self.table
            .lock()
            .map(|table| table.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    locks
                        .with_lock("foo", || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(10));
                            inside.fetch_sub(1, Ordering::SeqCst);
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let nested = locks
            .with_lock("a", || locks.with_lock("b", || 7).unwrap())
            .unwrap();
        assert_eq!(nested, 7);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn entry_survives_while_held() {
        let locks = KeyedLocks::new();
        locks
            .with_lock("a", || assert_eq!(locks.active(), 1))
            .unwrap();
        assert_eq!(locks.active(), 0);
    }
}
