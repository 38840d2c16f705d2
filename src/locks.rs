//! Per-photograph critical sections.
//!
//! Analyze and publish hold the photograph's mutex for their whole run, so
//! concurrent requests on the same photograph serialize while requests on
//! different photographs proceed independently. Cross-process exclusion is
//! the database's job (write transactions plus the UNIQUE camera name
//! constraint); this registry covers the in-process case.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct PhotoLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl PhotoLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Get the mutex for a photograph id, creating it on first use.
    ///
    /// The returned handle stays valid for the life of the registry; callers
    /// lock it for the duration of their operation.
    pub fn for_photo(&self, photo_id: i64) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(photo_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for PhotoLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_same_photo_serializes() {
        let locks = Arc::new(PhotoLocks::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(thread::spawn(move || {
                let lock = locks.for_photo(42);
                let _guard = lock.lock().unwrap();
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                thread::yield_now();
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_id_returns_same_mutex() {
        let locks = PhotoLocks::new();
        let a = locks.for_photo(7);
        let b = locks.for_photo(7);
        assert!(Arc::ptr_eq(&a, &b));

        let c = locks.for_photo(8);
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
