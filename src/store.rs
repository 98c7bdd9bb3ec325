//! Filesystem cache of issued bundles, keyed by algorithm and serial number.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use tracing::debug;

use crate::algorithm::KeyAlgorithm;
use crate::error::Result;

/// What the cache holds for one serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Both `{serial_no}.pfx` and `{serial_no}.cer` exist.
    Complete,
    /// The certificate was fetched earlier but never bundled.
    CertificateOnly,
    Miss,
}

/// Certificate cache rooted at `cert_dir`, one subdirectory per algorithm.
///
/// Also hands out per-serial locks so one process never runs two issuances
/// for the same serial number at once.
#[derive(Debug, Default)]
pub struct CertificateStore {
    root: PathBuf,
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

type LockKey = (KeyAlgorithm, String);

/// Holds the serial number's lock until dropped.
///
/// Dropping the last guard for a serial number removes its map entry.
pub struct SerialGuard<'a> {
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
    locks: &'a DashMap<LockKey, Arc<Mutex<()>>>,
    key: LockKey,
}

impl Drop for SerialGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold a clone of the Arc, so a count of one means nobody is queued.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl CertificateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn dir_for(&self, algorithm: KeyAlgorithm) -> PathBuf {
        self.root.join(algorithm.dir_name())
    }

    pub fn pfx_path(&self, algorithm: KeyAlgorithm, serial_no: &str) -> PathBuf {
        self.dir_for(algorithm).join(format!("{serial_no}.pfx"))
    }

    pub fn cer_path(&self, algorithm: KeyAlgorithm, serial_no: &str) -> PathBuf {
        self.dir_for(algorithm).join(format!("{serial_no}.cer"))
    }

    pub fn status(&self, algorithm: KeyAlgorithm, serial_no: &str) -> CacheStatus {
        let has_cer = self.cer_path(algorithm, serial_no).is_file();
        let has_pfx = self.pfx_path(algorithm, serial_no).is_file();
        let status = match (has_pfx, has_cer) {
            (true, true) => CacheStatus::Complete,
            (_, true) => CacheStatus::CertificateOnly,
            _ => CacheStatus::Miss,
        };
        debug!(algorithm = %algorithm, serial_no, ?status, "certificate cache lookup");
        status
    }

    /// Reads a previously stored public certificate.
    pub fn read_cached_cert(&self, algorithm: KeyAlgorithm, serial_no: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.cer_path(algorithm, serial_no))?)
    }

    /// Blocks until no other caller holds the lock for this serial number.
    pub fn lock(&self, algorithm: KeyAlgorithm, serial_no: &str) -> SerialGuard<'_> {
        let key = (algorithm, serial_no.to_string());
        let lock = self.locks.entry(key.clone()).or_default().clone();
        SerialGuard {
            guard: Some(lock.lock_arc()),
            locks: &self.locks,
            key,
        }
    }

    /// Number of serial numbers with a live lock entry.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path());
        let algorithm = KeyAlgorithm::RsaClass;
        assert_eq!(store.status(algorithm, "1"), CacheStatus::Miss);

        std::fs::create_dir_all(store.dir_for(algorithm)).unwrap();
        std::fs::write(store.cer_path(algorithm, "1"), "cert").unwrap();
        assert_eq!(store.status(algorithm, "1"), CacheStatus::CertificateOnly);
        assert_eq!(store.read_cached_cert(algorithm, "1").unwrap(), "cert");

        std::fs::write(store.pfx_path(algorithm, "1"), b"pfx").unwrap();
        assert_eq!(store.status(algorithm, "1"), CacheStatus::Complete);
        // Same serial under the other family is a separate entry.
        assert_eq!(store.status(KeyAlgorithm::EcNationalClass, "1"), CacheStatus::Miss);
    }

    #[test]
    fn pfx_alone_is_not_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path());
        std::fs::create_dir_all(store.dir_for(KeyAlgorithm::RsaClass)).unwrap();
        std::fs::write(store.pfx_path(KeyAlgorithm::RsaClass, "9"), b"pfx").unwrap();
        assert_eq!(store.status(KeyAlgorithm::RsaClass, "9"), CacheStatus::Miss);
    }

    #[test]
    fn serial_lock_serializes_callers() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let store = Arc::new(CertificateStore::new("unused"));
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let inside = inside.clone();
                std::thread::spawn(move || {
                    let _guard = store.lock(KeyAlgorithm::RsaClass, "42");
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Different serial numbers do not contend.
        let _a = store.lock(KeyAlgorithm::RsaClass, "1");
        let _b = store.lock(KeyAlgorithm::RsaClass, "2");
    }

    #[test]
    fn released_locks_leave_no_entries() {
        let store = CertificateStore::new("unused");
        for serial_no in ["1", "2", "3"] {
            let _guard = store.lock(KeyAlgorithm::RsaClass, serial_no);
            assert_eq!(store.lock_count(), 1);
        }
        assert_eq!(store.lock_count(), 0);

        let first = store.lock(KeyAlgorithm::RsaClass, "4");
        let second = store.lock(KeyAlgorithm::EcNationalClass, "4");
        assert_eq!(store.lock_count(), 2);
        drop(first);
        assert_eq!(store.lock_count(), 1);
        drop(second);
        assert_eq!(store.lock_count(), 0);
    }

    #[test]
    fn entry_survives_while_a_waiter_is_queued() {
        let store = Arc::new(CertificateStore::new("unused"));
        let held = store.lock(KeyAlgorithm::RsaClass, "7");

        let waiter = {
            let store = store.clone();
            std::thread::spawn(move || {
                let _guard = store.lock(KeyAlgorithm::RsaClass, "7");
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        drop(held);
        waiter.join().unwrap();
        assert_eq!(store.lock_count(), 0);
    }
}
