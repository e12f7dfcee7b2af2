use std::env::temp_dir;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::store::RocksStore;
use crate::Result;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A `RocksStore` in a fresh temporary directory, deleted on drop.
pub struct TempStore {
    inner: Option<RocksStore>,
}

impl TempStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<TempStore> {
        let inner = Some(RocksStore::open(path)?);
        Ok(TempStore { inner })
    }

    pub fn new() -> Result<TempStore> {
        let time = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let mut path = temp_dir();
        path.push(format!("merkle-list-temp-{}-{}", time, n));
        TempStore::open(path)
    }

    /// Closes the database and opens it again from the same directory.
    pub fn reopen(mut self) -> Result<TempStore> {
        let inner = self.inner.take().unwrap();
        let path = inner.path().to_path_buf();
        drop(inner);
        TempStore::open(path)
    }
}

impl Drop for TempStore {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.destroy().expect("failed to delete db");
        }
    }
}

impl Deref for TempStore {
    type Target = RocksStore;

    fn deref(&self) -> &RocksStore {
        self.inner.as_ref().unwrap()
    }
}
