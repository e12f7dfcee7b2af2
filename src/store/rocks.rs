use std::path::{Path, PathBuf};
use std::sync::Arc;

use ed::{Decode, Encode};

use super::NodeStore;
use crate::error::{IntegrityError, Result};
use crate::tree::{Hash, Node};

/// A `NodeStore` backed by RocksDB. Clones share the same database handle.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<rocksdb::DB>,
    path: PathBuf,
}

impl RocksStore {
    /// Opens a store with the specified file path. If no store exists at that
    /// path, one will be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<RocksStore> {
        RocksStore::open_with(path, default_db_opts())
    }

    /// Like `open`, but with caller-supplied RocksDB options.
    pub fn open_with<P: AsRef<Path>>(path: P, opts: rocksdb::Options) -> Result<RocksStore> {
        let mut path_buf = PathBuf::new();
        path_buf.push(path);
        let db = rocksdb::DB::open(&opts, &path_buf)?;
        log::debug!("opened node store at {:?}", path_buf);

        Ok(RocksStore {
            db: Arc::new(db),
            path: path_buf,
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Closes the store and deletes all data from disk. Fails if other clones
    /// of this handle are still alive.
    pub fn destroy(self) -> Result<()> {
        let opts = default_db_opts();
        let RocksStore { db, path } = self;
        drop(db);
        rocksdb::DB::destroy(&opts, &path)?;
        log::debug!("destroyed node store at {:?}", path);
        Ok(())
    }
}

impl NodeStore for RocksStore {
    fn get(&self, hash: &Hash) -> Result<Option<Node>> {
        match self.db.get_pinned(hash)? {
            Some(bytes) => {
                let node = Node::decode(bytes.as_ref()).map_err(|err| {
                    IntegrityError::Decode(format!("node {}: {}", hex::encode(hash), err))
                })?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    fn put(&self, hash: &Hash, node: &Node) -> Result<()> {
        let bytes = node.encode()?;

        let mut opts = rocksdb::WriteOptions::default();
        opts.set_sync(false);
        self.db.put_opt(hash, bytes, &opts)?;
        Ok(())
    }
}

pub fn default_db_opts() -> rocksdb::Options {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.increase_parallelism(num_cpus::get() as i32);
    opts.set_allow_mmap_writes(true);
    opts.set_allow_mmap_reads(true);
    opts
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::TempStore;

    #[test]
    fn persists_across_reopen() {
        let node = Node::branch([3; 32], None);
        let hash = node.hash();

        let store = TempStore::new().expect("failed to open store");
        store.put(&hash, &node).unwrap();
        assert_eq!(store.get(&hash).unwrap(), Some(node.clone()));

        let path = store.path().to_path_buf();
        let reopened = store.reopen().expect("failed to reopen");
        assert_eq!(reopened.path(), path.as_path());
        assert_eq!(reopened.get(&hash).unwrap(), Some(node));
    }

    #[test]
    fn corrupt_bytes_are_integrity_error() {
        let store = TempStore::new().expect("failed to open store");
        let hash = [9; 32];
        store.db.put(hash, [0x7e, 1, 2]).unwrap();
        let err = store.get(&hash).unwrap_err();
        assert!(err.is_integrity());
    }
}
