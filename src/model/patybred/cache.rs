//! Storage for per-relation models: in memory, or evicted to disk.
//!
//! With `--mem-cache` each trained relation model is written to a private
//! temporary directory as soon as it is fitted and only read back while the
//! triples of that relation are scored.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ModelError, ModelResult};
use crate::model::Method;

static NEXT_CACHE_ID: AtomicUsize = AtomicUsize::new(0);

/// A temporary directory removed on drop.
#[derive(Debug)]
struct CacheDir {
    path: PathBuf,
}

impl CacheDir {
    fn create(method: Method) -> ModelResult<Self> {
        let id = NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "factrank-{method}-{}-{id}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).map_err(|e| ModelError::TrainingFailure {
            method: method.to_string(),
            message: format!("cannot create cache directory {}: {e}", path.display()),
        })?;
        Ok(Self { path })
    }

    fn slot(&self, index: usize) -> PathBuf {
        self.path.join(format!("rel-{index}.bin"))
    }
}

impl Drop for CacheDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove model cache");
        }
    }
}

/// Indexed slots holding `T`, either resident or on disk.
#[derive(Debug)]
pub enum SlotStore<T> {
    Memory(Vec<Option<T>>),
    Disk {
        dir: CacheDirHandle,
        present: Vec<bool>,
        method: Method,
    },
}

/// Opaque owner of the on-disk cache directory.
#[derive(Debug)]
pub struct CacheDirHandle(CacheDir);

impl CacheDirHandle {
    pub fn path(&self) -> &Path {
        &self.0.path
    }
}

impl<T: Clone + Serialize + DeserializeOwned> SlotStore<T> {
    /// An empty store with `len` slots.
    pub fn new(len: usize, on_disk: bool, method: Method) -> ModelResult<Self> {
        if on_disk {
            Ok(SlotStore::Disk {
                dir: CacheDirHandle(CacheDir::create(method)?),
                present: vec![false; len],
                method,
            })
        } else {
            Ok(SlotStore::Memory(vec![None; len]))
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        match self {
            SlotStore::Memory(v) => v.len(),
            SlotStore::Disk { present, .. } => present.len(),
        }
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill slot `index`.
    pub fn put(&mut self, index: usize, value: T) -> ModelResult<()> {
        match self {
            SlotStore::Memory(v) => {
                if let Some(slot) = v.get_mut(index) {
                    *slot = Some(value);
                }
                Ok(())
            }
            SlotStore::Disk {
                dir,
                present,
                method,
            } => {
                let fail = |message: String| ModelError::TrainingFailure {
                    method: method.to_string(),
                    message,
                };
                let bytes = bincode::serialize(&value)
                    .map_err(|e| fail(format!("cannot encode cached model: {e}")))?;
                let path = dir.0.slot(index);
                std::fs::write(&path, bytes)
                    .map_err(|e| fail(format!("cannot write {}: {e}", path.display())))?;
                if let Some(flag) = present.get_mut(index) {
                    *flag = true;
                }
                Ok(())
            }
        }
    }

    /// Read slot `index`; disk-backed slots are loaded for the caller only.
    pub fn get(&self, index: usize) -> ModelResult<Option<Cow<'_, T>>> {
        match self {
            SlotStore::Memory(v) => Ok(v.get(index).and_then(Option::as_ref).map(Cow::Borrowed)),
            SlotStore::Disk {
                dir,
                present,
                method,
            } => {
                if !present.get(index).copied().unwrap_or(false) {
                    return Ok(None);
                }
                let fail = |message: String| ModelError::ScoringFailure {
                    method: method.to_string(),
                    message,
                };
                let path = dir.0.slot(index);
                let bytes = std::fs::read(&path)
                    .map_err(|e| fail(format!("cannot read {}: {e}", path.display())))?;
                let value = bincode::deserialize(&bytes)
                    .map_err(|e| fail(format!("corrupt cached model {}: {e}", path.display())))?;
                Ok(Some(Cow::Owned(value)))
            }
        }
    }

    /// Every slot materialized in memory.
    pub fn to_vec(&self) -> ModelResult<Vec<Option<T>>> {
        (0..self.len())
            .map(|i| Ok(self.get(i)?.map(Cow::into_owned)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_and_disk_behave_alike() {
        for on_disk in [false, true] {
            let mut store: SlotStore<Vec<u32>> = SlotStore::new(3, on_disk, Method::Patybred).unwrap();
            store.put(1, vec![7, 8]).unwrap();
            assert!(store.get(0).unwrap().is_none());
            assert_eq!(store.get(1).unwrap().unwrap().as_ref(), &vec![7, 8]);
            assert_eq!(store.to_vec().unwrap(), vec![None, Some(vec![7, 8]), None]);
        }
    }

    #[test]
    fn disk_cache_is_removed_on_drop() {
        let store: SlotStore<u8> = SlotStore::new(1, true, Method::Pabred).unwrap();
        let path = match &store {
            SlotStore::Disk { dir, .. } => dir.path().to_path_buf(),
            SlotStore::Memory(_) => unreachable!(),
        };
        assert!(path.exists());
        drop(store);
        assert!(!path.exists());
    }
}
