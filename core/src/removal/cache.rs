use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::config::MattingParams;
use crate::error::ProcessingError;
use crate::removal::{BackgroundRemover, CutoutModel};

pub const DEFAULT_CACHE_CAPACITY: usize = 64;

type ContentKey = [u8; 32];

/// Cutout model with fixed matting parameters and an LRU cache keyed by the
/// SHA-256 of the input bytes. Failed calls are not cached.
pub struct MemoizedRemover<M> {
    model: M,
    params: MattingParams,
    cache: Mutex<LruCache<ContentKey, Arc<Vec<u8>>>>,
}

impl<M: CutoutModel> MemoizedRemover<M> {
    pub fn new(model: M) -> Self {
        Self::with_capacity(model, DEFAULT_CACHE_CAPACITY)
    }

    /// A capacity of 0 is treated as 1.
    pub fn with_capacity(model: M, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            model,
            params: MattingParams::default(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn params(&self) -> &MattingParams {
        &self.params
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn lookup(&self, key: &ContentKey) -> Option<Arc<Vec<u8>>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn store(&self, key: ContentKey, output: Arc<Vec<u8>>) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, output);
    }
}

impl<M: CutoutModel> BackgroundRemover for MemoizedRemover<M> {
    fn remove_background(&self, png: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        let key: ContentKey = Sha256::digest(png).into();

        if let Some(hit) = self.lookup(&key) {
            log::debug!("Cutout cache hit ({} bytes)", png.len());
            return Ok(hit.as_ref().clone());
        }

        let output = Arc::new(self.model.cut_out(png, &self.params)?);
        self.store(key, Arc::clone(&output));
        Ok(output.as_ref().clone())
    }
}
