//! Loaded-document cache

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// A loaded document and its transcript once extracted
#[derive(Debug, Clone)]
pub struct CachedPdf {
    pub data: Arc<Vec<u8>>,
    pub transcript: Option<Arc<str>>,
}

impl CachedPdf {
    fn size(&self) -> usize {
        self.data.len() + self.transcript.as_ref().map_or(0, |t| t.len())
    }
}

struct CacheInner {
    lru: LruCache<String, CachedPdf>,
    total_bytes: usize,
}

/// Cache manager for loaded PDFs with entry count and byte budget limits
pub struct CacheManager {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl CacheManager {
    /// Create a new cache manager with the specified entry capacity and byte budget
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    fn evict_for(inner: &mut CacheInner, incoming: usize, max_bytes: usize) {
        while inner.total_bytes + incoming > max_bytes {
            match inner.lru.pop_lru() {
                Some((key, evicted)) => {
                    tracing::debug!(key = %key, bytes = evicted.size(), "evicted cached PDF");
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.size());
                }
                None => break,
            }
        }
    }

    /// Store PDF bytes under `key`, replacing any previous entry.
    /// Entries larger than the whole byte budget are not cached.
    pub fn put(&self, key: String, data: impl Into<Arc<Vec<u8>>>) -> bool {
        let entry = CachedPdf {
            data: data.into(),
            transcript: None,
        };
        let new_size = entry.size();
        if new_size > self.max_bytes {
            return false;
        }

        let mut inner = self.inner.lock();
        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.size());
        }
        Self::evict_for(&mut inner, new_size, self.max_bytes);

        inner.total_bytes += new_size;
        inner.lru.put(key, entry);
        true
    }

    /// Get a cached document, marking it as recently used
    pub fn get(&self, key: &str) -> Option<CachedPdf> {
        self.inner.lock().lru.get(key).cloned()
    }

    /// Attach the transcript to a cached document. The first transcript stored
    /// for an entry is kept; later calls return false.
    pub fn set_transcript(&self, key: &str, transcript: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.lru.peek(key) else {
            return false;
        };
        if entry.transcript.is_some() {
            return false;
        }
        let added = transcript.len();
        if entry.size() + added > self.max_bytes {
            return false;
        }

        // Make room without evicting the entry being updated
        inner.lru.promote(key);
        Self::evict_for(&mut inner, added, self.max_bytes);
        match inner.lru.get_mut(key) {
            Some(entry) => {
                entry.transcript = Some(Arc::from(transcript));
                inner.total_bytes += added;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Total bytes currently stored, transcripts included
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// Generate a new cache key that does not collide with existing keys.
    pub fn generate_unique_key(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&key) {
                return key;
            }
        }
    }
}
