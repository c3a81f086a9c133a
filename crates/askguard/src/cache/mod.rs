//! Memoization of generator calls keyed by (schema fingerprint, question).

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::schema::SchemaFingerprint;

pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// How much of the cache an adopted correction evicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidationMode {
    #[default]
    All,
    Key,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    fingerprint: SchemaFingerprint,
    question: String,
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
    epoch: u64,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &CacheKey) -> Option<String> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.last_used);
        entry.last_used = tick;
        self.recency.insert(tick, key.clone());
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: CacheKey, value: String, capacity: usize) {
        let tick = self.next_tick();
        if let Some(previous) = self.entries.remove(&key) {
            self.recency.remove(&previous.last_used);
        }
        while self.entries.len() >= capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.recency.insert(tick, key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                value,
                last_used: tick,
            },
        );
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.recency.remove(&entry.last_used);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded LRU cache shared by concurrent pipeline runs.
///
/// The lock is never held while the generator runs. Each `invalidate_all`
/// bumps an epoch; a value generated under an older epoch is returned to its
/// caller but not stored, so no read after invalidation sees it.
#[derive(Debug)]
pub struct GenerationCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Default for GenerationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl GenerationCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // entries are only mutated whole, so a poisoned lock is still consistent
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn get_or_generate<E>(
        &self,
        fingerprint: &SchemaFingerprint,
        question: &str,
        generate: impl FnOnce() -> Result<String, E>,
    ) -> Result<String, E> {
        let key = CacheKey {
            fingerprint: fingerprint.clone(),
            question: question.to_string(),
        };

        let epoch = {
            let mut state = self.lock();
            if let Some(value) = state.touch(&key) {
                state.hits += 1;
                tracing::debug!(fingerprint = %fingerprint, "generation cache hit");
                return Ok(value);
            }
            state.misses += 1;
            state.epoch
        };

        // the lock is not held while generating, so concurrent misses on
        // one key each call `generate`; the last one stored wins
        let value = generate()?;

        let mut state = self.lock();
        if state.epoch == epoch {
            state.insert(key, value.clone(), self.capacity);
        } else {
            tracing::debug!("cache invalidated during generation; result not stored");
        }
        Ok(value)
    }

    pub fn invalidate_all(&self) {
        let mut state = self.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        state.recency.clear();
        state.epoch += 1;
        tracing::info!(dropped, "generation cache cleared");
    }

    /// Drop one entry; returns whether it was present.
    pub fn invalidate(&self, fingerprint: &SchemaFingerprint, question: &str) -> bool {
        let key = CacheKey {
            fingerprint: fingerprint.clone(),
            question: question.to_string(),
        };
        self.lock().remove(&key)
    }

    pub fn invalidate_with(
        &self,
        mode: InvalidationMode,
        fingerprint: &SchemaFingerprint,
        question: &str,
    ) {
        match mode {
            InvalidationMode::All => self.invalidate_all(),
            InvalidationMode::Key => {
                self.invalidate(fingerprint, question);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::GenerationCache;
    use crate::schema::SchemaFingerprint;

    fn fingerprint(label: &str) -> SchemaFingerprint {
        SchemaFingerprint::of(label)
    }

    #[test]
    fn evicts_least_recently_used_entry() {
        let cache = GenerationCache::new(2);
        let schema = fingerprint("schema");
        let calls = Cell::new(0);
        let generate = |text: &str| {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(text.to_string())
        };

        cache.get_or_generate(&schema, "a", || generate("A")).expect("a");
        cache.get_or_generate(&schema, "b", || generate("B")).expect("b");
        // touch `a` so `b` becomes the eviction candidate
        cache.get_or_generate(&schema, "a", || generate("A2")).expect("a hit");
        cache.get_or_generate(&schema, "c", || generate("C")).expect("c");

        assert_eq!(cache.len(), 2);
        assert_eq!(calls.get(), 3);
        let a = cache.get_or_generate(&schema, "a", || generate("A3")).expect("a again");
        assert_eq!(a, "A");
        let b = cache.get_or_generate(&schema, "b", || generate("B2")).expect("b again");
        assert_eq!(b, "B2");
    }

    #[test]
    fn counts_hits_and_misses() {
        let cache = GenerationCache::default();
        let schema = fingerprint("schema");
        cache
            .get_or_generate(&schema, "q", || Ok::<_, ()>("SELECT 1".to_string()))
            .expect("miss");
        cache
            .get_or_generate(&schema, "q", || Ok::<_, ()>("SELECT 2".to_string()))
            .expect("hit");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn invalidation_during_generation_skips_store() {
        let cache = GenerationCache::default();
        let schema = fingerprint("schema");
        let value = cache
            .get_or_generate(&schema, "q", || {
                cache.invalidate_all();
                Ok::<_, ()>("SELECT stale".to_string())
            })
            .expect("generation should succeed");

        assert_eq!(value, "SELECT stale");
        assert!(cache.is_empty());
    }
}
