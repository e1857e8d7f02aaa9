// src/pipeline/cache.rs

//! Session-scoped memo of transformed module output.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::bundle::sourcemap::SourceMapFragment;
use crate::types::BuildVariant;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    module_path: String,
    variant: BuildVariant,
}

/// Transformed output of one module for one variant.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub content_hash: blake3::Hash,
    pub code: String,
    /// Specifiers discovered in the transformed output.
    pub specifiers: Vec<String>,
    pub source_map: Option<SourceMapFragment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Content-addressed cache keyed by `(module path, content hash, variant)`.
///
/// One slot is kept per `(path, variant)`. A lookup only hits when the stored
/// hash equals the requested one, and inserting under a new hash supersedes
/// the old entry. Reads take a shared lock so concurrent lookups during a
/// rebuild never block each other.
#[derive(Debug, Default)]
pub struct ModuleGraphCache {
    entries: RwLock<HashMap<CacheKey, Arc<CacheEntry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ModuleGraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        module_path: &str,
        content_hash: &blake3::Hash,
        variant: BuildVariant,
    ) -> Option<Arc<CacheEntry>> {
        let key = CacheKey {
            module_path: module_path.to_string(),
            variant,
        };
        let found = self
            .entries
            .read()
            .ok()
            .and_then(|entries| entries.get(&key).cloned())
            .filter(|entry| entry.content_hash == *content_hash);

        match found {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(module = %module_path, %variant, "cache hit");
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(module = %module_path, %variant, "cache miss");
                None
            }
        }
    }

    pub fn insert(&self, module_path: &str, variant: BuildVariant, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        let key = CacheKey {
            module_path: module_path.to_string(),
            variant,
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, Arc::clone(&entry));
        }
        entry
    }

    /// Drop entries of `variant` whose path is not in `reachable`.
    pub fn retain(&self, variant: BuildVariant, reachable: &HashSet<String>) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|key, _| key.variant != variant || reachable.contains(&key.module_path));
        let pruned = before - entries.len();
        if pruned > 0 {
            debug!(%variant, pruned, "pruned unreachable cache entries");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
