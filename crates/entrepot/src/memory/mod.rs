//! # In-Memory Backend
//!
//! Reference [`Session`](crate::Session) implementation for testing and
//! development. One [`MemoryStore`] holds a typed table per entity kind and
//! may be shared across sessions; each [`MemorySession`] is an exclusively
//! owned unit of work over it.
//!
//! Semantics:
//!
//! - Outside an explicit transaction the store runs autocommit: every
//!   persist/merge/remove applies immediately.
//! - `begin` acquires a store-wide permit (transactions are serialized
//!   across sessions) and arms a key-scoped undo log: every write inside
//!   the transaction records the prior state of the keys it touches,
//!   first touch wins. `commit` discards the log, `rollback` reverts
//!   exactly the recorded keys — autocommit writes landed by other
//!   sessions in between survive. Writes inside a transaction are
//!   visible to reads through the same session.
//! - Cacheable selections are served from a per-table second-level query
//!   cache keyed by selection fingerprint and validated against a table
//!   generation counter bumped by every mutating call.

mod session;

pub use session::MemorySession;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::entity::Entity;

/// Memory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Upper bound on cached selections per table; 0 disables the cache
    pub query_cache_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            query_cache_capacity: 128,
        }
    }
}

/// Aggregate counters over the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Total rows across all tables
    pub entities: usize,
    /// Number of entity kinds seen so far
    pub tables: usize,
    /// Live second-level cache entries across all tables
    pub cached_queries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Shared in-memory store; cheap to clone, one table per entity kind
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: MemoryConfig,
    tables: RwLock<HashMap<&'static str, Box<dyn AnyTable>>>,
    // Store-wide transaction permit; held by a session from begin to
    // commit/rollback.
    tx_lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                tables: RwLock::new(HashMap::new()),
                tx_lock: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// Mint an exclusively-owned session over this store
    #[must_use]
    pub fn session<E: Entity>(&self) -> MemorySession<E> {
        MemorySession::new(self.clone())
    }

    /// Snapshot of the store's counters
    pub async fn stats(&self) -> MemoryStats {
        let tables = self.inner.tables.read().await;
        let mut stats = MemoryStats {
            tables: tables.len(),
            ..MemoryStats::default()
        };
        for table in tables.values() {
            stats.entities += table.row_count();
            stats.cached_queries += table.cached_queries();
            stats.cache_hits += table.cache_hits();
            stats.cache_misses += table.cache_misses();
        }
        stats
    }

    pub(super) fn config(&self) -> &MemoryConfig {
        &self.inner.config
    }

    pub(super) fn tables(&self) -> &RwLock<HashMap<&'static str, Box<dyn AnyTable>>> {
        &self.inner.tables
    }

    pub(super) fn tx_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.inner.tx_lock)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

/// Type-erased table slot; sessions downcast back to their `Table<E>`
pub(super) trait AnyTable: Send + Sync {
    fn row_count(&self) -> usize;
    fn cached_queries(&self) -> usize;
    fn cache_hits(&self) -> u64;
    fn cache_misses(&self) -> u64;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Typed table: rows plus the second-level query cache over them
pub(super) struct Table<E: Entity> {
    pub(super) rows: HashMap<E::Key, E>,
    // Bumped by every mutating call; cache entries are valid only while
    // their recorded generation matches.
    pub(super) generation: u64,
    cache: HashMap<String, CacheEntry<E>>,
    hits: u64,
    misses: u64,
}

struct CacheEntry<E> {
    generation: u64,
    rows: Vec<E>,
}

impl<E: Entity> Table<E> {
    pub(super) fn new() -> Self {
        Self {
            rows: HashMap::new(),
            generation: 0,
            cache: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub(super) const fn bump(&mut self) {
        self.generation += 1;
    }

    /// Serve a selection from the cache if a current-generation entry exists
    pub(super) fn cache_lookup(&mut self, fingerprint: &str) -> Option<Vec<E>> {
        match self.cache.get(fingerprint) {
            Some(entry) if entry.generation == self.generation => {
                self.hits += 1;
                Some(entry.rows.clone())
            }
            Some(_) => {
                // Stale entry from an older generation
                self.cache.remove(fingerprint);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub(super) fn cache_store(&mut self, capacity: usize, fingerprint: String, rows: Vec<E>) {
        let generation = self.generation;
        self.cache.retain(|_, entry| entry.generation == generation);
        if self.cache.len() >= capacity {
            if let Some(evict) = self.cache.keys().next().cloned() {
                self.cache.remove(&evict);
            }
        }
        self.cache
            .insert(fingerprint, CacheEntry { generation, rows });
    }
}

impl<E: Entity> AnyTable for Table<E> {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    fn cache_hits(&self) -> u64 {
        self.hits
    }

    fn cache_misses(&self) -> u64 {
        self.misses
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
