//! # Entrepot
//!
//! Generic repository and unit-of-work layer: a uniform CRUD surface over a
//! pluggable session backend, with a single transactional helper
//! centralizing the commit/rollback contract.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Layer                        │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                         │
//!                   ▼                         ▼
//! ┌─────────────────────────────┐ ┌───────────────────────────┐
//! │     Repository<E, S>        │ │  blocking::Repository     │
//! │  (async CRUD + transaction) │ │  (sync mirror, own rt)    │
//! └─────────────────────────────┘ └───────────────────────────┘
//!                   │                         │
//!                   └────────────┬────────────┘
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Session<E> trait                         │
//! │   (begin/commit/rollback, persist/merge/remove, select,     │
//! │    get/get_many, flush, close)                              │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          MemorySession / MemoryStore (reference)            │
//! │   or any driver adapter implementing Session<E>             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `memory`: Enable the in-memory reference backend (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entrepot::{Entity, Repository, Value, memory::MemoryStore};
//!
//! let store = MemoryStore::default();
//! let mut repo: Repository<Order, _> = Repository::new(store.session());
//!
//! repo.save_in_transaction(&order).await?;
//! let open = repo.find().filter("status", "open").cacheable().list().await?;
//! let one = repo.find_by_key(&order_id).await?;
//! repo.close().await;
//! ```
//!
//! A session is one unit of work: it must be confined to one logical
//! operation at a time. Repositories over separate sessions may run
//! concurrently with no shared mutable state between them.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod blocking;
pub mod entity;
pub mod error;
#[cfg(feature = "memory")]
pub mod memory;
pub mod query;
pub mod repository;
pub mod session;

// Re-export commonly used types
pub use entity::{Entity, Value};
pub use error::{PersistenceError, Result, TxPhase};
#[cfg(feature = "memory")]
pub use memory::{MemoryConfig, MemorySession, MemoryStats, MemoryStore};
pub use query::{Find, Selection};
pub use repository::Repository;
pub use session::Session;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
