//! # Session Capability Trait
//!
//! The collaborator surface the repository requires from a store backend:
//! transaction demarcation, single/batch persist-merge-remove, parameterized
//! selection, primary-key fetch, flush, and idempotent release. Backends
//! (the bundled memory store, or a real driver adapter) implement this and
//! nothing else.

use async_trait::async_trait;

use crate::entity::Entity;
use crate::error::Result;
use crate::query::Selection;

/// Unit-of-work handle over one logical store connection.
///
/// A session is exclusively owned by one [`Repository`] and is not safe for
/// concurrent use from multiple logical operations; the `&mut self` receivers
/// confine it to one unit of work at a time. Slice-taking mutators cover both
/// the single-entity and batch forms.
///
/// [`Repository`]: crate::Repository
#[async_trait]
pub trait Session<E: Entity>: Send {
    /// Open a transaction scope.
    ///
    /// Transactions never nest: a `begin` while one is active is a
    /// [`Transaction`] error in the begin phase.
    ///
    /// [`Transaction`]: crate::PersistenceError::Transaction
    async fn begin(&mut self) -> Result<()>;

    /// Commit the active transaction
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the active transaction, undoing every write inside it
    async fn rollback(&mut self) -> Result<()>;

    /// Store new entities; a key already present is a [`Conflict`]
    ///
    /// [`Conflict`]: crate::PersistenceError::Conflict
    async fn persist(&mut self, entities: &[E]) -> Result<()>;

    /// Apply changes to existing entities; a missing key is [`NotFound`]
    ///
    /// [`NotFound`]: crate::PersistenceError::NotFound
    async fn merge(&mut self, entities: &[E]) -> Result<()>;

    /// Upsert: store or overwrite, never key-fails
    async fn persist_or_merge(&mut self, entities: &[E]) -> Result<()>;

    /// Remove entities; a missing key is [`NotFound`]
    ///
    /// [`NotFound`]: crate::PersistenceError::NotFound
    async fn remove(&mut self, entities: &[E]) -> Result<()>;

    /// Execute a parameterized selection, returning every matching entity
    async fn select(&mut self, selection: &Selection) -> Result<Vec<E>>;

    /// Fetch one entity by primary key
    async fn get(&mut self, key: &E::Key) -> Result<Option<E>>;

    /// Fetch a batch by primary key.
    ///
    /// Missing keys are skipped; the result follows request order.
    async fn get_many(&mut self, keys: &[E::Key]) -> Result<Vec<E>>;

    /// Push pending changes to the store (no-op for write-eager backends)
    async fn flush(&mut self) -> Result<()>;

    /// Whether the session is still usable
    fn is_open(&self) -> bool;

    /// Release the session.
    ///
    /// Idempotent and infallible: a second call is a no-op, and a failure
    /// during release must not surface (log and continue).
    async fn close(&mut self);
}
