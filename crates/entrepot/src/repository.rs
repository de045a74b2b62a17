//! # Generic Repository
//!
//! A uniform CRUD surface over one [`Session`], parameterized over the
//! entity type at compile time. The repository itself is stateless across
//! calls; the only stateful object is the session it exclusively owns,
//! whose lifecycle is Open → (many operations) → Closed.
//!
//! Every transactional variant is a one-liner over the single
//! [`transaction`](Repository::transaction) helper, which centralizes the
//! begin → op → flush → commit / rollback-then-rethrow contract.

use std::marker::PhantomData;

use crate::entity::Entity;
use crate::error::{PersistenceError, Result};
use crate::query::{Find, Selection, unique_from};
use crate::session::Session;

/// Generic repository bound to one entity type and one session backend
pub struct Repository<E: Entity, S: Session<E>> {
    session: S,
    closed: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, S: Session<E>> Repository<E, S> {
    /// Take exclusive ownership of a session
    pub const fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
            _entity: PhantomData,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed || !self.session.is_open() {
            return Err(PersistenceError::SessionClosed);
        }
        Ok(())
    }

    // =========================================================================
    // TRANSACTION DEMARCATION
    // =========================================================================

    /// Run an operation inside an explicit transaction.
    ///
    /// Begin → op → flush → commit; on any failure the transaction is rolled
    /// back and the *original* error is re-raised unchanged. A failure of the
    /// rollback itself is logged and never masks the original error.
    ///
    /// # Errors
    ///
    /// Whatever the operation, flush, or commit raised.
    pub async fn transaction<T, F>(&mut self, op: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut S) -> Result<T>,
    {
        self.ensure_open()?;
        self.session.begin().await?;
        tracing::debug!(entity = E::KIND, "transaction begun");

        let outcome = match op(&mut self.session).await {
            Ok(value) => self.session.flush().await.map(|()| value),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(value) => match self.session.commit().await {
                Ok(()) => {
                    tracing::debug!(entity = E::KIND, "transaction committed");
                    Ok(value)
                }
                Err(commit_err) => {
                    self.rollback_best_effort().await;
                    Err(commit_err)
                }
            },
            Err(err) => {
                self.rollback_best_effort().await;
                Err(err)
            }
        }
    }

    async fn rollback_best_effort(&mut self) {
        if let Err(rollback_err) = self.session.rollback().await {
            tracing::warn!(
                entity = E::KIND,
                error = %rollback_err,
                "rollback failed while unwinding; surfacing the original error"
            );
        } else {
            tracing::warn!(entity = E::KIND, "transaction rolled back");
        }
    }

    // =========================================================================
    // SAVE / UPDATE / DELETE — bare mode
    // =========================================================================
    //
    // Bare calls rely on the caller or an ambient transaction; store-level
    // errors propagate uncaught.

    /// Store a new entity
    ///
    /// # Errors
    ///
    /// [`PersistenceError::Conflict`] when the key is already present.
    pub async fn save(&mut self, entity: &E) -> Result<()> {
        self.ensure_open()?;
        self.session.persist(std::slice::from_ref(entity)).await
    }

    /// Store a batch of new entities
    pub async fn save_all(&mut self, entities: &[E]) -> Result<()> {
        self.ensure_open()?;
        self.session.persist(entities).await
    }

    /// Apply changes to an existing entity
    ///
    /// # Errors
    ///
    /// [`PersistenceError::NotFound`] when no row has the entity's key.
    pub async fn update(&mut self, entity: &E) -> Result<()> {
        self.ensure_open()?;
        self.session.merge(std::slice::from_ref(entity)).await
    }

    /// Apply changes to a batch of existing entities
    pub async fn update_all(&mut self, entities: &[E]) -> Result<()> {
        self.ensure_open()?;
        self.session.merge(entities).await
    }

    /// Remove an entity
    pub async fn delete(&mut self, entity: &E) -> Result<()> {
        self.ensure_open()?;
        self.session.remove(std::slice::from_ref(entity)).await
    }

    /// Remove a batch of entities
    pub async fn delete_all(&mut self, entities: &[E]) -> Result<()> {
        self.ensure_open()?;
        self.session.remove(entities).await
    }

    // =========================================================================
    // SAVE / UPDATE / DELETE — explicit-transaction mode
    // =========================================================================

    /// [`save`](Self::save) inside an explicit transaction
    pub async fn save_in_transaction(&mut self, entity: &E) -> Result<()> {
        self.transaction(async |session| session.persist(std::slice::from_ref(entity)).await)
            .await
    }

    /// [`save_all`](Self::save_all) inside an explicit transaction
    pub async fn save_all_in_transaction(&mut self, entities: &[E]) -> Result<()> {
        self.transaction(async |session| session.persist(entities).await)
            .await
    }

    /// [`update`](Self::update) inside an explicit transaction
    pub async fn update_in_transaction(&mut self, entity: &E) -> Result<()> {
        self.transaction(async |session| session.merge(std::slice::from_ref(entity)).await)
            .await
    }

    /// [`update_all`](Self::update_all) inside an explicit transaction
    pub async fn update_all_in_transaction(&mut self, entities: &[E]) -> Result<()> {
        self.transaction(async |session| session.merge(entities).await)
            .await
    }

    /// Upsert a batch inside an explicit transaction.
    ///
    /// Upsert is only exposed in the transactional batch form.
    pub async fn save_or_update_all_in_transaction(&mut self, entities: &[E]) -> Result<()> {
        self.transaction(async |session| session.persist_or_merge(entities).await)
            .await
    }

    /// [`delete`](Self::delete) inside an explicit transaction
    pub async fn delete_in_transaction(&mut self, entity: &E) -> Result<()> {
        self.transaction(async |session| session.remove(std::slice::from_ref(entity)).await)
            .await
    }

    /// [`delete_all`](Self::delete_all) inside an explicit transaction
    pub async fn delete_all_in_transaction(&mut self, entities: &[E]) -> Result<()> {
        self.transaction(async |session| session.remove(entities).await)
            .await
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Lazily-evaluated, composable query over all entities of this kind
    pub fn find(&mut self) -> Find<'_, E, S> {
        Find::new(self)
    }

    /// Client-side filter over the **full materialized set**.
    ///
    /// This loads every entity of the kind and filters in memory. It is a
    /// convenience, not a server-side `where` clause: the store cannot prune
    /// anything, so the cost is a full scan regardless of the predicate.
    pub async fn find_where<P>(&mut self, predicate: P) -> Result<Vec<E>>
    where
        P: FnMut(&E) -> bool,
    {
        let mut all = self.execute_selection(&Selection::new()).await?;
        all.retain(predicate);
        Ok(all)
    }

    /// Server-side single-parameter query
    pub async fn find_by(
        &mut self,
        name: impl Into<String>,
        value: impl Into<crate::Value>,
        cacheable: bool,
    ) -> Result<Vec<E>> {
        let mut selection = Selection::new().bind(name, value);
        if cacheable {
            selection = selection.cacheable();
        }
        self.execute_selection(&selection).await
    }

    /// Server-side single-parameter query expecting at most one row.
    ///
    /// Zero matches is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::TooManyResults`] when more than one row matches.
    pub async fn find_unique_by(
        &mut self,
        name: impl Into<String>,
        value: impl Into<crate::Value>,
        cacheable: bool,
    ) -> Result<Option<E>> {
        let rows = self.find_by(name, value, cacheable).await?;
        unique_from(rows)
    }

    /// Direct lookup by primary key
    pub async fn find_by_key(&mut self, key: &E::Key) -> Result<Option<E>> {
        self.ensure_open()?;
        self.session.get(key).await
    }

    /// Batch lookup by primary key.
    ///
    /// Missing keys are skipped; the result follows request order.
    pub async fn find_by_keys(&mut self, keys: &[E::Key]) -> Result<Vec<E>> {
        self.ensure_open()?;
        self.session.get_many(keys).await
    }

    pub(crate) async fn execute_selection(&mut self, selection: &Selection) -> Result<Vec<E>> {
        self.ensure_open()?;
        self.session.select(selection).await
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Release the session.
    ///
    /// Idempotent: the second and later calls are no-ops and never raise.
    /// After `close`, every operation fails fast with
    /// [`PersistenceError::SessionClosed`].
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.session.close().await;
        self.closed = true;
        tracing::debug!(entity = E::KIND, "repository closed");
    }

    /// Whether [`close`](Self::close) has been called
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<E: Entity, S: Session<E>> Drop for Repository<E, S> {
    fn drop(&mut self) {
        // Ownership already releases the session deterministically; the log
        // only flags callers that skipped the explicit close.
        if !self.closed {
            tracing::debug!(entity = E::KIND, "repository dropped without explicit close");
        }
    }
}
