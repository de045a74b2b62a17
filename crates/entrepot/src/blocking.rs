//! # Blocking Facade
//!
//! Synchronous mirror of the async [`Repository`](crate::Repository): every
//! operation has the same name, semantics, and result shape, driven to
//! completion on a dedicated current-thread tokio runtime. For callers that
//! do not run an async executor of their own.
//!
//! Must not be used from inside an async context: `block_on` panics when
//! nested in a running runtime.

use tokio::runtime::{Builder, Runtime};

use crate::entity::{Entity, Value};
use crate::error::{PersistenceError, Result};
use crate::query::{Selection, unique_from};
use crate::session::Session;

/// Synchronous repository over an async session backend
pub struct Repository<E: Entity, S: Session<E>> {
    inner: crate::Repository<E, S>,
    runtime: Runtime,
}

impl<E: Entity, S: Session<E>> Repository<E, S> {
    /// Take exclusive ownership of a session and spin up the driving runtime
    ///
    /// # Errors
    ///
    /// [`PersistenceError::Connectivity`] when the runtime cannot be built.
    pub fn new(session: S) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                PersistenceError::Connectivity(format!("failed to build blocking runtime: {e}"))
            })?;
        Ok(Self {
            inner: crate::Repository::new(session),
            runtime,
        })
    }

    /// Run an operation inside an explicit transaction; see
    /// [`Repository::transaction`](crate::Repository::transaction)
    pub fn transaction<T, F>(&mut self, op: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut S) -> Result<T>,
    {
        self.runtime.block_on(self.inner.transaction(op))
    }

    pub fn save(&mut self, entity: &E) -> Result<()> {
        self.runtime.block_on(self.inner.save(entity))
    }

    pub fn save_all(&mut self, entities: &[E]) -> Result<()> {
        self.runtime.block_on(self.inner.save_all(entities))
    }

    pub fn update(&mut self, entity: &E) -> Result<()> {
        self.runtime.block_on(self.inner.update(entity))
    }

    pub fn update_all(&mut self, entities: &[E]) -> Result<()> {
        self.runtime.block_on(self.inner.update_all(entities))
    }

    pub fn delete(&mut self, entity: &E) -> Result<()> {
        self.runtime.block_on(self.inner.delete(entity))
    }

    pub fn delete_all(&mut self, entities: &[E]) -> Result<()> {
        self.runtime.block_on(self.inner.delete_all(entities))
    }

    pub fn save_in_transaction(&mut self, entity: &E) -> Result<()> {
        self.runtime.block_on(self.inner.save_in_transaction(entity))
    }

    pub fn save_all_in_transaction(&mut self, entities: &[E]) -> Result<()> {
        self.runtime
            .block_on(self.inner.save_all_in_transaction(entities))
    }

    pub fn update_in_transaction(&mut self, entity: &E) -> Result<()> {
        self.runtime
            .block_on(self.inner.update_in_transaction(entity))
    }

    pub fn update_all_in_transaction(&mut self, entities: &[E]) -> Result<()> {
        self.runtime
            .block_on(self.inner.update_all_in_transaction(entities))
    }

    pub fn save_or_update_all_in_transaction(&mut self, entities: &[E]) -> Result<()> {
        self.runtime
            .block_on(self.inner.save_or_update_all_in_transaction(entities))
    }

    pub fn delete_in_transaction(&mut self, entity: &E) -> Result<()> {
        self.runtime
            .block_on(self.inner.delete_in_transaction(entity))
    }

    pub fn delete_all_in_transaction(&mut self, entities: &[E]) -> Result<()> {
        self.runtime
            .block_on(self.inner.delete_all_in_transaction(entities))
    }

    /// Lazily-evaluated, composable query; executes at `list()`/`unique()`
    pub fn find(&mut self) -> Find<'_, E, S> {
        Find {
            repo: self,
            selection: Selection::new(),
        }
    }

    /// Client-side filter over the full materialized set; see
    /// [`Repository::find_where`](crate::Repository::find_where) for the
    /// full-scan caveat
    pub fn find_where<P>(&mut self, predicate: P) -> Result<Vec<E>>
    where
        P: FnMut(&E) -> bool,
    {
        self.runtime.block_on(self.inner.find_where(predicate))
    }

    pub fn find_by(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        cacheable: bool,
    ) -> Result<Vec<E>> {
        self.runtime
            .block_on(self.inner.find_by(name, value, cacheable))
    }

    pub fn find_unique_by(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        cacheable: bool,
    ) -> Result<Option<E>> {
        self.runtime
            .block_on(self.inner.find_unique_by(name, value, cacheable))
    }

    pub fn find_by_key(&mut self, key: &E::Key) -> Result<Option<E>> {
        self.runtime.block_on(self.inner.find_by_key(key))
    }

    pub fn find_by_keys(&mut self, keys: &[E::Key]) -> Result<Vec<E>> {
        self.runtime.block_on(self.inner.find_by_keys(keys))
    }

    /// Release the session; idempotent, never raises
    pub fn close(&mut self) {
        self.runtime.block_on(self.inner.close());
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Blocking counterpart of [`Find`](crate::Find)
#[must_use = "a Find executes nothing until .list() or .unique() is called"]
pub struct Find<'a, E: Entity, S: Session<E>> {
    repo: &'a mut Repository<E, S>,
    selection: Selection,
}

impl<E: Entity, S: Session<E>> Find<'_, E, S> {
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.selection = self.selection.bind(name, value);
        self
    }

    pub fn cacheable(mut self) -> Self {
        self.selection = self.selection.cacheable();
        self
    }

    pub fn list(self) -> Result<Vec<E>> {
        let repo = &mut *self.repo;
        repo.runtime
            .block_on(repo.inner.execute_selection(&self.selection))
    }

    pub fn unique(self) -> Result<Option<E>> {
        let repo = &mut *self.repo;
        let rows = repo
            .runtime
            .block_on(repo.inner.execute_selection(&self.selection))?;
        unique_from(rows)
    }
}
