//! # Parameterized Selections
//!
//! A [`Selection`] is the layer's query shape: named [`Value`] parameters
//! AND-ed as equality predicates over the set of all entities of one kind,
//! plus a flag marking the result eligible for the backend's second-level
//! query cache. [`Find`] is the lazy builder over it; nothing executes
//! before a terminal `list()` or `unique()` call.
//!
//! Evaluating external query *text* is deliberately out of scope; the
//! parameter-bound shape below is the entire query surface.

use crate::entity::{Entity, Value};
use crate::error::{PersistenceError, Result};
use crate::repository::Repository;
use crate::session::Session;

/// Parameter-bound query over all entities of one kind
#[derive(Debug, Clone, Default)]
pub struct Selection {
    params: Vec<(String, Value)>,
    cacheable: bool,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a named equality parameter
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Mark the selection result eligible for the second-level query cache
    #[must_use]
    pub const fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    #[must_use]
    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    /// Stable cache key for this selection's result set.
    ///
    /// Binding the same parameters in a different order yields the same
    /// fingerprint. Names are length-prefixed so a name containing the
    /// joining punctuation cannot collide with a differently-bound
    /// selection.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut params: Vec<_> = self.params.iter().collect();
        params.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out = String::new();
        for (name, value) in params {
            out.push_str(&format!("{}:{name}={value:?};", name.len()));
        }
        out
    }

    /// Evaluate the selection against one entity.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidQuery`] when a bound parameter
    /// names an attribute the entity does not have.
    pub fn matches<E: Entity>(&self, entity: &E) -> Result<bool> {
        for (name, value) in &self.params {
            let Some(attr) = entity.attribute(name) else {
                return Err(PersistenceError::InvalidQuery(format!(
                    "{} has no attribute named '{name}'",
                    E::KIND
                )));
            };
            if attr != *value {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Lazy, composable query builder returned by [`Repository::find`].
///
/// Accumulates filters without touching the store; execution happens at
/// `list()` or `unique()`.
///
/// [`Repository::find`]: crate::Repository::find
#[must_use = "a Find executes nothing until .list() or .unique() is called"]
pub struct Find<'a, E: Entity, S: Session<E>> {
    repo: &'a mut Repository<E, S>,
    selection: Selection,
}

impl<'a, E: Entity, S: Session<E>> Find<'a, E, S> {
    pub(crate) fn new(repo: &'a mut Repository<E, S>) -> Self {
        Self {
            repo,
            selection: Selection::new(),
        }
    }

    /// Add an equality filter on a named attribute
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.selection = self.selection.bind(name, value);
        self
    }

    /// Mark the query result eligible for the second-level cache
    pub fn cacheable(mut self) -> Self {
        self.selection = self.selection.cacheable();
        self
    }

    /// Execute and return every matching entity
    ///
    /// # Errors
    ///
    /// Propagates any store-level error unchanged.
    pub async fn list(self) -> Result<Vec<E>> {
        self.repo.execute_selection(&self.selection).await
    }

    /// Execute and extract at most one matching entity.
    ///
    /// Zero matches is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::TooManyResults`] when more than one row
    /// matches; propagates store-level errors unchanged.
    pub async fn unique(self) -> Result<Option<E>> {
        let rows = self.repo.execute_selection(&self.selection).await?;
        unique_from(rows)
    }
}

/// Unique-result extraction shared by every "unique" read path
pub(crate) fn unique_from<E: Entity>(mut rows: Vec<E>) -> Result<Option<E>> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => Err(PersistenceError::TooManyResults {
            entity_type: E::KIND,
            count,
        }),
    }
}
