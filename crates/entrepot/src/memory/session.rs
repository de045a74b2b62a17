//! Unit-of-work session over the in-memory store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use super::{AnyTable, MemoryStore, Table};
use crate::entity::Entity;
use crate::error::{PersistenceError, Result, TxPhase};
use crate::query::Selection;
use crate::session::Session;

/// Exclusively-owned session over a [`MemoryStore`]
pub struct MemorySession<E: Entity> {
    store: MemoryStore,
    open: bool,
    tx: Option<TxState<E>>,
}

/// Prior state of the keys this transaction has written, first touch wins.
/// `None` means the key was absent.
type UndoLog<E> = HashMap<<E as Entity>::Key, Option<E>>;

struct TxState<E: Entity> {
    // Held from begin to commit/rollback; serializes transactions
    // across sessions on the same store.
    permit: OwnedMutexGuard<()>,
    undo: UndoLog<E>,
}

fn table_for<'a, E: Entity>(
    tables: &'a mut HashMap<&'static str, Box<dyn AnyTable>>,
) -> Result<&'a mut Table<E>> {
    let slot = tables
        .entry(E::KIND)
        .or_insert_with(|| Box::new(Table::<E>::new()));
    slot.as_any_mut()
        .downcast_mut::<Table<E>>()
        .ok_or_else(|| {
            PersistenceError::Connectivity(format!(
                "table '{}' is bound to a different entity type",
                E::KIND
            ))
        })
}

/// Record the prior state of a key before the transaction writes it
fn record_undo<E: Entity>(undo: Option<&mut UndoLog<E>>, table: &Table<E>, key: &E::Key) {
    if let Some(undo) = undo {
        undo.entry(key.clone())
            .or_insert_with(|| table.rows.get(key).cloned());
    }
}

impl<E: Entity> MemorySession<E> {
    pub(super) const fn new(store: MemoryStore) -> Self {
        Self {
            store,
            open: true,
            tx: None,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(PersistenceError::SessionClosed)
        }
    }

    /// Run a mutating closure against this entity's table, handing it the
    /// undo log when a transaction is active. The generation counter is
    /// bumped even when the closure fails partway, since earlier rows of a
    /// batch may already have been written.
    async fn apply_write<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Table<E>, Option<&mut UndoLog<E>>) -> Result<()>,
    {
        self.ensure_open()?;
        let mut tables = self.store.tables().write().await;
        let table = table_for::<E>(&mut tables)?;
        let result = f(table, self.tx.as_mut().map(|tx| &mut tx.undo));
        table.bump();
        result
    }

    /// Put back the recorded prior state of every key the transaction
    /// wrote. Scoped to those keys only: writes committed by other
    /// sessions in between stay untouched.
    async fn revert(&self, undo: UndoLog<E>) -> Result<()> {
        if undo.is_empty() {
            return Ok(());
        }
        let mut tables = self.store.tables().write().await;
        let table = table_for::<E>(&mut tables)?;
        for (key, prior) in undo {
            match prior {
                Some(entity) => {
                    table.rows.insert(key, entity);
                }
                None => {
                    table.rows.remove(&key);
                }
            }
        }
        // Entries cached inside the rolled-back transaction must never
        // validate again
        table.bump();
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> Session<E> for MemorySession<E> {
    async fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.tx.is_some() {
            return Err(PersistenceError::Transaction {
                phase: TxPhase::Begin,
                reason: "transaction already active on this session".to_string(),
            });
        }
        let permit = self.store.tx_lock().lock_owned().await;
        self.tx = Some(TxState {
            permit,
            undo: UndoLog::<E>::new(),
        });
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        match self.tx.take() {
            // Writes applied eagerly; dropping the undo log is the commit
            Some(_) => Ok(()),
            None => Err(PersistenceError::Transaction {
                phase: TxPhase::Commit,
                reason: "no active transaction".to_string(),
            }),
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        let Some(tx) = self.tx.take() else {
            return Err(PersistenceError::Transaction {
                phase: TxPhase::Rollback,
                reason: "no active transaction".to_string(),
            });
        };
        let TxState { permit, undo } = tx;
        self.revert(undo).await?;
        drop(permit);
        Ok(())
    }

    async fn persist(&mut self, entities: &[E]) -> Result<()> {
        self.apply_write(|table, mut undo| {
            for entity in entities {
                let key = entity.key();
                if table.rows.contains_key(&key) {
                    return Err(PersistenceError::Conflict {
                        entity_type: E::KIND,
                        key: format!("{key:?}"),
                    });
                }
                record_undo(undo.as_deref_mut(), table, &key);
                table.rows.insert(key, entity.clone());
            }
            Ok(())
        })
        .await
    }

    async fn merge(&mut self, entities: &[E]) -> Result<()> {
        self.apply_write(|table, mut undo| {
            for entity in entities {
                let key = entity.key();
                if !table.rows.contains_key(&key) {
                    return Err(PersistenceError::NotFound {
                        entity_type: E::KIND,
                        key: format!("{key:?}"),
                    });
                }
                record_undo(undo.as_deref_mut(), table, &key);
                table.rows.insert(key, entity.clone());
            }
            Ok(())
        })
        .await
    }

    async fn persist_or_merge(&mut self, entities: &[E]) -> Result<()> {
        self.apply_write(|table, mut undo| {
            for entity in entities {
                let key = entity.key();
                record_undo(undo.as_deref_mut(), table, &key);
                table.rows.insert(key, entity.clone());
            }
            Ok(())
        })
        .await
    }

    async fn remove(&mut self, entities: &[E]) -> Result<()> {
        self.apply_write(|table, mut undo| {
            for entity in entities {
                let key = entity.key();
                record_undo(undo.as_deref_mut(), table, &key);
                if table.rows.remove(&key).is_none() {
                    return Err(PersistenceError::NotFound {
                        entity_type: E::KIND,
                        key: format!("{key:?}"),
                    });
                }
            }
            Ok(())
        })
        .await
    }

    async fn select(&mut self, selection: &Selection) -> Result<Vec<E>> {
        self.ensure_open()?;
        let mut tables = self.store.tables().write().await;
        let table = table_for::<E>(&mut tables)?;
        let capacity = self.store.config().query_cache_capacity;
        let cached = selection.is_cacheable() && capacity > 0;

        if cached {
            let fingerprint = selection.fingerprint();
            if let Some(rows) = table.cache_lookup(&fingerprint) {
                tracing::debug!(entity = E::KIND, fingerprint = %fingerprint, "query cache hit");
                return Ok(rows);
            }
        }

        let mut rows = Vec::new();
        for row in table.rows.values() {
            if selection.matches(row)? {
                rows.push(row.clone());
            }
        }

        if cached {
            table.cache_store(capacity, selection.fingerprint(), rows.clone());
        }
        Ok(rows)
    }

    async fn get(&mut self, key: &E::Key) -> Result<Option<E>> {
        self.ensure_open()?;
        let mut tables = self.store.tables().write().await;
        let table = table_for::<E>(&mut tables)?;
        Ok(table.rows.get(key).cloned())
    }

    async fn get_many(&mut self, keys: &[E::Key]) -> Result<Vec<E>> {
        self.ensure_open()?;
        let mut tables = self.store.tables().write().await;
        let table = table_for::<E>(&mut tables)?;
        Ok(keys
            .iter()
            .filter_map(|key| table.rows.get(key).cloned())
            .collect())
    }

    async fn flush(&mut self) -> Result<()> {
        // Writes apply eagerly; flush exists for write-behind backends
        self.ensure_open()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) {
        if !self.open {
            return;
        }
        if let Some(tx) = self.tx.take() {
            let TxState { permit, undo } = tx;
            if let Err(err) = self.revert(undo).await {
                tracing::warn!(entity = E::KIND, error = %err, "undo failed during close");
            }
            drop(permit);
            tracing::warn!(
                entity = E::KIND,
                "session closed with an active transaction; rolled back"
            );
        }
        self.open = false;
    }
}
