//! End-to-end repository behavior over the in-memory backend

mod common;

use async_trait::async_trait;
use common::{Order, order, same_set, seeded_store};
use entrepot::memory::{MemorySession, MemoryStore};
use entrepot::{PersistenceError, Repository, Result, Selection, Session, TxPhase};

fn repo_over(store: &MemoryStore) -> Repository<Order, MemorySession<Order>> {
    Repository::new(store.session())
}

// =============================================================================
// SAVE / UPDATE / DELETE
// =============================================================================

#[tokio::test]
async fn test_save_in_transaction_then_find_by_key() {
    let store = MemoryStore::default();
    let mut repo = repo_over(&store);
    let o = order(1, "open");

    repo.save_in_transaction(&o).await.unwrap();

    let found = repo.find_by_key(&1).await.unwrap();
    assert_eq!(found, Some(o.clone()));

    // Exactly once: the full set holds a single row
    let all = repo.find().list().await.unwrap();
    assert_eq!(all, vec![o]);
}

#[tokio::test]
async fn test_save_duplicate_is_conflict() {
    let store = seeded_store(&[order(1, "open")]).await;
    let mut repo = repo_over(&store);

    let err = repo.save(&order(1, "open")).await.unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Conflict {
            entity_type: "orders",
            ..
        }
    ));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = MemoryStore::default();
    let mut repo = repo_over(&store);

    let err = repo.update(&order(7, "open")).await.unwrap_err();
    assert!(matches!(err, PersistenceError::NotFound { .. }));
}

#[tokio::test]
async fn test_failed_transactional_update_rolls_back() {
    let original = order(1, "open");
    let store = seeded_store(&[original.clone()]).await;
    let mut repo = repo_over(&store);

    let mut modified = original.clone();
    modified.status = "shipped".to_string();
    let missing = order(99, "open");

    // The merge applies the first entity before failing on the second;
    // rollback must undo it.
    let err = repo
        .update_all_in_transaction(&[modified, missing])
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::NotFound { .. }));

    let reread = repo.find_by_key(&1).await.unwrap();
    assert_eq!(reread, Some(original));
}

#[tokio::test]
async fn test_failed_transactional_batch_leaves_no_partial_write() {
    let store = seeded_store(&[order(2, "open")]).await;
    let mut repo = repo_over(&store);

    // Duplicate key in the middle of the batch
    let batch = [order(4, "open"), order(2, "open"), order(5, "open")];
    let err = repo.save_all_in_transaction(&batch).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Conflict { .. }));

    assert_eq!(repo.find_by_key(&4).await.unwrap(), None);
    assert_eq!(repo.find_by_key(&5).await.unwrap(), None);
    assert_eq!(repo.find().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_save_equals_sequential_saves() {
    let orders: Vec<Order> = (1..=5).map(|id| order(id, "open")).collect();

    let batch_store = MemoryStore::default();
    let mut batch_repo = repo_over(&batch_store);
    batch_repo.save_all(&orders).await.unwrap();

    let seq_store = MemoryStore::default();
    let mut seq_repo = repo_over(&seq_store);
    for o in &orders {
        seq_repo.save(o).await.unwrap();
    }

    let from_batch = batch_repo.find().list().await.unwrap();
    let from_seq = seq_repo.find().list().await.unwrap();
    assert!(same_set(from_batch, from_seq));
}

#[tokio::test]
async fn test_save_or_update_upserts_in_transaction() {
    let existing = order(1, "open");
    let store = seeded_store(&[existing.clone()]).await;
    let mut repo = repo_over(&store);

    let mut replacement = existing;
    replacement.status = "shipped".to_string();
    let fresh = order(2, "open");

    repo.save_or_update_all_in_transaction(&[replacement.clone(), fresh.clone()])
        .await
        .unwrap();

    assert_eq!(repo.find_by_key(&1).await.unwrap(), Some(replacement));
    assert_eq!(repo.find_by_key(&2).await.unwrap(), Some(fresh));
}

#[tokio::test]
async fn test_delete_in_transaction() {
    let victim = order(1, "open");
    let survivor = order(2, "open");
    let store = seeded_store(&[victim.clone(), survivor.clone()]).await;
    let mut repo = repo_over(&store);

    repo.delete_in_transaction(&victim).await.unwrap();

    assert_eq!(repo.find_by_key(&1).await.unwrap(), None);
    assert_eq!(repo.find_by_key(&2).await.unwrap(), Some(survivor));

    // Deleting again: the row is gone
    let err = repo.delete(&victim).await.unwrap_err();
    assert!(matches!(err, PersistenceError::NotFound { .. }));
}

// =============================================================================
// READS
// =============================================================================

#[tokio::test]
async fn test_find_unique_by_zero_one_many() {
    let store = seeded_store(&[order(1, "open"), order(2, "shipped"), order(3, "shipped")]).await;
    let mut repo = repo_over(&store);

    // Exactly one row
    let one = repo.find_unique_by("status", "open", false).await.unwrap();
    assert_eq!(one.map(|o| o.id), Some(1));

    // Zero rows: no result, not an error
    let none = repo
        .find_unique_by("status", "cancelled", false)
        .await
        .unwrap();
    assert_eq!(none, None);

    // Two or more rows
    let err = repo
        .find_unique_by("status", "shipped", false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::TooManyResults {
            entity_type: "orders",
            count: 2
        }
    ));
}

#[tokio::test]
async fn test_find_by_keys_and_partial_miss() {
    let orders = [order(1, "open"), order(2, "open"), order(3, "open")];
    let store = seeded_store(&orders).await;
    let mut repo = repo_over(&store);

    let all = repo.find_by_keys(&[1, 2, 3]).await.unwrap();
    assert!(same_set(all, orders.to_vec()));

    // Missing keys are skipped; result follows request order
    let partial = repo.find_by_keys(&[99, 1]).await.unwrap();
    assert_eq!(partial, vec![orders[0].clone()]);

    let reordered = repo.find_by_keys(&[3, 1, 2]).await.unwrap();
    let ids: Vec<i64> = reordered.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

#[tokio::test]
async fn test_find_builder_composes_filters() {
    let mut wanted = order(1, "open");
    wanted.customer = "Ada".to_string();
    let mut decoy = order(2, "open");
    decoy.customer = "Grace".to_string();
    let store = seeded_store(&[wanted.clone(), decoy, order(3, "shipped")]).await;
    let mut repo = repo_over(&store);

    let hit = repo
        .find()
        .filter("status", "open")
        .filter("customer", "Ada")
        .unique()
        .await
        .unwrap();
    assert_eq!(hit, Some(wanted));
}

#[tokio::test]
async fn test_find_where_filters_after_full_load() {
    let store = seeded_store(&[order(1, "open"), order(2, "shipped"), order(3, "open")]).await;
    let mut repo = repo_over(&store);

    // Client-side predicate over the fully materialized set
    let open = repo.find_where(|o| o.status == "open").await.unwrap();
    let mut ids: Vec<i64> = open.iter().map(|o| o.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3]);

    // A predicate no row satisfies still scans everything and returns empty
    let none = repo.find_where(|_| false).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_unknown_parameter_is_invalid_query() {
    let store = seeded_store(&[order(1, "open")]).await;
    let mut repo = repo_over(&store);

    let err = repo.find_by("colour", "red", false).await.unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidQuery(_)));

    // An empty table has nothing to validate against: empty result
    let empty_store = MemoryStore::default();
    let mut empty_repo = repo_over(&empty_store);
    let rows = empty_repo.find_by("colour", "red", false).await.unwrap();
    assert!(rows.is_empty());
}

// =============================================================================
// TRANSACTION DEMARCATION
// =============================================================================

#[tokio::test]
async fn test_transaction_helper_returns_operation_value() {
    let store = seeded_store(&[order(1, "open"), order(2, "open")]).await;
    let mut repo = repo_over(&store);

    let count = repo
        .transaction(async |session| {
            session.persist(&[order(3, "open")]).await?;
            let rows = session.select(&Selection::new()).await?;
            Ok(rows.len())
        })
        .await
        .unwrap();
    // Read-your-writes inside the transaction
    assert_eq!(count, 3);
    assert_eq!(repo.find_by_key(&3).await.unwrap().map(|o| o.id), Some(3));
}

#[tokio::test]
async fn test_transactions_do_not_nest() {
    let store = MemoryStore::default();
    let mut repo = repo_over(&store);

    let err = repo
        .transaction(async |session: &mut MemorySession<Order>| {
            session.begin().await?;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Transaction {
            phase: TxPhase::Begin,
            ..
        }
    ));

    // The outer transaction unwound cleanly; the session is still usable
    repo.save(&order(1, "open")).await.unwrap();
}

/// Failure-injecting wrapper used to pin the error-masking contract
struct FlakySession {
    inner: MemorySession<Order>,
    fail_merge: bool,
    fail_rollback: bool,
}

#[async_trait]
impl Session<Order> for FlakySession {
    async fn begin(&mut self) -> Result<()> {
        self.inner.begin().await
    }

    async fn commit(&mut self) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.fail_rollback {
            // Still unwind the real transaction so the store-wide permit
            // is released, then report the failure.
            let _ = self.inner.rollback().await;
            return Err(PersistenceError::Transaction {
                phase: TxPhase::Rollback,
                reason: "injected rollback failure".to_string(),
            });
        }
        self.inner.rollback().await
    }

    async fn persist(&mut self, entities: &[Order]) -> Result<()> {
        self.inner.persist(entities).await
    }

    async fn merge(&mut self, entities: &[Order]) -> Result<()> {
        if self.fail_merge {
            return Err(PersistenceError::Connectivity(
                "injected merge failure".to_string(),
            ));
        }
        self.inner.merge(entities).await
    }

    async fn persist_or_merge(&mut self, entities: &[Order]) -> Result<()> {
        self.inner.persist_or_merge(entities).await
    }

    async fn remove(&mut self, entities: &[Order]) -> Result<()> {
        self.inner.remove(entities).await
    }

    async fn select(&mut self, selection: &Selection) -> Result<Vec<Order>> {
        self.inner.select(selection).await
    }

    async fn get(&mut self, key: &i64) -> Result<Option<Order>> {
        self.inner.get(key).await
    }

    async fn get_many(&mut self, keys: &[i64]) -> Result<Vec<Order>> {
        self.inner.get_many(keys).await
    }

    async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

#[tokio::test]
async fn test_rollback_failure_does_not_mask_original_error() {
    let store = seeded_store(&[order(1, "open")]).await;
    let session = FlakySession {
        inner: store.session(),
        fail_merge: true,
        fail_rollback: true,
    };
    let mut repo: Repository<Order, FlakySession> = Repository::new(session);

    let err = repo.update_in_transaction(&order(1, "shipped")).await.unwrap_err();

    // The operation's own error surfaces, not the rollback's
    assert!(matches!(err, PersistenceError::Connectivity(_)));
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_operations_after_close_fail_fast() {
    let store = seeded_store(&[order(1, "open")]).await;
    let mut repo = repo_over(&store);

    repo.close().await;
    assert!(repo.is_closed());

    let err = repo.save(&order(2, "open")).await.unwrap_err();
    assert!(matches!(err, PersistenceError::SessionClosed));
    let err = repo.find_by_key(&1).await.unwrap_err();
    assert!(matches!(err, PersistenceError::SessionClosed));
    let err = repo
        .transaction(async |_: &mut MemorySession<Order>| Ok(()))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::SessionClosed));

    // Second close is a no-op and raises nothing
    repo.close().await;
    assert!(repo.is_closed());
}

#[tokio::test]
async fn test_concurrent_repositories_over_separate_sessions() {
    let store = MemoryStore::default();

    let mut handles = Vec::new();
    for id in 1..=4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut repo: Repository<Order, MemorySession<Order>> =
                Repository::new(store.session());
            repo.save_in_transaction(&order(id, "open")).await.unwrap();
            repo.close().await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut repo = repo_over(&store);
    assert_eq!(repo.find().list().await.unwrap().len(), 4);
}
