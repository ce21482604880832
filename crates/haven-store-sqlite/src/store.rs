use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use haven_core::store::{Store, StoreTx, Watch};
use haven_core::{PdsError, PdsResult};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::Notify;

/// `Store` over a single sqlite database, holding one `kv` table and one
/// `seq_counter` row. No `migrations/` directory: the schema is two
/// statements, created inline at connect time.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    watchers: Arc<Mutex<HashMap<Vec<u8>, Arc<Notify>>>>,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> PdsResult<Self> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| PdsError::storage(e.to_string()))?;

        sqlx::query("CREATE TABLE IF NOT EXISTS kv (key BLOB PRIMARY KEY, value BLOB NOT NULL)")
            .execute(&pool)
            .await
            .map_err(|e| PdsError::storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS seq_counter (id INTEGER PRIMARY KEY CHECK (id = 0), next INTEGER NOT NULL)",
        )
        .execute(&pool)
        .await
        .map_err(|e| PdsError::storage(e.to_string()))?;

        sqlx::query("INSERT OR IGNORE INTO seq_counter (id, next) VALUES (0, 1)")
            .execute(&pool)
            .await
            .map_err(|e| PdsError::storage(e.to_string()))?;

        Ok(Self {
            pool,
            watchers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Wakes and drops any pending watcher for `key`. Called once a write
    /// to that key is actually visible (pool write committed, or tx
    /// committed).
    fn notify_key(&self, key: &[u8]) {
        if let Some(notify) = self.watchers.lock().unwrap().remove(key) {
            notify.notify_waiters();
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    type Tx = SqliteStoreTx;

    async fn get(&self, key: &[u8]) -> PdsResult<Option<Vec<u8>>> {
        get_with(&self.pool, key).await
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> PdsResult<()> {
        set_with(&self.pool, key, value).await?;
        self.notify_key(key);
        Ok(())
    }

    async fn clear(&self, key: &[u8]) -> PdsResult<()> {
        clear_with(&self.pool, key).await?;
        self.notify_key(key);
        Ok(())
    }

    async fn clear_range(&self, start: &[u8], end: &[u8]) -> PdsResult<()> {
        clear_range_with(&self.pool, start, end).await
    }

    async fn scan(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
        reverse: bool,
    ) -> PdsResult<Vec<(Vec<u8>, Vec<u8>)>> {
        scan_with(&self.pool, prefix, start_after, limit, reverse).await
    }

    async fn watch(&self, key: &[u8]) -> PdsResult<Watch> {
        let notify = self
            .watchers
            .lock()
            .unwrap()
            .entry(key.to_vec())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone();
        Ok(Watch::new(notify))
    }

    async fn begin_tx(&self) -> PdsResult<Self::Tx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PdsError::storage(e.to_string()))?;
        Ok(SqliteStoreTx {
            tx,
            store: self.clone(),
            touched_keys: Vec::new(),
        })
    }
}

pub struct SqliteStoreTx {
    tx: Transaction<'static, Sqlite>,
    store: SqliteStore,
    touched_keys: Vec<Vec<u8>>,
}

#[async_trait]
impl StoreTx for SqliteStoreTx {
    async fn get(&mut self, key: &[u8]) -> PdsResult<Option<Vec<u8>>> {
        get_with(&mut *self.tx, key).await
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> PdsResult<()> {
        set_with(&mut *self.tx, key, value).await?;
        self.touched_keys.push(key.to_vec());
        Ok(())
    }

    async fn clear(&mut self, key: &[u8]) -> PdsResult<()> {
        clear_with(&mut *self.tx, key).await?;
        self.touched_keys.push(key.to_vec());
        Ok(())
    }

    async fn clear_range(&mut self, start: &[u8], end: &[u8]) -> PdsResult<()> {
        clear_range_with(&mut *self.tx, start, end).await
    }

    async fn scan(
        &mut self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
        reverse: bool,
    ) -> PdsResult<Vec<(Vec<u8>, Vec<u8>)>> {
        scan_with(&mut *self.tx, prefix, start_after, limit, reverse).await
    }

    async fn allocate_seq(&mut self) -> PdsResult<u64> {
        allocate_seq_with(&mut *self.tx).await
    }

    async fn commit(self) -> PdsResult<()> {
        self.tx.commit().await.map_err(|e| {
            if is_conflict_error(&e) {
                PdsError::Conflict(e.to_string())
            } else {
                PdsError::storage(e.to_string())
            }
        })?;
        for key in &self.touched_keys {
            self.store.notify_key(key);
        }
        Ok(())
    }

    async fn rollback(self) -> PdsResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| PdsError::storage(e.to_string()))
    }
}

fn is_conflict_error(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .map(|code| code == "5" || code == "6") // SQLITE_BUSY, SQLITE_LOCKED
        .unwrap_or(false)
}

/// One byte past the end of every key sharing `prefix`, or `None` if
/// `prefix` is all `0xFF` (in which case there is no finite upper bound).
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    for i in (0..upper.len()).rev() {
        if upper[i] != 0xFF {
            upper[i] += 1;
            upper.truncate(i + 1);
            return Some(upper);
        }
    }
    None
}

async fn get_with<'c, E>(executor: E, key: &[u8]) -> PdsResult<Option<Vec<u8>>>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
        .bind(key)
        .fetch_optional(executor)
        .await
        .map_err(|e| PdsError::storage(e.to_string()))?;
    match row {
        Some(r) => Ok(Some(
            r.try_get("value")
                .map_err(|e| PdsError::storage(e.to_string()))?,
        )),
        None => Ok(None),
    }
}

async fn set_with<'c, E>(executor: E, key: &[u8], value: &[u8]) -> PdsResult<()>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO kv (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(executor)
    .await
    .map_err(|e| PdsError::storage(e.to_string()))?;
    Ok(())
}

async fn clear_with<'c, E>(executor: E, key: &[u8]) -> PdsResult<()>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query("DELETE FROM kv WHERE key = ?")
        .bind(key)
        .execute(executor)
        .await
        .map_err(|e| PdsError::storage(e.to_string()))?;
    Ok(())
}

async fn clear_range_with<'c, E>(executor: E, start: &[u8], end: &[u8]) -> PdsResult<()>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query("DELETE FROM kv WHERE key >= ? AND key < ?")
        .bind(start)
        .bind(end)
        .execute(executor)
        .await
        .map_err(|e| PdsError::storage(e.to_string()))?;
    Ok(())
}

async fn scan_with<'c, E>(
    executor: E,
    prefix: &[u8],
    start_after: Option<&[u8]>,
    limit: usize,
    reverse: bool,
) -> PdsResult<Vec<(Vec<u8>, Vec<u8>)>>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let upper = prefix_upper_bound(prefix);

    let mut sql = String::from("SELECT key, value FROM kv WHERE key >= ?");
    if upper.is_some() {
        sql.push_str(" AND key < ?");
    }
    if start_after.is_some() {
        sql.push_str(if reverse { " AND key < ?" } else { " AND key > ?" });
    }
    sql.push_str(if reverse {
        " ORDER BY key DESC LIMIT ?"
    } else {
        " ORDER BY key ASC LIMIT ?"
    });

    let mut query = sqlx::query(&sql).bind(prefix.to_vec());
    if let Some(ref u) = upper {
        query = query.bind(u.clone());
    }
    if let Some(sa) = start_after {
        query = query.bind(sa.to_vec());
    }
    query = query.bind(limit as i64);

    let rows = query
        .fetch_all(executor)
        .await
        .map_err(|e| PdsError::storage(e.to_string()))?;

    rows.into_iter()
        .map(|row| {
            let key: Vec<u8> = row
                .try_get("key")
                .map_err(|e| PdsError::storage(e.to_string()))?;
            let value: Vec<u8> = row
                .try_get("value")
                .map_err(|e| PdsError::storage(e.to_string()))?;
            Ok((key, value))
        })
        .collect()
}

/// Atomically claims the next value of the gapless global sequence counter.
/// Only ever called inside a transaction alongside the event write it
/// numbers, so an abort never burns a sequence number.
async fn allocate_seq_with<'c, E>(executor: E) -> PdsResult<u64>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query(
        "UPDATE seq_counter SET next = next + 1 WHERE id = 0 RETURNING next - 1 AS seq",
    )
    .fetch_one(executor)
    .await
    .map_err(|e| PdsError::storage(e.to_string()))?;
    let seq: i64 = row
        .try_get("seq")
        .map_err(|e| PdsError::storage(e.to_string()))?;
    Ok(seq as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Leaks the tempdir for the duration of the test process; a real file
    /// on disk avoids sqlite's per-connection in-memory-database semantics,
    /// which would otherwise hide tables across pooled connections.
    async fn test_store() -> SqliteStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.into_path().join("test.db");
        SqliteStore::connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn get_set_clear_roundtrip() {
        let store = test_store().await;
        assert_eq!(store.get(b"a").await.unwrap(), None);
        store.set(b"a", b"1").await.unwrap();
        assert_eq!(store.get(b"a").await.unwrap(), Some(b"1".to_vec()));
        store.clear(b"a").await.unwrap();
        assert_eq!(store.get(b"a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_respects_prefix_and_order() {
        let store = test_store().await;
        for (k, v) in [("records/a/1", "x"), ("records/a/2", "y"), ("records/b/1", "z")] {
            store.set(k.as_bytes(), v.as_bytes()).await.unwrap();
        }
        let rows = store
            .scan(b"records/a/", None, 10, false)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, b"records/a/1");
        assert_eq!(rows[1].0, b"records/a/2");
    }

    #[tokio::test]
    async fn scan_start_after_and_reverse() {
        let store = test_store().await;
        for k in ["a", "b", "c"] {
            store.set(k.as_bytes(), b"v").await.unwrap();
        }
        let rows = store.scan(b"", Some(b"a"), 10, false).await.unwrap();
        assert_eq!(rows.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(), vec![b"b".to_vec(), b"c".to_vec()]);

        let rows = store.scan(b"", None, 10, true).await.unwrap();
        assert_eq!(rows[0].0, b"c");
        assert_eq!(rows[2].0, b"a");
    }

    #[tokio::test]
    async fn transaction_commit_is_atomic() {
        let store = test_store().await;
        let mut tx = store.begin_tx().await.unwrap();
        tx.set(b"x", b"1").await.unwrap();
        let seq = tx.allocate_seq().await.unwrap();
        assert_eq!(seq, 0);
        tx.commit().await.unwrap();
        assert_eq!(store.get(b"x").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn transaction_rollback_discards_writes() {
        let store = test_store().await;
        let mut tx = store.begin_tx().await.unwrap();
        tx.set(b"x", b"1").await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(store.get(b"x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn allocate_seq_is_monotonic_and_gapless() {
        let store = test_store().await;
        for expected in 0u64..5 {
            let mut tx = store.begin_tx().await.unwrap();
            let seq = tx.allocate_seq().await.unwrap();
            assert_eq!(seq, expected);
            tx.commit().await.unwrap();
        }
    }

    #[tokio::test]
    async fn watch_resolves_after_set() {
        let store = test_store().await;
        let watch = store.watch(b"k").await.unwrap();
        let store2 = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            store2.set(b"k", b"v").await.unwrap();
        });
        tokio::time::timeout(std::time::Duration::from_secs(1), watch.changed())
            .await
            .expect("watch should resolve after set");
    }
}
