use tempfile::TempDir;

use haven_store_sqlite::SqliteStore;

/// A fresh `SqliteStore` backed by a tempdir-scoped sqlite file.
///
/// Holds the `TempDir` alive for the test's duration; the database is
/// deleted when this value drops.
pub struct TestStore {
    pub store: SqliteStore,
    pub url: String,
    _tempdir: TempDir,
}

/// Create a fresh, empty `SqliteStore` for one test.
pub async fn create_test_store() -> TestStore {
    let tempdir = TempDir::new().expect("failed to create tempdir");
    let db_path = tempdir.path().join("test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = SqliteStore::connect(&url)
        .await
        .expect("failed to connect sqlite store");

    TestStore {
        store,
        url,
        _tempdir: tempdir,
    }
}
