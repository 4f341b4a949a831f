// tests/clone_db_test.rs
use std::path::Path;

use relkit::db::{clone_db, local_test_sqlite};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use tempfile::TempDir;

async fn connect(path: &Path) -> SqliteConnection {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqliteConnection::connect_with(&options).await.unwrap()
}

async fn seed_source(path: &Path) {
    let mut conn = connect(path).await;
    sqlx::query("CREATE TABLE core_user (id INTEGER PRIMARY KEY, handle TEXT NOT NULL)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE core_run (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES core_user(id))",
    )
    .execute(&mut conn)
    .await
    .unwrap();

    for id in 1..=25 {
        sqlx::query("INSERT INTO core_user (id, handle) VALUES (?, ?)")
            .bind(id)
            .bind(format!("user{}", id))
            .execute(&mut conn)
            .await
            .unwrap();
    }
    for id in 1..=3 {
        // runs point at users that are not copied
        sqlx::query("INSERT INTO core_run (id, user_id) VALUES (?, ?)")
            .bind(id)
            .bind(id)
            .execute(&mut conn)
            .await
            .unwrap();
    }
    conn.close().await.unwrap();
}

fn url(path: &Path) -> String {
    format!("sqlite:///{}", path.display())
}

#[tokio::test]
async fn test_clone_sqlite_keeps_last_rows() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.db");
    let target = dir.path().join("target.db");
    seed_source(&source).await;

    let report = clone_db(&url(&source), &url(&target), 10).await.unwrap();

    assert_eq!(report.tables.len(), 2);
    assert_eq!(report.rows_copied(), 13);
    let users = report
        .tables
        .iter()
        .find(|t| t.table == "core_user")
        .unwrap();
    assert_eq!((users.copied, users.total), (10, 25));

    let mut conn = connect(&target).await;
    let (count, min_id): (i64, i64) = sqlx::query_as("SELECT count(*), min(id) FROM core_user")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(count, 10);
    assert_eq!(min_id, 16);

    let runs: i64 = sqlx::query_scalar("SELECT count(*) FROM core_run")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(runs, 3);
}

#[tokio::test]
async fn test_clone_into_local_test_sqlite() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("lamin.db");
    seed_source(&source).await;

    let test_db = local_test_sqlite(&source, dir.path()).unwrap();
    assert_eq!(test_db.file, dir.path().join("lamin_test").join("lamin_test.db"));

    let report = clone_db(&url(&source), &test_db.url, 100).await.unwrap();
    assert_eq!(report.rows_copied(), 28);
    assert!(test_db.file.exists());
}

#[tokio::test]
async fn test_missing_source_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = clone_db(
        &url(&dir.path().join("missing.db")),
        &url(&dir.path().join("target.db")),
        10,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}
