pub mod models;
pub mod seed;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::HashSet;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_sessions",
        include_str!("../../migrations/002_sessions.sql"),
    ),
];

const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

/// Open (creating if needed) the database file and its parent directories.
pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection settings; WAL below is stored in the file itself
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(8).build(manager)?;

    pool.get()?
        .execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;

    Ok(pool)
}

/// Apply pending migrations in order. Each one commits together with its
/// `schema_version` row, so a failed migration leaves no trace.
pub fn run_migrations(pool: &DbPool) -> anyhow::Result<usize> {
    let mut conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: HashSet<String> = conn
        .prepare("SELECT name FROM schema_version")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    let mut count = 0;
    for (name, sql) in MIGRATIONS.iter().filter(|(name, _)| !applied.contains(*name)) {
        tracing::info!(migration = name, "Applying migration");
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (name) VALUES (?1)", params![name])?;
        tx.commit()?;
        count += 1;
    }

    tracing::info!(applied = count, "Database migrations complete");
    Ok(count)
}

/// Single-connection in-memory pool with migrations applied.
#[cfg(test)]
pub(crate) fn test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    run_migrations(&pool).unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_pool_uses_wal_and_foreign_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        let fks: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fks, 1);
    }

    fn applied_count(pool: &DbPool) -> i64 {
        pool.get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn migrations_create_schema() {
        let pool = test_pool();
        assert_eq!(applied_count(&pool), MIGRATIONS.len() as i64);

        let conn = pool.get().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for table in ["post_tags", "posts", "sessions", "users"] {
            assert!(tables.iter().any(|t| t == table), "missing {}", table);
        }
    }

    #[test]
    fn rerunning_migrations_applies_nothing() {
        let pool = test_pool();
        assert_eq!(run_migrations(&pool).unwrap(), 0);
        assert_eq!(applied_count(&pool), MIGRATIONS.len() as i64);
    }

    #[test]
    fn handle_is_unique_but_unclaimed_rows_coexist() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let insert = "INSERT INTO users (handle, member_since) VALUES (?1, '2024-01-01 00:00:00')";

        conn.execute(insert, params![None::<String>]).unwrap();
        conn.execute(insert, params![None::<String>]).unwrap();
        conn.execute(insert, params!["alice"]).unwrap();
        assert!(conn.execute(insert, params!["alice"]).is_err());
    }

    #[test]
    fn like_count_cannot_go_negative() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (title, body, author_handle, created_at, like_count)
             VALUES ('t', 'b', 'alice', '2024-01-01 00:00:00', -1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn deleting_post_cascades_to_tags() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO posts (title, body, author_handle, created_at)
             VALUES ('t', 'b', 'alice', '2024-01-01 00:00:00')",
            [],
        )
        .unwrap();
        let post_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO post_tags (post_id, tag) VALUES (?1, 'rust')",
            params![post_id],
        )
        .unwrap();

        conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])
            .unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
