// Errors shared by the SQLite-backed stores
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Map a UNIQUE / CHECK violation to `Conflict`, leave everything else alone.
    pub(crate) fn from_constraint(err: rusqlite::Error, what: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(what.to_string())
            }
            _ => StoreError::Sql(err),
        }
    }
}

pub(crate) fn timestamp_column(raw: String) -> Result<chrono::DateTime<chrono::Utc>, StoreError> {
    crate::db::models::parse_timestamp(&raw)
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_becomes_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE);").unwrap();
        conn.execute("INSERT INTO t (name) VALUES ('a')", []).unwrap();
        let err = conn
            .execute("INSERT INTO t (name) VALUES ('a')", [])
            .unwrap_err();

        assert!(matches!(
            StoreError::from_constraint(err, "name taken"),
            StoreError::Conflict(msg) if msg == "name taken"
        ));
    }

    #[test]
    fn other_errors_pass_through() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.execute("SELECT * FROM missing", []).unwrap_err();
        assert!(matches!(
            StoreError::from_constraint(err, "unused"),
            StoreError::Sql(_)
        ));
    }

    #[test]
    fn bad_timestamp_is_corrupt() {
        assert!(matches!(
            timestamp_column("yesterday".into()),
            Err(StoreError::Corrupt(_))
        ));
    }
}
