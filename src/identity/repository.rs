// Identity store - every read and write of user records goes through here
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::db::models::{format_timestamp, NewUser, User};
use crate::identity::proof::ExternalProof;
use crate::state::DbPool;
use crate::store::{timestamp_column, StoreError};

const USER_COLUMNS: &str = "id, handle, external_proof, avatar_ref, member_since";

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a user, returning its id. A taken handle or proof is `Conflict`.
    async fn insert_user(&self, user: &NewUser) -> Result<i64, StoreError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError>;

    /// Look up the user owning `proof`, creating an unclaimed one if none exists.
    /// Returns the user and whether it was created by this call.
    async fn find_or_create_by_proof(
        &self,
        proof: &ExternalProof,
        member_since: chrono::DateTime<chrono::Utc>,
    ) -> Result<(User, bool), StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Assign a handle to an unclaimed user. Returns false when the user is
    /// missing or already has a handle; a taken handle is `Conflict`.
    async fn update_handle(&self, id: i64, handle: &str) -> Result<bool, StoreError>;

    async fn update_avatar_ref(&self, id: i64, avatar_ref: &str) -> Result<bool, StoreError>;
}

pub type DynIdentityStore = Arc<dyn IdentityStore>;

/// SQLite implementation
pub struct SqliteIdentityStore {
    pool: DbPool,
}

impl SqliteIdentityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

type UserRow = (i64, Option<String>, Option<String>, Option<String>, String);

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_user((id, handle, external_proof, avatar_ref, member_since): UserRow) -> Result<User, StoreError> {
    Ok(User {
        id,
        handle,
        external_proof,
        avatar_ref,
        member_since: timestamp_column(member_since)?,
    })
}

fn query_one(
    conn: &rusqlite::Connection,
    filter: &str,
    param: &dyn rusqlite::ToSql,
) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, filter);
    conn.query_row(&sql, [param], user_row)
        .optional()?
        .map(into_user)
        .transpose()
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn insert_user(&self, user: &NewUser) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO users (handle, external_proof, member_since) VALUES (?1, ?2, ?3)",
            params![
                user.handle,
                user.external_proof,
                format_timestamp(&user.member_since)
            ],
        )
        .map_err(|e| StoreError::from_constraint(e, "handle or provider account already exists"))?;

        Ok(conn.last_insert_rowid())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;
        query_one(&conn, "id", &id)
    }

    async fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;
        query_one(&conn, "handle", &handle)
    }

    async fn find_or_create_by_proof(
        &self,
        proof: &ExternalProof,
        member_since: chrono::DateTime<chrono::Utc>,
    ) -> Result<(User, bool), StoreError> {
        let conn = self.pool.get()?;

        // Take the write lock up front so two logins for the same subject
        // cannot both miss the lookup and insert twice.
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<(User, bool), StoreError> = (|| {
            if let Some(user) = query_one(&conn, "external_proof", &proof.as_str())? {
                return Ok((user, false));
            }

            conn.execute(
                "INSERT INTO users (handle, external_proof, member_since) VALUES (NULL, ?1, ?2)",
                params![proof.as_str(), format_timestamp(&member_since)],
            )?;
            let id = conn.last_insert_rowid();

            let user = query_one(&conn, "id", &id)?
                .ok_or_else(|| StoreError::Corrupt(format!("user {} vanished after insert", id)))?;
            Ok((user, true))
        })();

        match result {
            Ok(found) => {
                conn.execute("COMMIT", [])?;
                Ok(found)
            }
            Err(e) => {
                conn.execute("ROLLBACK", [])?;
                Err(e)
            }
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.pool.get()?;

        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], user_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_user).collect()
    }

    async fn update_handle(&self, id: i64, handle: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;

        let rows = conn
            .execute(
                "UPDATE users SET handle = ?1 WHERE id = ?2 AND handle IS NULL",
                params![handle, id],
            )
            .map_err(|e| StoreError::from_constraint(e, "handle already taken"))?;

        Ok(rows > 0)
    }

    async fn update_avatar_ref(&self, id: i64, avatar_ref: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE users SET avatar_ref = ?1 WHERE id = ?2",
            params![avatar_ref, id],
        )?;

        Ok(rows > 0)
    }
}
