use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::state::DbPool;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Lifecycle {
    #[default]
    Clean,
    Dirty,
    Destroyed,
}

/// Per-client session state. Only `user_id` and `logged_in` are ever read
/// or written; the token is an opaque handle owned by [`SessionStore`].
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<String>,
    user_id: Option<i64>,
    logged_in: bool,
    lifecycle: Lifecycle,
}

impl Session {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    /// Point the session at a user and mark it authenticated.
    pub fn authenticate(&mut self, user_id: i64) {
        self.user_id = Some(user_id);
        self.logged_in = true;
        self.lifecycle = Lifecycle::Dirty;
    }

    /// Point the session at a user that still has to finish registration.
    pub fn hold_pending(&mut self, user_id: i64) {
        self.user_id = Some(user_id);
        self.logged_in = false;
        self.lifecycle = Lifecycle::Dirty;
    }

    pub fn destroy(&mut self) {
        self.user_id = None;
        self.logged_in = false;
        self.lifecycle = Lifecycle::Destroyed;
    }

    pub fn is_dirty(&self) -> bool {
        self.lifecycle == Lifecycle::Dirty
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }
}

/// SQLite-backed session storage. Rows are created on the first write and
/// expire `ttl_hours` after the last one.
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
    ttl_hours: u64,
}

impl SessionStore {
    pub fn new(pool: DbPool, ttl_hours: u64) -> Self {
        Self { pool, ttl_hours }
    }

    /// Load a live session by token. Unknown or expired tokens give `None`.
    pub async fn load(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let conn = self.pool.get()?;

        let row = conn
            .query_row(
                "SELECT user_id, logged_in FROM sessions
                 WHERE token = ?1 AND expires_at > datetime('now')",
                params![token],
                |row| Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(user_id, logged_in)| Session {
            token: Some(token.to_string()),
            user_id,
            logged_in,
            lifecycle: Lifecycle::Clean,
        }))
    }

    /// Persist the session, minting a token on first save. Returns the token.
    pub async fn save(&self, session: &mut Session) -> Result<String, StoreError> {
        let conn = self.pool.get()?;
        let lifetime = format!("+{} hours", self.ttl_hours);

        let token = match &session.token {
            Some(token) => {
                conn.execute(
                    "UPDATE sessions SET user_id = ?1, logged_in = ?2, expires_at = datetime('now', ?3)
                     WHERE token = ?4",
                    params![session.user_id, session.logged_in, lifetime, token],
                )?;
                token.clone()
            }
            None => {
                let token = generate_token();
                let id = uuid::Uuid::now_v7().to_string();
                conn.execute(
                    "INSERT INTO sessions (id, token, user_id, logged_in, expires_at)
                     VALUES (?1, ?2, ?3, ?4, datetime('now', ?5))",
                    params![id, token, session.user_id, session.logged_in, lifetime],
                )?;
                token
            }
        };

        session.token = Some(token.clone());
        session.lifecycle = Lifecycle::Clean;
        Ok(token)
    }

    /// Delete a session by token.
    pub async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// Drop every expired session, returning how many went away.
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= datetime('now')",
            [],
        )?;
        Ok(rows)
    }
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
