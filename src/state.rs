use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{IdentityResolver, SessionStore};
use crate::config::Config;
use crate::identity::{DynIdentityStore, ProofKey, SqliteIdentityStore};
use crate::posts::{PostService, SqliteContentStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub users: DynIdentityStore,
    pub sessions: SessionStore,
    pub resolver: IdentityResolver,
    pub posts: PostService,
}

impl AppState {
    /// Wire the SQLite stores and services around one pool.
    pub fn new(db: DbPool, config: Config, proofs: ProofKey) -> Self {
        let users: DynIdentityStore = Arc::new(SqliteIdentityStore::new(db.clone()));
        let sessions = SessionStore::new(db.clone(), config.auth.session_hours);
        let resolver = IdentityResolver::new(users.clone(), proofs);
        let posts = PostService::new(Arc::new(SqliteContentStore::new(db.clone())));

        Self {
            db,
            config,
            users,
            sessions,
            resolver,
            posts,
        }
    }
}
