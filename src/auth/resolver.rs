use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::auth::session::Session;
use crate::db::models::{Account, NewUser, User};
use crate::identity::{DynIdentityStore, ProofKey};
use crate::store::StoreError;

/// A fully resolved, logged-in user with a claimed handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub handle: String,
    pub avatar_ref: Option<String>,
    pub member_since: DateTime<Utc>,
    /// Signs in through the identity provider rather than by handle alone.
    pub provider_linked: bool,
}

impl CurrentUser {
    /// `None` for unclaimed users, which cannot act under a handle yet.
    pub fn from_user(user: User) -> Option<Self> {
        let provider_linked = matches!(user.account(), Account::ProviderLinked { .. });
        Some(Self {
            id: user.id,
            handle: user.handle?,
            avatar_ref: user.avatar_ref,
            member_since: user.member_since,
            provider_linked,
        })
    }
}

/// Claims handed over by the external identity provider after its own
/// token exchange has succeeded.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub subject: String,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login required")]
    Unauthenticated,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Handle is required")]
    HandleRequired,

    #[error("Handle not registered")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("Handle is required")]
    HandleRequired,

    #[error("Handle already taken")]
    HandleTaken,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RegisterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => RegisterError::HandleTaken,
            other => RegisterError::Store(other),
        }
    }
}

/// Turns session state into users, for both the local-handle and the
/// provider-backed login paths.
#[derive(Clone)]
pub struct IdentityResolver {
    users: DynIdentityStore,
    proofs: ProofKey,
}

impl IdentityResolver {
    pub fn new(users: DynIdentityStore, proofs: ProofKey) -> Self {
        Self { users, proofs }
    }

    /// The logged-in user behind `session`, if any. Dangling ids resolve to
    /// `None`; only store failures are errors.
    pub async fn resolve_current_user(
        &self,
        session: &Session,
    ) -> Result<Option<CurrentUser>, StoreError> {
        let Some(user_id) = session.user_id() else {
            return Ok(None);
        };
        if !session.logged_in() {
            return Ok(None);
        }

        Ok(self
            .users
            .get_user(user_id)
            .await?
            .and_then(CurrentUser::from_user))
    }

    pub async fn require_authenticated(&self, session: &Session) -> Result<CurrentUser, AuthError> {
        self.resolve_current_user(session)
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    pub async fn login_local(
        &self,
        session: &mut Session,
        handle: &str,
    ) -> Result<CurrentUser, LoginError> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(LoginError::HandleRequired);
        }

        let user = self
            .users
            .get_user_by_handle(handle)
            .await?
            .and_then(CurrentUser::from_user)
            .ok_or(LoginError::NotFound)?;

        session.authenticate(user.id);
        tracing::info!(user_id = user.id, handle = %user.handle, "Local login");
        Ok(user)
    }

    /// Resolve a provider login. Known subjects with a handle are logged in;
    /// anything else leaves the session pending on an unclaimed user until
    /// [`register_local_handle`](Self::register_local_handle) runs.
    pub async fn login_or_register_via_provider(
        &self,
        session: &mut Session,
        identity: &ProviderIdentity,
    ) -> Result<User, StoreError> {
        let proof = self.proofs.prove(&identity.subject);
        let (user, created) = self
            .users
            .find_or_create_by_proof(&proof, Utc::now().trunc_subsecs(6))
            .await?;

        if user.is_unclaimed() {
            session.hold_pending(user.id);
            tracing::info!(
                user_id = user.id,
                created,
                email = ?identity.email,
                "Provider login pending handle"
            );
        } else {
            session.authenticate(user.id);
            tracing::info!(user_id = user.id, email = ?identity.email, "Provider login");
        }
        Ok(user)
    }

    /// Give the session a handle: claims it on the pending provider user if
    /// there is one, otherwise creates a fresh local user.
    pub async fn register_local_handle(
        &self,
        session: &mut Session,
        handle: &str,
    ) -> Result<CurrentUser, RegisterError> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(RegisterError::HandleRequired);
        }
        if self.users.get_user_by_handle(handle).await?.is_some() {
            return Err(RegisterError::HandleTaken);
        }

        let pending = match session.user_id() {
            Some(id) => self
                .users
                .get_user(id)
                .await?
                .filter(User::is_unclaimed),
            None => None,
        };

        // The UNIQUE constraint turns a lost race on the handle into HandleTaken
        let mut claimed = None;
        if let Some(user) = pending {
            if self.users.update_handle(user.id, handle).await? {
                claimed = Some(user.id);
            }
        }
        let user_id = match claimed {
            Some(id) => id,
            None => {
                self.users
                    .insert_user(&NewUser {
                        handle: Some(handle.to_string()),
                        external_proof: None,
                        member_since: Utc::now().trunc_subsecs(6),
                    })
                    .await?
            }
        };

        if handle.starts_with(|c: char| c.is_ascii_alphabetic()) {
            self.users
                .update_avatar_ref(user_id, &format!("/avatar/{}", handle))
                .await?;
        }

        let user = self
            .users
            .get_user(user_id)
            .await?
            .and_then(CurrentUser::from_user)
            .ok_or_else(|| {
                RegisterError::Store(StoreError::Corrupt(format!(
                    "user {} missing after registration",
                    user_id
                )))
            })?;

        session.authenticate(user.id);
        tracing::info!(
            user_id = user.id,
            handle = %user.handle,
            provider_linked = claimed.is_some(),
            "Registered handle"
        );
        Ok(user)
    }

    pub fn logout(&self, session: &mut Session) {
        if let Some(user_id) = session.user_id() {
            tracing::info!(user_id, "Logout");
        }
        session.destroy();
    }
}
