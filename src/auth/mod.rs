pub mod resolver;
pub mod session;

pub use resolver::{
    AuthError, CurrentUser, IdentityResolver, LoginError, ProviderIdentity, RegisterError,
};
pub use session::{Session, SessionStore};
