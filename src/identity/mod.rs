pub mod proof;
pub mod repository;

pub use proof::{ExternalProof, ProofKey};
pub use repository::{DynIdentityStore, IdentityStore, SqliteIdentityStore};
