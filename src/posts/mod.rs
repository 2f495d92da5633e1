pub mod repository;
pub mod service;

pub use repository::{ContentStore, DynContentStore, SqliteContentStore};
pub use service::{normalize_tags, DeleteError, PostDraft, PostError, PostService};
