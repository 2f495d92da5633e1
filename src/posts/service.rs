use std::collections::BTreeSet;

use chrono::{SubsecRound, Utc};
use thiserror::Error;

use crate::auth::CurrentUser;
use crate::db::models::{NewPost, Post, PostOrder};
use crate::posts::repository::DynContentStore;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Post not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Login required")]
    Unauthenticated,

    #[error("Post not found")]
    NotFound,

    #[error("Only the author can delete this post")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Input for a new post, as submitted by the author.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// Trim tags, drop blanks, collapse duplicates. Case is preserved.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Create, rank, like and delete posts on top of a [`ContentStore`].
///
/// [`ContentStore`]: crate::posts::repository::ContentStore
#[derive(Clone)]
pub struct PostService {
    store: DynContentStore,
}

impl PostService {
    pub fn new(store: DynContentStore) -> Self {
        Self { store }
    }

    pub async fn list_recent(&self) -> Result<Vec<Post>, PostError> {
        Ok(self.store.list_posts(PostOrder::Recent).await?)
    }

    pub async fn list_popular(&self) -> Result<Vec<Post>, PostError> {
        Ok(self.store.list_posts(PostOrder::Popular).await?)
    }

    pub async fn list_by_tag(&self, tag: &str) -> Result<Vec<Post>, PostError> {
        Ok(self.store.list_posts_by_tag(tag, PostOrder::Recent).await?)
    }

    /// Profile feed: the author's own posts, newest first.
    pub async fn list_by_author(&self, author_handle: &str) -> Result<Vec<Post>, PostError> {
        Ok(self
            .store
            .list_posts_by_author(author_handle, PostOrder::Recent)
            .await?)
    }

    pub async fn get(&self, id: i64) -> Result<Post, PostError> {
        self.store.get_post(id).await?.ok_or(PostError::NotFound)
    }

    pub async fn create(&self, draft: PostDraft, author: &CurrentUser) -> Result<Post, PostError> {
        let title = draft.title.trim();
        let body = draft.body.trim();
        if title.is_empty() {
            return Err(PostError::Validation("Title is required"));
        }
        if body.is_empty() {
            return Err(PostError::Validation("Body is required"));
        }

        let new_post = NewPost {
            title: title.to_string(),
            body: body.to_string(),
            author_handle: author.handle.clone(),
            // Stored at microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
            tags: normalize_tags(&draft.tags),
        };
        let id = self.store.insert_post(&new_post).await?;
        tracing::info!(post_id = id, author = %author.handle, "Created post");

        Ok(Post {
            id,
            title: new_post.title,
            body: new_post.body,
            author_handle: new_post.author_handle,
            created_at: new_post.created_at,
            like_count: 0,
            tags: new_post.tags,
        })
    }

    pub async fn increment_like(&self, id: i64) -> Result<i64, PostError> {
        self.store
            .increment_like_atomic(id)
            .await?
            .ok_or(PostError::NotFound)
    }

    /// Delete a post on behalf of its author. Checks run in a fixed order:
    /// no requester, then missing post, then wrong owner.
    pub async fn delete_owned(
        &self,
        id: i64,
        requester: Option<&CurrentUser>,
    ) -> Result<(), DeleteError> {
        let requester = requester.ok_or(DeleteError::Unauthenticated)?;
        let post = self.store.get_post(id).await?.ok_or(DeleteError::NotFound)?;

        if post.author_handle != requester.handle {
            tracing::warn!(
                post_id = id,
                requester = %requester.handle,
                "Refused delete of another user's post"
            );
            return Err(DeleteError::Forbidden);
        }

        // Gone between the lookup and the delete
        if !self.store.delete_post(id).await? {
            return Err(DeleteError::NotFound);
        }
        tracing::info!(post_id = id, author = %requester.handle, "Deleted post");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::posts::repository::SqliteContentStore;
    use std::sync::Arc;

    fn service() -> PostService {
        PostService::new(Arc::new(SqliteContentStore::new(db::test_pool())))
    }

    fn user(id: i64, handle: &str) -> CurrentUser {
        CurrentUser {
            id,
            handle: handle.to_string(),
            avatar_ref: None,
            member_since: Utc::now(),
            provider_linked: false,
        }
    }

    fn draft(title: &str, body: &str, tags: &[&str]) -> PostDraft {
        PostDraft {
            title: title.to_string(),
            body: body.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn normalize_tags_trims_and_dedupes() {
        let tags = normalize_tags([" rust", "rust ", "", "  ", "Rust"]);
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec!["Rust".to_string(), "rust".to_string()]
        );
    }

    #[tokio::test]
    async fn create_then_list_recent() {
        let posts = service();
        let alice = user(1, "alice");
        let created = posts
            .create(draft("Hello", "World", &["greeting", "greeting"]), &alice)
            .await
            .unwrap();

        let listed = posts.list_recent().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], created);
        assert_eq!(listed[0].like_count, 0);
        assert_eq!(listed[0].author_handle, "alice");
        assert_eq!(listed[0].tags.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_blank_title_or_body() {
        let posts = service();
        let alice = user(1, "alice");

        let err = posts.create(draft("  ", "body", &[]), &alice).await.unwrap_err();
        assert!(matches!(err, PostError::Validation("Title is required")));

        let err = posts.create(draft("title", "", &[]), &alice).await.unwrap_err();
        assert!(matches!(err, PostError::Validation("Body is required")));

        assert!(posts.list_recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn like_missing_post_is_not_found() {
        let err = service().increment_like(404).await.unwrap_err();
        assert!(matches!(err, PostError::NotFound));
    }

    #[tokio::test]
    async fn popular_breaks_ties_by_newest_id() {
        let posts = service();
        let alice = user(1, "alice");
        let first = posts.create(draft("first", "b", &[]), &alice).await.unwrap();
        let second = posts.create(draft("second", "b", &[]), &alice).await.unwrap();
        let third = posts.create(draft("third", "b", &[]), &alice).await.unwrap();
        posts.increment_like(first.id).await.unwrap();
        posts.increment_like(third.id).await.unwrap();

        let ids: Vec<i64> = posts
            .list_popular()
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![third.id, first.id, second.id]);
    }

    #[tokio::test]
    async fn list_by_tag_uses_recent_order() {
        let posts = service();
        let alice = user(1, "alice");
        let a = posts.create(draft("a", "b", &["news"]), &alice).await.unwrap();
        posts.create(draft("b", "b", &["News"]), &alice).await.unwrap();
        let c = posts.create(draft("c", "b", &["news", "x"]), &alice).await.unwrap();

        let ids: Vec<i64> = posts
            .list_by_tag("news")
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![c.id, a.id]);
    }

    #[tokio::test]
    async fn delete_checks_run_in_order() {
        let posts = service();
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        let post = posts.create(draft("t", "b", &[]), &alice).await.unwrap();

        // No requester wins even for a missing post
        assert!(matches!(
            posts.delete_owned(999, None).await,
            Err(DeleteError::Unauthenticated)
        ));
        assert!(matches!(
            posts.delete_owned(999, Some(&bob)).await,
            Err(DeleteError::NotFound)
        ));
        assert!(matches!(
            posts.delete_owned(post.id, Some(&bob)).await,
            Err(DeleteError::Forbidden)
        ));
        assert_eq!(posts.list_recent().await.unwrap().len(), 1);

        posts.delete_owned(post.id, Some(&alice)).await.unwrap();
        assert!(posts.list_recent().await.unwrap().is_empty());
        assert!(matches!(
            posts.delete_owned(post.id, Some(&alice)).await,
            Err(DeleteError::NotFound)
        ));
    }

    #[tokio::test]
    async fn hello_world_scenario() {
        let posts = service();
        let alice = user(1, "alice");
        let bob = user(2, "bob");

        let post = posts.create(draft("Hello", "World", &[]), &alice).await.unwrap();
        let recent = posts.list_recent().await.unwrap();
        assert_eq!(recent[0].title, "Hello");
        assert_eq!(recent[0].like_count, 0);

        assert_eq!(posts.increment_like(post.id).await.unwrap(), 1);
        assert!(matches!(
            posts.delete_owned(post.id, Some(&bob)).await,
            Err(DeleteError::Forbidden)
        ));
        posts.delete_owned(post.id, Some(&alice)).await.unwrap();
        assert!(posts
            .list_recent()
            .await
            .unwrap()
            .iter()
            .all(|p| p.id != post.id));
    }
}
