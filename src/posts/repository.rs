// Content store - posts, like counters and tags
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, ToSql};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::db::models::{format_timestamp, NewPost, Post, PostOrder};
use crate::state::DbPool;
use crate::store::{timestamp_column, StoreError};

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_post(&self, post: &NewPost) -> Result<i64, StoreError>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>, StoreError>;

    /// Every post, fully materialized in the requested order.
    async fn list_posts(&self, order: PostOrder) -> Result<Vec<Post>, StoreError>;

    /// Posts carrying exactly `tag` (case-sensitive), in `order`.
    async fn list_posts_by_tag(&self, tag: &str, order: PostOrder)
        -> Result<Vec<Post>, StoreError>;

    async fn list_posts_by_author(
        &self,
        author_handle: &str,
        order: PostOrder,
    ) -> Result<Vec<Post>, StoreError>;

    /// Add one like in a single statement. `None` when the post does not exist.
    async fn increment_like_atomic(&self, id: i64) -> Result<Option<i64>, StoreError>;

    async fn delete_post(&self, id: i64) -> Result<bool, StoreError>;
}

pub type DynContentStore = Arc<dyn ContentStore>;

/// SQLite implementation
pub struct SqliteContentStore {
    pool: DbPool,
}

impl SqliteContentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Row filter shared by the post query and its tag query.
enum PostFilter<'a> {
    All,
    Id(i64),
    Tag(&'a str),
    Author(&'a str),
}

impl PostFilter<'_> {
    fn clause(&self) -> &'static str {
        match self {
            PostFilter::All => "",
            PostFilter::Id(_) => "WHERE p.id = ?1",
            PostFilter::Tag(_) => {
                "WHERE EXISTS (SELECT 1 FROM post_tags f WHERE f.post_id = p.id AND f.tag = ?1)"
            }
            PostFilter::Author(_) => "WHERE p.author_handle = ?1",
        }
    }

    fn param(&self) -> Option<&dyn ToSql> {
        match self {
            PostFilter::All => None,
            PostFilter::Id(id) => Some(id),
            PostFilter::Tag(tag) => Some(tag),
            PostFilter::Author(handle) => Some(handle),
        }
    }
}

type PostRow = (i64, String, String, String, String, i64);

/// Posts and their tags are read in one transaction so both statements see
/// the same snapshot; a concurrent insert shows up in both or in neither.
fn query_posts(
    conn: &rusqlite::Connection,
    filter: PostFilter<'_>,
    order: PostOrder,
) -> Result<Vec<Post>, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let posts = read_posts(&tx, filter, order)?;
    tx.commit()?;
    Ok(posts)
}

fn read_posts(
    conn: &rusqlite::Connection,
    filter: PostFilter<'_>,
    order: PostOrder,
) -> Result<Vec<Post>, StoreError> {
    let params: Vec<&dyn ToSql> = filter.param().into_iter().collect();

    let mut tags: HashMap<i64, BTreeSet<String>> = HashMap::new();
    {
        let sql = format!(
            "SELECT t.post_id, t.tag FROM post_tags t JOIN posts p ON p.id = t.post_id {}",
            filter.clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (post_id, tag) = row?;
            tags.entry(post_id).or_default().insert(tag);
        }
    }

    let sql = format!(
        "SELECT p.id, p.title, p.body, p.author_handle, p.created_at, p.like_count
         FROM posts p {} ORDER BY {}",
        filter.clause(),
        order.order_by()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?
        .collect::<Result<Vec<PostRow>, _>>()?;

    rows.into_iter()
        .map(|(id, title, body, author_handle, created_at, like_count)| {
            Ok(Post {
                id,
                title,
                body,
                author_handle,
                created_at: timestamp_column(created_at)?,
                like_count,
                tags: tags.remove(&id).unwrap_or_default(),
            })
        })
        .collect()
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn insert_post(&self, post: &NewPost) -> Result<i64, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO posts (title, body, author_handle, created_at, like_count)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![
                post.title,
                post.body,
                post.author_handle,
                format_timestamp(&post.created_at)
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare("INSERT INTO post_tags (post_id, tag) VALUES (?1, ?2)")?;
            for tag in &post.tags {
                stmt.execute(params![id, tag])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, StoreError> {
        let conn = self.pool.get()?;
        Ok(query_posts(&conn, PostFilter::Id(id), PostOrder::Recent)?
            .into_iter()
            .next())
    }

    async fn list_posts(&self, order: PostOrder) -> Result<Vec<Post>, StoreError> {
        let conn = self.pool.get()?;
        query_posts(&conn, PostFilter::All, order)
    }

    async fn list_posts_by_tag(
        &self,
        tag: &str,
        order: PostOrder,
    ) -> Result<Vec<Post>, StoreError> {
        let conn = self.pool.get()?;
        query_posts(&conn, PostFilter::Tag(tag), order)
    }

    async fn list_posts_by_author(
        &self,
        author_handle: &str,
        order: PostOrder,
    ) -> Result<Vec<Post>, StoreError> {
        let conn = self.pool.get()?;
        query_posts(&conn, PostFilter::Author(author_handle), order)
    }

    async fn increment_like_atomic(&self, id: i64) -> Result<Option<i64>, StoreError> {
        let conn = self.pool.get()?;

        let likes = conn
            .query_row(
                "UPDATE posts SET like_count = like_count + 1 WHERE id = ?1 RETURNING like_count",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(likes)
    }

    async fn delete_post(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
