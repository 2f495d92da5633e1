// Sample data for a fresh install
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeSet;

use crate::db::models::{NewPost, NewUser};
use crate::identity::IdentityStore;
use crate::posts::ContentStore;
use crate::store::StoreError;

struct SampleUser {
    handle: &'static str,
    member_since: (i32, u32, u32, u32),
}

struct SamplePost {
    title: &'static str,
    body: &'static str,
    author: &'static str,
    created_at: (i32, u32, u32, u32),
}

const USERS: &[SampleUser] = &[
    SampleUser {
        handle: "SampleUser",
        member_since: (2024, 1, 1, 8),
    },
    SampleUser {
        handle: "AnotherUser",
        member_since: (2024, 1, 2, 9),
    },
];

const POSTS: &[SamplePost] = &[
    SamplePost {
        title: "Sample Post",
        body: "This is a sample post.",
        author: "SampleUser",
        created_at: (2024, 1, 1, 10),
    },
    SamplePost {
        title: "Another Post",
        body: "This is another sample post.",
        author: "AnotherUser",
        created_at: (2024, 1, 2, 12),
    },
];

fn at((year, month, day, hour): (i32, u32, u32, u32)) -> Result<DateTime<Utc>, StoreError> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("invalid seed date {}-{}-{}", year, month, day)))
}

/// Populate an empty database. Returns false, touching nothing, if any user exists.
pub async fn seed_sample_data(
    users: &dyn IdentityStore,
    posts: &dyn ContentStore,
) -> Result<bool, StoreError> {
    if !users.list_users().await?.is_empty() {
        tracing::info!("Database already has users, skipping seed");
        return Ok(false);
    }

    for user in USERS {
        let id = users
            .insert_user(&NewUser {
                handle: Some(user.handle.to_string()),
                external_proof: None,
                member_since: at(user.member_since)?,
            })
            .await?;
        users
            .update_avatar_ref(id, &format!("/avatar/{}", user.handle))
            .await?;
    }

    for post in POSTS {
        posts
            .insert_post(&NewPost {
                title: post.title.to_string(),
                body: post.body.to_string(),
                author_handle: post.author.to_string(),
                created_at: at(post.created_at)?,
                tags: BTreeSet::new(),
            })
            .await?;
    }

    tracing::info!(
        users = USERS.len(),
        posts = POSTS.len(),
        "Seeded sample data"
    );
    Ok(true)
}
