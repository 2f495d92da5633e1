use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage format for timestamps. Fixed-width so that lexical order in
/// SQLite matches chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub handle: Option<String>,
    #[serde(skip_serializing)]
    pub external_proof: Option<String>,
    pub avatar_ref: Option<String>,
    pub member_since: DateTime<Utc>,
}

/// How a user record authenticates. Both kinds share one storage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Account<'a> {
    Local,
    ProviderLinked { proof: &'a str },
}

impl User {
    pub fn account(&self) -> Account<'_> {
        match self.external_proof.as_deref() {
            Some(proof) => Account::ProviderLinked { proof },
            None => Account::Local,
        }
    }

    /// A provider-created user that has not picked a handle yet.
    pub fn is_unclaimed(&self) -> bool {
        self.handle.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub handle: Option<String>,
    pub external_proof: Option<String>,
    pub member_since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author_handle: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub author_handle: String,
    pub created_at: DateTime<Utc>,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostOrder {
    #[default]
    Recent,
    Popular,
}

impl PostOrder {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            PostOrder::Recent => "p.created_at DESC, p.id DESC",
            PostOrder::Popular => "p.like_count DESC, p.id DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_round_trip_with_micros() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 5).unwrap()
            + chrono::Duration::microseconds(1234);
        let raw = format_timestamp(&dt);
        assert_eq!(raw, "2024-01-02 12:00:05.001234");
        assert_eq!(parse_timestamp(&raw).unwrap(), dt);
    }

    #[test]
    fn timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }

    #[test]
    fn parse_accepts_seed_format_without_fraction() {
        let dt = parse_timestamp("2024-01-01 10:00:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn account_view_follows_proof() {
        let mut user = User {
            id: 1,
            handle: Some("alice".into()),
            external_proof: None,
            avatar_ref: None,
            member_since: Utc::now(),
        };
        assert_eq!(user.account(), Account::Local);

        user.external_proof = Some("abc".into());
        assert_eq!(user.account(), Account::ProviderLinked { proof: "abc" });
        assert!(!user.is_unclaimed());

        user.handle = None;
        assert!(user.is_unclaimed());
    }
}
