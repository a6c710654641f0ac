//! Canonical record shape for feed items
//!
//! Rows arrive from different tables and views with different spellings for
//! the same thing (`author` / `authorName` / `profiles.username`, `createdAt` /
//! `created_at`, `likes` / `likes_count`). [`normalize`] runs once at the fetch
//! boundary and produces a single [`FeedRecord`]; nothing downstream looks at
//! alternate field names.

use crate::content::{ContentRef, ContentType};
use crate::error::{Result, SdkError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

const TITLE_KEYS: &[&str] = &["title", "name", "question"];
const BODY_KEYS: &[&str] = &["content", "body", "text", "quote", "description", "abstract"];
const AUTHOR_KEYS: &[&str] = &["author", "authorName", "author_name", "username"];
const AUTHOR_ID_KEYS: &[&str] = &["user_id", "author_id", "authorId", "created_by"];
const CREATED_KEYS: &[&str] = &["created_at", "createdAt", "published_at", "inserted_at"];
const LIKES_KEYS: &[&str] = &["likes", "likes_count", "likesCount", "upvotes"];
const BOOKMARKS_KEYS: &[&str] = &["bookmarks", "bookmarks_count", "bookmarksCount"];
const COMMENTS_KEYS: &[&str] = &["comments_count", "comment_count", "commentsCount", "comments"];
const VIEWS_KEYS: &[&str] = &["views", "view_count", "views_count"];

/// One feed item in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub id: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    pub body: Option<String>,
    pub author: Option<String>,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub likes: u64,
    pub bookmarks: u64,
    pub comments: u64,
    pub views: u64,
    pub tags: Vec<String>,
}

impl FeedRecord {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef::new(self.content_type, self.id.clone())
    }
}

/// Normalize one remote row
pub fn normalize(content_type: ContentType, row: &Value) -> Result<FeedRecord> {
    let obj = row
        .as_object()
        .ok_or_else(|| SdkError::Serialization(format!("expected an object row, got {}", row)))?;

    let id = obj
        .get("id")
        .and_then(scalar_text)
        .ok_or_else(|| SdkError::Serialization("row without id".into()))?;

    Ok(FeedRecord {
        id,
        content_type,
        title: first_text(obj, TITLE_KEYS),
        body: first_text(obj, BODY_KEYS),
        author: author_name(obj),
        author_id: first_text(obj, AUTHOR_ID_KEYS),
        created_at: CREATED_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(parse_timestamp)),
        likes: first_count(obj, LIKES_KEYS),
        bookmarks: first_count(obj, BOOKMARKS_KEYS),
        comments: first_count(obj, COMMENTS_KEYS),
        views: first_count(obj, VIEWS_KEYS),
        tags: obj
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(scalar_text).collect())
            .unwrap_or_default(),
    })
}

/// Normalize a page of rows, skipping (and logging) malformed ones
pub fn normalize_all(content_type: ContentType, rows: &[Value]) -> Vec<FeedRecord> {
    rows.iter()
        .filter_map(|row| match normalize(content_type, row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%content_type, "dropping malformed row: {}", e);
                None
            }
        })
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(scalar_text))
}

fn count_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        // An embedded `comments(count)` select comes back as `[{"count": n}]`
        Value::Array(items) => items
            .first()
            .and_then(|first| first.get("count"))
            .and_then(count_of)
            .or(Some(items.len() as u64)),
        _ => None,
    }
}

fn first_count(obj: &Map<String, Value>, keys: &[&str]) -> u64 {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(count_of))
        .unwrap_or(0)
}

/// Author display name, from a flat field or an embedded profile
fn author_name(obj: &Map<String, Value>) -> Option<String> {
    for key in AUTHOR_KEYS {
        match obj.get(*key) {
            Some(Value::Object(profile)) => {
                if let Some(name) = first_text(profile, &["username", "full_name", "name"]) {
                    return Some(name);
                }
            }
            Some(other) => {
                if let Some(name) = scalar_text(other) {
                    return Some(name);
                }
            }
            None => {}
        }
    }

    ["profiles", "profile"].iter().find_map(|k| match obj.get(*k) {
        Some(Value::Object(profile)) => first_text(profile, &["username", "full_name", "name"]),
        _ => None,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z")
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            })
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
                    .ok()
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
