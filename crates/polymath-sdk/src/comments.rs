//! Comments on content items

use crate::content::{ContentRef, ContentType};
use crate::error::{Result, SdkError};
use crate::notify::{Notice, Notifier};
use crate::remote::RemoteStore;
use chrono::{DateTime, Utc};
use polymath_client::{Filter, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

const COMMENTS_TABLE: &str = "content_comments";

/// Longest accepted comment body, in characters
pub const MAX_COMMENT_LEN: usize = 5000;

/// A comment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub user_id: String,
    #[serde(rename = "content")]
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Post and list comments
pub struct CommentService {
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
}

impl CommentService {
    pub fn new(remote: Arc<dyn RemoteStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { remote, notifier }
    }

    /// Add a comment; rejected before any remote call if signed out or empty
    pub async fn add_comment(&self, content: &ContentRef, user_id: Option<&str>, body: &str) -> Result<Comment> {
        let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
            self.notifier.notify(Notice::auth_required("comment"));
            return Err(SdkError::AuthRequired);
        };

        let body = body.trim();
        if body.is_empty() {
            self.notifier
                .notify(Notice::destructive("Empty comment", "Please write something first."));
            return Err(SdkError::Validation("comment is empty".into()));
        }
        if body.chars().count() > MAX_COMMENT_LEN {
            self.notifier.notify(Notice::destructive(
                "Comment too long",
                format!("Comments are limited to {} characters.", MAX_COMMENT_LEN),
            ));
            return Err(SdkError::Validation("comment too long".into()));
        }

        let row = json!({
            "content_id": content.content_id,
            "content_type": content.content_type.as_str(),
            "user_id": user_id,
            "content": body,
        });

        let stored = match self.remote.insert(COMMENTS_TABLE, row).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(key = %content, "failed to add comment: {}", e);
                self.notifier
                    .notify(Notice::destructive("Error", "Failed to post comment. Please try again."));
                return Err(e);
            }
        };

        Ok(serde_json::from_value(stored)?)
    }

    /// Comments on an item, oldest first; an item without comments yields an empty list
    pub async fn list_comments(&self, content: &ContentRef) -> Result<Vec<Comment>> {
        let query = Query::table(COMMENTS_TABLE)
            .filter(Filter::eq("content_id", &content.content_id))
            .filter(Filter::eq("content_type", content.content_type.as_str()))
            .order_by("created_at", true);

        let rows = self.remote.select(&query).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(SdkError::from))
            .collect()
    }
}
