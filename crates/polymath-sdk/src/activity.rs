//! User activity feed
//!
//! Activity rows are a side record of what a user did. Writing one never
//! fails the action that triggered it.

use crate::content::ContentRef;
use crate::error::{Result, SdkError};
use crate::remote::RemoteStore;
use chrono::{DateTime, Utc};
use polymath_client::{Filter, Query};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

const ACTIVITIES_TABLE: &str = "user_activities";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Like,
    Bookmark,
    Comment,
    Post,
    View,
    Message,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Bookmark => "bookmark",
            Self::Comment => "comment",
            Self::Post => "post",
            Self::View => "view",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ActivityLog {
    remote: Arc<dyn RemoteStore>,
}

impl ActivityLog {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Record an activity; returns whether the row was written
    pub async fn record(
        &self,
        user_id: &str,
        activity_type: ActivityType,
        content: Option<&ContentRef>,
        metadata: Value,
    ) -> bool {
        let row = json!({
            "user_id": user_id,
            "activity_type": activity_type.as_str(),
            "content_id": content.map(|c| c.content_id.as_str()),
            "content_type": content.map(|c| c.content_type.as_str()),
            "metadata": metadata,
        });

        match self.remote.insert(ACTIVITIES_TABLE, row).await {
            Ok(_) => true,
            Err(e) => {
                warn!(user_id, %activity_type, "failed to record activity: {}", e);
                false
            }
        }
    }

    /// Most recent activities for a user, newest first
    pub async fn recent(&self, user_id: &str, limit: u32) -> Result<Vec<Activity>> {
        let query = Query::table(ACTIVITIES_TABLE)
            .filter(Filter::eq("user_id", user_id))
            .order_by("created_at", false)
            .limit(limit);

        self.remote
            .select(&query)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(SdkError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentType;
    use crate::remote::{MockOp, MockStore};

    #[tokio::test]
    async fn test_record_and_recent() {
        let mock = Arc::new(MockStore::new());
        let log = ActivityLog::new(mock.clone());
        let quote = ContentRef::new(ContentType::Quote, "q1");

        assert!(log.record("u1", ActivityType::Like, Some(&quote), json!({})).await);
        assert!(log.record("u2", ActivityType::Post, None, json!({"title": "hi"})).await);

        let recent = log.recent("u1", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].activity_type, ActivityType::Like);
        assert_eq!(recent[0].content_type.as_deref(), Some("quote"));
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let mock = Arc::new(MockStore::new());
        mock.fail(MockOp::Insert, ACTIVITIES_TABLE);
        let log = ActivityLog::new(mock);

        assert!(!log.record("u1", ActivityType::View, None, Value::Null).await);
    }
}
