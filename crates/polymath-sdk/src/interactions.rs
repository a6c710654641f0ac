//! Like/bookmark tracking for feed items
//!
//! [`InteractionTracker`] keeps the viewer's liked/bookmarked flags in an
//! [`InteractionStore`] in step with the backend:
//!
//! - [`check_interactions`](InteractionTracker::check_interactions) hydrates
//!   the store for a page of items with one query per interaction table.
//! - [`toggle_like`](InteractionTracker::toggle_like) and
//!   [`toggle_bookmark`](InteractionTracker::toggle_bookmark) flip the flag
//!   optimistically, persist the change, and roll back on failure.
//!
//! At most one toggle per item and kind is in flight; a second call while the
//! first is pending is rejected without touching state or the backend.

use crate::content::{ContentRef, ContentType, InteractionKind};
use crate::counter::CounterRpc;
use crate::error::{Result, SdkError};
use crate::normalize::{normalize_all, FeedRecord};
use crate::notify::{Notice, Notifier};
use crate::remote::RemoteStore;
use crate::store::InteractionStore;
use futures::future::join_all;
use polymath_client::{Filter, Query};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// How denormalized counters on content rows are maintained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterPolicy {
    /// Call the counter RPC after each row mutation. The two writes are not
    /// atomic; a failed RPC leaves the counter off by one and is logged.
    Rpc,
    /// Never touch counters; counts come from the interaction tables.
    #[default]
    Derived,
}

/// Outcome of a successful toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionChange {
    pub kind: InteractionKind,
    /// New state: liked (or bookmarked) after the toggle
    pub active: bool,
    /// Content id
    pub id: String,
}

/// Tracks the viewer's likes and bookmarks across a feed
pub struct InteractionTracker {
    remote: Arc<dyn RemoteStore>,
    store: Arc<InteractionStore>,
    notifier: Arc<dyn Notifier>,
    counters: CounterRpc,
    policy: CounterPolicy,
}

impl InteractionTracker {
    /// Tracker with a fresh store and the default counter policy
    pub fn new(remote: Arc<dyn RemoteStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            counters: CounterRpc::new(remote.clone()),
            remote,
            store: Arc::new(InteractionStore::new()),
            notifier,
            policy: CounterPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CounterPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a store owned by the caller (e.g. one shared by a page's components)
    pub fn with_store(mut self, store: Arc<InteractionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &Arc<InteractionStore> {
        &self.store
    }

    pub fn counters(&self) -> &CounterRpc {
        &self.counters
    }

    pub fn policy(&self) -> CounterPolicy {
        self.policy
    }

    /// Cancel in-flight requests and freeze the store
    pub fn cancel(&self) {
        self.store.cancel();
    }

    // ==================== Hydrate ====================

    /// Load the viewer's like/bookmark flags for `refs`
    ///
    /// Anonymous viewers and empty lists are a no-op. One query is issued per
    /// interaction table. A failed query is logged and leaves its items at
    /// their previous values.
    pub async fn check_interactions(&self, user_id: Option<&str>, refs: &[ContentRef]) {
        let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
            return;
        };
        if refs.is_empty() {
            return;
        }

        let mut groups: BTreeMap<(&'static str, InteractionKind), Vec<&ContentRef>> = BTreeMap::new();
        for content in refs {
            for kind in [InteractionKind::Like, InteractionKind::Bookmark] {
                groups
                    .entry((content.info().table(kind), kind))
                    .or_default()
                    .push(content);
            }
        }

        let lookups = groups
            .iter()
            .map(|((table, _), members)| self.lookup(table, user_id, members));

        let token = self.store.token().clone();
        let results = tokio::select! {
            _ = token.cancelled() => return,
            results = join_all(lookups) => results,
        };

        for (((table, kind), members), result) in groups.iter().zip(results) {
            match result {
                Ok(found) => {
                    for content in members {
                        self.store.set_active(content, *kind, found.contains(&content.key()));
                    }
                }
                Err(e) => warn!(table, %kind, "interaction check failed: {}", e),
            }
        }
    }

    /// Keys (`"<type>:<id>"`) of `members` that have a row in `table` for `user_id`
    async fn lookup(&self, table: &str, user_id: &str, members: &[&ContentRef]) -> Result<HashSet<String>> {
        // Every type sharing a table uses the same id column.
        let id_field = members
            .first()
            .map(|c| c.info().content_id_field)
            .unwrap_or("content_id");

        let ids: BTreeSet<&str> = members.iter().map(|c| c.content_id.as_str()).collect();
        let types: BTreeSet<ContentType> = members.iter().map(|c| c.content_type).collect();

        let query = Query::table(table)
            .select([id_field, "content_type"])
            .filter(Filter::eq("user_id", user_id))
            .filter(Filter::in_list(id_field, ids.iter().copied()))
            .filter(Filter::in_list("content_type", types.iter().map(|t| t.as_str())));

        debug!(table, items = members.len(), "checking interactions");
        let rows = self.remote.select(&query).await?;

        let only_type = (types.len() == 1).then(|| types.iter().next().copied()).flatten();
        Ok(rows
            .iter()
            .filter_map(|row| {
                let id = text(row.get(id_field)?)?;
                let content_type = row
                    .get("content_type")
                    .and_then(Value::as_str)
                    .and_then(|t| t.parse::<ContentType>().ok())
                    .or(only_type)?;
                Some(ContentRef::new(content_type, id).key())
            })
            .collect())
    }

    // ==================== Toggle ====================

    /// Like or unlike an item
    pub async fn toggle_like(&self, content: &ContentRef, user_id: Option<&str>) -> Result<InteractionChange> {
        self.toggle(content, user_id, InteractionKind::Like).await
    }

    /// Bookmark or unbookmark an item
    pub async fn toggle_bookmark(&self, content: &ContentRef, user_id: Option<&str>) -> Result<InteractionChange> {
        self.toggle(content, user_id, InteractionKind::Bookmark).await
    }

    /// Optimistic toggle with rollback
    pub async fn toggle(
        &self,
        content: &ContentRef,
        user_id: Option<&str>,
        kind: InteractionKind,
    ) -> Result<InteractionChange> {
        let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
            self.notifier
                .notify(Notice::auth_required(&format!("{} content", kind)));
            return Err(SdkError::AuthRequired);
        };

        if self.store.is_cancelled() {
            return Err(SdkError::Cancelled);
        }

        let Some(_loading) = self.store.begin(content, kind) else {
            debug!(key = %content, %kind, "toggle already in flight, ignoring");
            return Err(SdkError::InFlight(content.key()));
        };

        let was_active = self.store.get_state(content).get(kind);
        self.store.set_active(content, kind, !was_active);

        let token = self.store.token().clone();
        let result = tokio::select! {
            _ = token.cancelled() => Err(SdkError::Cancelled),
            result = self.persist(content, user_id, kind, was_active) => result,
        };

        match result {
            Ok(()) => Ok(InteractionChange {
                kind,
                active: !was_active,
                id: content.content_id.clone(),
            }),
            Err(SdkError::Cancelled) => Err(SdkError::Cancelled),
            Err(e) => {
                self.store.set_active(content, kind, was_active);
                error!(key = %content, %kind, "toggle failed, reverted: {}", e);
                self.notifier.notify(Notice::destructive(
                    "Error",
                    format!("Failed to update {}. Please try again.", kind),
                ));
                Err(e)
            }
        }
    }

    async fn persist(&self, content: &ContentRef, user_id: &str, kind: InteractionKind, was_active: bool) -> Result<()> {
        let info = content.info();
        let table = info.table(kind);

        if was_active {
            let filters = [
                Filter::eq(info.content_id_field, &content.content_id),
                Filter::eq("user_id", user_id),
                Filter::eq("content_type", content.content_type.as_str()),
            ];
            self.remote.delete(table, &filters).await?;
        } else {
            let row = json!({
                info.content_id_field: content.content_id,
                "user_id": user_id,
                "content_type": content.content_type.as_str(),
            });
            self.remote.insert(table, row).await?;
        }

        if self.policy == CounterPolicy::Rpc {
            let column = info.counter_column(kind);
            let updated = if was_active {
                self.counters.decrement(&content.content_id, column, info.content_table).await
            } else {
                self.counters.increment(&content.content_id, column, info.content_table).await
            };
            if !updated {
                warn!(key = %content, column, "counter drift: row mutated but counter RPC failed");
            }
        }

        Ok(())
    }

    // ==================== Counts ====================

    /// Exact number of viewers who did `kind` on an item
    pub async fn count(&self, content: &ContentRef, kind: InteractionKind) -> Result<u64> {
        let info = content.info();
        let filters = [
            Filter::eq(info.content_id_field, &content.content_id),
            Filter::eq("content_type", content.content_type.as_str()),
        ];
        self.remote.count(info.table(kind), &filters).await
    }

    pub async fn like_count(&self, content: &ContentRef) -> Result<u64> {
        self.count(content, InteractionKind::Like).await
    }

    pub async fn bookmark_count(&self, content: &ContentRef) -> Result<u64> {
        self.count(content, InteractionKind::Bookmark).await
    }

    // ==================== Feed ====================

    /// Fetch the newest items of a type, normalized, with the viewer's flags hydrated
    pub async fn load_feed(
        &self,
        content_type: ContentType,
        user_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<FeedRecord>> {
        let query = Query::table(content_type.info().content_table)
            .order_by("created_at", false)
            .limit(limit);

        let rows = match self.remote.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(%content_type, "feed load failed: {}", e);
                self.notifier.notify(Notice::destructive(
                    "Error",
                    format!("Failed to load {} content.", content_type),
                ));
                return Err(e);
            }
        };

        let records = normalize_all(content_type, &rows);
        let refs: Vec<ContentRef> = records.iter().map(FeedRecord::content_ref).collect();
        self.check_interactions(user_id, &refs).await;
        Ok(records)
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::remote::{MockOp, MockStore};

    fn tracker(mock: &Arc<MockStore>) -> InteractionTracker {
        InteractionTracker::new(mock.clone(), Arc::new(RecordingNotifier::new()))
    }

    #[tokio::test]
    async fn test_quote_like_writes_quote_table() {
        let mock = Arc::new(MockStore::new());
        let t = tracker(&mock);
        let q = ContentRef::new(ContentType::Quote, "q1");

        let change = t.toggle_like(&q, Some("u1")).await.unwrap();
        assert!(change.active);
        assert_eq!(change.id, "q1");

        let rows = mock.rows("quote_likes");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["quote_id"], "q1");
        assert_eq!(rows[0]["user_id"], "u1");
        assert_eq!(rows[0]["content_type"], "quote");
    }

    #[tokio::test]
    async fn test_derived_policy_skips_counter_rpc() {
        let mock = Arc::new(MockStore::new());
        let t = tracker(&mock);

        t.toggle_bookmark(&ContentRef::new(ContentType::Wiki, "w1"), Some("u1"))
            .await
            .unwrap();
        assert_eq!(mock.calls_of(MockOp::Rpc), 0);
        assert_eq!(
            t.bookmark_count(&ContentRef::new(ContentType::Wiki, "w1")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_hydrate_groups_shared_tables() {
        let mock = Arc::new(MockStore::new());
        let t = tracker(&mock);
        let refs = [
            ContentRef::new(ContentType::Forum, "1"),
            ContentRef::new(ContentType::Wiki, "1"),
        ];
        mock.seed(
            "content_likes",
            [json!({"content_id": "1", "user_id": "u1", "content_type": "wiki"})],
        );

        t.check_interactions(Some("u1"), &refs).await;

        // content_likes and content_bookmarks, once each
        assert_eq!(mock.calls_of(MockOp::Select), 2);
        assert!(!t.store().get_state(&refs[0]).is_liked);
        assert!(t.store().get_state(&refs[1]).is_liked);
    }
}
