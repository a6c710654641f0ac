//! Realtime subscription registry
//!
//! Callbacks register against a table and an optional change kind. A single
//! pump drains a change stream (normally a [`RealtimeConnection`]) and fans
//! each event out to the matching callbacks until cancelled.

use dashmap::DashMap;
use futures::{Stream, StreamExt};
use polymath_client::{ChangeEvent, ChangeKind, RealtimeConnection};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Callback invoked for each matching change
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle returned by [`RealtimeManager::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    table: String,
    /// `None` matches every kind
    kind: Option<ChangeKind>,
    callback: ChangeCallback,
}

impl Subscription {
    fn matches(&self, event: &ChangeEvent) -> bool {
        self.table == event.table && self.kind.map_or(true, |k| k == event.kind)
    }
}

pub struct RealtimeManager {
    subscriptions: DashMap<u64, Subscription>,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

impl Default for RealtimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeManager {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            cancel,
        }
    }

    pub fn subscribe<F>(&self, table: impl Into<String>, kind: Option<ChangeKind>, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let table = table.into();
        debug!(id, %table, ?kind, "realtime subscription added");
        self.subscriptions.insert(
            id,
            Subscription {
                table,
                kind,
                callback: Arc::new(callback),
            },
        );
        SubscriptionId(id)
    }

    pub fn on_insert<F>(&self, table: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.subscribe(table, Some(ChangeKind::Insert), callback)
    }

    pub fn on_update<F>(&self, table: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.subscribe(table, Some(ChangeKind::Update), callback)
    }

    pub fn on_delete<F>(&self, table: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.subscribe(table, Some(ChangeKind::Delete), callback)
    }

    /// Remove a subscription; `false` if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id.0).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Distinct tables with at least one subscription, for joining topics
    pub fn tables(&self) -> Vec<String> {
        self.subscriptions
            .iter()
            .map(|s| s.table.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Deliver one event, returning how many callbacks ran
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        // Callbacks are cloned out so none runs while a shard lock is held
        let callbacks: Vec<ChangeCallback> = self
            .subscriptions
            .iter()
            .filter(|s| s.matches(event))
            .map(|s| s.callback.clone())
            .collect();

        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Pump events until the stream ends or the manager is cancelled
    pub async fn run<S>(&self, events: S) -> usize
    where
        S: Stream<Item = ChangeEvent>,
    {
        futures::pin_mut!(events);
        let mut delivered = 0;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(delivered, "realtime pump cancelled");
                    break;
                }
                next = events.next() => match next {
                    Some(event) => {
                        self.dispatch(&event);
                        delivered += 1;
                    }
                    None => {
                        info!(delivered, "realtime stream ended");
                        break;
                    }
                }
            }
        }
        delivered
    }

    /// Pump a live socket connection
    pub async fn run_connection(&self, conn: RealtimeConnection) -> usize {
        let events = futures::stream::unfold(conn, |mut conn| async move {
            conn.next().await.map(|event| (event, conn))
        });
        self.run(events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn event(table: &str, kind: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            table: table.to_string(),
            kind,
            record: json!({"id": "r1"}),
            old_record: serde_json::Value::Null,
            commit_timestamp: None,
        }
    }

    #[test]
    fn test_dispatch_filters_by_table_and_kind() {
        let manager = RealtimeManager::new();
        let inserts = Arc::new(AtomicUsize::new(0));
        let any = Arc::new(AtomicUsize::new(0));

        let i = inserts.clone();
        manager.on_insert("chat_messages", move |_| {
            i.fetch_add(1, Ordering::SeqCst);
        });
        let a = any.clone();
        manager.subscribe("chat_messages", None, move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(manager.dispatch(&event("chat_messages", ChangeKind::Insert)), 2);
        assert_eq!(manager.dispatch(&event("chat_messages", ChangeKind::Delete)), 1);
        assert_eq!(manager.dispatch(&event("forum_posts", ChangeKind::Insert)), 0);
        assert_eq!(inserts.load(Ordering::SeqCst), 1);
        assert_eq!(any.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let manager = RealtimeManager::new();
        let id = manager.on_update("quotes", |_| {});
        manager.on_insert("forum_posts", |_| {});
        assert_eq!(manager.tables(), vec!["forum_posts", "quotes"]);

        assert!(manager.unsubscribe(id));
        assert!(!manager.unsubscribe(id));
        assert_eq!(manager.dispatch(&event("quotes", ChangeKind::Update)), 0);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_run_drains_stream() {
        let manager = RealtimeManager::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        manager.on_insert("t", move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        let events = futures::stream::iter(vec![
            event("t", ChangeKind::Insert),
            event("t", ChangeKind::Update),
            event("t", ChangeKind::Insert),
        ]);
        assert_eq!(manager.run(events).await, 3);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let manager = RealtimeManager::new();
        manager.cancel();
        assert_eq!(manager.run(futures::stream::pending::<ChangeEvent>()).await, 0);
    }
}
