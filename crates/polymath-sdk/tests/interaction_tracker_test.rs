//! End-to-end behavior of the interaction tracker against the in-memory store

use polymath_sdk::{
    ContentRef, ContentType, CounterPolicy, InteractionKind, InteractionStore, InteractionTracker, MockCall,
    MockOp, MockStore, RecordingNotifier, SdkError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<InteractionTracker>, Arc<MockStore>, Arc<RecordingNotifier>) {
    let mock = Arc::new(MockStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let tracker = Arc::new(InteractionTracker::new(mock.clone(), notifier.clone()));
    (tracker, mock, notifier)
}

async fn wait_until_loading(tracker: &InteractionTracker, content: &ContentRef, kind: InteractionKind) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !tracker.store().is_loading(content, kind) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("toggle never started");
}

// ==================== Hydrate ====================

#[tokio::test]
async fn test_hydrate_sets_flags_from_tables() {
    let (tracker, mock, _) = setup();
    mock.seed("quote_likes", [json!({"quote_id": "q1", "user_id": "u1", "content_type": "quote"})]);
    mock.seed(
        "content_bookmarks",
        [
            json!({"content_id": "m1", "user_id": "u1", "content_type": "media"}),
            json!({"content_id": "f1", "user_id": "someone-else", "content_type": "forum"}),
        ],
    );

    let refs = [
        ContentRef::new(ContentType::Quote, "q1"),
        ContentRef::new(ContentType::Media, "m1"),
        ContentRef::new(ContentType::Forum, "f1"),
    ];
    tracker.check_interactions(Some("u1"), &refs).await;

    let store = tracker.store();
    assert!(store.get_state(&refs[0]).is_liked);
    assert!(!store.get_state(&refs[0]).is_bookmarked);
    assert!(store.get_state(&refs[1]).is_bookmarked);
    assert!(!store.get_state(&refs[1]).is_liked);
    assert!(!store.get_state(&refs[2]).is_bookmarked);

    let mut tables: Vec<String> = mock.calls().into_iter().map(|c| c.target).collect();
    tables.sort();
    assert_eq!(
        tables,
        vec!["content_bookmarks", "content_likes", "media_likes", "quote_bookmarks", "quote_likes"]
    );
    assert!(mock.calls().iter().all(|c| c.op == MockOp::Select));

    // Re-hydrating costs the same number of queries
    mock.reset_calls();
    tracker.check_interactions(Some("u1"), &refs).await;
    assert_eq!(mock.calls_of(MockOp::Select), 5);
}

#[tokio::test]
async fn test_hydrate_anonymous_is_noop() {
    let (tracker, mock, _) = setup();
    tracker
        .check_interactions(None, &[ContentRef::new(ContentType::Wiki, "w1")])
        .await;
    tracker.check_interactions(Some("u1"), &[]).await;

    assert_eq!(mock.call_count(), 0);
    assert!(tracker.store().is_empty());
}

#[tokio::test]
async fn test_hydrate_failure_is_isolated_per_table() {
    let (tracker, mock, notifier) = setup();
    mock.seed("quote_bookmarks", [json!({"quote_id": "q1", "user_id": "u1", "content_type": "quote"})]);
    mock.fail(MockOp::Select, "quote_likes");

    let q = ContentRef::new(ContentType::Quote, "q1");
    tracker.store().set_liked(&q, true);
    tracker.check_interactions(Some("u1"), &[q.clone()]).await;

    let state = tracker.store().get_state(&q);
    assert!(state.is_liked, "failed lookup must keep the previous value");
    assert!(state.is_bookmarked);
    assert!(notifier.is_empty());
}

// ==================== Toggle ====================

#[tokio::test]
async fn test_toggle_like_round_trip() {
    let (tracker, mock, _) = setup();
    let post = ContentRef::new(ContentType::Forum, "p1");

    let liked = tracker.toggle_like(&post, Some("u1")).await.unwrap();
    assert!(liked.active);
    assert_eq!(liked.kind, InteractionKind::Like);
    assert_eq!(mock.rows("content_likes").len(), 1);
    assert_eq!(tracker.like_count(&post).await.unwrap(), 1);

    let unliked = tracker.toggle_like(&post, Some("u1")).await.unwrap();
    assert!(!unliked.active);
    assert!(mock.rows("content_likes").is_empty());
    assert!(!tracker.store().get_state(&post).is_liked);
    assert!(!tracker.store().is_loading(&post, InteractionKind::Like));
}

#[tokio::test]
async fn test_toggle_is_optimistic_and_single_flight() {
    let (tracker, mock, _) = setup();
    let quote = ContentRef::new(ContentType::Quote, "q1");
    mock.hold_writes();

    let pending = {
        let tracker = tracker.clone();
        let quote = quote.clone();
        tokio::spawn(async move { tracker.toggle_like(&quote, Some("u1")).await })
    };
    wait_until_loading(&tracker, &quote, InteractionKind::Like).await;

    // Flipped before the backend has answered
    assert!(tracker.store().get_state(&quote).is_liked);

    let second = tracker.toggle_like(&quote, Some("u1")).await;
    assert!(matches!(second, Err(SdkError::InFlight(_))));
    assert_eq!(mock.calls_of(MockOp::Insert), 1);

    // Bookmarks on the same item are independent
    mock.open_gate();
    tracker.toggle_bookmark(&quote, Some("u1")).await.unwrap();

    let change = pending.await.unwrap().unwrap();
    assert!(change.active);
    assert!(tracker.store().get_state(&quote).is_liked);
    assert!(!tracker.store().is_loading(&quote, InteractionKind::Like));
    assert_eq!(mock.rows("quote_likes").len(), 1);
}

#[tokio::test]
async fn test_failed_toggle_rolls_back_and_notifies() {
    let (tracker, mock, notifier) = setup();
    mock.fail(MockOp::Insert, "media_likes");
    let media = ContentRef::new(ContentType::Media, "m1");

    let result = tracker.toggle_like(&media, Some("u1")).await;
    assert!(matches!(result, Err(SdkError::Remote(_))));
    assert!(!tracker.store().get_state(&media).is_liked);
    assert!(!tracker.store().is_loading(&media, InteractionKind::Like));

    let notice = notifier.last().unwrap();
    assert!(notice.is_destructive());
    assert_eq!(notice.description, "Failed to update like. Please try again.");

    // Works once the backend recovers
    mock.heal(MockOp::Insert, "media_likes");
    assert!(tracker.toggle_like(&media, Some("u1")).await.unwrap().active);
}

#[tokio::test]
async fn test_failed_unbookmark_restores_bookmark() {
    let (tracker, mock, _) = setup();
    let entry = ContentRef::new(ContentType::Knowledge, "k1");
    mock.seed(
        "content_bookmarks",
        [json!({"content_id": "k1", "user_id": "u1", "content_type": "knowledge"})],
    );
    tracker.check_interactions(Some("u1"), &[entry.clone()]).await;
    assert!(tracker.store().get_state(&entry).is_bookmarked);

    mock.fail(MockOp::Delete, "content_bookmarks");
    assert!(tracker.toggle_bookmark(&entry, Some("u1")).await.is_err());
    assert!(tracker.store().get_state(&entry).is_bookmarked);
    assert_eq!(mock.rows("content_bookmarks").len(), 1);
}

#[tokio::test]
async fn test_signed_out_toggle_makes_no_calls() {
    let (tracker, mock, notifier) = setup();
    let article = ContentRef::new(ContentType::Wiki, "w1");

    let result = tracker.toggle_bookmark(&article, None).await;
    assert!(matches!(result, Err(SdkError::AuthRequired)));
    assert_eq!(mock.call_count(), 0);
    assert!(!tracker.store().get_state(&article).is_bookmarked);

    let notice = notifier.last().unwrap();
    assert!(notice.description.contains("sign in"));
}

// ==================== Counters ====================

#[tokio::test]
async fn test_rpc_policy_maintains_counters() {
    let mock = Arc::new(MockStore::new());
    mock.seed("quotes", [json!({"id": "q1", "likes": 3, "bookmarks": 0})]);
    let tracker = InteractionTracker::new(mock.clone(), Arc::new(RecordingNotifier::new()))
        .with_policy(CounterPolicy::Rpc);
    let quote = ContentRef::new(ContentType::Quote, "q1");

    tracker.toggle_like(&quote, Some("u1")).await.unwrap();
    assert_eq!(mock.rows("quotes")[0]["likes"], 4);

    tracker.toggle_like(&quote, Some("u1")).await.unwrap();
    assert_eq!(mock.rows("quotes")[0]["likes"], 3);

    tracker.toggle_bookmark(&quote, Some("u1")).await.unwrap();
    assert_eq!(mock.rows("quotes")[0]["bookmarks"], 1);
}

#[tokio::test]
async fn test_counter_failure_does_not_fail_toggle() {
    let mock = Arc::new(MockStore::new());
    mock.seed("research_papers", [json!({"id": "r1", "likes": 0})]);
    mock.fail(MockOp::Rpc, "increment_counter_fn");
    let notifier = Arc::new(RecordingNotifier::new());
    let tracker = InteractionTracker::new(mock.clone(), notifier.clone()).with_policy(CounterPolicy::Rpc);
    let paper = ContentRef::new(ContentType::Research, "r1");

    assert!(tracker.toggle_like(&paper, Some("u1")).await.unwrap().active);
    assert!(tracker.store().get_state(&paper).is_liked);
    assert_eq!(mock.rows("research_papers")[0]["likes"], 0);
    assert!(notifier.is_empty());
}

#[tokio::test]
async fn test_counter_rpc_standalone() {
    let (tracker, mock, _) = setup();
    mock.seed("forum_posts", [json!({"id": "abc", "upvotes": 0})]);

    assert!(tracker.counters().increment("abc", "upvotes", "forum_posts").await);
    assert_eq!(mock.rows("forum_posts")[0]["upvotes"], 1);

    mock.fail(MockOp::Rpc, "*");
    assert!(!tracker.counters().increment("abc", "upvotes", "forum_posts").await);
}

// ==================== Cancellation ====================

#[tokio::test]
async fn test_cancel_abandons_in_flight_toggle() {
    let (tracker, mock, notifier) = setup();
    let post = ContentRef::new(ContentType::Ai, "a1");
    mock.hold_writes();

    let pending = {
        let tracker = tracker.clone();
        let post = post.clone();
        tokio::spawn(async move { tracker.toggle_like(&post, Some("u1")).await })
    };
    wait_until_loading(&tracker, &post, InteractionKind::Like).await;

    tracker.cancel();
    assert!(matches!(pending.await.unwrap(), Err(SdkError::Cancelled)));
    assert!(notifier.is_empty());

    // A cancelled tracker accepts no new work
    assert!(matches!(
        tracker.toggle_like(&post, Some("u1")).await,
        Err(SdkError::Cancelled)
    ));
    mock.open_gate();
    assert!(mock.rows("content_likes").is_empty());
}

// ==================== Shared store ====================

#[tokio::test]
async fn test_trackers_sharing_a_store_see_each_other() {
    let mock = Arc::new(MockStore::new());
    let store = Arc::new(InteractionStore::new());
    let list = Arc::new(
        InteractionTracker::new(mock.clone(), Arc::new(RecordingNotifier::new())).with_store(store.clone()),
    );
    let detail = InteractionTracker::new(mock.clone(), Arc::new(RecordingNotifier::new())).with_store(store.clone());
    let post = ContentRef::new(ContentType::Forum, "p1");

    list.toggle_like(&post, Some("u1")).await.unwrap();
    assert!(detail.store().get_state(&post).is_liked);
    assert!(Arc::ptr_eq(list.store(), detail.store()));

    // The in-flight guard is shared too
    mock.hold_writes();
    let pending = {
        let list = list.clone();
        let post = post.clone();
        tokio::spawn(async move { list.toggle_bookmark(&post, Some("u1")).await })
    };
    wait_until_loading(&list, &post, InteractionKind::Bookmark).await;

    mock.reset_calls();
    assert!(matches!(
        detail.toggle_bookmark(&post, Some("u1")).await,
        Err(SdkError::InFlight(_))
    ));
    assert_eq!(mock.calls(), Vec::<MockCall>::new());

    mock.open_gate();
    assert!(pending.await.unwrap().unwrap().active);
    assert!(detail.store().get_state(&post).is_bookmarked);
}

#[tokio::test]
async fn test_cancelling_shared_store_freezes_every_tracker() {
    let mock = Arc::new(MockStore::new());
    let store = Arc::new(InteractionStore::new());
    let first = InteractionTracker::new(mock.clone(), Arc::new(RecordingNotifier::new())).with_store(store.clone());
    let second = InteractionTracker::new(mock.clone(), Arc::new(RecordingNotifier::new())).with_store(store.clone());
    let quote = ContentRef::new(ContentType::Quote, "q1");

    first.cancel();
    assert!(store.is_cancelled());

    for tracker in [&first, &second] {
        assert!(matches!(
            tracker.toggle_like(&quote, Some("u1")).await,
            Err(SdkError::Cancelled)
        ));
    }
    store.set_liked(&quote, true);
    assert!(!second.store().get_state(&quote).is_liked);
    assert_eq!(mock.call_count(), 0);
}

// ==================== Feed ====================

#[tokio::test]
async fn test_load_feed_normalizes_and_hydrates() {
    let (tracker, mock, _) = setup();
    mock.seed(
        "forum_posts",
        [
            json!({"id": "old", "title": "First", "authorName": "ada", "created_at": "2024-01-01T00:00:00Z"}),
            json!({"id": "new", "title": "Second", "author_name": "alan", "created_at": "2024-02-01T00:00:00Z"}),
        ],
    );
    mock.seed("content_likes", [json!({"content_id": "old", "user_id": "u1", "content_type": "forum"})]);

    let feed = tracker.load_feed(ContentType::Forum, Some("u1"), 10).await.unwrap();
    let ids: Vec<_> = feed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old"]);
    assert_eq!(feed[1].author.as_deref(), Some("ada"));

    assert!(tracker.store().get_state(&feed[1].content_ref()).is_liked);
    assert!(!tracker.store().get_state(&feed[0].content_ref()).is_liked);
}

#[tokio::test]
async fn test_load_feed_failure_notifies() {
    let (tracker, mock, notifier) = setup();
    mock.fail(MockOp::Select, "wiki_articles");

    assert!(tracker.load_feed(ContentType::Wiki, None, 10).await.is_err());
    assert!(notifier.last().unwrap().is_destructive());
}
