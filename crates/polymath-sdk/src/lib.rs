//! Polymath interaction SDK
//!
//! Viewer-side state for the Polymath content feeds: which items the viewer
//! has liked or bookmarked, optimistic toggles with rollback, denormalized
//! counters, and the smaller social surfaces built on the same backend
//! (comments, chat, activity, semantic search, realtime).
//!
//! # Example
//!
//! ```rust,no_run
//! use polymath_client::{ClientConfig, PostgrestClient};
//! use polymath_sdk::{ContentRef, ContentType, InteractionTracker, TracingNotifier};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PostgrestClient::new(ClientConfig::default())?;
//! let tracker = InteractionTracker::new(Arc::new(client), Arc::new(TracingNotifier));
//!
//! let feed = tracker.load_feed(ContentType::Quote, Some("viewer-1"), 20).await?;
//! if let Some(first) = feed.first() {
//!     tracker.toggle_like(&first.content_ref(), Some("viewer-1")).await?;
//! }
//! let state = tracker.store().get_state(&ContentRef::new(ContentType::Quote, "q1"));
//! println!("liked: {}", state.is_liked);
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod chat;
pub mod comments;
pub mod content;
pub mod counter;
pub mod error;
pub mod interactions;
pub mod normalize;
pub mod notify;
pub mod realtime;
pub mod remote;
pub mod search;
pub mod store;

// Re-export main types
pub use activity::{Activity, ActivityLog, ActivityType};
pub use chat::{ChatMessage, ChatService};
pub use comments::{Comment, CommentService};
pub use content::{ContentRef, ContentType, ContentTypeInfo, InteractionKind};
pub use counter::CounterRpc;
pub use error::{Result, SdkError};
pub use interactions::{CounterPolicy, InteractionChange, InteractionTracker};
pub use normalize::{normalize, normalize_all, FeedRecord};
pub use notify::{Notice, NoticeVariant, Notifier, RecordingNotifier, TracingNotifier};
pub use realtime::{ChangeCallback, RealtimeManager, SubscriptionId};
pub use remote::{MockCall, MockOp, MockStore, RemoteStore};
pub use search::{SearchHit, SemanticSearch};
pub use store::{InteractionState, InteractionStore, LoadingState};
