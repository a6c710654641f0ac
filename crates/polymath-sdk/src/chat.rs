//! Direct messages between users

use crate::error::{Result, SdkError};
use crate::notify::{Notice, Notifier};
use crate::realtime::{RealtimeManager, SubscriptionId};
use crate::remote::RemoteStore;
use chrono::{DateTime, Utc};
use polymath_client::{Filter, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const MESSAGES_TABLE: &str = "chat_messages";
const CONVERSATIONS_TABLE: &str = "conversations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub struct ChatService {
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
}

impl ChatService {
    pub fn new(remote: Arc<dyn RemoteStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { remote, notifier }
    }

    /// Send a message and bump the conversation's `updated_at`
    ///
    /// The bump is best effort: a failure there is logged, the message stands.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: Option<&str>,
        body: &str,
    ) -> Result<ChatMessage> {
        let Some(sender_id) = sender_id.filter(|s| !s.is_empty()) else {
            self.notifier.notify(Notice::auth_required("send messages"));
            return Err(SdkError::AuthRequired);
        };

        let body = body.trim();
        if body.is_empty() {
            self.notifier
                .notify(Notice::destructive("Empty message", "Please write something first."));
            return Err(SdkError::Validation("message is empty".into()));
        }

        let row = json!({
            "conversation_id": conversation_id,
            "sender_id": sender_id,
            "content": body,
        });

        let stored = match self.remote.insert(MESSAGES_TABLE, row).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(conversation_id, "failed to send message: {}", e);
                self.notifier
                    .notify(Notice::destructive("Error", "Failed to send message. Please try again."));
                return Err(e);
            }
        };
        let message: ChatMessage = serde_json::from_value(stored)?;

        let touch = json!({ "updated_at": Utc::now().to_rfc3339() });
        if let Err(e) = self
            .remote
            .update(CONVERSATIONS_TABLE, &[Filter::eq("id", conversation_id)], touch)
            .await
        {
            warn!(conversation_id, "failed to bump conversation timestamp: {}", e);
        }

        Ok(message)
    }

    /// The latest `limit` messages, oldest first
    pub async fn fetch_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<ChatMessage>> {
        let query = Query::table(MESSAGES_TABLE)
            .filter(Filter::eq("conversation_id", conversation_id))
            .order_by("created_at", false)
            .limit(limit);

        let mut messages = self
            .remote
            .select(&query)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(SdkError::from))
            .collect::<Result<Vec<ChatMessage>>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Call `callback` for each new message in a conversation
    pub fn subscribe<F>(&self, realtime: &RealtimeManager, conversation_id: &str, callback: F) -> SubscriptionId
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        let conversation_id = conversation_id.to_string();
        realtime.on_insert(MESSAGES_TABLE, move |event| {
            if event.record.get("conversation_id").and_then(|v| v.as_str()) != Some(conversation_id.as_str()) {
                return;
            }
            match serde_json::from_value::<ChatMessage>(event.record.clone()) {
                Ok(message) => callback(message),
                Err(e) => debug!("ignoring malformed chat message: {}", e),
            }
        })
    }
}
