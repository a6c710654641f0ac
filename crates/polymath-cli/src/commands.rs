//! Subcommands and their execution

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Subcommand, ValueEnum};
use polymath_client::{PostgrestClient, RealtimeSocket};
use polymath_sdk::{
    ActivityLog, ActivityType, ChatService, CommentService, CounterPolicy, ContentRef, ContentType, ContentTypeInfo, InteractionKind,
    InteractionTracker, RealtimeManager, RemoteStore, SemanticSearch, TracingNotifier,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Like,
    Bookmark,
}

impl From<KindArg> for InteractionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Like => InteractionKind::Like,
            KindArg::Bookmark => InteractionKind::Bookmark,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the tables behind a content type
    Resolve {
        /// Content type tag (quote, forum, media, knowledge, wiki, research, ai)
        content_type: String,
    },

    /// Show the viewer's like/bookmark flags for items (`<type>:<id>`)
    Check {
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Toggle a like on an item
    Like { item: String },

    /// Toggle a bookmark on an item
    Bookmark { item: String },

    /// Count likes or bookmarks on an item
    Count {
        item: String,
        #[arg(short, long, value_enum, default_value = "like")]
        kind: KindArg,
    },

    /// Increment a counter column through the counter RPC
    Increment {
        row_id: String,
        column: String,
        table: String,
    },

    /// Decrement a counter column through the counter RPC
    Decrement {
        row_id: String,
        column: String,
        table: String,
    },

    /// Newest items of a content type, with the viewer's flags
    Feed {
        content_type: String,
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Comment on an item
    Comment { item: String, body: String },

    /// List comments on an item
    Comments { item: String },

    /// Semantic search
    Search {
        query: String,
        #[arg(short = 't', long)]
        content_type: Option<String>,
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// The viewer's recent activity
    Activity {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Direct messages
    #[command(subcommand)]
    Chat(ChatCommand),
}

#[derive(Debug, Subcommand)]
pub enum ChatCommand {
    /// Send a message to a conversation
    Send { conversation: String, body: String },

    /// Show recent messages in a conversation
    History {
        conversation: String,
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Print new messages as they arrive until interrupted
    Watch { conversation: String },
}

/// Services shared by every command
pub struct App {
    client: PostgrestClient,
    remote: Arc<dyn RemoteStore>,
    tracker: InteractionTracker,
    user_id: Option<String>,
}

impl App {
    pub fn new(client: PostgrestClient, counter_policy: CounterPolicy, user_id: Option<String>) -> Self {
        let remote: Arc<dyn RemoteStore> = Arc::new(client.clone());
        let tracker = InteractionTracker::new(remote.clone(), Arc::new(TracingNotifier)).with_policy(counter_policy);
        Self {
            client,
            remote,
            tracker,
            user_id,
        }
    }

    fn user(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn require_user(&self) -> anyhow::Result<&str> {
        self.user()
            .context("this command needs a signed-in user (--user-id or POLYMATH_USER_ID)")
    }

    /// Run one command and render its output
    pub async fn execute(&self, command: Command) -> anyhow::Result<String> {
        match command {
            Command::Resolve { content_type } => {
                let info = ContentTypeInfo::resolve_tag(&content_type)?;
                Ok(serde_json::to_string_pretty(info)?)
            }

            Command::Check { items } => {
                let refs = parse_refs(&items)?;
                self.tracker.check_interactions(self.user(), &refs).await;
                let states: serde_json::Map<_, _> = refs
                    .iter()
                    .map(|r| (r.key(), json!(self.tracker.store().get_state(r))))
                    .collect();
                Ok(serde_json::to_string_pretty(&states)?)
            }

            Command::Like { item } => self.toggle(&item, InteractionKind::Like).await,
            Command::Bookmark { item } => self.toggle(&item, InteractionKind::Bookmark).await,

            Command::Count { item, kind } => {
                let content: ContentRef = item.parse()?;
                let kind = InteractionKind::from(kind);
                let count = self.tracker.count(&content, kind).await?;
                Ok(format!("{} {}s on {}", count, kind, content))
            }

            Command::Increment { row_id, column, table } => {
                let ok = self.tracker.counters().increment(&row_id, &column, &table).await;
                Ok(counter_outcome(ok, "incremented", &table, &column, &row_id))
            }
            Command::Decrement { row_id, column, table } => {
                let ok = self.tracker.counters().decrement(&row_id, &column, &table).await;
                Ok(counter_outcome(ok, "decremented", &table, &column, &row_id))
            }

            Command::Feed { content_type, limit } => {
                let content_type: ContentType = content_type.parse()?;
                let records = self.tracker.load_feed(content_type, self.user(), limit).await?;
                let rows: Vec<_> = records
                    .iter()
                    .map(|record| {
                        let state = self.tracker.store().get_state(&record.content_ref());
                        json!({ "record": record, "state": state })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&rows)?)
            }

            Command::Comment { item, body } => {
                let content: ContentRef = item.parse()?;
                let comment = self.comments().add_comment(&content, self.user(), &body).await?;
                self.activity()
                    .record(&comment.user_id, ActivityType::Comment, Some(&content), json!({ "comment_id": comment.id }))
                    .await;
                Ok(format!("comment {} posted on {}", comment.id, content))
            }
            Command::Comments { item } => {
                let content: ContentRef = item.parse()?;
                let comments = self.comments().list_comments(&content).await?;
                Ok(serde_json::to_string_pretty(&comments)?)
            }

            Command::Search { query, content_type, limit } => {
                let content_type = content_type.map(|t| t.parse::<ContentType>()).transpose()?;
                let hits = SemanticSearch::new(self.remote.clone())
                    .search_text(&query, content_type, limit)
                    .await?;
                Ok(serde_json::to_string_pretty(&hits)?)
            }

            Command::Activity { limit } => {
                let user = self.require_user()?;
                let activities = self.activity().recent(user, limit).await?;
                Ok(serde_json::to_string_pretty(&activities)?)
            }

            Command::Chat(command) => self.chat(command).await,
        }
    }

    async fn toggle(&self, item: &str, kind: InteractionKind) -> anyhow::Result<String> {
        let content: ContentRef = item.parse()?;
        let user = self.require_user()?;

        // Hydrate first so the toggle flips the persisted state
        self.tracker.check_interactions(Some(user), std::slice::from_ref(&content)).await;
        let change = self.tracker.toggle(&content, Some(user), kind).await?;
        if change.active {
            let activity = match kind {
                InteractionKind::Like => ActivityType::Like,
                InteractionKind::Bookmark => ActivityType::Bookmark,
            };
            self.activity().record(user, activity, Some(&content), json!({})).await;
        }

        if matches!(self.tracker.policy(), CounterPolicy::Derived) {
            let count = self.tracker.count(&content, kind).await?;
            Ok(format!("{} {} = {} ({} total)", content, kind, change.active, count))
        } else {
            Ok(format!("{} {} = {}", content, kind, change.active))
        }
    }

    async fn chat(&self, command: ChatCommand) -> anyhow::Result<String> {
        let chat = ChatService::new(self.remote.clone(), Arc::new(TracingNotifier));

        match command {
            ChatCommand::Send { conversation, body } => {
                let message = chat.send_message(&conversation, self.user(), &body).await?;
                Ok(format!("message {} sent", message.id))
            }
            ChatCommand::History { conversation, limit } => {
                let messages = chat.fetch_messages(&conversation, limit).await?;
                Ok(messages
                    .iter()
                    .map(|m| format!("[{}] {}: {}", format_time(m.created_at), m.sender_id, m.content))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            ChatCommand::Watch { conversation } => {
                let realtime = Arc::new(RealtimeManager::new());
                chat.subscribe(&realtime, &conversation, |m| {
                    println!("[{}] {}: {}", format_time(m.created_at), m.sender_id, m.content);
                });

                let mut socket = RealtimeSocket::new(&self.client);
                for table in realtime.tables() {
                    socket = socket.table(table);
                }
                let connection = socket.connect().await?;

                let stopper = realtime.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        stopper.cancel();
                    }
                });

                info!(%conversation, "watching for messages, Ctrl-C to stop");
                let delivered = realtime.run_connection(connection).await;
                Ok(format!("stopped after {} events", delivered))
            }
        }
    }

    fn activity(&self) -> ActivityLog {
        ActivityLog::new(self.remote.clone())
    }

    fn comments(&self) -> CommentService {
        CommentService::new(self.remote.clone(), Arc::new(TracingNotifier))
    }
}

fn parse_refs(items: &[String]) -> anyhow::Result<Vec<ContentRef>> {
    items
        .iter()
        .map(|item| item.parse::<ContentRef>().with_context(|| format!("bad item {:?}", item)))
        .collect()
}

fn counter_outcome(ok: bool, verb: &str, table: &str, column: &str, row_id: &str) -> String {
    if ok {
        format!("{} {}.{} for {}", verb, table, column, row_id)
    } else {
        format!("counter not {} (see log)", verb)
    }
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refs_reports_bad_item() {
        let items = vec!["quote:q1".to_string(), "podcast:7".to_string()];
        let err = parse_refs(&items).unwrap_err();
        assert!(err.to_string().contains("podcast:7"));

        let refs = parse_refs(&items[..1]).unwrap();
        assert_eq!(refs[0], ContentRef::new(ContentType::Quote, "q1"));
    }

    #[test]
    fn test_counter_outcome() {
        assert_eq!(
            counter_outcome(true, "incremented", "quotes", "likes", "q1"),
            "incremented quotes.likes for q1"
        );
        assert!(counter_outcome(false, "decremented", "quotes", "likes", "q1").contains("not decremented"));
    }

    #[test]
    fn test_kind_arg_maps_to_interaction_kind() {
        assert_eq!(InteractionKind::from(KindArg::Like), InteractionKind::Like);
        assert_eq!(InteractionKind::from(KindArg::Bookmark), InteractionKind::Bookmark);
    }
}
