//! Realtime change feed over the Phoenix websocket protocol
//!
//! One topic is joined per table with a `postgres_changes` config; the server
//! then pushes `postgres_changes` events carrying the changed row. A heartbeat
//! keeps the socket alive.

use crate::client::PostgrestClient;
use crate::error::{ClientError, Result};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const EVENT_BUFFER: usize = 256;

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A decoded row change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// New row (empty object on DELETE)
    #[serde(default)]
    pub record: Value,
    /// Previous row, when the table replicates it
    #[serde(default)]
    pub old_record: Value,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

/// Phoenix channel frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
}

/// Topic name for a table in the public schema
pub fn topic_for(table: &str) -> String {
    format!("realtime:public:{}", table)
}

/// Build the join frame for a table
pub fn join_message(table: &str, access_token: &str, msg_ref: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic_for(table),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": access_token,
        }),
        msg_ref: Some(msg_ref.to_string()),
    }
}

/// Build a heartbeat frame
pub fn heartbeat_message(msg_ref: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref.to_string()),
    }
}

/// Decode a text frame; `Ok(None)` for frames that are not row changes
pub fn decode_change(text: &str) -> Result<Option<ChangeEvent>> {
    let message: PhoenixMessage = serde_json::from_str(text)?;

    match message.event.as_str() {
        "postgres_changes" => {
            let data = message
                .payload
                .get("data")
                .cloned()
                .ok_or_else(|| ClientError::InvalidResponse("postgres_changes frame without data".into()))?;
            Ok(Some(serde_json::from_value(data)?))
        }
        "phx_error" => Err(ClientError::InvalidResponse(format!(
            "channel error on {}: {}",
            message.topic, message.payload
        ))),
        _ => Ok(None),
    }
}

/// Builder for a realtime connection
///
/// ```rust,no_run
/// use polymath_client::{ClientConfig, PostgrestClient, RealtimeSocket};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PostgrestClient::new(ClientConfig::default())?;
/// let mut conn = RealtimeSocket::new(&client).table("chat_messages").connect().await?;
/// while let Some(change) = conn.next().await {
///     println!("{:?} on {}", change.kind, change.table);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RealtimeSocket {
    url: String,
    access_token: String,
    tables: Vec<String>,
    heartbeat: Duration,
}

impl RealtimeSocket {
    pub fn new(client: &PostgrestClient) -> Self {
        Self {
            url: client.realtime_url(),
            access_token: client.config().bearer().to_string(),
            tables: Vec::new(),
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }

    /// Subscribe to changes on a table
    pub fn table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !self.tables.contains(&table) {
            self.tables.push(table);
        }
        self
    }

    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Open the socket, join every table topic and start pumping events
    pub async fn connect(self) -> Result<RealtimeConnection> {
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (mut sink, mut source) = stream.split();
        info!(tables = ?self.tables, "realtime socket connected");

        let mut next_ref: u64 = 1;
        for table in &self.tables {
            let join = join_message(table, &self.access_token, next_ref);
            next_ref += 1;
            sink.send(Message::Text(serde_json::to_string(&join)?)).await?;
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let heartbeat = self.heartbeat;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let frame = match serde_json::to_string(&heartbeat_message(next_ref)) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("failed to encode heartbeat: {}", e);
                                break;
                            }
                        };
                        next_ref += 1;
                        if let Err(e) = sink.send(Message::Text(frame)).await {
                            warn!("realtime heartbeat failed: {}", e);
                            break;
                        }
                    }
                    incoming = source.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => match decode_change(&text) {
                                Ok(Some(change)) => {
                                    if tx.send(change).await.is_err() {
                                        debug!("realtime receiver dropped, closing");
                                        break;
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => warn!("undecodable realtime frame: {}", e),
                            },
                            Some(Ok(Message::Close(_))) | None => {
                                info!("realtime socket closed");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("realtime socket error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(RealtimeConnection { events: rx, task })
    }
}

/// A live realtime connection; dropping it closes the socket
pub struct RealtimeConnection {
    events: mpsc::Receiver<ChangeEvent>,
    task: JoinHandle<()>,
}

impl RealtimeConnection {
    /// Next change, or `None` once the socket has closed
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}
