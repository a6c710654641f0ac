//! Denormalized counter RPC wrapper
//!
//! Thin helpers around the backend's counter functions, shared by likes,
//! bookmarks, forum upvotes and media views. Failures are logged and reported
//! as `false`, never propagated: a counter is a non-critical side effect.

use crate::remote::RemoteStore;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Increment/decrement a counter column on a row
#[derive(Clone)]
pub struct CounterRpc {
    remote: Arc<dyn RemoteStore>,
}

impl CounterRpc {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// `increment_counter_fn(row_id, column_name, table_name)`
    pub async fn increment(&self, row_id: &str, column: &str, table: &str) -> bool {
        self.call("increment_counter_fn", row_id, column, table).await
    }

    /// `decrement_counter_fn(row_id, column_name, table_name)`
    pub async fn decrement(&self, row_id: &str, column: &str, table: &str) -> bool {
        self.call("decrement_counter_fn", row_id, column, table).await
    }

    /// `increment_media_views(media_id)`
    pub async fn increment_media_views(&self, media_id: &str) -> bool {
        match self
            .remote
            .rpc("increment_media_views", json!({ "media_id": media_id }))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(media_id, "increment_media_views failed: {}", e);
                false
            }
        }
    }

    async fn call(&self, function: &str, row_id: &str, column: &str, table: &str) -> bool {
        let args = json!({
            "row_id": row_id,
            "column_name": column,
            "table_name": table,
        });

        match self.remote.rpc(function, args).await {
            Ok(_) => {
                debug!(function, row_id, column, table, "counter updated");
                true
            }
            Err(e) => {
                warn!(function, row_id, column, table, "counter update failed: {}", e);
                false
            }
        }
    }
}
