//! Rust client for the Polymath hosted backend
//!
//! Speaks the three surfaces the application uses:
//! - PostgREST table reads and writes with horizontal filters
//! - database functions (`/rest/v1/rpc/...`) and edge functions (`/functions/v1/...`)
//! - the realtime change feed over a Phoenix websocket
//!
//! # Example
//!
//! ```rust,no_run
//! use polymath_client::{ClientConfig, Filter, PostgrestClient, Query};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PostgrestClient::new(ClientConfig {
//!     base_url: "https://project.supabase.co".into(),
//!     anon_key: "public-anon-key".into(),
//!     ..Default::default()
//! })?;
//!
//! // Which of these quotes has the viewer liked?
//! let rows = client
//!     .select(
//!         &Query::table("quote_likes")
//!             .select(["quote_id"])
//!             .filter(Filter::eq("user_id", "viewer-1"))
//!             .filter(Filter::in_list("quote_id", ["q1", "q2"])),
//!     )
//!     .await?;
//!
//! // Bump a denormalized counter
//! client
//!     .rpc(
//!         "increment_counter_fn",
//!         &json!({"row_id": "q1", "column_name": "likes", "table_name": "quotes"}),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod realtime;
pub mod types;

// Re-export main types
pub use client::PostgrestClient;
pub use error::{ClientError, Result};
pub use realtime::{ChangeEvent, ChangeKind, RealtimeConnection, RealtimeSocket};
pub use types::*;
