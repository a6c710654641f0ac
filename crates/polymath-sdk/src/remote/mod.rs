//! Remote data plane
//!
//! [`RemoteStore`] is the seam between the interaction layer and the hosted
//! backend. The HTTP implementation wraps [`polymath_client::PostgrestClient`];
//! [`MockStore`] keeps tables in memory for tests and offline demos.

mod mock;
mod postgrest;

pub use mock::{MockCall, MockOp, MockStore};

use crate::error::Result;
use async_trait::async_trait;
use polymath_client::{Filter, Query};
use serde_json::Value;

/// Table, RPC and edge-function access
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read rows matching a query
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Insert one row, returning the stored row (or `Null` if the backend
    /// does not echo it)
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Patch matching rows, returning how many changed
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<u64>;

    /// Delete matching rows, returning how many were removed
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64>;

    /// Exact count of matching rows
    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64>;

    /// Call a database function
    async fn rpc(&self, function: &str, args: Value) -> Result<Value>;

    /// Invoke an edge function
    async fn invoke_function(&self, name: &str, body: Value) -> Result<Value>;
}
