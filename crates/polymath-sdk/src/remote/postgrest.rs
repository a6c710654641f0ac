//! HTTP-backed remote store

use super::RemoteStore;
use crate::error::Result;
use async_trait::async_trait;
use polymath_client::{Filter, PostgrestClient, Query};
use serde_json::Value;

#[async_trait]
impl RemoteStore for PostgrestClient {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        Ok(PostgrestClient::select(self, query).await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let rows = PostgrestClient::insert(self, table, &row).await?;
        Ok(rows.into_iter().next().unwrap_or(Value::Null))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<u64> {
        let rows = PostgrestClient::update(self, table, filters, &patch).await?;
        Ok(rows.len() as u64)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let rows = PostgrestClient::delete(self, table, filters).await?;
        Ok(rows.len() as u64)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        Ok(PostgrestClient::count(self, table, filters).await?)
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value> {
        Ok(PostgrestClient::rpc(self, function, &args).await?)
    }

    async fn invoke_function(&self, name: &str, body: Value) -> Result<Value> {
        Ok(PostgrestClient::invoke_function(self, name, &body).await?)
    }
}
