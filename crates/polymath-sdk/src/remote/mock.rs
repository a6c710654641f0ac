//! In-memory remote store for testing.

use super::RemoteStore;
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use polymath_client::{Filter, Query};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Operation kinds, for failure injection and call inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Select,
    Insert,
    Update,
    Delete,
    Count,
    Rpc,
    Function,
}

impl MockOp {
    fn is_write(&self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete | Self::Rpc)
    }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub op: MockOp,
    /// Table or function name
    pub target: String,
}

/// Mock remote store.
///
/// Tables are vectors of JSON rows filtered with the same [`Filter`]s the
/// HTTP backend understands. The counter functions (`increment_counter_fn`,
/// `decrement_counter_fn`, `increment_media_views`) update rows in place.
/// Failures can be injected per operation and target, and writes can be held
/// in flight behind a gate.
#[derive(Default)]
pub struct MockStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failures: Mutex<HashSet<(MockOp, String)>>,
    calls: Mutex<Vec<MockCall>>,
    responses: Mutex<HashMap<String, Value>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows to a table.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        lock(&self.tables)
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Current rows of a table.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }

    /// Make `op` on `target` fail. `"*"` matches every target.
    pub fn fail(&self, op: MockOp, target: &str) {
        lock(&self.failures).insert((op, target.to_string()));
    }

    /// Undo a [`fail`](Self::fail).
    pub fn heal(&self, op: MockOp, target: &str) {
        lock(&self.failures).remove(&(op, target.to_string()));
    }

    /// Canned result for an RPC or edge function without built-in behavior.
    pub fn respond(&self, name: &str, value: Value) {
        lock(&self.responses).insert(name.to_string(), value);
    }

    /// Hold every write until permits are added to the returned semaphore.
    pub fn hold_writes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *lock(&self.gate) = Some(gate.clone());
        gate
    }

    /// Stop holding writes.
    pub fn open_gate(&self) {
        if let Some(gate) = lock(&self.gate).take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of calls of one kind.
    pub fn calls_of(&self, op: MockOp) -> usize {
        lock(&self.calls).iter().filter(|c| c.op == op).count()
    }

    /// Reset the call log.
    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    async fn enter(&self, op: MockOp, target: &str) -> Result<()> {
        lock(&self.calls).push(MockCall {
            op,
            target: target.to_string(),
        });

        if op.is_write() {
            let gate = lock(&self.gate).clone();
            if let Some(gate) = gate {
                gate.acquire()
                    .await
                    .map_err(|_| SdkError::Remote("mock gate closed".into()))?
                    .forget();
            }
        }

        let failures = lock(&self.failures);
        if failures.contains(&(op, target.to_string())) || failures.contains(&(op, "*".to_string())) {
            return Err(SdkError::Remote(format!("mock failure: {:?} {}", op, target)));
        }
        Ok(())
    }

    fn adjust_counter(&self, table: &str, row_id: &str, column: &str, delta: i64) {
        let mut tables = lock(&self.tables);
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| field_text(r, "id").as_deref() == Some(row_id)) {
                let current = row.get(column).and_then(Value::as_i64).unwrap_or(0);
                if let Some(obj) = row.as_object_mut() {
                    obj.insert(column.to_string(), json!(current + delta));
                }
            }
        }
    }
}

/// Column value rendered the way a PostgREST filter would compare it
fn field_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn compare(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

/// Evaluate a filter against a row
pub(crate) fn matches(filter: &Filter, row: &Value) -> bool {
    let actual = field_text(row, filter.column());
    match filter {
        Filter::Eq { value, .. } => actual.as_deref() == Some(value.as_str()),
        Filter::Neq { value, .. } => actual.is_some_and(|a| a != *value),
        Filter::Gt { value, .. } => actual.is_some_and(|a| compare(&a, value) == Ordering::Greater),
        Filter::Lt { value, .. } => actual.is_some_and(|a| compare(&a, value) == Ordering::Less),
        Filter::In { values, .. } => actual.is_some_and(|a| values.contains(&a)),
        Filter::IsNull { .. } => actual.is_none(),
    }
}

fn project(row: &Value, columns: &[String]) -> Value {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    let mut out = Map::new();
    for column in columns {
        if let Some(v) = row.get(column) {
            out.insert(column.clone(), v.clone());
        }
    }
    Value::Object(out)
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        self.enter(MockOp::Select, &query.table).await?;

        let mut rows: Vec<Value> = self
            .rows(&query.table)
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| matches(f, row)))
            .collect();

        if let Some(ref order) = query.order {
            rows.sort_by(|a, b| {
                let ord = compare(
                    &field_text(a, &order.column).unwrap_or_default(),
                    &field_text(b, &order.column).unwrap_or_default(),
                );
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }

        Ok(rows.iter().map(|r| project(r, &query.columns)).collect())
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value> {
        self.enter(MockOp::Insert, table).await?;

        if let Some(obj) = row.as_object_mut() {
            obj.entry("id")
                .or_insert_with(|| json!(uuid::Uuid::new_v4().to_string()));
            obj.entry("created_at")
                .or_insert_with(|| json!(chrono::Utc::now().to_rfc3339()));
        }
        self.seed(table, [row.clone()]);
        Ok(row)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<u64> {
        self.enter(MockOp::Update, table).await?;

        let mut tables = lock(&self.tables);
        let mut changed = 0;
        if let (Some(rows), Some(patch)) = (tables.get_mut(table), patch.as_object()) {
            for row in rows.iter_mut().filter(|r| filters.iter().all(|f| matches(f, r))) {
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in patch {
                        obj.insert(k.clone(), v.clone());
                    }
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        self.enter(MockOp::Delete, table).await?;

        if filters.is_empty() {
            return Err(SdkError::Remote(format!("refusing unfiltered delete on {}", table)));
        }

        let mut tables = lock(&self.tables);
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filters.iter().all(|f| matches(f, r)));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        self.enter(MockOp::Count, table).await?;

        Ok(self
            .rows(table)
            .iter()
            .filter(|r| filters.iter().all(|f| matches(f, r)))
            .count() as u64)
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value> {
        self.enter(MockOp::Rpc, function).await?;

        let arg = |name: &str| args.get(name).and_then(Value::as_str).unwrap_or_default().to_string();

        match function {
            "increment_counter_fn" | "decrement_counter_fn" => {
                let delta = if function == "increment_counter_fn" { 1 } else { -1 };
                self.adjust_counter(&arg("table_name"), &arg("row_id"), &arg("column_name"), delta);
                Ok(Value::Null)
            }
            "increment_media_views" => {
                self.adjust_counter("media_posts", &arg("media_id"), "views", 1);
                Ok(Value::Null)
            }
            _ => Ok(lock(&self.responses)
                .get(function)
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()))),
        }
    }

    async fn invoke_function(&self, name: &str, _body: Value) -> Result<Value> {
        self.enter(MockOp::Function, name).await?;

        lock(&self.responses)
            .get(name)
            .cloned()
            .ok_or_else(|| SdkError::Remote(format!("no such function: {}", name)))
    }
}
