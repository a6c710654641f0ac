//! Types for the backend client API

use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Public anon key, sent as `apikey` on every request
    pub anon_key: String,
    /// Viewer's access token; falls back to the anon key when absent
    #[serde(default)]
    pub access_token: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Bearer token for the `Authorization` header
    pub fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }

    pub(crate) fn trimmed_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// A row filter in PostgREST horizontal-filter syntax
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq { column: String, value: String },
    Neq { column: String, value: String },
    Gt { column: String, value: String },
    Lt { column: String, value: String },
    In { column: String, values: Vec<String> },
    IsNull { column: String },
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.to_string(),
        }
    }

    pub fn neq(column: impl Into<String>, value: impl ToString) -> Self {
        Self::Neq {
            column: column.into(),
            value: value.to_string(),
        }
    }

    pub fn gt(column: impl Into<String>, value: impl ToString) -> Self {
        Self::Gt {
            column: column.into(),
            value: value.to_string(),
        }
    }

    pub fn lt(column: impl Into<String>, value: impl ToString) -> Self {
        Self::Lt {
            column: column.into(),
            value: value.to_string(),
        }
    }

    pub fn in_list<I, S>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
        }
    }

    /// Column this filter applies to
    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. }
            | Self::Neq { column, .. }
            | Self::Gt { column, .. }
            | Self::Lt { column, .. }
            | Self::In { column, .. }
            | Self::IsNull { column } => column,
        }
    }

    /// Operator expression, e.g. `eq.42` or `in.("a","b")`, not yet URL-encoded
    pub fn expression(&self) -> String {
        match self {
            Self::Eq { value, .. } => format!("eq.{}", value),
            Self::Neq { value, .. } => format!("neq.{}", value),
            Self::Gt { value, .. } => format!("gt.{}", value),
            Self::Lt { value, .. } => format!("lt.{}", value),
            Self::In { values, .. } => {
                let quoted: Vec<String> = values.iter().map(|v| quote_list_value(v)).collect();
                format!("in.({})", quoted.join(","))
            }
            Self::IsNull { .. } => "is.null".to_string(),
        }
    }

    /// `column=expression` with the expression URL-encoded
    pub fn to_param(&self) -> String {
        format!(
            "{}={}",
            urlencoding::encode(self.column()),
            urlencoding::encode(&self.expression())
        )
    }
}

/// Values inside `in.(...)` are double-quoted so commas and parentheses survive.
fn quote_list_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A table read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    /// Column list for `select=`; `*` when empty
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query string without the leading `?`
    pub fn to_query_string(&self) -> String {
        let select = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };

        let mut params = vec![format!("select={}", urlencoding::encode(&select))];
        params.extend(self.filters.iter().map(Filter::to_param));
        if let Some(ref order) = self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(format!(
                "order={}.{}",
                urlencoding::encode(&order.column),
                direction
            ));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={}", limit));
        }
        params.join("&")
    }
}

/// Render a filter list as a query string (for update/delete/count)
pub fn filters_to_query_string(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(Filter::to_param)
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse the total out of a `Content-Range` header (`0-24/3573`, `*/0`)
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_filter_param() {
        let f = Filter::eq("user_id", "u-1");
        assert_eq!(f.expression(), "eq.u-1");
        assert_eq!(f.to_param(), "user_id=eq.u-1");
    }

    #[test]
    fn test_in_filter_quotes_values() {
        let f = Filter::in_list("content_id", ["a", "b,c", "say \"hi\""]);
        assert_eq!(f.expression(), r#"in.("a","b,c","say \"hi\"")"#);
    }

    #[test]
    fn test_query_string() {
        let q = Query::table("content_likes")
            .select(["content_id"])
            .filter(Filter::eq("user_id", "u1"))
            .order_by("created_at", false)
            .limit(10);

        assert_eq!(
            q.to_query_string(),
            "select=content_id&user_id=eq.u1&order=created_at.desc&limit=10"
        );
    }

    #[test]
    fn test_query_defaults_to_star() {
        assert_eq!(Query::table("quotes").to_query_string(), "select=%2A");
    }

    #[test]
    fn test_content_range() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_bearer_falls_back_to_anon_key() {
        let mut config = ClientConfig {
            anon_key: "anon".into(),
            ..Default::default()
        };
        assert_eq!(config.bearer(), "anon");
        config.access_token = Some("jwt".into());
        assert_eq!(config.bearer(), "jwt");
    }
}
