//! List filtering and sorting
//!
//! Applied to JSON rows coming out of the table store:
//! search → equality filters → stable sort → offset/limit.
//!
//! Missing and null sort values always go last, in both directions. The
//! descending order flips the comparison result only, so rows that compare
//! equal keep their input order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggle(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(format!("Invalid sort direction: {}", other)),
        }
    }
}

/// What to show from a list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive substring over string fields
    pub search: Option<String>,
    /// Field equality filters
    pub filters: Vec<(String, String)>,
    pub sort: Option<String>,
    pub direction: SortDirection,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: free-text search
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Builder method: require `field == value`
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Builder method: sort by a field
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(field.into());
        self.direction = direction;
        self
    }

    /// Builder method: page window
    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Build from query-string parameters
    ///
    /// `q`, `sort`, `dir`, `limit` and `offset` are reserved; every other
    /// parameter becomes an equality filter.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let mut query = ListQuery::new();
        let mut filters: Vec<(String, String)> = Vec::new();

        for (name, value) in params {
            match name.as_str() {
                "q" => {
                    if !value.trim().is_empty() {
                        query.search = Some(value.clone());
                    }
                }
                "sort" => query.sort = Some(value.clone()),
                "dir" => query.direction = value.parse()?,
                "limit" => {
                    query.limit = Some(
                        value
                            .parse()
                            .map_err(|_| format!("Invalid limit: {}", value))?,
                    )
                }
                "offset" => {
                    query.offset = value
                        .parse()
                        .map_err(|_| format!("Invalid offset: {}", value))?
                }
                _ => filters.push((name.clone(), value.clone())),
            }
        }

        filters.sort();
        query.filters = filters;
        Ok(query)
    }
}

/// Result of applying a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    /// Matches before paging
    pub total: usize,
    pub rows: Vec<Value>,
}

/// Search, filter, sort and page `rows`
pub fn apply(rows: Vec<Value>, query: &ListQuery) -> Listing {
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut matched: Vec<Value> = rows
        .into_iter()
        .filter(|row| needle.as_deref().map(|n| matches_search(row, n)).unwrap_or(true))
        .filter(|row| {
            query
                .filters
                .iter()
                .all(|(field, expected)| matches_filter(row.get(field), expected))
        })
        .collect();

    if let Some(field) = &query.sort {
        matched.sort_by(|a, b| compare_fields(a.get(field), b.get(field), query.direction));
    }

    let total = matched.len();
    let rows = matched
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();

    Listing { total, rows }
}

/// Stable typed sort
pub fn sort_by_key<T, K, F>(items: &mut [T], key: F, direction: SortDirection)
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.sort_by(|a, b| direction.apply(key(a).cmp(&key(b))));
}

fn matches_search(row: &Value, needle: &str) -> bool {
    match row {
        Value::Object(map) => map.values().any(|v| match v {
            Value::String(s) => s.to_lowercase().contains(needle),
            _ => false,
        }),
        Value::String(s) => s.to_lowercase().contains(needle),
        _ => false,
    }
}

fn matches_filter(value: Option<&Value>, expected: &str) -> bool {
    match value {
        None | Some(Value::Null) => expected.eq_ignore_ascii_case("null"),
        Some(Value::String(s)) => s.eq_ignore_ascii_case(expected),
        Some(Value::Number(n)) => match (n.as_f64(), expected.parse::<f64>()) {
            (Some(a), Ok(b)) => a == b,
            _ => false,
        },
        Some(Value::Bool(b)) => expected.parse::<bool>().map(|e| e == *b).unwrap_or(false),
        Some(other) => other.to_string() == expected,
    }
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => direction.apply(compare_values(a, b)),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
