//! Search response wrapper and paginator
//!
//! [`SearchResponse`] is a read-only view over the raw JSON returned by the
//! `_search` endpoint. Accessors never fail on missing sections: absent
//! hits, aggregations or suggestions read as empty, absent counters as zero.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

fn empty_map() -> &'static Map<String, Value> {
    static EMPTY: OnceLock<Map<String, Value>> = OnceLock::new();
    EMPTY.get_or_init(Map::new)
}

/// Follow a dot separated path through nested objects
fn lookup<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = root.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

/// Shard counters of a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Shards {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub failed: u64,
}

/// One matched document
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    raw: Value,
}

impl Hit {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn id(&self) -> Option<&str> {
        self.raw.get("_id").and_then(Value::as_str)
    }

    pub fn index(&self) -> Option<&str> {
        self.raw.get("_index").and_then(Value::as_str)
    }

    pub fn score(&self) -> Option<f64> {
        self.raw.get("_score").and_then(Value::as_f64)
    }

    /// `_source`, or `Null` when source was disabled
    pub fn source(&self) -> &Value {
        self.raw.get("_source").unwrap_or(&Value::Null)
    }

    /// One field of `_source`
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.source().get(field)
    }

    /// Highlighted fragments for `field`
    pub fn highlight(&self, field: &str) -> Vec<&str> {
        self.raw
            .get("highlight")
            .and_then(|h| h.get(field))
            .and_then(Value::as_array)
            .map(|fragments| fragments.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Deserialize `_source` into a document type
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(self.source())?)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

/// Lazy iterator over `hits.hits`; call [`SearchResponse::hits`] again to restart
#[derive(Debug, Clone)]
pub struct Hits<'a> {
    inner: std::slice::Iter<'a, Value>,
}

impl Iterator for Hits<'_> {
    type Item = Hit;

    fn next(&mut self) -> Option<Hit> {
        self.inner.next().map(|raw| Hit::new(raw.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Hits<'_> {}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    raw: Value,
}

impl SearchResponse {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn took(&self) -> u64 {
        self.raw.get("took").and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn timed_out(&self) -> bool {
        self.raw
            .get("timed_out")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn shards(&self) -> Shards {
        self.raw
            .get("_shards")
            .and_then(|s| Shards::deserialize(s).ok())
            .unwrap_or_default()
    }

    fn hit_list(&self) -> &[Value] {
        self.raw
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn hits(&self) -> Hits<'_> {
        Hits {
            inner: self.hit_list().iter(),
        }
    }

    /// Hits on this response (not the total match count)
    pub fn len(&self) -> usize {
        self.hit_list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hit_list().is_empty()
    }

    /// Total matches; accepts both `"total": 42` and `"total": {"value": 42, ...}`
    pub fn total(&self) -> u64 {
        match self.raw.pointer("/hits/total") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
            None => 0,
        }
    }

    /// `eq` or `gte` on clusters that report it
    pub fn total_relation(&self) -> Option<&str> {
        self.raw
            .pointer("/hits/total/relation")
            .and_then(Value::as_str)
    }

    pub fn max_score(&self) -> Option<f64> {
        self.raw.pointer("/hits/max_score").and_then(Value::as_f64)
    }

    pub fn aggregations(&self) -> &Map<String, Value> {
        self.raw
            .get("aggregations")
            .and_then(Value::as_object)
            .unwrap_or(empty_map())
    }

    /// Aggregation result by dot path, e.g. `by_category.buckets`
    pub fn aggregation(&self, path: &str) -> Option<&Value> {
        lookup(self.aggregations(), path)
    }

    /// `value` of a single-value metric aggregation
    pub fn aggregation_value(&self, name: &str) -> Option<f64> {
        self.aggregation(name)
            .and_then(|agg| agg.get("value"))
            .and_then(Value::as_f64)
    }

    pub fn suggestions(&self) -> &Map<String, Value> {
        self.raw
            .get("suggest")
            .and_then(Value::as_object)
            .unwrap_or(empty_map())
    }

    pub fn suggest(&self, path: &str) -> Option<&Value> {
        lookup(self.suggestions(), path)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

/// Where page links point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatorOptions {
    pub path: String,
    pub page_name: String,
}

impl Default for PaginatorOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            page_name: "page".to_string(),
        }
    }
}

/// One page of search results with length-aware pagination metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    response: SearchResponse,
    per_page: u64,
    current_page: u64,
    options: PaginatorOptions,
}

impl Page {
    pub fn new(
        response: SearchResponse,
        per_page: u64,
        current_page: u64,
        options: PaginatorOptions,
    ) -> Self {
        Self {
            response,
            per_page: per_page.max(1),
            current_page: current_page.max(1),
            options,
        }
    }

    pub fn response(&self) -> &SearchResponse {
        &self.response
    }

    pub fn into_response(self) -> SearchResponse {
        self.response
    }

    pub fn items(&self) -> Hits<'_> {
        self.response.hits()
    }

    pub fn first(&self) -> Option<Hit> {
        self.items().next()
    }

    /// Hits on this page
    pub fn count(&self) -> u64 {
        self.response.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn total(&self) -> u64 {
        self.response.total()
    }

    pub fn last_page(&self) -> u64 {
        self.total().div_ceil(self.per_page).max(1)
    }

    /// 1-based position of the first hit on this page
    pub fn first_item(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some((self.current_page - 1) * self.per_page + 1)
        }
    }

    pub fn last_item(&self) -> Option<u64> {
        self.first_item().map(|first| first + self.count() - 1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    pub fn on_first_page(&self) -> bool {
        self.current_page <= 1
    }

    pub fn url(&self, page: u64) -> String {
        let page = page.max(1);
        let separator = if self.options.path.contains('?') {
            '&'
        } else {
            '?'
        };
        let name: String = url::form_urlencoded::byte_serialize(self.options.page_name.as_bytes())
            .collect();
        format!("{}{}{}={}", self.options.path, separator, name, page)
    }

    pub fn next_page_url(&self) -> Option<String> {
        self.has_more_pages()
            .then(|| self.url(self.current_page + 1))
    }

    pub fn previous_page_url(&self) -> Option<String> {
        (self.current_page > 1).then(|| self.url(self.current_page - 1))
    }

    /// Serialized paginator: metadata plus the raw hits under `data`
    pub fn to_json(&self) -> Value {
        json!({
            "current_page": self.current_page,
            "data": self.response.hit_list(),
            "first_page_url": self.url(1),
            "from": self.first_item(),
            "last_page": self.last_page(),
            "last_page_url": self.url(self.last_page()),
            "next_page_url": self.next_page_url(),
            "path": self.options.path,
            "per_page": self.per_page,
            "prev_page_url": self.previous_page_url(),
            "to": self.last_item(),
            "total": self.total(),
        })
    }
}
