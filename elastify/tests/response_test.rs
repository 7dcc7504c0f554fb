//! Search response accessors and the pager

use elastify::{Page, PaginatorOptions, SearchResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    name: String,
    age: u32,
}

fn response(total: u64, count: usize) -> SearchResponse {
    let hits: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "_index": "users",
                "_id": i.to_string(),
                "_score": 1.0,
                "_source": {"name": format!("user{}", i), "age": 20 + i},
                "highlight": {"name": [format!("<mark>user{}</mark>", i)]}
            })
        })
        .collect();
    SearchResponse::new(json!({
        "took": 4,
        "timed_out": false,
        "hits": {"total": total, "max_score": 1.0, "hits": hits},
        "aggregations": {
            "ages": {"buckets": [{"key": 20, "doc_count": 1}]},
            "avg_age": {"value": 21.0}
        },
        "suggest": {"fix": [{"text": "usr", "options": [{"text": "user"}]}]}
    }))
}

#[test]
fn test_missing_hits_default() {
    let response = SearchResponse::new(json!({"took": 1}));
    assert_eq!(response.total(), 0);
    assert_eq!(response.hits().count(), 0);
    assert!(response.is_empty());
    assert!(response.aggregations().is_empty());
    assert!(response.suggestions().is_empty());
    assert_eq!(response.shards().total, 0);
}

#[test]
fn test_hits_restartable() {
    let response = response(2, 2);
    assert_eq!(response.hits().len(), 2);
    let ids: Vec<String> = response
        .hits()
        .filter_map(|h| h.id().map(str::to_string))
        .collect();
    assert_eq!(ids, ["0", "1"]);
    assert_eq!(response.hits().count(), 2);
}

#[test]
fn test_hit_deserialize_and_highlight() {
    let response = response(1, 1);
    let hit = response.hits().next().unwrap();
    let user: User = hit.deserialize().unwrap();
    assert_eq!(
        user,
        User {
            name: "user0".into(),
            age: 20
        }
    );
    assert_eq!(hit.highlight("name"), vec!["<mark>user0</mark>"]);
    assert!(hit.highlight("missing").is_empty());
}

#[test]
fn test_aggregation_and_suggest_paths() {
    let response = response(1, 1);
    assert_eq!(
        response.aggregation("ages.buckets").and_then(|b| b.as_array()).map(Vec::len),
        Some(1)
    );
    assert_eq!(response.aggregation_value("avg_age"), Some(21.0));
    assert!(response.aggregation("ages.nope").is_none());
    assert!(response.suggest("fix").is_some());
}

#[test]
fn test_page_metadata_middle() {
    let page = Page::new(response(45, 10), 10, 2, PaginatorOptions::default());
    assert_eq!(page.total(), 45);
    assert_eq!(page.last_page(), 5);
    assert_eq!(page.first_item(), Some(11));
    assert_eq!(page.last_item(), Some(20));
    assert!(page.has_more_pages());
    assert!(!page.on_first_page());
    assert_eq!(page.next_page_url().as_deref(), Some("/?page=3"));
    assert_eq!(page.previous_page_url().as_deref(), Some("/?page=1"));
}

#[test]
fn test_page_last_and_empty() {
    let last = Page::new(response(45, 5), 10, 5, PaginatorOptions::default());
    assert!(!last.has_more_pages());
    assert_eq!(last.next_page_url(), None);
    assert_eq!(last.last_item(), Some(45));

    let empty = Page::new(response(0, 0), 10, 1, PaginatorOptions::default());
    assert_eq!(empty.last_page(), 1);
    assert_eq!(empty.first_item(), None);
    assert_eq!(empty.last_item(), None);
    assert!(empty.first().is_none());
}

#[test]
fn test_page_url_with_existing_query() {
    let options = PaginatorOptions {
        path: "/search?q=rust".into(),
        page_name: "page".into(),
    };
    let page = Page::new(response(30, 10), 10, 1, options);
    assert_eq!(page.url(2), "/search?q=rust&page=2");
}

#[test]
fn test_page_to_json() {
    let page = Page::new(response(25, 10), 10, 1, PaginatorOptions::default());
    let json = page.to_json();
    assert_eq!(json["current_page"], 1);
    assert_eq!(json["last_page"], 3);
    assert_eq!(json["from"], 1);
    assert_eq!(json["to"], 10);
    assert_eq!(json["total"], 25);
    assert_eq!(json["prev_page_url"], serde_json::Value::Null);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(10));
}
