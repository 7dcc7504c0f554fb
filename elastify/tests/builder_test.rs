//! Query DSL shapes and the index-scoped builder

mod common;

use common::{body_of, connection, search_reply, RecordingTransport};
use elastify::builder::NamedScope;
use elastify::query::{Aggregation, Suggestion};
use elastify::transport::Method;
use elastify::{
    Builder, BoolContext, Error, ExtensionRegistry, Index, IndexDefinition, Query, Result,
    ScoreMode, Scope, SortOrder,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

// ── Query DSL ───────────────────────────────────────────────────────────────

#[test]
fn test_where_or_where_limit_scenario() {
    let mut query = Query::new();
    query
        .from("users")
        .where_("status", "=", "active")
        .unwrap()
        .or_where("status", "=", "pending")
        .unwrap()
        .limit(5);

    assert_eq!(
        query.to_dsl(),
        json!({
            "query": {"bool": {
                "must": [{"term": {"status": "active"}}],
                "should": [{"term": {"status": "pending"}}]
            }},
            "size": 5
        })
    );
}

#[test]
fn test_empty_query_serializes_to_empty_object() {
    let dsl = Query::new().to_dsl();
    assert_eq!(dsl, json!({}));
    let reparsed: Value = serde_json::from_str(&dsl.to_string()).unwrap();
    assert_eq!(reparsed, dsl);
}

#[test]
fn test_default_highlight() {
    let mut query = Query::new();
    query.highlight_default();
    assert_eq!(
        query.to_dsl()["highlight"],
        json!({
            "fields": {"_all": {}},
            "pre_tags": ["<mark>"],
            "post_tags": ["</mark>"]
        })
    );
}

#[test]
fn test_null_comparisons() {
    let mut query = Query::new();
    query.where_("deleted_at", "=", Value::Null).unwrap();
    query.where_("email", "!=", Value::Null).unwrap();
    query.where_("role", "<>", "guest").unwrap();

    assert_eq!(
        query.to_dsl()["query"]["bool"]["must"],
        json!([
            {"bool": {"must_not": [{"exists": {"field": "deleted_at"}}]}},
            {"exists": {"field": "email"}},
            {"bool": {"must_not": [{"term": {"role": "guest"}}]}}
        ])
    );
}

#[test]
fn test_context_switching_full_document() {
    let mut query = Query::new();
    query
        .match_("title", "rust")
        .filter()
        .range("published_at", json!({"gte": "2020-01-01"}))
        .must_not()
        .term("draft", true)
        .should()
        .prefix("tags", "lang");

    let root = query.bool_query();
    assert_eq!(root.bucket(BoolContext::Must).len(), 1);
    assert_eq!(root.bucket(BoolContext::Filter).len(), 1);
    assert_eq!(root.bucket(BoolContext::MustNot).len(), 1);
    assert_eq!(root.bucket(BoolContext::Should).len(), 1);
    assert_eq!(
        query.to_dsl()["query"]["bool"]["filter"][0],
        json!({"range": {"published_at": {"gte": "2020-01-01"}}})
    );
}

#[test]
fn test_nested_with_sort_and_aggregations() {
    let mut query = Query::new();
    query
        .nested(
            "comments",
            |sub| {
                sub.match_("comments.body", "great");
                Ok(())
            },
            ScoreMode::Max,
        )
        .unwrap()
        .sort_by(["created_at"], Some(SortOrder::Desc), Default::default())
        .aggregate(|aggs: &mut Aggregation| {
            aggs.terms("by_tag", "tags").aggregate(|sub: &mut Aggregation| {
                sub.average("avg_score", "score");
            });
        })
        .suggest(|s: &mut Suggestion| {
            s.completion("names", "ali", None);
        });

    let dsl = query.to_dsl();
    assert_eq!(
        dsl["query"]["bool"]["must"][0]["nested"],
        json!({
            "path": "comments",
            "score_mode": "max",
            "query": {"bool": {"must": [{"match": {"comments.body": {"query": "great"}}}]}}
        })
    );
    assert_eq!(dsl["sort"], json!([{"created_at": {"order": "desc"}}]));
    assert_eq!(
        dsl["aggs"]["by_tag"],
        json!({
            "terms": {"field": "tags"},
            "aggs": {"avg_score": {"avg": {"field": "score"}}}
        })
    );
    assert_eq!(
        dsl["suggest"]["names"],
        json!({"text": "ali", "completion": {"field": "suggest"}})
    );
}

#[test]
fn test_invalid_bool_context() {
    let mut query = Query::new();
    let err = query.bool_context("nand").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid argument: Illegal bool query operation [nand]"
    );
    assert_eq!(query.current_context(), BoolContext::Must);
}

// ── Builder ─────────────────────────────────────────────────────────────────

struct PostIndex;

impl IndexDefinition for PostIndex {
    fn multiple_indices(&self) -> bool {
        false
    }

    fn per_page(&self) -> u64 {
        15
    }

    fn settings(&self) -> Value {
        json!({"number_of_shards": 1})
    }

    fn properties(&self) -> Value {
        json!({"title": {"type": "text"}, "published": {"type": "boolean"}})
    }

    fn scopes(&self) -> Vec<(String, Arc<dyn Scope>)> {
        let published: Arc<dyn Scope> = Arc::new(|query: &mut Query| -> Result<()> {
            query.append_to(BoolContext::Filter, elastify::Clause::term("published", true));
            Ok(())
        });
        vec![("published".to_string(), published)]
    }

    fn named_scopes(&self) -> HashMap<String, NamedScope> {
        let mut scopes: HashMap<String, NamedScope> = HashMap::new();
        scopes.insert(
            "popular".into(),
            Arc::new(|query: &mut Query, args: &[Value]| {
                let min = args.first().cloned().unwrap_or(json!(100));
                query.where_("views", ">=", min)?;
                Ok(())
            }),
        );
        scopes
    }
}

#[tokio::test]
async fn test_index_query_applies_scopes_on_execution() {
    let transport = RecordingTransport::new();
    transport.reply(200, search_reply(1, &[("1", json!({"title": "hello"}))]));
    let index = Index::new(PostIndex, connection(&transport));

    let mut builder = index.query();
    builder.match_("title", "hello");
    let page = builder.paginate(None, 1, Default::default()).await.unwrap();
    assert_eq!(page.per_page(), 15);

    let request = transport.last();
    assert_eq!(request.path, "/posts/_search");
    let body = body_of(&request);
    assert_eq!(body["size"], 15);
    assert_eq!(
        body["query"]["bool"]["filter"],
        json!([{"term": {"published": true}}])
    );
    // The builder itself never receives scope clauses
    assert!(builder.bool_query().filter.is_empty());
}

fn published_filter(request: &elastify::Request) -> Value {
    body_of(request)["query"]["bool"]["filter"].clone()
}

#[tokio::test]
async fn test_scoped_execute_and_find() {
    let transport = RecordingTransport::new();
    transport.reply(200, search_reply(1, &[("1", json!({}))]));
    transport.reply(200, search_reply(1, &[("7", json!({}))]));
    transport.reply(200, search_reply(2, &[("7", json!({})), ("8", json!({}))]));
    let index = Index::new(PostIndex, connection(&transport));
    let scoped = json!([{"term": {"published": true}}]);

    let builder = index.query();
    assert_eq!(builder.execute().await.unwrap().total(), 1);
    assert_eq!(published_filter(&transport.last()), scoped);

    let hit = builder.find("7").await.unwrap().unwrap();
    assert_eq!(hit.id(), Some("7"));
    let body = body_of(&transport.last());
    assert_eq!(body["query"]["bool"]["filter"], scoped);
    assert_eq!(
        body["query"]["bool"]["must"],
        json!([{"ids": {"values": ["7"]}}])
    );

    let page = builder.find_many(["7", "8"]).await.unwrap();
    assert_eq!(page.count(), 2);
    assert_eq!(published_filter(&transport.last()), scoped);
}

#[tokio::test]
async fn test_scoped_metrics() {
    let transport = RecordingTransport::new();
    let index = Index::new(PostIndex, connection(&transport));
    let builder = index.query();

    builder.avg("views", None).await.unwrap();
    builder.average("views").await.unwrap();
    builder.sum("views", None).await.unwrap();
    builder.min("views", None).await.unwrap();
    builder.max("views", None).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 5);
    for (request, function) in requests.iter().zip(["avg", "avg", "sum", "min", "max"]) {
        let body = body_of(request);
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{"term": {"published": true}}]),
            "{} request lost the scope",
            function
        );
        let name = format!("{}_views", function);
        assert_eq!(body["aggs"][name.as_str()][function]["field"], "views");
    }
}

#[tokio::test]
async fn test_scoped_raw_search() {
    let transport = RecordingTransport::new();
    let index = Index::new(PostIndex, connection(&transport));
    let builder = index.query();

    builder.search(json!({"size": 3})).await.unwrap();
    let request = transport.last();
    assert_eq!(request.path, "/posts/_search");
    let body = body_of(&request);
    assert_eq!(body["size"], 3);
    assert_eq!(
        body["query"]["bool"]["filter"],
        json!([{"term": {"published": true}}])
    );

    let explicit = json!({"query": {"match_all": {}}});
    builder.search(explicit.clone()).await.unwrap();
    assert_eq!(body_of(&transport.last()), explicit);
}

#[tokio::test]
async fn test_index_query_without_scopes() {
    let transport = RecordingTransport::new();
    let index = Index::new(PostIndex, connection(&transport));

    let builder = index.query_without_scopes();
    builder.count().await.unwrap();
    assert!(transport.last().body.is_none());

    let mut scoped = index.query();
    scoped.without_scope("published");
    assert_eq!(scoped.removed_scopes(), ["published"]);
    assert_eq!(scoped.to_dsl().unwrap(), json!({}));
}

#[test]
fn test_named_scope_call() {
    let transport = RecordingTransport::new();
    let index = Index::new(PostIndex, connection(&transport));

    let mut builder = index.query_without_scopes();
    builder.call("popular", &[json!(500)]).unwrap();
    assert_eq!(
        builder.to_dsl().unwrap()["query"]["bool"]["must"],
        json!([{"range": {"views": {"gte": 500}}}])
    );

    let err = builder.call("unpopular", &[]).unwrap_err();
    assert!(matches!(err, Error::UndefinedMethod(name) if name == "unpopular"));
}

#[test]
fn test_registry_extension_shared_across_builders() {
    let registry = Arc::new(ExtensionRegistry::new());
    registry.register("recent", |builder: &mut Builder, _: &[Value]| {
        builder.sort_by(["created_at"], Some(SortOrder::Desc), Default::default());
        Ok(())
    });

    let transport = RecordingTransport::new();
    let index = Index::with_registry(PostIndex, connection(&transport), Arc::clone(&registry));

    for _ in 0..2 {
        let mut builder = index.query_without_scopes();
        builder.call("recent", &[]).unwrap();
        assert_eq!(builder.sorts().len(), 1);
    }

    // Named scopes lose to registry extensions of the same name
    registry.register("popular", |builder: &mut Builder, _: &[Value]| {
        builder.limit(1);
        Ok(())
    });
    let mut builder = index.query_without_scopes();
    builder.call("popular", &[]).unwrap();
    assert_eq!(builder.get_limit(), Some(1));
    assert!(builder.bool_query().is_empty());
}

#[tokio::test]
async fn test_index_lifecycle() {
    let transport = RecordingTransport::new();
    transport.reply(404, Value::Null);
    let index = Index::new(PostIndex, connection(&transport));

    assert!(!index.exists().await.unwrap());
    assert!(!index.exists().await.unwrap());
    assert_eq!(transport.requests().len(), 1, "exists is cached");

    index.create().await.unwrap();
    let request = transport.last();
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.path, "/posts");
    let body = body_of(&request);
    assert_eq!(body["settings"], json!({"number_of_shards": 1}));
    assert_eq!(body["aliases"], json!({".posts": {}}));
    assert_eq!(body["mappings"]["properties"]["title"]["type"], "text");
    assert!(index.exists().await.unwrap());

    index
        .update(&json!({"settings": {"refresh_interval": "5s"}, "mappings": {}}))
        .await
        .unwrap();
    let request = transport.last();
    assert_eq!(request.path, "/posts/_settings");
    assert_eq!(body_of(&request), json!({"settings": {"refresh_interval": "5s"}}));

    index.flush().await.unwrap();
    assert_eq!(transport.last().path, "/posts/_flush");

    index.delete().await.unwrap();
    assert_eq!(transport.last().method, Method::Delete);
    assert!(!index.exists().await.unwrap());
}

#[tokio::test]
async fn test_index_aliases_cached() {
    let transport = RecordingTransport::new();
    transport.reply(200, json!({"posts": {"aliases": {".posts": {}}}}));
    let index = Index::new(PostIndex, connection(&transport));

    assert_eq!(index.aliases().await.unwrap(), json!({".posts": {}}));
    assert_eq!(index.aliases().await.unwrap(), json!({".posts": {}}));
    assert_eq!(transport.requests().len(), 1);

    index.forget();
    index.aliases().await.unwrap();
    assert_eq!(transport.requests().len(), 2);
}
