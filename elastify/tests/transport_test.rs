//! HTTP transport against a mock server

use elastify::config::{ConnectionConfig, HostConfig};
use elastify::transport::{HttpTransport, Request, Transport};
use elastify::Connection;
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;

fn host_for(server: &mockito::ServerGuard) -> HostConfig {
    let address = server.socket_address();
    HostConfig {
        host: address.ip().to_string(),
        port: address.port(),
        ..HostConfig::default()
    }
}

#[tokio::test]
async fn test_search_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/users/_search")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"size": 1})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"hits": {"total": {"value": 1}, "hits": []}}"#)
        .create_async()
        .await;

    let config = ConnectionConfig {
        hosts: vec![host_for(&server)],
        ..ConnectionConfig::default()
    };
    let connection = Arc::new(Connection::from_config("default", &config).unwrap());

    let mut query = connection.index("users");
    query.limit(1);
    let response = query.execute().await.unwrap();
    assert_eq!(response.total(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_aws_signed_search_on_pattern_index() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/users-*/_search")
        .match_header(
            "authorization",
            Matcher::Regex(
                concat!(
                    r"^AWS4-HMAC-SHA256 Credential=AKID/\d{8}/us-east-1/es/aws4_request, ",
                    r"SignedHeaders=host;x-amz-content-sha256;x-amz-date, ",
                    r"Signature=[0-9a-f]{64}$",
                )
                .into(),
            ),
        )
        .match_header("x-amz-date", Matcher::Any)
        .match_header("x-amz-content-sha256", Matcher::Any)
        .with_status(200)
        .with_body(r#"{"hits": {"total": 0, "hits": []}}"#)
        .create_async()
        .await;

    let config = ConnectionConfig {
        hosts: vec![HostConfig {
            aws: true,
            aws_region: "us-east-1".into(),
            aws_key: Some("AKID".into()),
            aws_secret: Some("secret".into()),
            ..host_for(&server)
        }],
        ..ConnectionConfig::default()
    };
    let connection = Arc::new(Connection::from_config("default", &config).unwrap());

    let response = connection.index("users-*").execute().await.unwrap();
    assert_eq!(response.total(), 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_basic_auth_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .with_status(200)
        .with_body(r#"{"version": {"number": "7.10.0"}}"#)
        .create_async()
        .await;

    let config = ConnectionConfig {
        hosts: vec![HostConfig {
            user: Some("user".into()),
            pass: Some("pass".into()),
            ..host_for(&server)
        }],
        ..ConnectionConfig::default()
    };
    let connection = Connection::from_config("default", &config).unwrap();
    let info = connection.info().await.unwrap();
    assert_eq!(info["version"]["number"], "7.10.0");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_retries_next_host_on_connect_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/_cluster/health")
        .with_status(200)
        .with_body(r#"{"status": "green"}"#)
        .create_async()
        .await;

    // Nothing listens on port 1
    let dead = HostConfig {
        host: "127.0.0.1".into(),
        port: 1,
        ..HostConfig::default()
    };
    let config = ConnectionConfig {
        hosts: vec![dead, host_for(&server)],
        ..ConnectionConfig::default()
    };
    let transport = HttpTransport::from_config(&config).unwrap();

    let response = transport
        .send(Request::get("/_cluster/health"))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body["status"], "green");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_no_retries_surfaces_connect_error() {
    let dead = HostConfig {
        host: "127.0.0.1".into(),
        port: 1,
        ..HostConfig::default()
    };
    let config = ConnectionConfig {
        hosts: vec![dead],
        retries: Some(0),
        ..ConnectionConfig::default()
    };
    let connection = Connection::from_config("default", &config).unwrap();
    assert!(!connection.ping().await.unwrap());
}

#[tokio::test]
async fn test_query_params_and_error_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/users")
        .match_query(Matcher::UrlEncoded("timeout".into(), "5s".into()))
        .with_status(404)
        .with_body(
            json!({
                "error": {
                    "type": "index_not_found_exception",
                    "reason": "no such index [users]"
                },
                "status": 404
            })
            .to_string(),
        )
        .create_async()
        .await;

    let config = ConnectionConfig {
        hosts: vec![host_for(&server)],
        ..ConnectionConfig::default()
    };
    let connection = Connection::from_config("default", &config).unwrap();
    let err = connection
        .perform(Request::delete("/users").param("timeout", "5s"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.status(), Some(404));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_index_exists_head() {
    let mut server = mockito::Server::new_async().await;
    let present = server
        .mock("HEAD", "/users")
        .with_status(200)
        .create_async()
        .await;
    let missing = server
        .mock("HEAD", "/orders")
        .with_status(404)
        .create_async()
        .await;

    let config = ConnectionConfig {
        hosts: vec![host_for(&server)],
        ..ConnectionConfig::default()
    };
    let connection = Connection::from_config("default", &config).unwrap();
    assert!(connection.indices().exists("users").await.unwrap());
    assert!(!connection.indices().exists("orders").await.unwrap());
    present.assert_async().await;
    missing.assert_async().await;
}

#[tokio::test]
async fn test_bulk_sends_ndjson() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/_bulk")
        .match_header("content-type", "application/x-ndjson")
        .match_body(
            "{\"index\":{\"_index\":\"users\"}}\n{\"name\":\"alice\"}\n",
        )
        .with_status(200)
        .with_body(r#"{"errors": false, "items": []}"#)
        .create_async()
        .await;

    let config = ConnectionConfig {
        hosts: vec![host_for(&server)],
        ..ConnectionConfig::default()
    };
    let connection = Connection::from_config("default", &config).unwrap();
    let response = connection
        .bulk(vec![
            json!({"index": {"_index": "users"}}),
            json!({"name": "alice"}),
        ])
        .await
        .unwrap();
    assert_eq!(response["errors"], false);
    mock.assert_async().await;
}
