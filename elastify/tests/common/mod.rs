//! Shared test doubles

#![allow(dead_code)]

use async_trait::async_trait;
use elastify::transport::{Request, Response, Transport};
use elastify::{Connection, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Records every request and replays canned responses in order; once the
/// queue is empty it answers `200 {}`
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<Request>>,
    responses: Mutex<VecDeque<Response>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, body: Value) {
        self.responses.lock().push_back(Response { status, body });
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn last(&self) -> Request {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.requests.lock().push(request);
        let response = self.responses.lock().pop_front();
        Ok(response.unwrap_or(Response {
            status: 200,
            body: json!({}),
        }))
    }
}

pub fn connection(transport: &Arc<RecordingTransport>) -> Arc<Connection> {
    Arc::new(Connection::new("test", transport.clone()))
}

/// Search reply with `total` matches and the given documents as hits
pub fn search_reply(total: u64, docs: &[(&str, Value)]) -> Value {
    let hits: Vec<Value> = docs
        .iter()
        .map(|(id, source)| {
            json!({"_index": "users", "_id": id, "_score": 1.0, "_source": source})
        })
        .collect();
    json!({
        "took": 3,
        "timed_out": false,
        "_shards": {"total": 1, "successful": 1, "skipped": 0, "failed": 0},
        "hits": {
            "total": {"value": total, "relation": "eq"},
            "max_score": 1.0,
            "hits": hits
        }
    })
}

pub fn body_of(request: &Request) -> Value {
    match &request.body {
        Some(elastify::transport::Body::Json(value)) => value.clone(),
        _ => Value::Null,
    }
}
