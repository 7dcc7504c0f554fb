//! Typed REST surface over a [`Transport`]

pub mod manager;

pub use manager::{ConnectionManager, ConnectionResolver};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::logging::LogDriver;
use crate::query::Query;
use crate::transport::{HttpTransport, Request, Response, Transport};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// `/{index}/{type}/{endpoint}` with empty segments dropped
pub(crate) fn path(index: &str, doc_type: Option<&str>, endpoint: &str) -> String {
    let segments: Vec<&str> = [index, doc_type.unwrap_or(""), endpoint]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// A named cluster connection
pub struct Connection {
    name: String,
    transport: Arc<dyn Transport>,
    span: tracing::Span,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("name", &self.name).finish()
    }
}

impl Connection {
    pub fn new(name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let name = name.into();
        let span = tracing::debug_span!("elasticsearch", connection = %name);
        Self {
            name,
            transport,
            span,
        }
    }

    /// Build an HTTP connection from configuration
    pub fn from_config(name: impl Into<String>, config: &ConnectionConfig) -> Result<Self> {
        let name = name.into();
        let transport = HttpTransport::from_config(config)?;
        let driver = LogDriver::from_config(&config.logging);
        let span = match driver.channel() {
            Some(channel) => {
                tracing::debug_span!("elasticsearch", connection = %name, channel = %channel)
            }
            None => tracing::debug_span!("elasticsearch", connection = %name),
        };

        tracing::debug!(
            connection = %name,
            hosts = ?transport.hosts(),
            "Created Elasticsearch connection"
        );

        Ok(Self {
            name,
            transport: Arc::new(transport),
            span,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send a raw request; the response status is left to the caller
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.transport
            .send(request)
            .instrument(self.span.clone())
            .await
    }

    /// Send a raw request and fail on non-2xx replies
    pub async fn perform(&self, request: Request) -> Result<Value> {
        self.send(request).await?.into_result()
    }

    /// New query builder on this connection
    pub fn query(self: &Arc<Self>) -> Query {
        Query::with_connection(Arc::clone(self))
    }

    /// New query builder targeting `index`
    pub fn index(self: &Arc<Self>, index: &str) -> Query {
        let mut query = self.query();
        query.from(index);
        query
    }

    pub fn indices(&self) -> Indices<'_> {
        Indices { connection: self }
    }

    // -----------------------------------------------------------------
    // Cluster
    // -----------------------------------------------------------------

    /// `false` on connection failures as well as non-2xx replies
    pub async fn ping(&self) -> Result<bool> {
        match self.send(Request::head("/")).await {
            Ok(response) => Ok(response.is_success()),
            Err(Error::Http(e)) => {
                tracing::debug!("Ping failed: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn info(&self) -> Result<Value> {
        self.perform(Request::get("/")).await
    }

    // -----------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------

    pub async fn search(&self, index: &str, doc_type: Option<&str>, body: Value) -> Result<Value> {
        self.perform(Request::post(path(index, doc_type, "_search")).json(body))
            .await
    }

    pub async fn count(
        &self,
        index: &str,
        doc_type: Option<&str>,
        body: Option<Value>,
    ) -> Result<Value> {
        let mut request = Request::post(path(index, doc_type, "_count"));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.perform(request).await
    }

    // -----------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------

    /// Index a document, letting the cluster pick an id when `id` is `None`
    pub async fn index_document(
        &self,
        index: &str,
        doc_type: Option<&str>,
        id: Option<&str>,
        document: Value,
    ) -> Result<Value> {
        let base = path(index, Some(doc_type.unwrap_or("_doc")), "");
        let request = match id {
            Some(id) => Request::put(format!("{}/{}", base, id)),
            None => Request::post(base),
        };
        self.perform(request.json(document)).await
    }

    pub async fn get(&self, index: &str, doc_type: Option<&str>, id: &str) -> Result<Value> {
        self.perform(Request::get(path(
            index,
            Some(doc_type.unwrap_or("_doc")),
            id,
        )))
        .await
    }

    pub async fn delete(&self, index: &str, doc_type: Option<&str>, id: &str) -> Result<Value> {
        self.perform(Request::delete(path(
            index,
            Some(doc_type.unwrap_or("_doc")),
            id,
        )))
        .await
    }

    /// Partial update; `body` is the update request (`{"doc": ...}` or a script)
    pub async fn update(
        &self,
        index: &str,
        doc_type: Option<&str>,
        id: &str,
        body: Value,
    ) -> Result<Value> {
        let endpoint = match doc_type {
            Some(doc_type) => path(index, Some(doc_type), &format!("{}/_update", id)),
            None => path(index, Some("_update"), id),
        };
        self.perform(Request::post(endpoint).json(body)).await
    }

    /// Bulk API; `lines` are action and source objects in order
    pub async fn bulk(&self, lines: Vec<Value>) -> Result<Value> {
        self.perform(Request::post("/_bulk").ndjson(lines)).await
    }
}

/// Index management endpoints
#[derive(Debug, Clone, Copy)]
pub struct Indices<'a> {
    connection: &'a Connection,
}

impl<'a> Indices<'a> {
    pub async fn exists(&self, index: &str) -> Result<bool> {
        let response = self.connection.send(Request::head(path(index, None, ""))).await?;
        match response.status {
            200..=299 => Ok(true),
            404 => Ok(false),
            status => Err(Error::from_response(status, &response.body)),
        }
    }

    /// Create an index; an empty `body` sends no payload
    pub async fn create(&self, index: &str, body: Value) -> Result<Value> {
        let mut request = Request::put(path(index, None, ""));
        if !is_empty(&body) {
            request = request.json(body);
        }
        self.connection.perform(request).await
    }

    pub async fn delete(&self, index: &str) -> Result<Value> {
        self.connection
            .perform(Request::delete(path(index, None, "")))
            .await
    }

    pub async fn flush(&self, index: &str) -> Result<Value> {
        self.connection
            .perform(Request::post(path(index, None, "_flush")))
            .await
    }

    pub async fn refresh(&self, index: &str) -> Result<Value> {
        self.connection
            .perform(Request::post(path(index, None, "_refresh")))
            .await
    }

    pub async fn put_settings(&self, index: &str, settings: Value) -> Result<Value> {
        self.connection
            .perform(
                Request::put(path(index, None, "_settings"))
                    .json(serde_json::json!({ "settings": settings })),
            )
            .await
    }

    pub async fn put_mapping(
        &self,
        index: &str,
        doc_type: Option<&str>,
        mappings: Value,
    ) -> Result<Value> {
        self.connection
            .perform(Request::put(path(index, doc_type, "_mapping")).json(mappings))
            .await
    }

    /// Alias map of `index`, empty when it has none
    pub async fn get_aliases(&self, index: &str) -> Result<Value> {
        let response = self
            .connection
            .perform(Request::get(path(index, None, "_alias")))
            .await?;

        // Keyed by concrete index name, which may differ from `index` for patterns
        let aliases = response
            .get(index)
            .or_else(|| response.as_object().and_then(|m| m.values().next()))
            .and_then(|entry| entry.get("aliases"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        Ok(aliases)
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
