//! HTTP transport to the cluster
//!
//! [`Transport`] is the seam between the typed endpoint surface and the
//! wire. [`HttpTransport`] is the reqwest-backed implementation: host
//! selection, retries on connection failures, basic auth, TLS settings,
//! sniffing and per-host AWS request signing all live here.

pub mod aws;

use crate::config::{ConnectionConfig, HostConfig, SelectorKind, SslVerification};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use url::Url;

pub use aws::AwsCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    /// Newline-delimited JSON, used by `_bulk`
    NdJson(Vec<Value>),
}

impl Body {
    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Json(_) => "application/json",
            Body::NdJson(_) => "application/x-ndjson",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Body::Json(value) => Ok(serde_json::to_vec(value)?),
            Body::NdJson(lines) => {
                let mut out = Vec::new();
                for line in lines {
                    serde_json::to_writer(&mut out, line)?;
                    out.push(b'\n');
                }
                Ok(out)
            }
        }
    }
}

/// One REST call, independent of which host serves it
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Absolute path, e.g. `/users/_search`
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::Head, path)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn ndjson(mut self, lines: Vec<Value>) -> Self {
        self.body = Some(Body::NdJson(lines));
        self
    }
}

/// Status and decoded body of a cluster reply
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// `Null` for empty bodies (HEAD), a JSON string for non-JSON text
    pub body: Value,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn 4xx/5xx replies into [`Error::Api`]
    pub fn into_result(self) -> Result<Value> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(Error::from_response(self.status, &self.body))
        }
    }
}

/// Sends requests to the cluster
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// One reachable host and how to authenticate against it
#[derive(Debug, Clone)]
struct Node {
    base_url: Url,
    user: Option<String>,
    pass: Option<String>,
    aws: Option<AwsCredentials>,
}

impl Node {
    fn from_config(host: &HostConfig) -> Result<Self> {
        let aws = if host.aws {
            match (&host.aws_key, &host.aws_secret) {
                (Some(key), Some(secret)) => Some(AwsCredentials::new(
                    host.aws_region.clone(),
                    key.clone(),
                    secret.clone(),
                )),
                _ => {
                    return Err(Error::Config(format!(
                        "AWS signing enabled for {} without aws_key/aws_secret",
                        host.host
                    )))
                }
            }
        } else {
            None
        };

        Ok(Self {
            base_url: Url::parse(&host.base_url())?,
            user: host.user.clone(),
            pass: host.pass.clone(),
            aws,
        })
    }

    fn url_for(&self, request: &Request) -> Result<Url> {
        let mut url = self.base_url.join(&request.path)?;
        if !request.params.is_empty() {
            url.query_pairs_mut().extend_pairs(request.params.iter());
        }
        Ok(url)
    }

    /// Same credentials, different address (used for sniffed nodes)
    fn with_address(&self, address: &str) -> Result<Self> {
        let mut node = self.clone();
        node.base_url = Url::parse(&format!("{}://{}", self.base_url.scheme(), address))?;
        Ok(node)
    }
}

/// reqwest-backed [`Transport`]
pub struct HttpTransport {
    client: reqwest::Client,
    nodes: RwLock<Vec<Node>>,
    selector: SelectorKind,
    cursor: AtomicUsize,
    retries: u32,
    sniff_on_start: bool,
    sniffed: OnceCell<()>,
    tracer: bool,
}

impl HttpTransport {
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        if config.hosts.is_empty() {
            return Err(Error::NoHosts);
        }

        let nodes = config
            .hosts
            .iter()
            .map(Node::from_config)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = reqwest::Client::builder();
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        match &config.ssl_verification {
            Some(SslVerification::Enabled(false)) => {
                builder = builder.danger_accept_invalid_certs(true);
            }
            Some(SslVerification::CaBundle(path)) => {
                let pem = std::fs::read(path)?;
                builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
            }
            Some(SslVerification::Enabled(true)) | None => {}
        }

        Ok(Self {
            client: builder.build()?,
            nodes: RwLock::new(nodes),
            selector: config.connection_selector,
            cursor: AtomicUsize::new(0),
            retries: config.effective_retries(),
            sniff_on_start: config.sniff_on_start,
            sniffed: OnceCell::new(),
            tracer: config.logging.tracer,
        })
    }

    /// Base URLs currently in rotation
    pub fn hosts(&self) -> Vec<String> {
        self.nodes
            .read()
            .iter()
            .map(|n| n.base_url.to_string())
            .collect()
    }

    fn select(&self) -> Node {
        let nodes = self.nodes.read();
        let index = match self.selector {
            SelectorKind::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed),
            SelectorKind::Sticky => self.cursor.load(Ordering::Relaxed),
        };
        nodes[index % nodes.len()].clone()
    }

    fn mark_dead(&self) {
        // Round robin moves on anyway; sticky only moves on failure
        if self.selector == SelectorKind::Sticky {
            self.cursor.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn sniff(&self) {
        let seed = self.select();
        let result = self
            .execute(&seed, &Request::get("/_nodes/_all/http"))
            .await
            .and_then(Response::into_result);

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Sniffing cluster nodes failed, keeping configured hosts: {}", e);
                return;
            }
        };

        let sniffed: Vec<Node> = body
            .get("nodes")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|nodes| nodes.values())
            .filter_map(|node| node.pointer("/http/publish_address").and_then(Value::as_str))
            .filter_map(|address| {
                // "hostname/10.0.0.1:9200" or "10.0.0.1:9200"
                let address = address.rsplit('/').next().unwrap_or(address);
                seed.with_address(address).ok()
            })
            .collect();

        if sniffed.is_empty() {
            tracing::debug!("Sniffing returned no HTTP nodes");
            return;
        }

        tracing::info!("Sniffed {} cluster node(s)", sniffed.len());
        *self.nodes.write() = sniffed;
    }

    async fn execute(&self, node: &Node, request: &Request) -> Result<Response> {
        let url = node.url_for(request)?;
        let body = match &request.body {
            Some(body) => Some(body.to_bytes()?),
            None => None,
        };

        let mut builder = self
            .client
            .request(request.method.to_reqwest(), url.clone());

        if let Some(body_type) = &request.body {
            builder = builder.header(reqwest::header::CONTENT_TYPE, body_type.content_type());
        }

        if let Some(user) = &node.user {
            builder = builder.basic_auth(user, node.pass.as_ref());
        }

        if let Some(credentials) = &node.aws {
            let payload = body.as_deref().unwrap_or_default();
            for (name, value) in aws::sign(
                credentials,
                request.method.as_str(),
                &url,
                payload,
                chrono::Utc::now(),
            )? {
                builder = builder.header(name, value);
            }
        }

        if self.tracer {
            if let Some(bytes) = &body {
                tracing::trace!(
                    "curl -X{} '{}' -d '{}'",
                    request.method.as_str(),
                    url,
                    String::from_utf8_lossy(bytes)
                );
            }
        }

        if let Some(bytes) = body {
            builder = builder.body(bytes);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        tracing::debug!(
            method = request.method.as_str(),
            %url,
            status,
            took_ms = start.elapsed().as_millis() as u64,
            "Elasticsearch request"
        );

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        if self.tracer {
            tracing::trace!(status, "Response: {}", body);
        }

        Ok(Response { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        if self.sniff_on_start {
            self.sniffed.get_or_init(|| self.sniff()).await;
        }

        let mut attempt = 0;
        loop {
            let node = self.select();
            match self.execute(&node, &request).await {
                Err(Error::Http(e))
                    if (e.is_connect() || e.is_timeout()) && attempt < self.retries =>
                {
                    attempt += 1;
                    self.mark_dead();
                    tracing::warn!(
                        host = %node.base_url,
                        attempt,
                        retries = self.retries,
                        "Request failed, retrying: {}",
                        e
                    );
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(hosts: &[&str], selector: SelectorKind) -> ConnectionConfig {
        ConnectionConfig {
            hosts: hosts
                .iter()
                .map(|h| HostConfig {
                    host: h.to_string(),
                    ..HostConfig::default()
                })
                .collect(),
            connection_selector: selector,
            ..ConnectionConfig::default()
        }
    }

    #[test]
    fn test_no_hosts() {
        let mut c = config(&[], SelectorKind::RoundRobin);
        c.hosts.clear();
        assert!(matches!(HttpTransport::from_config(&c), Err(Error::NoHosts)));
    }

    #[test]
    fn test_aws_without_keys_rejected() {
        let mut c = config(&["a"], SelectorKind::RoundRobin);
        c.hosts[0].aws = true;
        assert!(matches!(HttpTransport::from_config(&c), Err(Error::Config(_))));
    }

    #[test]
    fn test_round_robin_rotates() {
        let t = HttpTransport::from_config(&config(&["a", "b"], SelectorKind::RoundRobin)).unwrap();
        let picked: Vec<String> = (0..4)
            .map(|_| t.select().base_url.host_str().unwrap().to_string())
            .collect();
        assert_eq!(picked, vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_sticky_moves_only_on_failure() {
        let t = HttpTransport::from_config(&config(&["a", "b"], SelectorKind::Sticky)).unwrap();
        assert_eq!(t.select().base_url.host_str(), Some("a"));
        assert_eq!(t.select().base_url.host_str(), Some("a"));
        t.mark_dead();
        assert_eq!(t.select().base_url.host_str(), Some("b"));
    }

    #[test]
    fn test_url_for_params() {
        let node = Node::from_config(&HostConfig::default()).unwrap();
        let req = Request::get("/users/_search").param("size", "5");
        assert_eq!(
            node.url_for(&req).unwrap().as_str(),
            "http://localhost:9200/users/_search?size=5"
        );
    }

    #[test]
    fn test_ndjson_body() {
        let body = Body::NdJson(vec![json!({"index": {"_id": "1"}}), json!({"a": 1})]);
        assert_eq!(
            String::from_utf8(body.to_bytes().unwrap()).unwrap(),
            "{\"index\":{\"_id\":\"1\"}}\n{\"a\":1}\n"
        );
        assert_eq!(body.content_type(), "application/x-ndjson");
    }

    #[test]
    fn test_response_into_result() {
        let ok = Response { status: 200, body: json!({"acknowledged": true}) };
        assert_eq!(ok.into_result().unwrap(), json!({"acknowledged": true}));

        let missing = Response {
            status: 404,
            body: json!({
                "error": {"type": "index_not_found_exception", "reason": "no such index"}
            }),
        };
        assert!(missing.into_result().unwrap_err().is_not_found());
    }
}
