//! Fluent query builder for Elasticsearch
//!
//! elastify builds Query DSL request bodies through a chainable, typed API
//! and runs them over a named, lazily created connection.
//!
//! # Layers
//!
//! - [`query`]: clause model and the fluent [`Query`] builder
//! - [`builder`]: index-scoped [`Builder`] with global scopes and extensions
//! - [`index`]: [`IndexDefinition`] and lifecycle helpers
//! - [`response`]: [`SearchResponse`] and the [`Page`] pager
//! - [`connection`]: [`Connection`] endpoints and the [`ConnectionManager`]
//! - [`transport`]: HTTP transport with host selection, retries and AWS signing
//! - [`config`] / [`logging`]: connection configuration and log drivers
//!
//! # Example
//!
//! ```no_run
//! use elastify::{ConnectionManager, ElasticsearchConfig};
//!
//! # async fn run() -> elastify::Result<()> {
//! let manager = ConnectionManager::new(ElasticsearchConfig::from_env());
//! let mut query = manager.query()?;
//! query
//!     .from("users")
//!     .where_("status", "=", "active")?
//!     .or_where("status", "=", "pending")?
//!     .limit(5);
//!
//! let page = query.get(5, 1).await?;
//! for hit in page.items() {
//!     println!("{} {}", hit.id().unwrap_or_default(), hit.source());
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod connection;
pub mod error;
pub mod index;
pub mod logging;
pub mod query;
pub mod response;
pub mod transport;

pub use builder::{Builder, ExtensionRegistry, Scope};
pub use config::{ConnectionConfig, ElasticsearchConfig, HostConfig, LoggingConfig};
pub use connection::{Connection, ConnectionManager};
pub use error::{Error, Result};
pub use index::{Index, IndexDefinition};
pub use query::{
    Aggregation, BoolContext, Clause, Query, ScoreMode, SortOrder, Suggestion,
};
pub use response::{Hit, Page, PaginatorOptions, SearchResponse};
pub use transport::{HttpTransport, Request, Response, Transport};
