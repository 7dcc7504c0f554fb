//! Index-scoped builder
//!
//! [`Builder`] wraps a [`Query`] with global scopes (constraints applied to
//! every query of an index unless removed) and named extensions callable by
//! string, resolved in order: local extension, shared [`ExtensionRegistry`],
//! index named scope.
//!
//! Every executing method runs on [`Builder::to_base`], so scopes reach each
//! request the builder sends; the wrapped query itself never holds them.

use crate::error::{Error, Result};
use crate::query::Query;
use crate::response::{Hit, Page, PaginatorOptions, SearchResponse};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A reusable query constraint
pub trait Scope: Send + Sync {
    fn apply(&self, query: &mut Query) -> Result<()>;
}

impl<F> Scope for F
where
    F: Fn(&mut Query) -> Result<()> + Send + Sync,
{
    fn apply(&self, query: &mut Query) -> Result<()> {
        self(query)
    }
}

/// Builder method added at runtime, called with positional arguments
pub type Extension = Arc<dyn Fn(&mut Builder, &[Value]) -> Result<()> + Send + Sync>;

/// Parameterised scope declared by an index definition
pub type NamedScope = Arc<dyn Fn(&mut Query, &[Value]) -> Result<()> + Send + Sync>;

/// Extensions shared by every builder created with this registry
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: RwLock<HashMap<String, Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, extension: F)
    where
        F: Fn(&mut Builder, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.extensions.write().insert(name.into(), Arc::new(extension));
    }

    pub fn get(&self, name: &str) -> Option<Extension> {
        self.extensions.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extensions.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.extensions.write().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.extensions.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.names())
            .finish()
    }
}

const DEFAULT_PER_PAGE: u64 = 10;

#[derive(Clone)]
pub struct Builder {
    query: Query,
    scopes: Vec<(String, Arc<dyn Scope>)>,
    removed: Vec<String>,
    local: HashMap<String, Extension>,
    registry: Arc<ExtensionRegistry>,
    named_scopes: HashMap<String, NamedScope>,
    per_page: u64,
}

impl Builder {
    pub fn new(query: Query) -> Self {
        Self::with_registry(query, Arc::new(ExtensionRegistry::new()))
    }

    pub fn with_registry(query: Query, registry: Arc<ExtensionRegistry>) -> Self {
        Self {
            query,
            scopes: Vec::new(),
            removed: Vec::new(),
            local: HashMap::new(),
            registry,
            named_scopes: HashMap::new(),
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn set_query(&mut self, query: Query) -> &mut Self {
        self.query = query;
        self
    }

    pub fn into_query(self) -> Query {
        self.query
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn set_per_page(&mut self, per_page: u64) -> &mut Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn set_named_scopes(&mut self, scopes: HashMap<String, NamedScope>) -> &mut Self {
        self.named_scopes = scopes;
        self
    }

    pub fn has_named_scope(&self, name: &str) -> bool {
        self.named_scopes.contains_key(name)
    }

    // -----------------------------------------------------------------
    // Global scopes
    // -----------------------------------------------------------------

    /// Register a scope under `identifier`, replacing any previous one
    pub fn with_scope<S>(&mut self, identifier: impl Into<String>, scope: S) -> &mut Self
    where
        S: Scope + 'static,
    {
        self.with_shared_scope(identifier, Arc::new(scope))
    }

    pub fn with_shared_scope(
        &mut self,
        identifier: impl Into<String>,
        scope: Arc<dyn Scope>,
    ) -> &mut Self {
        let identifier = identifier.into();
        self.scopes.retain(|(id, _)| *id != identifier);
        self.scopes.push((identifier, scope));
        self
    }

    pub fn without_scope(&mut self, identifier: &str) -> &mut Self {
        self.scopes.retain(|(id, _)| id != identifier);
        self.removed.push(identifier.to_string());
        self
    }

    pub fn without_scopes(&mut self) -> &mut Self {
        let identifiers: Vec<String> = self.scopes.iter().map(|(id, _)| id.clone()).collect();
        for identifier in identifiers {
            self.without_scope(&identifier);
        }
        self
    }

    /// Identifiers removed with `without_scope`, in removal order
    pub fn removed_scopes(&self) -> &[String] {
        &self.removed
    }

    pub fn scope_identifiers(&self) -> Vec<&str> {
        self.scopes.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// The wrapped query with every remaining scope applied; `self` is left
    /// untouched
    pub fn to_base(&self) -> Result<Query> {
        let mut query = self.query.clone();
        for (identifier, scope) in &self.scopes {
            tracing::trace!(scope = %identifier, "Applying scope");
            scope.apply(&mut query)?;
        }
        Ok(query)
    }

    // -----------------------------------------------------------------
    // Extensions
    // -----------------------------------------------------------------

    /// Register an extension on this builder only
    pub fn macro_<F>(&mut self, name: impl Into<String>, extension: F) -> &mut Self
    where
        F: Fn(&mut Builder, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.local.insert(name.into(), Arc::new(extension));
        self
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.local.contains_key(name) || self.registry.contains(name)
    }

    /// Invoke an extension or named scope by name
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<&mut Self> {
        let extension = self
            .local
            .get(name)
            .cloned()
            .or_else(|| self.registry.get(name));

        if let Some(extension) = extension {
            extension(self, args)?;
            return Ok(self);
        }

        if let Some(scope) = self.named_scopes.get(name).cloned() {
            scope(&mut self.query, args)?;
            return Ok(self);
        }

        Err(Error::UndefinedMethod(name.to_string()))
    }

    // -----------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------

    /// Raw search against the builder's target. A body without a `query`
    /// gets the scoped query; an explicit `query` is sent unchanged.
    pub async fn search(&self, mut body: Value) -> Result<Value> {
        let base = self.to_base()?;
        if let Value::Object(map) = &mut body {
            if !map.contains_key("query") && !base.bool_query().is_empty() {
                map.insert("query".to_string(), base.bool_query().to_value());
            }
        }
        base.search(body).await
    }

    pub async fn execute(&self) -> Result<SearchResponse> {
        self.to_base()?.execute().await
    }

    pub async fn get(&self, per_page: u64, page: u64) -> Result<Page> {
        self.to_base()?.get(per_page, page).await
    }

    pub async fn first(&self) -> Result<Option<Hit>> {
        self.to_base()?.first().await
    }

    pub async fn count(&self) -> Result<u64> {
        self.to_base()?.count().await
    }

    pub async fn find(&self, id: &str) -> Result<Option<Hit>> {
        self.to_base()?.find(id).await
    }

    pub async fn find_many<S: Into<String>>(
        &self,
        ids: impl IntoIterator<Item = S>,
    ) -> Result<Page> {
        self.to_base()?.find_many(ids).await
    }

    pub async fn avg(&self, field: &str, name: Option<&str>) -> Result<Option<f64>> {
        self.to_base()?.avg(field, name).await
    }

    pub async fn average(&self, field: &str) -> Result<Option<f64>> {
        self.to_base()?.average(field).await
    }

    pub async fn sum(&self, field: &str, name: Option<&str>) -> Result<Option<f64>> {
        self.to_base()?.sum(field, name).await
    }

    pub async fn min(&self, field: &str, name: Option<&str>) -> Result<Option<f64>> {
        self.to_base()?.min(field, name).await
    }

    pub async fn max(&self, field: &str, name: Option<&str>) -> Result<Option<f64>> {
        self.to_base()?.max(field, name).await
    }

    /// Paginate with `per_page`, falling back to the builder's page size
    pub async fn paginate(
        &self,
        per_page: Option<u64>,
        page: u64,
        options: PaginatorOptions,
    ) -> Result<Page> {
        let per_page = per_page.filter(|n| *n > 0).unwrap_or(self.per_page);
        self.to_base()?.paginate(per_page, page, options).await
    }

    /// DSL of the scoped query
    pub fn to_dsl(&self) -> Result<Value> {
        Ok(self.to_base()?.to_dsl())
    }
}

impl Deref for Builder {
    type Target = Query;

    fn deref(&self) -> &Query {
        &self.query
    }
}

impl DerefMut for Builder {
    fn deref_mut(&mut self) -> &mut Query {
        &mut self.query
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("query", &self.query)
            .field("scopes", &self.scope_identifiers())
            .field("removed", &self.removed)
            .field("per_page", &self.per_page)
            .finish()
    }
}
