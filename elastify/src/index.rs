//! Index definitions
//!
//! An [`IndexDefinition`] describes one logical index: its name, settings,
//! mappings, aliases, default page size and scopes. [`Index`] binds a
//! definition to a [`Connection`] for querying and lifecycle management.
//!
//! ```
//! use elastify::index::IndexDefinition;
//! use serde_json::{json, Value};
//!
//! struct UserIndex;
//!
//! impl IndexDefinition for UserIndex {
//!     fn multiple_indices(&self) -> bool {
//!         false
//!     }
//!
//!     fn properties(&self) -> Value {
//!         json!({"name": {"type": "text"}})
//!     }
//! }
//!
//! assert_eq!(UserIndex.name(), "users");
//! assert_eq!(UserIndex.searchable_as(), "users");
//! ```

use crate::builder::{Builder, ExtensionRegistry, NamedScope, Scope};
use crate::connection::Connection;
use crate::error::Result;
use crate::query::Query;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub trait IndexDefinition: Send + Sync + 'static {
    /// Base index name; defaults to the type name without its `Index`
    /// suffix, pluralised and snake-cased (`UserProfileIndex` gives
    /// `user_profiles`)
    fn name(&self) -> String {
        default_name(std::any::type_name::<Self>())
    }

    /// Write to one index per day and search across all of them
    fn multiple_indices(&self) -> bool {
        true
    }

    /// Concrete index written to: `name-YYYY.MM.DD` when using multiple
    /// indices
    fn index_name(&self) -> String {
        if self.multiple_indices() {
            format!("{}-{}", self.name(), Utc::now().format("%Y.%m.%d"))
        } else {
            self.name()
        }
    }

    /// Index, alias or pattern queries run against
    fn searchable_as(&self) -> String {
        if self.multiple_indices() {
            format!("{}-*", self.name())
        } else {
            self.name()
        }
    }

    fn doc_type(&self) -> Option<String> {
        None
    }

    fn settings(&self) -> Value {
        json!({})
    }

    fn properties(&self) -> Value {
        json!({})
    }

    fn mappings(&self) -> Value {
        let mapping = json!({
            "_source": { "enabled": true },
            "properties": self.properties(),
        });
        match self.doc_type() {
            Some(doc_type) => json!({ doc_type: mapping }),
            None => mapping,
        }
    }

    fn aliases(&self) -> Value {
        json!({ format!(".{}", self.name()): {} })
    }

    /// Body sent when creating the index; empty sections are left out
    fn configuration(&self) -> Value {
        let mut body = Map::new();
        for (key, value) in [
            ("settings", self.settings()),
            ("mappings", self.mappings()),
            ("aliases", self.aliases()),
        ] {
            if !is_blank(&value) {
                body.insert(key.to_string(), value);
            }
        }
        Value::Object(body)
    }

    fn per_page(&self) -> u64 {
        10
    }

    /// Global scopes applied to every query of this index
    fn scopes(&self) -> Vec<(String, Arc<dyn Scope>)> {
        Vec::new()
    }

    /// Scopes callable by name through [`Builder::call`]
    fn named_scopes(&self) -> HashMap<String, NamedScope> {
        HashMap::new()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn default_name(type_name: &str) -> String {
    let base = type_name
        .rsplit("::")
        .next()
        .unwrap_or(type_name)
        .split('<')
        .next()
        .unwrap_or_default()
        .replace("Index", "");
    snake_case(&pluralize(&base))
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// English plural of the last word, enough for type names
fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// A definition bound to a connection
pub struct Index<D: IndexDefinition> {
    definition: D,
    connection: Arc<Connection>,
    registry: Arc<ExtensionRegistry>,
    exists: Mutex<Option<bool>>,
    aliases: Mutex<Option<Value>>,
}

impl<D: IndexDefinition> Index<D> {
    pub fn new(definition: D, connection: Arc<Connection>) -> Self {
        Self::with_registry(definition, connection, Arc::new(ExtensionRegistry::new()))
    }

    pub fn with_registry(
        definition: D,
        connection: Arc<Connection>,
        registry: Arc<ExtensionRegistry>,
    ) -> Self {
        Self {
            definition,
            connection,
            registry,
            exists: Mutex::new(None),
            aliases: Mutex::new(None),
        }
    }

    pub fn definition(&self) -> &D {
        &self.definition
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Builder over `searchable_as()` with the definition's scopes
    pub fn query(&self) -> Builder {
        let mut builder = self.query_without_scopes();
        for (identifier, scope) in self.definition.scopes() {
            builder.with_shared_scope(identifier, scope);
        }
        builder
    }

    pub fn query_without_scopes(&self) -> Builder {
        let mut query = Query::with_connection(Arc::clone(&self.connection));
        query.from(self.definition.searchable_as());
        if let Some(doc_type) = self.definition.doc_type() {
            query.doc_type(doc_type);
        }

        let mut builder = Builder::with_registry(query, Arc::clone(&self.registry));
        builder
            .set_per_page(self.definition.per_page())
            .set_named_scopes(self.definition.named_scopes());
        builder
    }

    /// Whether the current index exists; the first answer is cached
    pub async fn exists(&self) -> Result<bool> {
        if let Some(exists) = *self.exists.lock() {
            return Ok(exists);
        }
        let exists = self
            .connection
            .indices()
            .exists(&self.definition.index_name())
            .await?;
        *self.exists.lock() = Some(exists);
        Ok(exists)
    }

    /// Create the current index with the definition's configuration
    pub async fn create(&self) -> Result<Value> {
        let index = self.definition.index_name();
        tracing::info!(index = %index, "Creating index");
        let response = self
            .connection
            .indices()
            .create(&index, self.definition.configuration())
            .await?;
        *self.exists.lock() = Some(true);
        Ok(response)
    }

    pub async fn delete(&self) -> Result<Value> {
        let index = self.definition.index_name();
        tracing::info!(index = %index, "Deleting index");
        let response = self.connection.indices().delete(&index).await?;
        *self.exists.lock() = Some(false);
        *self.aliases.lock() = None;
        Ok(response)
    }

    /// Push non-empty `settings` and `mappings` from `config` to the index
    pub async fn update(&self, config: &Value) -> Result<()> {
        let index = self.definition.index_name();
        let indices = self.connection.indices();

        if let Some(settings) = config.get("settings").filter(|v| !is_blank(v)) {
            indices.put_settings(&index, settings.clone()).await?;
        }
        if let Some(mappings) = config.get("mappings").filter(|v| !is_blank(v)) {
            let doc_type = self.definition.doc_type();
            indices
                .put_mapping(&index, doc_type.as_deref(), mappings.clone())
                .await?;
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<Value> {
        self.connection
            .indices()
            .flush(&self.definition.index_name())
            .await
    }

    /// Aliases of the current index; the first answer is cached
    pub async fn aliases(&self) -> Result<Value> {
        if let Some(aliases) = self.aliases.lock().clone() {
            return Ok(aliases);
        }
        let aliases = self
            .connection
            .indices()
            .get_aliases(&self.definition.index_name())
            .await?;
        *self.aliases.lock() = Some(aliases.clone());
        Ok(aliases)
    }

    /// Drop cached `exists` and `aliases` answers
    pub fn forget(&self) {
        *self.exists.lock() = None;
        *self.aliases.lock() = None;
    }
}
