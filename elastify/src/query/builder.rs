//! Fluent query builder
//!
//! [`Query`] accumulates clauses, pagination, sorting, highlighting,
//! aggregations and suggestions, and serializes them with [`Query::to_dsl`].
//! Clause methods attach to the bucket of the current [`BoolContext`]
//! (initially `must`); `must()`, `should()`, `must_not()` and `filter()`
//! switch it until switched again.
//!
//! `where_` and friends are the exception: they target their own bucket
//! (`must` for `where_`, `should` for `or_where`, ...) and leave the current
//! context untouched.
//!
//! ```
//! # use elastify::query::Query;
//! # fn main() -> elastify::Result<()> {
//! let mut query = Query::new();
//! query
//!     .from("users")
//!     .where_("status", "=", "active")?
//!     .or_where("status", "=", "pending")?
//!     .limit(5);
//! let dsl = query.to_dsl();
//! assert_eq!(dsl["size"], 5);
//! # Ok(())
//! # }
//! ```

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::query::aggregation::{self, Aggregation, AggregationScope, AggregationSpec};
use crate::query::operator::{prepare_value_and_operator, Operator};
use crate::query::suggestion::{self, SuggestSpec, Suggestion, SuggestionScope};
use crate::query::types::{
    BoolContainer, BoolContext, Clause, FieldSort, Highlight, Params, ScoreMode, SortOrder,
};
use crate::response::{Hit, Page, PaginatorOptions, SearchResponse};
use serde_json::{json, Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Query {
    connection: Option<Arc<Connection>>,
    index: Option<String>,
    doc_type: Option<String>,
    context: BoolContext,
    root: BoolContainer,
    offset: Option<u64>,
    size: Option<u64>,
    sort: Vec<FieldSort>,
    highlight: Option<Highlight>,
    aggregations: Vec<AggregationSpec>,
    suggestions: Vec<SuggestSpec>,
}

impl Query {
    /// Detached builder; it can serialize but not execute
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(connection: Arc<Connection>) -> Self {
        Self {
            connection: Some(connection),
            ..Self::default()
        }
    }

    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    /// Fresh builder on the same connection, for sub-queries
    fn sub_query(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            ..Self::default()
        }
    }

    fn bound(&self) -> Result<&Connection> {
        self.connection.as_deref().ok_or(Error::NoConnection)
    }

    // -----------------------------------------------------------------
    // Target
    // -----------------------------------------------------------------

    /// Index, alias or pattern to search
    pub fn from(&mut self, index: impl Into<String>) -> &mut Self {
        self.index = Some(index.into());
        self
    }

    pub fn from_typed(
        &mut self,
        index: impl Into<String>,
        doc_type: impl Into<String>,
    ) -> &mut Self {
        self.from(index).doc_type(doc_type)
    }

    pub fn doc_type(&mut self, doc_type: impl Into<String>) -> &mut Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn get_doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    fn target(&self) -> Result<&str> {
        self.index
            .as_deref()
            .ok_or_else(|| Error::invalid("No index targeted; call from() first"))
    }

    // -----------------------------------------------------------------
    // Bool context
    // -----------------------------------------------------------------

    pub fn current_context(&self) -> BoolContext {
        self.context
    }

    pub fn set_context(&mut self, context: BoolContext) -> &mut Self {
        self.context = context;
        self
    }

    /// Switch context by name: `must`, `should`, `must_not` or `filter`
    pub fn bool_context(&mut self, token: &str) -> Result<&mut Self> {
        let context = token.parse()?;
        Ok(self.set_context(context))
    }

    pub fn must(&mut self) -> &mut Self {
        self.set_context(BoolContext::Must)
    }

    pub fn should(&mut self) -> &mut Self {
        self.set_context(BoolContext::Should)
    }

    pub fn must_not(&mut self) -> &mut Self {
        self.set_context(BoolContext::MustNot)
    }

    pub fn filter(&mut self) -> &mut Self {
        self.set_context(BoolContext::Filter)
    }

    /// Attach a clause to the current context's bucket
    pub fn append(&mut self, clause: Clause) -> &mut Self {
        self.root.push(self.context, clause);
        self
    }

    /// Attach a clause to a specific bucket without switching context
    pub fn append_to(&mut self, context: BoolContext, clause: Clause) -> &mut Self {
        self.root.push(context, clause);
        self
    }

    pub fn bool_query(&self) -> &BoolContainer {
        &self.root
    }

    // -----------------------------------------------------------------
    // Where clauses
    // -----------------------------------------------------------------

    /// `field <operator> value` in `must`.
    ///
    /// An unrecognized operator is taken as the value with `=`; a null value
    /// is only accepted by the equality operators.
    pub fn where_(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.where_in_context(field, operator, value, BoolContext::Must)
    }

    /// Two-argument form: `field = value`
    pub fn where_eq(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        let clause = Operator::Eq.to_clause(field, value.into());
        self.append_to(BoolContext::Must, clause)
    }

    pub fn where_in_context(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
        context: BoolContext,
    ) -> Result<&mut Self> {
        let (operator, value) = prepare_value_and_operator(operator, value.into())?;
        Ok(self.append_to(context, operator.to_clause(field, value)))
    }

    /// `field <operator> value` in `should`
    pub fn or_where(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.where_in_context(field, operator, value, BoolContext::Should)
    }

    pub fn or_where_eq(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        let clause = Operator::Eq.to_clause(field, value.into());
        self.append_to(BoolContext::Should, clause)
    }

    /// `field` matches any of `values`: one `terms` clause in `must`. Use
    /// [`where_not_in`](Self::where_not_in) for the `must_not` form.
    pub fn where_in<V: Into<Value>>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.append_to(BoolContext::Must, Clause::terms(field, values))
    }

    /// `field` matches none of `values`: one `terms` clause in `must_not`
    pub fn where_not_in<V: Into<Value>>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.append_to(BoolContext::MustNot, Clause::terms(field, values))
    }

    /// Restrict to document ids
    pub fn where_key<S: Into<String>>(&mut self, ids: impl IntoIterator<Item = S>) -> &mut Self {
        self.append(Clause::ids(ids))
    }

    /// Parenthesized group of clauses in `must`
    pub fn where_group<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Query) -> Result<()>,
    {
        self.group(BoolContext::Must, callback)
    }

    /// Parenthesized group of clauses in `should`
    pub fn or_where_group<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Query) -> Result<()>,
    {
        self.group(BoolContext::Should, callback)
    }

    fn group<F>(&mut self, context: BoolContext, callback: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Query) -> Result<()>,
    {
        let mut sub = self.sub_query();
        callback(&mut sub)?;
        if !sub.root.is_empty() {
            self.root.push(context, Clause::Bool(sub.root));
        }
        Ok(self)
    }

    // -----------------------------------------------------------------
    // Pagination and sorting
    // -----------------------------------------------------------------

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn skip(&mut self, offset: u64) -> &mut Self {
        self.offset(offset)
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.size = Some(limit);
        self
    }

    pub fn take(&mut self, limit: u64) -> &mut Self {
        self.limit(limit)
    }

    /// `offset = (page - 1) * per_page`, `size = per_page`; page 0 reads as 1
    pub fn for_page(&mut self, page: u64, per_page: u64) -> &mut Self {
        let page = page.max(1);
        self.offset((page - 1) * per_page).limit(per_page)
    }

    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.size
    }

    /// One sort entry per field, in call order
    pub fn sort_by<S: Into<String>>(
        &mut self,
        fields: impl IntoIterator<Item = S>,
        order: Option<SortOrder>,
        params: Params,
    ) -> &mut Self {
        for field in fields {
            let mut sort = FieldSort::new(field, order);
            sort.params = params.clone();
            self.sort.push(sort);
        }
        self
    }

    pub fn order_by<S: Into<String>>(
        &mut self,
        fields: impl IntoIterator<Item = S>,
        order: Option<SortOrder>,
        params: Params,
    ) -> &mut Self {
        self.sort_by(fields, order, params)
    }

    pub fn sorts(&self) -> &[FieldSort] {
        &self.sort
    }

    // -----------------------------------------------------------------
    // Clauses
    // -----------------------------------------------------------------

    pub fn term(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.append(Clause::term(field, value))
    }

    pub fn terms<V: Into<Value>>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.append(Clause::terms(field, values))
    }

    pub fn match_(&mut self, field: &str, query: impl Into<Value>) -> &mut Self {
        self.append(Clause::match_(field, query))
    }

    pub fn match_phrase(&mut self, field: &str, query: impl Into<Value>) -> &mut Self {
        self.append(Clause::match_phrase(field, query))
    }

    pub fn multi_match<S: Into<String>>(
        &mut self,
        fields: impl IntoIterator<Item = S>,
        query: impl Into<Value>,
    ) -> &mut Self {
        self.append(Clause::multi_match(fields, query))
    }

    pub fn common_terms(&mut self, field: &str, query: impl Into<Value>) -> &mut Self {
        self.append(Clause::common_terms(field, query))
    }

    /// `bounds` is an object of `gt`/`gte`/`lt`/`lte` plus options
    pub fn range(&mut self, field: &str, bounds: Value) -> &mut Self {
        self.append(Clause::range(field).params(bounds))
    }

    /// One `exists` clause per field
    pub fn exists<S: Into<String>>(&mut self, fields: impl IntoIterator<Item = S>) -> &mut Self {
        for field in fields {
            self.append(Clause::exists(field));
        }
        self
    }

    pub fn prefix(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.append(Clause::prefix(field, value))
    }

    pub fn wildcard(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.append(Clause::wildcard(field, value))
    }

    pub fn fuzzy(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.append(Clause::fuzzy(field, value))
    }

    pub fn regexp(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.append(Clause::regexp(field, pattern))
    }

    pub fn geo_distance(
        &mut self,
        field: &str,
        distance: impl Into<Value>,
        location: impl Into<Value>,
    ) -> &mut Self {
        self.append(Clause::geo_distance(field, distance, location))
    }

    /// Ring between two distances around `location`
    pub fn geo_distance_range(
        &mut self,
        field: &str,
        from: impl Into<Value>,
        to: impl Into<Value>,
        location: impl Into<Value>,
    ) -> &mut Self {
        let range = json!({ "from": from.into(), "to": to.into() });
        self.append(Clause::geo_distance(field, range, location))
    }

    pub fn geo_bounding_box(&mut self, field: &str, bounds: impl Into<Value>) -> &mut Self {
        self.append(Clause::geo_bounding_box(field, bounds))
    }

    pub fn geo_polygon<V: Into<Value>>(
        &mut self,
        field: &str,
        points: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.append(Clause::geo_polygon(field, points))
    }

    pub fn geo_shape(
        &mut self,
        field: &str,
        shape_type: &str,
        coordinates: impl Into<Value>,
    ) -> &mut Self {
        self.append(Clause::geo_shape(field, shape_type, coordinates))
    }

    pub fn query_string(&mut self, query: &str) -> &mut Self {
        self.append(Clause::query_string(query))
    }

    pub fn simple_query_string(&mut self, query: &str) -> &mut Self {
        self.append(Clause::simple_query_string(query))
    }

    pub fn match_all(&mut self) -> &mut Self {
        self.append(Clause::match_all())
    }

    pub fn ids<S: Into<String>>(&mut self, ids: impl IntoIterator<Item = S>) -> &mut Self {
        self.append(Clause::ids(ids))
    }

    /// Clauses built by `callback` on an independent builder, wrapped in a
    /// `nested` clause on `path`
    pub fn nested<F>(&mut self, path: &str, callback: F, score_mode: ScoreMode) -> Result<&mut Self>
    where
        F: FnOnce(&mut Query) -> Result<()>,
    {
        let mut sub = self.sub_query();
        callback(&mut sub)?;
        Ok(self.append(Clause::nested(path, Clause::Bool(sub.root), score_mode)))
    }

    // -----------------------------------------------------------------
    // Highlight, aggregations, suggestions
    // -----------------------------------------------------------------

    pub fn highlight<S: Into<String>>(
        &mut self,
        fields: impl IntoIterator<Item = S>,
        params: Params,
        pre_tag: &str,
        post_tag: &str,
    ) -> &mut Self {
        self.highlight = Some(Highlight {
            fields: fields.into_iter().map(|f| (f.into(), Params::new())).collect(),
            pre_tags: vec![pre_tag.to_string()],
            post_tags: vec![post_tag.to_string()],
            params,
        });
        self
    }

    /// Highlight `_all` with `<mark>` tags
    pub fn highlight_default(&mut self) -> &mut Self {
        self.set_highlight(Highlight::default())
    }

    pub fn set_highlight(&mut self, highlight: Highlight) -> &mut Self {
        self.highlight = Some(highlight);
        self
    }

    pub fn get_highlight(&self) -> Option<&Highlight> {
        self.highlight.as_ref()
    }

    pub fn aggregate<S: AggregationScope>(&mut self, scope: S) -> &mut Self {
        let mut builder = Aggregation::new();
        scope.apply(&mut builder);
        for spec in builder.into_specs() {
            self.aggregations.retain(|existing| existing.name != spec.name);
            self.aggregations.push(spec);
        }
        self
    }

    pub fn aggregations(&self) -> &[AggregationSpec] {
        &self.aggregations
    }

    pub fn suggest<S: SuggestionScope>(&mut self, scope: S) -> &mut Self {
        let mut builder = Suggestion::new();
        scope.apply(&mut builder);
        for spec in builder.into_specs() {
            self.suggestions.retain(|existing| existing.name != spec.name);
            self.suggestions.push(spec);
        }
        self
    }

    pub fn suggestions(&self) -> &[SuggestSpec] {
        &self.suggestions
    }

    // -----------------------------------------------------------------
    // Conditional helpers
    // -----------------------------------------------------------------

    /// Run `callback` only when `condition` holds
    pub fn when<F>(&mut self, condition: bool, callback: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        if condition {
            callback(self);
        }
        self
    }

    pub fn unless<F>(&mut self, condition: bool, callback: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.when(!condition, callback)
    }

    pub fn tap<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.when(true, callback)
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Request body for the search API; `{}` for an empty builder
    pub fn to_dsl(&self) -> Value {
        let mut body = Map::new();
        if !self.root.is_empty() {
            body.insert("query".into(), self.root.to_value());
        }
        if !self.sort.is_empty() {
            body.insert(
                "sort".into(),
                Value::Array(self.sort.iter().map(FieldSort::to_value).collect()),
            );
        }
        if let Some(offset) = self.offset {
            body.insert("from".into(), Value::from(offset));
        }
        if let Some(size) = self.size {
            body.insert("size".into(), Value::from(size));
        }
        if let Some(highlight) = &self.highlight {
            body.insert("highlight".into(), highlight.to_value());
        }
        if !self.aggregations.is_empty() {
            body.insert("aggs".into(), aggregation::specs_to_value(&self.aggregations));
        }
        if !self.suggestions.is_empty() {
            body.insert("suggest".into(), suggestion::specs_to_value(&self.suggestions));
        }
        Value::Object(body)
    }

    // -----------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------

    /// Raw search with an explicit body against this builder's target
    pub async fn search(&self, body: Value) -> Result<Value> {
        let index = self.index.as_deref().unwrap_or("");
        tracing::trace!(index, body = %body, "Search");
        self.bound()?
            .search(index, self.doc_type.as_deref(), body)
            .await
    }

    /// Run the accumulated query as-is
    pub async fn execute(&self) -> Result<SearchResponse> {
        Ok(SearchResponse::new(self.search(self.to_dsl()).await?))
    }

    /// Number of documents matching the query
    pub async fn count(&self) -> Result<u64> {
        let body = (!self.root.is_empty()).then(|| json!({ "query": self.root.to_value() }));
        let response = self
            .bound()?
            .count(
                self.index.as_deref().unwrap_or(""),
                self.doc_type.as_deref(),
                body,
            )
            .await?;
        Ok(response.get("count").and_then(Value::as_u64).unwrap_or(0))
    }

    /// Page `page` of `per_page` results
    pub async fn get(&self, per_page: u64, page: u64) -> Result<Page> {
        self.paginate(per_page, page, PaginatorOptions::default())
            .await
    }

    /// `page` and `per_page` below 1 are read as 1
    pub async fn paginate(
        &self,
        per_page: u64,
        page: u64,
        options: PaginatorOptions,
    ) -> Result<Page> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let mut query = self.clone();
        query.for_page(page, per_page);
        let response = query.execute().await?;
        Ok(Page::new(response, per_page, page, options))
    }

    pub async fn first(&self) -> Result<Option<Hit>> {
        let mut query = self.clone();
        query.limit(1);
        Ok(query.execute().await?.hits().next())
    }

    pub async fn find(&self, id: &str) -> Result<Option<Hit>> {
        let mut query = self.clone();
        query.where_key([id]);
        query.first().await
    }

    /// First page of the documents with the given ids; all documents when
    /// `ids` is empty
    pub async fn find_many<S: Into<String>>(
        &self,
        ids: impl IntoIterator<Item = S>,
    ) -> Result<Page> {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let mut query = self.clone();
        if !ids.is_empty() {
            query.where_key(ids);
        }
        query.get(10, 1).await
    }

    async fn metric(
        &self,
        function: &str,
        field: &str,
        name: Option<&str>,
    ) -> Result<Option<f64>> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}", function, field));

        let mut query = self.clone();
        query.limit(0).aggregate(|builder: &mut Aggregation| {
            builder.append(AggregationSpec::new(name.as_str(), function)).param("field", field);
        });
        Ok(query.execute().await?.aggregation_value(&name))
    }

    /// Average of `field` over matching documents; the aggregation is named
    /// `avg_{field}` unless `name` is given
    pub async fn avg(&self, field: &str, name: Option<&str>) -> Result<Option<f64>> {
        self.metric("avg", field, name).await
    }

    pub async fn average(&self, field: &str) -> Result<Option<f64>> {
        self.avg(field, None).await
    }

    pub async fn sum(&self, field: &str, name: Option<&str>) -> Result<Option<f64>> {
        self.metric("sum", field, name).await
    }

    pub async fn min(&self, field: &str, name: Option<&str>) -> Result<Option<f64>> {
        self.metric("min", field, name).await
    }

    pub async fn max(&self, field: &str, name: Option<&str>) -> Result<Option<f64>> {
        self.metric("max", field, name).await
    }

    // -----------------------------------------------------------------
    // Index passthroughs
    // -----------------------------------------------------------------

    pub async fn index_exists(&self) -> Result<bool> {
        self.bound()?.indices().exists(self.target()?).await
    }

    pub async fn create(&self, body: Value) -> Result<Value> {
        self.bound()?.indices().create(self.target()?, body).await
    }

    /// Returns whether the index was created
    pub async fn create_if_not_exists(&self, body: Value) -> Result<bool> {
        if self.index_exists().await? {
            return Ok(false);
        }
        self.create(body).await?;
        Ok(true)
    }

    pub async fn drop(&self) -> Result<Value> {
        self.bound()?.indices().delete(self.target()?).await
    }

    /// Returns whether the index was dropped
    pub async fn drop_if_exists(&self) -> Result<bool> {
        if !self.index_exists().await? {
            return Ok(false);
        }
        self.drop().await?;
        Ok(true)
    }

    /// Index one document into the target
    pub async fn insert(&self, document: Value, id: Option<&str>) -> Result<Value> {
        self.bound()?
            .index_document(self.target()?, self.doc_type.as_deref(), id, document)
            .await
    }

    pub async fn flush(&self) -> Result<Value> {
        self.bound()?.indices().flush(self.target()?).await
    }
}
