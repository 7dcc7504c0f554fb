//! Elasticsearch Query DSL clause model
//!
//! Clauses are plain values: once built they always serialize to the same
//! JSON. Optional parameters live in a `serde_json::Map`, which keeps its
//! keys sorted, so two equal clauses produce byte-identical DSL.

use crate::error::Error;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Optional clause parameters (boost, analyzer, fuzziness, ...)
pub type Params = Map<String, Value>;

/// Boolean occurrence a new clause is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoolContext {
    #[default]
    Must,
    Should,
    MustNot,
    Filter,
}

impl BoolContext {
    pub const ALL: [BoolContext; 4] = [
        BoolContext::Must,
        BoolContext::MustNot,
        BoolContext::Should,
        BoolContext::Filter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoolContext::Must => "must",
            BoolContext::Should => "should",
            BoolContext::MustNot => "must_not",
            BoolContext::Filter => "filter",
        }
    }
}

impl fmt::Display for BoolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoolContext {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "must" => Ok(BoolContext::Must),
            "should" => Ok(BoolContext::Should),
            "must_not" => Ok(BoolContext::MustNot),
            "filter" => Ok(BoolContext::Filter),
            other => Err(Error::invalid(format!(
                "Illegal bool query operation [{}]",
                other
            ))),
        }
    }
}

/// A single query condition
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Term {
        field: String,
        value: Value,
        params: Params,
    },
    Terms {
        field: String,
        values: Vec<Value>,
        params: Params,
    },
    Match {
        field: String,
        query: Value,
        params: Params,
    },
    MatchPhrase {
        field: String,
        query: Value,
        params: Params,
    },
    MultiMatch {
        fields: Vec<String>,
        query: Value,
        params: Params,
    },
    CommonTerms {
        field: String,
        query: Value,
        params: Params,
    },
    /// Bounds (`gt`, `gte`, `lt`, `lte`) are stored alongside the other parameters
    Range {
        field: String,
        params: Params,
    },
    Exists {
        field: String,
    },
    Prefix {
        field: String,
        value: Value,
        params: Params,
    },
    Wildcard {
        field: String,
        value: Value,
        params: Params,
    },
    Fuzzy {
        field: String,
        value: Value,
        params: Params,
    },
    Regexp {
        field: String,
        pattern: String,
        params: Params,
    },
    GeoDistance {
        field: String,
        distance: Value,
        location: Value,
        params: Params,
    },
    GeoBoundingBox {
        field: String,
        bounds: Value,
        params: Params,
    },
    GeoPolygon {
        field: String,
        points: Vec<Value>,
        params: Params,
    },
    GeoShape {
        field: String,
        shape_type: String,
        coordinates: Value,
        params: Params,
    },
    Nested {
        path: String,
        query: Box<Clause>,
        params: Params,
    },
    Bool(BoolContainer),
    QueryString {
        query: String,
        params: Params,
    },
    SimpleQueryString {
        query: String,
        params: Params,
    },
    Ids {
        values: Vec<String>,
        params: Params,
    },
    MatchAll {
        params: Params,
    },
}

impl Clause {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Term {
            field: field.into(),
            value: value.into(),
            params: Params::new(),
        }
    }

    pub fn terms<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Clause::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            params: Params::new(),
        }
    }

    pub fn match_(field: impl Into<String>, query: impl Into<Value>) -> Self {
        Clause::Match {
            field: field.into(),
            query: query.into(),
            params: Params::new(),
        }
    }

    pub fn match_phrase(field: impl Into<String>, query: impl Into<Value>) -> Self {
        Clause::MatchPhrase {
            field: field.into(),
            query: query.into(),
            params: Params::new(),
        }
    }

    pub fn multi_match<S: Into<String>>(
        fields: impl IntoIterator<Item = S>,
        query: impl Into<Value>,
    ) -> Self {
        Clause::MultiMatch {
            fields: fields.into_iter().map(Into::into).collect(),
            query: query.into(),
            params: Params::new(),
        }
    }

    pub fn common_terms(field: impl Into<String>, query: impl Into<Value>) -> Self {
        Clause::CommonTerms {
            field: field.into(),
            query: query.into(),
            params: Params::new(),
        }
    }

    /// Range clause with no bounds yet; add them with [`Clause::param`]
    pub fn range(field: impl Into<String>) -> Self {
        Clause::Range {
            field: field.into(),
            params: Params::new(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Clause::Exists {
            field: field.into(),
        }
    }

    pub fn prefix(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Prefix {
            field: field.into(),
            value: value.into(),
            params: Params::new(),
        }
    }

    pub fn wildcard(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Wildcard {
            field: field.into(),
            value: value.into(),
            params: Params::new(),
        }
    }

    pub fn fuzzy(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Fuzzy {
            field: field.into(),
            value: value.into(),
            params: Params::new(),
        }
    }

    pub fn regexp(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Clause::Regexp {
            field: field.into(),
            pattern: pattern.into(),
            params: Params::new(),
        }
    }

    pub fn geo_distance(
        field: impl Into<String>,
        distance: impl Into<Value>,
        location: impl Into<Value>,
    ) -> Self {
        Clause::GeoDistance {
            field: field.into(),
            distance: distance.into(),
            location: location.into(),
            params: Params::new(),
        }
    }

    /// Bounding box from either an object (`top_left`/`bottom_right`, ...) or
    /// an array of two corners or four edges.
    pub fn geo_bounding_box(field: impl Into<String>, bounds: impl Into<Value>) -> Self {
        Clause::GeoBoundingBox {
            field: field.into(),
            bounds: bounds.into(),
            params: Params::new(),
        }
    }

    pub fn geo_polygon<V: Into<Value>>(
        field: impl Into<String>,
        points: impl IntoIterator<Item = V>,
    ) -> Self {
        Clause::GeoPolygon {
            field: field.into(),
            points: points.into_iter().map(Into::into).collect(),
            params: Params::new(),
        }
    }

    pub fn geo_shape(
        field: impl Into<String>,
        shape_type: impl Into<String>,
        coordinates: impl Into<Value>,
    ) -> Self {
        Clause::GeoShape {
            field: field.into(),
            shape_type: shape_type.into(),
            coordinates: coordinates.into(),
            params: Params::new(),
        }
    }

    pub fn nested(path: impl Into<String>, query: Clause, score_mode: ScoreMode) -> Self {
        let mut params = Params::new();
        params.insert("score_mode".into(), Value::from(score_mode.as_str()));
        Clause::Nested {
            path: path.into(),
            query: Box::new(query),
            params,
        }
    }

    pub fn query_string(query: impl Into<String>) -> Self {
        Clause::QueryString {
            query: query.into(),
            params: Params::new(),
        }
    }

    pub fn simple_query_string(query: impl Into<String>) -> Self {
        Clause::SimpleQueryString {
            query: query.into(),
            params: Params::new(),
        }
    }

    pub fn ids<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Clause::Ids {
            values: values.into_iter().map(Into::into).collect(),
            params: Params::new(),
        }
    }

    pub fn match_all() -> Self {
        Clause::MatchAll {
            params: Params::new(),
        }
    }

    /// Set one optional parameter. Ignored for `exists`, which takes none.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(params) = self.params_mut() {
            params.insert(key.into(), value.into());
        }
        self
    }

    /// Merge every key of a JSON object into the optional parameters
    pub fn params(mut self, extra: Value) -> Self {
        if let (Some(params), Value::Object(extra)) = (self.params_mut(), extra) {
            params.extend(extra);
        }
        self
    }

    fn params_mut(&mut self) -> Option<&mut Params> {
        match self {
            Clause::Term { params, .. }
            | Clause::Terms { params, .. }
            | Clause::Match { params, .. }
            | Clause::MatchPhrase { params, .. }
            | Clause::MultiMatch { params, .. }
            | Clause::CommonTerms { params, .. }
            | Clause::Range { params, .. }
            | Clause::Prefix { params, .. }
            | Clause::Wildcard { params, .. }
            | Clause::Fuzzy { params, .. }
            | Clause::Regexp { params, .. }
            | Clause::GeoDistance { params, .. }
            | Clause::GeoBoundingBox { params, .. }
            | Clause::GeoPolygon { params, .. }
            | Clause::GeoShape { params, .. }
            | Clause::Nested { params, .. }
            | Clause::QueryString { params, .. }
            | Clause::SimpleQueryString { params, .. }
            | Clause::Ids { params, .. }
            | Clause::MatchAll { params } => Some(params),
            Clause::Bool(container) => Some(&mut container.params),
            Clause::Exists { .. } => None,
        }
    }

    /// DSL key of this clause (`term`, `geo_distance`, ...)
    pub fn kind(&self) -> &'static str {
        match self {
            Clause::Term { .. } => "term",
            Clause::Terms { .. } => "terms",
            Clause::Match { .. } => "match",
            Clause::MatchPhrase { .. } => "match_phrase",
            Clause::MultiMatch { .. } => "multi_match",
            Clause::CommonTerms { .. } => "common",
            Clause::Range { .. } => "range",
            Clause::Exists { .. } => "exists",
            Clause::Prefix { .. } => "prefix",
            Clause::Wildcard { .. } => "wildcard",
            Clause::Fuzzy { .. } => "fuzzy",
            Clause::Regexp { .. } => "regexp",
            Clause::GeoDistance { .. } => "geo_distance",
            Clause::GeoBoundingBox { .. } => "geo_bounding_box",
            Clause::GeoPolygon { .. } => "geo_polygon",
            Clause::GeoShape { .. } => "geo_shape",
            Clause::Nested { .. } => "nested",
            Clause::Bool(_) => "bool",
            Clause::QueryString { .. } => "query_string",
            Clause::SimpleQueryString { .. } => "simple_query_string",
            Clause::Ids { .. } => "ids",
            Clause::MatchAll { .. } => "match_all",
        }
    }

    /// Serialize to the Query DSL
    pub fn to_value(&self) -> Value {
        let body = match self {
            Clause::Term {
                field,
                value,
                params,
            } => {
                if params.is_empty() {
                    json!({ field: value })
                } else {
                    json!({ field: with_params(json!({ "value": value }), params) })
                }
            }
            Clause::Terms {
                field,
                values,
                params,
            } => with_params(json!({ field: values }), params),
            Clause::Match {
                field,
                query,
                params,
            }
            | Clause::MatchPhrase {
                field,
                query,
                params,
            }
            | Clause::CommonTerms {
                field,
                query,
                params,
            } => json!({ field: with_params(json!({ "query": query }), params) }),
            Clause::MultiMatch {
                fields,
                query,
                params,
            } => {
                let mut body = json!({ "query": query });
                if !fields.is_empty() {
                    body["fields"] = json!(fields);
                }
                with_params(body, params)
            }
            Clause::Range { field, params } => json!({ field: params }),
            Clause::Exists { field } => json!({ "field": field }),
            Clause::Prefix {
                field,
                value,
                params,
            }
            | Clause::Wildcard {
                field,
                value,
                params,
            }
            | Clause::Fuzzy {
                field,
                value,
                params,
            } => json!({ field: with_params(json!({ "value": value }), params) }),
            Clause::Regexp {
                field,
                pattern,
                params,
            } => json!({ field: with_params(json!({ "value": pattern }), params) }),
            Clause::GeoDistance {
                field,
                distance,
                location,
                params,
            } => with_params(json!({ "distance": distance, field: location }), params),
            Clause::GeoBoundingBox {
                field,
                bounds,
                params,
            } => with_params(json!({ field: bounding_box(bounds) }), params),
            Clause::GeoPolygon {
                field,
                points,
                params,
            } => with_params(json!({ field: { "points": points } }), params),
            Clause::GeoShape {
                field,
                shape_type,
                coordinates,
                params,
            } => {
                let shape = json!({
                    "shape": { "type": shape_type, "coordinates": coordinates }
                });
                json!({ field: with_params(shape, params) })
            }
            Clause::Nested {
                path,
                query,
                params,
            } => with_params(json!({ "path": path, "query": query.to_value() }), params),
            Clause::Bool(container) => container.body(),
            Clause::QueryString { query, params }
            | Clause::SimpleQueryString { query, params } => {
                with_params(json!({ "query": query }), params)
            }
            Clause::Ids { values, params } => with_params(json!({ "values": values }), params),
            Clause::MatchAll { params } => Value::Object(params.clone()),
        };

        json!({ self.kind(): body })
    }
}

impl Serialize for Clause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn with_params(mut body: Value, params: &Params) -> Value {
    if let Value::Object(map) = &mut body {
        for (k, v) in params {
            map.insert(k.clone(), v.clone());
        }
    }
    body
}

fn bounding_box(bounds: &Value) -> Value {
    match bounds.as_array().map(Vec::as_slice) {
        Some([top_left, bottom_right]) => json!({
            "top_left": top_left,
            "bottom_right": bottom_right,
        }),
        Some([top, left, bottom, right]) => json!({
            "top": top,
            "left": left,
            "bottom": bottom,
            "right": right,
        }),
        _ => bounds.clone(),
    }
}

/// How scores of matching nested documents combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreMode {
    #[default]
    Avg,
    Max,
    Min,
    Sum,
    None,
}

impl ScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreMode::Avg => "avg",
            ScoreMode::Max => "max",
            ScoreMode::Min => "min",
            ScoreMode::Sum => "sum",
            ScoreMode::None => "none",
        }
    }
}

/// Four ordered buckets of clauses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolContainer {
    pub must: Vec<Clause>,
    pub should: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub filter: Vec<Clause>,
    /// `minimum_should_match`, `boost`, ...
    pub params: Params,
}

impl BoolContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, context: BoolContext, clause: Clause) {
        self.bucket_mut(context).push(clause);
    }

    pub fn bucket(&self, context: BoolContext) -> &[Clause] {
        match context {
            BoolContext::Must => &self.must,
            BoolContext::Should => &self.should,
            BoolContext::MustNot => &self.must_not,
            BoolContext::Filter => &self.filter,
        }
    }

    fn bucket_mut(&mut self, context: BoolContext) -> &mut Vec<Clause> {
        match context {
            BoolContext::Must => &mut self.must,
            BoolContext::Should => &mut self.should,
            BoolContext::MustNot => &mut self.must_not,
            BoolContext::Filter => &mut self.filter,
        }
    }

    pub fn is_empty(&self) -> bool {
        BoolContext::ALL.iter().all(|ctx| self.bucket(*ctx).is_empty())
    }

    pub fn len(&self) -> usize {
        BoolContext::ALL.iter().map(|ctx| self.bucket(*ctx).len()).sum()
    }

    /// Inner `bool` object, empty buckets omitted
    fn body(&self) -> Value {
        let mut body = Map::new();
        for ctx in BoolContext::ALL {
            let clauses = self.bucket(ctx);
            if !clauses.is_empty() {
                body.insert(
                    ctx.as_str().to_string(),
                    Value::Array(clauses.iter().map(Clause::to_value).collect()),
                );
            }
        }
        for (k, v) in &self.params {
            body.insert(k.clone(), v.clone());
        }
        Value::Object(body)
    }

    pub fn to_value(&self) -> Value {
        json!({ "bool": self.body() })
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::invalid(format!("Illegal sort order [{}]", other))),
        }
    }
}

/// One entry of the `sort` list
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSort {
    pub field: String,
    pub order: Option<SortOrder>,
    pub params: Params,
}

impl FieldSort {
    pub fn new(field: impl Into<String>, order: Option<SortOrder>) -> Self {
        Self {
            field: field.into(),
            order,
            params: Params::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        if self.order.is_none() && self.params.is_empty() {
            return Value::String(self.field.clone());
        }
        let mut body = self.params.clone();
        if let Some(order) = self.order {
            body.insert("order".into(), Value::from(order.as_str()));
        }
        json!({ &self.field: body })
    }
}

pub const DEFAULT_PRE_TAG: &str = "<mark>";
pub const DEFAULT_POST_TAG: &str = "</mark>";

/// Highlighting request
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    /// Field name and its per-field options; serialized as an object keyed
    /// by field name, so a repeated name keeps its last options
    pub fields: Vec<(String, Params)>,
    pub pre_tags: Vec<String>,
    pub post_tags: Vec<String>,
    pub params: Params,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            fields: vec![("_all".to_string(), Params::new())],
            pre_tags: vec![DEFAULT_PRE_TAG.to_string()],
            post_tags: vec![DEFAULT_POST_TAG.to_string()],
            params: Params::new(),
        }
    }
}

impl Highlight {
    pub fn to_value(&self) -> Value {
        let fields: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, opts)| (name.clone(), Value::Object(opts.clone())))
            .collect();

        let body = json!({
            "pre_tags": self.pre_tags,
            "post_tags": self.post_tags,
            "fields": fields,
        });
        with_params(body, &self.params)
    }
}
