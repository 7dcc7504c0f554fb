//! Aggregation sub-builder
//!
//! `Query::aggregate` hands an [`Aggregation`] to a callback. Every method
//! appends one named aggregation and returns it, so parameters and
//! sub-aggregations can be attached in place:
//!
//! ```
//! # use elastify::query::Aggregation;
//! let mut aggs = Aggregation::new();
//! aggs.terms("by_category", "category")
//!     .param("size", 20)
//!     .aggregate(|sub: &mut Aggregation| {
//!         sub.average("avg_price", "price");
//!     });
//! ```

use crate::query::types::Params;
use serde_json::{json, Map, Value};

/// One named aggregation and its children
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub name: String,
    /// DSL aggregation type (`avg`, `terms`, `date_range`, ...)
    pub kind: String,
    pub body: Params,
    pub children: Vec<AggregationSpec>,
}

impl AggregationSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            body: Params::new(),
            children: Vec::new(),
        }
    }

    pub fn param(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Attach sub-aggregations
    pub fn aggregate<F>(&mut self, callback: F) -> &mut Self
    where
        F: AggregationScope,
    {
        let mut sub = Aggregation::new();
        callback.apply(&mut sub);
        self.children.extend(sub.into_specs());
        self
    }

    fn with_field(name: &str, kind: &str, field: &str) -> Self {
        let mut spec = Self::new(name, kind);
        spec.body.insert("field".into(), Value::from(field));
        spec
    }

    /// Body of this aggregation, keyed by its type
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert(self.kind.clone(), Value::Object(self.body.clone()));
        if !self.children.is_empty() {
            body.insert("aggs".into(), specs_to_value(&self.children));
        }
        Value::Object(body)
    }
}

pub(crate) fn specs_to_value(specs: &[AggregationSpec]) -> Value {
    let map: Map<String, Value> = specs
        .iter()
        .map(|spec| (spec.name.clone(), spec.to_value()))
        .collect();
    Value::Object(map)
}

/// Anything that can fill an [`Aggregation`]; closures and user types alike
pub trait AggregationScope {
    fn apply(self, builder: &mut Aggregation);
}

impl<F> AggregationScope for F
where
    F: FnOnce(&mut Aggregation),
{
    fn apply(self, builder: &mut Aggregation) {
        self(builder)
    }
}

/// Accumulates aggregations for one level of the tree
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    specs: Vec<AggregationSpec>,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, spec: AggregationSpec) -> &mut AggregationSpec {
        // Same name replaces, matching how the DSL object would collapse it
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
        let last = self.specs.len() - 1;
        &mut self.specs[last]
    }

    pub fn specs(&self) -> &[AggregationSpec] {
        &self.specs
    }

    pub fn into_specs(self) -> Vec<AggregationSpec> {
        self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn to_value(&self) -> Value {
        specs_to_value(&self.specs)
    }

    // -----------------------------------------------------------------
    // Metric aggregations
    // -----------------------------------------------------------------

    pub fn average(&mut self, name: &str, field: &str) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "avg", field))
    }

    pub fn sum(&mut self, name: &str, field: &str) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "sum", field))
    }

    pub fn min(&mut self, name: &str, field: &str) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "min", field))
    }

    pub fn max(&mut self, name: &str, field: &str) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "max", field))
    }

    pub fn stats(&mut self, name: &str, field: &str) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "stats", field))
    }

    pub fn value_count(&mut self, name: &str, field: &str) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "value_count", field))
    }

    pub fn cardinality(
        &mut self,
        name: &str,
        field: &str,
        precision_threshold: Option<u64>,
    ) -> &mut AggregationSpec {
        let spec = self.append(AggregationSpec::with_field(name, "cardinality", field));
        if let Some(threshold) = precision_threshold {
            spec.param("precision_threshold", threshold);
        }
        spec
    }

    pub fn percentiles(
        &mut self,
        name: &str,
        field: &str,
        percents: &[f64],
    ) -> &mut AggregationSpec {
        let spec = self.append(AggregationSpec::with_field(name, "percentiles", field));
        if !percents.is_empty() {
            spec.param("percents", json!(percents));
        }
        spec
    }

    pub fn percentile_ranks(
        &mut self,
        name: &str,
        field: &str,
        values: &[f64],
    ) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "percentile_ranks", field))
            .param("values", json!(values))
    }

    pub fn geo_bounds(
        &mut self,
        name: &str,
        field: &str,
        wrap_longitude: bool,
    ) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "geo_bounds", field))
            .param("wrap_longitude", wrap_longitude)
    }

    // -----------------------------------------------------------------
    // Bucket aggregations
    // -----------------------------------------------------------------

    pub fn terms(&mut self, name: &str, field: &str) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "terms", field))
    }

    pub fn missing(&mut self, name: &str, field: &str) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "missing", field))
    }

    pub fn histogram(&mut self, name: &str, field: &str, interval: f64) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "histogram", field))
            .param("interval", interval)
    }

    /// `ranges` entries look like `{"to": 50}`, `{"from": 50, "to": 100}`
    pub fn range(
        &mut self,
        name: &str,
        field: &str,
        ranges: Vec<Value>,
        keyed: bool,
    ) -> &mut AggregationSpec {
        let spec = self
            .append(AggregationSpec::with_field(name, "range", field))
            .param("ranges", ranges);
        if keyed {
            spec.param("keyed", true);
        }
        spec
    }

    pub fn date_range(
        &mut self,
        name: &str,
        field: &str,
        format: Option<&str>,
        ranges: Vec<Value>,
    ) -> &mut AggregationSpec {
        let spec = self
            .append(AggregationSpec::with_field(name, "date_range", field))
            .param("ranges", ranges);
        if let Some(format) = format {
            spec.param("format", format);
        }
        spec
    }

    pub fn ipv4_range(
        &mut self,
        name: &str,
        field: &str,
        ranges: Vec<Value>,
    ) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "ip_range", field))
            .param("ranges", ranges)
    }

    pub fn geo_distance(
        &mut self,
        name: &str,
        field: &str,
        origin: impl Into<Value>,
        ranges: Vec<Value>,
    ) -> &mut AggregationSpec {
        self.append(AggregationSpec::with_field(name, "geo_distance", field))
            .param("origin", origin)
            .param("ranges", ranges)
    }

    pub fn geo_hash_grid(
        &mut self,
        name: &str,
        field: &str,
        precision: u8,
        size: Option<u64>,
    ) -> &mut AggregationSpec {
        let spec = self
            .append(AggregationSpec::with_field(name, "geohash_grid", field))
            .param("precision", precision);
        if let Some(size) = size {
            spec.param("size", size);
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PriceStats;

    impl AggregationScope for PriceStats {
        fn apply(self, builder: &mut Aggregation) {
            builder.stats("price_stats", "price");
        }
    }

    #[test]
    fn test_metric_aggregations() {
        let mut aggs = Aggregation::new();
        aggs.average("avg_price", "price");
        aggs.max("max_price", "price");
        assert_eq!(
            aggs.to_value(),
            json!({
                "avg_price": {"avg": {"field": "price"}},
                "max_price": {"max": {"field": "price"}}
            })
        );
    }

    #[test]
    fn test_nested_sub_aggregations() {
        let mut aggs = Aggregation::new();
        aggs.terms("by_category", "category")
            .param("size", 5)
            .aggregate(|sub: &mut Aggregation| {
                sub.sum("revenue", "price");
            });
        assert_eq!(
            aggs.to_value(),
            json!({
                "by_category": {
                    "terms": {"field": "category", "size": 5},
                    "aggs": {"revenue": {"sum": {"field": "price"}}}
                }
            })
        );
    }

    #[test]
    fn test_invokable_scope() {
        let mut aggs = Aggregation::new();
        PriceStats.apply(&mut aggs);
        assert_eq!(aggs.specs().len(), 1);
        assert_eq!(aggs.specs()[0].kind, "stats");
    }

    #[test]
    fn test_same_name_replaces() {
        let mut aggs = Aggregation::new();
        aggs.min("p", "price");
        aggs.max("p", "price");
        assert_eq!(aggs.specs().len(), 1);
        assert_eq!(aggs.specs()[0].kind, "max");
    }

    #[test]
    fn test_range_and_histogram() {
        let mut aggs = Aggregation::new();
        aggs.range("price_ranges", "price", vec![json!({"to": 50}), json!({"from": 50})], true);
        aggs.histogram("hist", "price", 10.0);
        let v = aggs.to_value();
        assert_eq!(v["price_ranges"]["range"]["keyed"], json!(true));
        assert_eq!(v["price_ranges"]["range"]["ranges"].as_array().unwrap().len(), 2);
        assert_eq!(v["hist"]["histogram"]["interval"], json!(10.0));
    }

    #[test]
    fn test_percentiles_and_cardinality() {
        let mut aggs = Aggregation::new();
        aggs.percentiles("p", "latency", &[50.0, 99.0]);
        aggs.cardinality("users", "user_id", Some(1000));
        let v = aggs.to_value();
        assert_eq!(v["p"]["percentiles"]["percents"], json!([50.0, 99.0]));
        assert_eq!(v["users"]["cardinality"]["precision_threshold"], json!(1000));
    }
}
