//! Suggestion sub-builder

use crate::query::types::Params;
use serde_json::{json, Map, Value};

/// One named suggester
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestSpec {
    pub name: String,
    /// `completion` or `term`
    pub kind: String,
    pub text: String,
    pub field: String,
    pub params: Params,
}

impl SuggestSpec {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        text: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            text: text.into(),
            field: field.into(),
            params: Params::new(),
        }
    }

    pub fn param(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn to_value(&self) -> Value {
        let mut options = self.params.clone();
        options.insert("field".into(), Value::from(self.field.as_str()));
        json!({
            "text": self.text,
            &self.kind: options,
        })
    }
}

/// Anything that can fill a [`Suggestion`]
pub trait SuggestionScope {
    fn apply(self, builder: &mut Suggestion);
}

impl<F> SuggestionScope for F
where
    F: FnOnce(&mut Suggestion),
{
    fn apply(self, builder: &mut Suggestion) {
        self(builder)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Suggestion {
    specs: Vec<SuggestSpec>,
}

impl Suggestion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion suggester; `field` defaults to `suggest`
    pub fn completion(&mut self, name: &str, text: &str, field: Option<&str>) -> &mut SuggestSpec {
        self.append(SuggestSpec::new(
            name,
            "completion",
            text,
            field.unwrap_or("suggest"),
        ))
    }

    /// Term suggester; `field` defaults to `_all`
    pub fn term(&mut self, name: &str, text: &str, field: Option<&str>) -> &mut SuggestSpec {
        self.append(SuggestSpec::new(name, "term", text, field.unwrap_or("_all")))
    }

    pub fn append(&mut self, spec: SuggestSpec) -> &mut SuggestSpec {
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
        let last = self.specs.len() - 1;
        &mut self.specs[last]
    }

    pub fn specs(&self) -> &[SuggestSpec] {
        &self.specs
    }

    pub fn into_specs(self) -> Vec<SuggestSpec> {
        self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn to_value(&self) -> Value {
        specs_to_value(&self.specs)
    }
}

pub(crate) fn specs_to_value(specs: &[SuggestSpec]) -> Value {
    let map: Map<String, Value> = specs
        .iter()
        .map(|spec| (spec.name.clone(), spec.to_value()))
        .collect();
    Value::Object(map)
}
