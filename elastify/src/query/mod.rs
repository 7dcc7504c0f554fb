//! Query construction
//!
//! - [`types`]: clause model, bool container, sort and highlight
//! - [`operator`]: comparison tokens accepted by `where_`
//! - [`aggregation`] / [`suggestion`]: sub-builders for `aggs` and `suggest`
//! - [`builder`]: the fluent [`Query`]

pub mod aggregation;
pub mod builder;
pub mod operator;
pub mod suggestion;
pub mod types;

pub use aggregation::{Aggregation, AggregationScope, AggregationSpec};
pub use builder::Query;
pub use operator::{prepare_value_and_operator, Operator, OPERATORS};
pub use suggestion::{SuggestSpec, Suggestion, SuggestionScope};
pub use types::{
    BoolContainer, BoolContext, Clause, FieldSort, Highlight, Params, ScoreMode, SortOrder,
    DEFAULT_POST_TAG, DEFAULT_PRE_TAG,
};
