//! Comparison operators accepted by `where` clauses

use crate::error::{Error, Result};
use crate::query::types::{BoolContainer, BoolContext, Clause};
use serde_json::Value;
use std::fmt;

/// Every operator token `where` understands, lowercase
pub const OPERATORS: [&str; 12] = [
    "=", "<", ">", "<=", ">=", "<>", "!=", "<=>", "lt", "gt", "lte", "gte",
];

/// Normalized comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    NullSafeEq,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl Operator {
    /// Parse a recognized token; word aliases collapse onto their symbol.
    ///
    /// Word aliases read like Elasticsearch range keys: `lt` is `<` and `gt`
    /// is `>`, never the other way round.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "=" => Some(Operator::Eq),
            "<>" | "!=" => Some(Operator::NotEq),
            "<=>" => Some(Operator::NullSafeEq),
            "<" | "lt" => Some(Operator::Lt),
            ">" | "gt" => Some(Operator::Gt),
            "<=" | "lte" => Some(Operator::Lte),
            ">=" | "gte" => Some(Operator::Gte),
            _ => None,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Lt | Operator::Gt | Operator::Lte | Operator::Gte
        )
    }

    /// Bound key of a range clause
    pub fn range_key(&self) -> Option<&'static str> {
        match self {
            Operator::Lt => Some("lt"),
            Operator::Gt => Some("gt"),
            Operator::Lte => Some("lte"),
            Operator::Gte => Some("gte"),
            _ => None,
        }
    }

    /// Null is only comparable for equality
    fn accepts_null(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::NotEq | Operator::NullSafeEq
        )
    }

    /// Build the clause for `field <op> value`
    pub fn to_clause(&self, field: &str, value: Value) -> Clause {
        match (self, value.is_null()) {
            (Operator::Eq | Operator::NullSafeEq, false) => Clause::term(field, value),
            (Operator::Eq | Operator::NullSafeEq, true) => not(Clause::exists(field)),
            (Operator::NotEq, false) => not(Clause::term(field, value)),
            (Operator::NotEq, true) => Clause::exists(field),
            (range, _) => {
                let key = range.range_key().unwrap_or("gte");
                Clause::range(field).param(key, value)
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::NullSafeEq => "<=>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
        };
        f.write_str(s)
    }
}

fn not(clause: Clause) -> Clause {
    let mut container = BoolContainer::new();
    container.push(BoolContext::MustNot, clause);
    Clause::Bool(container)
}

/// Resolve the `(operator, value)` pair of a three-argument `where`.
///
/// An unknown token is taken to be the value itself compared with `=`, which
/// lets `where_("status", "active", Value::Null)` read like the two-argument
/// form. A null value is rejected for every operator except the equality ones.
pub fn prepare_value_and_operator(operator: &str, value: Value) -> Result<(Operator, Value)> {
    match Operator::parse(operator) {
        Some(op) if value.is_null() && !op.accepts_null() => Err(Error::invalid(format!(
            "Illegal operator [{}] and value combination",
            operator
        ))),
        Some(op) => Ok((op, value)),
        None => Ok((Operator::Eq, Value::from(operator))),
    }
}
