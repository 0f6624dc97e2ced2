//! The dialect-free condition tree and selection-pipeline AST (§4.5, design
//! note §9: "a tagged-variant tree with a visitor protocol... free of
//! dialect concerns"). Field names here are schema field names; translation
//! to column names happens in the driver at execution time, never here.

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    /// Inclusive: translates to `>=`.
    GreaterThan,
    /// Inclusive: translates to `<=`.
    LessThan,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Like,
    Between,
    IsNull,
    IsNotNull,
}

/// A node in the filter tree built by [`crate::query::builder::FieldCondition`]
/// and `And`/`Or`/`Not` composition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Leaf { field: String, op: Op, values: Vec<Value> },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn and(self, other: Condition) -> Condition {
        match self {
            Condition::And(mut items) => {
                items.push(other);
                Condition::And(items)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Condition) -> Condition {
        match self {
            Condition::Or(mut items) => {
                items.push(other);
                Condition::Or(items)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    pub fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: OrderDirection,
}

/// Options narrowing an `Include`d relation's own auxiliary query (§4.5).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeOptions {
    pub where_: Option<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub relation: String,
    pub options: IncludeOptions,
}

/// The fully composed selection pipeline a driver's visitor translates into
/// dialect SQL or a Mongo filter document.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub model: String,
    pub fields: Option<Vec<String>>,
    pub where_: Option<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub distinct: bool,
    pub includes: Vec<Include>,
}

impl SelectQuery {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fields: None,
            where_: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            includes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(field: &str) -> Condition {
        Condition::Leaf { field: field.into(), op: Op::Equals, values: vec![Value::Int(1)] }
    }

    #[test]
    fn and_flattens_into_a_single_node() {
        let cond = leaf("a").and(leaf("b")).and(leaf("c"));
        match cond {
            Condition::And(items) => assert_eq!(items.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn not_wraps_the_condition() {
        let cond = leaf("a").not();
        assert!(matches!(cond, Condition::Not(_)));
    }
}
