//! The fluent query builder (§4.5). `Model(name)` is the entry point; its
//! methods build up a [`SelectQuery`]/[`Condition`] tree without touching a
//! driver — translation to dialect SQL happens entirely on the driver side.

use crate::query::ast::{Condition, Include, IncludeOptions, Op, OrderBy, OrderDirection, SelectQuery};
use crate::value::{RowData, Value};

/// Seed returned by [`ModelQuery::where_field`]; each comparison method
/// finishes the leaf and returns a [`Condition`] ready to compose with
/// `.and()`/`.or()`/`.not()`.
pub struct FieldCondition {
    field: String,
}

impl FieldCondition {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }

    fn leaf(self, op: Op, values: Vec<Value>) -> Condition {
        Condition::Leaf { field: self.field, op, values }
    }

    pub fn equals(self, value: impl Into<Value>) -> Condition {
        self.leaf(Op::Equals, vec![value.into()])
    }

    pub fn not_equals(self, value: impl Into<Value>) -> Condition {
        self.leaf(Op::NotEquals, vec![value.into()])
    }

    pub fn greater_than(self, value: impl Into<Value>) -> Condition {
        self.leaf(Op::GreaterThan, vec![value.into()])
    }

    pub fn less_than(self, value: impl Into<Value>) -> Condition {
        self.leaf(Op::LessThan, vec![value.into()])
    }

    pub fn in_values(self, values: Vec<Value>) -> Condition {
        self.leaf(Op::In, values)
    }

    pub fn not_in(self, values: Vec<Value>) -> Condition {
        self.leaf(Op::NotIn, values)
    }

    pub fn contains(self, value: impl Into<String>) -> Condition {
        self.leaf(Op::Contains, vec![Value::Text(value.into())])
    }

    pub fn starts_with(self, value: impl Into<String>) -> Condition {
        self.leaf(Op::StartsWith, vec![Value::Text(value.into())])
    }

    pub fn ends_with(self, value: impl Into<String>) -> Condition {
        self.leaf(Op::EndsWith, vec![Value::Text(value.into())])
    }

    pub fn like(self, pattern: impl Into<String>) -> Condition {
        self.leaf(Op::Like, vec![Value::Text(pattern.into())])
    }

    pub fn between(self, lo: impl Into<Value>, hi: impl Into<Value>) -> Condition {
        self.leaf(Op::Between, vec![lo.into(), hi.into()])
    }

    pub fn is_null(self) -> Condition {
        self.leaf(Op::IsNull, vec![])
    }

    pub fn is_not_null(self) -> Condition {
        self.leaf(Op::IsNotNull, vec![])
    }
}

/// What a terminal call on [`ModelQuery`] is building: a read, an insert, an
/// update, or a delete. The selection pipeline (`order_by`/`limit`/etc.)
/// only applies to reads and updates/deletes with a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Select,
    Insert(RowData),
    Update(RowData),
    Delete,
}

/// The handle returned by `Database::model(name)`. Method calls mutate the
/// builder in place and return `&mut Self` so pipeline calls read left to
/// right; terminal methods are executed by the driver, not here.
pub struct ModelQuery {
    model: String,
    action: Action,
    query: SelectQuery,
}

impl ModelQuery {
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self { query: SelectQuery::new(model.clone()), model, action: Action::Select }
    }

    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.query.fields = Some(fields);
        self
    }

    pub fn insert(mut self, data: RowData) -> Self {
        self.action = Action::Insert(data);
        self
    }

    pub fn update(mut self, data: RowData) -> Self {
        self.action = Action::Update(data);
        self
    }

    pub fn delete(mut self) -> Self {
        self.action = Action::Delete;
        self
    }

    pub fn where_field(&self, field: impl Into<String>) -> FieldCondition {
        FieldCondition::new(field)
    }

    /// Composes with any existing filter via AND (§4.5: "may be called
    /// multiple times; successive calls AND").
    pub fn where_condition(mut self, cond: Condition) -> Self {
        self.query.where_ = Some(match self.query.where_.take() {
            Some(existing) => existing.and(cond),
            None => cond,
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.query.order_by.push(OrderBy { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.query.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.query.offset = Some(n);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    pub fn include(mut self, relation: impl Into<String>, options: IncludeOptions) -> Self {
        self.query.includes.push(Include { relation: relation.into(), options });
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// The assembled selection pipeline, consumed by a driver's terminal
    /// execution methods (`FindMany`/`FindFirst`/`Count`/`Exists`, or the
    /// pre-update filter for `Update`/`Delete`).
    pub fn into_query(self) -> (Action, SelectQuery) {
        (self.action, self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::Op;

    #[test]
    fn where_condition_calls_compose_with_and() {
        let q = ModelQuery::new("User")
            .where_condition(FieldCondition::new("active").equals(true))
            .where_condition(FieldCondition::new("age").greater_than(18));
        let (_, query) = q.into_query();
        match query.where_.unwrap() {
            Condition::And(items) => assert_eq!(items.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn field_condition_between_carries_two_values() {
        let cond = FieldCondition::new("age").between(18, 65);
        match cond {
            Condition::Leaf { op, values, .. } => {
                assert_eq!(op, Op::Between);
                assert_eq!(values.len(), 2);
            }
            other => panic!("expected Leaf, got {other:?}"),
        }
    }

    #[test]
    fn pipeline_builds_up_selection_state() {
        let q = ModelQuery::new("Post")
            .select(vec!["id".into(), "title".into()])
            .order_by("createdAt", OrderDirection::Desc)
            .limit(10)
            .offset(5)
            .distinct();
        let (_, query) = q.into_query();
        assert_eq!(query.fields, Some(vec!["id".to_string(), "title".to_string()]));
        assert_eq!(query.order_by.len(), 1);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
        assert!(query.distinct);
    }
}
