//! The query value handed to adapters.
//!
//! Every builder method borrows `self` and returns a new [`Query`], so one
//! base query can derive several sibling queries within a repository call
//! without them aliasing each other.

use relmap_core::Value;
use serde::{Deserialize, Serialize};

use crate::filter::{self, FilterExpr};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

/// A join clause: `kind table ON from = to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub from: String,
    pub to: String,
}

/// Aggregate function an adapter applies to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateMode {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AggregateMode::Count => "count",
            AggregateMode::Sum => "sum",
            AggregateMode::Avg => "avg",
            AggregateMode::Max => "max",
            AggregateMode::Min => "min",
        }
    }
}

/// A relational statement shape: table, filter, fields, joins, sort keys,
/// offset and limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Query {
    table: Option<String>,
    fields: Vec<String>,
    filter: FilterExpr,
    joins: Vec<Join>,
    sort: Vec<Sort>,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// A query over `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::default()
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn filter_expr(&self) -> &FilterExpr {
        &self.filter
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn sort_keys(&self) -> &[Sort] {
        &self.sort
    }

    pub fn offset_value(&self) -> Option<usize> {
        self.offset
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Same query over `table`.
    pub fn in_table(&self, table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..self.clone()
        }
    }

    /// Same query, with `table` filled in when none is set.
    pub fn or_table(&self, table: &str) -> Self {
        match self.table {
            Some(_) => self.clone(),
            None => self.in_table(table),
        }
    }

    /// AND `expr` into the filter.
    pub fn filter(&self, expr: FilterExpr) -> Self {
        Self {
            filter: self.filter.clone().and(expr),
            ..self.clone()
        }
    }

    pub fn where_eq(&self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(filter::eq(field, value))
    }

    pub fn where_in(&self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filter(filter::in_(field, values))
    }

    pub fn select(&self, fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|&f| f.to_string()).collect(),
            ..self.clone()
        }
    }

    pub fn join(
        &self,
        kind: JoinKind,
        table: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        let mut next = self.clone();
        next.joins.push(Join {
            kind,
            table: table.into(),
            from: from.into(),
            to: to.into(),
        });
        next
    }

    pub fn sort_asc(&self, field: impl Into<String>) -> Self {
        self.sort_by(field.into(), SortOrder::Asc)
    }

    pub fn sort_desc(&self, field: impl Into<String>) -> Self {
        self.sort_by(field.into(), SortOrder::Desc)
    }

    fn sort_by(&self, field: String, order: SortOrder) -> Self {
        let mut next = self.clone();
        next.sort.push(Sort { field, order });
        next
    }

    pub fn offset(&self, offset: usize) -> Self {
        Self {
            offset: Some(offset),
            ..self.clone()
        }
    }

    pub fn limit(&self, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..self.clone()
        }
    }

    /// Combine with `other`: filters are ANDed, joins and sort keys
    /// appended, and `other`'s table, fields, offset and limit win where set.
    pub fn merge(&self, other: &Query) -> Self {
        let mut next = self.clone();
        if other.table.is_some() {
            next.table.clone_from(&other.table);
        }
        if !other.fields.is_empty() {
            next.fields.clone_from(&other.fields);
        }
        next.filter = next.filter.and(other.filter.clone());
        next.joins.extend(other.joins.iter().cloned());
        next.sort.extend(other.sort.iter().cloned());
        next.offset = other.offset.or(next.offset);
        next.limit = other.limit.or(next.limit);
        next
    }
}

impl From<FilterExpr> for Query {
    fn from(filter: FilterExpr) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}
