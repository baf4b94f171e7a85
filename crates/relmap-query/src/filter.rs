//! Filter expressions.
//!
//! A [`FilterExpr`] is a tree of column predicates joined by `And`, `Or` and
//! `Not`. An empty `And` matches every row and is the default.

use relmap_core::Value;
use serde::{Deserialize, Serialize};

/// A boolean filter over columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Nil(String),
    NotNil(String),
    In(String, Vec<Value>),
    Nin(String, Vec<Value>),
    Like(String, String),
    NotLike(String, String),
    /// Raw expression with positional arguments.
    Fragment(String, Vec<Value>),
}

impl Default for FilterExpr {
    fn default() -> Self {
        FilterExpr::And(Vec::new())
    }
}

impl FilterExpr {
    /// Whether this filter matches every row.
    pub fn is_empty(&self) -> bool {
        matches!(self, FilterExpr::And(items) if items.is_empty())
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: FilterExpr) -> FilterExpr {
        match (self, other) {
            (lhs, rhs) if rhs.is_empty() => lhs,
            (lhs, rhs) if lhs.is_empty() => rhs,
            (FilterExpr::And(mut lhs), FilterExpr::And(rhs)) => {
                lhs.extend(rhs);
                FilterExpr::And(lhs)
            }
            (FilterExpr::And(mut lhs), rhs) => {
                lhs.push(rhs);
                FilterExpr::And(lhs)
            }
            (lhs, FilterExpr::And(mut rhs)) => {
                rhs.insert(0, lhs);
                FilterExpr::And(rhs)
            }
            (lhs, rhs) => FilterExpr::And(vec![lhs, rhs]),
        }
    }

    /// Disjunction of `self` and `other`, flattening nested `Or`s.
    #[must_use]
    pub fn or(self, other: FilterExpr) -> FilterExpr {
        match (self, other) {
            (FilterExpr::Or(mut lhs), FilterExpr::Or(rhs)) => {
                lhs.extend(rhs);
                FilterExpr::Or(lhs)
            }
            (FilterExpr::Or(mut lhs), rhs) => {
                lhs.push(rhs);
                FilterExpr::Or(lhs)
            }
            (lhs, rhs) => FilterExpr::Or(vec![lhs, rhs]),
        }
    }

    #[must_use]
    pub fn and_eq(self, field: impl Into<String>, value: impl Into<Value>) -> FilterExpr {
        self.and(eq(field, value))
    }

    #[must_use]
    pub fn and_in(self, field: impl Into<String>, values: Vec<Value>) -> FilterExpr {
        self.and(in_(field, values))
    }

    /// The value this filter pins `field` to with an `Eq`, searching
    /// top-level conjunctions only.
    pub fn eq_value(&self, field: &str) -> Option<&Value> {
        match self {
            FilterExpr::Eq(f, value) if f == field => Some(value),
            FilterExpr::And(items) => items.iter().find_map(|item| item.eq_value(field)),
            _ => None,
        }
    }
}

impl std::ops::Not for FilterExpr {
    type Output = FilterExpr;

    fn not(self) -> FilterExpr {
        match self {
            FilterExpr::Not(inner) => *inner,
            other => FilterExpr::Not(Box::new(other)),
        }
    }
}

pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Eq(field.into(), value.into())
}

pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Ne(field.into(), value.into())
}

pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Lt(field.into(), value.into())
}

pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Lte(field.into(), value.into())
}

pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Gt(field.into(), value.into())
}

pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Gte(field.into(), value.into())
}

pub fn nil(field: impl Into<String>) -> FilterExpr {
    FilterExpr::Nil(field.into())
}

pub fn not_nil(field: impl Into<String>) -> FilterExpr {
    FilterExpr::NotNil(field.into())
}

/// `field IN (values)`. Named with a trailing underscore since `in` is a
/// keyword.
pub fn in_(field: impl Into<String>, values: Vec<Value>) -> FilterExpr {
    FilterExpr::In(field.into(), values)
}

pub fn nin(field: impl Into<String>, values: Vec<Value>) -> FilterExpr {
    FilterExpr::Nin(field.into(), values)
}

pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> FilterExpr {
    FilterExpr::Like(field.into(), pattern.into())
}

pub fn not_like(field: impl Into<String>, pattern: impl Into<String>) -> FilterExpr {
    FilterExpr::NotLike(field.into(), pattern.into())
}

pub fn fragment(raw: impl Into<String>, args: Vec<Value>) -> FilterExpr {
    FilterExpr::Fragment(raw.into(), args)
}
