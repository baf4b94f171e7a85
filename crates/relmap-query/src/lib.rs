//! Query representation for relmap.
//!
//! `relmap-query` describes *what* to read or write, never *how*: a
//! [`Query`] carries a table, a [`FilterExpr`], fields, joins, sort keys,
//! offset and limit, and adapters translate it into their own dialect.
//!
//! ```ignore
//! use relmap_query::{Query, filter::{eq, gt}};
//!
//! let adults = Query::table("users").filter(gt("age", 17)).sort_asc("name");
//! let first = adults.limit(1); // `adults` is left untouched
//! ```

pub mod filter;
pub mod query;

pub use filter::FilterExpr;
pub use query::{AggregateMode, Join, JoinKind, Query, Sort, SortOrder};
