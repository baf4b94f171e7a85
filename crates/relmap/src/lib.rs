//! relmap: persist Rust record graphs through a storage adapter.
//!
//! This is the facade crate. It re-exports the workspace crates so most
//! applications depend on `relmap` alone:
//!
//! - [`relmap_core`]: values, rows, records, schemas, documents, changesets
//!   and the error taxonomy.
//! - [`relmap_query`]: the value-semantic [`Query`] and its filters.
//! - [`relmap_repo`]: the [`Repository`] and the [`Adapter`] contract.
//! - `#[derive(Record)]` from `relmap-macros`.
//!
//! The derive emits `::relmap_core` paths, so crates using it also list
//! `relmap-core` among their dependencies.
//!
//! # Example
//!
//! ```ignore
//! use relmap::prelude::*;
//!
//! #[derive(Record, Debug, Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     #[record(has_many)]
//!     transactions: Option<Vec<Transaction>>,
//! }
//!
//! #[derive(Record, Debug, Default)]
//! struct Transaction {
//!     id: i64,
//!     user_id: i64,
//!     item: String,
//! }
//!
//! let repo = Repository::new(adapter);
//! let mut user = User::default();
//! repo.insert(
//!     &mut user,
//!     Changeset::builder()
//!         .set("name", "Ann")
//!         .replace_many("transactions", vec![
//!             Changeset::builder().set("item", "pen").build(),
//!         ])
//!         .build(),
//! )?;
//! repo.preload(&mut user, "transactions", &Query::new())?;
//! ```

pub use relmap_core;
pub use relmap_macros::Record;
pub use relmap_query;
pub use relmap_repo;

pub use relmap_core::{
    Association, AssociationChanges, AssociationKind, Change, Changeset, ChangesetBuilder,
    Collection, ConstraintError, ConstraintKind, Document, Error, ErrorKind, FromValue, KeyValue,
    Record, Result, Row, Schema, ToValue, Value,
};
pub use relmap_query::{AggregateMode, FilterExpr, Query, SortOrder, filter};
pub use relmap_repo::{Adapter, Repository, RepositoryConfig};

/// Everything needed to declare records and talk to a repository.
pub mod prelude {
    pub use crate::Record;
    pub use relmap_core::{
        Changeset, ChangesetBuilder, Error, ErrorKind, Result, Row, Schema, Value,
    };
    pub use relmap_query::filter::{eq, gt, gte, in_, like, lt, lte, ne, nil, nin, not_nil};
    pub use relmap_query::{AggregateMode, FilterExpr, Query, SortOrder};
    pub use relmap_repo::{Adapter, Repository, RepositoryConfig};
}
