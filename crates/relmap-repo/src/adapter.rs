//! The storage-backend contract.

use std::sync::Arc;

use relmap_core::{Changeset, Result, Row, Value};
use relmap_query::{AggregateMode, Query};

/// A storage backend executing queries and changesets.
///
/// The repository never builds SQL: it hands every read and write to an
/// adapter as a [`Query`] (plus a [`Changeset`] for writes). Changesets
/// passed here never carry association entries.
///
/// Implementations report failures with the [`relmap_core::Error`]
/// taxonomy, e.g. [`Error::Constraint`](relmap_core::Error::Constraint) for
/// rejected writes and [`Error::Unexpected`](relmap_core::Error::Unexpected)
/// for everything they cannot classify.
pub trait Adapter: Send + Sync {
    /// Rows matching `query`.
    fn all(&self, query: &Query) -> Result<Vec<Row>>;

    /// Apply `mode` to `field` over the rows matching `query`.
    fn aggregate(&self, query: &Query, mode: AggregateMode, field: &str) -> Result<Value>;

    /// Insert one row into `query`'s table, returning the assigned id.
    fn insert(&self, query: &Query, changes: &Changeset) -> Result<Value>;

    /// Insert one row per changeset, returning the assigned ids in the same
    /// order.
    fn insert_all(&self, query: &Query, changes: &[Changeset]) -> Result<Vec<Value>>;

    /// Update the rows matching `query`.
    fn update(&self, query: &Query, changes: &Changeset) -> Result<()>;

    /// Delete the rows matching `query`.
    fn delete(&self, query: &Query) -> Result<()>;

    /// Open a transaction, returning the adapter bound to it.
    fn begin(&self) -> Result<Arc<dyn Adapter>>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;
}
