//! The repository: top-level reads, writes, preloads and transactions.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use relmap_core::{Changeset, Collection, Document, Error, Record, Result, Schema, Value};
use relmap_query::{AggregateMode, Query};

use crate::adapter::Adapter;
use crate::orchestrator::{Orchestrator, Write};
use crate::preload;

// ============================================================================
// Repository Configuration
// ============================================================================

/// Configuration for Repository behavior.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Whether to re-read written rows so adapter-populated columns (ids,
    /// defaults, timestamps) are mirrored back into the record.
    pub reload_after_write: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            reload_after_write: true,
        }
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Entry point for every read and write.
///
/// Cheap to clone; clones share the adapter.
#[derive(Clone)]
pub struct Repository {
    adapter: Arc<dyn Adapter>,
    config: RepositoryConfig,
    in_transaction: bool,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("config", &self.config)
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Create a repository over `adapter`.
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self::with_config(adapter, RepositoryConfig::default())
    }

    /// Create a repository with custom configuration.
    pub fn with_config(adapter: Arc<dyn Adapter>, config: RepositoryConfig) -> Self {
        Self {
            adapter,
            config,
            in_transaction: false,
        }
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Whether this repository is bound to an open transaction.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(self.adapter.as_ref(), &self.config)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The first record matching `query`, or `NotFound`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn find<T: Record + Default>(&self, query: &Query) -> Result<T> {
        let schema = Schema::of::<T>()?;
        let row = self.orchestrator().find_one(&query.or_table(&schema.table))?;

        let mut record = T::default();
        Document::new(&mut record)?.apply_row(&row)?;
        Ok(record)
    }

    /// Every record matching `query`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn find_all<T: Record + Default>(&self, query: &Query) -> Result<Vec<T>> {
        let schema = Schema::of::<T>()?;
        let rows = self.adapter.all(&query.or_table(&schema.table))?;
        tracing::debug!(table = %schema.table, count = rows.len(), "Loaded records");

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = T::default();
            Document::new(&mut record)?.apply_row(row)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Apply `mode` to `field` over the `T` rows matching `query`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn aggregate<T: Record>(
        &self,
        query: &Query,
        mode: AggregateMode,
        field: &str,
    ) -> Result<Value> {
        let schema = Schema::of::<T>()?;
        self.adapter
            .aggregate(&query.or_table(&schema.table), mode, field)
    }

    /// Number of `T` rows matching `query`.
    pub fn count<T: Record>(&self, query: &Query) -> Result<i64> {
        let value = self.aggregate::<T>(query, AggregateMode::Count, "*")?;
        value.as_i64().ok_or(Error::TypeMismatch {
            column: "count".to_string(),
            expected: "i64",
            found: value.type_name(),
        })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert `record` with `changes`, cascading into associations.
    ///
    /// Does nothing when `changes` is empty. Afterwards the record holds its
    /// assigned primary key and (unless disabled) the re-read row.
    ///
    /// # Panics
    ///
    /// When `changes` rebind a loaded belongs-to or has-one association to
    /// another primary key.
    #[tracing::instrument(level = "debug", skip_all, fields(table))]
    pub fn insert(&self, record: &mut dyn Record, changes: Changeset) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut doc = Document::new(record)?;
        tracing::Span::current().record("table", doc.table());
        tracing::info!(table = doc.table(), "Inserting record");
        self.orchestrator().save(&mut doc, changes, Write::Insert)
    }

    /// Insert `record` using a snapshot of its own fields and loaded
    /// associations as the changes.
    pub fn insert_record(&self, record: &mut dyn Record) -> Result<()> {
        let changes = Changeset::from_record(record)?;
        self.insert(record, changes)
    }

    /// Insert one `T` per changeset with a single batch insert.
    ///
    /// `records` is replaced by the inserted records, in changeset order,
    /// and left untouched on failure. Does nothing when `changes` is empty.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn insert_all<T: Record + Default>(
        &self,
        records: &mut Vec<T>,
        changes: Vec<Changeset>,
    ) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut inserted: Vec<T> = Vec::with_capacity(changes.len());
        let mut collection = Collection::new(&mut inserted)?;
        tracing::info!(
            table = %collection.schema().table,
            count = changes.len(),
            "Inserting records"
        );
        self.orchestrator().insert_batch(&mut collection, changes)?;
        *records = inserted;
        Ok(())
    }

    /// Update `record` with `changes`, filtered by its primary key.
    ///
    /// Does nothing when `changes` is empty; fails with `NotFound` when the
    /// record has no primary key yet.
    ///
    /// # Panics
    ///
    /// When `changes` rebind a loaded belongs-to or has-one association to
    /// another primary key, or target an unloaded has-many association.
    #[tracing::instrument(level = "debug", skip_all, fields(table))]
    pub fn update(&self, record: &mut dyn Record, changes: Changeset) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut doc = Document::new(record)?;
        tracing::Span::current().record("table", doc.table());
        let pk = doc.primary_value().ok_or_else(Error::not_found)?;
        let query = Query::table(doc.table()).where_eq(doc.primary_column(), pk);
        tracing::info!(table = doc.table(), "Updating record");
        self.orchestrator().save(&mut doc, changes, Write::Update(query))
    }

    /// Delete `record` by its primary key.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn delete(&self, record: &dyn Record) -> Result<()> {
        let schema = Schema::for_record(record)?;
        let pk = record
            .get(schema.primary_key.name)
            .filter(|value| !value.is_blank())
            .ok_or_else(Error::not_found)?;
        tracing::info!(table = %schema.table, "Deleting record");
        self.adapter
            .delete(&Query::table(&schema.table).where_eq(schema.primary_key.name, pk))
    }

    /// Delete every row matching `query`, which must name its table.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn delete_all(&self, query: &Query) -> Result<()> {
        if query.table_name().is_none() {
            return Err(Error::schema("delete_all requires a query with a table"));
        }
        self.adapter.delete(query)
    }

    // ========================================================================
    // Preload
    // ========================================================================

    /// Load the association at `path` into `record`, filtered by `query`.
    #[tracing::instrument(level = "debug", skip(self, record))]
    pub fn preload(&self, record: &mut dyn Record, path: &str, query: &Query) -> Result<()> {
        let mut docs = vec![Document::new(record)?];
        docs[0].schema().association_path(path)?;
        preload::preload(self.adapter.as_ref(), &mut docs, path, query)
    }

    /// Load the association at `path` into every record of `records` with a
    /// single read.
    #[tracing::instrument(level = "debug", skip(self, records))]
    pub fn preload_all<T: Record>(&self, records: &mut [T], path: &str, query: &Query) -> Result<()> {
        Schema::of::<T>()?.association_path(path)?;
        let mut docs = records
            .iter_mut()
            .map(|record| Document::new(record))
            .collect::<Result<Vec<_>>>()?;
        preload::preload(self.adapter.as_ref(), &mut docs, path, query)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Run `f` inside a transaction.
    ///
    /// `f` receives a repository bound to the transactional adapter. Returning
    /// `Ok` commits (a commit failure becomes the result); returning `Err`
    /// rolls back and returns the error. A panic carrying an [`Error`] of an
    /// expected kind (see [`Error::is_expected`]) rolls back and is returned
    /// as `Err`; any other panic rolls back and resumes unwinding.
    ///
    /// Called on a repository that is already inside a transaction, `f`
    /// simply runs in the existing scope.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transaction<R>(&self, f: impl FnOnce(&Repository) -> Result<R>) -> Result<R> {
        if self.in_transaction {
            return f(self);
        }

        tracing::info!("Beginning transaction");
        let adapter = self.adapter.begin()?;
        let tx = Repository {
            adapter: Arc::clone(&adapter),
            config: self.config.clone(),
            in_transaction: true,
        };

        match panic::catch_unwind(AssertUnwindSafe(|| f(&tx))) {
            Ok(Ok(value)) => {
                tracing::info!("Committing transaction");
                adapter.commit()?;
                Ok(value)
            }
            Ok(Err(err)) => {
                rollback(adapter.as_ref(), &err);
                Err(err)
            }
            Err(payload) => match payload.downcast::<Error>() {
                Ok(err) if err.is_expected() => {
                    rollback(adapter.as_ref(), &err);
                    Err(*err)
                }
                Ok(err) => {
                    rollback(adapter.as_ref(), &err);
                    panic::resume_unwind(err)
                }
                Err(payload) => {
                    rollback(adapter.as_ref(), &panic_message(payload.as_ref()));
                    panic::resume_unwind(payload)
                }
            },
        }
    }

    // ========================================================================
    // Panicking variants
    // ========================================================================

    /// Like [`find`](Self::find), panicking with the [`Error`] as payload.
    pub fn must_find<T: Record + Default>(&self, query: &Query) -> T {
        must(self.find(query))
    }

    pub fn must_find_all<T: Record + Default>(&self, query: &Query) -> Vec<T> {
        must(self.find_all(query))
    }

    pub fn must_aggregate<T: Record>(&self, query: &Query, mode: AggregateMode, field: &str) -> Value {
        must(self.aggregate::<T>(query, mode, field))
    }

    pub fn must_count<T: Record>(&self, query: &Query) -> i64 {
        must(self.count::<T>(query))
    }

    pub fn must_insert(&self, record: &mut dyn Record, changes: Changeset) {
        must(self.insert(record, changes));
    }

    pub fn must_insert_record(&self, record: &mut dyn Record) {
        must(self.insert_record(record));
    }

    pub fn must_insert_all<T: Record + Default>(&self, records: &mut Vec<T>, changes: Vec<Changeset>) {
        must(self.insert_all(records, changes));
    }

    pub fn must_update(&self, record: &mut dyn Record, changes: Changeset) {
        must(self.update(record, changes));
    }

    pub fn must_delete(&self, record: &dyn Record) {
        must(self.delete(record));
    }

    pub fn must_delete_all(&self, query: &Query) {
        must(self.delete_all(query));
    }

    pub fn must_preload(&self, record: &mut dyn Record, path: &str, query: &Query) {
        must(self.preload(record, path, query));
    }

    pub fn must_preload_all<T: Record>(&self, records: &mut [T], path: &str, query: &Query) {
        must(self.preload_all(records, path, query));
    }
}

/// Unwrap `result`, panicking with the error itself as payload so
/// [`Repository::transaction`] can recover it.
fn must<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic::panic_any(err),
    }
}

fn rollback(adapter: &dyn Adapter, cause: &dyn fmt::Display) {
    tracing::info!(cause = %cause, "Rolling back transaction");
    if let Err(err) = adapter.rollback() {
        tracing::warn!(error = %err, "Rollback failed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

// ============================================================================
// Unit Tests
// ============================================================================
