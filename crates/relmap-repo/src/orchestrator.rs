//! Cascading persistence of a record and its associations.
//!
//! Belongs-to associations are written before their owner so the owner's
//! foreign key can point at the parent's final primary key. Has-one and
//! has-many associations are written after their owner so the owner's key
//! can be stamped into theirs. Nested changesets recurse depth-first.

use std::collections::HashMap;
use std::sync::Arc;

use relmap_core::{
    AssociationChanges, AssociationKind, AssociationSchema, Changeset, Collection, Document, Error,
    KeyValue, Result, Row, Schema, Value,
};
use relmap_query::{Query, filter};

use crate::adapter::Adapter;
use crate::repository::RepositoryConfig;

/// How the owner of a changeset is written.
#[derive(Debug, Clone)]
pub(crate) enum Write {
    Insert,
    /// Update the rows matching the query, then re-read them through it.
    Update(Query),
}

type Entry = (AssociationSchema, AssociationChanges);

pub(crate) struct Orchestrator<'r> {
    adapter: &'r dyn Adapter,
    config: &'r RepositoryConfig,
}

impl<'r> Orchestrator<'r> {
    pub(crate) fn new(adapter: &'r dyn Adapter, config: &'r RepositoryConfig) -> Self {
        Self { adapter, config }
    }

    /// Persist `doc` with `changes`, cascading into its associations.
    ///
    /// # Panics
    ///
    /// Before any adapter call, when `changes` rebind a loaded belongs-to or
    /// has-one association to another primary key, or target a has-many
    /// association that was never loaded on an already persisted record.
    pub(crate) fn save(&self, doc: &mut Document<'_>, changes: Changeset, write: Write) -> Result<()> {
        preflight(doc, &changes, matches!(write, Write::Insert))?;
        self.persist(doc, changes, write)
    }

    fn persist(&self, doc: &mut Document<'_>, mut changes: Changeset, write: Write) -> Result<()> {
        let entries = resolve_entries(doc.schema(), changes.split_associations())?;
        let (before, after): (Vec<Entry>, Vec<Entry>) = entries
            .into_iter()
            .partition(|(assoc, _)| assoc.kind.persists_before_owner());

        for (assoc, entry) in before {
            self.upsert_belongs_to(doc, &assoc, entry, &mut changes)?;
        }

        let owner_is_new = matches!(write, Write::Insert);
        self.write_owner(doc, &changes, write)?;
        self.persist_dependents(doc, after, owner_is_new)
    }

    fn persist_dependents(
        &self,
        doc: &mut Document<'_>,
        entries: Vec<Entry>,
        owner_is_new: bool,
    ) -> Result<()> {
        for (assoc, entry) in entries {
            if assoc.kind == AssociationKind::HasMany {
                self.upsert_has_many(doc, &assoc, entry, owner_is_new)?;
            } else {
                self.upsert_has_one(doc, &assoc, entry)?;
            }
        }
        Ok(())
    }

    fn write_owner(&self, doc: &mut Document<'_>, changes: &Changeset, write: Write) -> Result<()> {
        let pk = doc.primary_column();
        match write {
            Write::Insert => {
                let table = doc.table().to_string();
                let id = self.adapter.insert(&Query::table(&table), changes)?;
                let id = if id.is_blank() {
                    changes.value(pk).cloned().unwrap_or_default()
                } else {
                    id
                };
                tracing::debug!(table = %table, id = ?id, "Inserted record");

                if self.config.reload_after_write && !id.is_blank() {
                    let row = self.find_one(&Query::table(&table).where_eq(pk, id))?;
                    return doc.apply_row(&row);
                }
                changes.apply_to(doc)?;
                if !id.is_blank() {
                    doc.set(pk, id)?;
                }
                Ok(())
            }
            Write::Update(query) => {
                if !changes.has_columns() {
                    return Ok(());
                }
                self.adapter.update(&query, changes)?;
                tracing::debug!(table = doc.table(), "Updated record");

                if self.config.reload_after_write {
                    let row = self.find_one(&query)?;
                    doc.apply_row(&row)
                } else {
                    changes.apply_to(doc)
                }
            }
        }
    }

    /// The single row matching `query`, or `NotFound`.
    pub(crate) fn find_one(&self, query: &Query) -> Result<Row> {
        self.adapter
            .all(&query.limit(1))?
            .into_iter()
            .next()
            .ok_or_else(Error::not_found)
    }

    fn upsert_belongs_to(
        &self,
        doc: &mut Document<'_>,
        assoc: &AssociationSchema,
        entry: AssociationChanges,
        owner_changes: &mut Changeset,
    ) -> Result<()> {
        let Some(child_changes) = single(entry) else {
            return Ok(());
        };

        let mut child = doc.association(assoc.name)?.document_or_init()?;
        match child.primary_value() {
            Some(pk) => {
                let query = Query::table(child.table()).where_eq(child.primary_column(), pk);
                self.persist(&mut child, child_changes, Write::Update(query))?;
            }
            None => {
                self.persist(&mut child, child_changes, Write::Insert)?;
                let reference = child.get(&assoc.reference_key).unwrap_or_default();
                owner_changes.put(&assoc.foreign_key, reference);
            }
        }
        tracing::debug!(association = assoc.name, table = child.table(), "Upserted belongs-to");
        Ok(())
    }

    fn upsert_has_one(
        &self,
        doc: &mut Document<'_>,
        assoc: &AssociationSchema,
        entry: AssociationChanges,
    ) -> Result<()> {
        let Some(mut child_changes) = single(entry) else {
            return Ok(());
        };
        let reference = owner_reference(doc, assoc)?;
        child_changes.put(&assoc.foreign_key, reference.clone());

        let mut child = doc.association(assoc.name)?.document_or_init()?;
        match child.primary_value() {
            Some(pk) => {
                let query = Query::table(child.table()).filter(
                    filter::eq(child.primary_column(), pk).and_eq(&assoc.foreign_key, reference),
                );
                self.persist(&mut child, child_changes, Write::Update(query))?;
            }
            None => self.persist(&mut child, child_changes, Write::Insert)?,
        }
        tracing::debug!(association = assoc.name, table = child.table(), "Upserted has-one");
        Ok(())
    }

    fn upsert_has_many(
        &self,
        doc: &mut Document<'_>,
        assoc: &AssociationSchema,
        entry: AssociationChanges,
        owner_is_new: bool,
    ) -> Result<()> {
        let AssociationChanges {
            changes: mut children,
            cleared,
        } = entry;
        let reference = owner_reference(doc, assoc)?;

        let mut collection = doc.association(assoc.name)?.collection()?;
        debug_assert!(owner_is_new || collection.is_loaded());

        if cleared {
            let ids = collection.primary_values();
            if !ids.is_empty() {
                let target = Arc::clone(collection.schema());
                let query = Query::table(&target.table).filter(
                    filter::eq(&assoc.foreign_key, reference.clone())
                        .and_in(target.primary_key.name, ids),
                );
                self.adapter.delete(&query)?;
                tracing::debug!(
                    association = assoc.name,
                    table = %target.table,
                    "Deleted replaced has-many rows"
                );
            }
            collection.reset();
        }

        if children.is_empty() {
            return Ok(());
        }
        for child in &mut children {
            child.put(&assoc.foreign_key, reference.clone());
        }
        self.insert_batch(&mut collection, children)
    }

    /// Append one element per changeset to `collection` and persist them
    /// with a single batch insert.
    ///
    /// When the batch insert fails, `collection` is truncated back to its
    /// previous length.
    pub(crate) fn insert_batch(
        &self,
        collection: &mut Collection<'_>,
        mut children: Vec<Changeset>,
    ) -> Result<()> {
        let schema = Arc::clone(collection.schema());
        let pk = schema.primary_key.name;
        let start = collection.len();

        let (ids, deferred) = match self.stage_batch(collection, &schema, &mut children) {
            Ok(staged) => staged,
            Err(err) => {
                collection.truncate(start);
                return Err(err);
            }
        };
        let query = Query::table(&schema.table);

        for (offset, (id, changes)) in ids.iter().zip(&children).enumerate() {
            let Some(mut doc) = collection.get(start + offset) else {
                continue;
            };
            if !self.config.reload_after_write {
                changes.apply_to(&mut doc)?;
            }
            if !id.is_blank() {
                doc.set(pk, id.clone())?;
            }
        }

        if self.config.reload_after_write {
            let positions: HashMap<KeyValue, usize> = ids
                .iter()
                .enumerate()
                .filter_map(|(offset, id)| id.key().map(|key| (key, start + offset)))
                .collect();
            if !positions.is_empty() {
                let keys = ids.iter().filter(|id| !id.is_blank()).cloned().collect();
                let rows = self.adapter.all(&query.where_in(pk, keys))?;
                for row in &rows {
                    let Some(&index) = row.get(pk).and_then(Value::key).and_then(|k| positions.get(&k))
                    else {
                        continue;
                    };
                    if let Some(mut doc) = collection.get(index) {
                        doc.apply_row(row)?;
                    }
                }
            }
        }

        for (offset, entries) in deferred.into_iter().enumerate() {
            if entries.is_empty() {
                continue;
            }
            if let Some(mut doc) = collection.get(start + offset) {
                self.persist_dependents(&mut doc, entries, true)?;
            }
        }
        Ok(())
    }

    /// Push placeholders, persist belongs-to parents and run the batch
    /// insert. Returns the assigned ids plus the entries to persist after
    /// each element.
    fn stage_batch(
        &self,
        collection: &mut Collection<'_>,
        schema: &Schema,
        children: &mut [Changeset],
    ) -> Result<(Vec<Value>, Vec<Vec<Entry>>)> {
        let pk = schema.primary_key.name;

        // Belongs-to parents of every new element go first.
        let mut deferred = Vec::with_capacity(children.len());
        for changes in children.iter_mut() {
            let entries = resolve_entries(schema, changes.split_associations())?;
            let (before, after): (Vec<Entry>, Vec<Entry>) = entries
                .into_iter()
                .partition(|(assoc, _)| assoc.kind.persists_before_owner());
            let mut doc = collection.push();
            for (assoc, entry) in before {
                self.upsert_belongs_to(&mut doc, &assoc, entry, changes)?;
            }
            deferred.push(after);
        }

        let ids = self.adapter.insert_all(&Query::table(&schema.table), children)?;
        if ids.len() != children.len() {
            return Err(Error::unexpected(format!(
                "adapter returned {} ids for {} inserted `{}` rows",
                ids.len(),
                children.len(),
                schema.table
            )));
        }
        let ids = ids
            .into_iter()
            .zip(children.iter())
            .map(|(id, changes)| {
                if id.is_blank() {
                    changes.value(pk).cloned().unwrap_or_default()
                } else {
                    id
                }
            })
            .collect();
        Ok((ids, deferred))
    }
}

/// Pair every association entry with its resolved schema.
fn resolve_entries(
    schema: &Schema,
    entries: Vec<(String, AssociationChanges)>,
) -> Result<Vec<Entry>> {
    entries
        .into_iter()
        .map(|(name, changes)| {
            schema
                .association(&name)
                .cloned()
                .map(|assoc| (assoc, changes))
                .ok_or_else(|| unknown_association(schema, &name))
        })
        .collect()
}

fn unknown_association(schema: &Schema, name: &str) -> Error {
    Error::schema(format!(
        "`{}` has no association named `{name}`",
        schema.type_name
    ))
}

/// The changeset of a single-record association, if it changes anything.
fn single(entry: AssociationChanges) -> Option<Changeset> {
    entry.changes.into_iter().next().filter(|c| !c.is_empty())
}

/// The owner's value for `assoc.reference_key`, which must be set by now.
fn owner_reference(doc: &Document<'_>, assoc: &AssociationSchema) -> Result<Value> {
    doc.get(&assoc.reference_key)
        .filter(|value| !value.is_blank())
        .ok_or_else(|| {
            Error::unexpected(format!(
                "`{}.{}` is blank; cannot stamp association `{}`",
                doc.schema().type_name,
                assoc.reference_key,
                assoc.name
            ))
        })
}

/// Check the caller contract for a whole changeset tree before any write.
fn preflight(doc: &mut Document<'_>, changes: &Changeset, owner_is_new: bool) -> Result<()> {
    let owner = doc.schema().type_name;
    for (name, entry) in changes.associations() {
        let kind = doc
            .schema()
            .association(name)
            .map(|assoc| assoc.kind)
            .ok_or_else(|| unknown_association(doc.schema(), name))?;

        match kind {
            AssociationKind::BelongsTo | AssociationKind::HasOne => {
                let Some(child_changes) = entry.changes.first().filter(|c| !c.is_empty()) else {
                    continue;
                };
                let Some(mut child) = doc.association(name)?.document()? else {
                    continue;
                };
                let loaded = child.primary_value();
                let incoming = child_changes
                    .value(child.primary_column())
                    .filter(|value| !value.is_blank());
                if let (Some(loaded), Some(incoming)) = (&loaded, incoming) {
                    assert!(
                        loaded.same_key(incoming),
                        "association `{owner}.{name}` is loaded with primary key {loaded:?} \
                         but its changes target {incoming:?}"
                    );
                }
                preflight(&mut child, child_changes, loaded.is_none())?;
            }
            AssociationKind::HasMany => {
                assert!(
                    owner_is_new || doc.is_loaded(name),
                    "has-many association `{owner}.{name}` must be loaded before it is upserted"
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::ChangesetBuilder;

    #[test]
    fn test_single_skips_empty_changes() {
        let entry = AssociationChanges {
            changes: vec![Changeset::new()],
            cleared: false,
        };
        assert!(single(entry).is_none());

        let entry = AssociationChanges {
            changes: vec![ChangesetBuilder::default().set("street", "Main").build()],
            cleared: false,
        };
        assert_eq!(
            single(entry).and_then(|c| c.value("street").cloned()),
            Some(Value::from("Main"))
        );

        assert!(single(AssociationChanges::default()).is_none());
    }
}
