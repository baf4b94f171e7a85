//! Schema-bound views over caller-owned records.
//!
//! A [`Document`] wraps `&mut dyn Record` together with its resolved
//! [`Schema`]; a [`Collection`] does the same for a sequence of records. Both
//! read and write the caller's memory in place and never copy a record.

use std::sync::Arc;

use crate::association::AssociationKind;
use crate::error::{Error, Result};
use crate::record::{AssociationMut, AssociationRef, Record, Sequence};
use crate::row::Row;
use crate::schema::{AssociationSchema, Schema};
use crate::value::Value;

/// A view over exactly one record.
pub struct Document<'a> {
    schema: Arc<Schema>,
    record: &'a mut dyn Record,
}

impl std::fmt::Debug for Document<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("table", &self.schema.table)
            .field("primary", &self.primary_value())
            .finish_non_exhaustive()
    }
}

impl<'a> Document<'a> {
    /// Wrap `record`, resolving (or reusing) its schema.
    pub fn new(record: &'a mut dyn Record) -> Result<Self> {
        let schema = Schema::for_record(record)?;
        Ok(Self { schema, record })
    }

    pub(crate) fn with_schema(schema: Arc<Schema>, record: &'a mut dyn Record) -> Self {
        Self { schema, record }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.schema.table
    }

    pub fn primary_column(&self) -> &'static str {
        self.schema.primary_key.name
    }

    /// The primary key, or `None` while it is blank (record not persisted).
    pub fn primary_value(&self) -> Option<Value> {
        self.get(self.schema.primary_key.name)
            .filter(|value| !value.is_blank())
    }

    pub fn get(&self, column: &str) -> Option<Value> {
        self.record.get(column)
    }

    /// Type-checked write of one column.
    pub fn set(&mut self, column: &str, value: Value) -> Result<()> {
        if !self.schema.has_column(column) {
            return Err(Error::schema(format!(
                "`{}` has no column `{column}`",
                self.schema.type_name
            )));
        }
        self.record
            .set(column, value)
            .map_err(|err| err.at_column(column))
    }

    /// Mirror every known column of `row` into the record.
    ///
    /// Columns the record does not declare are ignored.
    pub fn apply_row(&mut self, row: &Row) -> Result<()> {
        for (column, value) in row.iter() {
            if self.schema.has_column(column) {
                self.record
                    .set(column, value.clone())
                    .map_err(|err| err.at_column(column))?;
            }
        }
        Ok(())
    }

    pub fn record(&self) -> &dyn Record {
        &*self.record
    }

    /// Borrow the association named `name`.
    pub fn association(&mut self, name: &str) -> Result<Association<'_>> {
        let schema = self.schema.association(name).cloned().ok_or_else(|| {
            Error::schema(format!(
                "`{}` has no association named `{name}`",
                self.schema.type_name
            ))
        })?;
        let field = self.record.association_mut(name).ok_or_else(|| {
            Error::schema(format!(
                "`{}` does not expose association field `{name}`",
                self.schema.type_name
            ))
        })?;
        Ok(Association { schema, field })
    }

    /// Whether the association named `name` is loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        match self.record.association(name) {
            Some(AssociationRef::One(slot)) => slot.get().is_some(),
            Some(AssociationRef::Many(seq)) => seq.is_loaded(),
            None => false,
        }
    }
}

/// Handle to one association field of a [`Document`].
///
/// Distinguishes "not loaded" (`None` / unloaded sequence) from "loaded but
/// empty".
pub struct Association<'a> {
    schema: AssociationSchema,
    field: AssociationMut<'a>,
}

impl std::fmt::Debug for Association<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("name", &self.schema.name)
            .field("kind", &self.schema.kind)
            .finish_non_exhaustive()
    }
}

impl<'a> Association<'a> {
    pub fn schema(&self) -> &AssociationSchema {
        &self.schema
    }

    pub fn kind(&self) -> AssociationKind {
        self.schema.kind
    }

    pub fn is_loaded(&self) -> bool {
        match &self.field {
            AssociationMut::One(slot) => slot.get().is_some(),
            AssociationMut::Many(seq) => seq.is_loaded(),
        }
    }

    /// The loaded single record, if any.
    pub fn document(self) -> Result<Option<Document<'a>>> {
        let target = self.schema.target_schema()?;
        match self.field {
            AssociationMut::One(slot) => Ok(slot
                .get_mut()
                .map(|record| Document::with_schema(target, record))),
            AssociationMut::Many(_) => Err(shape_error(self.schema.name, "a single record")),
        }
    }

    /// The single record, initialized to its default when empty.
    pub fn document_or_init(self) -> Result<Document<'a>> {
        let target = self.schema.target_schema()?;
        match self.field {
            AssociationMut::One(slot) => Ok(Document::with_schema(target, slot.get_or_init())),
            AssociationMut::Many(_) => Err(shape_error(self.schema.name, "a single record")),
        }
    }

    /// Clear a single association back to "not loaded".
    pub fn clear(self) -> Result<()> {
        match self.field {
            AssociationMut::One(slot) => {
                slot.clear();
                Ok(())
            }
            AssociationMut::Many(_) => Err(shape_error(self.schema.name, "a single record")),
        }
    }

    pub fn collection(self) -> Result<Collection<'a>> {
        let target = self.schema.target_schema()?;
        match self.field {
            AssociationMut::Many(seq) => Ok(Collection::with_schema(target, seq)),
            AssociationMut::One(_) => Err(shape_error(self.schema.name, "a sequence")),
        }
    }
}

fn shape_error(name: &str, expected: &str) -> Error {
    Error::schema(format!("association `{name}` does not hold {expected}"))
}

/// A view over an ordered sequence of records of one type.
pub struct Collection<'a> {
    schema: Arc<Schema>,
    records: &'a mut dyn Sequence,
}

impl std::fmt::Debug for Collection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("table", &self.schema.table)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Collection<'a> {
    pub fn new(records: &'a mut dyn Sequence) -> Result<Self> {
        let schema = Schema::resolve(records.target())?;
        Ok(Self { schema, records })
    }

    fn with_schema(schema: Arc<Schema>, records: &'a mut dyn Sequence) -> Self {
        Self { schema, records }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn is_loaded(&self) -> bool {
        self.records.is_loaded()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&mut self, index: usize) -> Option<Document<'_>> {
        let schema = Arc::clone(&self.schema);
        self.records
            .get_mut(index)
            .map(|record| Document::with_schema(schema, record))
    }

    /// Read a column of the element at `index`.
    pub fn value(&self, index: usize, column: &str) -> Option<Value> {
        self.records.get(index).and_then(|record| record.get(column))
    }

    /// Append a default element and return a view over it.
    pub fn push(&mut self) -> Document<'_> {
        let schema = Arc::clone(&self.schema);
        Document::with_schema(schema, self.records.push_default())
    }

    /// Drop every element; the collection stays loaded.
    pub fn reset(&mut self) {
        self.records.reset();
    }

    /// Keep only the first `len` elements.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// Views over every element, in order.
    pub fn documents(&mut self) -> Vec<Document<'_>> {
        let schema = &self.schema;
        self.records
            .records_mut()
            .into_iter()
            .map(|record| Document::with_schema(Arc::clone(schema), record))
            .collect()
    }

    /// Consume the collection into views over every element.
    pub fn into_documents(self) -> Vec<Document<'a>> {
        let Collection { schema, records } = self;
        records
            .records_mut()
            .into_iter()
            .map(|record| Document::with_schema(Arc::clone(&schema), record))
            .collect()
    }

    /// Non-blank primary keys of the elements, in order.
    pub fn primary_values(&self) -> Vec<Value> {
        let column = self.schema.primary_key.name;
        (0..self.records.len())
            .filter_map(|index| self.value(index, column))
            .filter(|value| !value.is_blank())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::{Address, Transaction, User};

    #[test]
    fn test_get_and_set_columns() {
        let mut user = User::default();
        let mut doc = Document::new(&mut user).unwrap();
        assert_eq!(doc.table(), "users");
        assert_eq!(doc.primary_value(), None);

        doc.set("name", Value::from("Ann")).unwrap();
        doc.set("id", Value::Int(7)).unwrap();
        assert_eq!(doc.get("name"), Some(Value::from("Ann")));
        assert_eq!(doc.primary_value(), Some(Value::BigInt(7)));
        assert_eq!(user.id, 7);
        assert_eq!(user.name, "Ann");
    }

    #[test]
    fn test_set_type_mismatch_names_column() {
        let mut user = User::default();
        let mut doc = Document::new(&mut user).unwrap();
        let err = doc.set("age", Value::from("old")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("`age`"));

        let err = doc.set("nope", Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_apply_row_ignores_unknown_columns() {
        let mut user = User::default();
        let row = Row::new()
            .with("id", 3_i64)
            .with("name", "Bo")
            .with("created_at", "2020-01-01");
        Document::new(&mut user).unwrap().apply_row(&row).unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.name, "Bo");
    }

    #[test]
    fn test_association_loaded_state() {
        let mut user = User::default();
        let mut doc = Document::new(&mut user).unwrap();
        assert!(!doc.is_loaded("address"));
        assert!(!doc.association("transactions").unwrap().is_loaded());

        let mut collection = doc.association("transactions").unwrap().collection().unwrap();
        collection.reset();
        assert!(collection.is_loaded());
        assert!(collection.is_empty());

        let address = doc.association("address").unwrap().document().unwrap();
        assert!(address.is_none());
        let mut address = doc.association("address").unwrap().document_or_init().unwrap();
        address.set("street", Value::from("Main")).unwrap();

        assert_eq!(
            user.address,
            Some(Address {
                street: "Main".to_string(),
                ..Address::default()
            })
        );
        assert_eq!(user.transactions, Some(vec![]));
    }

    #[test]
    fn test_association_shape_errors() {
        let mut user = User::default();
        let mut doc = Document::new(&mut user).unwrap();
        let err = doc.association("address").unwrap().collection().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        let err = doc.association("missing").unwrap_err();
        assert!(err.to_string().contains("no association named `missing`"));
    }

    #[test]
    fn test_collection_push_and_primary_values() {
        let mut items: Vec<Transaction> = vec![
            Transaction {
                id: 1,
                ..Transaction::default()
            },
            Transaction::default(),
        ];
        let mut collection = Collection::new(&mut items).unwrap();
        assert_eq!(collection.len(), 2);

        collection.push().set("id", Value::BigInt(5)).unwrap();
        assert_eq!(
            collection.primary_values(),
            vec![Value::BigInt(1), Value::BigInt(5)]
        );

        for mut doc in collection.documents() {
            doc.set("item", Value::from("pen")).unwrap();
        }
        assert!(items.iter().all(|t| t.item == "pen"));
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_debug_names_table_and_association() {
        let mut user = User::default();
        let mut doc = Document::new(&mut user).unwrap();
        let assoc = doc.association("transactions").unwrap();
        assert!(format!("{assoc:?}").contains("\"transactions\""));
        let collection = assoc.collection().unwrap();
        assert!(format!("{collection:?}").contains("len: 0"));
    }

    #[test]
    fn test_collection_truncate_keeps_loaded_state() {
        let mut items: Option<Vec<Transaction>> = Some(vec![Transaction {
            id: 1,
            ..Transaction::default()
        }]);
        let mut collection = Collection::new(&mut items).unwrap();
        collection.push();
        collection.push();
        collection.truncate(1);
        assert_eq!(collection.primary_values(), vec![Value::BigInt(1)]);
        assert_eq!(items.map(|v| v.len()), Some(1));

        let mut unloaded: Option<Vec<Transaction>> = None;
        Collection::new(&mut unloaded).unwrap().truncate(0);
        assert_eq!(unloaded, None);
    }
}
