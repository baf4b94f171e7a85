//! The `Record` trait and the type-erased holders for associated records.
//!
//! Records are ordinary structs. `#[derive(Record)]` generates their static
//! [`RecordInfo`] plus column accessors, so the rest of the crate can read and
//! write any record through `&mut dyn Record` without knowing its type.

use std::any::TypeId;

use crate::association::AssociationInfo;
use crate::error::Result;
use crate::field::FieldInfo;
use crate::value::Value;

/// Static, declared metadata of a record type.
///
/// This is the raw input of schema introspection; see
/// [`Schema::resolve`](crate::schema::Schema::resolve) for the resolved form.
#[derive(Debug)]
pub struct RecordInfo {
    /// Rust type name (without module path), e.g. `"User"`.
    pub type_name: &'static str,
    /// Identity of the record type, used to key the schema cache.
    pub type_id: fn() -> TypeId,
    /// Explicit table name, overriding the pluralized type name.
    pub table: Option<&'static str>,
    /// Persisted fields in declaration order.
    pub fields: &'static [FieldInfo],
    /// Association fields in declaration order.
    pub associations: &'static [AssociationInfo],
}

impl RecordInfo {
    pub const fn new(
        type_name: &'static str,
        type_id: fn() -> TypeId,
        fields: &'static [FieldInfo],
        associations: &'static [AssociationInfo],
    ) -> Self {
        Self {
            type_name,
            type_id,
            table: None,
            fields,
            associations,
        }
    }

    /// Set an explicit table name.
    pub const fn table(mut self, table: &'static str) -> Self {
        self.table = Some(table);
        self
    }

    pub fn field_by_column(&self, column: &str) -> Option<&'static FieldInfo> {
        self.fields.iter().find(|f| f.column_name == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.field_by_column(column).is_some()
    }
}

/// A record type that can be bound to rows.
///
/// Implemented by `#[derive(Record)]`. Every method but `record_info` is
/// object-safe so records can be walked as `&mut dyn Record`.
pub trait Record: Send + 'static {
    /// Static metadata of this record type.
    fn record_info() -> &'static RecordInfo
    where
        Self: Sized;

    /// Static metadata of this value's type.
    fn info(&self) -> &'static RecordInfo;

    /// Read a column. `None` when the record has no such column.
    fn get(&self, column: &str) -> Option<Value>;

    /// Write a column, failing with `TypeMismatch` for an incompatible value
    /// and `Schema` for an unknown column.
    fn set(&mut self, column: &str, value: Value) -> Result<()>;

    /// Borrow an association field by name.
    fn association(&self, name: &str) -> Option<AssociationRef<'_>>;

    /// Mutably borrow an association field by name.
    fn association_mut(&mut self, name: &str) -> Option<AssociationMut<'_>>;
}

impl<T: Record> Record for Box<T> {
    fn record_info() -> &'static RecordInfo {
        T::record_info()
    }

    fn info(&self) -> &'static RecordInfo {
        (**self).info()
    }

    fn get(&self, column: &str) -> Option<Value> {
        (**self).get(column)
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        (**self).set(column, value)
    }

    fn association(&self, name: &str) -> Option<AssociationRef<'_>> {
        (**self).association(name)
    }

    fn association_mut(&mut self, name: &str) -> Option<AssociationMut<'_>> {
        (**self).association_mut(name)
    }
}

/// Shared borrow of an association field.
pub enum AssociationRef<'a> {
    One(&'a dyn Slot),
    Many(&'a dyn Sequence),
}

/// Mutable borrow of an association field.
pub enum AssociationMut<'a> {
    One(&'a mut dyn Slot),
    Many(&'a mut dyn Sequence),
}

/// Holder of a single associated record (`Option<T>`).
///
/// `None` means the association was never loaded.
pub trait Slot {
    fn target(&self) -> &'static RecordInfo;
    fn get(&self) -> Option<&dyn Record>;
    fn get_mut(&mut self) -> Option<&mut dyn Record>;
    /// The held record, inserting a default one first when empty.
    fn get_or_init(&mut self) -> &mut dyn Record;
    fn clear(&mut self);
}

impl<T: Record + Default> Slot for Option<T> {
    fn target(&self) -> &'static RecordInfo {
        T::record_info()
    }

    fn get(&self) -> Option<&dyn Record> {
        self.as_ref().map(|r| r as &dyn Record)
    }

    fn get_mut(&mut self) -> Option<&mut dyn Record> {
        self.as_mut().map(|r| r as &mut dyn Record)
    }

    fn get_or_init(&mut self) -> &mut dyn Record {
        self.get_or_insert_with(T::default)
    }

    fn clear(&mut self) {
        *self = None;
    }
}

/// Holder of an ordered sequence of associated records.
///
/// `Vec<T>` is always loaded; `Option<Vec<T>>` distinguishes "not loaded"
/// (`None`) from "loaded but empty" (`Some(vec![])`).
pub trait Sequence {
    fn target(&self) -> &'static RecordInfo;
    fn is_loaded(&self) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn get(&self, index: usize) -> Option<&dyn Record>;
    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Record>;
    fn records_mut(&mut self) -> Vec<&mut dyn Record>;
    /// Append a default record (marking the sequence loaded) and return it.
    fn push_default(&mut self) -> &mut dyn Record;
    /// Drop every element, leaving the sequence loaded and empty.
    fn reset(&mut self);
    /// Shorten the sequence to `len` elements. Loaded state is unchanged.
    fn truncate(&mut self, len: usize);
}

impl<T: Record + Default> Sequence for Vec<T> {
    fn target(&self) -> &'static RecordInfo {
        T::record_info()
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> Option<&dyn Record> {
        self.as_slice().get(index).map(|r| r as &dyn Record)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Record> {
        self.as_mut_slice().get_mut(index).map(|r| r as &mut dyn Record)
    }

    fn records_mut(&mut self) -> Vec<&mut dyn Record> {
        self.iter_mut().map(|r| r as &mut dyn Record).collect()
    }

    fn push_default(&mut self) -> &mut dyn Record {
        let index = Vec::len(self);
        self.push(T::default());
        &mut self[index]
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn truncate(&mut self, len: usize) {
        Vec::truncate(self, len);
    }
}

impl<T: Record + Default> Sequence for Option<Vec<T>> {
    fn target(&self) -> &'static RecordInfo {
        T::record_info()
    }

    fn is_loaded(&self) -> bool {
        self.is_some()
    }

    fn len(&self) -> usize {
        self.as_ref().map_or(0, Vec::len)
    }

    fn get(&self, index: usize) -> Option<&dyn Record> {
        self.as_ref().and_then(|v| Sequence::get(v, index))
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Record> {
        self.as_mut().and_then(|v| Sequence::get_mut(v, index))
    }

    fn records_mut(&mut self) -> Vec<&mut dyn Record> {
        match self {
            Some(v) => v.records_mut(),
            None => Vec::new(),
        }
    }

    fn push_default(&mut self) -> &mut dyn Record {
        self.get_or_insert_with(Vec::new).push_default()
    }

    fn reset(&mut self) {
        *self = Some(Vec::new());
    }

    fn truncate(&mut self, len: usize) {
        if let Some(v) = self {
            v.truncate(len);
        }
    }
}
