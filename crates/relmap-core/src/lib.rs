//! Core types and traits for relmap.
//!
//! `relmap-core` is the **foundation layer** of the workspace. It defines the
//! data types every other crate exchanges and the introspection machinery
//! that turns a record type into a resolved [`Schema`].
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: [`Record`] is implemented by user types (through
//!   `#[derive(Record)]`); [`Slot`] and [`Sequence`] are the erased holders
//!   of associated records.
//! - **Data model**: [`Value`], [`Row`] and [`Changeset`] are what the
//!   repository hands to adapters and gets back from them.
//! - **Introspection**: [`Schema`] resolves tables, primary keys, columns
//!   and associations once per type and caches the result.
//! - **Views**: [`Document`] and [`Collection`] read and write caller-owned
//!   records in place.
//!
//! # Who Uses This Crate
//!
//! - `relmap-macros` generates `Record` implementations defined here.
//! - `relmap-query` builds filters over [`Value`]s.
//! - `relmap-repo` drives documents and changesets through its adapter.
//!
//! Most applications should use the `relmap` facade.

pub mod association;
pub mod changeset;
pub mod document;
pub mod error;
pub mod field;
pub mod naming;
pub mod record;
pub mod row;
pub mod schema;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use association::{AssociationInfo, AssociationKind, AssociationShape};
pub use changeset::{AssociationChanges, Change, Changeset, ChangesetBuilder};
pub use document::{Association, Collection, Document};
pub use error::{ConstraintError, ConstraintKind, Error, ErrorKind, Result};
pub use field::FieldInfo;
pub use record::{AssociationMut, AssociationRef, Record, RecordInfo, Sequence, Slot};
pub use row::Row;
pub use schema::{AssociationSchema, Column, Schema};
pub use value::{FromValue, KeyValue, ToValue, Value};
