//! Procedural macros for relmap.
//!
//! `#[derive(Record)]` generates the `relmap_core::Record` implementation of a
//! struct: its static metadata (table, columns, associations) plus the
//! column and association accessors the repository uses at runtime.
//!
//! # Attributes
//!
//! On the struct:
//! - `#[record(table = "name")]` overrides the pluralized table name.
//!
//! On fields:
//! - `#[record(primary_key)]` marks the primary key (defaults to `id`).
//! - `#[record(column = "name")]` overrides the column name.
//! - `#[record(skip)]` leaves the field out of the mapping.
//! - `#[record(association)]` declares an association whose kind is inferred;
//!   `belongs_to`, `has_one` and `has_many` force the kind.
//! - `foreign_key = "..."` and `reference_key = "..."` override the key
//!   columns of an association.
//!
//! ```ignore
//! #[derive(Record, Default)]
//! struct Transaction {
//!     id: i64,
//!     user_id: i64,
//!     #[record(association)]
//!     buyer: Option<Box<User>>,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod generate;
mod parse;

/// Derive `relmap_core::Record` for a struct with named fields.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match parse::parse_record(&input) {
        Ok(def) => generate::generate_record_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}
