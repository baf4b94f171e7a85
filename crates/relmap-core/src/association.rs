//! Association metadata for relmap.
//!
//! Associations are declared at compile time (via `#[derive(Record)]`) and
//! represented as static metadata on each record type. The schema
//! introspector turns that metadata into resolved [`AssociationKind`]s and
//! key columns; the orchestrator and preloader only ever read the resolved
//! form.

use crate::record::RecordInfo;

/// The resolved kind of an association between two record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// The local record holds the foreign key: a `Transaction` belongs to its
    /// buyer `User` through `transactions.user_id`.
    BelongsTo,
    /// The target record holds the foreign key and there is at most one of it:
    /// a `User` has one `Address` through `addresses.user_id`.
    HasOne,
    /// The target record holds the foreign key and there are many of them:
    /// a `User` has many `Transaction`s through `transactions.user_id`.
    HasMany,
}

impl AssociationKind {
    /// Whether this association must be persisted before its owner.
    #[must_use]
    pub const fn persists_before_owner(&self) -> bool {
        matches!(self, AssociationKind::BelongsTo)
    }
}

/// Shape of the field holding an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationShape {
    /// `Option<T>` or `Option<Box<T>>`.
    One,
    /// `Option<Vec<T>>`.
    Many,
}

/// Declared (unresolved) metadata about one association field.
#[derive(Debug, Clone, Copy)]
pub struct AssociationInfo {
    /// Name of the association field.
    pub name: &'static str,

    /// Shape of the field.
    pub shape: AssociationShape,

    /// Static metadata of the associated record type.
    pub target: fn() -> &'static RecordInfo,

    /// Explicit kind, overriding inference by shape.
    pub kind: Option<AssociationKind>,

    /// Explicit foreign-key column (on the owning side).
    pub foreign_key: Option<&'static str>,

    /// Explicit reference-key column (on the "one" side).
    pub reference_key: Option<&'static str>,
}

impl AssociationInfo {
    /// Create a new association with inferred kind and keys.
    #[must_use]
    pub const fn new(
        name: &'static str,
        shape: AssociationShape,
        target: fn() -> &'static RecordInfo,
    ) -> Self {
        Self {
            name,
            shape,
            target,
            kind: None,
            foreign_key: None,
            reference_key: None,
        }
    }

    /// Force the association kind.
    #[must_use]
    pub const fn kind(mut self, kind: AssociationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the foreign-key column.
    #[must_use]
    pub const fn foreign_key(mut self, column: &'static str) -> Self {
        self.foreign_key = Some(column);
        self
    }

    /// Set the reference-key column.
    #[must_use]
    pub const fn reference_key(mut self, column: &'static str) -> Self {
        self.reference_key = Some(column);
        self
    }

    /// The associated record type's metadata.
    pub fn target_info(&self) -> &'static RecordInfo {
        (self.target)()
    }
}
