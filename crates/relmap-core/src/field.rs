//! Field and column definitions.

/// Metadata about one persisted field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// Whether this is the primary key
    pub primary_key: bool,
}

impl FieldInfo {
    /// Create a new field info whose column name defaults to the field name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            column_name: name,
            primary_key: false,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Set whether this is the primary key.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }
}
