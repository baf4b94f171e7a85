//! Error types for relmap.
//!
//! Adapter errors travel through the core unchanged. The core only adds its
//! own meaning in a few places: a single-row read that matches nothing becomes
//! [`Error::NotFound`], a field written with a value of the wrong type becomes
//! [`Error::TypeMismatch`], and a record type that cannot be introspected
//! becomes [`Error::Schema`].

use std::fmt;

/// The broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A single-row read expected one match and found none.
    NotFound,
    /// The adapter rejected a write because of a constraint.
    ConstraintViolation,
    /// A field was written with an incompatible value.
    TypeMismatch,
    /// A record type could not be introspected.
    Schema,
    /// Anything else reported by the adapter.
    Unexpected,
}

/// The kind of constraint that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
}

impl ConstraintKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Check => "check",
        }
    }
}

/// A constraint violation reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintError {
    /// Name of the violated constraint or the column it guards.
    pub key: String,
    /// What kind of constraint it is.
    pub kind: ConstraintKind,
    /// Adapter-provided detail, possibly empty.
    pub message: String,
}

impl ConstraintError {
    pub fn new(key: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            key: key.into(),
            kind,
            message: String::new(),
        }
    }

    /// Attach the adapter's message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// The error type for every fallible relmap operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A single-row read found no rows.
    NotFound(String),
    /// A write violated a uniqueness, foreign-key or check constraint.
    Constraint(ConstraintError),
    /// A value could not be stored in a field.
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A record type could not be introspected.
    Schema(String),
    /// Any other adapter failure.
    Unexpected(String),
}

/// Result alias used across the relmap crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// The "no result found" error returned by single-row reads.
    pub fn not_found() -> Self {
        Error::NotFound("no result found".to_string())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Error::Unexpected(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    /// A unique-constraint violation on `key`.
    pub fn not_unique(key: impl Into<String>) -> Self {
        Error::Constraint(ConstraintError::new(key, ConstraintKind::Unique))
    }

    /// The category this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Constraint(_) => ErrorKind::ConstraintViolation,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Schema(_) => ErrorKind::Schema,
            Error::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Whether a transaction may turn a panic carrying this error back into
    /// an ordinary `Err`.
    ///
    /// Every kind the core recognizes qualifies; `Unexpected` is re-raised.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        !matches!(self, Error::Unexpected(_))
    }

    /// Re-target a type mismatch produced by a value conversion at `column`.
    #[must_use]
    pub fn at_column(self, column: &str) -> Self {
        match self {
            Error::TypeMismatch {
                expected, found, ..
            } => Error::TypeMismatch {
                column: column.to_string(),
                expected,
                found,
            },
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "not found: {msg}"),
            Error::Constraint(err) => {
                write!(f, "{} constraint violated on `{}`", err.kind.as_str(), err.key)?;
                if !err.message.is_empty() {
                    write!(f, ": {}", err.message)?;
                }
                Ok(())
            }
            Error::TypeMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "type mismatch on `{column}`: expected {expected}, found {found}"
            ),
            Error::Schema(msg) => write!(f, "schema error: {msg}"),
            Error::Unexpected(msg) => write!(f, "unexpected error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
