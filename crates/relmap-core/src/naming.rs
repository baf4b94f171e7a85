//! Naming conventions used by schema introspection.
//!
//! These are pure functions so they can be checked in isolation: table names
//! are the pluralized snake_case type name and foreign keys are
//! `<snake_case type>_id`. Every inferred or explicit name must be a plain SQL
//! identifier.

use std::sync::OnceLock;

use heck::ToSnakeCase;
use regex::Regex;

/// Column name every record type uses as primary key unless one is flagged.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid pattern"))
}

/// Table name inferred from a type name: `User` -> `users`,
/// `TransactionItem` -> `transaction_items`.
pub fn table_name(type_name: &str) -> String {
    let snake = type_name.to_snake_case();
    match snake.rsplit_once('_') {
        Some((head, last)) => format!("{head}_{}", pluralize(last)),
        None => pluralize(&snake),
    }
}

/// Foreign-key column pointing at rows of `type_name`: `User` -> `user_id`.
pub fn foreign_key(type_name: &str) -> String {
    format!("{}_{DEFAULT_PRIMARY_KEY}", type_name.to_snake_case())
}

/// Whether `name` is usable as a table or column name.
pub fn is_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

fn pluralize(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}
