//! Pending mutations of one record and its associations.
//!
//! A [`Changeset`] is an ordered column → [`Change`] mapping plus an ordered
//! association name → [`AssociationChanges`] mapping. Changesets are built
//! with [`ChangesetBuilder`], snapshotted from a record, or decoded from a
//! JSON object; afterwards only the orchestrator stamps keys into them.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::record::{AssociationRef, Record};
use crate::schema::Schema;
use crate::value::Value;

/// One column operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Assign a value.
    Set(Value),
    /// Add to the current value (negative to decrement).
    Increment(i64),
    /// Raw expression passed through to the adapter.
    Fragment(String),
}

/// Changes for one association.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssociationChanges {
    /// One changeset per associated record.
    pub changes: Vec<Changeset>,
    /// Replace the current collection instead of appending to it.
    pub cleared: bool,
}

/// Ordered column and association changes for one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    columns: Vec<(String, Change)>,
    associations: Vec<(String, AssociationChanges)>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ChangesetBuilder {
        ChangesetBuilder::default()
    }

    /// No column and no association changes.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.associations.is_empty()
    }

    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn has_associations(&self) -> bool {
        !self.associations.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.columns.iter().map(|(c, change)| (c.as_str(), change))
    }

    pub fn get(&self, column: &str) -> Option<&Change> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, change)| change)
    }

    /// The value assigned to `column`, if it is a plain `Set`.
    pub fn value(&self, column: &str) -> Option<&Value> {
        match self.get(column) {
            Some(Change::Set(value)) => Some(value),
            _ => None,
        }
    }

    pub fn associations(&self) -> impl Iterator<Item = (&str, &AssociationChanges)> {
        self.associations.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn association(&self, name: &str) -> Option<&AssociationChanges> {
        self.associations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    /// Assign `column`, keeping its position when already present.
    pub fn put(&mut self, column: &str, value: Value) {
        self.upsert_column(column.to_string(), Change::Set(value));
    }

    fn upsert_column(&mut self, column: String, change: Change) {
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = change,
            None => self.columns.push((column, change)),
        }
    }

    fn upsert_association(&mut self, name: String, changes: AssociationChanges) {
        match self.associations.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = changes,
            None => self.associations.push((name, changes)),
        }
    }

    /// Move the association entries out, leaving only column changes.
    pub fn split_associations(&mut self) -> Vec<(String, AssociationChanges)> {
        std::mem::take(&mut self.associations)
    }

    /// Snapshot a record: every column except a blank primary key, plus the
    /// loaded associations (has-many ones as a full replacement).
    pub fn from_record(record: &dyn Record) -> Result<Changeset> {
        let schema = Schema::for_record(record)?;
        let mut changeset = Changeset::new();
        for column in &schema.columns {
            let Some(value) = record.get(column.name) else {
                continue;
            };
            if column.name == schema.primary_key.name && value.is_blank() {
                continue;
            }
            changeset.put(column.name, value);
        }

        for assoc in &schema.associations {
            let changes = match record.association(assoc.name) {
                Some(AssociationRef::One(slot)) => match slot.get() {
                    Some(child) => AssociationChanges {
                        changes: vec![Changeset::from_record(child)?],
                        cleared: false,
                    },
                    None => continue,
                },
                Some(AssociationRef::Many(seq)) if seq.is_loaded() => {
                    let mut changes = Vec::with_capacity(seq.len());
                    for index in 0..seq.len() {
                        if let Some(child) = seq.get(index) {
                            changes.push(Changeset::from_record(child)?);
                        }
                    }
                    AssociationChanges {
                        changes,
                        cleared: true,
                    }
                }
                _ => continue,
            };
            changeset.upsert_association(assoc.name.to_string(), changes);
        }
        Ok(changeset)
    }

    /// Decode a JSON object.
    ///
    /// Scalars become `Set` changes, nested objects single-association
    /// changes and non-empty arrays of objects replaced has-many changes.
    /// Other arrays, including `[]`, are kept as JSON values.
    pub fn from_json(json: &serde_json::Value) -> Result<Changeset> {
        let serde_json::Value::Object(object) = json else {
            return Err(Error::schema("a JSON changeset must be an object"));
        };

        let mut changeset = Changeset::new();
        for (key, value) in object {
            match value {
                serde_json::Value::Object(_) => {
                    changeset.upsert_association(
                        key.clone(),
                        AssociationChanges {
                            changes: vec![Changeset::from_json(value)?],
                            cleared: false,
                        },
                    );
                }
                serde_json::Value::Array(items)
                    if !items.is_empty() && items.iter().all(serde_json::Value::is_object) =>
                {
                    let changes = items
                        .iter()
                        .map(Changeset::from_json)
                        .collect::<Result<Vec<_>>>()?;
                    changeset.upsert_association(
                        key.clone(),
                        AssociationChanges {
                            changes,
                            cleared: true,
                        },
                    );
                }
                other => changeset.put(key, json_scalar(other)),
            }
        }
        Ok(changeset)
    }

    /// Write the column changes into `doc` without touching the adapter.
    ///
    /// `Set` assigns, `Increment` adds to the current integer value and
    /// fragments are skipped since only the store can evaluate them.
    pub fn apply_to(&self, doc: &mut Document<'_>) -> Result<()> {
        for (column, change) in &self.columns {
            match change {
                Change::Set(value) => doc.set(column, value.clone())?,
                Change::Increment(by) => {
                    let current = doc.get(column).and_then(|v| v.as_i64()).unwrap_or(0);
                    let next = current.checked_add(*by).ok_or_else(|| {
                        Error::unexpected(format!("increment of `{column}` overflows"))
                    })?;
                    doc.set(column, Value::BigInt(next))?;
                }
                Change::Fragment(_) => {}
            }
        }
        Ok(())
    }
}

fn json_scalar(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::BigInt(i),
            None => n.as_f64().map_or(Value::Null, Value::Double),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Json(other.clone()),
    }
}

/// Builder for [`Changeset`].
///
/// Setting the same column twice keeps its first position and the last
/// value.
#[derive(Debug, Default)]
#[must_use]
pub struct ChangesetBuilder {
    changeset: Changeset,
}

impl ChangesetBuilder {
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.changeset
            .upsert_column(column.into(), Change::Set(value.into()));
        self
    }

    pub fn increment(mut self, column: impl Into<String>, by: i64) -> Self {
        self.changeset
            .upsert_column(column.into(), Change::Increment(by));
        self
    }

    pub fn decrement(self, column: impl Into<String>, by: i64) -> Self {
        self.increment(column, -by)
    }

    /// Assign `column` from a raw expression, e.g. `"score * 2"`.
    pub fn fragment(mut self, column: impl Into<String>, raw: impl Into<String>) -> Self {
        self.changeset
            .upsert_column(column.into(), Change::Fragment(raw.into()));
        self
    }

    /// Changes for a belongs-to or has-one association.
    pub fn association(mut self, name: impl Into<String>, changes: Changeset) -> Self {
        self.changeset.upsert_association(
            name.into(),
            AssociationChanges {
                changes: vec![changes],
                cleared: false,
            },
        );
        self
    }

    /// Replace a has-many association with `changes`.
    pub fn replace_many(mut self, name: impl Into<String>, changes: Vec<Changeset>) -> Self {
        self.changeset.upsert_association(
            name.into(),
            AssociationChanges {
                changes,
                cleared: true,
            },
        );
        self
    }

    /// Append `changes` to a has-many association.
    pub fn append_many(mut self, name: impl Into<String>, changes: Vec<Changeset>) -> Self {
        self.changeset.upsert_association(
            name.into(),
            AssociationChanges {
                changes,
                cleared: false,
            },
        );
        self
    }

    pub fn build(self) -> Changeset {
        self.changeset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Address, Transaction, User};
    use serde_json::json;

    #[test]
    fn test_builder_last_value_wins_first_position_kept() {
        let changes = Changeset::builder()
            .set("name", "a")
            .increment("age", 1)
            .set("name", "b")
            .build();

        let columns: Vec<_> = changes.columns().collect();
        assert_eq!(
            columns,
            vec![
                ("name", &Change::Set(Value::from("b"))),
                ("age", &Change::Increment(1)),
            ]
        );
        assert_eq!(changes.value("name"), Some(&Value::from("b")));
        assert_eq!(changes.value("age"), None);
    }

    #[test]
    fn test_associations_and_split() {
        let mut changes = Changeset::builder()
            .set("name", "Ann")
            .association("address", Changeset::builder().set("street", "Main").build())
            .replace_many("transactions", vec![Changeset::new(), Changeset::new()])
            .build();

        assert!(changes.association("address").is_some_and(|a| !a.cleared));
        assert!(changes.association("transactions").is_some_and(|a| a.cleared));

        let associations = changes.split_associations();
        assert_eq!(associations.len(), 2);
        assert!(!changes.has_associations());
        assert!(changes.has_columns());
    }

    #[test]
    fn test_empty_changeset() {
        assert!(Changeset::new().is_empty());
        assert!(!Changeset::builder().set("a", 1).build().is_empty());
        assert!(
            !Changeset::builder()
                .append_many("transactions", vec![])
                .build()
                .is_empty()
        );
    }

    #[test]
    fn test_from_json() {
        let changes = Changeset::from_json(&json!({
            "name": "Ann",
            "age": 30,
            "tags": ["a", "b"],
            "address": {"street": "Main"},
            "transactions": [{"item": "pen"}, {"item": "ink"}]
        }))
        .unwrap();

        assert_eq!(changes.value("name"), Some(&Value::from("Ann")));
        assert_eq!(changes.value("age"), Some(&Value::BigInt(30)));
        assert_eq!(changes.value("tags"), Some(&Value::Json(json!(["a", "b"]))));
        let address = changes.association("address").unwrap();
        assert_eq!(address.changes[0].value("street"), Some(&Value::from("Main")));
        let transactions = changes.association("transactions").unwrap();
        assert!(transactions.cleared);
        assert_eq!(transactions.changes.len(), 2);

        assert!(Changeset::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_from_json_empty_array_is_a_column() {
        let changes = Changeset::from_json(&json!({"name": "Ann", "tags": []})).unwrap();
        assert_eq!(changes.value("tags"), Some(&Value::Json(json!([]))));
        assert!(changes.association("tags").is_none());
    }

    #[test]
    fn test_from_record_snapshot() {
        let user = User {
            id: 0,
            name: "Ann".to_string(),
            age: 0,
            address: Some(Address {
                street: "Main".to_string(),
                ..Address::default()
            }),
            transactions: Some(vec![Transaction {
                item: "pen".to_string(),
                ..Transaction::default()
            }]),
        };
        let changes = Changeset::from_record(&user).unwrap();

        assert_eq!(changes.get("id"), None);
        assert_eq!(changes.value("name"), Some(&Value::from("Ann")));
        assert_eq!(changes.value("age"), Some(&Value::Int(0)));
        assert_eq!(
            changes.association("address").unwrap().changes[0].value("street"),
            Some(&Value::from("Main"))
        );
        let transactions = changes.association("transactions").unwrap();
        assert!(transactions.cleared);
        assert_eq!(transactions.changes[0].value("item"), Some(&Value::from("pen")));
    }

    #[test]
    fn test_apply_to_document() {
        let mut user = User {
            age: 40,
            ..User::default()
        };
        let changes = Changeset::builder()
            .set("name", "Ann")
            .increment("age", 2)
            .fragment("age", "age + 1")
            .build();
        // The fragment replaced the increment in place.
        assert_eq!(changes.get("age"), Some(&Change::Fragment("age + 1".into())));

        let mut doc = Document::new(&mut user).unwrap();
        Changeset::builder()
            .set("name", "Ann")
            .increment("age", 2)
            .build()
            .apply_to(&mut doc)
            .unwrap();
        changes.apply_to(&mut doc).unwrap();
        assert_eq!(user.name, "Ann");
        assert_eq!(user.age, 42);
    }

    #[test]
    fn test_apply_to_increment_overflow_is_an_error() {
        let mut user = User {
            id: i64::MAX,
            ..User::default()
        };
        let mut doc = Document::new(&mut user).unwrap();
        let err = Changeset::builder()
            .increment("id", 1)
            .build()
            .apply_to(&mut doc)
            .unwrap_err();
        assert!(err.to_string().contains("increment of `id` overflows"));
        assert_eq!(user.id, i64::MAX);
    }
}
