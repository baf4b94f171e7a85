//! Shared records and a scripted adapter for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use relmap::prelude::*;

// ============================================================================
// Records
// ============================================================================

#[derive(Record, Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i32,
    #[record(association)]
    pub address: Option<Address>,
    #[record(association)]
    pub transactions: Option<Vec<Transaction>>,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub id: i64,
    pub user_id: Option<i64>,
    pub street: String,
}

#[derive(Record, Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub item: String,
    #[record(belongs_to, foreign_key = "user_id")]
    pub buyer: Option<Box<User>>,
}

pub fn user(id: i64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        ..User::default()
    }
}

pub fn transaction(id: i64, user_id: i64, item: &str) -> Transaction {
    Transaction {
        id,
        user_id,
        item: item.to_string(),
        ..Transaction::default()
    }
}

pub fn user_row(id: i64, name: &str, age: i32) -> Row {
    Row::new().with("id", id).with("name", name).with("age", age)
}

pub fn transaction_row(id: i64, user_id: i64, item: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("user_id", user_id)
        .with("item", item)
}

/// Repository that applies changes locally instead of re-reading rows.
pub fn repository(adapter: &MockAdapter) -> Repository {
    Repository::with_config(
        Arc::new(adapter.clone()),
        RepositoryConfig {
            reload_after_write: false,
        },
    )
}

/// Repository with the default configuration (re-read after writes).
pub fn reloading_repository(adapter: &MockAdapter) -> Repository {
    Repository::new(Arc::new(adapter.clone()))
}

// ============================================================================
// MockAdapter
// ============================================================================

/// One adapter call, with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    All(Query),
    Aggregate(Query, AggregateMode, String),
    Insert(Query, Changeset),
    InsertAll(Query, Vec<Changeset>),
    Update(Query, Changeset),
    Delete(Query),
    Begin,
    Commit,
    Rollback,
}

/// What a scripted call answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(Vec<Row>),
    Value(Value),
    Ids(Vec<Value>),
    Unit,
}

#[derive(Debug, Default)]
struct State {
    expected: VecDeque<(Call, Result<Reply>)>,
    calls: Vec<Call>,
}

/// Adapter that checks every call against an expectation queue.
///
/// Clones (including the adapter returned by `begin`) share the queue, so a
/// whole transaction is scripted in one place.
#[derive(Debug, Clone, Default)]
pub struct MockAdapter {
    state: Arc<Mutex<State>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next call and its answer.
    pub fn expect(&self, call: Call, reply: Result<Reply>) -> &Self {
        self.lock().expected.push_back((call, reply));
        self
    }

    pub fn expect_all(&self, query: Query, rows: Vec<Row>) -> &Self {
        self.expect(Call::All(query), Ok(Reply::Rows(rows)))
    }

    pub fn expect_aggregate(
        &self,
        query: Query,
        mode: AggregateMode,
        field: &str,
        value: Value,
    ) -> &Self {
        self.expect(
            Call::Aggregate(query, mode, field.to_string()),
            Ok(Reply::Value(value)),
        )
    }

    pub fn expect_insert(&self, query: Query, changes: Changeset, id: i64) -> &Self {
        self.expect(Call::Insert(query, changes), Ok(Reply::Value(Value::BigInt(id))))
    }

    pub fn expect_insert_all(&self, query: Query, changes: Vec<Changeset>, ids: &[i64]) -> &Self {
        let ids = ids.iter().map(|&id| Value::BigInt(id)).collect();
        self.expect(Call::InsertAll(query, changes), Ok(Reply::Ids(ids)))
    }

    pub fn expect_update(&self, query: Query, changes: Changeset) -> &Self {
        self.expect(Call::Update(query, changes), Ok(Reply::Unit))
    }

    pub fn expect_delete(&self, query: Query) -> &Self {
        self.expect(Call::Delete(query), Ok(Reply::Unit))
    }

    pub fn expect_begin(&self) -> &Self {
        self.expect(Call::Begin, Ok(Reply::Unit))
    }

    pub fn expect_commit(&self) -> &Self {
        self.expect(Call::Commit, Ok(Reply::Unit))
    }

    pub fn expect_rollback(&self) -> &Self {
        self.expect(Call::Rollback, Ok(Reply::Unit))
    }

    /// Script `call` to fail with `err`.
    pub fn fail(&self, call: Call, err: Error) -> &Self {
        self.expect(call, Err(err))
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Assert that every scripted call happened.
    pub fn assert_done(&self) {
        let state = self.lock();
        assert!(
            state.expected.is_empty(),
            "scripted calls never happened: {:?}",
            state.expected
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&self, call: Call) -> Result<Reply> {
        let scripted = {
            let mut state = self.lock();
            state.calls.push(call.clone());
            state.expected.pop_front()
        };
        let Some((expected, reply)) = scripted else {
            panic!("unscripted adapter call: {call:?}");
        };
        assert_eq!(call, expected, "adapter call does not match the script");
        reply
    }
}

impl Adapter for MockAdapter {
    fn all(&self, query: &Query) -> Result<Vec<Row>> {
        match self.next(Call::All(query.clone()))? {
            Reply::Rows(rows) => Ok(rows),
            other => panic!("`all` scripted with {other:?}"),
        }
    }

    fn aggregate(&self, query: &Query, mode: AggregateMode, field: &str) -> Result<Value> {
        match self.next(Call::Aggregate(query.clone(), mode, field.to_string()))? {
            Reply::Value(value) => Ok(value),
            other => panic!("`aggregate` scripted with {other:?}"),
        }
    }

    fn insert(&self, query: &Query, changes: &Changeset) -> Result<Value> {
        match self.next(Call::Insert(query.clone(), changes.clone()))? {
            Reply::Value(id) => Ok(id),
            other => panic!("`insert` scripted with {other:?}"),
        }
    }

    fn insert_all(&self, query: &Query, changes: &[Changeset]) -> Result<Vec<Value>> {
        match self.next(Call::InsertAll(query.clone(), changes.to_vec()))? {
            Reply::Ids(ids) => Ok(ids),
            other => panic!("`insert_all` scripted with {other:?}"),
        }
    }

    fn update(&self, query: &Query, changes: &Changeset) -> Result<()> {
        self.next(Call::Update(query.clone(), changes.clone()))
            .map(|_| ())
    }

    fn delete(&self, query: &Query) -> Result<()> {
        self.next(Call::Delete(query.clone())).map(|_| ())
    }

    fn begin(&self) -> Result<Arc<dyn Adapter>> {
        self.next(Call::Begin)?;
        Ok(Arc::new(self.clone()))
    }

    fn commit(&self) -> Result<()> {
        self.next(Call::Commit).map(|_| ())
    }

    fn rollback(&self) -> Result<()> {
        self.next(Call::Rollback).map(|_| ())
    }
}
