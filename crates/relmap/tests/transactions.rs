mod common;

use std::panic::{self, AssertUnwindSafe};

use common::{Call, MockAdapter, User, repository};
use relmap::prelude::*;

fn insert_ann(adapter: &MockAdapter) -> Changeset {
    let changes = Changeset::builder().set("name", "Ann").build();
    adapter.expect_insert(Query::table("users"), changes.clone(), 1);
    changes
}

#[test]
fn transaction_commits_on_ok() {
    let adapter = MockAdapter::new();
    adapter.expect_begin();
    let changes = insert_ann(&adapter);
    adapter.expect_commit();

    let repo = repository(&adapter);
    let mut user = User::default();
    let id = repo
        .transaction(|tx| {
            assert!(tx.in_transaction());
            tx.insert(&mut user, changes)?;
            Ok(user.id)
        })
        .unwrap();

    assert_eq!(id, 1);
    assert!(!repo.in_transaction());
    let calls = adapter.calls();
    assert_eq!(calls.first(), Some(&Call::Begin));
    assert_eq!(calls.last(), Some(&Call::Commit));
    adapter.assert_done();
}

#[test]
fn begin_failure_skips_the_closure() {
    let adapter = MockAdapter::new();
    adapter.fail(Call::Begin, Error::unexpected("no connection"));

    let mut ran = false;
    let err = repository(&adapter)
        .transaction(|_| {
            ran = true;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err, Error::unexpected("no connection"));
    assert!(!ran);
}

#[test]
fn commit_failure_is_the_result() {
    let adapter = MockAdapter::new();
    adapter
        .expect_begin()
        .fail(Call::Commit, Error::not_unique("email"));

    let err = repository(&adapter)
        .transaction(|_| Ok(()))
        .unwrap_err();
    assert_eq!(err, Error::not_unique("email"));
    adapter.assert_done();
}

#[test]
fn err_rolls_back_exactly_once() {
    let adapter = MockAdapter::new();
    adapter.expect_begin().expect_rollback();

    let err = repository(&adapter)
        .transaction(|_| -> Result<()> { Err(Error::not_unique("email")) })
        .unwrap_err();

    assert_eq!(err, Error::not_unique("email"));
    assert_eq!(adapter.calls(), vec![Call::Begin, Call::Rollback]);
}

#[test]
fn write_failure_inside_transaction_rolls_back() {
    let adapter = MockAdapter::new();
    let changes = Changeset::builder().set("name", "Ann").build();
    adapter
        .expect_begin()
        .fail(
            Call::Insert(Query::table("users"), changes.clone()),
            Error::not_unique("name"),
        )
        .expect_rollback();

    let mut user = User::default();
    let err = repository(&adapter)
        .transaction(|tx| tx.insert(&mut user, changes))
        .unwrap_err();

    assert_eq!(err, Error::not_unique("name"));
    adapter.assert_done();
}

#[test]
fn expected_error_panic_becomes_err() {
    let adapter = MockAdapter::new();
    adapter
        .expect_begin()
        .expect_all(Query::table("users").limit(1), vec![])
        .expect_rollback();

    let result = repository(&adapter).transaction(|tx| {
        let user: User = tx.must_find(&Query::new());
        Ok(user)
    });

    assert_eq!(result.unwrap_err(), Error::not_found());
    adapter.assert_done();
}

#[test]
fn unexpected_error_panic_is_re_raised() {
    let adapter = MockAdapter::new();
    adapter
        .expect_begin()
        .fail(
            Call::Delete(Query::table("users")),
            Error::unexpected("connection reset"),
        )
        .expect_rollback();

    let repo = repository(&adapter);
    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        repo.transaction(|tx| {
            tx.must_delete_all(&Query::table("users"));
            Ok(())
        })
    }))
    .unwrap_err();

    assert_eq!(
        *payload.downcast::<Error>().unwrap(),
        Error::unexpected("connection reset")
    );
    adapter.assert_done();
}

#[test]
fn foreign_panic_is_re_raised_after_rollback() {
    let adapter = MockAdapter::new();
    adapter.expect_begin().expect_rollback();

    let repo = repository(&adapter);
    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        repo.transaction(|_| -> Result<()> { panic!("boom") })
    }))
    .unwrap_err();

    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    assert_eq!(adapter.calls(), vec![Call::Begin, Call::Rollback]);
}

#[test]
fn rollback_failure_keeps_the_original_error() {
    let adapter = MockAdapter::new();
    adapter
        .expect_begin()
        .fail(Call::Rollback, Error::unexpected("rollback failed"));

    let err = repository(&adapter)
        .transaction(|_| -> Result<()> { Err(Error::not_found()) })
        .unwrap_err();
    assert_eq!(err, Error::not_found());
}

#[test]
fn nested_transaction_reuses_the_outer_scope() {
    let adapter = MockAdapter::new();
    adapter.expect_begin();
    let changes = insert_ann(&adapter);
    adapter.expect_commit();

    let mut user = User::default();
    repository(&adapter)
        .transaction(|outer| outer.transaction(|inner| inner.insert(&mut user, changes)))
        .unwrap();

    assert_eq!(user.id, 1);
    adapter.assert_done();
}

#[test]
fn nested_error_rolls_back_once_at_the_outer_scope() {
    let adapter = MockAdapter::new();
    adapter.expect_begin().expect_rollback();

    let err = repository(&adapter)
        .transaction(|outer| -> Result<()> {
            outer.transaction(|_| -> Result<()> { Err(Error::schema("bad")) })?;
            unreachable!("the inner error propagates")
        })
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(adapter.calls(), vec![Call::Begin, Call::Rollback]);
}
