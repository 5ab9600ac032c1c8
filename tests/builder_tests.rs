//! Terminal builder operations against the stub driver: execution order,
//! hydration, error propagation and the compile-before-dispatch guarantee

mod common;

use colonnade::testing::{StubDriver, row};
use colonnade::{DatabaseError, MemoryCache, Operator, QueryValue};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn get_hydrates_rows_in_backend_order() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"FROM \"users\"",
		vec![
			row(&[
				("id", QueryValue::Int(2)),
				("email", QueryValue::String("b@x.com".into())),
			]),
			row(&[
				("id", QueryValue::Int(1)),
				("email", QueryValue::String("a@x.com".into())),
			]),
		],
	);
	let db = common::wide_column_db(driver);

	let users = db.query("user").unwrap().get().await.unwrap();

	assert_eq!(users.len(), 2);
	// No implicit re-sort: rows come back exactly as the backend returned them
	assert_eq!(users[0].get("id"), Some(&QueryValue::Int(2)));
	assert_eq!(users[1].get("id"), Some(&QueryValue::Int(1)));
	assert!(users.iter().all(|u| u.exists() && !u.is_dirty(None)));
}

#[tokio::test]
async fn empty_result_is_not_an_error() {
	let driver = Arc::new(StubDriver::new());
	let db = common::wide_column_db(driver);

	let users = db
		.query("user")
		.unwrap()
		.filter("email", Operator::Eq, "missing@x.com")
		.get()
		.await
		.unwrap();
	assert!(users.is_empty());

	let first = db.query("user").unwrap().first().await.unwrap();
	assert!(first.is_none());
}

#[tokio::test]
async fn find_or_fail_distinguishes_absence_from_emptiness() {
	let driver = Arc::new(StubDriver::new());
	let db = common::wide_column_db(driver);

	let err = db
		.query("user")
		.unwrap()
		.find_or_fail(QueryValue::String("missing-id".into()))
		.await
		.unwrap_err();
	assert!(matches!(err, DatabaseError::NotFound { .. }));

	let found = db
		.query("user")
		.unwrap()
		.find(QueryValue::Int(99))
		.await
		.unwrap();
	assert!(found.is_none());
}

#[tokio::test]
async fn compile_errors_surface_before_any_driver_call() {
	let driver = Arc::new(StubDriver::new());
	let db = common::wide_column_db(Arc::clone(&driver));

	// `name` is neither a key nor indexed on users
	let err = db
		.query("user")
		.unwrap()
		.filter("name", Operator::Eq, "alice")
		.get()
		.await
		.unwrap_err();

	assert!(matches!(err, DatabaseError::Compile(_)));
	assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn allow_filtering_unlocks_non_key_predicates() {
	let driver = Arc::new(StubDriver::new());
	let db = common::wide_column_db(Arc::clone(&driver));

	db.query("user")
		.unwrap()
		.filter("name", Operator::Eq, "alice")
		.allow_filtering()
		.get()
		.await
		.unwrap();

	let (text, _) = driver.calls().pop().unwrap();
	assert!(text.ends_with("ALLOW FILTERING"));
}

#[tokio::test]
async fn count_reads_the_backend_report() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"SELECT COUNT(*) FROM \"users\"",
		vec![row(&[("count", QueryValue::Int(5))])],
	);
	let db = common::wide_column_db(driver);

	let count = db.query("user").unwrap().count().await.unwrap();
	assert_eq!(count, 5);
}

#[tokio::test]
async fn exists_probes_a_single_keyed_row() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"SELECT \"id\" FROM \"users\"",
		vec![row(&[("id", QueryValue::Int(1))])],
	);
	let db = common::wide_column_db(Arc::clone(&driver));

	assert!(db.query("user").unwrap().exists().await.unwrap());

	let (text, _) = driver.calls().pop().unwrap();
	assert!(text.contains("LIMIT 1"));
}

#[tokio::test]
async fn pluck_collects_one_column() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"SELECT \"email\" FROM \"users\"",
		vec![
			row(&[("email", QueryValue::String("a@x.com".into()))]),
			row(&[("email", QueryValue::String("b@x.com".into()))]),
		],
	);
	let db = common::wide_column_db(driver);

	let emails = db.query("user").unwrap().pluck("email").await.unwrap();
	assert_eq!(
		emails,
		vec![
			QueryValue::String("a@x.com".into()),
			QueryValue::String("b@x.com".into()),
		]
	);
}

#[tokio::test]
async fn builder_update_and_delete_use_accumulated_predicates() {
	let driver = Arc::new(StubDriver::new());
	driver.on_affected("UPDATE \"users\"", 1);
	driver.on_affected("DELETE FROM \"users\"", 1);
	let db = common::wide_column_db(Arc::clone(&driver));

	let affected = db
		.query("user")
		.unwrap()
		.filter("id", Operator::Eq, 1i64)
		.update(&[("name", QueryValue::String("bob".into()))])
		.await
		.unwrap();
	assert_eq!(affected, 1);

	let deleted = db
		.query("user")
		.unwrap()
		.filter("id", Operator::Eq, 1i64)
		.delete()
		.await
		.unwrap();
	assert_eq!(deleted, 1);

	let calls = driver.calls();
	assert_eq!(
		calls[0].0,
		"UPDATE \"users\" SET \"name\" = ? WHERE \"id\" = ?"
	);
	assert_eq!(
		calls[0].1,
		vec![QueryValue::String("bob".into()), QueryValue::Int(1)]
	);
	assert_eq!(calls[1].0, "DELETE FROM \"users\" WHERE \"id\" = ?");
}

#[tokio::test]
async fn builder_insert_compiles_one_statement() {
	let driver = Arc::new(StubDriver::new());
	let db = common::wide_column_db(Arc::clone(&driver));

	db.query("user")
		.unwrap()
		.insert(&[
			("id", QueryValue::Int(7)),
			("email", QueryValue::String("c@x.com".into())),
		])
		.await
		.unwrap();

	let (text, bindings) = driver.calls().pop().unwrap();
	assert_eq!(
		text,
		"INSERT INTO \"users\" (\"id\", \"email\") VALUES (?, ?)"
	);
	assert_eq!(bindings.len(), 2);
}

#[tokio::test]
async fn remember_serves_identical_queries_from_cache() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"FROM \"users\"",
		vec![row(&[("id", QueryValue::Int(1))])],
	);
	let db =
		common::wide_column_db(Arc::clone(&driver)).with_cache(Arc::new(MemoryCache::default()));

	let run = |db: colonnade::Database| async move {
		db.query("user")
			.unwrap()
			.filter("id", Operator::Eq, 1i64)
			.remember(Duration::from_secs(60))
			.get()
			.await
			.unwrap()
	};

	let first = run(db.clone()).await;
	let second = run(db.clone()).await;

	assert_eq!(first.len(), 1);
	assert_eq!(second.len(), 1);
	// Same builder calls, same fingerprint: the driver saw exactly one fetch
	assert_eq!(driver.call_count("FROM \"users\""), 1);

	// A different binding is a different fingerprint
	db.query("user")
		.unwrap()
		.filter("id", Operator::Eq, 2i64)
		.remember(Duration::from_secs(60))
		.get()
		.await
		.unwrap();
	assert_eq!(driver.call_count("FROM \"users\""), 2);
}

#[tokio::test]
async fn driver_errors_propagate_verbatim() {
	let driver = Arc::new(StubDriver::new());
	driver.fail("FROM \"users\"", "connection reset by peer");
	let db = common::wide_column_db(driver);

	let err = db.query("user").unwrap().get().await.unwrap_err();
	match err {
		DatabaseError::Driver(message) => assert_eq!(message, "connection reset by peer"),
		other => panic!("expected a driver error, got {other:?}"),
	}
}

#[tokio::test]
async fn unknown_entity_is_rejected_at_query_start() {
	let driver = Arc::new(StubDriver::new());
	let db = common::wide_column_db(driver);

	assert!(matches!(
		db.query("ghost"),
		Err(DatabaseError::UnknownEntity(_))
	));
}

#[tokio::test]
async fn to_statement_compiles_without_executing() {
	let driver = Arc::new(StubDriver::new());
	let db = common::wide_column_db(Arc::clone(&driver));

	let statement = db
		.query("user")
		.unwrap()
		.select(["id", "email"])
		.filter("id", Operator::Eq, 1i64)
		.limit(5)
		.to_statement()
		.unwrap();

	assert_eq!(
		statement.text,
		"SELECT \"id\", \"email\" FROM \"users\" WHERE \"id\" = ? LIMIT 5"
	);
	assert!(driver.calls().is_empty());
}
