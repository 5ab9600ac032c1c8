//! Eager loading: batched fetch shapes, prefix sharing, the duplicate-fetch
//! guard, deterministic merging and per-path failure isolation

mod common;

use colonnade::testing::{StubDriver, row};
use colonnade::{DatabaseError, QueryValue};
use std::sync::Arc;

fn int_row(pairs: &[(&str, i64)]) -> colonnade::Row {
	row(&pairs
		.iter()
		.map(|(column, value)| (*column, QueryValue::Int(*value)))
		.collect::<Vec<_>>())
}

#[tokio::test]
async fn related_rows_are_distributed_to_matching_owners() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"FROM \"owners\"",
		vec![int_row(&[("id", 1)]), int_row(&[("id", 2)])],
	);
	driver.on(
		"FROM \"items\"",
		vec![
			int_row(&[("id", 10), ("owner_id", 1)]),
			int_row(&[("id", 11), ("owner_id", 1)]),
			int_row(&[("id", 12), ("owner_id", 2)]),
		],
	);
	let db = common::wide_column_db(Arc::clone(&driver));

	let owners = db.query("owner").unwrap().with("items").get().await.unwrap();

	let first = owners[0].related_many("items");
	assert_eq!(first.len(), 2);
	assert_eq!(first[0].get("id"), Some(&QueryValue::Int(10)));
	assert_eq!(first[1].get("id"), Some(&QueryValue::Int(11)));

	let second = owners[1].related_many("items");
	assert_eq!(second.len(), 1);
	assert_eq!(second[0].get("id"), Some(&QueryValue::Int(12)));

	// One batched fetch for both owners, never one query per owner
	assert_eq!(driver.call_count("FROM \"items\""), 1);
	let items_call = driver
		.calls()
		.into_iter()
		.find(|(text, _)| text.contains("FROM \"items\""))
		.unwrap();
	assert!(items_call.0.contains("\"owner_id\" IN (?, ?)"));
	assert_eq!(items_call.1, vec![QueryValue::Int(1), QueryValue::Int(2)]);
}

#[tokio::test]
async fn owners_without_matches_get_an_explicit_empty_slot() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"FROM \"owners\"",
		vec![int_row(&[("id", 1)]), int_row(&[("id", 2)])],
	);
	driver.on(
		"FROM \"items\"",
		vec![int_row(&[("id", 10), ("owner_id", 1)])],
	);
	let db = common::wide_column_db(driver);

	let owners = db.query("owner").unwrap().with("items").get().await.unwrap();

	assert_eq!(owners[0].related_many("items").len(), 1);
	assert!(owners[1].relation_loaded("items"));
	assert!(owners[1].related_many("items").is_empty());
}

#[tokio::test]
async fn nested_paths_batch_one_query_per_depth() {
	let driver = Arc::new(StubDriver::new());
	driver.on("FROM \"users\"", vec![int_row(&[("id", 1)])]);
	driver.on(
		"FROM \"posts\"",
		vec![
			int_row(&[("id", 10), ("user_id", 1)]),
			int_row(&[("id", 11), ("user_id", 1)]),
		],
	);
	driver.on(
		"FROM \"comments\"",
		vec![
			int_row(&[("id", 100), ("post_id", 10)]),
			int_row(&[("id", 101), ("post_id", 11)]),
			int_row(&[("id", 102), ("post_id", 11)]),
		],
	);
	let db = common::wide_column_db(Arc::clone(&driver));

	let users = db
		.query("user")
		.unwrap()
		.with("posts.comments")
		.get()
		.await
		.unwrap();

	let posts = users[0].related_many("posts");
	assert_eq!(posts.len(), 2);
	assert_eq!(posts[0].related_many("comments").len(), 1);
	assert_eq!(posts[1].related_many("comments").len(), 2);

	// Depth-wise batching: one posts fetch, one comments fetch
	assert_eq!(driver.call_count("FROM \"posts\""), 1);
	assert_eq!(driver.call_count("FROM \"comments\""), 1);
	let comments_call = driver
		.calls()
		.into_iter()
		.find(|(text, _)| text.contains("FROM \"comments\""))
		.unwrap();
	assert!(comments_call.0.contains("\"post_id\" IN (?, ?)"));
}

#[tokio::test]
async fn shared_prefixes_are_fetched_once() {
	let driver = Arc::new(StubDriver::new());
	driver.on("FROM \"users\"", vec![int_row(&[("id", 1)])]);
	driver.on(
		"FROM \"posts\"",
		vec![int_row(&[("id", 10), ("user_id", 1)])],
	);
	driver.on(
		"FROM \"comments\"",
		vec![int_row(&[("id", 100), ("post_id", 10)])],
	);
	let db = common::wide_column_db(Arc::clone(&driver));

	let users = db
		.query("user")
		.unwrap()
		.with("posts")
		.with("posts.comments")
		.get()
		.await
		.unwrap();

	assert_eq!(driver.call_count("FROM \"posts\""), 1);
	assert_eq!(
		users[0].related_many("posts")[0]
			.related_many("comments")
			.len(),
		1
	);
}

#[tokio::test]
async fn duplicate_fetch_guard_spans_overlapping_paths() {
	let driver = Arc::new(StubDriver::new());
	driver.on("FROM \"users\"", vec![int_row(&[("id", 1)])]);
	driver.on(
		"FROM \"posts\"",
		vec![int_row(&[("id", 10), ("user_id", 1)])],
	);
	driver.on(
		"FROM \"profiles\"",
		vec![int_row(&[("id", 50), ("user_id", 1)])],
	);
	let db = common::wide_column_db(Arc::clone(&driver));

	// "posts.user.profile" leads back to the root user; its profile was
	// already fetched by the sibling "profile" path
	let users = db
		.query("user")
		.unwrap()
		.with("profile")
		.with("posts.user.profile")
		.get()
		.await
		.unwrap();

	assert_eq!(driver.call_count("FROM \"profiles\""), 1);
	assert!(users[0].related_one("profile").is_some());
	let inner_user = users[0].related_many("posts")[0]
		.related_one("user")
		.expect("post links back to its author");
	assert!(inner_user.related_one("profile").is_some());
}

#[tokio::test]
async fn failed_paths_do_not_discard_resolved_siblings() {
	let driver = Arc::new(StubDriver::new());
	driver.on("FROM \"users\"", vec![int_row(&[("id", 1)])]);
	driver.on(
		"FROM \"posts\"",
		vec![int_row(&[("id", 10), ("user_id", 1)])],
	);
	driver.fail("FROM \"profiles\"", "read timeout");
	let db = common::wide_column_db(driver);

	let err = db
		.query("user")
		.unwrap()
		.with("posts")
		.with("profile")
		.get()
		.await
		.unwrap_err();

	let DatabaseError::PartialEagerLoad(partial) = err else {
		panic!("expected a partial eager-load error");
	};
	assert_eq!(partial.errors.len(), 1);
	assert_eq!(partial.errors[0].path, "profile");
	assert!(matches!(partial.errors[0].error, DatabaseError::Driver(_)));

	// The sibling path kept its results
	assert_eq!(partial.entities.len(), 1);
	assert_eq!(partial.entities[0].related_many("posts").len(), 1);
	assert!(!partial.entities[0].relation_loaded("profile"));
}

#[tokio::test]
async fn unknown_relation_fails_only_its_own_path() {
	let driver = Arc::new(StubDriver::new());
	driver.on("FROM \"users\"", vec![int_row(&[("id", 1)])]);
	driver.on(
		"FROM \"posts\"",
		vec![int_row(&[("id", 10), ("user_id", 1)])],
	);
	let db = common::wide_column_db(driver);

	let err = db
		.query("user")
		.unwrap()
		.with("posts")
		.with("followers")
		.get()
		.await
		.unwrap_err();

	let DatabaseError::PartialEagerLoad(partial) = err else {
		panic!("expected a partial eager-load error");
	};
	assert!(matches!(
		partial.errors[0].error,
		DatabaseError::RelationNotConfigured { .. }
	));
	assert_eq!(partial.entities[0].related_many("posts").len(), 1);
}

#[tokio::test]
async fn belongs_to_many_resolves_through_the_pivot_in_pivot_order() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"FROM \"users\"",
		vec![int_row(&[("id", 1)]), int_row(&[("id", 2)])],
	);
	driver.on(
		"FROM \"role_user\"",
		vec![
			int_row(&[("user_id", 1), ("role_id", 2)]),
			int_row(&[("user_id", 1), ("role_id", 3)]),
			int_row(&[("user_id", 2), ("role_id", 2)]),
		],
	);
	// Related rows arrive in the opposite order; merge follows pivot pairs
	driver.on(
		"FROM \"roles\"",
		vec![int_row(&[("id", 3)]), int_row(&[("id", 2)])],
	);
	let db = common::wide_column_db(Arc::clone(&driver));

	let users = db.query("user").unwrap().with("roles").get().await.unwrap();

	let first_roles = users[0].related_many("roles");
	assert_eq!(first_roles.len(), 2);
	assert_eq!(first_roles[0].get("id"), Some(&QueryValue::Int(2)));
	assert_eq!(first_roles[1].get("id"), Some(&QueryValue::Int(3)));
	assert_eq!(users[1].related_many("roles").len(), 1);

	// Two hops: one pivot query, one related query with the distinct ids
	assert_eq!(driver.call_count("FROM \"role_user\""), 1);
	assert_eq!(driver.call_count("FROM \"roles\""), 1);
	let roles_call = driver
		.calls()
		.into_iter()
		.find(|(text, _)| text.contains("FROM \"roles\""))
		.unwrap();
	assert!(roles_call.0.contains("\"id\" IN (?, ?)"));
}

#[tokio::test]
async fn has_one_takes_the_first_match() {
	let driver = Arc::new(StubDriver::new());
	driver.on("FROM \"users\"", vec![int_row(&[("id", 1)])]);
	driver.on(
		"FROM \"profiles\"",
		vec![
			int_row(&[("id", 50), ("user_id", 1)]),
			int_row(&[("id", 51), ("user_id", 1)]),
		],
	);
	let db = common::wide_column_db(driver);

	let users = db.query("user").unwrap().with("profile").get().await.unwrap();

	let profile = users[0].related_one("profile").expect("profile loaded");
	assert_eq!(profile.get("id"), Some(&QueryValue::Int(50)));
}

#[tokio::test]
async fn morph_to_groups_owners_by_discriminator() {
	let driver = Arc::new(StubDriver::new());
	driver.on(
		"FROM \"images\"",
		vec![
			row(&[
				("id", QueryValue::Int(1)),
				("imageable_type", QueryValue::String("post".into())),
				("imageable_id", QueryValue::Int(10)),
			]),
			row(&[
				("id", QueryValue::Int(2)),
				("imageable_type", QueryValue::String("user".into())),
				("imageable_id", QueryValue::Int(1)),
			]),
			row(&[
				("id", QueryValue::Int(3)),
				("imageable_type", QueryValue::String("post".into())),
				("imageable_id", QueryValue::Int(10)),
			]),
		],
	);
	driver.on("FROM \"posts\"", vec![int_row(&[("id", 10)])]);
	driver.on("FROM \"users\"", vec![int_row(&[("id", 1)])]);
	let db = common::wide_column_db(Arc::clone(&driver));

	let images = db
		.query("image")
		.unwrap()
		.with("imageable")
		.get()
		.await
		.unwrap();

	assert_eq!(
		images[0].related_one("imageable").unwrap().descriptor().name(),
		"post"
	);
	assert_eq!(
		images[1].related_one("imageable").unwrap().descriptor().name(),
		"user"
	);
	assert_eq!(
		images[2].related_one("imageable").unwrap().descriptor().name(),
		"post"
	);

	// One query per distinct type tag, duplicate ids collapsed
	assert_eq!(driver.call_count("FROM \"posts\""), 1);
	assert_eq!(driver.call_count("FROM \"users\""), 1);
	let posts_call = driver
		.calls()
		.into_iter()
		.find(|(text, _)| text.contains("FROM \"posts\""))
		.unwrap();
	assert!(posts_call.0.contains("\"id\" IN (?)"));
}

#[tokio::test]
async fn load_resolves_paths_onto_an_existing_result_set() {
	let driver = Arc::new(StubDriver::new());
	driver.on("FROM \"owners\"", vec![int_row(&[("id", 1)])]);
	driver.on(
		"FROM \"items\"",
		vec![int_row(&[("id", 10), ("owner_id", 1)])],
	);
	let db = common::wide_column_db(driver);

	let mut owners = db.query("owner").unwrap().get().await.unwrap();
	assert!(!owners[0].relation_loaded("items"));

	db.load(&mut owners, &["items"]).await.unwrap();
	assert_eq!(owners[0].related_many("items").len(), 1);
}

#[tokio::test]
async fn duplicate_owner_keys_share_one_fetch_and_one_child_set() {
	let driver = Arc::new(StubDriver::new());
	// Two comments by the same author
	driver.on(
		"FROM \"comments\"",
		vec![
			int_row(&[("id", 100), ("post_id", 1), ("user_id", 7)]),
			int_row(&[("id", 101), ("post_id", 1), ("user_id", 7)]),
		],
	);
	driver.on(
		"FROM \"users\"",
		vec![int_row(&[("id", 7)])],
	);
	let db = common::wide_column_db(Arc::clone(&driver));

	let comments = db
		.query("comment")
		.unwrap()
		.filter("post_id", colonnade::Operator::Eq, 1i64)
		.with("user")
		.get()
		.await
		.unwrap();

	assert_eq!(comments.len(), 2);
	for comment in &comments {
		let author = comment.related_one("user").expect("author loaded");
		assert_eq!(author.get("id"), Some(&QueryValue::Int(7)));
	}

	// One distinct key, one placeholder
	let users_call = driver
		.calls()
		.into_iter()
		.find(|(text, _)| text.contains("FROM \"users\""))
		.unwrap();
	assert!(users_call.0.contains("\"id\" IN (?)"));
	assert_eq!(users_call.1, vec![QueryValue::Int(7)]);
}
