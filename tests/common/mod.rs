//! Shared fixtures: a blog-shaped entity graph over the stub driver

#![allow(dead_code)]

use colonnade::testing::StubDriver;
use colonnade::{
	Database, DatabaseConnection, DialectKind, Direction, EntityDescriptor, EntityRegistry,
	FieldType, Relation, SchemaCatalog, TableSchema,
};
use std::sync::Arc;

pub fn registry() -> EntityRegistry {
	EntityRegistry::new()
		.register(
			EntityDescriptor::builder("owner", "owners")
				.field("id", FieldType::Int)
				.field("name", FieldType::Text)
				.has_many("items", "item", "owner_id")
				.build(),
		)
		.register(
			EntityDescriptor::builder("item", "items")
				.field("id", FieldType::Int)
				.field("owner_id", FieldType::Int)
				.field("label", FieldType::Text)
				.belongs_to("owner", "owner", "owner_id")
				.build(),
		)
		.register(
			EntityDescriptor::builder("user", "users")
				.field("id", FieldType::Int)
				.field("email", FieldType::Text)
				.field("name", FieldType::Text)
				.fillable(["email", "name"])
				.has_many("posts", "post", "user_id")
				.has_one("profile", "profile", "user_id")
				.relation(
					"roles",
					Relation::belongs_to_many("role", "role_user", "user_id", "role_id"),
				)
				.relation("images", Relation::morph_many("image", "imageable", "id"))
				.build(),
		)
		.register(
			EntityDescriptor::builder("post", "posts")
				.field("id", FieldType::Int)
				.field("user_id", FieldType::Int)
				.field("title", FieldType::Text)
				.belongs_to("user", "user", "user_id")
				.has_many("comments", "comment", "post_id")
				.relation("images", Relation::morph_many("image", "imageable", "id"))
				.build(),
		)
		.register(
			EntityDescriptor::builder("comment", "comments")
				.field("id", FieldType::Int)
				.field("post_id", FieldType::Int)
				.field("user_id", FieldType::Int)
				.field("body", FieldType::Text)
				.belongs_to("post", "post", "post_id")
				.belongs_to("user", "user", "user_id")
				.build(),
		)
		.register(
			EntityDescriptor::builder("profile", "profiles")
				.field("id", FieldType::Int)
				.field("user_id", FieldType::Int)
				.field("bio", FieldType::Text)
				.build(),
		)
		.register(
			EntityDescriptor::builder("role", "roles")
				.field("id", FieldType::Int)
				.field("name", FieldType::Text)
				.build(),
		)
		.register(
			EntityDescriptor::builder("image", "images")
				.field("id", FieldType::Int)
				.field("imageable_type", FieldType::Text)
				.field("imageable_id", FieldType::Int)
				.field("url", FieldType::Text)
				.relation("imageable", Relation::morph_to("imageable"))
				.build(),
		)
		.register(
			EntityDescriptor::builder("ticket", "tickets")
				.field("id", FieldType::Uuid)
				.field("subject", FieldType::Text)
				.field("created_at", FieldType::Timestamp)
				.field("updated_at", FieldType::Timestamp)
				.fillable(["subject"])
				.timestamps()
				.build(),
		)
}

pub fn catalog() -> SchemaCatalog {
	SchemaCatalog::new()
		.register(TableSchema::new("owners", ["id"]))
		.register(TableSchema::new("items", ["owner_id"]).clustering("id", Direction::Asc))
		.register(TableSchema::new("users", ["id"]).indexed("email"))
		.register(TableSchema::new("posts", ["id"]).indexed("user_id"))
		.register(TableSchema::new("comments", ["post_id"]).clustering("id", Direction::Asc))
		.register(TableSchema::new("profiles", ["user_id"]))
		.register(TableSchema::new("roles", ["id"]))
		.register(TableSchema::new("role_user", ["user_id"]).clustering("role_id", Direction::Asc))
		.register(
			TableSchema::new("images", ["imageable_type"])
				.clustering("imageable_id", Direction::Asc)
				.clustering("id", Direction::Asc),
		)
		.register(TableSchema::new("tickets", ["id"]))
}

/// Wide-column database over a shared stub driver
pub fn wide_column_db(driver: Arc<StubDriver>) -> Database {
	Database::new(
		DatabaseConnection::new(driver),
		DialectKind::WideColumn,
		registry(),
		catalog(),
	)
}

/// Relational database over a shared stub driver (same entity graph)
pub fn postgres_db(driver: Arc<StubDriver>) -> Database {
	Database::new(
		DatabaseConnection::new(driver),
		DialectKind::Postgres,
		registry(),
		catalog(),
	)
}
