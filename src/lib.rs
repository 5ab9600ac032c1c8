//! # Colonnade
//!
//! An object-relational mapper that speaks both a wide-column store (CQL,
//! partition/clustering-key semantics, no joins) and relational databases
//! through one fluent query interface.
//!
//! The crate is organized around two cores:
//!
//! - **Query compilation**: a fluent [`QueryBuilder`] accumulates a
//!   dialect-neutral [`QueryModel`](query::QueryModel); a per-backend
//!   [`Grammar`](grammar::Grammar) compiles it to statement text plus
//!   positional bindings, enforcing the backend's legality rules (seekable
//!   predicates, clustering-prefix ordering, `ALLOW FILTERING`) before any
//!   driver call.
//! - **Relationship resolution**: declared [`Relation`]s constrain queries
//!   for one owner (lazy) or a batch of owners (eager); the
//!   [`EagerLoadResolver`](eager::EagerLoadResolver) walks dot-separated
//!   paths breadth-first with one batched query per segment, a
//!   duplicate-fetch guard and per-path failure isolation.
//!
//! Entities are typed attribute bags hydrated through registered
//! [`EntityDescriptor`]s, with original-state tracking for dirty diffing on
//! update. Connection lifecycle, pooling, migrations and the wire protocol
//! itself stay outside: a backend plugs in by implementing
//! [`Driver`](connection::Driver).
//!
//! ```no_run
//! use colonnade::{
//! 	Database, DatabaseConnection, Direction, EntityDescriptor, EntityRegistry, FieldType,
//! 	Operator, Relation, SchemaCatalog, TableSchema,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo(driver: Arc<dyn colonnade::Driver>) -> colonnade::Result<()> {
//! let registry = EntityRegistry::new().register(
//! 	EntityDescriptor::builder("user", "users")
//! 		.field("id", FieldType::Uuid)
//! 		.field("email", FieldType::Text)
//! 		.has_many("posts", "post", "user_id")
//! 		.build(),
//! );
//! let catalog = SchemaCatalog::new()
//! 	.register(TableSchema::new("users", ["id"]).indexed("email"))
//! 	.register(TableSchema::new("posts", ["user_id"]).clustering("id", Direction::Asc));
//!
//! let db = Database::new(
//! 	DatabaseConnection::new(driver),
//! 	colonnade::DialectKind::WideColumn,
//! 	registry,
//! 	catalog,
//! );
//!
//! let users = db
//! 	.query("user")?
//! 	.filter("email", Operator::Eq, "a@example.com")
//! 	.with("posts")
//! 	.get()
//! 	.await?;
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

pub mod associations;
pub mod cache;
pub mod config;
pub mod connection;
pub mod database;
pub mod drivers;
pub mod eager;
pub mod error;
pub mod grammar;
pub mod orm;
pub mod query;
pub mod schema;
pub mod testing;
pub mod types;

pub use associations::{Relation, RelationAccessor};
pub use cache::{MemoryCache, QueryCache};
pub use config::DatabaseConfig;
pub use connection::{DatabaseConnection, Driver};
pub use database::Database;
pub use eager::{EagerLoadResolver, PathError};
pub use error::{DatabaseError, PartialEagerLoad, Result};
pub use grammar::{CqlGrammar, Grammar, PostgresGrammar, Statement};
pub use orm::{
	DescriptorBuilder, Entity, EntityDescriptor, EntityRegistry, FieldType, RelationValue,
};
pub use query::{Direction, Operator, QueryBuilder, QueryModel, WhereClause};
pub use schema::{SchemaCatalog, TableSchema};
pub use types::{DialectKind, QueryResult, QueryValue, Row};
