//! Database context
//!
//! The `Database` value owns everything a query needs: the driver connection,
//! the grammar for the active dialect, the entity registry and the schema
//! catalog, plus an optional result cache. It is constructed and torn down by
//! the caller — there is no ambient global connection.

use crate::associations::{Relation, RelationAccessor};
use crate::cache::QueryCache;
use crate::connection::DatabaseConnection;
use crate::eager::{EagerLoadResolver, PathError};
use crate::error::{DatabaseError, PartialEagerLoad, Result};
use crate::grammar::{Grammar, grammar_for};
use crate::orm::{Entity, EntityRegistry};
use crate::query::{Operator, QueryBuilder, QueryModel, WhereClause};
use crate::schema::{SchemaCatalog, TableSchema};
use crate::types::{DialectKind, QueryValue};
use std::sync::Arc;

/// Context object binding one connection, dialect, registry and catalog
#[derive(Clone)]
pub struct Database {
	connection: DatabaseConnection,
	grammar: Arc<dyn Grammar>,
	registry: Arc<EntityRegistry>,
	catalog: Arc<SchemaCatalog>,
	cache: Option<Arc<dyn QueryCache>>,
}

impl Database {
	pub fn new(
		connection: DatabaseConnection,
		dialect: DialectKind,
		registry: EntityRegistry,
		catalog: SchemaCatalog,
	) -> Self {
		Self {
			connection,
			grammar: grammar_for(dialect),
			registry: Arc::new(registry),
			catalog: Arc::new(catalog),
			cache: None,
		}
	}

	/// Attach a result cache consulted by `remember`-flagged reads
	pub fn with_cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
		self.cache = Some(cache);
		self
	}

	pub fn dialect(&self) -> DialectKind {
		self.grammar.dialect()
	}

	pub fn connection(&self) -> &DatabaseConnection {
		&self.connection
	}

	pub fn grammar(&self) -> &Arc<dyn Grammar> {
		&self.grammar
	}

	pub fn registry(&self) -> &Arc<EntityRegistry> {
		&self.registry
	}

	pub(crate) fn cache(&self) -> Option<&Arc<dyn QueryCache>> {
		self.cache.as_ref()
	}

	/// Schema for a table. The wide-column dialect requires a catalog entry
	/// (its legality rules depend on key placement); the relational dialect
	/// falls back to an unconstrained schema.
	pub(crate) fn table_schema(&self, table: &str) -> Result<TableSchema> {
		match self.catalog.table(table) {
			Some(schema) => Ok(schema.clone()),
			None => match self.dialect() {
				DialectKind::WideColumn => Err(DatabaseError::UnknownTable(table.to_string())),
				DialectKind::Postgres => Ok(TableSchema::relational(table)),
			},
		}
	}

	/// Start a query against a registered entity type
	pub fn query(&self, entity: &str) -> Result<QueryBuilder> {
		let descriptor = self.registry.get(entity)?.clone();
		Ok(QueryBuilder::new(self.clone(), descriptor))
	}

	/// Lazy relationship access for one owner entity
	pub fn related<'a>(&'a self, owner: &'a Entity, name: &str) -> Result<RelationAccessor<'a>> {
		let relation = owner.descriptor().relation(name)?.clone();
		Ok(RelationAccessor::new(self, owner, name, relation))
	}

	/// Eager-load paths onto an already loaded result set.
	///
	/// The entities stay with the caller, so on partial failure the error's
	/// `entities` payload is empty — successfully resolved relations remain
	/// populated on the caller's entities.
	pub async fn load(&self, entities: &mut Vec<Entity>, paths: &[&str]) -> Result<()> {
		let paths: Vec<String> = paths.iter().map(|p| (*p).to_string()).collect();
		let resolver = EagerLoadResolver::new(self);
		let errors: Vec<PathError> = resolver.resolve(entities, &paths).await;
		if errors.is_empty() {
			Ok(())
		} else {
			Err(DatabaseError::PartialEagerLoad(Box::new(PartialEagerLoad {
				entities: Vec::new(),
				errors,
			})))
		}
	}

	/// Create, fill and persist an entity of a registered type
	pub async fn create(&self, entity: &str, attrs: &[(&str, QueryValue)]) -> Result<Entity> {
		let descriptor = self.registry.get(entity)?.clone();
		let mut entity = descriptor.make(attrs);
		self.save(&mut entity).await?;
		Ok(entity)
	}

	/// Persist an entity: INSERT when it has never been stored, UPDATE of
	/// the dirty attributes otherwise. On success the entity's `original`
	/// snapshot is refreshed.
	pub async fn save(&self, entity: &mut Entity) -> Result<()> {
		let descriptor = entity.descriptor().clone();
		let now = chrono::Utc::now();

		if entity.exists() {
			if !entity.is_dirty(None) {
				return Ok(());
			}
			if descriptor.has_timestamps() {
				entity.set("updated_at", QueryValue::Timestamp(now));
			}
			let assignments = entity.dirty_attributes();
			let pk = entity.primary_key().cloned().ok_or_else(|| {
				DatabaseError::Compile(format!(
					"cannot UPDATE `{}` without a `{}` value",
					descriptor.table(),
					descriptor.primary_key()
				))
			})?;

			let mut model = QueryModel::new(descriptor.table());
			model.push_where(WhereClause::Basic {
				column: descriptor.primary_key().to_string(),
				op: Operator::Eq,
				value: pk,
			});
			let schema = self.table_schema(descriptor.table())?;
			let statement = self
				.grammar
				.compile_update(&model, &assignments, &schema)?;
			self.connection.execute(&statement).await?;
		} else {
			if descriptor.has_timestamps() {
				if entity.get("created_at").is_none() {
					entity.set("created_at", QueryValue::Timestamp(now));
				}
				entity.set("updated_at", QueryValue::Timestamp(now));
			}
			// Generate a uuid primary key when the field is declared Uuid
			// and no value was supplied.
			let pk_column = descriptor.primary_key().to_string();
			let pk_missing = entity
				.get(&pk_column)
				.map(QueryValue::is_null)
				.unwrap_or(true);
			if pk_missing
				&& descriptor.field(&pk_column) == Some(crate::orm::FieldType::Uuid)
			{
				entity.set(pk_column, QueryValue::Uuid(uuid::Uuid::new_v4()));
			}

			let assignments: Vec<(String, QueryValue)> = entity
				.attributes()
				.iter()
				.map(|(column, value)| (column.clone(), value.clone()))
				.collect();
			let statement = self
				.grammar
				.compile_insert(descriptor.table(), &assignments, false)?;
			self.connection.execute(&statement).await?;
		}

		entity.sync_original();
		Ok(())
	}

	/// Delete an entity by its primary key. The count is the driver's
	/// report — advisory on the wide-column backend.
	pub async fn delete(&self, entity: &Entity) -> Result<u64> {
		let descriptor = entity.descriptor();
		let pk = entity.primary_key().cloned().ok_or_else(|| {
			DatabaseError::Compile(format!(
				"cannot DELETE from `{}` without a `{}` value",
				descriptor.table(),
				descriptor.primary_key()
			))
		})?;

		let mut model = QueryModel::new(descriptor.table());
		model.push_where(WhereClause::Basic {
			column: descriptor.primary_key().to_string(),
			op: Operator::Eq,
			value: pk,
		});
		let schema = self.table_schema(descriptor.table())?;
		let statement = self.grammar.compile_delete(&model, &schema)?;
		let result = self.connection.execute(&statement).await?;
		Ok(result.rows_affected)
	}

	/// Point a belongs-to foreign key at a related entity (the owner still
	/// needs a `save` to persist the change)
	pub fn associate(&self, owner: &mut Entity, name: &str, related: &Entity) -> Result<()> {
		let relation = owner.descriptor().relation(name)?.clone();
		let Relation::BelongsTo(shape) = relation else {
			return Err(DatabaseError::Compile(format!(
				"relation `{name}` is not a belongs-to association"
			)));
		};
		let value = related
			.get(&shape.owner_key)
			.cloned()
			.unwrap_or(QueryValue::Null);
		owner.set(shape.foreign_key, value);
		Ok(())
	}

	/// Clear a belongs-to foreign key
	pub fn dissociate(&self, owner: &mut Entity, name: &str) -> Result<()> {
		let relation = owner.descriptor().relation(name)?.clone();
		let Relation::BelongsTo(shape) = relation else {
			return Err(DatabaseError::Compile(format!(
				"relation `{name}` is not a belongs-to association"
			)));
		};
		owner.set(shape.foreign_key, QueryValue::Null);
		Ok(())
	}
}
