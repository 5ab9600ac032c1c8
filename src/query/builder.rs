//! Fluent query builder
//!
//! Accumulates a [`QueryModel`] against one entity type and executes it
//! through the bound grammar and driver. Every terminal operation compiles
//! before dispatch, so dialect violations surface as `Compile` errors without
//! a network round trip.

use crate::database::Database;
use crate::eager::EagerLoadResolver;
use crate::error::{DatabaseError, PartialEagerLoad, Result};
use crate::grammar::Statement;
use crate::orm::{Entity, EntityDescriptor};
use crate::query::{Direction, Operator, OrderClause, QueryModel, WhereClause};
use crate::types::{DialectKind, QueryValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Chainable query against one entity type
pub struct QueryBuilder {
	db: Database,
	descriptor: Arc<EntityDescriptor>,
	model: QueryModel,
	eager_paths: Vec<String>,
	cache_ttl: Option<Duration>,
}

impl QueryBuilder {
	pub(crate) fn new(db: Database, descriptor: Arc<EntityDescriptor>) -> Self {
		let model = QueryModel::new(descriptor.table());
		Self {
			db,
			descriptor,
			model,
			eager_paths: Vec::new(),
			cache_ttl: None,
		}
	}

	pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
		&self.descriptor
	}

	pub fn model(&self) -> &QueryModel {
		&self.model
	}

	/// Swap in a pre-built model targeting this builder's entity (used by
	/// relation accessors, which derive constraints from descriptors)
	pub(crate) fn replace_model(mut self, model: QueryModel) -> Self {
		self.model = model;
		self
	}

	/// Restrict the projection to the given columns
	pub fn select(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.model.columns = Some(columns.into_iter().map(Into::into).collect());
		self
	}

	/// Add a basic comparison predicate (ANDed with prior predicates)
	pub fn filter(
		mut self,
		column: impl Into<String>,
		op: Operator,
		value: impl Into<QueryValue>,
	) -> Self {
		self.model.push_where(WhereClause::Basic {
			column: column.into(),
			op,
			value: value.into(),
		});
		self
	}

	pub fn filter_in(
		mut self,
		column: impl Into<String>,
		values: impl IntoIterator<Item = impl Into<QueryValue>>,
	) -> Self {
		self.model.push_where(WhereClause::In {
			column: column.into(),
			values: values.into_iter().map(Into::into).collect(),
		});
		self
	}

	pub fn filter_not_in(
		mut self,
		column: impl Into<String>,
		values: impl IntoIterator<Item = impl Into<QueryValue>>,
	) -> Self {
		self.model.push_where(WhereClause::NotIn {
			column: column.into(),
			values: values.into_iter().map(Into::into).collect(),
		});
		self
	}

	pub fn filter_between(
		mut self,
		column: impl Into<String>,
		low: impl Into<QueryValue>,
		high: impl Into<QueryValue>,
	) -> Self {
		self.model.push_where(WhereClause::Between {
			column: column.into(),
			low: low.into(),
			high: high.into(),
		});
		self
	}

	pub fn filter_null(mut self, column: impl Into<String>) -> Self {
		self.model.push_where(WhereClause::IsNull {
			column: column.into(),
		});
		self
	}

	pub fn filter_not_null(mut self, column: impl Into<String>) -> Self {
		self.model.push_where(WhereClause::IsNotNull {
			column: column.into(),
		});
		self
	}

	/// Partition scan boundary: `token(columns…) op value`
	pub fn token_range(
		mut self,
		columns: impl IntoIterator<Item = impl Into<String>>,
		op: Operator,
		value: impl Into<QueryValue>,
	) -> Self {
		self.model.push_where(WhereClause::TokenRange {
			columns: columns.into_iter().map(Into::into).collect(),
			op,
			value: value.into(),
		});
		self
	}

	/// Raw predicate fragment, appended verbatim (still subject to the
	/// dialect's OR rejection)
	pub fn filter_raw(mut self, sql: impl Into<String>) -> Self {
		self.model.push_where(WhereClause::Raw { sql: sql.into() });
		self
	}

	pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
		self.model.orders.push(OrderClause {
			column: column.into(),
			direction,
		});
		self
	}

	pub fn limit(mut self, limit: u64) -> Self {
		self.model.limit = Some(limit);
		self
	}

	/// Opt in to backend-side scanning for predicates that cannot seek.
	/// Required by the wide-column dialect for any predicate on a column
	/// that is not part of a key or index.
	pub fn allow_filtering(mut self) -> Self {
		self.model.allow_filtering = true;
		self
	}

	/// Attach one eager-load path ("posts" or nested "posts.comments.user")
	pub fn with(mut self, path: impl Into<String>) -> Self {
		self.eager_paths.push(path.into());
		self
	}

	pub fn with_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.eager_paths
			.extend(paths.into_iter().map(Into::into));
		self
	}

	/// Serve this read from the configured cache when a fresh enough entry
	/// exists, keyed by the compiled statement fingerprint
	pub fn remember(mut self, ttl: Duration) -> Self {
		self.cache_ttl = Some(ttl);
		self
	}

	/// Compile the SELECT this builder would execute, without executing it
	pub fn to_statement(&self) -> Result<Statement> {
		let schema = self.db.table_schema(&self.model.table)?;
		self.db.grammar().compile_select(&self.model, &schema)
	}

	/// Execute and hydrate every row, in the order the backend returned
	/// them, then resolve any attached eager-load paths.
	pub async fn get(self) -> Result<Vec<Entity>> {
		let statement = self.to_statement()?;

		let rows = match (&self.cache_ttl, self.db.cache()) {
			(Some(ttl), Some(cache)) => {
				let key = crate::cache::statement_fingerprint(&self.model.table, &statement);
				match cache.get(&key) {
					Some(rows) => {
						debug!(table = %self.model.table, "query served from cache");
						rows
					}
					None => {
						let rows = self.db.connection().fetch_all(&statement).await?;
						cache.put(key, rows.clone(), *ttl);
						rows
					}
				}
			}
			_ => self.db.connection().fetch_all(&statement).await?,
		};

		let mut entities = rows
			.into_iter()
			.map(|row| self.descriptor.hydrate(row))
			.collect::<Result<Vec<_>>>()?;

		if !self.eager_paths.is_empty() && !entities.is_empty() {
			let resolver = EagerLoadResolver::new(&self.db);
			let errors = resolver.resolve(&mut entities, &self.eager_paths).await;
			if !errors.is_empty() {
				return Err(DatabaseError::PartialEagerLoad(Box::new(PartialEagerLoad {
					entities,
					errors,
				})));
			}
		}

		Ok(entities)
	}

	/// First matching entity, or `None`. Zero rows is not an error.
	pub async fn first(self) -> Result<Option<Entity>> {
		let mut entities = self.limit(1).get().await?;
		Ok(if entities.is_empty() {
			None
		} else {
			Some(entities.swap_remove(0))
		})
	}

	/// Look up by primary key
	pub async fn find(self, key: impl Into<QueryValue>) -> Result<Option<Entity>> {
		let pk = self.descriptor.primary_key().to_string();
		self.filter(pk, Operator::Eq, key).first().await
	}

	/// Look up by primary key, failing with `NotFound` when absent
	pub async fn find_or_fail(self, key: impl Into<QueryValue>) -> Result<Entity> {
		let key = key.into();
		let entity_name = self.descriptor.name().to_string();
		let key_repr = key.key_repr();
		self.find(key).await?.ok_or(DatabaseError::NotFound {
			entity: entity_name,
			key: key_repr,
		})
	}

	/// Count matching rows
	pub async fn count(self) -> Result<u64> {
		let schema = self.db.table_schema(&self.model.table)?;
		let statement = self.db.grammar().compile_count(&self.model, &schema)?;
		let rows = self.db.connection().fetch_all(&statement).await?;

		let value = rows
			.first()
			.and_then(|row| row.get("count").or_else(|| row.values().next()));
		match value {
			Some(QueryValue::Int(count)) => Ok(*count as u64),
			Some(other) => Err(DatabaseError::Type(format!(
				"COUNT returned a non-integer value: {other:?}"
			))),
			None => Ok(0),
		}
	}

	/// Whether any row matches, via a keyed single-row probe
	pub async fn exists(self) -> Result<bool> {
		let pk = self.descriptor.primary_key().to_string();
		let entities = self.select([pk]).limit(1).get().await?;
		Ok(!entities.is_empty())
	}

	/// Collect one column across all matching rows
	pub async fn pluck(self, column: impl Into<String>) -> Result<Vec<QueryValue>> {
		let column = column.into();
		let builder = self.select([column.clone()]);
		let statement = builder.to_statement()?;
		let rows = builder.db.connection().fetch_all(&statement).await?;
		Ok(rows
			.into_iter()
			.map(|row| row.get(&column).cloned().unwrap_or(QueryValue::Null))
			.collect())
	}

	/// Compile and execute an UPDATE restricted by the accumulated
	/// predicates. The returned count is the driver's report; the
	/// wide-column backend does not report it reliably.
	pub async fn update(self, assignments: &[(&str, QueryValue)]) -> Result<u64> {
		let assignments: Vec<(String, QueryValue)> = assignments
			.iter()
			.map(|(column, value)| ((*column).to_string(), value.clone()))
			.collect();
		let schema = self.db.table_schema(&self.model.table)?;
		let statement = self
			.db
			.grammar()
			.compile_update(&self.model, &assignments, &schema)?;
		let result = self.db.connection().execute(&statement).await?;
		if self.db.dialect() == DialectKind::WideColumn {
			debug!(
				rows_affected = result.rows_affected,
				"wide-column affected-row counts are advisory"
			);
		}
		Ok(result.rows_affected)
	}

	/// Compile and execute a DELETE restricted by the accumulated predicates
	pub async fn delete(self) -> Result<u64> {
		let schema = self.db.table_schema(&self.model.table)?;
		let statement = self.db.grammar().compile_delete(&self.model, &schema)?;
		let result = self.db.connection().execute(&statement).await?;
		if self.db.dialect() == DialectKind::WideColumn {
			debug!(
				rows_affected = result.rows_affected,
				"wide-column affected-row counts are advisory"
			);
		}
		Ok(result.rows_affected)
	}

	/// Raw single-row INSERT through the builder (no mass-assignment
	/// protection, no timestamp stamping — entity-level persistence is
	/// [`Database::save`])
	pub async fn insert(self, assignments: &[(&str, QueryValue)]) -> Result<()> {
		let assignments: Vec<(String, QueryValue)> = assignments
			.iter()
			.map(|(column, value)| ((*column).to_string(), value.clone()))
			.collect();
		let statement = self
			.db
			.grammar()
			.compile_insert(&self.model.table, &assignments, false)?;
		self.db.connection().execute(&statement).await?;
		Ok(())
	}
}
