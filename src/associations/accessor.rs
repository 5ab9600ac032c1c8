//! Lazy relationship access and association writes
//!
//! A `RelationAccessor` binds one owner entity to one declared relation.
//! Reads go through the same batched machinery as eager loading (with a
//! single-owner batch), so the constraint logic is not re-derived; writes
//! pre-set foreign keys and discriminators from the owner before persisting.

use crate::associations::Relation;
use crate::database::Database;
use crate::eager::EagerLoadResolver;
use crate::error::{DatabaseError, Result};
use crate::orm::{Entity, RelationValue};
use crate::query::{Operator, QueryBuilder};
use crate::types::QueryValue;
use indexmap::IndexSet;

/// One owner's view of one declared relation
pub struct RelationAccessor<'a> {
	db: &'a Database,
	owner: &'a Entity,
	name: String,
	relation: Relation,
}

impl<'a> RelationAccessor<'a> {
	pub(crate) fn new(
		db: &'a Database,
		owner: &'a Entity,
		name: impl Into<String>,
		relation: Relation,
	) -> Self {
		Self {
			db,
			owner,
			name: name.into(),
			relation,
		}
	}

	pub fn relation(&self) -> &Relation {
		&self.relation
	}

	fn owner_key(&self) -> Option<QueryValue> {
		let column = self.relation.owner_key_column()?;
		self.owner.get(column).filter(|v| !v.is_null()).cloned()
	}

	fn required_owner_key(&self) -> Result<QueryValue> {
		self.owner_key().ok_or_else(|| {
			DatabaseError::Compile(format!(
				"owner `{}` has no key value for relation `{}`; persist the owner first",
				self.owner.descriptor().name(),
				self.name
			))
		})
	}

	/// Constrained builder over the related table.
	///
	/// Available for single-hop shapes and MorphTo; a pivot association has
	/// no single-query form on a join-less backend — use [`get`](Self::get).
	pub fn query(&self) -> Result<QueryBuilder> {
		match &self.relation {
			Relation::BelongsToMany(_) => Err(DatabaseError::Compile(format!(
				"relation `{}` spans a pivot table and cannot be expressed as one query",
				self.name
			))),
			Relation::MorphTo(shape) => {
				let Some(QueryValue::String(tag)) = self.owner.get(&shape.morph_type) else {
					return Err(DatabaseError::Compile(format!(
						"owner `{}` has no `{}` discriminator value",
						self.owner.descriptor().name(),
						shape.morph_type
					)));
				};
				let target = self.db.registry().get_by_morph_class(tag)?.clone();
				let id = self
					.owner
					.get(&shape.morph_id)
					.cloned()
					.unwrap_or(QueryValue::Null);
				let pk = target.primary_key().to_string();
				Ok(self
					.db
					.query(target.name())?
					.filter(pk, Operator::Eq, id))
			}
			relation => {
				let related_name = relation
					.related()
					.expect("single-hop relations declare a related type");
				let related = self.db.registry().get(related_name)?.clone();
				let key = self.required_owner_key()?;
				let model = relation.constrain_for_one(
					related.table(),
					key,
					self.owner.descriptor().morph_class(),
				);
				let builder = self.db.query(related.name())?;
				Ok(builder.replace_model(model))
			}
		}
	}

	/// Load the related entities with one batched call (two hops for pivot
	/// associations), in backend row order
	pub async fn get(&self) -> Result<Vec<Entity>> {
		if self.owner_key_absent() {
			return Ok(Vec::new());
		}

		let mut owners = vec![self.owner.clone()];
		let resolver = EagerLoadResolver::new(self.db);
		let mut errors = resolver
			.resolve(&mut owners, std::slice::from_ref(&self.name))
			.await;
		if let Some(failed) = errors.pop() {
			return Err(failed.error);
		}

		let mut owner = owners.pop().unwrap_or_else(|| self.owner.clone());
		Ok(match owner.take_relation(&self.name) {
			Some(RelationValue::Many(entities)) => entities,
			Some(RelationValue::One(Some(entity))) => vec![*entity],
			Some(RelationValue::One(None)) | None => Vec::new(),
		})
	}

	/// First related entity, if any
	pub async fn first(&self) -> Result<Option<Entity>> {
		let mut entities = self.get().await?;
		Ok(if entities.is_empty() {
			None
		} else {
			Some(entities.swap_remove(0))
		})
	}

	fn owner_key_absent(&self) -> bool {
		match &self.relation {
			Relation::MorphTo(shape) => {
				!matches!(self.owner.get(&shape.morph_type), Some(QueryValue::String(_)))
					|| self
						.owner
						.get(&shape.morph_id)
						.map(QueryValue::is_null)
						.unwrap_or(true)
			}
			_ => self.owner_key().is_none(),
		}
	}

	/// Stamp the owner's key (and discriminator, for polymorphic shapes)
	/// onto a related entity before it is persisted
	fn apply_owner_key(&self, entity: &mut Entity) -> Result<()> {
		let key = self.required_owner_key()?;
		match &self.relation {
			Relation::HasOne(shape) | Relation::HasMany(shape) => {
				entity.set(shape.foreign_key.clone(), key);
				Ok(())
			}
			Relation::MorphOne(shape) | Relation::MorphMany(shape) => {
				entity.set(
					shape.morph_type.clone(),
					QueryValue::String(self.owner.descriptor().morph_class().to_string()),
				);
				entity.set(shape.morph_id.clone(), key);
				Ok(())
			}
			Relation::BelongsToMany(_) => Ok(()),
			Relation::BelongsTo(_) | Relation::MorphTo(_) => Err(DatabaseError::Compile(format!(
				"relation `{}` is owned by the related side; use associate instead",
				self.name
			))),
		}
	}

	/// Persist a new related entity with the association keys pre-set.
	/// For pivot associations the entity is saved and then attached.
	pub async fn create(&self, attrs: &[(&str, QueryValue)]) -> Result<Entity> {
		let related_name = self.relation.related().ok_or_else(|| {
			DatabaseError::Compile(format!(
				"relation `{}` resolves its target per row; create through the target type",
				self.name
			))
		})?;
		let related = self.db.registry().get(related_name)?.clone();
		let mut entity = related.make(attrs);

		match &self.relation {
			Relation::BelongsToMany(shape) => {
				self.db.save(&mut entity).await?;
				let id = entity.get(&shape.related_key).cloned().ok_or_else(|| {
					DatabaseError::Compile(format!(
						"created `{related_name}` has no `{}` value to attach",
						shape.related_key
					))
				})?;
				self.attach(&[id]).await?;
			}
			_ => {
				self.apply_owner_key(&mut entity)?;
				self.db.save(&mut entity).await?;
			}
		}
		Ok(entity)
	}

	pub async fn create_many(
		&self,
		attr_sets: &[&[(&str, QueryValue)]],
	) -> Result<Vec<Entity>> {
		let mut created = Vec::with_capacity(attr_sets.len());
		for attrs in attr_sets {
			created.push(self.create(attrs).await?);
		}
		Ok(created)
	}

	/// Point an existing related entity at the owner and persist it
	pub async fn save(&self, entity: &mut Entity) -> Result<()> {
		self.apply_owner_key(entity)?;
		self.db.save(entity).await
	}

	pub async fn save_many(&self, entities: &mut [Entity]) -> Result<()> {
		for entity in entities.iter_mut() {
			self.save(entity).await?;
		}
		Ok(())
	}

	/// Insert pivot rows linking the owner to the given related ids.
	///
	/// Idempotent: duplicate ids collapse to one insert, and each insert
	/// compiles with insert-or-ignore semantics (`IF NOT EXISTS` /
	/// `ON CONFLICT DO NOTHING`), so re-attaching an existing pair is a
	/// no-op rather than a duplicate row.
	pub async fn attach(&self, ids: &[QueryValue]) -> Result<()> {
		let Relation::BelongsToMany(shape) = &self.relation else {
			return Err(self.not_a_pivot());
		};
		let owner_key = self.required_owner_key()?;

		let mut seen: IndexSet<String> = IndexSet::new();
		for id in ids {
			if !seen.insert(id.key_repr()) {
				continue;
			}
			let assignments = vec![
				(shape.foreign_pivot_key.clone(), owner_key.clone()),
				(shape.related_pivot_key.clone(), id.clone()),
			];
			let statement =
				self.db
					.grammar()
					.compile_insert(&shape.pivot_table, &assignments, true)?;
			self.db.connection().execute(&statement).await?;
		}
		Ok(())
	}

	/// Delete pivot rows for the given related ids, or every pivot row of
	/// the owner when no ids are given. Returns the driver's count report.
	pub async fn detach(&self, ids: &[QueryValue]) -> Result<u64> {
		let Relation::BelongsToMany(shape) = &self.relation else {
			return Err(self.not_a_pivot());
		};
		let owner_key = self.required_owner_key()?;

		let mut model = crate::query::QueryModel::new(&shape.pivot_table);
		model.push_where(crate::query::WhereClause::Basic {
			column: shape.foreign_pivot_key.clone(),
			op: Operator::Eq,
			value: owner_key,
		});
		if !ids.is_empty() {
			model.push_where(crate::query::WhereClause::In {
				column: shape.related_pivot_key.clone(),
				values: ids.to_vec(),
			});
		}

		let schema = self.db.table_schema(&shape.pivot_table)?;
		let statement = self.db.grammar().compile_delete(&model, &schema)?;
		let result = self.db.connection().execute(&statement).await?;
		Ok(result.rows_affected)
	}

	/// Replace the owner's pivot rows with exactly the given id set
	pub async fn sync(&self, ids: &[QueryValue]) -> Result<()> {
		self.detach(&[]).await?;
		self.attach(ids).await
	}

	fn not_a_pivot(&self) -> DatabaseError {
		DatabaseError::Compile(format!(
			"relation `{}` is not a many-to-many association",
			self.name
		))
	}
}
