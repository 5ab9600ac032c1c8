//! Entity type descriptors and the type registry

use crate::associations::Relation;
use crate::error::{DatabaseError, Result};
use crate::orm::entity::Entity;
use crate::types::{QueryValue, Row};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Semantic field types, checked when hydrating rows into entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
	Bool,
	Int,
	Float,
	Text,
	Bytes,
	Uuid,
	Timestamp,
}

impl FieldType {
	/// Check a raw value against the declared type, coercing where the
	/// driver representation is looser than the declaration (integers for
	/// float columns, uuid strings for uuid columns).
	fn check(&self, column: &str, value: QueryValue) -> Result<QueryValue> {
		let ok = match (self, &value) {
			(_, QueryValue::Null) => return Ok(value),
			(FieldType::Bool, QueryValue::Bool(_)) => true,
			(FieldType::Int, QueryValue::Int(_)) => true,
			(FieldType::Float, QueryValue::Float(_)) => true,
			(FieldType::Float, QueryValue::Int(i)) => {
				return Ok(QueryValue::Float(*i as f64));
			}
			(FieldType::Text, QueryValue::String(_)) => true,
			(FieldType::Bytes, QueryValue::Bytes(_)) => true,
			(FieldType::Uuid, QueryValue::Uuid(_)) => true,
			(FieldType::Uuid, QueryValue::String(s)) => {
				let parsed = uuid::Uuid::parse_str(s).map_err(|_| {
					DatabaseError::Type(format!("column `{column}`: `{s}` is not a valid uuid"))
				})?;
				return Ok(QueryValue::Uuid(parsed));
			}
			(FieldType::Timestamp, QueryValue::Timestamp(_)) => true,
			_ => false,
		};
		if ok {
			Ok(value)
		} else {
			Err(DatabaseError::Type(format!(
				"column `{column}` expected {self:?}, got {value:?}"
			)))
		}
	}
}

/// Static description of one entity type.
///
/// Built once at registration time; everything the pipeline needs to know
/// about a type — table, keys, field schema, mass-assignment lists and the
/// relation registry — lives here instead of being discovered at runtime.
#[derive(Debug)]
pub struct EntityDescriptor {
	name: String,
	table: String,
	primary_key: String,
	morph_class: String,
	fields: IndexMap<String, FieldType>,
	fillable: Option<Vec<String>>,
	guarded: Vec<String>,
	timestamps: bool,
	relations: IndexMap<String, Relation>,
}

impl EntityDescriptor {
	pub fn builder(name: impl Into<String>, table: impl Into<String>) -> DescriptorBuilder {
		DescriptorBuilder::new(name, table)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn primary_key(&self) -> &str {
		&self.primary_key
	}

	/// Type tag written to morph discriminator columns
	pub fn morph_class(&self) -> &str {
		&self.morph_class
	}

	pub fn has_timestamps(&self) -> bool {
		self.timestamps
	}

	pub fn field(&self, name: &str) -> Option<FieldType> {
		self.fields.get(name).copied()
	}

	pub fn relation(&self, name: &str) -> Result<&Relation> {
		self.relations.get(name).ok_or_else(|| {
			DatabaseError::RelationNotConfigured {
				relation: name.to_string(),
				entity: self.name.clone(),
			}
		})
	}

	pub fn relations(&self) -> impl Iterator<Item = (&String, &Relation)> {
		self.relations.iter()
	}

	/// Mass-assignment gate. A column passes when it appears in the
	/// fillable list (if one is declared) and not in the guarded list.
	/// Disallowed keys are silently dropped by `Entity::fill`.
	pub fn is_fillable(&self, column: &str) -> bool {
		if self.guarded.iter().any(|c| c == column) {
			return false;
		}
		match &self.fillable {
			Some(fillable) => fillable.iter().any(|c| c == column),
			None => true,
		}
	}

	/// Build an entity from a raw row, validating declared field types.
	/// Columns without a declaration pass through untouched — projections
	/// and backend-computed columns stay visible.
	pub fn hydrate(self: &Arc<Self>, row: Row) -> Result<Entity> {
		let mut attributes = IndexMap::new();
		for (column, value) in row.columns() {
			let value = match self.fields.get(column) {
				Some(field_type) => field_type.check(column, value.clone())?,
				None => value.clone(),
			};
			attributes.insert(column.clone(), value);
		}
		attributes.sort_keys();
		Ok(Entity::persisted(Arc::clone(self), attributes))
	}

	/// Build a fresh, unpersisted entity from attribute pairs, honoring
	/// mass-assignment protection.
	pub fn make(self: &Arc<Self>, attrs: &[(&str, QueryValue)]) -> Entity {
		let mut entity = Entity::fresh(Arc::clone(self));
		entity.fill(attrs);
		entity
	}
}

/// Builder for [`EntityDescriptor`]
#[derive(Debug)]
pub struct DescriptorBuilder {
	name: String,
	table: String,
	primary_key: String,
	morph_class: Option<String>,
	fields: IndexMap<String, FieldType>,
	fillable: Option<Vec<String>>,
	guarded: Vec<String>,
	timestamps: bool,
	relations: IndexMap<String, Relation>,
}

impl DescriptorBuilder {
	fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			table: table.into(),
			primary_key: "id".to_string(),
			morph_class: None,
			fields: IndexMap::new(),
			fillable: None,
			guarded: Vec::new(),
			timestamps: false,
			relations: IndexMap::new(),
		}
	}

	pub fn primary_key(mut self, column: impl Into<String>) -> Self {
		self.primary_key = column.into();
		self
	}

	pub fn morph_class(mut self, tag: impl Into<String>) -> Self {
		self.morph_class = Some(tag.into());
		self
	}

	pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
		self.fields.insert(name.into(), field_type);
		self
	}

	pub fn fillable(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.fillable = Some(columns.into_iter().map(Into::into).collect());
		self
	}

	pub fn guarded(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.guarded = columns.into_iter().map(Into::into).collect();
		self
	}

	/// Maintain `created_at`/`updated_at` automatically on persist
	pub fn timestamps(mut self) -> Self {
		self.timestamps = true;
		self
	}

	pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
		self.relations.insert(name.into(), relation);
		self
	}

	pub fn has_one(
		self,
		name: impl Into<String>,
		related: impl Into<String>,
		foreign_key: impl Into<String>,
	) -> Self {
		let pk = self.primary_key.clone();
		self.relation(name, Relation::has_one(related, foreign_key, pk))
	}

	pub fn has_many(
		self,
		name: impl Into<String>,
		related: impl Into<String>,
		foreign_key: impl Into<String>,
	) -> Self {
		let pk = self.primary_key.clone();
		self.relation(name, Relation::has_many(related, foreign_key, pk))
	}

	pub fn belongs_to(
		self,
		name: impl Into<String>,
		related: impl Into<String>,
		foreign_key: impl Into<String>,
	) -> Self {
		self.relation(name, Relation::belongs_to(related, foreign_key, "id"))
	}

	pub fn build(self) -> Arc<EntityDescriptor> {
		let morph_class = self.morph_class.unwrap_or_else(|| self.name.clone());
		Arc::new(EntityDescriptor {
			name: self.name,
			table: self.table,
			primary_key: self.primary_key,
			morph_class,
			fields: self.fields,
			fillable: self.fillable,
			guarded: self.guarded,
			timestamps: self.timestamps,
			relations: self.relations,
		})
	}
}

/// Lookup table from entity name (and morph class) to descriptor.
///
/// Populated once per application by the caller and passed into the
/// `Database` context — there is no ambient global registry.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
	by_name: HashMap<String, Arc<EntityDescriptor>>,
	by_morph_class: HashMap<String, Arc<EntityDescriptor>>,
}

impl EntityRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(mut self, descriptor: Arc<EntityDescriptor>) -> Self {
		self.add(descriptor);
		self
	}

	pub fn add(&mut self, descriptor: Arc<EntityDescriptor>) {
		self.by_morph_class
			.insert(descriptor.morph_class().to_string(), Arc::clone(&descriptor));
		self.by_name
			.insert(descriptor.name().to_string(), descriptor);
	}

	pub fn get(&self, name: &str) -> Result<&Arc<EntityDescriptor>> {
		self.by_name
			.get(name)
			.ok_or_else(|| DatabaseError::UnknownEntity(name.to_string()))
	}

	pub fn get_by_morph_class(&self, tag: &str) -> Result<&Arc<EntityDescriptor>> {
		self.by_morph_class
			.get(tag)
			.ok_or_else(|| DatabaseError::UnknownEntity(tag.to_string()))
	}
}
