//! Attribute bags with original-state tracking and a relation cache

use crate::orm::descriptor::EntityDescriptor;
use crate::types::QueryValue;
use indexmap::IndexMap;
use std::sync::Arc;

/// A loaded association stored on an entity
#[derive(Debug, Clone)]
pub enum RelationValue {
	/// Single related entity (HasOne, BelongsTo, MorphOne, MorphTo)
	One(Option<Box<Entity>>),
	/// Related collection (HasMany, BelongsToMany, MorphMany)
	Many(Vec<Entity>),
}

/// One database row as a typed attribute bag.
///
/// Three attribute views: `attributes` (current), `original` (last persisted
/// snapshot, refreshed on every successful persist) and `relations` (cache of
/// loaded associations keyed by relation name). A relation slot is either
/// fully populated or absent — the resolver never leaves a half-merged slot.
#[derive(Debug, Clone)]
pub struct Entity {
	descriptor: Arc<EntityDescriptor>,
	attributes: IndexMap<String, QueryValue>,
	original: IndexMap<String, QueryValue>,
	relations: IndexMap<String, RelationValue>,
	exists: bool,
}

impl Entity {
	/// Entity hydrated from a persisted row; `original` mirrors `attributes`
	pub(crate) fn persisted(
		descriptor: Arc<EntityDescriptor>,
		attributes: IndexMap<String, QueryValue>,
	) -> Self {
		Self {
			original: attributes.clone(),
			attributes,
			descriptor,
			relations: IndexMap::new(),
			exists: true,
		}
	}

	/// Entity not yet stored; everything is dirty until the first save
	pub(crate) fn fresh(descriptor: Arc<EntityDescriptor>) -> Self {
		Self {
			descriptor,
			attributes: IndexMap::new(),
			original: IndexMap::new(),
			relations: IndexMap::new(),
			exists: false,
		}
	}

	pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
		&self.descriptor
	}

	pub fn exists(&self) -> bool {
		self.exists
	}

	pub fn get(&self, column: &str) -> Option<&QueryValue> {
		self.attributes.get(column)
	}

	/// Set one attribute directly, bypassing mass-assignment protection
	pub fn set(&mut self, column: impl Into<String>, value: impl Into<QueryValue>) {
		self.attributes.insert(column.into(), value.into());
	}

	/// Mass-assign attributes. Columns rejected by the descriptor's
	/// fillable/guarded lists are silently dropped.
	pub fn fill(&mut self, attrs: &[(&str, QueryValue)]) {
		for (column, value) in attrs {
			if self.descriptor.is_fillable(column) {
				self.attributes.insert((*column).to_string(), value.clone());
			}
		}
	}

	pub fn attributes(&self) -> &IndexMap<String, QueryValue> {
		&self.attributes
	}

	/// Pre-mutation snapshot of one attribute
	pub fn get_original(&self, column: &str) -> Option<&QueryValue> {
		self.original.get(column)
	}

	/// Compare current attributes against the persisted snapshot
	pub fn is_dirty(&self, columns: Option<&[&str]>) -> bool {
		match columns {
			Some(columns) => columns
				.iter()
				.any(|c| self.attributes.get(*c) != self.original.get(*c)),
			None => {
				self.attributes.len() != self.original.len()
					|| self
						.attributes
						.iter()
						.any(|(c, v)| self.original.get(c) != Some(v))
			}
		}
	}

	/// Attributes that differ from the persisted snapshot, in attribute order
	pub fn dirty_attributes(&self) -> Vec<(String, QueryValue)> {
		self.attributes
			.iter()
			.filter(|(column, value)| self.original.get(*column) != Some(value))
			.map(|(column, value)| (column.clone(), value.clone()))
			.collect()
	}

	/// Adopt the current attributes as the persisted snapshot
	pub fn sync_original(&mut self) {
		self.original = self.attributes.clone();
		self.exists = true;
	}

	pub fn primary_key(&self) -> Option<&QueryValue> {
		self.attributes.get(self.descriptor.primary_key())
	}

	pub fn relation(&self, name: &str) -> Option<&RelationValue> {
		self.relations.get(name)
	}

	pub fn relation_loaded(&self, name: &str) -> bool {
		self.relations.contains_key(name)
	}

	pub fn set_relation(&mut self, name: impl Into<String>, value: RelationValue) {
		self.relations.insert(name.into(), value);
	}

	/// Remove and return a loaded relation slot
	pub fn take_relation(&mut self, name: &str) -> Option<RelationValue> {
		self.relations.shift_remove(name)
	}

	/// Loaded related collection, empty when the relation is absent or
	/// single-valued and unset
	pub fn related_many(&self, name: &str) -> &[Entity] {
		match self.relations.get(name) {
			Some(RelationValue::Many(entities)) => entities,
			_ => &[],
		}
	}

	/// Loaded single related entity, if any
	pub fn related_one(&self, name: &str) -> Option<&Entity> {
		match self.relations.get(name) {
			Some(RelationValue::One(entity)) => entity.as_deref(),
			Some(RelationValue::Many(entities)) => entities.first(),
			None => None,
		}
	}

	/// JSON export of attributes and loaded relations
	pub fn to_json(&self) -> serde_json::Value {
		let mut map = serde_json::Map::new();
		for (column, value) in &self.attributes {
			map.insert(column.clone(), value.to_json());
		}
		for (name, relation) in &self.relations {
			let value = match relation {
				RelationValue::One(Some(entity)) => entity.to_json(),
				RelationValue::One(None) => serde_json::Value::Null,
				RelationValue::Many(entities) => {
					serde_json::Value::Array(entities.iter().map(Entity::to_json).collect())
				}
			};
			map.insert(name.clone(), value);
		}
		serde_json::Value::Object(map)
	}
}
