//! Relationship descriptors
//!
//! One descriptor per association. Each knows how to constrain a query model
//! to the rows related to a single owner (lazy load) or to a batch of owners
//! (eager load) without re-deriving the key logic, and which columns tie a
//! related row back to its owner when results are merged.
//!
//! The store behind the wide-column dialect cannot join, so `BelongsToMany`
//! is expressed as two single-table hops (pivot, then related-by-ids); the
//! descriptor builds both models and the accessor/resolver sequence them.

pub mod accessor;

pub use accessor::RelationAccessor;

use crate::query::{Operator, QueryModel, WhereClause};
use crate::types::QueryValue;
use serde::{Deserialize, Serialize};

/// Has-one / has-many payload: the related table carries the foreign key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HasShape {
	pub related: String,
	pub foreign_key: String,
	pub local_key: String,
}

/// Belongs-to payload: the owner carries the foreign key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BelongsToShape {
	pub related: String,
	pub foreign_key: String,
	pub owner_key: String,
}

/// Many-to-many payload: a pivot table carries both foreign keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotShape {
	pub related: String,
	pub pivot_table: String,
	pub foreign_pivot_key: String,
	pub related_pivot_key: String,
	pub parent_key: String,
	pub related_key: String,
}

/// Polymorphic one/many payload: the related table carries a foreign key and
/// a type-discriminator column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphShape {
	pub related: String,
	pub morph_type: String,
	pub morph_id: String,
	pub local_key: String,
}

/// Polymorphic belongs-to payload: the owner carries the discriminator and id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphToShape {
	pub morph_type: String,
	pub morph_id: String,
}

/// Tagged descriptor over every supported association shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Relation {
	HasOne(HasShape),
	HasMany(HasShape),
	BelongsTo(BelongsToShape),
	BelongsToMany(PivotShape),
	MorphOne(MorphShape),
	MorphMany(MorphShape),
	MorphTo(MorphToShape),
}

impl Relation {
	pub fn has_one(
		related: impl Into<String>,
		foreign_key: impl Into<String>,
		local_key: impl Into<String>,
	) -> Self {
		Relation::HasOne(HasShape {
			related: related.into(),
			foreign_key: foreign_key.into(),
			local_key: local_key.into(),
		})
	}

	pub fn has_many(
		related: impl Into<String>,
		foreign_key: impl Into<String>,
		local_key: impl Into<String>,
	) -> Self {
		Relation::HasMany(HasShape {
			related: related.into(),
			foreign_key: foreign_key.into(),
			local_key: local_key.into(),
		})
	}

	pub fn belongs_to(
		related: impl Into<String>,
		foreign_key: impl Into<String>,
		owner_key: impl Into<String>,
	) -> Self {
		Relation::BelongsTo(BelongsToShape {
			related: related.into(),
			foreign_key: foreign_key.into(),
			owner_key: owner_key.into(),
		})
	}

	pub fn belongs_to_many(
		related: impl Into<String>,
		pivot_table: impl Into<String>,
		foreign_pivot_key: impl Into<String>,
		related_pivot_key: impl Into<String>,
	) -> Self {
		Relation::BelongsToMany(PivotShape {
			related: related.into(),
			pivot_table: pivot_table.into(),
			foreign_pivot_key: foreign_pivot_key.into(),
			related_pivot_key: related_pivot_key.into(),
			parent_key: "id".to_string(),
			related_key: "id".to_string(),
		})
	}

	/// Polymorphic one: `{morph_name}_type` / `{morph_name}_id` columns on
	/// the related table
	pub fn morph_one(
		related: impl Into<String>,
		morph_name: &str,
		local_key: impl Into<String>,
	) -> Self {
		Relation::MorphOne(MorphShape {
			related: related.into(),
			morph_type: format!("{morph_name}_type"),
			morph_id: format!("{morph_name}_id"),
			local_key: local_key.into(),
		})
	}

	pub fn morph_many(
		related: impl Into<String>,
		morph_name: &str,
		local_key: impl Into<String>,
	) -> Self {
		Relation::MorphMany(MorphShape {
			related: related.into(),
			morph_type: format!("{morph_name}_type"),
			morph_id: format!("{morph_name}_id"),
			local_key: local_key.into(),
		})
	}

	pub fn morph_to(morph_name: &str) -> Self {
		Relation::MorphTo(MorphToShape {
			morph_type: format!("{morph_name}_type"),
			morph_id: format!("{morph_name}_id"),
		})
	}

	/// Name of the related entity type; `None` for MorphTo, whose target is
	/// decided per row by the discriminator column
	pub fn related(&self) -> Option<&str> {
		match self {
			Relation::HasOne(shape) | Relation::HasMany(shape) => Some(&shape.related),
			Relation::BelongsTo(shape) => Some(&shape.related),
			Relation::BelongsToMany(shape) => Some(&shape.related),
			Relation::MorphOne(shape) | Relation::MorphMany(shape) => Some(&shape.related),
			Relation::MorphTo(_) => None,
		}
	}

	/// Whether the loaded slot holds a collection or a single entity
	pub fn returns_many(&self) -> bool {
		matches!(
			self,
			Relation::HasMany(_) | Relation::BelongsToMany(_) | Relation::MorphMany(_)
		)
	}

	/// Owner-side column whose value keys this relation; `None` for MorphTo
	/// (composite type + id key, handled by the caller)
	pub fn owner_key_column(&self) -> Option<&str> {
		match self {
			Relation::HasOne(shape) | Relation::HasMany(shape) => Some(&shape.local_key),
			Relation::BelongsTo(shape) => Some(&shape.foreign_key),
			Relation::BelongsToMany(shape) => Some(&shape.parent_key),
			Relation::MorphOne(shape) | Relation::MorphMany(shape) => Some(&shape.local_key),
			Relation::MorphTo(_) => None,
		}
	}

	/// Related-side column whose value points back at the owner; `None` for
	/// BelongsToMany (pivot pairs carry the mapping) and MorphTo
	pub fn related_match_column(&self) -> Option<&str> {
		match self {
			Relation::HasOne(shape) | Relation::HasMany(shape) => Some(&shape.foreign_key),
			Relation::BelongsTo(shape) => Some(&shape.owner_key),
			Relation::MorphOne(shape) | Relation::MorphMany(shape) => Some(&shape.morph_id),
			Relation::BelongsToMany(_) | Relation::MorphTo(_) => None,
		}
	}

	/// Constrain the related table to the rows belonging to one owner key.
	///
	/// `owner_morph_class` is the owner's type tag, written into the
	/// discriminator filter by the polymorphic shapes and ignored elsewhere.
	pub fn constrain_for_one(
		&self,
		related_table: &str,
		key: QueryValue,
		owner_morph_class: &str,
	) -> QueryModel {
		self.constrain_for_many(related_table, vec![key], owner_morph_class)
	}

	/// Constrain a single query to the rows belonging to a batch of owners.
	///
	/// Always one `IN` clause over the foreign key — never one query per
	/// owner. For `BelongsToMany` the returned model targets the pivot
	/// table; chain [`Relation::constrain_related_by_ids`] for the second
	/// hop. Not defined for `MorphTo`, whose batch shape is one query per
	/// distinct discriminator value (built by the caller from the registry).
	pub fn constrain_for_many(
		&self,
		related_table: &str,
		keys: Vec<QueryValue>,
		owner_morph_class: &str,
	) -> QueryModel {
		match self {
			Relation::HasOne(shape) | Relation::HasMany(shape) => {
				let mut model = QueryModel::new(related_table);
				model.push_where(WhereClause::In {
					column: shape.foreign_key.clone(),
					values: keys,
				});
				model
			}
			Relation::BelongsTo(shape) => {
				let mut model = QueryModel::new(related_table);
				model.push_where(WhereClause::In {
					column: shape.owner_key.clone(),
					values: keys,
				});
				model
			}
			Relation::BelongsToMany(shape) => {
				let mut model = QueryModel::new(&shape.pivot_table);
				model.push_where(WhereClause::In {
					column: shape.foreign_pivot_key.clone(),
					values: keys,
				});
				model
			}
			Relation::MorphOne(shape) | Relation::MorphMany(shape) => {
				let mut model = QueryModel::new(related_table);
				model.push_where(WhereClause::Basic {
					column: shape.morph_type.clone(),
					op: Operator::Eq,
					value: QueryValue::String(owner_morph_class.to_string()),
				});
				model.push_where(WhereClause::In {
					column: shape.morph_id.clone(),
					values: keys,
				});
				model
			}
			Relation::MorphTo(_) => {
				unreachable!("MorphTo batches are grouped per discriminator by the resolver")
			}
		}
	}

	/// Second hop of a pivot association: related rows by collected ids
	pub fn constrain_related_by_ids(
		&self,
		related_table: &str,
		ids: Vec<QueryValue>,
	) -> QueryModel {
		let related_key = match self {
			Relation::BelongsToMany(shape) => shape.related_key.clone(),
			_ => "id".to_string(),
		};
		let mut model = QueryModel::new(related_table);
		model.push_where(WhereClause::In {
			column: related_key,
			values: ids,
		});
		model
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn has_many_batch_constraint_is_one_in_clause() {
		let relation = Relation::has_many("post", "user_id", "id");
		let model = relation.constrain_for_many(
			"posts",
			vec![QueryValue::Int(1), QueryValue::Int(2), QueryValue::Int(3)],
			"user",
		);

		assert_eq!(model.table, "posts");
		assert_eq!(model.wheres.len(), 1);
		assert!(matches!(
			&model.wheres[0],
			WhereClause::In { column, values } if column == "user_id" && values.len() == 3
		));
	}

	#[test]
	fn morph_many_constraint_filters_discriminator() {
		let relation = Relation::morph_many("comment", "commentable", "id");
		let model = relation.constrain_for_many("comments", vec![QueryValue::Int(7)], "post");

		assert_eq!(model.wheres.len(), 2);
		assert!(matches!(
			&model.wheres[0],
			WhereClause::Basic { column, value, .. }
				if column == "commentable_type" && *value == QueryValue::String("post".into())
		));
		assert!(matches!(
			&model.wheres[1],
			WhereClause::In { column, .. } if column == "commentable_id"
		));
	}

	#[test]
	fn belongs_to_many_first_hop_targets_pivot() {
		let relation = Relation::belongs_to_many("role", "role_user", "user_id", "role_id");
		let model = relation.constrain_for_many("roles", vec![QueryValue::Int(4)], "user");

		assert_eq!(model.table, "role_user");
		assert!(matches!(
			&model.wheres[0],
			WhereClause::In { column, .. } if column == "user_id"
		));

		let second = relation.constrain_related_by_ids("roles", vec![QueryValue::Int(9)]);
		assert_eq!(second.table, "roles");
	}
}
