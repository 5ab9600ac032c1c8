//! Breadth-first eager loading
//!
//! Given a root result set and dot-separated relationship paths, the resolver
//! fetches each path segment as one batched query per owner type (two for
//! pivot associations, one per discriminator value for MorphTo), then merges
//! children onto owners by key equality. Shared prefixes are fetched once,
//! sibling segments are fetched concurrently, and a per-resolution guard
//! keeps any (relation, owner-key) pair from being fetched twice.
//!
//! Failures are isolated per path: one failing segment does not discard the
//! results of its siblings.

use crate::associations::Relation;
use crate::database::Database;
use crate::error::{DatabaseError, Result};
use crate::orm::{Entity, RelationValue};
use crate::query::QueryModel;
use crate::types::{QueryValue, Row};
use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use tracing::{trace, warn};

/// One failed relationship path
#[derive(Debug)]
pub struct PathError {
	pub path: String,
	pub error: DatabaseError,
}

/// Requested paths decomposed into a prefix tree, so "posts" and
/// "posts.comments" share one fetch of "posts"
#[derive(Debug, Default)]
struct PathNode {
	children: IndexMap<String, PathNode>,
}

fn build_tree(paths: &[String]) -> IndexMap<String, PathNode> {
	let mut root: IndexMap<String, PathNode> = IndexMap::new();
	for path in paths {
		let mut cursor = &mut root;
		for segment in path.split('.').filter(|s| !s.is_empty()) {
			cursor = &mut cursor
				.entry(segment.to_string())
				.or_insert_with(PathNode::default)
				.children;
		}
	}
	root
}

/// Children fetched for one path segment, grouped per owner bucket
struct FetchedRelation {
	returns_many: bool,
	by_owner: IndexMap<String, Vec<Entity>>,
}

/// Bucket id for one owner: descriptor-scoped so polymorphic frontiers with
/// colliding key values cannot cross-contaminate
fn bucket(scope: &str, key: &str) -> String {
	format!("{scope}\u{0}{key}")
}

/// Per-call resolver state. The `fetched` guard doubles as a cache: a
/// (relation, owner-key) pair fetched once is served from memory when another
/// path reaches it again.
pub struct EagerLoadResolver<'db> {
	db: &'db Database,
	fetched: DashMap<(String, String), Vec<Entity>>,
}

impl<'db> EagerLoadResolver<'db> {
	pub fn new(db: &'db Database) -> Self {
		Self {
			db,
			fetched: DashMap::new(),
		}
	}

	/// Resolve every requested path onto `roots`, returning one error per
	/// failed path. Successfully resolved relations stay populated on the
	/// entities regardless of sibling failures.
	pub async fn resolve(&self, roots: &mut Vec<Entity>, paths: &[String]) -> Vec<PathError> {
		let tree = build_tree(paths);
		self.resolve_level(roots, &tree, "").await
	}

	/// Resolve one tree level: concurrent fetch per sibling segment, then
	/// sequential recursion and merge. Merging happens only after a segment's
	/// whole subtree resolved, so a dropped future never leaves a
	/// half-populated relation slot behind.
	fn resolve_level<'a>(
		&'a self,
		entities: &'a mut Vec<Entity>,
		nodes: &'a IndexMap<String, PathNode>,
		prefix: &'a str,
	) -> BoxFuture<'a, Vec<PathError>> {
		Box::pin(async move {
			let mut errors = Vec::new();
			if entities.is_empty() || nodes.is_empty() {
				return errors;
			}

			let frontier: &[Entity] = entities.as_slice();
			let outcomes = futures::future::join_all(
				nodes.keys().map(|name| self.fetch_relation(frontier, name)),
			)
			.await;

			for ((name, node), outcome) in nodes.iter().zip(outcomes) {
				let full_path = if prefix.is_empty() {
					name.clone()
				} else {
					format!("{prefix}.{name}")
				};
				match outcome {
					Err(error) => {
						warn!(path = %full_path, %error, "eager load path failed");
						errors.push(PathError {
							path: full_path,
							error,
						});
					}
					Ok(fetch) => {
						let merged = self
							.descend_and_merge(entities, name, &full_path, node, fetch, &mut errors)
							.await;
						trace!(path = %full_path, owners = merged, "merged relation");
					}
				}
			}

			errors
		})
	}

	/// Recurse into deeper segments on the fetched children, then distribute
	/// them onto their owners
	async fn descend_and_merge(
		&self,
		entities: &mut Vec<Entity>,
		name: &str,
		full_path: &str,
		node: &PathNode,
		fetch: FetchedRelation,
		errors: &mut Vec<PathError>,
	) -> usize {
		let FetchedRelation {
			returns_many,
			by_owner,
		} = fetch;

		// Flatten for recursion, remembering per-owner extents
		let mut layout = Vec::with_capacity(by_owner.len());
		let mut flat = Vec::new();
		for (owner_bucket, children) in by_owner {
			layout.push((owner_bucket, children.len()));
			flat.extend(children);
		}

		if !node.children.is_empty() {
			let child_errors = self.resolve_level(&mut flat, &node.children, full_path).await;
			errors.extend(child_errors);
		}

		let mut by_owner: IndexMap<String, Vec<Entity>> = IndexMap::with_capacity(layout.len());
		let mut rest = flat;
		for (owner_bucket, count) in layout {
			let tail = rest.split_off(count);
			by_owner.insert(owner_bucket, rest);
			rest = tail;
		}

		// Distribute by key equality — each matching owner gets its own copy,
		// owners whose type declares the relation but matched nothing get an
		// explicit empty slot.
		let mut merged = 0usize;
		for owner in entities.iter_mut() {
			let Ok(relation) = owner.descriptor().relation(name).cloned() else {
				continue;
			};
			let children = owner_bucket_for(owner, &relation)
				.and_then(|b| by_owner.get(&b).cloned())
				.unwrap_or_default();
			let value = if returns_many {
				RelationValue::Many(children)
			} else {
				RelationValue::One(children.into_iter().next().map(Box::new))
			};
			owner.set_relation(name, value);
			merged += 1;
		}
		merged
	}

	/// Fetch one segment for the whole frontier.
	///
	/// Owners are grouped by entity type: each declaring type contributes one
	/// batched query (polymorphic shapes filter on that type's tag). A
	/// frontier where no type declares the relation is an error for the path.
	async fn fetch_relation(&self, owners: &[Entity], name: &str) -> Result<FetchedRelation> {
		let mut relation: Option<Relation> = None;
		for owner in owners {
			if let Ok(found) = owner.descriptor().relation(name) {
				relation = Some(found.clone());
				break;
			}
		}
		let Some(relation) = relation else {
			let entity = owners
				.first()
				.map(|o| o.descriptor().name().to_string())
				.unwrap_or_default();
			return Err(DatabaseError::RelationNotConfigured {
				relation: name.to_string(),
				entity,
			});
		};

		match relation {
			Relation::MorphTo(_) => self.fetch_morph_to(owners, name).await,
			Relation::BelongsToMany(_) => self.fetch_pivot(owners, name).await,
			other => {
				self.fetch_direct(owners, name, other.returns_many())
					.await
			}
		}
	}

	/// Single-hop shapes: HasOne/HasMany/BelongsTo/MorphOne/MorphMany
	async fn fetch_direct(
		&self,
		owners: &[Entity],
		name: &str,
		returns_many: bool,
	) -> Result<FetchedRelation> {
		let mut by_owner: IndexMap<String, Vec<Entity>> = IndexMap::new();

		for group in group_owners(owners, name) {
			let relation = &group.relation;
			let (Some(related_name), Some(match_column)) =
				(relation.related(), relation.related_match_column())
			else {
				continue;
			};
			let match_column = match_column.to_string();
			let related = self.db.registry().get(related_name)?.clone();
			let scope = group.guard_scope(name);

			let missing = self.keys_to_fetch(&scope, &group.keys);
			if !missing.is_empty() {
				let model = relation.constrain_for_many(
					related.table(),
					group.values_for(&missing),
					&group.morph_class,
				);
				let rows = self.run_select(&model).await?;

				let mut grouped: IndexMap<String, Vec<Entity>> = IndexMap::new();
				for row in rows {
					let entity = related.hydrate(row)?;
					let Some(key) = entity.get(&match_column) else {
						continue;
					};
					grouped.entry(key.key_repr()).or_default().push(entity);
				}
				self.store_fetched(&scope, &missing, grouped);
			}

			for key in &group.keys {
				let children = self.fetched_children(&scope, key);
				by_owner.insert(bucket(&group.scope, key), children);
			}
		}

		Ok(FetchedRelation {
			returns_many,
			by_owner,
		})
	}

	/// Pivot shape: one query against the pivot table, one against the
	/// related table, mapping through the pivot pairs in pivot row order
	async fn fetch_pivot(&self, owners: &[Entity], name: &str) -> Result<FetchedRelation> {
		let mut by_owner: IndexMap<String, Vec<Entity>> = IndexMap::new();

		for group in group_owners(owners, name) {
			let Relation::BelongsToMany(shape) = &group.relation else {
				continue;
			};
			let related = self.db.registry().get(&shape.related)?.clone();
			let scope = group.guard_scope(name);

			let missing = self.keys_to_fetch(&scope, &group.keys);
			if !missing.is_empty() {
				let pivot_model = group.relation.constrain_for_many(
					related.table(),
					group.values_for(&missing),
					&group.morph_class,
				);
				let pivot_rows = self.run_select(&pivot_model).await?;

				let pairs: Vec<(String, QueryValue)> = pivot_rows
					.iter()
					.filter_map(|row| {
						let owner_key = row.get(&shape.foreign_pivot_key)?.key_repr();
						let related_id = row.get(&shape.related_pivot_key)?.clone();
						Some((owner_key, related_id))
					})
					.collect();

				let mut related_ids: IndexSet<String> = IndexSet::new();
				let mut id_values = Vec::new();
				for (_, id) in &pairs {
					if related_ids.insert(id.key_repr()) {
						id_values.push(id.clone());
					}
				}

				let mut related_by_id: IndexMap<String, Entity> = IndexMap::new();
				if !id_values.is_empty() {
					let related_model = group
						.relation
						.constrain_related_by_ids(related.table(), id_values);
					for row in self.run_select(&related_model).await? {
						let entity = related.hydrate(row)?;
						if let Some(id) = entity.get(&shape.related_key) {
							related_by_id.insert(id.key_repr(), entity);
						}
					}
				}

				let mut grouped: IndexMap<String, Vec<Entity>> = IndexMap::new();
				for (owner_key, related_id) in pairs {
					if let Some(entity) = related_by_id.get(&related_id.key_repr()) {
						grouped.entry(owner_key).or_default().push(entity.clone());
					}
				}
				self.store_fetched(&scope, &missing, grouped);
			}

			for key in &group.keys {
				let children = self.fetched_children(&scope, key);
				by_owner.insert(bucket(&group.scope, key), children);
			}
		}

		Ok(FetchedRelation {
			returns_many: true,
			by_owner,
		})
	}

	/// MorphTo: owners carry (type tag, id); one query per distinct tag,
	/// resolved through the registry's morph-class index
	async fn fetch_morph_to(&self, owners: &[Entity], name: &str) -> Result<FetchedRelation> {
		let mut by_owner: IndexMap<String, Vec<Entity>> = IndexMap::new();

		// (tag -> distinct id reprs with their values), collected in frontier order
		let mut tags: IndexMap<String, (IndexSet<String>, Vec<QueryValue>)> = IndexMap::new();
		let mut declared = false;
		for owner in owners {
			let Ok(Relation::MorphTo(shape)) = owner.descriptor().relation(name) else {
				continue;
			};
			declared = true;
			let Some(QueryValue::String(tag)) = owner.get(&shape.morph_type) else {
				continue;
			};
			let Some(id) = owner.get(&shape.morph_id) else {
				continue;
			};
			if id.is_null() {
				continue;
			}
			let (reprs, values) = tags.entry(tag.clone()).or_default();
			if reprs.insert(id.key_repr()) {
				values.push(id.clone());
			}
		}
		if !declared {
			let entity = owners
				.first()
				.map(|o| o.descriptor().name().to_string())
				.unwrap_or_default();
			return Err(DatabaseError::RelationNotConfigured {
				relation: name.to_string(),
				entity,
			});
		}

		for (tag, (reprs, values)) in &tags {
			let target = self.db.registry().get_by_morph_class(tag)?.clone();
			let scope = format!("morph_to:{tag}.{name}");
			let keys: Vec<String> = reprs.iter().cloned().collect();

			let missing = self.keys_to_fetch(&scope, &keys);
			if !missing.is_empty() {
				let missing_values: Vec<QueryValue> = values
					.iter()
					.filter(|v| missing.contains(&v.key_repr()))
					.cloned()
					.collect();
				let mut model = QueryModel::new(target.table());
				model.push_where(crate::query::WhereClause::In {
					column: target.primary_key().to_string(),
					values: missing_values,
				});
				let rows = self.run_select(&model).await?;

				let mut grouped: IndexMap<String, Vec<Entity>> = IndexMap::new();
				for row in rows {
					let entity = target.hydrate(row)?;
					let Some(id) = entity.get(target.primary_key()) else {
						continue;
					};
					grouped.entry(id.key_repr()).or_default().push(entity);
				}
				self.store_fetched(&scope, &missing, grouped);
			}

			for key in &keys {
				let children = self.fetched_children(&scope, key);
				by_owner.insert(bucket(&format!("morph_to:{tag}"), key), children);
			}
		}

		Ok(FetchedRelation {
			returns_many: false,
			by_owner,
		})
	}

	/// Keys not yet covered by the duplicate-fetch guard
	fn keys_to_fetch(&self, scope: &str, keys: &[String]) -> IndexSet<String> {
		keys.iter()
			.filter(|key| !self.fetched.contains_key(&(scope.to_string(), (*key).clone())))
			.cloned()
			.collect()
	}

	/// Record fetched children per owner key, including explicit empties so
	/// the guard also suppresses refetching keys that matched nothing
	fn store_fetched(
		&self,
		scope: &str,
		keys: &IndexSet<String>,
		mut grouped: IndexMap<String, Vec<Entity>>,
	) {
		for key in keys {
			let children = grouped.shift_remove(key).unwrap_or_default();
			self.fetched
				.insert((scope.to_string(), key.clone()), children);
		}
	}

	fn fetched_children(&self, scope: &str, key: &str) -> Vec<Entity> {
		self.fetched
			.get(&(scope.to_string(), key.to_string()))
			.map(|entry| entry.value().clone())
			.unwrap_or_default()
	}

	async fn run_select(&self, model: &QueryModel) -> Result<Vec<Row>> {
		let schema = self.db.table_schema(&model.table)?;
		let statement = self.db.grammar().compile_select(model, &schema)?;
		self.db.connection().fetch_all(&statement).await
	}
}

/// Owners sharing one entity type, with their distinct key values
struct OwnerGroup {
	scope: String,
	morph_class: String,
	relation: Relation,
	keys: Vec<String>,
	key_values: Vec<QueryValue>,
}

impl OwnerGroup {
	fn guard_scope(&self, name: &str) -> String {
		format!("{}.{name}", self.scope)
	}

	/// Key values whose canonical repr appears in `missing`, in key order
	fn values_for(&self, missing: &IndexSet<String>) -> Vec<QueryValue> {
		self.key_values
			.iter()
			.filter(|value| missing.contains(&value.key_repr()))
			.cloned()
			.collect()
	}
}

/// Group a frontier by descriptor, keeping only owners whose type declares
/// the relation and carries a non-null key
fn group_owners(owners: &[Entity], name: &str) -> Vec<OwnerGroup> {
	let mut groups: IndexMap<String, OwnerGroup> = IndexMap::new();
	for owner in owners {
		let Ok(relation) = owner.descriptor().relation(name) else {
			continue;
		};
		let Some(key_column) = relation.owner_key_column() else {
			continue;
		};
		let Some(key) = owner.get(key_column) else {
			continue;
		};
		if key.is_null() {
			continue;
		}
		let scope = owner.descriptor().name().to_string();
		let group = groups.entry(scope.clone()).or_insert_with(|| OwnerGroup {
			scope,
			morph_class: owner.descriptor().morph_class().to_string(),
			relation: relation.clone(),
			keys: Vec::new(),
			key_values: Vec::new(),
		});
		let repr = key.key_repr();
		if !group.keys.contains(&repr) {
			group.keys.push(repr);
			group.key_values.push(key.clone());
		}
	}
	groups.into_values().collect()
}

/// Bucket an owner will look its children up under after a fetch
fn owner_bucket_for(owner: &Entity, relation: &Relation) -> Option<String> {
	match relation {
		Relation::MorphTo(shape) => {
			let QueryValue::String(tag) = owner.get(&shape.morph_type)? else {
				return None;
			};
			let id = owner.get(&shape.morph_id)?;
			if id.is_null() {
				return None;
			}
			Some(bucket(&format!("morph_to:{tag}"), &id.key_repr()))
		}
		_ => {
			let column = relation.owner_key_column()?;
			let key = owner.get(column)?;
			if key.is_null() {
				return None;
			}
			Some(bucket(owner.descriptor().name(), &key.key_repr()))
		}
	}
}
