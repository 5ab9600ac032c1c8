//! Read-only table metadata consulted by the grammars for legality checks
//!
//! The schema/migration DSL lives outside this crate; what the grammars need
//! from it is the partition-key, clustering-key and secondary-index column
//! lists per table. A `SchemaCatalog` is built once by the caller and handed
//! to the `Database` context.

use crate::query::Direction;
use std::collections::HashMap;

/// One clustering-key column with its declared sort order
#[derive(Debug, Clone)]
pub struct ClusteringColumn {
	pub name: String,
	pub order: Direction,
}

/// Key and index metadata for a single table
#[derive(Debug, Clone)]
pub struct TableSchema {
	name: String,
	partition_key: Vec<String>,
	clustering_key: Vec<ClusteringColumn>,
	indexed: Vec<String>,
}

impl TableSchema {
	/// Metadata for a wide-column table
	pub fn new(
		name: impl Into<String>,
		partition_key: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self {
			name: name.into(),
			partition_key: partition_key.into_iter().map(Into::into).collect(),
			clustering_key: Vec::new(),
			indexed: Vec::new(),
		}
	}

	/// Metadata for a relational table, where key placement does not
	/// restrict predicates or ordering
	pub fn relational(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			partition_key: Vec::new(),
			clustering_key: Vec::new(),
			indexed: Vec::new(),
		}
	}

	pub fn clustering(mut self, column: impl Into<String>, order: Direction) -> Self {
		self.clustering_key.push(ClusteringColumn {
			name: column.into(),
			order,
		});
		self
	}

	pub fn indexed(mut self, column: impl Into<String>) -> Self {
		self.indexed.push(column.into());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn partition_key(&self) -> &[String] {
		&self.partition_key
	}

	pub fn clustering_key(&self) -> &[ClusteringColumn] {
		&self.clustering_key
	}

	pub fn is_partition_column(&self, column: &str) -> bool {
		self.partition_key.iter().any(|c| c == column)
	}

	pub fn is_clustering_column(&self, column: &str) -> bool {
		self.clustering_key.iter().any(|c| c.name == column)
	}

	pub fn is_indexed_column(&self, column: &str) -> bool {
		self.indexed.iter().any(|c| c == column)
	}

	/// Partition key, clustering key or secondary index membership — the
	/// set of columns a wide-column backend can seek on
	pub fn is_seekable_column(&self, column: &str) -> bool {
		self.is_partition_column(column)
			|| self.is_clustering_column(column)
			|| self.is_indexed_column(column)
	}

	/// Partition or clustering key membership — the columns legal in
	/// wide-column UPDATE/DELETE predicates
	pub fn is_primary_key_column(&self, column: &str) -> bool {
		self.is_partition_column(column) || self.is_clustering_column(column)
	}
}

/// Collection of table schemas for one keyspace/database
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
	tables: HashMap<String, TableSchema>,
}

impl SchemaCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(mut self, table: TableSchema) -> Self {
		self.tables.insert(table.name().to_string(), table);
		self
	}

	pub fn add(&mut self, table: TableSchema) {
		self.tables.insert(table.name().to_string(), table);
	}

	pub fn table(&self, name: &str) -> Option<&TableSchema> {
		self.tables.get(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn seekable_covers_keys_and_indexes() {
		let schema = TableSchema::new("events", ["tenant_id"])
			.clustering("occurred_at", Direction::Desc)
			.indexed("kind");

		assert!(schema.is_seekable_column("tenant_id"));
		assert!(schema.is_seekable_column("occurred_at"));
		assert!(schema.is_seekable_column("kind"));
		assert!(!schema.is_seekable_column("payload"));
		assert!(schema.is_primary_key_column("occurred_at"));
		assert!(!schema.is_primary_key_column("kind"));
	}
}
