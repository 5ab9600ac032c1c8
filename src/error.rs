//! Unified error type for query compilation, execution and relationship loading

use crate::eager::PathError;
use crate::orm::Entity;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Aggregate payload for a partially failed eager load.
///
/// Carries the root entities so that relations resolved before (or beside)
/// the failing paths are not discarded along with the error.
#[derive(Debug)]
pub struct PartialEagerLoad {
	/// Root entities with every successfully resolved relation populated
	pub entities: Vec<Entity>,
	/// One error per failed relationship path
	pub errors: Vec<PathError>,
}

/// Errors surfaced by the query pipeline and the relationship resolver
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
	/// Illegal predicate, ordering or projection for the active dialect.
	/// Always raised before any driver call.
	#[error("Compile error: {0}")]
	Compile(String),

	/// Strict lookup found no row. Distinct from an empty result, which is
	/// not an error.
	#[error("No {entity} found for key {key}")]
	NotFound { entity: String, key: String },

	/// Backend failure, propagated with the driver's native message
	#[error("Driver error: {0}")]
	Driver(String),

	/// A requested relationship path names a relation the entity type does
	/// not declare
	#[error("Relation `{relation}` is not configured for entity `{entity}`")]
	RelationNotConfigured { relation: String, entity: String },

	/// One or more relationship paths failed while siblings resolved
	#[error("Eager load failed for {} path(s)", .0.errors.len())]
	PartialEagerLoad(Box<PartialEagerLoad>),

	/// Entity name not present in the registry
	#[error("Unknown entity type `{0}`")]
	UnknownEntity(String),

	/// Table not present in the schema catalog (required by the wide-column
	/// dialect for predicate/order validation)
	#[error("Unknown table `{0}` in schema catalog")]
	UnknownTable(String),

	/// Value did not match the declared field type during hydration
	#[error("Type error: {0}")]
	Type(String),

	/// Row is missing an expected column
	#[error("Column `{0}` not found in row")]
	ColumnNotFound(String),

	/// Invalid connection or context configuration
	#[error("Configuration error: {0}")]
	Config(String),
}

impl DatabaseError {
	/// True when the error was raised by compilation, before any I/O
	pub fn is_compile(&self) -> bool {
		matches!(self, DatabaseError::Compile(_))
	}
}

impl From<serde_json::Error> for DatabaseError {
	fn from(err: serde_json::Error) -> Self {
		DatabaseError::Type(err.to_string())
	}
}
