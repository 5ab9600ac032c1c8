//! Common value, row and result types shared by every backend

use crate::error::DatabaseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Backend dialect selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialectKind {
	/// Wide-column store speaking CQL (partition/clustering key semantics)
	WideColumn,
	/// PostgreSQL-compatible relational backend
	Postgres,
}

/// Query value types carried as statement bindings and row cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	Uuid(uuid::Uuid),
	Timestamp(chrono::DateTime<chrono::Utc>),
}

impl QueryValue {
	/// Canonical textual form, used for key matching during relation merges
	/// and for cache fingerprints. Matching related rows to owners goes
	/// through this representation so that merge results do not depend on
	/// arrival order or map iteration order.
	pub fn key_repr(&self) -> String {
		match self {
			QueryValue::Null => "null".to_string(),
			QueryValue::Bool(b) => b.to_string(),
			QueryValue::Int(i) => i.to_string(),
			QueryValue::Float(f) => format!("{f:?}"),
			QueryValue::String(s) => s.clone(),
			QueryValue::Bytes(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
			QueryValue::Uuid(u) => u.to_string(),
			QueryValue::Timestamp(dt) => dt.to_rfc3339(),
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, QueryValue::Null)
	}

	/// Lossless JSON view, used when exporting entities
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			QueryValue::Null => serde_json::Value::Null,
			QueryValue::Bool(b) => serde_json::Value::Bool(*b),
			QueryValue::Int(i) => serde_json::Value::from(*i),
			QueryValue::Float(f) => serde_json::Value::from(*f),
			QueryValue::String(s) => serde_json::Value::String(s.clone()),
			QueryValue::Bytes(b) => {
				serde_json::Value::String(b.iter().map(|byte| format!("{byte:02x}")).collect())
			}
			QueryValue::Uuid(u) => serde_json::Value::String(u.to_string()),
			QueryValue::Timestamp(dt) => serde_json::Value::String(dt.to_rfc3339()),
		}
	}
}

impl From<&str> for QueryValue {
	fn from(s: &str) -> Self {
		QueryValue::String(s.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(s: String) -> Self {
		QueryValue::String(s)
	}
}

impl From<i64> for QueryValue {
	fn from(i: i64) -> Self {
		QueryValue::Int(i)
	}
}

impl From<i32> for QueryValue {
	fn from(i: i32) -> Self {
		QueryValue::Int(i as i64)
	}
}

impl From<f64> for QueryValue {
	fn from(f: f64) -> Self {
		QueryValue::Float(f)
	}
}

impl From<bool> for QueryValue {
	fn from(b: bool) -> Self {
		QueryValue::Bool(b)
	}
}

impl From<uuid::Uuid> for QueryValue {
	fn from(u: uuid::Uuid) -> Self {
		QueryValue::Uuid(u)
	}
}

impl From<chrono::DateTime<chrono::Utc>> for QueryValue {
	fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
		QueryValue::Timestamp(dt)
	}
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
	fn from(opt: Option<T>) -> Self {
		match opt {
			Some(v) => v.into(),
			None => QueryValue::Null,
		}
	}
}

/// Result of a mutating statement.
///
/// `rows_affected` is reported exactly as the driver returned it. Wide-column
/// backends do not reliably report accurate counts for UPDATE/DELETE; callers
/// must treat the value as advisory on that dialect.
#[derive(Debug, Clone)]
pub struct QueryResult {
	pub rows_affected: u64,
}

/// Row from a query result
#[derive(Debug, Clone, Default)]
pub struct Row {
	data: HashMap<String, QueryValue>,
}

impl Row {
	pub fn new() -> Self {
		Self {
			data: HashMap::new(),
		}
	}

	pub fn insert(&mut self, column: impl Into<String>, value: QueryValue) {
		self.data.insert(column.into(), value);
	}

	pub fn get(&self, column: &str) -> Option<&QueryValue> {
		self.data.get(column)
	}

	pub fn require(&self, column: &str) -> Result<&QueryValue, DatabaseError> {
		self.data
			.get(column)
			.ok_or_else(|| DatabaseError::ColumnNotFound(column.to_string()))
	}

	pub fn columns(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
		self.data.iter()
	}

	pub fn values(&self) -> impl Iterator<Item = &QueryValue> {
		self.data.values()
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

impl FromIterator<(String, QueryValue)> for Row {
	fn from_iter<I: IntoIterator<Item = (String, QueryValue)>>(iter: I) -> Self {
		Self {
			data: iter.into_iter().collect(),
		}
	}
}
