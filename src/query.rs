//! Dialect-neutral query model
//!
//! A `QueryModel` accumulates filters, ordering, projection and limits
//! without committing to any backend. Grammars turn it into statement text
//! plus positional bindings; until then it stays purely descriptive.

pub mod builder;

pub use builder::QueryBuilder;

use crate::types::QueryValue;
use serde::{Deserialize, Serialize};

/// Comparison operators usable in a basic predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
}

impl Operator {
	pub fn as_sql(&self) -> &'static str {
		match self {
			Operator::Eq => "=",
			Operator::Ne => "!=",
			Operator::Gt => ">",
			Operator::Gte => ">=",
			Operator::Lt => "<",
			Operator::Lte => "<=",
		}
	}
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
	Asc,
	Desc,
}

impl Direction {
	pub fn as_sql(&self) -> &'static str {
		match self {
			Direction::Asc => "ASC",
			Direction::Desc => "DESC",
		}
	}
}

/// One WHERE predicate. Multiple clauses on a model are ANDed; the model has
/// no OR combinator, so OR semantics cannot be expressed structurally.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
	Basic {
		column: String,
		op: Operator,
		value: QueryValue,
	},
	In {
		column: String,
		values: Vec<QueryValue>,
	},
	NotIn {
		column: String,
		values: Vec<QueryValue>,
	},
	Between {
		column: String,
		low: QueryValue,
		high: QueryValue,
	},
	IsNull {
		column: String,
	},
	IsNotNull {
		column: String,
	},
	/// `token(columns...) op value` — partition scan boundary predicate for
	/// the wide-column dialect
	TokenRange {
		columns: Vec<String>,
		op: Operator,
		value: QueryValue,
	},
	/// Raw fragment appended verbatim. The wide-column grammar still scans
	/// it for OR tokens before accepting it.
	Raw {
		sql: String,
	},
}

impl WhereClause {
	/// The single column this clause constrains, when it has one
	pub fn column(&self) -> Option<&str> {
		match self {
			WhereClause::Basic { column, .. }
			| WhereClause::In { column, .. }
			| WhereClause::NotIn { column, .. }
			| WhereClause::Between { column, .. }
			| WhereClause::IsNull { column }
			| WhereClause::IsNotNull { column } => Some(column),
			WhereClause::TokenRange { .. } | WhereClause::Raw { .. } => None,
		}
	}
}

/// One ORDER BY entry
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
	pub column: String,
	pub direction: Direction,
}

/// Backend-neutral description of one statement's shape.
///
/// Compilation does not mutate the model, so compiling the same model twice
/// yields byte-identical output.
#[derive(Debug, Clone, Default)]
pub struct QueryModel {
	pub table: String,
	pub columns: Option<Vec<String>>,
	pub wheres: Vec<WhereClause>,
	pub orders: Vec<OrderClause>,
	pub limit: Option<u64>,
	pub allow_filtering: bool,
}

impl QueryModel {
	pub fn new(table: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			..Default::default()
		}
	}

	pub fn push_where(&mut self, clause: WhereClause) {
		self.wheres.push(clause);
	}

	pub fn push_order(&mut self, column: impl Into<String>, direction: Direction) {
		self.orders.push(OrderClause {
			column: column.into(),
			direction,
		});
	}
}
