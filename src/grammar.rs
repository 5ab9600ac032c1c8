//! Statement compilation
//!
//! A `Grammar` is a pure function from a [`QueryModel`](crate::query::QueryModel)
//! to statement text plus ordered positional bindings. Grammars never execute
//! anything — execution belongs to the builder — which keeps compilation
//! independently testable: feed a model in, assert exact text and bindings out.

pub mod cql;
pub mod postgres;

pub use cql::CqlGrammar;
pub use postgres::PostgresGrammar;

use crate::error::Result;
use crate::query::QueryModel;
use crate::schema::TableSchema;
use crate::types::{DialectKind, QueryValue};
use std::sync::Arc;

/// Compiled statement text with its ordered bindings
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
	pub text: String,
	pub bindings: Vec<QueryValue>,
}

impl Statement {
	pub fn new(text: impl Into<String>, bindings: Vec<QueryValue>) -> Self {
		Self {
			text: text.into(),
			bindings,
		}
	}
}

/// Per-backend compiler from the neutral query model to statement text.
///
/// Implementations hold no mutable state. Legality rules (which predicates
/// and orderings the backend accepts) are enforced here, before any network
/// round trip.
pub trait Grammar: Send + Sync {
	fn dialect(&self) -> DialectKind;

	fn compile_select(&self, model: &QueryModel, schema: &TableSchema) -> Result<Statement>;

	fn compile_count(&self, model: &QueryModel, schema: &TableSchema) -> Result<Statement>;

	fn compile_update(
		&self,
		model: &QueryModel,
		assignments: &[(String, QueryValue)],
		schema: &TableSchema,
	) -> Result<Statement>;

	fn compile_delete(&self, model: &QueryModel, schema: &TableSchema) -> Result<Statement>;

	fn compile_insert(
		&self,
		table: &str,
		assignments: &[(String, QueryValue)],
		if_not_exists: bool,
	) -> Result<Statement>;
}

/// Select the grammar for a dialect
pub fn grammar_for(dialect: DialectKind) -> Arc<dyn Grammar> {
	match dialect {
		DialectKind::WideColumn => Arc::new(CqlGrammar::new()),
		DialectKind::Postgres => Arc::new(PostgresGrammar::new()),
	}
}

/// Double-quote an identifier, escaping embedded quotes.
///
/// Both supported dialects quote identifiers with `"`; quoting preserves
/// case sensitivity and keeps reserved words usable as column names.
pub(crate) fn quote_ident(ident: &str) -> String {
	format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn quote_ident_escapes_embedded_quotes() {
		assert_eq!(quote_ident("users"), "\"users\"");
		assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
	}
}
