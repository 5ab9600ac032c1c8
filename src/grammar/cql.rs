//! Wide-column (CQL) grammar
//!
//! Encodes the legality rules of a partition/clustering-key store: predicates
//! must seek on key or indexed columns unless `ALLOW FILTERING` is requested,
//! ORDER BY is restricted to a prefix of the clustering key, OR/`!=`/`NOT IN`
//! and null tests are rejected outright, and writes may only be keyed by
//! primary-key columns. All of it fails at compile time, never as a backend
//! round trip.

use super::{Grammar, Statement, quote_ident};
use crate::error::{DatabaseError, Result};
use crate::query::{Operator, QueryModel, WhereClause};
use crate::schema::TableSchema;
use crate::types::{DialectKind, QueryValue};

/// Statement compiler for the wide-column dialect
#[derive(Debug, Default)]
pub struct CqlGrammar;

impl CqlGrammar {
	pub fn new() -> Self {
		Self
	}

	/// Validate one read predicate against the table's key layout
	fn check_read_clause(
		&self,
		clause: &WhereClause,
		model: &QueryModel,
		schema: &TableSchema,
	) -> Result<()> {
		match clause {
			WhereClause::Basic { column, op, .. } => {
				if *op == Operator::Ne {
					return Err(DatabaseError::Compile(format!(
						"operator != on `{column}` is not supported by the wide-column backend"
					)));
				}
				self.check_seekable(column, model, schema)
			}
			WhereClause::In { column, values } => {
				if values.is_empty() {
					return Err(DatabaseError::Compile(format!(
						"IN predicate on `{column}` requires at least one value"
					)));
				}
				self.check_seekable(column, model, schema)
			}
			WhereClause::NotIn { column, .. } => Err(DatabaseError::Compile(format!(
				"NOT IN on `{column}` is not supported by the wide-column backend"
			))),
			WhereClause::Between { column, .. } => self.check_seekable(column, model, schema),
			WhereClause::IsNull { column } | WhereClause::IsNotNull { column } => {
				Err(DatabaseError::Compile(format!(
					"null test on `{column}` is not supported by the wide-column backend"
				)))
			}
			WhereClause::TokenRange { columns, .. } => {
				let partition: Vec<&str> =
					schema.partition_key().iter().map(String::as_str).collect();
				let requested: Vec<&str> = columns.iter().map(String::as_str).collect();
				if requested != partition {
					return Err(DatabaseError::Compile(format!(
						"token() must cover the partition key ({}) of `{}`, got ({})",
						partition.join(", "),
						schema.name(),
						requested.join(", ")
					)));
				}
				Ok(())
			}
			WhereClause::Raw { sql } => self.check_raw(sql),
		}
	}

	fn check_seekable(
		&self,
		column: &str,
		model: &QueryModel,
		schema: &TableSchema,
	) -> Result<()> {
		if schema.is_seekable_column(column) || model.allow_filtering {
			Ok(())
		} else {
			Err(DatabaseError::Compile(format!(
				"predicate on `{column}` requires ALLOW FILTERING: not a partition key, \
				 clustering key or indexed column of `{}`",
				schema.name()
			)))
		}
	}

	/// Raw fragments cannot be validated structurally, but OR composition is
	/// still rejected so it cannot sneak past the model's AND-only shape.
	fn check_raw(&self, sql: &str) -> Result<()> {
		let has_or = sql
			.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
			.any(|word| word.eq_ignore_ascii_case("or"));
		if has_or {
			return Err(DatabaseError::Compile(
				"OR composition is not supported by the wide-column backend".to_string(),
			));
		}
		Ok(())
	}

	/// ORDER BY columns must be a prefix of the declared clustering key, in
	/// declared order.
	fn check_order(&self, model: &QueryModel, schema: &TableSchema) -> Result<()> {
		if model.orders.is_empty() {
			return Ok(());
		}
		let clustering = schema.clustering_key();
		if model.orders.len() > clustering.len() {
			return Err(DatabaseError::Compile(format!(
				"ORDER BY lists {} column(s) but `{}` declares only {} clustering column(s)",
				model.orders.len(),
				schema.name(),
				clustering.len()
			)));
		}
		for (order, declared) in model.orders.iter().zip(clustering) {
			if order.column != declared.name {
				return Err(DatabaseError::Compile(format!(
					"ORDER BY column `{}` is not the next clustering column of `{}` \
					 (expected `{}`)",
					order.column,
					schema.name(),
					declared.name
				)));
			}
		}
		Ok(())
	}

	/// Write predicates must identify rows by primary-key columns only;
	/// ALLOW FILTERING does not apply to UPDATE/DELETE.
	fn check_write_clauses(&self, model: &QueryModel, schema: &TableSchema) -> Result<()> {
		if model.wheres.is_empty() {
			return Err(DatabaseError::Compile(format!(
				"UPDATE/DELETE on `{}` requires at least one primary-key predicate",
				schema.name()
			)));
		}
		for clause in &model.wheres {
			match clause {
				WhereClause::Basic {
					column,
					op: Operator::Eq,
					..
				} => {
					if !schema.is_primary_key_column(column) {
						return Err(DatabaseError::Compile(format!(
							"write predicate on `{column}` is not a primary-key column of `{}`",
							schema.name()
						)));
					}
				}
				WhereClause::In { column, values } => {
					if values.is_empty() {
						return Err(DatabaseError::Compile(format!(
							"IN predicate on `{column}` requires at least one value"
						)));
					}
					if !schema.is_primary_key_column(column) {
						return Err(DatabaseError::Compile(format!(
							"write predicate on `{column}` is not a primary-key column of `{}`",
							schema.name()
						)));
					}
				}
				other => {
					return Err(DatabaseError::Compile(format!(
						"write predicates must be key equality or IN clauses, got {other:?}"
					)));
				}
			}
		}
		Ok(())
	}

	/// Render accumulated predicates as `a AND b AND …` with `?` placeholders
	fn render_wheres(&self, model: &QueryModel) -> (String, Vec<QueryValue>) {
		let mut parts = Vec::with_capacity(model.wheres.len());
		let mut bindings = Vec::new();

		for clause in &model.wheres {
			match clause {
				WhereClause::Basic { column, op, value } => {
					parts.push(format!("{} {} ?", quote_ident(column), op.as_sql()));
					bindings.push(value.clone());
				}
				WhereClause::In { column, values } => {
					let placeholders = vec!["?"; values.len()].join(", ");
					parts.push(format!("{} IN ({placeholders})", quote_ident(column)));
					bindings.extend(values.iter().cloned());
				}
				WhereClause::Between { column, low, high } => {
					let ident = quote_ident(column);
					parts.push(format!("{ident} >= ? AND {ident} <= ?"));
					bindings.push(low.clone());
					bindings.push(high.clone());
				}
				WhereClause::TokenRange { columns, op, value } => {
					let cols = columns
						.iter()
						.map(|c| quote_ident(c))
						.collect::<Vec<_>>()
						.join(", ");
					parts.push(format!("token({cols}) {} ?", op.as_sql()));
					bindings.push(value.clone());
				}
				WhereClause::Raw { sql } => parts.push(sql.clone()),
				// Rejected during validation; rendering them would compile
				// statements the backend cannot execute.
				WhereClause::NotIn { .. }
				| WhereClause::IsNull { .. }
				| WhereClause::IsNotNull { .. } => {}
			}
		}

		(parts.join(" AND "), bindings)
	}

	fn render_projection(&self, model: &QueryModel) -> String {
		match &model.columns {
			Some(columns) if !columns.is_empty() => columns
				.iter()
				.map(|c| quote_ident(c))
				.collect::<Vec<_>>()
				.join(", "),
			_ => "*".to_string(),
		}
	}
}

impl Grammar for CqlGrammar {
	fn dialect(&self) -> DialectKind {
		DialectKind::WideColumn
	}

	fn compile_select(&self, model: &QueryModel, schema: &TableSchema) -> Result<Statement> {
		for clause in &model.wheres {
			self.check_read_clause(clause, model, schema)?;
		}
		self.check_order(model, schema)?;

		let mut text = format!(
			"SELECT {} FROM {}",
			self.render_projection(model),
			quote_ident(&model.table)
		);
		let (where_sql, bindings) = self.render_wheres(model);
		if !where_sql.is_empty() {
			text.push_str(" WHERE ");
			text.push_str(&where_sql);
		}
		if !model.orders.is_empty() {
			let order_sql = model
				.orders
				.iter()
				.map(|o| format!("{} {}", quote_ident(&o.column), o.direction.as_sql()))
				.collect::<Vec<_>>()
				.join(", ");
			text.push_str(" ORDER BY ");
			text.push_str(&order_sql);
		}
		if let Some(limit) = model.limit {
			text.push_str(&format!(" LIMIT {limit}"));
		}
		if model.allow_filtering {
			text.push_str(" ALLOW FILTERING");
		}

		Ok(Statement::new(text, bindings))
	}

	fn compile_count(&self, model: &QueryModel, schema: &TableSchema) -> Result<Statement> {
		for clause in &model.wheres {
			self.check_read_clause(clause, model, schema)?;
		}

		let mut text = format!("SELECT COUNT(*) FROM {}", quote_ident(&model.table));
		let (where_sql, bindings) = self.render_wheres(model);
		if !where_sql.is_empty() {
			text.push_str(" WHERE ");
			text.push_str(&where_sql);
		}
		if model.allow_filtering {
			text.push_str(" ALLOW FILTERING");
		}

		Ok(Statement::new(text, bindings))
	}

	fn compile_update(
		&self,
		model: &QueryModel,
		assignments: &[(String, QueryValue)],
		schema: &TableSchema,
	) -> Result<Statement> {
		if assignments.is_empty() {
			return Err(DatabaseError::Compile(
				"UPDATE requires at least one assignment".to_string(),
			));
		}
		self.check_write_clauses(model, schema)?;

		let set_sql = assignments
			.iter()
			.map(|(column, _)| format!("{} = ?", quote_ident(column)))
			.collect::<Vec<_>>()
			.join(", ");
		let mut bindings: Vec<QueryValue> =
			assignments.iter().map(|(_, value)| value.clone()).collect();

		let (where_sql, where_bindings) = self.render_wheres(model);
		bindings.extend(where_bindings);

		let text = format!(
			"UPDATE {} SET {set_sql} WHERE {where_sql}",
			quote_ident(&model.table)
		);
		Ok(Statement::new(text, bindings))
	}

	fn compile_delete(&self, model: &QueryModel, schema: &TableSchema) -> Result<Statement> {
		self.check_write_clauses(model, schema)?;

		let (where_sql, bindings) = self.render_wheres(model);
		let text = format!("DELETE FROM {} WHERE {where_sql}", quote_ident(&model.table));
		Ok(Statement::new(text, bindings))
	}

	fn compile_insert(
		&self,
		table: &str,
		assignments: &[(String, QueryValue)],
		if_not_exists: bool,
	) -> Result<Statement> {
		if assignments.is_empty() {
			return Err(DatabaseError::Compile(
				"INSERT requires at least one column".to_string(),
			));
		}

		let columns = assignments
			.iter()
			.map(|(column, _)| quote_ident(column))
			.collect::<Vec<_>>()
			.join(", ");
		let placeholders = vec!["?"; assignments.len()].join(", ");
		let bindings: Vec<QueryValue> =
			assignments.iter().map(|(_, value)| value.clone()).collect();

		let mut text = format!(
			"INSERT INTO {} ({columns}) VALUES ({placeholders})",
			quote_ident(table)
		);
		if if_not_exists {
			text.push_str(" IF NOT EXISTS");
		}
		Ok(Statement::new(text, bindings))
	}
}
