//! Relational (PostgreSQL) grammar
//!
//! The permissive side of the statement compiler: every model variant except
//! token ranges is expressible. Placeholders are `$n`, numbered in binding
//! order — for UPDATE that means SET values first, then WHERE values.

use super::{Grammar, Statement, quote_ident};
use crate::error::{DatabaseError, Result};
use crate::query::{QueryModel, WhereClause};
use crate::schema::TableSchema;
use crate::types::{DialectKind, QueryValue};

/// Statement compiler for PostgreSQL-compatible backends
#[derive(Debug, Default)]
pub struct PostgresGrammar;

impl PostgresGrammar {
	pub fn new() -> Self {
		Self
	}

	/// Render predicates with `$n` placeholders, continuing from
	/// `next_placeholder` (1-based)
	fn render_wheres(
		&self,
		model: &QueryModel,
		mut next_placeholder: usize,
	) -> Result<(String, Vec<QueryValue>)> {
		let mut parts = Vec::with_capacity(model.wheres.len());
		let mut bindings = Vec::new();
		let mut placeholder = |bindings: &mut Vec<QueryValue>, value: &QueryValue| {
			let p = format!("${next_placeholder}");
			next_placeholder += 1;
			bindings.push(value.clone());
			p
		};

		for clause in &model.wheres {
			match clause {
				WhereClause::Basic { column, op, value } => {
					let p = placeholder(&mut bindings, value);
					parts.push(format!("{} {} {p}", quote_ident(column), op.as_sql()));
				}
				WhereClause::In { column, values } => {
					if values.is_empty() {
						return Err(DatabaseError::Compile(format!(
							"IN predicate on `{column}` requires at least one value"
						)));
					}
					let ps: Vec<String> =
						values.iter().map(|v| placeholder(&mut bindings, v)).collect();
					parts.push(format!("{} IN ({})", quote_ident(column), ps.join(", ")));
				}
				WhereClause::NotIn { column, values } => {
					if values.is_empty() {
						return Err(DatabaseError::Compile(format!(
							"NOT IN predicate on `{column}` requires at least one value"
						)));
					}
					let ps: Vec<String> =
						values.iter().map(|v| placeholder(&mut bindings, v)).collect();
					parts.push(format!("{} NOT IN ({})", quote_ident(column), ps.join(", ")));
				}
				WhereClause::Between { column, low, high } => {
					let p_low = placeholder(&mut bindings, low);
					let p_high = placeholder(&mut bindings, high);
					parts.push(format!(
						"{} BETWEEN {p_low} AND {p_high}",
						quote_ident(column)
					));
				}
				WhereClause::IsNull { column } => {
					parts.push(format!("{} IS NULL", quote_ident(column)));
				}
				WhereClause::IsNotNull { column } => {
					parts.push(format!("{} IS NOT NULL", quote_ident(column)));
				}
				WhereClause::TokenRange { .. } => {
					return Err(DatabaseError::Compile(
						"token ranges are a wide-column concept and are not supported \
						 by the relational dialect"
							.to_string(),
					));
				}
				WhereClause::Raw { sql } => parts.push(sql.clone()),
			}
		}

		Ok((parts.join(" AND "), bindings))
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

impl Grammar for PostgresGrammar {
	fn dialect(&self) -> DialectKind {
		DialectKind::Postgres
	}

	fn compile_select(&self, model: &QueryModel, _schema: &TableSchema) -> Result<Statement> {
		let mut text = format!(
			"SELECT {} FROM {}",
			self.render_projection(model),
			quote_ident(&model.table)
		);
		let (where_sql, bindings) = self.render_wheres(model, 1)?;
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
		// allow_filtering is a wide-column opt-in; relational backends scan
		// freely, so the flag compiles to nothing here.

		Ok(Statement::new(text, bindings))
	}

	fn compile_count(&self, model: &QueryModel, _schema: &TableSchema) -> Result<Statement> {
		let mut text = format!("SELECT COUNT(*) AS count FROM {}", quote_ident(&model.table));
		let (where_sql, bindings) = self.render_wheres(model, 1)?;
		if !where_sql.is_empty() {
			text.push_str(" WHERE ");
			text.push_str(&where_sql);
		}
		Ok(Statement::new(text, bindings))
	}

	fn compile_update(
		&self,
		model: &QueryModel,
		assignments: &[(String, QueryValue)],
		_schema: &TableSchema,
	) -> Result<Statement> {
		if assignments.is_empty() {
			return Err(DatabaseError::Compile(
				"UPDATE requires at least one assignment".to_string(),
			));
		}

		let mut bindings: Vec<QueryValue> = Vec::with_capacity(assignments.len());
		let set_sql = assignments
			.iter()
			.enumerate()
			.map(|(i, (column, value))| {
				bindings.push(value.clone());
				format!("{} = ${}", quote_ident(column), i + 1)
			})
			.collect::<Vec<_>>()
			.join(", ");

		let (where_sql, where_bindings) = self.render_wheres(model, assignments.len() + 1)?;
		bindings.extend(where_bindings);

		let mut text = format!("UPDATE {} SET {set_sql}", quote_ident(&model.table));
		if !where_sql.is_empty() {
			text.push_str(" WHERE ");
			text.push_str(&where_sql);
		}
		Ok(Statement::new(text, bindings))
	}

	fn compile_delete(&self, model: &QueryModel, _schema: &TableSchema) -> Result<Statement> {
		if model.wheres.is_empty() {
			return Err(DatabaseError::Compile(
				"DELETE without predicates is not allowed; add filters first".to_string(),
			));
		}
		let (where_sql, bindings) = self.render_wheres(model, 1)?;
		let text = format!(
			"DELETE FROM {} WHERE {where_sql}",
			quote_ident(&model.table)
		);
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
		let placeholders = (1..=assignments.len())
			.map(|i| format!("${i}"))
			.collect::<Vec<_>>()
			.join(", ");
		let bindings: Vec<QueryValue> =
			assignments.iter().map(|(_, value)| value.clone()).collect();

		let mut text = format!(
			"INSERT INTO {} ({columns}) VALUES ({placeholders})",
			quote_ident(table)
		);
		if if_not_exists {
			text.push_str(" ON CONFLICT DO NOTHING");
		}
		Ok(Statement::new(text, bindings))
	}
}
