//! sqlx-backed PostgreSQL driver

use crate::connection::Driver;
use crate::error::{DatabaseError, Result};
use crate::types::{QueryResult, QueryValue, Row};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo};

/// PostgreSQL backend over an sqlx connection pool
pub struct PostgresDriver {
	pool: PgPool,
}

impl PostgresDriver {
	/// Connect with a standard `postgresql://` url
	pub async fn connect(url: &str) -> Result<Self> {
		let pool = PgPool::connect(url)
			.await
			.map_err(|e| DatabaseError::Driver(e.to_string()))?;
		Ok(Self { pool })
	}

	pub fn from_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	fn bind_value<'q>(
		query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
		value: &'q QueryValue,
	) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
		match value {
			QueryValue::Null => query.bind(None::<i64>),
			QueryValue::Bool(b) => query.bind(b),
			QueryValue::Int(i) => query.bind(i),
			QueryValue::Float(f) => query.bind(f),
			QueryValue::String(s) => query.bind(s),
			QueryValue::Bytes(b) => query.bind(b),
			QueryValue::Uuid(u) => query.bind(u),
			QueryValue::Timestamp(dt) => query.bind(dt),
		}
	}

	fn convert_row(pg_row: PgRow) -> Result<Row> {
		let mut row = Row::new();
		for column in pg_row.columns() {
			let name = column.name();
			let type_name = column.type_info().name().to_uppercase();

			let value = if type_name.contains("BOOL") {
				pg_row
					.try_get::<Option<bool>, _>(name)
					.ok()
					.flatten()
					.map(QueryValue::Bool)
			} else if type_name.contains("UUID") {
				pg_row
					.try_get::<Option<uuid::Uuid>, _>(name)
					.ok()
					.flatten()
					.map(QueryValue::Uuid)
			} else if type_name.contains("TIMESTAMP") {
				pg_row
					.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)
					.ok()
					.flatten()
					.map(QueryValue::Timestamp)
			} else if type_name.contains("INT") {
				pg_row
					.try_get::<Option<i64>, _>(name)
					.ok()
					.flatten()
					.map(QueryValue::Int)
					.or_else(|| {
						pg_row
							.try_get::<Option<i32>, _>(name)
							.ok()
							.flatten()
							.map(|i| QueryValue::Int(i as i64))
					})
			} else if type_name.contains("FLOAT") || type_name.contains("DOUBLE") {
				pg_row
					.try_get::<Option<f64>, _>(name)
					.ok()
					.flatten()
					.map(QueryValue::Float)
			} else if type_name.contains("BYTEA") {
				pg_row
					.try_get::<Option<Vec<u8>>, _>(name)
					.ok()
					.flatten()
					.map(QueryValue::Bytes)
			} else {
				pg_row
					.try_get::<Option<String>, _>(name)
					.ok()
					.flatten()
					.map(QueryValue::String)
			};

			row.insert(name.to_string(), value.unwrap_or(QueryValue::Null));
		}
		Ok(row)
	}
}

#[async_trait]
impl Driver for PostgresDriver {
	async fn execute(&self, statement: &str, bindings: Vec<QueryValue>) -> Result<QueryResult> {
		let mut query = sqlx::query(statement);
		for binding in &bindings {
			query = Self::bind_value(query, binding);
		}
		let result = query
			.execute(&self.pool)
			.await
			.map_err(|e| DatabaseError::Driver(e.to_string()))?;
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
		})
	}

	async fn fetch_all(&self, statement: &str, bindings: Vec<QueryValue>) -> Result<Vec<Row>> {
		let mut query = sqlx::query(statement);
		for binding in &bindings {
			query = Self::bind_value(query, binding);
		}
		let rows = query
			.fetch_all(&self.pool)
			.await
			.map_err(|e| DatabaseError::Driver(e.to_string()))?;
		rows.into_iter().map(Self::convert_row).collect()
	}

	async fn disconnect(&self) -> Result<()> {
		self.pool.close().await;
		Ok(())
	}
}
