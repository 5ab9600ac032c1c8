//! Driver contract and connection wrapper
//!
//! The wire protocol lives outside this crate. A backend plugs in by
//! implementing [`Driver`]; everything above it works in terms of statement
//! text plus positional bindings.

use crate::error::Result;
use crate::grammar::Statement;
use crate::types::{QueryResult, QueryValue, Row};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Low-level backend contract: execute compiled statements, nothing more.
///
/// Errors must surface as [`DatabaseError::Driver`](crate::DatabaseError::Driver)
/// with the backend's native message attached, and are propagated to callers
/// unchanged.
#[async_trait]
pub trait Driver: Send + Sync {
	/// Establish the backend session. Drivers constructed around an already
	/// live pool may leave this as the default no-op.
	async fn connect(&self) -> Result<()> {
		Ok(())
	}

	/// Run a mutating statement, returning the backend's affected-row report
	async fn execute(&self, statement: &str, bindings: Vec<QueryValue>) -> Result<QueryResult>;

	/// Run a reading statement, returning rows in backend order
	async fn fetch_all(&self, statement: &str, bindings: Vec<QueryValue>) -> Result<Vec<Row>>;

	async fn disconnect(&self) -> Result<()> {
		Ok(())
	}
}

/// Cloneable handle around a driver, with statement tracing
#[derive(Clone)]
pub struct DatabaseConnection {
	driver: Arc<dyn Driver>,
}

impl DatabaseConnection {
	pub fn new(driver: Arc<dyn Driver>) -> Self {
		Self { driver }
	}

	pub fn driver(&self) -> Arc<dyn Driver> {
		Arc::clone(&self.driver)
	}

	pub async fn execute(&self, statement: &Statement) -> Result<QueryResult> {
		debug!(
			statement = %statement.text,
			bindings = statement.bindings.len(),
			"executing statement"
		);
		self.driver
			.execute(&statement.text, statement.bindings.clone())
			.await
	}

	pub async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>> {
		debug!(
			statement = %statement.text,
			bindings = statement.bindings.len(),
			"fetching rows"
		);
		self.driver
			.fetch_all(&statement.text, statement.bindings.clone())
			.await
	}

	pub async fn disconnect(&self) -> Result<()> {
		self.driver.disconnect().await
	}
}
