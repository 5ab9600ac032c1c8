//! Driverless test support
//!
//! `StubDriver` routes statements to canned responses by substring match and
//! records every call, so pipeline behavior — compiled text, binding order,
//! query counts, merge results — can be asserted without a live backend.
//! Routing by pattern rather than call order keeps assertions stable when
//! sibling eager-load fetches run concurrently.

use crate::connection::Driver;
use crate::error::{DatabaseError, Result};
use crate::types::{QueryResult, QueryValue, Row};
use async_trait::async_trait;
use parking_lot::Mutex;

enum StubResponse {
	Rows(Vec<Row>),
	Affected(u64),
	Fail(String),
}

struct StubRule {
	pattern: String,
	response: StubResponse,
}

/// In-memory driver with pattern-routed responses and a call log
#[derive(Default)]
pub struct StubDriver {
	rules: Mutex<Vec<StubRule>>,
	calls: Mutex<Vec<(String, Vec<QueryValue>)>>,
}

impl StubDriver {
	pub fn new() -> Self {
		Self::default()
	}

	/// Serve `rows` for any fetched statement containing `pattern`
	pub fn on(&self, pattern: impl Into<String>, rows: Vec<Row>) {
		self.rules.lock().push(StubRule {
			pattern: pattern.into(),
			response: StubResponse::Rows(rows),
		});
	}

	/// Report `rows_affected` for any executed statement containing `pattern`
	pub fn on_affected(&self, pattern: impl Into<String>, rows_affected: u64) {
		self.rules.lock().push(StubRule {
			pattern: pattern.into(),
			response: StubResponse::Affected(rows_affected),
		});
	}

	/// Fail any statement containing `pattern` with a driver error
	pub fn fail(&self, pattern: impl Into<String>, message: impl Into<String>) {
		self.rules.lock().push(StubRule {
			pattern: pattern.into(),
			response: StubResponse::Fail(message.into()),
		});
	}

	/// Every statement seen, in dispatch order
	pub fn calls(&self) -> Vec<(String, Vec<QueryValue>)> {
		self.calls.lock().clone()
	}

	/// How many dispatched statements contained `pattern`
	pub fn call_count(&self, pattern: &str) -> usize {
		self.calls
			.lock()
			.iter()
			.filter(|(text, _)| text.contains(pattern))
			.count()
	}

	fn record(&self, statement: &str, bindings: &[QueryValue]) {
		self.calls
			.lock()
			.push((statement.to_string(), bindings.to_vec()));
	}

	fn lookup(&self, statement: &str) -> Option<Result<StubOutcome>> {
		let rules = self.rules.lock();
		rules
			.iter()
			.find(|rule| statement.contains(&rule.pattern))
			.map(|rule| match &rule.response {
				StubResponse::Rows(rows) => Ok(StubOutcome::Rows(rows.clone())),
				StubResponse::Affected(n) => Ok(StubOutcome::Affected(*n)),
				StubResponse::Fail(message) => Err(DatabaseError::Driver(message.clone())),
			})
	}
}

enum StubOutcome {
	Rows(Vec<Row>),
	Affected(u64),
}

#[async_trait]
impl Driver for StubDriver {
	async fn execute(&self, statement: &str, bindings: Vec<QueryValue>) -> Result<QueryResult> {
		self.record(statement, &bindings);
		match self.lookup(statement) {
			Some(Ok(StubOutcome::Affected(rows_affected))) => Ok(QueryResult { rows_affected }),
			Some(Ok(StubOutcome::Rows(rows))) => Ok(QueryResult {
				rows_affected: rows.len() as u64,
			}),
			Some(Err(err)) => Err(err),
			None => Ok(QueryResult { rows_affected: 0 }),
		}
	}

	async fn fetch_all(&self, statement: &str, bindings: Vec<QueryValue>) -> Result<Vec<Row>> {
		self.record(statement, &bindings);
		match self.lookup(statement) {
			Some(Ok(StubOutcome::Rows(rows))) => Ok(rows),
			Some(Ok(StubOutcome::Affected(_))) => Ok(Vec::new()),
			Some(Err(err)) => Err(err),
			None => Ok(Vec::new()),
		}
	}
}

/// Build a row from column/value pairs
pub fn row(columns: &[(&str, QueryValue)]) -> Row {
	columns
		.iter()
		.map(|(column, value)| ((*column).to_string(), value.clone()))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn responses_route_by_pattern_not_call_order() {
		let driver = StubDriver::new();
		driver.on("FROM \"users\"", vec![row(&[("id", QueryValue::Int(1))])]);
		driver.fail("FROM \"posts\"", "unavailable");

		let rows = tokio_test::block_on(
			driver.fetch_all("SELECT * FROM \"posts\" WHERE \"id\" = ?", Vec::new()),
		);
		assert!(matches!(rows, Err(DatabaseError::Driver(_))));

		let rows = tokio_test::block_on(
			driver.fetch_all("SELECT * FROM \"users\" WHERE \"id\" = ?", Vec::new()),
		)
		.unwrap();
		assert_eq!(rows.len(), 1);

		assert_eq!(driver.call_count("FROM \"users\""), 1);
		assert_eq!(driver.calls().len(), 2);
	}

	#[test]
	fn unmatched_statements_default_to_empty() {
		let driver = StubDriver::new();
		let rows =
			tokio_test::block_on(driver.fetch_all("SELECT * FROM \"ghosts\"", Vec::new())).unwrap();
		assert!(rows.is_empty());

		let result =
			tokio_test::block_on(driver.execute("DELETE FROM \"ghosts\"", Vec::new())).unwrap();
		assert_eq!(result.rows_affected, 0);
	}
}
