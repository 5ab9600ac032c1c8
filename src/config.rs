//! Connection settings
//!
//! Configuration is explicit data handed to driver constructors and the
//! `Database` context by the caller — there is no ambient settings singleton.

use crate::types::DialectKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one backend connection.
///
/// Table names used by the query pipeline are unqualified; the keyspace (or
/// database/schema name on relational backends) set here is expected to be
/// the driver session's default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
	pub dialect: DialectKind,
	/// Host:port endpoints (one for relational backends, the cluster's
	/// contact points for the wide-column backend)
	pub contact_points: Vec<String>,
	/// Keyspace or database name
	pub keyspace: String,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub password: Option<String>,
	#[serde(default = "default_connect_timeout", with = "duration_secs")]
	pub connect_timeout: Duration,
}

impl DatabaseConfig {
	pub fn new(dialect: DialectKind, keyspace: impl Into<String>) -> Self {
		Self {
			dialect,
			contact_points: Vec::new(),
			keyspace: keyspace.into(),
			username: None,
			password: None,
			connect_timeout: default_connect_timeout(),
		}
	}

	pub fn contact_point(mut self, endpoint: impl Into<String>) -> Self {
		self.contact_points.push(endpoint.into());
		self
	}

	pub fn credentials(
		mut self,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		self.username = Some(username.into());
		self.password = Some(password.into());
		self
	}
}

fn default_connect_timeout() -> Duration {
	Duration::from_secs(10)
}

mod duration_secs {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(value.as_secs())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		let secs = u64::deserialize(deserializer)?;
		Ok(Duration::from_secs(secs))
	}
}
