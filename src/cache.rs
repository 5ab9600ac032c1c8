//! Result caching boundary
//!
//! The root query optionally delegates to a cache when a `remember(ttl)`
//! directive is attached. The cache key is a stable fingerprint of the
//! collection plus the compiled statement and bindings, so two identical
//! builder call sequences share one entry.

use crate::grammar::Statement;
use crate::types::Row;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Memoized result store consulted by `remember`-flagged reads
pub trait QueryCache: Send + Sync {
	fn get(&self, key: &str) -> Option<Vec<Row>>;
	fn put(&self, key: String, rows: Vec<Row>, ttl: Duration);
}

/// SHA-256 fingerprint over (collection, statement text, bindings)
pub fn statement_fingerprint(collection: &str, statement: &Statement) -> String {
	let mut hasher = Sha256::new();
	hasher.update(collection.as_bytes());
	hasher.update([0]);
	hasher.update(statement.text.as_bytes());
	for binding in &statement.bindings {
		hasher.update([0]);
		hasher.update(binding.key_repr().as_bytes());
	}
	let digest = hasher.finalize();
	digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

struct CachedRows {
	rows: Vec<Row>,
	cached_at: Instant,
	ttl: Duration,
}

/// In-process cache with per-entry TTL and oldest-entry eviction
pub struct MemoryCache {
	max_size: usize,
	entries: RwLock<HashMap<String, CachedRows>>,
}

impl MemoryCache {
	pub fn new(max_size: usize) -> Self {
		Self {
			max_size,
			entries: RwLock::new(HashMap::new()),
		}
	}
}

impl Default for MemoryCache {
	fn default() -> Self {
		Self::new(1000)
	}
}

impl QueryCache for MemoryCache {
	fn get(&self, key: &str) -> Option<Vec<Row>> {
		let entries = self.entries.read();
		let cached = entries.get(key)?;
		if cached.cached_at.elapsed() > cached.ttl {
			return None;
		}
		Some(cached.rows.clone())
	}

	fn put(&self, key: String, rows: Vec<Row>, ttl: Duration) {
		let mut entries = self.entries.write();

		if entries.len() >= self.max_size
			&& !entries.contains_key(&key)
			&& let Some(oldest) = entries
				.iter()
				.min_by_key(|(_, v)| v.cached_at)
				.map(|(k, _)| k.clone())
		{
			entries.remove(&oldest);
		}

		entries.insert(
			key,
			CachedRows {
				rows,
				cached_at: Instant::now(),
				ttl,
			},
		);
	}
}
