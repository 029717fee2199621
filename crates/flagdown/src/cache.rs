// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache for parsed flag documents.
//!
//! Entries are keyed by project and environment and tagged by project, so a
//! single webhook for a project drops every environment's entry at once.
//! Entries have no TTL.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use flagdown_core::FeatureSet;

use crate::error::Result;

/// Deferred fetch-and-parse, run only on a miss.
pub type Loader<'a> = BoxFuture<'a, Result<Arc<FeatureSet>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub project: String,
	pub environment: String,
}

impl CacheKey {
	pub fn new(project: impl Into<String>, environment: impl Into<String>) -> Self {
		Self {
			project: project.into(),
			environment: environment.into(),
		}
	}
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.project, self.environment)
	}
}

/// Memoization with tag-based invalidation.
#[async_trait]
pub trait CacheProvider: Send + Sync {
	/// Returns the cached value for `key`, running `loader` on a miss.
	///
	/// A failed load must not be cached.
	async fn get_or_load(
		&self,
		key: &CacheKey,
		tags: &[String],
		loader: Loader<'_>,
	) -> Result<Arc<FeatureSet>>;

	/// Drops every entry carrying `tag`.
	async fn invalidate_tag(&self, tag: &str);
}

struct Entry {
	cell: Arc<OnceCell<Arc<FeatureSet>>>,
	tags: Vec<String>,
}

/// Process-local cache.
///
/// Concurrent misses for one key share a single load.
#[derive(Default)]
pub struct MemoryCache {
	entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of keys currently held, including loads in flight.
	pub async fn len(&self) -> usize {
		self.entries.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.lock().await.is_empty()
	}
}

impl fmt::Debug for MemoryCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryCache").finish_non_exhaustive()
	}
}

#[async_trait]
impl CacheProvider for MemoryCache {
	async fn get_or_load(
		&self,
		key: &CacheKey,
		tags: &[String],
		loader: Loader<'_>,
	) -> Result<Arc<FeatureSet>> {
		let cell = {
			let mut entries = self.entries.lock().await;
			let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
				cell: Arc::new(OnceCell::new()),
				tags: tags.to_vec(),
			});
			Arc::clone(&entry.cell)
		};

		if let Some(value) = cell.get() {
			debug!(key = %key, "cache hit");
			return Ok(Arc::clone(value));
		}

		let value = cell
			.get_or_try_init(|| async move {
				debug!(key = %key, "cache miss, loading");
				loader.await
			})
			.await?;
		Ok(Arc::clone(value))
	}

	async fn invalidate_tag(&self, tag: &str) {
		let mut entries = self.entries.lock().await;
		let before = entries.len();
		entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
		debug!(tag, removed = before - entries.len(), "cache tag invalidated");
	}
}

/// Pass-through provider: every call loads.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl CacheProvider for NoCache {
	async fn get_or_load(
		&self,
		_key: &CacheKey,
		_tags: &[String],
		loader: Loader<'_>,
	) -> Result<Arc<FeatureSet>> {
		loader.await
	}

	async fn invalidate_tag(&self, _tag: &str) {}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::FlagsError;
	use crate::source::SourceError;
	use flagdown_core::parse_markdown;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	fn loader(calls: &Arc<AtomicUsize>, markdown: &'static str) -> Loader<'static> {
		let calls = Arc::clone(calls);
		Box::pin(async move {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(Duration::from_millis(20)).await;
			Ok(Arc::new(parse_markdown(markdown)))
		})
	}

	fn tags(project: &str) -> Vec<String> {
		vec![project.to_string()]
	}

	#[tokio::test]
	async fn second_lookup_is_a_hit() {
		let cache = MemoryCache::new();
		let calls = Arc::new(AtomicUsize::new(0));
		let key = CacheKey::new("web", "production");

		let first = cache
			.get_or_load(&key, &tags("web"), loader(&calls, "## A\n- [x] Enabled\n"))
			.await
			.unwrap();
		let second = cache
			.get_or_load(&key, &tags("web"), loader(&calls, "## B\n- [x] Enabled\n"))
			.await
			.unwrap();

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(Arc::ptr_eq(&first, &second));
		assert!(second.get("a").is_some());
		assert_eq!(cache.len().await, 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_misses_share_one_load() {
		let cache = Arc::new(MemoryCache::new());
		let calls = Arc::new(AtomicUsize::new(0));

		let handles: Vec<_> = (0..16)
			.map(|_| {
				let cache = Arc::clone(&cache);
				let calls = Arc::clone(&calls);
				tokio::spawn(async move {
					let key = CacheKey::new("web", "production");
					cache
						.get_or_load(&key, &tags("web"), loader(&calls, "## A\n"))
						.await
						.map(|set| set.len())
				})
			})
			.collect();

		for handle in handles {
			assert_eq!(handle.await.unwrap().unwrap(), 1);
		}
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn invalidate_tag_drops_all_environments_of_a_project() {
		let cache = MemoryCache::new();
		let calls = Arc::new(AtomicUsize::new(0));

		for (project, env) in [("web", "production"), ("web", "staging"), ("api", "production")] {
			cache
				.get_or_load(&CacheKey::new(project, env), &tags(project), loader(&calls, "## A\n"))
				.await
				.unwrap();
		}
		assert_eq!(cache.len().await, 3);

		cache.invalidate_tag("web").await;
		assert_eq!(cache.len().await, 1);

		cache
			.get_or_load(&CacheKey::new("web", "production"), &tags("web"), loader(&calls, "## A\n"))
			.await
			.unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 4);
	}

	#[tokio::test]
	async fn failed_loads_are_not_cached() {
		let cache = MemoryCache::new();
		let key = CacheKey::new("web", "production");

		let failing: Loader<'static> =
			Box::pin(async { Err(FlagsError::Source(SourceError::transient("timeout"))) });
		assert!(cache.get_or_load(&key, &tags("web"), failing).await.is_err());

		let calls = Arc::new(AtomicUsize::new(0));
		let set = cache
			.get_or_load(&key, &tags("web"), loader(&calls, "## A\n"))
			.await
			.unwrap();
		assert_eq!(set.len(), 1);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn no_cache_always_loads() {
		let cache = NoCache;
		let calls = Arc::new(AtomicUsize::new(0));
		let key = CacheKey::new("web", "production");

		for _ in 0..3 {
			cache
				.get_or_load(&key, &tags("web"), loader(&calls, "## A\n"))
				.await
				.unwrap();
		}
		cache.invalidate_tag("web").await;
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn key_display() {
		assert_eq!(CacheKey::new("web", "production").to_string(), "web@production");
	}
}
