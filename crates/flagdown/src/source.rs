// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where flag documents come from.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Coordinates of one issue holding a flag document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentLocation {
	pub owner: String,
	pub repo: String,
	pub issue: u64,
}

impl DocumentLocation {
	pub fn new(owner: impl Into<String>, repo: impl Into<String>, issue: u64) -> Self {
		Self {
			owner: owner.into(),
			repo: repo.into(),
			issue,
		}
	}
}

impl fmt::Display for DocumentLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}#{}", self.owner, self.repo, self.issue)
	}
}

/// Failure reported by a [`DocumentSource`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SourceError {
	message: String,
	transient: bool,
}

impl SourceError {
	/// A failure that may clear up on its own (timeouts, rate limits, 5xx).
	pub fn transient(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			transient: true,
		}
	}

	pub fn permanent(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			transient: false,
		}
	}

	pub fn is_transient(&self) -> bool {
		self.transient
	}
}

/// Fetches the raw markdown body of an issue.
///
/// `Ok(None)` means the issue exists but has no body.
#[async_trait]
pub trait DocumentSource: Send + Sync {
	async fn fetch(&self, location: &DocumentLocation) -> Result<Option<String>, SourceError>;
}

/// In-memory document source, for tests and local tooling.
#[derive(Debug, Default)]
pub struct StaticDocumentSource {
	documents: RwLock<HashMap<DocumentLocation, String>>,
	fetches: AtomicUsize,
}

impl StaticDocumentSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_document(mut self, location: DocumentLocation, body: impl Into<String>) -> Self {
		self.documents.get_mut().insert(location, body.into());
		self
	}

	pub async fn set(&self, location: DocumentLocation, body: impl Into<String>) {
		self.documents.write().await.insert(location, body.into());
	}

	pub async fn remove(&self, location: &DocumentLocation) {
		self.documents.write().await.remove(location);
	}

	/// Number of fetches served so far, including misses.
	pub fn fetch_count(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl DocumentSource for StaticDocumentSource {
	async fn fetch(&self, location: &DocumentLocation) -> Result<Option<String>, SourceError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		Ok(self.documents.read().await.get(location).cloned())
	}
}
