// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the flag engine.

use thiserror::Error;

use flagdown_core::CoreError;

use crate::source::SourceError;

/// Result type alias for the flag engine.
pub type Result<T> = std::result::Result<T, FlagsError>;

/// Errors that can occur while configuring or querying the flag engine.
#[derive(Error, Debug)]
pub enum FlagsError {
	/// Repository is not in `owner/repo` form.
	#[error("invalid repository '{0}', expected owner/repo")]
	InvalidRepository(String),

	/// Two paths resolve to the same project key.
	#[error("duplicate project key: {0}")]
	DuplicateProject(String),

	/// No paths were configured.
	#[error("at least one path must be configured")]
	NoPaths,

	/// Issue numbers start at 1.
	#[error("invalid issue number {issue} for {repository}")]
	InvalidIssueNumber { repository: String, issue: u64 },

	/// Configuration could not be loaded.
	#[error("configuration error: {0}")]
	Config(String),

	/// The requested project is not configured.
	#[error("project not found: {0}")]
	PathNotFound(String),

	/// Several paths are configured and no project was given.
	#[error("project must be provided when multiple paths are configured")]
	AmbiguousProject,

	/// No environment was requested and none is configured.
	#[error("no environment requested and no default environment configured")]
	MissingEnvironment,

	/// The document source failed.
	#[error("document source failed: {0}")]
	Source(#[from] SourceError),

	/// The document exists but has no body.
	#[error("document body not found")]
	DocumentNotFound,
}

impl FlagsError {
	/// Returns true if the same call may succeed when retried later.
	pub fn is_retryable(&self) -> bool {
		matches!(self, FlagsError::Source(err) if err.is_transient())
	}
}

impl From<CoreError> for FlagsError {
	fn from(err: CoreError) -> Self {
		match err {
			CoreError::DocumentNotFound => FlagsError::DocumentNotFound,
		}
	}
}
