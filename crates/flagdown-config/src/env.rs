// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Helpers for reading configuration from the process environment.
//!
//! These are only called while building configuration. Nothing in the
//! evaluation path reads the environment.

use std::path::PathBuf;
use std::{env, fs};

use thiserror::Error;
use tracing::debug;

use crate::secret::SecretString;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Loads a secret from `VAR_FILE` (a path) or, failing that, from `VAR`.
///
/// A single trailing newline is stripped from file contents. Returns
/// `Ok(None)` when neither variable is set.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path) = env::var(&file_var) {
		if path.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}
		let path = PathBuf::from(path);
		let content = fs::read_to_string(&path).map_err(|source| SecretEnvError::Io {
			path: path.clone(),
			source,
		})?;
		debug!(var = %file_var, "loaded secret from file");
		let value = content.strip_suffix('\n').unwrap_or(&content);
		return Ok(Some(SecretString::new(value.to_string())));
	}

	Ok(env::var(var).ok().map(SecretString::new))
}

/// Returns the value of the first variable in `vars` that is set and not
/// blank, trimmed.
pub fn first_env_var(vars: &[&str]) -> Option<String> {
	vars.iter().find_map(|var| {
		env::var(var)
			.ok()
			.map(|value| value.trim().to_string())
			.filter(|value| !value.is_empty())
	})
}
