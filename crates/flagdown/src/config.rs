// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration for the flag engine.

use std::collections::HashSet;
use std::fmt;

use flagdown_config::{first_env_var, load_secret_env, SecretString};
use flagdown_core::{ConditionRegistry, SharedPredicate};

use crate::error::{FlagsError, Result};
use crate::source::DocumentLocation;

/// Environment variable holding the webhook secret (or `_FILE` suffix).
pub const WEBHOOK_SECRET_ENV: &str = "FLAGDOWN_WEBHOOK_SECRET";

/// Variables consulted, in order, for the default environment.
pub const ENVIRONMENT_ENVS: &[&str] = &["FLAGDOWN_ENVIRONMENT", "APP_ENV", "ENV", "STAGE"];

/// One flag document: a project key and the issue it lives in.
#[derive(Clone)]
pub struct PathConfig {
	project: Option<String>,
	repository: String,
	issue: u64,
	conditions: ConditionRegistry,
}

impl PathConfig {
	/// `repository` is `owner/repo`. Validation happens when the config is
	/// built.
	pub fn new(repository: impl Into<String>, issue: u64) -> Self {
		Self {
			project: None,
			repository: repository.into().trim().to_lowercase(),
			issue,
			conditions: ConditionRegistry::new(),
		}
	}

	/// Overrides the default `owner/repo/issue` project key.
	pub fn with_project(mut self, project: impl Into<String>) -> Self {
		self.project = Some(project.into().trim().to_lowercase());
		self
	}

	/// Registers the predicate behind a named condition. The name is
	/// slugified, so `"Beta Users"` serves `- [x] Beta Users`.
	pub fn with_condition(mut self, name: &str, predicate: SharedPredicate) -> Self {
		self.conditions.register(name, predicate);
		self
	}

	pub fn project(&self) -> String {
		match &self.project {
			Some(project) => project.clone(),
			None => format!("{}/{}", self.repository, self.issue),
		}
	}

	pub fn repository(&self) -> &str {
		&self.repository
	}

	pub fn issue(&self) -> u64 {
		self.issue
	}

	pub fn conditions(&self) -> &ConditionRegistry {
		&self.conditions
	}

	pub fn location(&self) -> DocumentLocation {
		let (owner, repo) = self.repository.split_once('/').unwrap_or((self.repository.as_str(), ""));
		DocumentLocation::new(owner, repo, self.issue)
	}

	/// True if a webhook for `repository`/`issue` refers to this document.
	pub fn matches(&self, repository: &str, issue: u64) -> bool {
		self.issue == issue && self.repository.eq_ignore_ascii_case(repository.trim())
	}

	fn validate(&self) -> Result<()> {
		let mut parts = self.repository.split('/');
		let valid = matches!(
			(parts.next(), parts.next(), parts.next()),
			(Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty()
		);
		if !valid {
			return Err(FlagsError::InvalidRepository(self.repository.clone()));
		}
		if self.issue == 0 {
			return Err(FlagsError::InvalidIssueNumber {
				repository: self.repository.clone(),
				issue: self.issue,
			});
		}
		Ok(())
	}
}

impl fmt::Debug for PathConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PathConfig")
			.field("project", &self.project())
			.field("repository", &self.repository)
			.field("issue", &self.issue)
			.field("conditions", &self.conditions)
			.finish()
	}
}

/// Validated, immutable engine configuration.
///
/// The webhook secret is held as a [`SecretString`] and never printed.
#[derive(Clone)]
pub struct FlagsConfig {
	paths: Vec<PathConfig>,
	webhook_secret: Option<SecretString>,
	default_environment: Option<String>,
	log_documents: bool,
}

impl FlagsConfig {
	pub fn builder() -> FlagsConfigBuilder {
		FlagsConfigBuilder::default()
	}

	pub fn paths(&self) -> &[PathConfig] {
		&self.paths
	}

	pub fn webhook_secret(&self) -> Option<&SecretString> {
		self.webhook_secret.as_ref()
	}

	pub fn default_environment(&self) -> Option<&str> {
		self.default_environment.as_deref()
	}

	pub fn log_documents(&self) -> bool {
		self.log_documents
	}

	/// Looks up a path by project key, case-insensitively.
	pub fn path(&self, project: &str) -> Option<&PathConfig> {
		let project = project.trim().to_lowercase();
		self.paths.iter().find(|path| path.project() == project)
	}
}

impl fmt::Debug for FlagsConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FlagsConfig")
			.field("paths", &self.paths)
			.field("webhook_secret", &self.webhook_secret)
			.field("default_environment", &self.default_environment)
			.field("log_documents", &self.log_documents)
			.finish()
	}
}

#[derive(Default, Clone)]
pub struct FlagsConfigBuilder {
	paths: Vec<PathConfig>,
	webhook_secret: Option<SecretString>,
	default_environment: Option<String>,
	log_documents: bool,
}

impl FlagsConfigBuilder {
	/// Seeds a builder from the process environment.
	///
	/// - `FLAGDOWN_WEBHOOK_SECRET` (or `FLAGDOWN_WEBHOOK_SECRET_FILE`): webhook
	///   secret; caching is disabled without it
	/// - `FLAGDOWN_ENVIRONMENT`, `APP_ENV`, `ENV`, `STAGE`: the first one set
	///   becomes the default environment
	pub fn from_env() -> Result<Self> {
		let webhook_secret = load_secret_env(WEBHOOK_SECRET_ENV)
			.map_err(|e| FlagsError::Config(e.to_string()))?;

		Ok(Self {
			webhook_secret,
			default_environment: first_env_var(ENVIRONMENT_ENVS),
			..Self::default()
		})
	}

	pub fn path(mut self, path: PathConfig) -> Self {
		self.paths.push(path);
		self
	}

	pub fn paths(mut self, paths: impl IntoIterator<Item = PathConfig>) -> Self {
		self.paths.extend(paths);
		self
	}

	pub fn webhook_secret(mut self, secret: impl Into<SecretString>) -> Self {
		self.webhook_secret = Some(secret.into());
		self
	}

	pub fn default_environment(mut self, environment: impl Into<String>) -> Self {
		self.default_environment = Some(environment.into());
		self
	}

	pub fn log_documents(mut self, enabled: bool) -> Self {
		self.log_documents = enabled;
		self
	}

	pub fn build(self) -> Result<FlagsConfig> {
		if self.paths.is_empty() {
			return Err(FlagsError::NoPaths);
		}

		let mut seen = HashSet::new();
		for path in &self.paths {
			path.validate()?;
			let project = path.project();
			if !seen.insert(project.clone()) {
				return Err(FlagsError::DuplicateProject(project));
			}
		}

		let default_environment = self
			.default_environment
			.map(|env| env.trim().to_string())
			.filter(|env| !env.is_empty());

		Ok(FlagsConfig {
			paths: self.paths,
			webhook_secret: self.webhook_secret.filter(|secret| !secret.is_blank()),
			default_environment,
			log_documents: self.log_documents,
		})
	}
}
