// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The flag engine: resolves a query to a document, loads it through the
//! cache, and evaluates it.

use std::sync::Arc;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use flagdown_core::{
	evaluate, parse_document, slugify, EnabledFeatures, EvaluationContext, FeatureNames, FeatureSet,
};
use flagdown_webhook::WebhookError;

use crate::cache::{CacheKey, CacheProvider, Loader, MemoryCache, NoCache};
use crate::config::{FlagsConfig, PathConfig};
use crate::error::{FlagsError, Result};
use crate::source::DocumentSource;

/// What to evaluate. Every field is optional; see [`FlagEngine::get_features`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureQuery {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub project: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub environment: Option<String>,
	#[serde(default)]
	pub context: EvaluationContext,
}

impl FeatureQuery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn project(mut self, project: impl Into<String>) -> Self {
		self.project = Some(project.into());
		self
	}

	pub fn environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = Some(environment.into());
		self
	}

	pub fn context(mut self, context: EvaluationContext) -> Self {
		self.context = context;
		self
	}
}

/// Outcome of a webhook delivery, ready to be turned into an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
	pub status: StatusCode,
	pub body: serde_json::Value,
}

impl WebhookResponse {
	fn success() -> Self {
		Self {
			status: StatusCode::OK,
			body: json!({ "success": true }),
		}
	}

	fn error(status: StatusCode, message: &str) -> Self {
		Self {
			status,
			body: json!({ "error": message }),
		}
	}
}

/// Feature flags backed by markdown issues.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct FlagEngine {
	config: FlagsConfig,
	source: Arc<dyn DocumentSource>,
	cache: Arc<dyn CacheProvider>,
}

impl FlagEngine {
	/// Creates an engine with an in-memory cache when a webhook secret is
	/// configured, and no cache otherwise.
	pub fn new(config: FlagsConfig, source: Arc<dyn DocumentSource>) -> Self {
		Self::with_cache(config, source, Arc::new(MemoryCache::new()))
	}

	/// Creates an engine with a host-provided cache.
	///
	/// Without a webhook secret nothing could ever invalidate the cache, so
	/// `cache` is ignored and every query fetches.
	pub fn with_cache(
		config: FlagsConfig,
		source: Arc<dyn DocumentSource>,
		cache: Arc<dyn CacheProvider>,
	) -> Self {
		let cache: Arc<dyn CacheProvider> = if config.webhook_secret().is_some() {
			cache
		} else {
			warn!("no webhook secret configured, flag documents will be fetched on every query");
			Arc::new(NoCache)
		};

		info!(paths = config.paths().len(), "flag engine initialized");

		Self {
			config,
			source,
			cache,
		}
	}

	pub fn config(&self) -> &FlagsConfig {
		&self.config
	}

	/// Evaluates the flags of one project.
	///
	/// The project may be omitted when exactly one path is configured. The
	/// environment falls back to the configured default.
	pub async fn get_features(&self, query: FeatureQuery) -> Result<EnabledFeatures> {
		let path = self.resolve_path(query.project.as_deref())?;
		let environment = self.resolve_environment(query.environment.as_deref())?;

		let features = self.load(path, &environment).await?;
		let enabled = evaluate(&features, &environment, &query.context, path.conditions()).await;

		debug!(
			project = %path.project(),
			environment = %environment,
			enabled = enabled.len(),
			"features evaluated"
		);
		Ok(enabled)
	}

	/// True if every named feature is enabled.
	///
	/// A project whose issue has no body has no enabled features.
	pub async fn is_feature_enabled<'a>(
		&self,
		names: impl Into<FeatureNames<'a>>,
		query: FeatureQuery,
	) -> Result<bool> {
		let names: FeatureNames<'a> = names.into();
		match self.get_features(query).await {
			Ok(enabled) => Ok(enabled.is_enabled(names)),
			Err(FlagsError::DocumentNotFound) => Ok(false),
			Err(err) => Err(err),
		}
	}

	/// Handles a signed issue webhook.
	///
	/// A verified delivery for a configured issue drops that project's cached
	/// documents. Deliveries for other issues are acknowledged without
	/// further action.
	pub async fn handle_webhook(&self, body: &[u8], signature: Option<&str>) -> WebhookResponse {
		let Some(secret) = self.config.webhook_secret() else {
			warn!("webhook received but no webhook secret is configured");
			return WebhookResponse::error(StatusCode::OK, "webhook disabled");
		};

		let event = match flagdown_webhook::verify(body, signature, secret.expose()) {
			Ok(event) => event,
			Err(WebhookError::MissingSignature | WebhookError::InvalidSignature) => {
				return WebhookResponse::error(StatusCode::UNAUTHORIZED, "invalid signature");
			}
			Err(WebhookError::InvalidPayload(err)) => {
				warn!(error = %err, "webhook payload rejected");
				return WebhookResponse::error(StatusCode::BAD_REQUEST, "invalid payload");
			}
		};

		let Some(path) = self
			.config
			.paths()
			.iter()
			.find(|path| path.matches(&event.repository_full_name, event.issue_number))
		else {
			debug!(
				repository = %event.repository_full_name,
				issue = event.issue_number,
				"webhook for unconfigured issue ignored"
			);
			return WebhookResponse::success();
		};

		let project = path.project();
		self.cache.invalidate_tag(&project).await;
		info!(project = %project, action = %event.action, "flag cache revalidated");

		if self.config.log_documents() {
			match parse_document(event.issue_body.as_deref()) {
				Ok(features) => log_features(&project, "webhook", &features),
				Err(err) => debug!(project = %project, error = %err, "webhook carried no document"),
			}
		}

		WebhookResponse::success()
	}

	fn resolve_path(&self, project: Option<&str>) -> Result<&PathConfig> {
		match project.map(str::trim).filter(|p| !p.is_empty()) {
			Some(project) => self
				.config
				.path(project)
				.ok_or_else(|| FlagsError::PathNotFound(project.to_string())),
			None => match self.config.paths() {
				[only] => Ok(only),
				_ => Err(FlagsError::AmbiguousProject),
			},
		}
	}

	fn resolve_environment(&self, environment: Option<&str>) -> Result<String> {
		environment
			.map(str::trim)
			.filter(|env| !env.is_empty())
			.or(self.config.default_environment())
			.map(slugify)
			.ok_or(FlagsError::MissingEnvironment)
	}

	async fn load(&self, path: &PathConfig, environment: &str) -> Result<Arc<FeatureSet>> {
		let project = path.project();
		let key = CacheKey::new(project.clone(), environment);
		let tags = [project.clone()];

		let loader: Loader<'_> = Box::pin(async move {
			let location = path.location();
			debug!(project = %project, location = %location, "fetching flag document");

			let document = self.source.fetch(&location).await?;
			let features = parse_document(document.as_deref())?;
			if self.config.log_documents() {
				log_features(&project, "fetch", &features);
			}
			Ok(Arc::new(features))
		});

		self.cache.get_or_load(&key, &tags, loader).await
	}
}

fn log_features(project: &str, origin: &str, features: &FeatureSet) {
	match serde_json::to_string_pretty(features) {
		Ok(json) => debug!(project, origin, features = %json, "parsed flag document"),
		Err(err) => warn!(project, error = %err, "failed to serialize flag document"),
	}
}
