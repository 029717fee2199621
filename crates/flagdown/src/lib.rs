// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature flags kept in a markdown issue.
//!
//! A [`FlagEngine`] maps project keys to issues ([`PathConfig`]), fetches
//! each issue body through a [`DocumentSource`], parses it into a
//! [`FeatureSet`], and evaluates it for an environment and an
//! [`EvaluationContext`]. Parsed documents are cached until a signed issue
//! webhook reports a change.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flagdown::{predicate, FeatureQuery, FlagEngine, FlagsConfig, PathConfig};
//!
//! let config = FlagsConfig::builder()
//! 	.path(PathConfig::new("acme/web", 12).with_condition("beta-users", predicate(|_| true)))
//! 	.webhook_secret("shh")
//! 	.default_environment("production")
//! 	.build()?;
//! let engine = FlagEngine::new(config, Arc::new(my_source));
//! if engine.is_feature_enabled("Dark Mode", FeatureQuery::new()).await? {
//! 	// ...
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;

pub use cache::{CacheKey, CacheProvider, Loader, MemoryCache, NoCache};
pub use config::{FlagsConfig, FlagsConfigBuilder, PathConfig};
pub use engine::{FeatureQuery, FlagEngine, WebhookResponse};
pub use error::{FlagsError, Result};
pub use source::{DocumentLocation, DocumentSource, SourceError, StaticDocumentSource};

pub use flagdown_config::SecretString;
pub use flagdown_core::{
	is_enabled, predicate, ConditionPredicate, ConditionRegistry, EnabledFeatures,
	EvaluationContext, Feature, FeatureNames, FeatureSet, SharedPredicate,
};
pub use flagdown_webhook::{compute_signature, SIGNATURE_HEADER};
