// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for markdown-driven feature flags.
//!
//! A flag document is ordinary markdown: `##` headings declare features,
//! `###` headings declare per-environment overrides, a `#### Conditions`
//! heading opens a checklist of named gates, and the first checklist item
//! under a feature or environment sets its enabled state.
//!
//! ```
//! use flagdown_core::parse_markdown;
//!
//! let set = parse_markdown("## Dark Mode\n- [x] Enabled\n");
//! assert!(set.get("dark-mode").unwrap().enabled);
//! ```
//!
//! This crate is runtime-agnostic: evaluation is `async` so predicates may
//! do I/O, but nothing here spawns tasks or depends on an executor.

pub mod error;
pub mod evaluation;
pub mod model;
pub mod node;
pub mod parser;
pub mod slug;

pub use error::{CoreError, Result};
pub use evaluation::{
	evaluate, is_enabled, predicate, ConditionPredicate, ConditionRegistry, EnabledFeatures,
	EvaluationContext, FeatureNames, FnPredicate, SharedPredicate,
};
pub use model::{Condition, Environment, Feature, FeatureSet, FlatFeature};
pub use node::{tokenize, Node, NodeKind};
pub use parser::{parse, parse_document, parse_markdown};
pub use slug::slugify;
