// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation engine: feature set + environment + context in, enabled slugs
//! out.
//!
//! The evaluation order per feature is:
//! 1. Without environments, the feature's own `enabled` decides
//! 2. With environments, the requested environment must exist and be enabled
//! 3. Every armed condition on the active scope must be satisfied by the
//!    predicate registered under its slug; unregistered predicates fail
//!    closed

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Condition, Feature, FeatureSet};
use crate::slug::slugify;

/// Caller-supplied data that condition predicates inspect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	#[serde(default)]
	pub attributes: HashMap<String, serde_json::Value>,
}

impl EvaluationContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.attributes.insert(key.into(), value);
		self
	}

	pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
		self.attributes.get(key)
	}
}

/// A named runtime check attached to a project.
///
/// Predicates only see the context; they must not rely on being called in
/// any particular order or on the same task as other predicates.
#[async_trait]
pub trait ConditionPredicate: Send + Sync {
	async fn evaluate(&self, context: &EvaluationContext) -> bool;
}

/// Adapts a synchronous closure into a [`ConditionPredicate`].
pub struct FnPredicate<F>(F);

impl<F> FnPredicate<F>
where
	F: Fn(&EvaluationContext) -> bool + Send + Sync + 'static,
{
	pub fn new(predicate: F) -> Self {
		Self(predicate)
	}
}

#[async_trait]
impl<F> ConditionPredicate for FnPredicate<F>
where
	F: Fn(&EvaluationContext) -> bool + Send + Sync + 'static,
{
	async fn evaluate(&self, context: &EvaluationContext) -> bool {
		(self.0)(context)
	}
}

/// Shared handle to a predicate.
pub type SharedPredicate = Arc<dyn ConditionPredicate>;

/// Wraps a closure as a [`SharedPredicate`].
pub fn predicate<F>(f: F) -> SharedPredicate
where
	F: Fn(&EvaluationContext) -> bool + Send + Sync + 'static,
{
	Arc::new(FnPredicate::new(f))
}

/// Predicates keyed by condition slug.
#[derive(Clone, Default)]
pub struct ConditionRegistry {
	predicates: HashMap<String, SharedPredicate>,
}

impl ConditionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a predicate under the slug of `name`, replacing any previous
	/// registration for that slug.
	pub fn register(&mut self, name: &str, predicate: SharedPredicate) {
		self.predicates.insert(slugify(name), predicate);
	}

	pub fn with(mut self, name: &str, predicate: SharedPredicate) -> Self {
		self.register(name, predicate);
		self
	}

	pub fn get(&self, slug: &str) -> Option<&SharedPredicate> {
		self.predicates.get(slug)
	}

	pub fn contains(&self, slug: &str) -> bool {
		self.predicates.contains_key(slug)
	}

	pub fn len(&self) -> usize {
		self.predicates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.predicates.is_empty()
	}
}

impl fmt::Debug for ConditionRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut names: Vec<_> = self.predicates.keys().collect();
		names.sort();
		f.debug_struct("ConditionRegistry")
			.field("conditions", &names)
			.finish()
	}
}

/// Sorted set of enabled feature slugs produced by one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnabledFeatures(BTreeSet<String>);

impl EnabledFeatures {
	pub fn contains(&self, slug: &str) -> bool {
		self.0.contains(slug)
	}

	/// True when every requested feature is enabled.
	///
	/// Names are slugified before lookup, so `"Dark Mode"` and `"dark-mode"`
	/// are equivalent. An empty request is never enabled.
	pub fn is_enabled<'a>(&self, names: impl Into<FeatureNames<'a>>) -> bool {
		let names: FeatureNames<'a> = names.into();
		let mut names = names.iter().peekable();
		if names.peek().is_none() {
			return false;
		}
		names.all(|name| self.0.contains(&slugify(name)))
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn into_vec(self) -> Vec<String> {
		self.0.into_iter().collect()
	}
}

impl FromIterator<String> for EnabledFeatures {
	fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl<'a> FromIterator<&'a str> for EnabledFeatures {
	fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
		Self(iter.into_iter().map(str::to_string).collect())
	}
}

impl IntoIterator for EnabledFeatures {
	type Item = String;
	type IntoIter = std::collections::btree_set::IntoIter<String>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

/// One feature name or several, for [`is_enabled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureNames<'a> {
	One(&'a str),
	Many(Vec<&'a str>),
}

impl<'a> FeatureNames<'a> {
	fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
		let names: &[&'a str] = match self {
			FeatureNames::One(name) => std::slice::from_ref(name),
			FeatureNames::Many(names) => names,
		};
		names.iter().copied()
	}
}

impl<'a> From<&'a str> for FeatureNames<'a> {
	fn from(name: &'a str) -> Self {
		FeatureNames::One(name)
	}
}

impl<'a> From<&'a String> for FeatureNames<'a> {
	fn from(name: &'a String) -> Self {
		FeatureNames::One(name)
	}
}

impl<'a> From<&[&'a str]> for FeatureNames<'a> {
	fn from(names: &[&'a str]) -> Self {
		FeatureNames::Many(names.to_vec())
	}
}

impl<'a, const N: usize> From<[&'a str; N]> for FeatureNames<'a> {
	fn from(names: [&'a str; N]) -> Self {
		FeatureNames::Many(names.to_vec())
	}
}

impl<'a> From<Vec<&'a str>> for FeatureNames<'a> {
	fn from(names: Vec<&'a str>) -> Self {
		FeatureNames::Many(names)
	}
}

/// Membership test against an evaluated set; AND across several names.
pub fn is_enabled<'a>(names: impl Into<FeatureNames<'a>>, enabled: &EnabledFeatures) -> bool {
	enabled.is_enabled(names)
}

/// Computes the enabled features for `environment`.
///
/// Conditions for all candidate features are checked concurrently; the
/// result does not depend on completion order.
pub async fn evaluate(
	features: &FeatureSet,
	environment: &str,
	context: &EvaluationContext,
	conditions: &ConditionRegistry,
) -> EnabledFeatures {
	let environment = slugify(environment);

	let candidates: Vec<(&Feature, Vec<&Condition>)> = features
		.iter()
		.filter_map(|feature| active_conditions(feature, &environment).map(|c| (feature, c)))
		.collect();

	let verdicts = join_all(
		candidates
			.iter()
			.map(|(_, active)| conditions_hold(active, context, conditions)),
	)
	.await;

	candidates
		.iter()
		.zip(verdicts)
		.filter_map(|((feature, _), allowed)| {
			if !allowed {
				debug!(feature = %feature.slug, "feature blocked by conditions");
			}
			allowed.then(|| feature.slug.clone())
		})
		.collect()
}

/// Returns the conditions gating `feature` in `environment`, or `None` when
/// the feature is excluded before conditions are consulted.
fn active_conditions<'f>(feature: &'f Feature, environment: &str) -> Option<Vec<&'f Condition>> {
	let mut active: Vec<&Condition> = feature.conditions.values().collect();

	if feature.has_environments() {
		let matched = feature.environments.get(environment)?;
		if !matched.enabled {
			return None;
		}
		active.extend(matched.conditions.values());
	} else if !feature.enabled {
		return None;
	}

	Some(active)
}

async fn conditions_hold(
	active: &[&Condition],
	context: &EvaluationContext,
	registry: &ConditionRegistry,
) -> bool {
	let checks = active
		.iter()
		.filter(|condition| condition.is_armed())
		.map(|condition| async move {
			match registry.get(&condition.slug) {
				Some(predicate) => predicate.evaluate(context).await,
				None => {
					debug!(condition = %condition.slug, "no predicate registered, condition not satisfied");
					false
				}
			}
		});

	join_all(checks).await.into_iter().all(|held| held)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::Environment;
	use crate::parser::parse_markdown;
	use proptest::prelude::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	const DARK_MODE: &str = "\
## Dark Mode
- [x] Enabled
### production
- [x] Enabled
#### Conditions
- [x] Beta Users
";

	fn registry(name: &str, result: bool) -> ConditionRegistry {
		ConditionRegistry::new().with(name, predicate(move |_| result))
	}

	#[tokio::test]
	async fn dark_mode_enabled_when_predicate_holds() {
		let set = parse_markdown(DARK_MODE);
		let enabled = evaluate(
			&set,
			"production",
			&EvaluationContext::new(),
			&registry("beta-users", true),
		)
		.await;
		assert_eq!(enabled.into_vec(), vec!["dark-mode".to_string()]);
	}

	#[tokio::test]
	async fn dark_mode_disabled_when_predicate_fails() {
		let set = parse_markdown(DARK_MODE);
		let enabled = evaluate(
			&set,
			"production",
			&EvaluationContext::new(),
			&registry("beta-users", false),
		)
		.await;
		assert!(enabled.is_empty());
	}

	#[tokio::test]
	async fn unknown_environment_excludes_feature() {
		let set = parse_markdown(DARK_MODE);
		let enabled = evaluate(
			&set,
			"staging",
			&EvaluationContext::new(),
			&registry("beta-users", true),
		)
		.await;
		assert!(enabled.is_empty());
	}

	#[tokio::test]
	async fn environment_key_is_case_insensitive() {
		let set = parse_markdown(DARK_MODE);
		let enabled = evaluate(
			&set,
			"  PRODUCTION ",
			&EvaluationContext::new(),
			&registry("Beta Users", true),
		)
		.await;
		assert!(enabled.contains("dark-mode"));
	}

	#[tokio::test]
	async fn unregistered_armed_condition_fails_closed() {
		let set = parse_markdown(DARK_MODE);
		let enabled = evaluate(
			&set,
			"production",
			&EvaluationContext::new(),
			&ConditionRegistry::new(),
		)
		.await;
		assert!(enabled.is_empty());
	}

	#[tokio::test]
	async fn unarmed_condition_never_blocks() {
		let set = parse_markdown("## Search\n- [x] Enabled\n#### Conditions\n- [ ] Staff\n");
		let enabled = evaluate(
			&set,
			"production",
			&EvaluationContext::new(),
			&registry("staff", false),
		)
		.await;
		assert!(enabled.contains("search"));
	}

	#[tokio::test]
	async fn disabled_environment_excludes_feature() {
		let set = parse_markdown("## Search\n- [x] Enabled\n### production\n- [ ] Enabled\n");
		let enabled = evaluate(
			&set,
			"production",
			&EvaluationContext::new(),
			&ConditionRegistry::new(),
		)
		.await;
		assert!(enabled.is_empty());
	}

	#[tokio::test]
	async fn environment_overrides_global_state() {
		let set = parse_markdown("## Search\n- [ ] Enabled\n### production\n- [x] Enabled\n");
		let enabled = evaluate(
			&set,
			"production",
			&EvaluationContext::new(),
			&ConditionRegistry::new(),
		)
		.await;
		assert!(enabled.contains("search"));
	}

	#[tokio::test]
	async fn feature_and_environment_conditions_both_apply() {
		let markdown = "\
## Search
- [x] Enabled
#### Conditions
- [x] Staff
### production
- [x] Enabled
#### Conditions
- [x] Beta Users
";
		let set = parse_markdown(markdown);
		let context = EvaluationContext::new();

		let both = ConditionRegistry::new()
			.with("staff", predicate(|_| true))
			.with("beta-users", predicate(|_| true));
		assert!(evaluate(&set, "production", &context, &both).await.contains("search"));

		let only_env = ConditionRegistry::new().with("beta-users", predicate(|_| true));
		assert!(evaluate(&set, "production", &context, &only_env).await.is_empty());
	}

	#[tokio::test]
	async fn predicates_receive_context() {
		let set = parse_markdown(DARK_MODE);
		let registry = ConditionRegistry::new().with(
			"beta-users",
			predicate(|ctx| ctx.attribute("beta") == Some(&serde_json::json!(true))),
		);

		let beta = EvaluationContext::new().with_attribute("beta", serde_json::json!(true));
		let other = EvaluationContext::new().with_user_id("u1");

		assert!(evaluate(&set, "production", &beta, &registry).await.contains("dark-mode"));
		assert!(evaluate(&set, "production", &other, &registry).await.is_empty());
	}

	struct CountingPredicate {
		calls: Arc<AtomicUsize>,
		result: bool,
	}

	#[async_trait]
	impl ConditionPredicate for CountingPredicate {
		async fn evaluate(&self, _context: &EvaluationContext) -> bool {
			self.calls.fetch_add(1, Ordering::SeqCst);
			tokio::task::yield_now().await;
			self.result
		}
	}

	#[tokio::test]
	async fn async_predicates_are_consulted_once_per_armed_condition() {
		let set = parse_markdown("## A\n- [x] Enabled\n#### Conditions\n- [x] Slow\n## B\n- [x] Enabled\n#### Conditions\n- [x] Slow\n- [ ] Off\n");
		let calls = Arc::new(AtomicUsize::new(0));
		let registry = ConditionRegistry::new().with(
			"slow",
			Arc::new(CountingPredicate {
				calls: Arc::clone(&calls),
				result: true,
			}),
		);

		let enabled = evaluate(&set, "dev", &EvaluationContext::new(), &registry).await;
		assert_eq!(enabled.into_vec(), vec!["a".to_string(), "b".to_string()]);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn is_enabled_single_and_many() {
		let enabled: EnabledFeatures = ["a", "dark-mode"].into_iter().collect();

		assert!(is_enabled("a", &enabled));
		assert!(is_enabled("Dark Mode", &enabled));
		assert!(!is_enabled("b", &enabled));
		assert!(is_enabled(["a", "dark-mode"], &enabled));
		assert!(!is_enabled(["a", "b"], &enabled));
		assert!(!is_enabled(Vec::<&str>::new(), &enabled));
		assert!(!is_enabled("a", &EnabledFeatures::default()));
	}

	#[test]
	fn registry_debug_lists_names_only() {
		let registry = registry("Beta Users", true);
		assert_eq!(
			format!("{registry:?}"),
			"ConditionRegistry { conditions: [\"beta-users\"] }"
		);
	}

	fn single_feature(enabled: bool, environments: &[(&str, bool)]) -> FeatureSet {
		let mut feature = Feature::new("Flag", enabled);
		for (name, on) in environments {
			feature = feature.with_environment(Environment::new(*name, *on));
		}
		[feature].into_iter().collect()
	}

	proptest! {
		#[test]
		fn enabled_feature_without_environments_is_always_included(env in "[a-z]{1,12}") {
			let set = single_feature(true, &[]);
			let enabled = tokio_test::block_on(evaluate(&set, &env, &EvaluationContext::new(), &ConditionRegistry::new()));
			prop_assert!(enabled.contains("flag"));
		}

		#[test]
		fn absent_environment_excludes_regardless_of_global_state(
			global in proptest::bool::ANY,
			env in "[a-z]{3,12}",
		) {
			prop_assume!(env != "production");
			let set = single_feature(global, &[("production", true)]);
			let enabled = tokio_test::block_on(evaluate(&set, &env, &EvaluationContext::new(), &ConditionRegistry::new()));
			prop_assert!(enabled.is_empty());
		}

		#[test]
		fn and_semantics_across_names(present in "[a-z]{1,8}", missing in "[a-z]{1,8}") {
			prop_assume!(present != missing);
			let enabled: EnabledFeatures = [present.as_str()].into_iter().collect();
			prop_assert!(!is_enabled([present.as_str(), missing.as_str()], &enabled));
		}
	}
}
