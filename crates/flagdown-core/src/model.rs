// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::slug::slugify;

/// A named gate. `enabled` means the condition is armed and its predicate
/// must hold; it does not mean the condition is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
	pub name: String,
	pub slug: String,
	pub enabled: bool,
}

impl Condition {
	pub fn new(name: impl Into<String>, enabled: bool) -> Self {
		let name = name.into();
		Self {
			slug: slugify(&name),
			name,
			enabled,
		}
	}

	pub fn is_armed(&self) -> bool {
		self.enabled
	}
}

/// Per-deployment-target override for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
	pub name: String,
	pub slug: String,
	pub enabled: bool,
	#[serde(default)]
	pub conditions: BTreeMap<String, Condition>,
}

impl Environment {
	pub fn new(name: impl Into<String>, enabled: bool) -> Self {
		let name = name.into();
		Self {
			slug: slugify(&name),
			name,
			enabled,
			conditions: BTreeMap::new(),
		}
	}

	pub fn with_condition(mut self, condition: Condition) -> Self {
		self.conditions.insert(condition.slug.clone(), condition);
		self
	}
}

/// A feature flag as written in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
	pub name: String,
	pub slug: String,
	/// Global state, used when the feature has no environments.
	pub enabled: bool,
	#[serde(default)]
	pub environments: BTreeMap<String, Environment>,
	#[serde(default)]
	pub conditions: BTreeMap<String, Condition>,
}

impl Feature {
	pub fn new(name: impl Into<String>, enabled: bool) -> Self {
		let name = name.into();
		Self {
			slug: slugify(&name),
			name,
			enabled,
			environments: BTreeMap::new(),
			conditions: BTreeMap::new(),
		}
	}

	pub fn with_environment(mut self, environment: Environment) -> Self {
		self.environments.insert(environment.slug.clone(), environment);
		self
	}

	pub fn with_condition(mut self, condition: Condition) -> Self {
		self.conditions.insert(condition.slug.clone(), condition);
		self
	}

	pub fn has_environments(&self) -> bool {
		!self.environments.is_empty()
	}
}

/// All features parsed from one document, keyed by slug.
///
/// A feature set is built once per parse and never mutated afterwards;
/// callers share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
	features: BTreeMap<String, Feature>,
}

impl FeatureSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, slug: &str) -> Option<&Feature> {
		self.features.get(slug)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Feature> {
		self.features.values()
	}

	pub fn slugs(&self) -> impl Iterator<Item = &str> {
		self.features.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.features.len()
	}

	pub fn is_empty(&self) -> bool {
		self.features.is_empty()
	}

	/// One row per feature, feature/environment and feature/condition pair.
	pub fn flatten(&self) -> Vec<FlatFeature> {
		let mut rows = Vec::new();
		for feature in self.iter() {
			let base = FlatFeature {
				feature: feature.name.clone(),
				slug: feature.slug.clone(),
				feature_enabled: feature.enabled,
				environment: None,
				environment_enabled: None,
				condition: None,
				condition_enabled: None,
			};

			for condition in feature.conditions.values() {
				rows.push(FlatFeature {
					condition: Some(condition.slug.clone()),
					condition_enabled: Some(condition.enabled),
					..base.clone()
				});
			}

			for environment in feature.environments.values() {
				let with_env = FlatFeature {
					environment: Some(environment.slug.clone()),
					environment_enabled: Some(environment.enabled),
					..base.clone()
				};
				for condition in environment.conditions.values() {
					rows.push(FlatFeature {
						condition: Some(condition.slug.clone()),
						condition_enabled: Some(condition.enabled),
						..with_env.clone()
					});
				}
				if environment.conditions.is_empty() {
					rows.push(with_env);
				}
			}

			if feature.conditions.is_empty() && feature.environments.is_empty() {
				rows.push(base);
			}
		}
		rows
	}

	/// Inserts a feature, replacing any earlier feature with the same slug.
	pub(crate) fn insert(&mut self, feature: Feature) -> Option<Feature> {
		self.features.insert(feature.slug.clone(), feature)
	}

	pub(crate) fn get_mut(&mut self, slug: &str) -> Option<&mut Feature> {
		self.features.get_mut(slug)
	}
}

impl FromIterator<Feature> for FeatureSet {
	fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
		let mut set = FeatureSet::new();
		for feature in iter {
			set.insert(feature);
		}
		set
	}
}

impl<'a> IntoIterator for &'a FeatureSet {
	type Item = &'a Feature;
	type IntoIter = std::collections::btree_map::Values<'a, String, Feature>;

	fn into_iter(self) -> Self::IntoIter {
		self.features.values()
	}
}

/// Denormalized view of a feature set, one row per scope combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatFeature {
	pub feature: String,
	pub slug: String,
	pub feature_enabled: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub environment: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub environment_enabled: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub condition: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub condition_enabled: Option<bool>,
}
