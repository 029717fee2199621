// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Document parser: block nodes in, [`FeatureSet`] out.
//!
//! The grammar, by nesting:
//!
//! ```text
//! ## Feature            opens a feature, closing everything that was open
//! - [x] Enabled         first checklist after a heading sets `enabled`
//! ### environment       opens an environment inside the current feature
//! - [ ] Enabled
//! #### Conditions       opens a conditions block on the innermost scope
//! - [x] Beta Users      one condition per item, checked = armed
//! ```
//!
//! Parsing is a small state machine driven by node kind. It never fails on
//! malformed input: unknown nodes are skipped, list items without a checkbox
//! are skipped, and a later definition of the same slug replaces the earlier
//! one.

use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::model::{Condition, Environment, Feature, FeatureSet};
use crate::node::{tokenize, Node, NodeKind};

const CONDITIONS_HEADING: &str = "conditions";

/// Parses a block node stream into a feature set.
pub fn parse(nodes: &[Node]) -> FeatureSet {
	let mut parser = DocumentParser::default();
	for node in nodes {
		parser.step(node);
	}
	parser.finish()
}

/// Tokenizes and parses markdown text.
pub fn parse_markdown(markdown: &str) -> FeatureSet {
	parse(&tokenize(markdown))
}

/// Parses a fetched document body.
///
/// A missing or blank body is [`CoreError::DocumentNotFound`]; callers treat
/// it as "no features enabled".
pub fn parse_document(document: Option<&str>) -> Result<FeatureSet> {
	match document {
		Some(text) if !text.trim().is_empty() => Ok(parse_markdown(text)),
		_ => Err(CoreError::DocumentNotFound),
	}
}

/// Splits a checklist marker off the front of an item.
///
/// Accepts an optional `-`, `*` or `+` bullet followed by `[ ]`, `[x]` or
/// `[X]`. Returns the checked state and the remaining text.
pub(crate) fn split_checkbox(text: &str) -> Option<(bool, &str)> {
	let mut rest = text.trim_start();
	if let Some(after) = rest.strip_prefix(['-', '*', '+']) {
		if !after.starts_with([' ', '\t']) {
			return None;
		}
		rest = after.trim_start();
	}

	let (checked, after) = if let Some(after) = rest.strip_prefix("[ ]") {
		(false, after)
	} else if let Some(after) = rest.strip_prefix("[x]").or_else(|| rest.strip_prefix("[X]")) {
		(true, after)
	} else {
		return None;
	};

	if !after.is_empty() && !after.starts_with(char::is_whitespace) {
		return None;
	}
	Some((checked, after.trim_start()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConditionScope {
	Feature,
	Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	None,
	InFeature,
	InEnvironment,
	InConditions(ConditionScope),
}

impl ConditionScope {
	fn enclosing_state(self) -> State {
		match self {
			ConditionScope::Feature => State::InFeature,
			ConditionScope::Environment => State::InEnvironment,
		}
	}
}

#[derive(Debug)]
struct DocumentParser {
	features: FeatureSet,
	state: State,
	feature: Option<String>,
	environment: Option<String>,
	/// Whether the open feature/environment already consumed its checklist.
	toggled: bool,
}

impl Default for DocumentParser {
	fn default() -> Self {
		Self {
			features: FeatureSet::new(),
			state: State::None,
			feature: None,
			environment: None,
			toggled: false,
		}
	}
}

impl DocumentParser {
	fn step(&mut self, node: &Node) {
		if node.is_heading(2) {
			self.open_feature(node);
			return;
		}

		if let State::InConditions(scope) = self.state {
			if node.kind == NodeKind::List {
				self.add_conditions(scope, node);
				return;
			}
			self.state = scope.enclosing_state();
		}

		match (self.state, node.kind) {
			(State::None, _) => {}
			(_, NodeKind::Heading) if node.depth == 3 => self.open_environment(node),
			(_, NodeKind::Heading) if node.depth == 4 && is_conditions_heading(node) => {
				self.open_conditions()
			}
			(State::InFeature | State::InEnvironment, NodeKind::List) => self.apply_checklist(node),
			_ => {}
		}
	}

	fn finish(self) -> FeatureSet {
		self.features
	}

	fn open_feature(&mut self, node: &Node) {
		let feature = Feature::new(node.heading_text(), false);
		let slug = feature.slug.clone();
		if self.features.insert(feature).is_some() {
			warn!(feature = %slug, "duplicate feature heading, later definition wins");
		}
		self.feature = Some(slug);
		self.environment = None;
		self.toggled = false;
		self.state = State::InFeature;
	}

	fn open_environment(&mut self, node: &Node) {
		let environment = Environment::new(node.heading_text(), false);
		let slug = environment.slug.clone();
		let Some(feature) = self.current_feature() else {
			return;
		};
		if feature
			.environments
			.insert(slug.clone(), environment)
			.is_some()
		{
			warn!(feature = %feature.slug, environment = %slug, "duplicate environment heading, later definition wins");
		}
		self.environment = Some(slug);
		self.toggled = false;
		self.state = State::InEnvironment;
	}

	fn open_conditions(&mut self) {
		let scope = if self.state == State::InEnvironment {
			ConditionScope::Environment
		} else {
			ConditionScope::Feature
		};
		self.state = State::InConditions(scope);
	}

	fn apply_checklist(&mut self, list: &Node) {
		if self.toggled {
			return;
		}
		let Some(checked) = list
			.children
			.iter()
			.find_map(|item| split_checkbox(&item.raw).map(|(checked, _)| checked))
		else {
			debug!("list without checkbox items ignored");
			return;
		};

		match self.state {
			State::InFeature => {
				if let Some(feature) = self.current_feature() {
					feature.enabled = checked;
				}
			}
			State::InEnvironment => {
				if let Some(environment) = self.current_environment() {
					environment.enabled = checked;
				}
			}
			_ => return,
		}
		self.toggled = true;
	}

	fn add_conditions(&mut self, scope: ConditionScope, list: &Node) {
		let parsed: Vec<Condition> = list
			.children
			.iter()
			.filter_map(|item| {
				let first_line = item.raw.lines().next().unwrap_or_default();
				match split_checkbox(first_line) {
					Some((armed, name)) => Some(Condition::new(name.trim(), armed)),
					None => {
						debug!(item = %first_line, "condition item without checkbox skipped");
						None
					}
				}
			})
			.collect();

		let conditions = match scope {
			ConditionScope::Feature => self.current_feature().map(|f| &mut f.conditions),
			ConditionScope::Environment => self.current_environment().map(|e| &mut e.conditions),
		};
		let Some(conditions) = conditions else {
			return;
		};

		for condition in parsed {
			let slug = condition.slug.clone();
			if conditions.insert(slug.clone(), condition).is_some() {
				warn!(condition = %slug, "duplicate condition, later definition wins");
			}
		}
	}

	fn current_feature(&mut self) -> Option<&mut Feature> {
		let slug = self.feature.as_deref()?;
		self.features.get_mut(slug)
	}

	fn current_environment(&mut self) -> Option<&mut Environment> {
		let slug = self.environment.clone()?;
		self.current_feature()?.environments.get_mut(&slug)
	}
}

fn is_conditions_heading(node: &Node) -> bool {
	node.heading_text().eq_ignore_ascii_case(CONDITIONS_HEADING)
}
