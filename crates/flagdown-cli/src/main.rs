// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `flagdown` - inspect and evaluate markdown feature flag documents locally.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use flagdown_core::{
	evaluate, parse_document, predicate, ConditionRegistry, EvaluationContext, FeatureSet,
};

#[derive(Parser, Debug)]
#[command(name = "flagdown", about = "Markdown feature flag tool", version)]
struct Args {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Parse a flag document and print it as JSON
	Parse {
		file: PathBuf,

		/// Print one row per feature/environment/condition
		#[arg(long)]
		flat: bool,
	},

	/// Print the features enabled for an environment, one slug per line
	Eval {
		file: PathBuf,

		#[arg(long, short)]
		environment: String,

		/// Condition outcome as NAME=true|false; unlisted conditions fail
		#[arg(long = "condition", short = 'c', value_parser = parse_condition)]
		conditions: Vec<(String, bool)>,
	},

	/// Print the x-hub-signature-256 value for a payload
	Sign {
		file: PathBuf,

		#[arg(long, env = "FLAGDOWN_WEBHOOK_SECRET", hide_env_values = true)]
		secret: String,
	},

	/// Verify a signed webhook payload and print the parsed event
	Verify {
		file: PathBuf,

		#[arg(long, env = "FLAGDOWN_WEBHOOK_SECRET", hide_env_values = true)]
		secret: String,

		#[arg(long)]
		signature: String,
	},
}

fn parse_condition(raw: &str) -> Result<(String, bool), String> {
	let (name, value) = raw
		.split_once('=')
		.ok_or_else(|| format!("expected NAME=true|false, got '{raw}'"))?;
	let name = name.trim();
	if name.is_empty() {
		return Err(format!("empty condition name in '{raw}'"));
	}
	let value = value
		.trim()
		.parse::<bool>()
		.map_err(|_| format!("expected true or false for '{name}', got '{value}'"))?;
	Ok((name.to_string(), value))
}

fn load_features(file: &Path) -> Result<FeatureSet> {
	let text = std::fs::read_to_string(file)
		.with_context(|| format!("failed to read {}", file.display()))?;
	let features = parse_document(Some(&text))
		.with_context(|| format!("no flag document in {}", file.display()))?;
	debug!(path = %file.display(), features = features.len(), "parsed flag document");
	Ok(features)
}

fn registry(conditions: &[(String, bool)]) -> ConditionRegistry {
	conditions
		.iter()
		.fold(ConditionRegistry::new(), |registry, (name, value)| {
			let value = *value;
			registry.with(name, predicate(move |_| value))
		})
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let args = Args::parse();

	match args.command {
		Command::Parse { file, flat } => {
			let features = load_features(&file)?;
			let json = if flat {
				serde_json::to_string_pretty(&features.flatten())?
			} else {
				serde_json::to_string_pretty(&features)?
			};
			println!("{json}");
		}
		Command::Eval {
			file,
			environment,
			conditions,
		} => {
			let features = load_features(&file)?;
			let registry = registry(&conditions);
			let enabled =
				evaluate(&features, &environment, &EvaluationContext::new(), &registry).await;
			info!(environment = %environment, enabled = enabled.len(), "evaluated");
			for slug in enabled.iter() {
				println!("{slug}");
			}
		}
		Command::Sign { file, secret } => {
			let body = std::fs::read(&file)
				.with_context(|| format!("failed to read {}", file.display()))?;
			println!("{}", flagdown_webhook::compute_signature(&secret, &body));
		}
		Command::Verify {
			file,
			secret,
			signature,
		} => {
			let body = std::fs::read(&file)
				.with_context(|| format!("failed to read {}", file.display()))?;
			let event = match flagdown_webhook::verify(&body, Some(&signature), &secret) {
				Ok(event) => event,
				Err(err) => bail!("webhook rejected: {err}"),
			};
			println!("{}", serde_json::to_string_pretty(&event)?);
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn parse_condition_accepts_name_and_bool() {
		assert_eq!(
			parse_condition("Beta Users=true").unwrap(),
			("Beta Users".to_string(), true)
		);
		assert_eq!(parse_condition("staff = false").unwrap(), ("staff".to_string(), false));
	}

	#[test]
	fn parse_condition_rejects_malformed_input() {
		assert!(parse_condition("beta-users").is_err());
		assert!(parse_condition("=true").is_err());
		assert!(parse_condition("beta-users=yes").is_err());
	}

	#[test]
	fn args_parse_eval_subcommand() {
		let args = Args::try_parse_from([
			"flagdown",
			"eval",
			"flags.md",
			"--environment",
			"production",
			"-c",
			"beta-users=true",
			"-c",
			"staff=false",
		])
		.unwrap();
		match args.command {
			Command::Eval {
				environment,
				conditions,
				..
			} => {
				assert_eq!(environment, "production");
				assert_eq!(conditions.len(), 2);
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn load_features_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "## Dark Mode\n- [x] Enabled").unwrap();
		let features = load_features(file.path()).unwrap();
		assert!(features.get("dark-mode").unwrap().enabled);
	}

	#[test]
	fn load_features_rejects_empty_file() {
		let file = tempfile::NamedTempFile::new().unwrap();
		assert!(load_features(file.path()).is_err());
	}

	#[tokio::test]
	async fn registry_from_flags() {
		let features = flagdown_core::parse_markdown(
			"## Dark Mode\n- [x] Enabled\n#### Conditions\n- [x] Beta Users\n",
		);
		let on = registry(&[("Beta Users".to_string(), true)]);
		let off = registry(&[("beta-users".to_string(), false)]);
		let ctx = EvaluationContext::new();
		assert!(evaluate(&features, "dev", &ctx, &on).await.contains("dark-mode"));
		assert!(evaluate(&features, "dev", &ctx, &off).await.is_empty());
	}
}
