// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration primitives shared by the flagdown crates.
//!
//! - [`Secret<T>`]: keeps webhook secrets out of logs and config dumps
//! - [`load_secret_env`]: reads a secret from `VAR` or the file named by
//!   `VAR_FILE`
//! - [`first_env_var`]: resolves the first non-empty variable from a list of
//!   candidates

pub mod env;
pub mod secret;

pub use env::{first_env_var, load_secret_env, SecretEnvError};
pub use secret::{Secret, SecretString, REDACTED};
