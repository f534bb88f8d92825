// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod crontab;
pub mod history;
pub mod jobs;
pub mod report;

use std::path::Path;

use tokio::io::AsyncReadExt;

/// Read a file, or standard input when no path (or `-`) is given.
pub async fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
	match path {
		Some(path) if path != Path::new("-") => Ok(tokio::fs::read_to_string(path).await?),
		_ => {
			let mut text = String::new();
			tokio::io::stdin().read_to_string(&mut text).await?;
			Ok(text)
		}
	}
}

/// Host and user a command applies to.
#[derive(Debug, Clone, clap::Args)]
pub struct ScopeArgs {
	/// Host the crontab or job belongs to
	#[arg(long, env = "CRABCLIENTHOSTNAME")]
	pub host: String,

	/// User the crontab or job belongs to
	#[arg(long, env = "CRABUSERNAME")]
	pub user: String,
}
